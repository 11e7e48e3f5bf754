use crate::model::NodeType;
use crate::report::{ActionRecorder, ActionType};
use crate::xml::{QName, XmlAttribute, XmlDocument, XmlElement, XmlNode, ANDROID_URI};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Manifest values the invocation can force regardless of the input files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemProperty {
    Package,
    VersionCode,
    VersionName,
    MinSdkVersion,
    TargetSdkVersion,
    MaxSdkVersion,
}

impl SystemProperty {
    pub const ALL: [SystemProperty; 6] = [
        SystemProperty::Package,
        SystemProperty::VersionCode,
        SystemProperty::VersionName,
        SystemProperty::MinSdkVersion,
        SystemProperty::TargetSdkVersion,
        SystemProperty::MaxSdkVersion,
    ];

    /// Attribute name carrying the property
    pub fn to_camel_case(&self) -> &'static str {
        match self {
            SystemProperty::Package => "package",
            SystemProperty::VersionCode => "versionCode",
            SystemProperty::VersionName => "versionName",
            SystemProperty::MinSdkVersion => "minSdkVersion",
            SystemProperty::TargetSdkVersion => "targetSdkVersion",
            SystemProperty::MaxSdkVersion => "maxSdkVersion",
        }
    }

    /// Check that `value` is acceptable for this property
    pub fn validate(&self, value: &str) -> Result<(), String> {
        let valid = match self {
            SystemProperty::Package => is_package_name(value),
            SystemProperty::VersionCode => value.trim().parse::<u32>().is_ok(),
            SystemProperty::VersionName => !value.is_empty(),
            SystemProperty::MinSdkVersion | SystemProperty::TargetSdkVersion => {
                is_api_level(value)
            }
            SystemProperty::MaxSdkVersion => value.trim().parse::<u32>().is_ok(),
        };
        if valid {
            Ok(())
        } else {
            Err(format!("Invalid value for {}: \"{}\"", self.to_camel_case(), value))
        }
    }

    /// Set the property on `document`, creating `<uses-sdk>` when needed
    pub fn add_to(&self, recorder: &mut ActionRecorder, document: &mut XmlDocument, value: &str) {
        match self {
            SystemProperty::Package => {
                document.set_package(value);
                if let Some(attribute) = document.root.attribute(None, "package") {
                    recorder.record_attribute_action(
                        &document.root,
                        attribute,
                        ActionType::Injected,
                        Some("package override".to_string()),
                    );
                }
            }
            SystemProperty::VersionCode | SystemProperty::VersionName => {
                let attribute = android_attribute(document, self.to_camel_case(), value);
                set_and_record(&mut document.root, attribute, recorder);
            }
            SystemProperty::MinSdkVersion
            | SystemProperty::TargetSdkVersion
            | SystemProperty::MaxSdkVersion => {
                let attribute = android_attribute(document, self.to_camel_case(), value);
                if let Some(uses_sdk) = create_or_get_uses_sdk(document, recorder) {
                    set_and_record(uses_sdk, attribute, recorder);
                }
            }
        }
    }
}

impl fmt::Display for SystemProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_camel_case())
    }
}

fn android_attribute(document: &mut XmlDocument, local: &str, value: &str) -> XmlAttribute {
    let prefix = document.ensure_namespace("android", ANDROID_URI);
    XmlAttribute::new(
        QName::new(Some(&prefix), local),
        Some(ANDROID_URI),
        value,
        document.source.clone(),
    )
}

fn set_and_record(element: &mut XmlElement, attribute: XmlAttribute, recorder: &mut ActionRecorder) {
    recorder.record_attribute_action(element, &attribute, ActionType::Injected, None);
    element.set_attribute(attribute);
}

fn create_or_get_uses_sdk<'d>(
    document: &'d mut XmlDocument,
    recorder: &mut ActionRecorder,
) -> Option<&'d mut XmlElement> {
    let existing = document
        .root
        .children
        .iter()
        .position(|n| matches!(n, XmlNode::Element(e) if e.node_type() == NodeType::UsesSdk));

    let index = match existing {
        Some(index) => index,
        None => {
            let mut uses_sdk = XmlElement::new(
                QName::new(None, NodeType::UsesSdk.xml_name()),
                None,
                document.source.clone(),
            );
            uses_sdk.refresh_keys(None);
            recorder.record_node_action(
                &uses_sdk,
                ActionType::Injected,
                Some("use-sdk injection requested".to_string()),
            );
            document.root.children.insert(0, XmlNode::Element(uses_sdk));
            0
        }
    };
    document.root.children[index].as_element_mut()
}

fn is_package_name(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .map_or(false, |c| c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        })
}

/// Integer API level or a preview codename
fn is_api_level(value: &str) -> bool {
    let value = value.trim();
    let codename = value
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_uppercase())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    value.parse::<u32>().is_ok() || codename
}
