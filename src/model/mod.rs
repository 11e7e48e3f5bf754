//! Android manifest model
//!
//! A closed table mapping every known manifest element to how it merges and
//! how its identity (key) is derived. Everything not in the table is
//! [`NodeType::Custom`].

pub mod instructions;

pub use instructions::{AttributeOperation, AttributeReference, NodeOperation};

use crate::xml::{XmlElement, ANDROID_URI};
use serde::Serialize;
use std::fmt;

/// How two same-key elements from different priorities are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeType {
    /// Union of attributes, children merged by key
    Merge,
    /// Only children are merged, attributes of the higher priority element are kept
    MergeChildrenOnly,
    /// Lower priority element is always added unless an identical one exists
    Always,
    /// Higher priority element wins wholesale
    Replace,
    /// Lower priority element is silently dropped
    Ignore,
    /// Same key with differing content is an error
    Conflict,
}

/// How the key of an element is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// At most one per parent
    Singleton,
    /// `android:name`, optionally resolved against the document package
    Name { package_dependent: bool },
    /// First present attribute of the list
    FirstOf(&'static [&'static str]),
    /// All present attributes of the list, joined
    Composite(&'static [&'static str]),
    /// Sorted keys of the action/category/data children
    IntentFilter,
    /// `android:name` when present, structural equality otherwise
    Custom,
}

const DATA_KEY: &[&str] = &[
    "scheme",
    "host",
    "port",
    "path",
    "pathPrefix",
    "pathPattern",
    "mimeType",
];
const PATH_KEY: &[&str] = &["path", "pathPrefix", "pathPattern"];
const SCREEN_KEY: &[&str] = &["screenSize", "screenDensity"];
const USES_FEATURE_KEY: &[&str] = &["name", "glEsVersion"];

/// Known manifest elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Manifest,
    Application,
    Activity,
    ActivityAlias,
    Service,
    Receiver,
    Provider,
    Instrumentation,
    IntentFilter,
    Action,
    Category,
    Data,
    MetaData,
    GrantUriPermission,
    PathPermission,
    Permission,
    PermissionGroup,
    PermissionTree,
    UsesPermission,
    UsesPermissionSdk23,
    UsesFeature,
    UsesLibrary,
    UsesSdk,
    UsesConfiguration,
    SupportsScreens,
    CompatibleScreens,
    Screen,
    SupportsGlTexture,
    Custom,
}

impl NodeType {
    pub const ALL: [NodeType; 28] = [
        NodeType::Manifest,
        NodeType::Application,
        NodeType::Activity,
        NodeType::ActivityAlias,
        NodeType::Service,
        NodeType::Receiver,
        NodeType::Provider,
        NodeType::Instrumentation,
        NodeType::IntentFilter,
        NodeType::Action,
        NodeType::Category,
        NodeType::Data,
        NodeType::MetaData,
        NodeType::GrantUriPermission,
        NodeType::PathPermission,
        NodeType::Permission,
        NodeType::PermissionGroup,
        NodeType::PermissionTree,
        NodeType::UsesPermission,
        NodeType::UsesPermissionSdk23,
        NodeType::UsesFeature,
        NodeType::UsesLibrary,
        NodeType::UsesSdk,
        NodeType::UsesConfiguration,
        NodeType::SupportsScreens,
        NodeType::CompatibleScreens,
        NodeType::Screen,
        NodeType::SupportsGlTexture,
    ];

    /// Element name as it appears in a manifest
    pub fn xml_name(&self) -> &'static str {
        match self {
            NodeType::Manifest => "manifest",
            NodeType::Application => "application",
            NodeType::Activity => "activity",
            NodeType::ActivityAlias => "activity-alias",
            NodeType::Service => "service",
            NodeType::Receiver => "receiver",
            NodeType::Provider => "provider",
            NodeType::Instrumentation => "instrumentation",
            NodeType::IntentFilter => "intent-filter",
            NodeType::Action => "action",
            NodeType::Category => "category",
            NodeType::Data => "data",
            NodeType::MetaData => "meta-data",
            NodeType::GrantUriPermission => "grant-uri-permission",
            NodeType::PathPermission => "path-permission",
            NodeType::Permission => "permission",
            NodeType::PermissionGroup => "permission-group",
            NodeType::PermissionTree => "permission-tree",
            NodeType::UsesPermission => "uses-permission",
            NodeType::UsesPermissionSdk23 => "uses-permission-sdk-23",
            NodeType::UsesFeature => "uses-feature",
            NodeType::UsesLibrary => "uses-library",
            NodeType::UsesSdk => "uses-sdk",
            NodeType::UsesConfiguration => "uses-configuration",
            NodeType::SupportsScreens => "supports-screens",
            NodeType::CompatibleScreens => "compatible-screens",
            NodeType::Screen => "screen",
            NodeType::SupportsGlTexture => "supports-gl-texture",
            NodeType::Custom => "custom",
        }
    }

    /// Classify an element by local name and resolved namespace.
    ///
    /// Elements in a namespace other than none or android are always custom.
    pub fn from_element(local_name: &str, namespace: Option<&str>) -> Self {
        match namespace {
            None => {}
            Some(uri) if uri == ANDROID_URI => {}
            Some(_) => return NodeType::Custom,
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.xml_name() == local_name)
            .unwrap_or(NodeType::Custom)
    }

    pub fn merge_type(&self) -> MergeType {
        match self {
            NodeType::Manifest => MergeType::MergeChildrenOnly,
            NodeType::IntentFilter => MergeType::Always,
            NodeType::Permission => MergeType::Conflict,
            NodeType::CompatibleScreens => MergeType::Replace,
            NodeType::UsesConfiguration => MergeType::Ignore,
            _ => MergeType::Merge,
        }
    }

    pub fn key_spec(&self) -> KeySpec {
        match self {
            NodeType::Manifest
            | NodeType::Application
            | NodeType::UsesSdk
            | NodeType::UsesConfiguration
            | NodeType::SupportsScreens
            | NodeType::CompatibleScreens => KeySpec::Singleton,
            NodeType::Activity
            | NodeType::ActivityAlias
            | NodeType::Service
            | NodeType::Receiver
            | NodeType::Provider
            | NodeType::Instrumentation => KeySpec::Name {
                package_dependent: true,
            },
            NodeType::Action
            | NodeType::Category
            | NodeType::MetaData
            | NodeType::Permission
            | NodeType::PermissionGroup
            | NodeType::PermissionTree
            | NodeType::UsesPermission
            | NodeType::UsesPermissionSdk23
            | NodeType::UsesLibrary
            | NodeType::SupportsGlTexture => KeySpec::Name {
                package_dependent: false,
            },
            NodeType::UsesFeature => KeySpec::FirstOf(USES_FEATURE_KEY),
            NodeType::Data => KeySpec::Composite(DATA_KEY),
            NodeType::GrantUriPermission | NodeType::PathPermission => {
                KeySpec::Composite(PATH_KEY)
            }
            NodeType::Screen => KeySpec::Composite(SCREEN_KEY),
            NodeType::IntentFilter => KeySpec::IntentFilter,
            NodeType::Custom => KeySpec::Custom,
        }
    }

    /// Whether `android:name` holds a class name relative to the package
    pub fn has_package_dependent_name(&self) -> bool {
        matches!(
            self.key_spec(),
            KeySpec::Name {
                package_dependent: true
            }
        ) || *self == NodeType::Application
    }

    /// Key attributes that must be present for the element to be mergeable
    pub fn required_key_attributes(&self) -> &'static [&'static str] {
        match self.key_spec() {
            KeySpec::Name { .. } => &["name"],
            KeySpec::FirstOf(names) => names,
            _ => &[],
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.xml_name())
    }
}

/// Identity of an element across documents, printed as `type#key`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(type_name: &str, key: Option<&str>) -> Self {
        match key {
            Some(key) => NodeKey(format!("{}#{}", type_name, key)),
            None => NodeKey(type_name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the key of `element`. Child keys must already be up to date.
pub fn compute_key(element: &XmlElement, package: Option<&str>) -> Option<String> {
    let android = |local: &str| android_value(element, local);

    match element.node_type().key_spec() {
        KeySpec::Singleton => None,
        KeySpec::Name { package_dependent } => {
            let name = android("name")?;
            if package_dependent {
                Some(resolve_class_name(name, package))
            } else {
                Some(name.to_string())
            }
        }
        KeySpec::FirstOf(names) => names.iter().find_map(|n| android(n)).map(str::to_string),
        KeySpec::Composite(names) => {
            let parts: Vec<String> = names
                .iter()
                .filter_map(|n| android(n).map(|v| format!("{}={}", n, v)))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(","))
            }
        }
        KeySpec::IntentFilter => {
            let mut parts: Vec<String> = element
                .child_elements()
                .filter(|c| {
                    matches!(
                        c.node_type(),
                        NodeType::Action | NodeType::Category | NodeType::Data
                    )
                })
                .map(|c| c.node_key().to_string())
                .collect();
            if parts.is_empty() {
                return None;
            }
            parts.sort();
            Some(parts.join("+"))
        }
        KeySpec::Custom => android("name").map(str::to_string),
    }
}

fn android_value<'a>(element: &'a XmlElement, local: &str) -> Option<&'a str> {
    element.android_attribute(local).map(|a| a.value.as_str())
}

/// Resolve a class name, handling relative names like ".MainActivity"
pub fn resolve_class_name(name: &str, package: Option<&str>) -> String {
    match package {
        Some(pkg) if name.starts_with('.') => format!("{}{}", pkg, name),
        Some(pkg) if !name.contains('.') => format!("{}.{}", pkg, name),
        _ => name.to_string(),
    }
}
