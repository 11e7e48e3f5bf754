// tools: namespace merge instructions attached to manifest elements

use crate::xml::{XmlAttribute, XmlElement, ANDROID_URI};
use serde::Serialize;
use std::fmt;

/// Element level instruction given with `tools:node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeOperation {
    Merge,
    MergeOnlyAttributes,
    Remove,
    RemoveAll,
    Replace,
    Strict,
}

impl NodeOperation {
    pub const ALL: [NodeOperation; 6] = [
        NodeOperation::Merge,
        NodeOperation::MergeOnlyAttributes,
        NodeOperation::Remove,
        NodeOperation::RemoveAll,
        NodeOperation::Replace,
        NodeOperation::Strict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeOperation::Merge => "merge",
            NodeOperation::MergeOnlyAttributes => "merge-only-attributes",
            NodeOperation::Remove => "remove",
            NodeOperation::RemoveAll => "removeAll",
            NodeOperation::Replace => "replace",
            NodeOperation::Strict => "strict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == value)
    }

    /// Operations that take the element out of the merged document
    pub fn is_removal(&self) -> bool {
        matches!(self, NodeOperation::Remove | NodeOperation::RemoveAll)
    }
}

impl fmt::Display for NodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute level instruction, each a `tools:` attribute listing names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeOperation {
    Replace,
    Remove,
    Strict,
}

impl AttributeOperation {
    pub const ALL: [AttributeOperation; 3] = [
        AttributeOperation::Replace,
        AttributeOperation::Remove,
        AttributeOperation::Strict,
    ];

    /// Local name of the carrying attribute in the tools namespace
    pub fn tools_name(&self) -> &'static str {
        match self {
            AttributeOperation::Replace => "replace",
            AttributeOperation::Remove => "remove",
            AttributeOperation::Strict => "strict",
        }
    }
}

impl fmt::Display for AttributeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tools_name())
    }
}

/// One entry of a `tools:replace="android:label,android:icon"` list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeReference {
    pub prefix: Option<String>,
    pub local: String,
}

impl AttributeReference {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            None => Self {
                prefix: None,
                local: raw.to_string(),
            },
        })
    }

    /// Unprefixed references match android or unqualified attributes;
    /// prefixed references match on the attribute's own prefix or the
    /// android namespace for `android:`.
    pub fn matches(&self, attribute: &XmlAttribute) -> bool {
        if attribute.name.local != self.local {
            return false;
        }
        match self.prefix.as_deref() {
            None => matches!(attribute.namespace.as_deref(), None | Some(ANDROID_URI)),
            Some("android") => attribute.namespace.as_deref() == Some(ANDROID_URI),
            Some(prefix) => attribute.name.prefix.as_deref() == Some(prefix),
        }
    }
}

impl fmt::Display for AttributeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl XmlElement {
    /// Parsed `tools:node`, None when absent or unrecognized
    pub fn operation_type(&self) -> Option<NodeOperation> {
        self.tools_attribute("node")
            .and_then(|a| NodeOperation::parse(a.value.trim()))
    }

    /// Library package named by `tools:selector`
    pub fn selector(&self) -> Option<&str> {
        self.tools_attribute("selector")
            .map(|a| a.value.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn attribute_references(&self, op: AttributeOperation) -> Vec<AttributeReference> {
        self.tools_attribute(op.tools_name())
            .map(|a| a.value.split(',').filter_map(AttributeReference::parse).collect())
            .unwrap_or_default()
    }

    /// First attribute instruction naming `attribute`, strict taking precedence
    pub fn attribute_operation(&self, attribute: &XmlAttribute) -> Option<AttributeOperation> {
        [
            AttributeOperation::Strict,
            AttributeOperation::Replace,
            AttributeOperation::Remove,
        ]
        .into_iter()
        .find(|op| {
            self.attribute_references(*op)
                .iter()
                .any(|r| r.matches(attribute))
        })
    }
}
