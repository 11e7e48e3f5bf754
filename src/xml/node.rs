use super::position::{SourceFile, SourceLocation, SourcePosition};
use super::{ANDROID_URI, TOOLS_URI};
use crate::model::{self, NodeKey, NodeType};
use std::fmt;
use std::sync::Arc;

/// A possibly prefixed XML name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(prefix: Option<&str>, local: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self::new(Some(prefix), local),
            None => Self::new(None, raw),
        }
    }

    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// An `xmlns` or `xmlns:prefix` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// None for the default namespace
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct XmlAttribute {
    pub name: QName,
    /// Resolved namespace URI
    pub namespace: Option<String>,
    pub value: String,
    pub position: SourcePosition,
    /// File this attribute was declared in
    pub origin: Arc<SourceFile>,
}

impl XmlAttribute {
    pub fn new(
        name: QName,
        namespace: Option<&str>,
        value: impl Into<String>,
        origin: Arc<SourceFile>,
    ) -> Self {
        Self {
            name,
            namespace: namespace.map(str::to_string),
            value: value.into(),
            position: SourcePosition::UNKNOWN,
            origin,
        }
    }

    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.name.local == local && self.namespace.as_deref() == namespace
    }

    pub fn is_tools(&self) -> bool {
        self.namespace.as_deref() == Some(TOOLS_URI)
    }

    /// Same attribute identity, ignoring the prefix used to spell it
    pub fn same_name(&self, other: &XmlAttribute) -> bool {
        match (&self.namespace, &other.namespace) {
            (None, None) => self.name == other.name,
            (a, b) => a == b && self.name.local == other.name.local,
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.origin.clone(), self.position)
    }
}

/// Character data, comment or CDATA content
#[derive(Debug, Clone)]
pub struct XmlText {
    pub value: String,
    pub position: SourcePosition,
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(XmlText),
    CData(XmlText),
    Comment(XmlText),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn position(&self) -> SourcePosition {
        match self {
            XmlNode::Element(e) => e.position,
            XmlNode::Text(t) | XmlNode::CData(t) | XmlNode::Comment(t) => t.position,
        }
    }

    /// Whitespace-only text carries no content
    pub fn is_blank_text(&self) -> bool {
        matches!(self, XmlNode::Text(t) if t.value.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct XmlElement {
    pub name: QName,
    /// Resolved namespace URI of the element name
    pub namespace: Option<String>,
    /// Namespace declarations made on this element
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
    pub position: SourcePosition,
    /// File this element was declared in
    pub origin: Arc<SourceFile>,
    node_type: NodeType,
    key: Option<String>,
}

impl XmlElement {
    pub fn new(name: QName, namespace: Option<&str>, origin: Arc<SourceFile>) -> Self {
        let node_type = NodeType::from_element(&name.local, namespace);
        Self {
            name,
            namespace: namespace.map(str::to_string),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            position: SourcePosition::UNKNOWN,
            origin,
            node_type,
            key: None,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Printable identity, `type#key`
    pub fn node_key(&self) -> NodeKey {
        let type_name = match self.node_type {
            NodeType::Custom => self.name.qualified(),
            known => known.xml_name().to_string(),
        };
        NodeKey::new(&type_name, self.key())
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.origin.clone(), self.position)
    }

    /// Recompute keys for this subtree, children first
    pub fn refresh_keys(&mut self, package: Option<&str>) {
        for child in self.child_elements_mut() {
            child.refresh_keys(package);
        }
        self.key = model::compute_key(self, package);
    }

    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.is(namespace, local))
    }

    pub fn android_attribute(&self, local: &str) -> Option<&XmlAttribute> {
        self.attribute(Some(ANDROID_URI), local)
    }

    pub fn tools_attribute(&self, local: &str) -> Option<&XmlAttribute> {
        self.attribute(Some(TOOLS_URI), local)
    }

    /// Attribute with the same identity as `other`
    pub fn find_attribute(&self, other: &XmlAttribute) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.same_name(other))
    }

    /// Insert `attribute`, replacing the value of an existing one with the same name
    pub fn set_attribute(&mut self, attribute: XmlAttribute) {
        match self.attributes.iter_mut().find(|a| a.same_name(&attribute)) {
            Some(existing) => {
                existing.value = attribute.value;
                existing.origin = attribute.origin;
                existing.position = attribute.position;
            }
            None => self.attributes.push(attribute),
        }
    }

    pub fn remove_attribute(&mut self, namespace: Option<&str>, local: &str) -> Option<XmlAttribute> {
        let index = self.attributes.iter().position(|a| a.is(namespace, local))?;
        Some(self.attributes.remove(index))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    /// Direct child of the given type and key
    pub fn find_child(&self, node_type: NodeType, key: Option<&str>) -> Option<&XmlElement> {
        self.child_elements()
            .find(|c| c.node_type == node_type && c.key() == key)
    }

    /// Trimmed non-blank character content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.value.trim()),
                _ => None,
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Structural comparison, returning a description of the first difference.
    ///
    /// Ignores comments, blank text, tools attributes, attribute order and
    /// sibling order.
    pub fn compare_to(&self, other: &XmlElement) -> Option<String> {
        if self.node_type != other.node_type
            || self.namespace != other.namespace
            || self.name.local != other.name.local
        {
            return Some(format!(
                "Element {} is not the same as {}",
                self.node_key(),
                other.node_key()
            ));
        }

        for attribute in self.attributes.iter().filter(|a| !a.is_tools()) {
            match other.find_attribute(attribute) {
                None => {
                    return Some(format!(
                        "Attribute {} from {} is missing at {}",
                        attribute.name,
                        attribute.location(),
                        other.location()
                    ))
                }
                Some(theirs) if theirs.value != attribute.value => {
                    return Some(format!(
                        "Attribute {} value=({}) at {} differs from value=({}) at {}",
                        attribute.name,
                        attribute.value,
                        attribute.location(),
                        theirs.value,
                        theirs.location()
                    ))
                }
                Some(_) => {}
            }
        }
        for attribute in other.attributes.iter().filter(|a| !a.is_tools()) {
            if self.find_attribute(attribute).is_none() {
                return Some(format!(
                    "Attribute {} from {} is missing at {}",
                    attribute.name,
                    attribute.location(),
                    self.location()
                ));
            }
        }

        let mut remaining: Vec<&XmlElement> = other.child_elements().collect();
        for child in self.child_elements() {
            match remaining.iter().position(|o| child.compare_to(o).is_none()) {
                Some(index) => {
                    remaining.remove(index);
                }
                None => {
                    return Some(format!(
                        "Child {} from {} has no equivalent under {}",
                        child.node_key(),
                        child.location(),
                        other.location()
                    ))
                }
            }
        }
        if let Some(extra) = remaining.first() {
            return Some(format!(
                "Child {} from {} has no equivalent under {}",
                extra.node_key(),
                extra.location(),
                self.location()
            ));
        }

        if self.text() != other.text() {
            return Some(format!(
                "Text content of {} differs from {}",
                self.location(),
                other.location()
            ));
        }
        None
    }
}
