//! Action recording
//!
//! Every decision the merger takes (adding, merging, rejecting or injecting a
//! node or attribute) is appended here. The log is write-only while merging
//! and only read back for reports and post-merge checks.

use crate::model::NodeKey;
use crate::xml::{SourceLocation, XmlAttribute, XmlElement};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// Element or attribute taken from a lower priority document
    Added,
    /// Element merged with a same-key element
    Merged,
    /// Lower priority element or attribute discarded
    Rejected,
    /// Value supplied by the invocation rather than a manifest
    Injected,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Added => "ADDED",
            ActionType::Merged => "MERGED",
            ActionType::Rejected => "REJECTED",
            ActionType::Injected => "INJECTED",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub action_type: ActionType,
    pub location: SourceLocation,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttributeRecord {
    pub action_type: ActionType,
    pub location: SourceLocation,
    pub reason: Option<String>,
}

/// History of one node key
#[derive(Debug, Clone, Default)]
pub struct DecisionTree {
    pub node_records: Vec<NodeRecord>,
    /// Keyed by qualified attribute name
    pub attribute_records: BTreeMap<String, Vec<AttributeRecord>>,
}

/// Mutable side of the action log, owned by the report builder
#[derive(Debug, Default)]
pub struct ActionRecorder {
    records: BTreeMap<NodeKey, DecisionTree>,
}

impl ActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_node_action(
        &mut self,
        element: &XmlElement,
        action_type: ActionType,
        reason: Option<String>,
    ) {
        self.records
            .entry(element.node_key())
            .or_default()
            .node_records
            .push(NodeRecord {
                action_type,
                location: element.location(),
                reason,
            });
    }

    pub fn record_attribute_action(
        &mut self,
        element: &XmlElement,
        attribute: &XmlAttribute,
        action_type: ActionType,
        reason: Option<String>,
    ) {
        self.records
            .entry(element.node_key())
            .or_default()
            .attribute_records
            .entry(attribute.name.qualified())
            .or_default()
            .push(AttributeRecord {
                action_type,
                location: attribute.location(),
                reason,
            });
    }

    /// Record `element` and its subtree as ADDED, skipping nodes that
    /// already have a history.
    pub fn record_default_node_action(&mut self, element: &XmlElement) {
        let key = element.node_key();
        if !self.records.contains_key(&key) {
            self.record_node_action(element, ActionType::Added, None);
            for attribute in element.attributes.iter().filter(|a| !a.is_tools()) {
                self.record_attribute_action(element, attribute, ActionType::Added, None);
            }
        }
        for child in element.child_elements() {
            self.record_default_node_action(child);
        }
    }

    pub fn node_records(&self, key: &NodeKey) -> &[NodeRecord] {
        self.records
            .get(key)
            .map(|t| t.node_records.as_slice())
            .unwrap_or_default()
    }

    pub fn attribute_records(&self, key: &NodeKey, attribute: &str) -> &[AttributeRecord] {
        self.records
            .get(key)
            .and_then(|t| t.attribute_records.get(attribute))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn build(self) -> Actions {
        Actions {
            records: self.records,
        }
    }
}

/// Frozen action log attached to a finished report
#[derive(Debug, Clone, Default)]
pub struct Actions {
    records: BTreeMap<NodeKey, DecisionTree>,
}

impl Actions {
    pub fn node_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.records.keys()
    }

    pub fn decision_tree(&self, key: &NodeKey) -> Option<&DecisionTree> {
        self.records.get(key)
    }

    pub fn node_records(&self, key: &NodeKey) -> &[NodeRecord] {
        self.records
            .get(key)
            .map(|t| t.node_records.as_slice())
            .unwrap_or_default()
    }

    pub fn attribute_records(&self, key: &NodeKey, attribute: &str) -> &[AttributeRecord] {
        self.records
            .get(key)
            .and_then(|t| t.attribute_records.get(attribute))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Human readable history of every node and attribute
    pub fn blame(&self, simple_filenames: bool) -> String {
        let mut out = String::new();
        for (key, tree) in &self.records {
            out.push_str(key.as_str());
            out.push('\n');
            for record in &tree.node_records {
                out.push_str(&format_line(
                    record.action_type,
                    &record.location,
                    record.reason.as_deref(),
                    simple_filenames,
                ));
            }
            for (name, records) in &tree.attribute_records {
                out.push('\t');
                out.push_str(name);
                out.push('\n');
                for record in records {
                    out.push_str("\t\t");
                    out.push_str(&format_line(
                        record.action_type,
                        &record.location,
                        record.reason.as_deref(),
                        simple_filenames,
                    ));
                }
            }
        }
        out
    }
}

fn format_line(
    action_type: ActionType,
    location: &SourceLocation,
    reason: Option<&str>,
    simple: bool,
) -> String {
    match reason {
        Some(reason) => format!("{} from {} {}\n", action_type, location.describe(simple), reason),
        None => format!("{} from {}\n", action_type, location.describe(simple)),
    }
}
