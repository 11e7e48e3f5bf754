use crate::model::NodeType;
use crate::report::{ActionType, MergingReportBuilder};
use crate::xml::{XmlDocument, XmlElement, XmlNode, TOOLS_URI};
use tracing::debug;

/// Drops merged elements that must not reach the final manifest
pub struct ElementsTrimmer;

impl ElementsTrimmer {
    pub fn trim(document: &mut XmlDocument, report: &mut MergingReportBuilder) {
        trim_gl_es_versions(&mut document.root, report);
        remove_tools_elements(&mut document.root, report);
    }
}

/// Parse `0x00020000` style (or plain decimal) OpenGL ES versions
fn gl_es_version(element: &XmlElement) -> Option<u32> {
    if element.android_attribute("name").is_some() {
        return None;
    }
    let raw = element.android_attribute("glEsVersion")?.value.trim().to_string();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn is_required(element: &XmlElement) -> bool {
    element
        .android_attribute("required")
        .map_or(true, |a| a.value.trim() != "false")
}

/// Keep the highest required glEsVersion, plus the highest optional one when
/// it is above the required one.
fn trim_gl_es_versions(root: &mut XmlElement, report: &mut MergingReportBuilder) {
    let versions: Vec<(usize, u32, bool)> = root
        .children
        .iter()
        .enumerate()
        .filter_map(|(i, n)| match n {
            XmlNode::Element(e) if e.node_type() == NodeType::UsesFeature => {
                gl_es_version(e).map(|v| (i, v, is_required(e)))
            }
            _ => None,
        })
        .collect();
    if versions.len() < 2 {
        return;
    }

    let highest = |required: bool| {
        versions
            .iter()
            .filter(|(_, _, r)| *r == required)
            .max_by_key(|(i, v, _)| (*v, std::cmp::Reverse(*i)))
            .copied()
    };
    let required = highest(true);
    let optional = highest(false).filter(|(_, v, _)| required.map_or(true, |(_, r, _)| *v > r));
    let keep: Vec<usize> = [required, optional].iter().flatten().map(|(i, _, _)| *i).collect();

    let mut index = 0;
    root.children.retain(|node| {
        let current = index;
        index += 1;
        let dropped = versions.iter().any(|(i, _, _)| *i == current) && !keep.contains(&current);
        if dropped {
            if let XmlNode::Element(element) = node {
                debug!("Trimming lower glEsVersion at {}", element.location());
                report.action_recorder_mut().record_node_action(
                    element,
                    ActionType::Rejected,
                    Some("glEsVersion lower than the highest declared".to_string()),
                );
            }
        }
        !dropped
    });
}

fn remove_tools_elements(element: &mut XmlElement, report: &mut MergingReportBuilder) {
    element.children.retain(|node| match node {
        XmlNode::Element(child) if child.namespace.as_deref() == Some(TOOLS_URI) => {
            report.action_recorder_mut().record_node_action(
                child,
                ActionType::Rejected,
                Some("tools namespace element".to_string()),
            );
            false
        }
        _ => true,
    });
    for child in element.child_elements_mut() {
        remove_tools_elements(child, report);
    }
}
