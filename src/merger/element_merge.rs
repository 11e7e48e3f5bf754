//! Pairwise merge of a higher priority document with a lower priority one.
//!
//! The higher priority tree is cloned and the lower priority content folded
//! into the clone; neither input is modified. Every decision lands in the
//! report's action recorder, conflicts land in the report as errors.

use super::selector::SelectorResolver;
use crate::model::{AttributeOperation, MergeType, NodeOperation, NodeType};
use crate::report::{ActionType, MergingReportBuilder};
use crate::xml::{SourceKind, XmlAttribute, XmlDocument, XmlElement, XmlNode};
use tracing::{debug, trace};

/// State shared by one pairwise merge
pub struct MergeContext<'a> {
    pub selectors: &'a SelectorResolver,
    pub report: &'a mut MergingReportBuilder,
}

/// Merge `lower` into a copy of `higher`.
///
/// Errors are recorded in the report; callers check `has_errors()` before
/// using the result.
pub fn merge_documents(higher: &XmlDocument, lower: &XmlDocument, ctx: &mut MergeContext<'_>) -> XmlDocument {
    let mut merged = higher.clone();
    let mut lower = lower.clone();
    merged.adopt_namespaces_of(&mut lower);

    debug!("Merging {} into {}", lower.source, merged.source);
    merge_element(&mut merged.root, &lower.root, ctx);
    merged
}

fn merge_element(higher: &mut XmlElement, lower: &XmlElement, ctx: &mut MergeContext<'_>) {
    let operation = higher.operation_type();
    let applies = ctx.selectors.applies_to(higher.selector(), lower);

    match operation {
        Some(NodeOperation::Strict) => {
            if let Some(difference) = higher.compare_to(lower) {
                ctx.report.add_error(
                    format!(
                        "Element {} at {} is tagged with tools:node=\"strict\", yet element at {} is different: {}",
                        higher.node_key(),
                        higher.location(),
                        lower.location(),
                        difference
                    ),
                    Some(higher.location()),
                );
                return;
            }
        }
        Some(op @ (NodeOperation::Replace | NodeOperation::Remove | NodeOperation::RemoveAll)) if applies => {
            debug!("{} rejected by tools:node=\"{}\"", lower.node_key(), op);
            ctx.report.action_recorder_mut().record_node_action(
                lower,
                ActionType::Rejected,
                Some(format!("tools:node=\"{}\" at {}", op, higher.location())),
            );
            return;
        }
        _ => {}
    }

    match higher.node_type().merge_type() {
        MergeType::Conflict => {
            match higher.compare_to(lower) {
                Some(difference) => {
                    ctx.report.add_error(
                        format!(
                            "Element {} at {} duplicated with element declared at {}: {}",
                            higher.node_key(),
                            higher.location(),
                            lower.location(),
                            difference
                        ),
                        Some(higher.location()),
                    );
                }
                None => ctx
                    .report
                    .action_recorder_mut()
                    .record_node_action(lower, ActionType::Merged, None),
            }
            return;
        }
        MergeType::Replace => {
            ctx.report.action_recorder_mut().record_node_action(
                lower,
                ActionType::Rejected,
                Some(format!("replaced by {}", higher.location())),
            );
            return;
        }
        MergeType::Ignore => {
            debug!("Ignoring {} from {}", lower.node_key(), lower.location());
            return;
        }
        // Root attributes come from the application's own manifests only
        MergeType::MergeChildrenOnly
            if matches!(lower.origin.kind, SourceKind::Main | SourceKind::Overlay) =>
        {
            merge_attributes(higher, lower, ctx)
        }
        MergeType::MergeChildrenOnly => {}
        MergeType::Merge | MergeType::Always => merge_attributes(higher, lower, ctx),
    }

    if operation != Some(NodeOperation::MergeOnlyAttributes) {
        merge_children(higher, lower, ctx);
    }
    ctx.report
        .action_recorder_mut()
        .record_node_action(lower, ActionType::Merged, None);
}

enum AttributeDecision {
    Keep,
    Reject(String),
    Conflict(String),
    Add,
}

fn merge_attributes(higher: &mut XmlElement, lower: &XmlElement, ctx: &mut MergeContext<'_>) {
    // Instructions written by the application itself keep applying to
    // libraries merged later, even below an overlay.
    if lower.origin.kind != SourceKind::Library {
        for instruction in lower.attributes.iter().filter(|a| a.is_tools()) {
            if higher.find_attribute(instruction).is_none() {
                higher.attributes.push(instruction.clone());
            }
        }
    }

    for attribute in lower.attributes.iter().filter(|a| !a.is_tools()) {
        let decision = decide_attribute(higher, attribute);
        let recorder = ctx.report.action_recorder_mut();
        match decision {
            AttributeDecision::Keep => trace!("{} {} unchanged", lower.node_key(), attribute.name),
            AttributeDecision::Reject(reason) => {
                trace!("{} {} rejected: {}", lower.node_key(), attribute.name, reason);
                recorder.record_attribute_action(lower, attribute, ActionType::Rejected, Some(reason));
            }
            AttributeDecision::Add => {
                recorder.record_attribute_action(lower, attribute, ActionType::Added, None);
                higher.attributes.push(attribute.clone());
            }
            AttributeDecision::Conflict(message) => {
                ctx.report.add_error(message, Some(attribute.location()));
            }
        }
    }
}

fn decide_attribute(higher: &XmlElement, attribute: &XmlAttribute) -> AttributeDecision {
    let Some(existing) = higher.find_attribute(attribute) else {
        return match higher.attribute_operation(attribute) {
            Some(AttributeOperation::Remove) => AttributeDecision::Reject(format!(
                "tools:remove at {}",
                higher.location()
            )),
            _ => AttributeDecision::Add,
        };
    };

    if existing.value == attribute.value {
        return AttributeDecision::Keep;
    }

    match higher.attribute_operation(existing) {
        Some(AttributeOperation::Strict) => AttributeDecision::Conflict(format!(
            "Attribute {}@{} value=({}) from {} is also present at {} value=({}) and tools:strict forbids overriding it",
            higher.node_type(),
            attribute.name,
            attribute.value,
            attribute.location(),
            existing.location(),
            existing.value
        )),
        Some(AttributeOperation::Replace) => AttributeDecision::Reject(format!(
            "tools:replace at {}",
            higher.location()
        )),
        Some(AttributeOperation::Remove) => AttributeDecision::Reject(format!(
            "tools:remove at {}",
            higher.location()
        )),
        None => AttributeDecision::Reject(format!(
            "value=({}) overridden by value=({}) at {}",
            attribute.value,
            existing.value,
            existing.location()
        )),
    }
}

fn merge_children(higher: &mut XmlElement, lower: &XmlElement, ctx: &mut MergeContext<'_>) {
    let mut comments: Vec<XmlNode> = Vec::new();
    for node in &lower.children {
        match node {
            XmlNode::Comment(_) => comments.push(node.clone()),
            XmlNode::Element(child) => {
                let leading = std::mem::take(&mut comments);
                merge_child(higher, child, leading, ctx);
            }
            _ => {}
        }
    }
}

fn merge_child(
    higher: &mut XmlElement,
    lower_child: &XmlElement,
    comments: Vec<XmlNode>,
    ctx: &mut MergeContext<'_>,
) {
    let node_type = lower_child.node_type();

    if node_type.merge_type() == MergeType::Always {
        if higher.child_elements().any(|c| c.compare_to(lower_child).is_none()) {
            ctx.report
                .action_recorder_mut()
                .record_node_action(lower_child, ActionType::Merged, None);
        } else {
            append(higher, lower_child, comments, ctx);
        }
        return;
    }

    let selectors = ctx.selectors;
    let target = higher.child_elements_mut().find(|c| {
        is_counterpart(c, lower_child) && !bypasses(c, lower_child, selectors)
    });
    if let Some(target) = target {
        merge_element(target, lower_child, ctx);
        return;
    }

    let remover = higher.child_elements().find(|c| {
        c.node_type() == node_type
            && c.operation_type() == Some(NodeOperation::RemoveAll)
            && (node_type != NodeType::Custom || c.name.local == lower_child.name.local)
            && selectors.applies_to(c.selector(), lower_child)
    });
    if let Some(remover) = remover {
        ctx.report.action_recorder_mut().record_node_action(
            lower_child,
            ActionType::Rejected,
            Some(format!("tools:node=\"removeAll\" at {}", remover.location())),
        );
        return;
    }

    append(higher, lower_child, comments, ctx);
}

/// Same identity in both documents
fn is_counterpart(candidate: &XmlElement, lower: &XmlElement) -> bool {
    if candidate.node_type() != lower.node_type() || candidate.key() != lower.key() {
        return false;
    }
    if lower.node_type() != NodeType::Custom {
        return true;
    }
    candidate.namespace == lower.namespace
        && candidate.name.local == lower.name.local
        && (lower.key().is_some() || candidate.compare_to(lower).is_none())
}

/// A removal scoped by a selector that does not name the lower element's library
fn bypasses(candidate: &XmlElement, lower: &XmlElement, selectors: &SelectorResolver) -> bool {
    candidate.operation_type().map_or(false, |op| op.is_removal())
        && !selectors.applies_to(candidate.selector(), lower)
}

fn append(higher: &mut XmlElement, lower_child: &XmlElement, comments: Vec<XmlNode>, ctx: &mut MergeContext<'_>) {
    debug!("Adding {} from {}", lower_child.node_key(), lower_child.location());
    higher.children.extend(comments);
    higher.children.push(XmlNode::Element(lower_child.clone()));
    ctx.report
        .action_recorder_mut()
        .record_default_node_action(lower_child);
}
