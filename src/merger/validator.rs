// Document checks run before each merge step and after the final merge

use super::selector::{KeyResolver, SelectorResolver};
use crate::model::{AttributeOperation, MergeType, NodeOperation, NodeType};
use crate::report::{ActionType, MergingReportBuilder};
use crate::xml::{XmlDocument, XmlElement};
use std::collections::HashMap;

/// Checks a loaded document before it is merged
pub struct PreValidator;

impl PreValidator {
    pub fn validate(
        document: &XmlDocument,
        selectors: &SelectorResolver,
        report: &mut MergingReportBuilder,
    ) {
        let root = &document.root;
        if root.node_type() != NodeType::Manifest {
            report.add_error(
                format!(
                    "Expected root element <manifest> but found <{}> in {}",
                    root.name, document.source
                ),
                Some(root.location()),
            );
            return;
        }
        validate_element(root, selectors, report);
    }
}

fn validate_element(element: &XmlElement, selectors: &SelectorResolver, report: &mut MergingReportBuilder) {
    if let Some(node) = element.tools_attribute("node") {
        if NodeOperation::parse(node.value.trim()).is_none() {
            report.add_error(
                format!(
                    "Invalid instruction tools:node=\"{}\" at {}, expected one of {}",
                    node.value,
                    node.location(),
                    NodeOperation::ALL.map(|op| op.as_str()).join(", ")
                ),
                Some(node.location()),
            );
        }
    }

    if let Some(selector) = element.selector() {
        if selectors.resolve(selector).is_none() {
            report.add_error(
                format!(
                    "tools:selector=\"{}\" at {} is not a valid library identifier, valid identifiers are: {}",
                    selector,
                    element.location(),
                    selectors.keys().join(",")
                ),
                Some(element.location()),
            );
        }
    }

    for op in [AttributeOperation::Replace, AttributeOperation::Strict] {
        for reference in element.attribute_references(op) {
            if !element.attributes.iter().any(|a| reference.matches(a)) {
                let position = element
                    .tools_attribute(op.tools_name())
                    .map(|a| a.position)
                    .unwrap_or(element.position);
                report.add_error(
                    format!(
                        "tools:{} specified at line:{} for attribute {}, but no new value specified",
                        op.tools_name(),
                        position.start_line,
                        reference
                    ),
                    Some(element.location()),
                );
            }
        }
    }

    let required = element.node_type().required_key_attributes();
    if !required.is_empty()
        && element.operation_type() != Some(NodeOperation::RemoveAll)
        && !required.iter().any(|name| element.android_attribute(name).is_some())
    {
        report.add_error(
            format!(
                "Missing 'android:{}' key attribute on element {} at {}",
                required.join("' or 'android:"),
                element.name,
                element.location()
            ),
            Some(element.location()),
        );
    }

    for child in element.child_elements() {
        validate_element(child, selectors, report);
    }
}

/// Checks the fully merged document
pub struct PostValidator;

impl PostValidator {
    pub fn validate(document: &XmlDocument, report: &mut MergingReportBuilder) {
        check_duplicates(&document.root, report);
        check_version_code(document, report);
        check_sdk_versions(document, report);
        check_unused_instructions(&document.root, report);
    }
}

fn check_duplicates(element: &XmlElement, report: &mut MergingReportBuilder) {
    let mut seen: HashMap<(NodeType, Option<&str>), &XmlElement> = HashMap::new();
    for child in element.child_elements() {
        let node_type = child.node_type();
        let skipped = matches!(node_type, NodeType::Custom)
            || node_type.merge_type() == MergeType::Always
            || child.operation_type().map_or(false, |op| op.is_removal());
        if skipped {
            continue;
        }
        match seen.get(&(node_type, child.key())) {
            Some(first) => match first.compare_to(child) {
                Some(difference) => {
                    report.add_error(
                        format!(
                            "Element {} at {} duplicated with element declared at {}: {}",
                            child.node_key(),
                            child.location(),
                            first.location(),
                            difference
                        ),
                        Some(child.location()),
                    );
                }
                None => {
                    report.add_warning(
                        format!(
                            "Element {} at {} duplicated with element declared at {}",
                            child.node_key(),
                            child.location(),
                            first.location()
                        ),
                        Some(child.location()),
                    );
                }
            },
            None => {
                seen.insert((node_type, child.key()), child);
            }
        }
    }

    for child in element.child_elements() {
        check_duplicates(child, report);
    }
}

fn check_version_code(document: &XmlDocument, report: &mut MergingReportBuilder) {
    if let Some(code) = document.root.android_attribute("versionCode") {
        if !code.value.contains("${") && code.value.trim().parse::<u32>().is_err() {
            report.add_error(
                format!(
                    "Attribute android:versionCode value=({}) at {} is not a valid integer",
                    code.value,
                    code.location()
                ),
                Some(code.location()),
            );
        }
    }
}

fn check_sdk_versions(document: &XmlDocument, report: &mut MergingReportBuilder) {
    let Some(uses_sdk) = document.root.find_child(NodeType::UsesSdk, None) else {
        return;
    };
    let level = |name: &str| {
        uses_sdk
            .android_attribute(name)
            .and_then(|a| a.value.trim().parse::<u32>().ok())
    };
    if let (Some(min), Some(target)) = (level("minSdkVersion"), level("targetSdkVersion")) {
        if min > target {
            report.add_warning(
                format!(
                    "minSdkVersion ({}) is greater than targetSdkVersion ({}) at {}",
                    min,
                    target,
                    uses_sdk.location()
                ),
                Some(uses_sdk.location()),
            );
        }
    }
}

/// Removal, replacement and attribute replacement instructions that never
/// rejected anything
fn check_unused_instructions(element: &XmlElement, report: &mut MergingReportBuilder) {
    let key = element.node_key();

    if let Some(op @ (NodeOperation::Remove | NodeOperation::Replace)) = element.operation_type() {
        let used = report
            .action_recorder()
            .node_records(&key)
            .iter()
            .any(|r| r.action_type == ActionType::Rejected);
        if !used {
            report.add_warning(
                format!(
                    "{} was tagged at {} to {}, but no other declaration present",
                    key,
                    element.location(),
                    op
                ),
                Some(element.location()),
            );
        }
    }

    for reference in element.attribute_references(AttributeOperation::Replace) {
        let Some(attribute) = element.attributes.iter().find(|a| reference.matches(a)) else {
            continue;
        };
        let used = report
            .action_recorder()
            .attribute_records(&key, &attribute.name.qualified())
            .iter()
            .any(|r| r.action_type == ActionType::Rejected);
        if !used {
            report.add_warning(
                format!(
                    "{} at {} was tagged to replace other declarations but no other declaration present",
                    reference,
                    element.location()
                ),
                Some(element.location()),
            );
        }
    }

    for child in element.child_elements() {
        check_unused_instructions(child, report);
    }
}
