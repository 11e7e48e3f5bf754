use crate::model::AttributeOperation;
use crate::xml::{XmlDocument, XmlElement, XmlNode, TOOLS_URI};
use tracing::debug;

/// Strips merge instructions from a final application manifest.
///
/// Elements marked `tools:node="remove"`/`"removeAll"` go away, attributes
/// named by `tools:remove` are dropped, then every tools attribute and the
/// tools namespace declaration are removed.
pub struct ToolsInstructionsCleaner;

impl ToolsInstructionsCleaner {
    pub fn clean(document: &mut XmlDocument) {
        clean_element(&mut document.root);
        document.remove_namespace(TOOLS_URI);
    }
}

fn clean_element(element: &mut XmlElement) {
    element.children.retain(|node| match node {
        XmlNode::Element(child) if child.operation_type().map_or(false, |op| op.is_removal()) => {
            debug!("Removing {} marked for removal at {}", child.node_key(), child.location());
            false
        }
        _ => true,
    });

    let removed = element.attribute_references(AttributeOperation::Remove);
    element
        .attributes
        .retain(|a| !a.is_tools() && !removed.iter().any(|r| r.matches(a)));

    for child in element.child_elements_mut() {
        clean_element(child);
    }
}
