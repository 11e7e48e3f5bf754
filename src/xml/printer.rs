// Pretty printer producing the merged manifest text

use super::document::XmlDocument;
use super::node::{XmlElement, XmlNode};

const INDENT: &str = "    ";

pub fn print_document(document: &XmlDocument) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    print_element(&document.root, 0, &mut out);
    out
}

fn print_element(element: &XmlElement, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    let name = element.name.qualified();
    out.push_str(&indent);
    out.push('<');
    out.push_str(&name);

    let mut items: Vec<(String, &str)> = element
        .namespaces
        .iter()
        .map(|d| match &d.prefix {
            Some(prefix) => (format!("xmlns:{}", prefix), d.uri.as_str()),
            None => ("xmlns".to_string(), d.uri.as_str()),
        })
        .collect();
    items.extend(
        element
            .attributes
            .iter()
            .map(|a| (a.name.qualified(), a.value.as_str())),
    );

    let continuation = format!("{}{}", indent, INDENT);
    for (i, (key, value)) in items.iter().enumerate() {
        if i == 0 {
            out.push(' ');
        } else {
            out.push('\n');
            out.push_str(&continuation);
        }
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }

    let content: Vec<&XmlNode> = element
        .children
        .iter()
        .filter(|n| !n.is_blank_text())
        .collect();
    if content.is_empty() {
        out.push_str(" />\n");
        return;
    }

    // Elements holding only text stay on one line
    if content
        .iter()
        .all(|n| matches!(n, XmlNode::Text(_) | XmlNode::CData(_)))
    {
        out.push('>');
        for node in content {
            push_inline(node, out);
        }
        out.push_str(&format!("</{}>\n", name));
        return;
    }

    out.push_str(">\n");
    let child_indent = INDENT.repeat(depth + 1);
    for node in content {
        match node {
            XmlNode::Element(child) => print_element(child, depth + 1, out),
            XmlNode::Comment(comment) => {
                out.push_str(&format!("{}<!--{}-->\n", child_indent, comment.value));
            }
            other => {
                out.push_str(&child_indent);
                push_inline(other, out);
                out.push('\n');
            }
        }
    }
    out.push_str(&format!("{}</{}>\n", indent, name));
}

fn push_inline(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Text(text) => out.push_str(&escape(text.value.trim(), false)),
        XmlNode::CData(data) => out.push_str(&format!("<![CDATA[{}]]>", data.value)),
        _ => {}
    }
}

fn escape(value: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
