// Manifest loading: decoding, parsing and position recording

use super::document::XmlDocument;
use super::encoding;
use super::node::{NamespaceDecl, QName, XmlAttribute, XmlElement, XmlNode, XmlText};
use super::position::{LineIndex, SourceFile};
use super::XML_URI;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{0}")]
    Encoding(String),

    #[error("{line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
}

/// Builds positional documents from raw manifest bytes
pub struct XmlLoader;

impl XmlLoader {
    /// Decode `bytes` (BOM or declaration driven) and parse them
    pub fn load_bytes(bytes: &[u8], source: SourceFile) -> Result<XmlDocument, LoadError> {
        let (text, detected) = encoding::decode(bytes).map_err(LoadError::Encoding)?;
        debug!("Decoded {} as {}", source, detected);
        Self::load_str(&text, source)
    }

    pub fn load_str(text: &str, source: SourceFile) -> Result<XmlDocument, LoadError> {
        let origin = Arc::new(source);
        let root = TreeBuilder::new(text, origin.clone()).run()?;
        Ok(XmlDocument::new(origin, root))
    }
}

struct TreeBuilder<'a> {
    text: &'a str,
    origin: Arc<SourceFile>,
    lines: LineIndex,
    /// Open elements with the byte offset of their start tag
    stack: Vec<(XmlElement, usize)>,
    /// Namespace declarations of every open element
    scopes: Vec<Vec<NamespaceDecl>>,
    root: Option<XmlElement>,
}

impl<'a> TreeBuilder<'a> {
    fn new(text: &'a str, origin: Arc<SourceFile>) -> Self {
        Self {
            text,
            origin,
            lines: LineIndex::new(text),
            stack: Vec::new(),
            scopes: Vec::new(),
            root: None,
        }
    }

    fn run(mut self) -> Result<XmlElement, LoadError> {
        let mut reader = Reader::from_str(self.text);
        reader.trim_text(false);
        reader.check_end_names(true);

        loop {
            let start = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| self.error(reader.buffer_position(), e.to_string()))?;
            let mut end = reader.buffer_position();

            // Text events swallow the `<` of the following tag
            let start = match event {
                Event::Text(_) => {
                    if end > start && self.text.as_bytes()[end - 1] == b'<' {
                        end -= 1;
                    }
                    start
                }
                _ => markup_start(self.text, start),
            };

            match event {
                Event::Start(tag) => {
                    let element = self.open(&tag, start, end)?;
                    self.stack.push((element, start));
                }
                Event::Empty(tag) => {
                    let element = self.open(&tag, start, end)?;
                    self.scopes.pop();
                    self.attach(XmlNode::Element(element), start)?;
                }
                Event::End(_) => {
                    let (mut element, opened) = self
                        .stack
                        .pop()
                        .ok_or_else(|| self.error(start, "Unexpected end tag".to_string()))?;
                    self.scopes.pop();
                    element.position = self.lines.span(self.text, opened, end);
                    self.attach(XmlNode::Element(element), opened)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| self.error(start, e.to_string()))?
                        .into_owned();
                    let position = self.lines.span(self.text, start, end);
                    self.attach(XmlNode::Text(XmlText { value, position }), start)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    let position = self.lines.span(self.text, start, end);
                    self.attach(XmlNode::CData(XmlText { value, position }), start)?;
                }
                Event::Comment(comment) => {
                    let value = String::from_utf8_lossy(&comment).into_owned();
                    let position = self.lines.span(self.text, start, end);
                    self.attach(XmlNode::Comment(XmlText { value, position }), start)?;
                }
                Event::Eof => break,
                // Declarations, processing instructions and DOCTYPE carry nothing
                // the merger needs; external entities are never fetched.
                _ => {}
            }
        }

        if let Some((element, opened)) = self.stack.last() {
            return Err(self.error(
                *opened,
                format!("Element {} is not closed", element.name),
            ));
        }
        self.root
            .take()
            .ok_or_else(|| self.error(self.text.len(), "Premature end of file".to_string()))
    }

    /// Build an element from its start tag and push its namespace scope
    fn open(&mut self, tag: &BytesStart<'_>, start: usize, end: usize) -> Result<XmlElement, LoadError> {
        let text = self.text;
        let raw = &text[start..end];
        let tag_name = std::str::from_utf8(tag.name().as_ref())
            .map_err(|e| self.error(start, e.to_string()))?
            .to_string();

        let mut declarations = Vec::new();
        let mut pending = Vec::new();
        let mut cursor = 1 + tag_name.len();

        for attr in tag.attributes() {
            let attr = attr.map_err(|e| self.error(start, e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| self.error(start, e.to_string()))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| self.error(start, e.to_string()))?
                .into_owned();

            let (attr_start, attr_end) = locate_attribute(raw, cursor, &key).unwrap_or((cursor, cursor));
            cursor = attr_end;

            if key == "xmlns" {
                declarations.push(NamespaceDecl { prefix: None, uri: value });
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push(NamespaceDecl {
                    prefix: Some(prefix.to_string()),
                    uri: value,
                });
            } else {
                pending.push((QName::parse(&key), value, start + attr_start, start + attr_end));
            }
        }

        self.scopes.push(declarations.clone());

        let name = QName::parse(&tag_name);
        let namespace = self
            .resolve(name.prefix.as_deref(), true)
            .map_err(|m| self.error(start, m))?;
        let mut element = XmlElement::new(name, namespace.as_deref(), self.origin.clone());
        element.namespaces = declarations;
        element.position = self.lines.span(self.text, start, end);

        for (name, value, attr_start, attr_end) in pending {
            let namespace = match name.prefix.as_deref() {
                Some(prefix) => self
                    .resolve(Some(prefix), false)
                    .map_err(|m| self.error(attr_start, m))?,
                None => None,
            };
            let mut attribute =
                XmlAttribute::new(name, namespace.as_deref(), value, self.origin.clone());
            attribute.position = self.lines.span(self.text, attr_start, attr_end);
            element.attributes.push(attribute);
        }

        Ok(element)
    }

    fn attach(&mut self, node: XmlNode, at: usize) -> Result<(), LoadError> {
        if let Some((parent, _)) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }
        match node {
            XmlNode::Element(element) => {
                if self.root.is_some() {
                    return Err(self.error(
                        at,
                        "The markup in the document following the root element must be well-formed"
                            .to_string(),
                    ));
                }
                self.root = Some(element);
            }
            XmlNode::Text(text) if !text.value.trim().is_empty() => {
                return Err(self.error(at, "Content is not allowed outside the root element".to_string()));
            }
            _ => {}
        }
        Ok(())
    }

    /// Namespace URI bound to `prefix` in the current scope.
    ///
    /// Unprefixed attributes are never in a namespace; unprefixed elements
    /// take the default namespace.
    fn resolve(&self, prefix: Option<&str>, is_element: bool) -> Result<Option<String>, String> {
        match prefix {
            Some("xml") => Ok(Some(XML_URI.to_string())),
            Some(prefix) => self
                .scopes
                .iter()
                .rev()
                .flat_map(|decls| decls.iter().rev())
                .find(|d| d.prefix.as_deref() == Some(prefix))
                .map(|d| Some(d.uri.clone()))
                .ok_or_else(|| format!("The prefix \"{}\" is not bound", prefix)),
            None if !is_element => Ok(None),
            None => Ok(self
                .scopes
                .iter()
                .rev()
                .flat_map(|decls| decls.iter().rev())
                .find(|d| d.prefix.is_none())
                .map(|d| d.uri.clone())
                .filter(|uri| !uri.is_empty())),
        }
    }

    fn error(&self, byte: usize, message: String) -> LoadError {
        let (line, column, _) = self.lines.locate(self.text, byte);
        LoadError::Parse {
            line,
            column,
            message,
        }
    }
}

/// Offset of the `<` opening the markup read from `position`
fn markup_start(text: &str, position: usize) -> usize {
    let bytes = text.as_bytes();
    if bytes.get(position) != Some(&b'<') && position > 0 && bytes[position - 1] == b'<' {
        position - 1
    } else {
        position
    }
}

/// Byte span of `key="value"` inside a raw start tag, searching from `from`
fn locate_attribute(raw: &str, from: usize, key: &str) -> Option<(usize, usize)> {
    let mut search = from.min(raw.len());
    while let Some(found) = raw.get(search..)?.find(key) {
        let begin = search + found;
        let after = begin + key.len();
        let preceded = raw[..begin]
            .chars()
            .next_back()
            .map_or(false, char::is_whitespace);
        let rest = raw[after..].trim_start();
        if preceded && rest.starts_with('=') {
            let value = rest[1..].trim_start();
            let value_start = raw.len() - value.len();
            let quote = value.chars().next()?;
            let close = value[1..].find(quote)?;
            return Some((begin, value_start + close + 2));
        }
        search = after;
    }
    None
}
