use super::node::{NamespaceDecl, QName, XmlElement, XmlNode};
use super::position::SourceFile;
use super::{printer, ANDROID_URI, TOOLS_URI};
use crate::model::resolve_class_name;
use std::collections::HashMap;
use std::sync::Arc;

/// A loaded manifest
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub source: Arc<SourceFile>,
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn new(source: Arc<SourceFile>, root: XmlElement) -> Self {
        Self { source, root }
    }

    /// Value of the root `package` attribute
    pub fn package(&self) -> Option<&str> {
        self.root
            .attribute(None, "package")
            .map(|a| a.value.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn set_package(&mut self, package: &str) {
        let origin = self.source.clone();
        self.root.set_attribute(super::XmlAttribute::new(
            QName::new(None, "package"),
            None,
            package,
            origin,
        ));
    }

    /// Recompute all element keys against the document's own package
    pub fn refresh_keys(&mut self) {
        let package = self.package().map(str::to_string);
        self.refresh_keys_with(package.as_deref());
    }

    /// Recompute all element keys against an explicit package
    pub fn refresh_keys_with(&mut self, package: Option<&str>) {
        self.root.refresh_keys(package);
    }

    /// Rewrite relative class names to fully qualified ones.
    ///
    /// Library manifests are merged into a document with a different package,
    /// so their `.Foo` names must be pinned before merging.
    pub fn expand_class_names(&mut self) {
        let Some(package) = self.package().map(str::to_string) else {
            return;
        };
        expand_element(&mut self.root, &package);
    }

    /// Hoist prefixed namespace declarations to the root and spell every
    /// name with the root's prefix for its namespace.
    pub fn normalize_namespaces(&mut self) {
        let mut declared: Vec<NamespaceDecl> = Vec::new();
        collect_declarations(&self.root, &mut declared);

        let mut by_uri: HashMap<String, String> = HashMap::new();
        for decl in &self.root.namespaces {
            if let Some(prefix) = &decl.prefix {
                by_uri.entry(decl.uri.clone()).or_insert_with(|| prefix.clone());
            }
        }
        for decl in declared {
            let Some(prefix) = decl.prefix else { continue };
            if by_uri.contains_key(&decl.uri) {
                continue;
            }
            let prefix = self.unused_prefix(&prefix);
            self.root.namespaces.push(NamespaceDecl {
                prefix: Some(prefix.clone()),
                uri: decl.uri.clone(),
            });
            by_uri.insert(decl.uri, prefix);
        }

        strip_nested_prefixed(&mut self.root, true);
        reprefix(&mut self.root, &by_uri);
    }

    /// Make sure `uri` is declared on the root and return its prefix.
    ///
    /// `hint` is used when free; otherwise a generated `nsN` prefix is taken.
    pub fn ensure_namespace(&mut self, hint: &str, uri: &str) -> String {
        if let Some(prefix) = self.prefix_for(uri) {
            return prefix;
        }
        let prefix = self.unused_prefix(hint);
        self.root.namespaces.push(NamespaceDecl {
            prefix: Some(prefix.clone()),
            uri: uri.to_string(),
        });
        prefix
    }

    pub fn prefix_for(&self, uri: &str) -> Option<String> {
        self.root
            .namespaces
            .iter()
            .find(|d| d.uri == uri && d.prefix.is_some())
            .and_then(|d| d.prefix.clone())
    }

    /// Adopt the prefixed namespaces of `other` and respell its names with
    /// this document's prefixes.
    pub fn adopt_namespaces_of(&mut self, other: &mut XmlDocument) {
        let mut by_uri: HashMap<String, String> = HashMap::new();
        for decl in &other.root.namespaces {
            if let Some(prefix) = &decl.prefix {
                let adopted = self.ensure_namespace(prefix, &decl.uri);
                by_uri.insert(decl.uri.clone(), adopted);
            }
        }
        reprefix(&mut other.root, &by_uri);
        for decl in other.root.namespaces.iter_mut() {
            if let Some(prefix) = by_uri.get(&decl.uri).filter(|_| decl.prefix.is_some()) {
                decl.prefix = Some(prefix.clone());
            }
        }
    }

    /// Drop every declaration of `uri` in the tree
    pub fn remove_namespace(&mut self, uri: &str) {
        remove_declarations(&mut self.root, uri);
    }

    pub fn compare_to(&self, other: &XmlDocument) -> Option<String> {
        self.root.compare_to(&other.root)
    }

    pub fn pretty_print(&self) -> String {
        printer::print_document(self)
    }

    pub fn android_prefix(&self) -> Option<String> {
        self.prefix_for(ANDROID_URI)
    }

    pub fn tools_prefix(&self) -> Option<String> {
        self.prefix_for(TOOLS_URI)
    }

    fn unused_prefix(&self, hint: &str) -> String {
        let taken = |p: &str| {
            self.root
                .namespaces
                .iter()
                .any(|d| d.prefix.as_deref() == Some(p))
        };
        if !taken(hint) {
            return hint.to_string();
        }
        (0..)
            .map(|i| format!("ns{}", i))
            .find(|p| !taken(p))
            .unwrap_or_else(|| hint.to_string())
    }
}

fn expand_element(element: &mut XmlElement, package: &str) {
    if element.node_type().has_package_dependent_name() {
        if let Some(name) = element
            .attributes
            .iter_mut()
            .find(|a| a.is(Some(ANDROID_URI), "name"))
        {
            name.value = resolve_class_name(&name.value, Some(package));
        }
    }
    for child in element.child_elements_mut() {
        expand_element(child, package);
    }
}

fn collect_declarations(element: &XmlElement, out: &mut Vec<NamespaceDecl>) {
    for child in element.child_elements() {
        out.extend(child.namespaces.iter().filter(|d| d.prefix.is_some()).cloned());
        collect_declarations(child, out);
    }
}

fn strip_nested_prefixed(element: &mut XmlElement, is_root: bool) {
    if !is_root {
        element.namespaces.retain(|d| d.prefix.is_none());
    }
    for child in element.child_elements_mut() {
        strip_nested_prefixed(child, false);
    }
}

fn reprefix(element: &mut XmlElement, by_uri: &HashMap<String, String>) {
    if element.name.prefix.is_some() {
        if let Some(prefix) = element.namespace.as_ref().and_then(|u| by_uri.get(u)) {
            element.name.prefix = Some(prefix.clone());
        }
    }
    for attribute in &mut element.attributes {
        if let Some(prefix) = attribute.namespace.as_ref().and_then(|u| by_uri.get(u)) {
            attribute.name.prefix = Some(prefix.clone());
        }
    }
    for child in element.children.iter_mut() {
        if let XmlNode::Element(child) = child {
            reprefix(child, by_uri);
        }
    }
}

fn remove_declarations(element: &mut XmlElement, uri: &str) {
    element.namespaces.retain(|d| d.uri != uri);
    for child in element.child_elements_mut() {
        remove_declarations(child, uri);
    }
}
