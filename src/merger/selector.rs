use crate::xml::XmlElement;
use std::collections::HashMap;
use tracing::debug;

/// Resolves a key to a value
pub trait KeyResolver<T> {
    fn resolve(&self, key: &str) -> Option<T>;

    /// Known keys, sorted
    fn keys(&self) -> Vec<String>;
}

/// Maps library package names to the alias the library was registered with.
///
/// Filled while loading library manifests and read-only afterwards. When two
/// libraries declare the same package, the last registration wins.
#[derive(Debug, Clone, Default)]
pub struct SelectorResolver {
    selectors: HashMap<String, String>,
}

impl SelectorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_selector(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(previous) = self.selectors.insert(key.clone(), value.clone()) {
            debug!(
                "Selector {} re-registered: {} replaces {}",
                key, value, previous
            );
        }
    }

    /// Whether an operation declared with `selector` on a higher priority
    /// element applies to `lower`. No selector always applies.
    pub fn applies_to(&self, selector: Option<&str>, lower: &XmlElement) -> bool {
        match selector {
            None => true,
            Some(selector) => match (self.selectors.get(selector), &lower.origin.name) {
                (Some(alias), Some(name)) => alias == name,
                _ => false,
            },
        }
    }
}

impl KeyResolver<String> for SelectorResolver {
    fn resolve(&self, key: &str) -> Option<String> {
        self.selectors.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.selectors.keys().cloned().collect();
        keys.sort();
        keys
    }
}
