use crate::report::{ActionType, MergingReportBuilder};
use crate::xml::{XmlDocument, XmlElement};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

// Constant pattern, checked by the tests below
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid")
});

/// Substitutes `${name}` tokens in attribute values
pub struct PlaceholderHandler {
    pattern: &'static Regex,
}

impl PlaceholderHandler {
    pub fn new() -> Self {
        Self {
            pattern: &PLACEHOLDER,
        }
    }

    /// Replace every placeholder in `document`.
    ///
    /// Attributes with an unknown placeholder are left untouched and reported
    /// as errors.
    pub fn visit(
        &self,
        document: &mut XmlDocument,
        values: &BTreeMap<String, String>,
        report: &mut MergingReportBuilder,
    ) {
        self.visit_element(&mut document.root, values, report);
    }

    fn visit_element(
        &self,
        element: &mut XmlElement,
        values: &BTreeMap<String, String>,
        report: &mut MergingReportBuilder,
    ) {
        for index in 0..element.attributes.len() {
            let attribute = &element.attributes[index];
            if !self.pattern.is_match(&attribute.value) {
                continue;
            }

            match self.substitute(&attribute.value, values) {
                Ok(value) => {
                    debug!("{} {} = {}", element.node_key(), attribute.name, value);
                    element.attributes[index].value = value;
                    report.action_recorder_mut().record_attribute_action(
                        element,
                        &element.attributes[index],
                        ActionType::Injected,
                        Some("placeholder substitution".to_string()),
                    );
                }
                Err(missing) => {
                    for name in missing {
                        report.add_error(
                            format!(
                                "Attribute {}@{} at {} requires a placeholder substitution but no value for <{}> is provided.",
                                element.node_key(),
                                attribute.name,
                                attribute.location(),
                                name
                            ),
                            Some(attribute.location()),
                        );
                    }
                }
            }
        }

        for child in element.child_elements_mut() {
            self.visit_element(child, values, report);
        }
    }

    /// Substituted value, or the names without a value
    fn substitute(
        &self,
        value: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<String, Vec<String>> {
        let mut missing = Vec::new();
        let mut result = String::with_capacity(value.len());
        let mut last = 0;

        for captures in self.pattern.captures_iter(value) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            result.push_str(&value[last..whole.start()]);
            match values.get(name.as_str()) {
                Some(replacement) => result.push_str(replacement),
                None => missing.push(name.as_str().to_string()),
            }
            last = whole.end();
        }
        result.push_str(&value[last..]);

        if missing.is_empty() {
            Ok(result)
        } else {
            Err(missing)
        }
    }
}

impl Default for PlaceholderHandler {
    fn default() -> Self {
        Self::new()
    }
}
