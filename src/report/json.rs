use super::{Actions, MergingReport, Severity};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, report: &MergingReport) -> Result<()> {
        let json = self.render(report)?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }

    pub fn render(&self, report: &MergingReport) -> Result<String> {
        serde_json::to_string_pretty(&JsonReport::from_report(report)).into_diagnostic()
    }
}

#[derive(Serialize)]
struct JsonReport {
    version: &'static str,
    result: &'static str,
    records: Vec<JsonRecord>,
    summary: JsonSummary,
    actions: Vec<JsonNode>,
    merged_document: Option<String>,
}

#[derive(Serialize)]
struct JsonRecord {
    severity: &'static str,
    message: String,
    location: Option<JsonLocation>,
    timestamp: u64,
}

#[derive(Serialize)]
struct JsonLocation {
    file: String,
    line: usize,
    column: usize,
}

#[derive(Serialize)]
struct JsonSummary {
    errors: usize,
    warnings: usize,
    infos: usize,
}

#[derive(Serialize)]
struct JsonNode {
    node: String,
    records: Vec<JsonAction>,
    attributes: Vec<JsonAttribute>,
}

#[derive(Serialize)]
struct JsonAttribute {
    name: String,
    records: Vec<JsonAction>,
}

#[derive(Serialize)]
struct JsonAction {
    action: &'static str,
    location: JsonLocation,
    reason: Option<String>,
}

impl JsonReport {
    fn from_report(report: &MergingReport) -> Self {
        let simple = report.simple_filenames();
        let location = |l: &crate::xml::SourceLocation| JsonLocation {
            file: l.file.describe(simple),
            line: l.position.start_line,
            column: l.position.start_column,
        };

        let mut summary = JsonSummary {
            errors: 0,
            warnings: 0,
            infos: 0,
        };
        let records = report
            .records()
            .iter()
            .map(|r| {
                match r.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Info => summary.infos += 1,
                }
                JsonRecord {
                    severity: r.severity.as_str(),
                    message: r.message.clone(),
                    location: r.location.as_ref().map(location),
                    timestamp: r.timestamp,
                }
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION"),
            result: report.result().as_str(),
            records,
            summary,
            actions: json_actions(report.actions(), &location),
            merged_document: report.merged_xml(),
        }
    }
}

fn json_actions(
    actions: &Actions,
    location: &dyn Fn(&crate::xml::SourceLocation) -> JsonLocation,
) -> Vec<JsonNode> {
    actions
        .node_keys()
        .filter_map(|key| actions.decision_tree(key).map(|tree| (key, tree)))
        .map(|(key, tree)| JsonNode {
            node: key.to_string(),
            records: tree
                .node_records
                .iter()
                .map(|r| JsonAction {
                    action: r.action_type.as_str(),
                    location: location(&r.location),
                    reason: r.reason.clone(),
                })
                .collect(),
            attributes: tree
                .attribute_records
                .iter()
                .map(|(name, records)| JsonAttribute {
                    name: name.clone(),
                    records: records
                        .iter()
                        .map(|r| JsonAction {
                            action: r.action_type.as_str(),
                            location: location(&r.location),
                            reason: r.reason.clone(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}
