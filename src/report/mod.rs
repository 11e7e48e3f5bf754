// Merging report: records, action log and output surfaces

mod actions;
mod json;
mod terminal;

pub use actions::{ActionRecorder, ActionType, Actions, AttributeRecord, DecisionTree, NodeRecord};
pub use json::JsonReporter;
pub use terminal::TerminalReporter;

use crate::xml::{SourceLocation, XmlDocument};
use miette::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Severity of a report record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
}

impl Record {
    pub fn describe(&self, simple_filenames: bool) -> String {
        match &self.location {
            Some(location) => format!(
                "{} {}: {}",
                location.describe(simple_filenames),
                self.severity.as_str().to_uppercase(),
                self.message
            ),
            None => format!("{}: {}", self.severity.as_str().to_uppercase(), self.message),
        }
    }
}

/// Overall outcome of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeResult {
    Success,
    Warning,
    Error,
}

impl MergeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeResult::Success => "success",
            MergeResult::Warning => "warning",
            MergeResult::Error => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, MergeResult::Error)
    }
}

/// Mutable accumulator threaded through every merge phase
#[derive(Debug, Default)]
pub struct MergingReportBuilder {
    records: Vec<Record>,
    actions: ActionRecorder,
    merged_document: Option<XmlDocument>,
    intermediary_stages: Vec<String>,
    simple_filenames: bool,
}

impl MergingReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simple_filenames(mut self, simple: bool) -> Self {
        self.simple_filenames = simple;
        self
    }

    pub fn add_message(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        location: Option<SourceLocation>,
    ) -> &mut Self {
        self.records.push(Record {
            severity,
            message: message.into(),
            location,
            timestamp: now_secs(),
        });
        self
    }

    pub fn add_error(&mut self, message: impl Into<String>, location: Option<SourceLocation>) -> &mut Self {
        self.add_message(Severity::Error, message, location)
    }

    pub fn add_warning(&mut self, message: impl Into<String>, location: Option<SourceLocation>) -> &mut Self {
        self.add_message(Severity::Warning, message, location)
    }

    pub fn add_info(&mut self, message: impl Into<String>) -> &mut Self {
        self.add_message(Severity::Info, message, None)
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.severity == Severity::Error)
    }

    pub fn action_recorder(&self) -> &ActionRecorder {
        &self.actions
    }

    pub fn action_recorder_mut(&mut self) -> &mut ActionRecorder {
        &mut self.actions
    }

    pub fn set_merged_document(&mut self, document: XmlDocument) -> &mut Self {
        self.merged_document = Some(document);
        self
    }

    pub fn add_merging_stage(&mut self, xml: String) -> &mut Self {
        self.intermediary_stages.push(xml);
        self
    }

    /// Freeze the report. A report with errors never carries a document.
    pub fn build(self) -> MergingReport {
        let has_errors = self.has_errors();
        MergingReport {
            merged_document: if has_errors { None } else { self.merged_document },
            records: self.records,
            actions: self.actions.build(),
            intermediary_stages: self.intermediary_stages,
            simple_filenames: self.simple_filenames,
        }
    }
}

/// Immutable result of a merge invocation
#[derive(Debug, Clone)]
pub struct MergingReport {
    records: Vec<Record>,
    actions: Actions,
    merged_document: Option<XmlDocument>,
    intermediary_stages: Vec<String>,
    simple_filenames: bool,
}

impl MergingReport {
    pub fn result(&self) -> MergeResult {
        if self.has_errors() {
            MergeResult::Error
        } else if self.records.iter().any(|r| r.severity == Severity::Warning) {
            MergeResult::Warning
        } else {
            MergeResult::Success
        }
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.severity == Severity::Error)
    }

    pub fn merged_document(&self) -> Option<&XmlDocument> {
        self.merged_document.as_ref()
    }

    /// Pretty printed merged manifest
    pub fn merged_xml(&self) -> Option<String> {
        self.merged_document.as_ref().map(XmlDocument::pretty_print)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn intermediary_stages(&self) -> &[String] {
        &self.intermediary_stages
    }

    pub fn simple_filenames(&self) -> bool {
        self.simple_filenames
    }

    pub fn blame(&self) -> String {
        self.actions.blame(self.simple_filenames)
    }

    /// Replay every record through tracing at its severity
    pub fn log(&self) {
        for record in &self.records {
            let line = record.describe(self.simple_filenames);
            match record.severity {
                Severity::Error => error!("{}", line),
                Severity::Warning => warn!("{}", line),
                Severity::Info => info!("{}", line),
            }
        }
    }
}

fn now_secs() -> u64 {
    use std::time::SystemTime;

    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

/// Writes a finished merging report in the requested format
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
    show_info: bool,
    to_stderr: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self {
            format,
            output_path,
            show_info: false,
            to_stderr: false,
        }
    }

    /// List INFO records in terminal output
    pub fn with_info(mut self, show: bool) -> Self {
        self.show_info = show;
        self
    }

    /// Write terminal output to stderr, leaving stdout to the manifest
    pub fn to_stderr(mut self, to_stderr: bool) -> Self {
        self.to_stderr = to_stderr;
        self
    }

    pub fn report(&self, report: &MergingReport) -> Result<()> {
        match self.format {
            ReportFormat::Terminal => TerminalReporter::new()
                .with_info(self.show_info)
                .to_stderr(self.to_stderr)
                .report(report),
            ReportFormat::Json => JsonReporter::new(self.output_path.clone()).report(report),
        }
    }
}
