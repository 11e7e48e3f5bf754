use super::{MergeResult, MergingReport, Record, Severity};
use colored::Colorize;
use miette::Result;
use std::fmt::Write;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// Print INFO records too
    show_info: bool,
    /// Stdout carries the merged manifest
    to_stderr: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            show_info: false,
            to_stderr: false,
        }
    }

    pub fn with_info(mut self, show: bool) -> Self {
        self.show_info = show;
        self
    }

    pub fn to_stderr(mut self, to_stderr: bool) -> Self {
        self.to_stderr = to_stderr;
        self
    }

    pub fn report(&self, report: &MergingReport) -> Result<()> {
        let text = self.render(report);
        if self.to_stderr {
            eprint!("{}", text);
        } else {
            print!("{}", text);
        }
        Ok(())
    }

    pub fn render(&self, report: &MergingReport) -> String {
        let mut out = String::new();
        let simple = report.simple_filenames();
        let shown: Vec<&Record> = report
            .records()
            .iter()
            .filter(|r| self.show_info || r.severity != Severity::Info)
            .collect();

        if !shown.is_empty() {
            out.push('\n');
            for record in &shown {
                self.render_record(&mut out, record, simple);
            }
            out.push('\n');
        }

        self.render_summary(&mut out, report);
        out
    }

    fn render_record(&self, out: &mut String, record: &Record, simple: bool) {
        let severity = match record.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
        };
        let location = record
            .location
            .as_ref()
            .map(|l| l.describe(simple))
            .unwrap_or_default();

        let _ = if location.is_empty() {
            writeln!(out, "  {} {}", severity, record.message)
        } else {
            writeln!(out, "  {} {} {}", location.dimmed(), severity, record.message)
        };
    }

    fn render_summary(&self, out: &mut String, report: &MergingReport) {
        let count = |s: Severity| report.records().iter().filter(|r| r.severity == s).count();
        let errors = count(Severity::Error);
        let warnings = count(Severity::Warning);

        let _ = writeln!(out, "{}", "─".repeat(60).dimmed());

        let mut parts = Vec::new();
        if errors > 0 {
            parts.push(format!("{} errors", errors).red().to_string());
        }
        if warnings > 0 {
            parts.push(format!("{} warnings", warnings).yellow().to_string());
        }
        if !parts.is_empty() {
            let _ = writeln!(out, "Summary: {}", parts.join(", "));
        }

        let banner = match report.result() {
            MergeResult::Success => "Merge succeeded".green().bold(),
            MergeResult::Warning => "Merge succeeded with warnings".yellow().bold(),
            MergeResult::Error => "Merge failed".red().bold(),
        };
        let _ = writeln!(out, "{}", banner);
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
