//! Manifest merging
//!
//! [`ManifestMerger`] runs one merge end to end: overlays (highest priority
//! first), then the main manifest, then libraries in priority order, followed
//! by trimming, placeholder substitution, system property injection,
//! validation and cleanup. Each phase stops the merge as soon as the report
//! holds an error.

mod cleaner;
mod element_merge;
mod invoker;
mod placeholder;
mod selector;
mod system_property;
mod trimmer;
mod validator;

pub use cleaner::ToolsInstructionsCleaner;
pub use element_merge::{merge_documents, MergeContext};
pub use invoker::{FileStreamProvider, FsStreamProvider, Invoker};
pub use placeholder::PlaceholderHandler;
pub use selector::{KeyResolver, SelectorResolver};
pub use system_property::SystemProperty;
pub use trimmer::ElementsTrimmer;
pub use validator::{PostValidator, PreValidator};

use crate::report::{MergingReport, MergingReportBuilder};
use crate::xml::{LoadError, SourceFile, SourceKind, XmlDocument, XmlLoader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// What the merged manifest is for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeType {
    /// Final manifest of an application, tools instructions are removed
    #[default]
    Application,
    /// Manifest of a library, stays mergeable and keeps the main package
    Library,
}

/// Optional merge behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Keep a pretty printed snapshot after every merge step
    KeepIntermediaryStages,
    /// Use file names instead of full paths in messages
    PrintSimpleFilenames,
    /// Leave `${...}` placeholders untouched
    NoPlaceholderReplacement,
}

/// Failures that prevent a merge from being attempted
#[derive(Debug, Error)]
pub enum MergeFailure {
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}:{column}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{}: {message}", .path.display())]
    Encoding { path: PathBuf, message: String },

    #[error("Invalid merge invocation: {0}")]
    InvalidInvocation(String),
}

/// A single-use merge of one main manifest with its overlays and libraries
pub struct ManifestMerger {
    invoker: Invoker,
}

impl From<Invoker> for ManifestMerger {
    fn from(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

impl ManifestMerger {
    /// Start building an application merge
    pub fn new_merger(main: impl Into<PathBuf>) -> Invoker {
        Invoker::new(main, MergeType::Application)
    }

    fn has(&self, feature: Feature) -> bool {
        self.invoker.features.contains(&feature)
    }

    pub fn merge(self) -> Result<MergingReport, MergeFailure> {
        if self.invoker.main.as_os_str().is_empty() {
            return Err(MergeFailure::InvalidInvocation(
                "no main manifest given".to_string(),
            ));
        }

        let mut report =
            MergingReportBuilder::new().with_simple_filenames(self.has(Feature::PrintSimpleFilenames));

        let main_path = self.invoker.main.clone();
        let main_name = main_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        let main = self.load(&main_path, SourceKind::Main, main_name, None)?;
        let main_package = main.package().map(str::to_string);

        let mut overlays = Vec::with_capacity(self.invoker.overlays.len());
        for path in &self.invoker.overlays {
            overlays.push(self.load(path, SourceKind::Overlay, None, main_package.as_deref())?);
        }

        // All libraries are loaded before any merge so every selector is known.
        let mut selectors = SelectorResolver::new();
        let mut libraries = Vec::with_capacity(self.invoker.libraries.len());
        for (name, path) in &self.invoker.libraries {
            debug!("Loading library manifest {}", path.display());
            let library = self.load(path, SourceKind::Library, Some(name.clone()), None)?;
            if let Some(package) = library.package() {
                selectors.add_selector(package, name.clone());
            }
            libraries.push(library);
        }

        let mut accumulated: Option<XmlDocument> = None;
        for overlay in &overlays {
            report.add_info(format!("Merging flavors and build manifest {}", overlay.source));
            accumulated = Some(self.merge_into(accumulated, overlay, &selectors, &mut report));
            if report.has_errors() {
                return Ok(finish(report));
            }
        }

        report.add_info(format!("Merging main manifest {}", main.source));
        let mut merged = self.merge_into(accumulated, &main, &selectors, &mut report);
        if report.has_errors() {
            return Ok(finish(report));
        }

        if self.invoker.merge_type == MergeType::Library {
            if let Some(package) = &main_package {
                merged.set_package(package);
            }
        }

        for library in &libraries {
            report.add_info(format!("Merging library manifest {}", library.source));
            merged = self.merge_into(Some(merged), library, &selectors, &mut report);
            if report.has_errors() {
                return Ok(finish(report));
            }
        }

        ElementsTrimmer::trim(&mut merged, &mut report);
        if report.has_errors() {
            return Ok(finish(report));
        }

        if !self.has(Feature::NoPlaceholderReplacement) {
            let values = self.placeholder_values(&merged);
            PlaceholderHandler::new().visit(&mut merged, &values, &mut report);
            if report.has_errors() {
                return Ok(finish(report));
            }
        }

        self.inject_system_properties(&mut merged, &mut report);
        if report.has_errors() {
            return Ok(finish(report));
        }

        merged.refresh_keys();
        PostValidator::validate(&merged, &mut report);
        if report.has_errors() {
            return Ok(finish(report));
        }

        if self.invoker.merge_type == MergeType::Application {
            ToolsInstructionsCleaner::clean(&mut merged);
        }

        report.set_merged_document(merged);
        Ok(finish(report))
    }

    fn load(
        &self,
        path: &Path,
        kind: SourceKind,
        name: Option<String>,
        fallback_package: Option<&str>,
    ) -> Result<XmlDocument, MergeFailure> {
        let bytes = self
            .invoker
            .provider
            .read(path)
            .map_err(|source| MergeFailure::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut source = SourceFile::new(path, kind);
        if let Some(name) = name {
            source = source.with_name(name);
        }

        let mut document = XmlLoader::load_bytes(&bytes, source).map_err(|e| match e {
            LoadError::Encoding(message) => MergeFailure::Encoding {
                path: path.to_path_buf(),
                message,
            },
            LoadError::Parse {
                line,
                column,
                message,
            } => MergeFailure::Parse {
                path: path.to_path_buf(),
                line,
                column,
                message,
            },
        })?;

        document.normalize_namespaces();
        if kind == SourceKind::Library {
            document.expand_class_names();
        }
        match document.package().map(str::to_string) {
            Some(package) => document.refresh_keys_with(Some(&package)),
            None => document.refresh_keys_with(fallback_package),
        }
        Ok(document)
    }

    /// Merge `lower` into `higher`, or adopt it when it is the first document
    fn merge_into(
        &self,
        higher: Option<XmlDocument>,
        lower: &XmlDocument,
        selectors: &SelectorResolver,
        report: &mut MergingReportBuilder,
    ) -> XmlDocument {
        PreValidator::validate(lower, selectors, report);
        if report.has_errors() {
            report.add_error("Validation failed, exiting", Some(lower.root.location()));
            return higher.unwrap_or_else(|| lower.clone());
        }

        let result = match higher {
            None => {
                report
                    .action_recorder_mut()
                    .record_default_node_action(&lower.root);
                lower.clone()
            }
            Some(higher) => {
                let mut ctx = MergeContext {
                    selectors,
                    report: &mut *report,
                };
                merge_documents(&higher, lower, &mut ctx)
            }
        };

        if self.has(Feature::KeepIntermediaryStages) {
            report.add_merging_stage(result.pretty_print());
        }
        result
    }

    /// Caller placeholders plus `applicationId`/`packageName` defaults
    fn placeholder_values(&self, merged: &XmlDocument) -> BTreeMap<String, String> {
        let mut values = self.invoker.placeholders.clone();
        let package = self
            .invoker
            .overrides
            .get(&SystemProperty::Package)
            .cloned()
            .or_else(|| merged.package().map(str::to_string));
        if let Some(package) = package {
            values
                .entry("applicationId".to_string())
                .or_insert_with(|| package.clone());
            values.entry("packageName".to_string()).or_insert(package);
        }
        values
    }

    fn inject_system_properties(&self, merged: &mut XmlDocument, report: &mut MergingReportBuilder) {
        for (property, value) in &self.invoker.overrides {
            match property.validate(value) {
                Ok(()) => {
                    debug!("Injecting {}={}", property, value);
                    property.add_to(report.action_recorder_mut(), merged, value);
                }
                Err(message) => {
                    report.add_error(message, None);
                }
            }
        }
    }
}

fn finish(report: MergingReportBuilder) -> MergingReport {
    let report = report.build();
    report.log();
    if let Some(xml) = report.merged_xml() {
        info!("Merged manifest is {} bytes", xml.len());
    }
    report
}
