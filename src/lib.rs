//! manifest-merger - Android manifest merging
//!
//! Combines a main `AndroidManifest.xml` with flavor/build type overlays and
//! library manifests into a single manifest, following the `tools:`
//! merge instructions found in the inputs.
//!
//! # Architecture
//!
//! The merge pipeline consists of:
//! 1. **Loading** - Decode and parse each manifest, keeping source positions
//! 2. **Validation** - Check each document before it is merged
//! 3. **Merging** - Fold overlays, the main manifest and libraries together
//! 4. **Post-processing** - Trim, substitute placeholders, inject properties
//! 5. **Reporting** - Records, action history and the merged document

pub mod config;
pub mod merger;
pub mod model;
pub mod report;
pub mod xml;

pub use config::MergeConfig;
pub use merger::{Feature, FileStreamProvider, Invoker, ManifestMerger, MergeFailure, MergeType, SystemProperty};
pub use model::{NodeKey, NodeType};
pub use report::{MergeResult, MergingReport, ReportFormat, Reporter, Severity};
pub use xml::{XmlDocument, XmlElement, XmlLoader};
