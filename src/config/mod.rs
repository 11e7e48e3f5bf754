mod loader;

pub use loader::{FeatureConfig, LibraryConfig, MergeConfig, PropertyConfig, ReportConfig};
