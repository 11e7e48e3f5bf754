use super::{Feature, ManifestMerger, MergeFailure, MergeType, SystemProperty};
use crate::report::MergingReport;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Source of manifest bytes
pub trait FileStreamProvider {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads manifests from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStreamProvider;

impl FileStreamProvider for FsStreamProvider {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Builder collecting everything one merge needs.
///
/// Overlays and libraries are given highest priority first.
pub struct Invoker {
    pub(super) main: PathBuf,
    pub(super) merge_type: MergeType,
    pub(super) overlays: Vec<PathBuf>,
    pub(super) libraries: Vec<(String, PathBuf)>,
    pub(super) features: Vec<Feature>,
    pub(super) placeholders: BTreeMap<String, String>,
    pub(super) overrides: BTreeMap<SystemProperty, String>,
    pub(super) provider: Box<dyn FileStreamProvider>,
}

impl Invoker {
    pub fn new(main: impl Into<PathBuf>, merge_type: MergeType) -> Self {
        Self {
            main: main.into(),
            merge_type,
            overlays: Vec::new(),
            libraries: Vec::new(),
            features: Vec::new(),
            placeholders: BTreeMap::new(),
            overrides: BTreeMap::new(),
            provider: Box::new(FsStreamProvider),
        }
    }

    pub fn set_override(mut self, property: SystemProperty, value: impl Into<String>) -> Self {
        self.overrides.insert(property, value.into());
        self
    }

    pub fn set_placeholder_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.insert(name.into(), value.into());
        self
    }

    pub fn set_placeholder_values<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.placeholders
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a library named after its path
    pub fn add_library_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        self.libraries.push((name, path));
        self
    }

    pub fn add_library_manifests<N, P>(mut self, libraries: impl IntoIterator<Item = (N, P)>) -> Self
    where
        N: Into<String>,
        P: Into<PathBuf>,
    {
        self.libraries
            .extend(libraries.into_iter().map(|(n, p)| (n.into(), p.into())));
        self
    }

    pub fn add_flavor_and_build_type_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.overlays.push(path.into());
        self
    }

    pub fn add_flavor_and_build_type_manifests<P: Into<PathBuf>>(
        mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> Self {
        self.overlays.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        for feature in features {
            if !self.features.contains(&feature) {
                self.features.push(feature);
            }
        }
        self
    }

    pub fn with_file_stream_provider(mut self, provider: Box<dyn FileStreamProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn merge(self) -> Result<MergingReport, MergeFailure> {
        ManifestMerger::from(self).merge()
    }
}
