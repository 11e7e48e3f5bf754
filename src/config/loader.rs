use crate::merger::{Feature, Invoker, MergeType, SystemProperty};
use crate::report::ReportFormat;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration describing one manifest merge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Main manifest
    pub main: Option<PathBuf>,

    /// Flavor and build type manifests, highest priority first
    pub overlays: Vec<PathBuf>,

    /// Library manifests, highest priority first
    pub libraries: Vec<LibraryConfig>,

    /// application or library
    pub merge_type: MergeType,

    /// Values for `${name}` placeholders
    pub placeholders: BTreeMap<String, String>,

    /// Forced manifest values
    pub properties: PropertyConfig,

    pub features: FeatureConfig,

    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Name used in messages and blame output
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyConfig {
    pub package: Option<String>,
    pub version_code: Option<String>,
    pub version_name: Option<String>,
    pub min_sdk_version: Option<String>,
    pub target_sdk_version: Option<String>,
    pub max_sdk_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub keep_intermediary_stages: bool,
    pub print_simple_filenames: bool,
    pub no_placeholder_replacement: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json
    pub format: ReportFormat,

    /// Report file for the json format
    pub output: Option<PathBuf>,

    /// Write the blame log to this file
    pub blame: Option<PathBuf>,
}

impl PropertyConfig {
    /// Set properties in a stable order
    pub fn overrides(&self) -> Vec<(SystemProperty, &str)> {
        let values = [
            (SystemProperty::Package, &self.package),
            (SystemProperty::VersionCode, &self.version_code),
            (SystemProperty::VersionName, &self.version_name),
            (SystemProperty::MinSdkVersion, &self.min_sdk_version),
            (SystemProperty::TargetSdkVersion, &self.target_sdk_version),
            (SystemProperty::MaxSdkVersion, &self.max_sdk_version),
        ];
        values
            .into_iter()
            .filter_map(|(property, value)| value.as_deref().map(|v| (property, v)))
            .collect()
    }
}

impl FeatureConfig {
    pub fn enabled(&self) -> Vec<Feature> {
        let mut features = Vec::new();
        if self.keep_intermediary_stages {
            features.push(Feature::KeepIntermediaryStages);
        }
        if self.print_simple_filenames {
            features.push(Feature::PrintSimpleFilenames);
        }
        if self.no_placeholder_replacement {
            features.push(Feature::NoPlaceholderReplacement);
        }
        features
    }
}

impl MergeConfig {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config")?,
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config")?,
            _ => match serde_yaml::from_str(&contents) {
                Ok(config) => config,
                Err(_) => toml::from_str(&contents)
                    .into_diagnostic()
                    .wrap_err("Failed to parse config file")?,
            },
        };

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(dir: &Path) -> Result<Self> {
        let default_names = [
            ".manifest-merger.yml",
            ".manifest-merger.yaml",
            ".manifest-merger.toml",
            "manifest-merger.yml",
            "manifest-merger.yaml",
            "manifest-merger.toml",
        ];

        for name in &default_names {
            let path = dir.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Relative manifest paths are relative to the config file
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        if let Some(main) = self.main.as_mut() {
            resolve(main);
        }
        self.overlays.iter_mut().for_each(resolve);
        self.libraries.iter_mut().for_each(|l| resolve(&mut l.path));
    }

    /// Build the merge invocation this configuration describes
    pub fn to_invoker(&self) -> Result<Invoker> {
        let main = self
            .main
            .clone()
            .ok_or_else(|| miette::miette!("No main manifest configured"))?;

        let mut invoker = Invoker::new(main, self.merge_type)
            .add_flavor_and_build_type_manifests(self.overlays.iter().cloned())
            .add_library_manifests(self.libraries.iter().map(|l| (l.name.clone(), l.path.clone())))
            .set_placeholder_values(self.placeholders.clone())
            .with_features(self.features.enabled());

        for (property, value) in self.properties.overrides() {
            invoker = invoker.set_override(property, value);
        }
        Ok(invoker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = MergeConfig::default();
        assert!(config.main.is_none());
        assert_eq!(config.merge_type, MergeType::Application);
        assert_eq!(config.report.format, ReportFormat::Terminal);
        assert!(config.features.enabled().is_empty());
    }

    #[test]
    fn test_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest-merger.yml");
        fs::write(
            &path,
            r#"
main: app/AndroidManifest.xml
overlays: [debug/AndroidManifest.xml]
libraries:
  - name: lib1
    path: /abs/lib1.xml
merge_type: library
placeholders:
  host: example.com
properties:
  min_sdk_version: "21"
features:
  print_simple_filenames: true
report:
  format: json
"#,
        )
        .unwrap();

        let config = MergeConfig::from_default_locations(dir.path()).unwrap();
        assert_eq!(config.main, Some(dir.path().join("app/AndroidManifest.xml")));
        assert_eq!(config.overlays, vec![dir.path().join("debug/AndroidManifest.xml")]);
        assert_eq!(config.libraries[0].path, PathBuf::from("/abs/lib1.xml"));
        assert_eq!(config.merge_type, MergeType::Library);
        assert_eq!(config.placeholders["host"], "example.com");
        assert_eq!(
            config.properties.overrides(),
            vec![(SystemProperty::MinSdkVersion, "21")]
        );
        assert_eq!(config.features.enabled(), vec![Feature::PrintSimpleFilenames]);
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.toml");
        fs::write(
            &path,
            r#"
main = "AndroidManifest.xml"

[properties]
package = "com.example.app"
version_code = "3"

[features]
keep_intermediary_stages = true
"#,
        )
        .unwrap();

        let config = MergeConfig::from_file(&path).unwrap();
        assert_eq!(config.properties.package.as_deref(), Some("com.example.app"));
        assert_eq!(config.properties.overrides().len(), 2);
        assert!(config.to_invoker().is_ok());
    }

    #[test]
    fn test_missing_main_is_rejected() {
        assert!(MergeConfig::default().to_invoker().is_err());
    }

    #[test]
    fn test_no_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MergeConfig::from_default_locations(dir.path()).unwrap();
        assert!(config.libraries.is_empty());
    }
}
