//! Integration tests for the merge pipeline
//!
//! These tests run complete merges against the manifests in tests/fixtures
//! and against small manifests written to temporary directories.

use manifest_merger::merger::{Feature, FileStreamProvider, Invoker, ManifestMerger, MergeType, SystemProperty};
use manifest_merger::report::{ActionType, MergeResult, MergingReport, Severity};
use manifest_merger::{MergeFailure, NodeKey, NodeType, XmlDocument, XmlElement};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Get the path to the test fixtures directory
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools""#;

/// Manifest text with the usual namespaces and the given root attributes and body
fn manifest(root_attributes: &str, body: &str) -> String {
    format!("{} {}>\n{}\n</manifest>\n", HEADER, root_attributes, body)
}

/// Serves manifests from memory
#[derive(Default)]
struct MemoryProvider {
    files: HashMap<PathBuf, String>,
}

impl MemoryProvider {
    fn with(mut self, path: &str, text: impl Into<String>) -> Self {
        self.files.insert(PathBuf::from(path), text.into());
        self
    }
}

impl FileStreamProvider for MemoryProvider {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|text| text.as_bytes().to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not in memory"))
    }
}

fn in_memory(main: &str, provider: MemoryProvider) -> Invoker {
    ManifestMerger::new_merger(main).with_file_stream_provider(Box::new(provider))
}

fn merged(report: &MergingReport) -> &XmlDocument {
    report
        .merged_document()
        .unwrap_or_else(|| panic!("no merged document:\n{:#?}", report.records()))
}

fn application(document: &XmlDocument) -> &XmlElement {
    document.root.find_child(NodeType::Application, None).unwrap()
}

fn errors(report: &MergingReport) -> Vec<&str> {
    report
        .records()
        .iter()
        .filter(|r| r.severity == Severity::Error)
        .map(|r| r.message.as_str())
        .collect()
}

// ============================================================================
// Fixture merges
// ============================================================================

fn fixture_merge() -> MergingReport {
    let fixtures = fixtures_path();
    ManifestMerger::new_merger(fixtures.join("app/AndroidManifest.xml"))
        .add_flavor_and_build_type_manifest(fixtures.join("debug/AndroidManifest.xml"))
        .add_library_manifests([("lib", fixtures.join("lib/AndroidManifest.xml"))])
        .merge()
        .unwrap()
}

#[test]
fn test_fixture_merge_succeeds() {
    let report = fixture_merge();
    assert!(!report.has_errors(), "{:#?}", report.records());
    assert!(report.result().is_success());

    let document = merged(&report);
    assert_eq!(document.package(), Some("com.example.app"));

    let app = application(document);
    assert_eq!(app.android_attribute("label").unwrap().value, "@string/app_name");
    assert_eq!(app.android_attribute("theme").unwrap().value, "@style/LibTheme");
    assert_eq!(app.android_attribute("debuggable").unwrap().value, "true");
    assert!(app.find_child(NodeType::Activity, Some("com.example.lib.LibActivity")).is_some());
    assert!(app.find_child(NodeType::Service, Some("com.example.lib.SyncService")).is_some());
}

#[test]
fn test_fixture_merge_output_is_clean() {
    let report = fixture_merge();
    let xml = report.merged_xml().unwrap();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert!(!xml.contains("tools:"));
    assert!(!xml.contains("xmlns:tools"));
    assert!(!xml.contains("${"));
    assert_eq!(xml.matches("android.permission.INTERNET").count(), 1);
    assert!(xml.contains("android.permission.CAMERA"));
    assert!(xml.contains("<!-- Launcher entry point -->"));
}

#[test]
fn test_fixture_merge_records_actions() {
    let report = fixture_merge();
    let actions = report.actions();

    let lib_activity = NodeKey::new("activity", Some("com.example.lib.LibActivity"));
    assert_eq!(actions.node_records(&lib_activity)[0].action_type, ActionType::Added);

    let application = NodeKey::new("application", None);
    let label = actions.attribute_records(&application, "android:label");
    assert!(label.iter().any(|r| r.action_type == ActionType::Rejected));

    let provider = NodeKey::new("provider", Some("com.example.app.DataProvider"));
    let authorities = actions.attribute_records(&provider, "android:authorities");
    assert_eq!(authorities.last().unwrap().action_type, ActionType::Injected);

    let blame = report.blame();
    assert!(blame.contains("activity#com.example.lib.LibActivity"));
    assert!(blame.contains("ADDED from"));
}

#[test]
fn test_intermediary_stages_are_kept() {
    let fixtures = fixtures_path();
    let report = ManifestMerger::new_merger(fixtures.join("app/AndroidManifest.xml"))
        .add_flavor_and_build_type_manifest(fixtures.join("debug/AndroidManifest.xml"))
        .add_library_manifest(fixtures.join("lib/AndroidManifest.xml"))
        .with_features([Feature::KeepIntermediaryStages])
        .merge()
        .unwrap();

    // overlay, main, library
    assert_eq!(report.intermediary_stages().len(), 3);
    assert!(report.intermediary_stages()[2].contains("LibActivity"));
}

// ============================================================================
// Priority and idempotence
// ============================================================================

#[test]
fn test_overlay_wins_over_main_and_library() {
    let provider = MemoryProvider::default()
        .with("main.xml", manifest(r#"package="com.app" android:versionCode="2""#, ""))
        .with("overlay.xml", manifest(r#"android:versionCode="3""#, ""))
        .with("lib.xml", manifest(r#"package="com.lib" android:versionCode="1""#, ""));

    let report = in_memory("main.xml", provider)
        .add_flavor_and_build_type_manifest("overlay.xml")
        .add_library_manifests([("lib", "lib.xml")])
        .merge()
        .unwrap();

    let document = merged(&report);
    assert_eq!(document.root.android_attribute("versionCode").unwrap().value, "3");
    assert_eq!(document.package(), Some("com.app"));
}

#[test]
fn test_first_overlay_has_highest_priority() {
    let provider = MemoryProvider::default()
        .with("main.xml", manifest(r#"package="com.app""#, "<application android:label=\"main\"/>"))
        .with("release.xml", manifest("", "<application android:label=\"release\"/>"))
        .with("paid.xml", manifest("", "<application android:label=\"paid\"/>"));

    let report = in_memory("main.xml", provider)
        .add_flavor_and_build_type_manifests(["release.xml", "paid.xml"])
        .merge()
        .unwrap();

    assert_eq!(application(merged(&report)).android_attribute("label").unwrap().value, "release");
}

#[test]
fn test_merging_merged_manifest_is_idempotent() {
    let report = fixture_merge();
    let first = merged(&report).clone();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AndroidManifest.xml");
    std::fs::write(&path, report.merged_xml().unwrap()).unwrap();

    let again = ManifestMerger::new_merger(&path).merge().unwrap();
    let second = merged(&again);
    assert_eq!(first.compare_to(second), None);
    assert_eq!(again.merged_xml(), report.merged_xml());
}

#[test]
fn test_merged_manifest_merged_with_itself_as_library_is_unchanged() {
    let report = fixture_merge();
    let first = merged(&report).clone();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AndroidManifest.xml");
    std::fs::write(&path, report.merged_xml().unwrap()).unwrap();

    let again = ManifestMerger::new_merger(&path)
        .add_library_manifests([("self", &path)])
        .merge()
        .unwrap();
    assert!(errors(&again).is_empty(), "{:?}", errors(&again));
    assert_eq!(first.compare_to(merged(&again)), None);
}

#[test]
fn test_lower_overlay_root_attributes_are_reduced() {
    let provider = MemoryProvider::default()
        .with("main.xml", manifest(r#"package="com.app""#, "<application/>"))
        .with("flavor.xml", manifest("", "<application/>"))
        .with("debug.xml", manifest(r#"android:versionName="2.0-debug""#, "<application/>"));

    let report = in_memory("main.xml", provider)
        .add_flavor_and_build_type_manifests(["flavor.xml", "debug.xml"])
        .merge()
        .unwrap();

    let document = merged(&report);
    assert_eq!(document.root.android_attribute("versionName").unwrap().value, "2.0-debug");
    assert_eq!(document.package(), Some("com.app"));
}

// ============================================================================
// Conflicts and instructions
// ============================================================================

#[test]
fn test_permission_conflict_fails_merge() {
    let fixtures = fixtures_path();
    let report = ManifestMerger::new_merger(fixtures.join("conflict/main.xml"))
        .add_library_manifests([("sync", fixtures.join("conflict/lib.xml"))])
        .merge()
        .unwrap();

    assert!(report.has_errors());
    assert_eq!(report.result(), MergeResult::Error);
    assert!(report.merged_document().is_none());
    assert!(errors(&report)
        .iter()
        .any(|m| m.contains("permission#com.example.permission.SYNC")));
}

#[test]
fn test_remove_instruction_drops_library_element() {
    let provider = MemoryProvider::default()
        .with(
            "main.xml",
            manifest(
                r#"package="com.app""#,
                r#"<uses-permission android:name="android.permission.CAMERA" tools:node="remove"/>"#,
            ),
        )
        .with(
            "lib.xml",
            manifest(
                r#"package="com.lib""#,
                r#"<uses-permission android:name="android.permission.CAMERA"/>"#,
            ),
        );

    let report = in_memory("main.xml", provider)
        .add_library_manifests([("lib", "lib.xml")])
        .merge()
        .unwrap();

    let xml = report.merged_xml().unwrap();
    assert!(!xml.contains("CAMERA"), "{}", xml);
}

#[test]
fn test_selector_scopes_removal_to_one_library() {
    let permission = r#"<uses-permission android:name="android.permission.CAMERA"/>"#;
    let provider = MemoryProvider::default()
        .with(
            "main.xml",
            manifest(
                r#"package="com.app""#,
                r#"<uses-permission android:name="android.permission.CAMERA" tools:node="remove" tools:selector="com.lib.a"/>"#,
            ),
        )
        .with("a.xml", manifest(r#"package="com.lib.a""#, permission))
        .with("b.xml", manifest(r#"package="com.lib.b""#, permission));

    let report = in_memory("main.xml", provider)
        .add_library_manifests([("a", "a.xml"), ("b", "b.xml")])
        .merge()
        .unwrap();

    // b's copy is kept, the removal marker itself is cleaned away
    let xml = report.merged_xml().unwrap();
    assert_eq!(xml.matches("android.permission.CAMERA").count(), 1, "{}", xml);
}

#[test]
fn test_unknown_selector_is_an_error() {
    let provider = MemoryProvider::default().with(
        "main.xml",
        manifest(
            r#"package="com.app""#,
            r#"<uses-permission android:name="p" tools:node="remove" tools:selector="com.missing"/>"#,
        ),
    );

    let report = in_memory("main.xml", provider).merge().unwrap();
    assert!(report.has_errors());
    assert!(errors(&report).iter().any(|m| m.contains("com.missing")));
}

#[test]
fn test_library_merge_keeps_instructions() {
    let provider = MemoryProvider::default()
        .with(
            "main.xml",
            manifest(
                r#"package="com.app""#,
                r#"<application android:label="App" tools:replace="android:label"/>"#,
            ),
        )
        .with("lib.xml", manifest(r#"package="com.lib""#, r#"<application android:label="Lib"/>"#));

    let report = Invoker::new("main.xml", MergeType::Library)
        .with_file_stream_provider(Box::new(provider))
        .add_library_manifests([("lib", "lib.xml")])
        .merge()
        .unwrap();

    let app = application(merged(&report));
    assert_eq!(app.android_attribute("label").unwrap().value, "App");
    assert!(app.tools_attribute("replace").is_some());
}

#[test]
fn test_library_merge_type_forces_main_package() {
    let provider = MemoryProvider::default()
        .with("main.xml", manifest(r#"package="com.app""#, "<application/>"))
        .with("lib.xml", manifest(r#"package="com.lib""#, r#"<application><activity android:name=".Lib"/></application>"#));

    let report = Invoker::new("main.xml", MergeType::Library)
        .with_file_stream_provider(Box::new(provider))
        .add_library_manifests([("lib", "lib.xml")])
        .merge()
        .unwrap();

    let document = merged(&report);
    assert_eq!(document.package(), Some("com.app"));
    // library class names stay qualified against their own package
    assert!(application(document)
        .find_child(NodeType::Activity, Some("com.lib.Lib"))
        .is_some());
}

// ============================================================================
// Placeholders and system properties
// ============================================================================

#[test]
fn test_placeholder_substitution() {
    let provider = MemoryProvider::default().with(
        "main.xml",
        manifest(
            r#"package="com.app""#,
            r#"<application><provider android:name=".P" android:authorities="${applicationId}.provider"/><meta-data android:name="host" android:value="${host}"/></application>"#,
        ),
    );

    let report = in_memory("main.xml", provider)
        .set_placeholder_value("applicationId", "com.example.app")
        .set_placeholder_value("host", "example.com")
        .merge()
        .unwrap();

    let app = application(merged(&report));
    let provider = app.find_child(NodeType::Provider, Some("com.app.P")).unwrap();
    assert_eq!(provider.android_attribute("authorities").unwrap().value, "com.example.app.provider");
    let meta = app.find_child(NodeType::MetaData, Some("host")).unwrap();
    assert_eq!(meta.android_attribute("value").unwrap().value, "example.com");
}

#[test]
fn test_unresolved_placeholder_is_an_error() {
    let provider = MemoryProvider::default().with(
        "main.xml",
        manifest(
            r#"package="com.app""#,
            r#"<application android:label="${appName}"/>"#,
        ),
    );

    let report = in_memory("main.xml", provider).merge().unwrap();
    assert!(report.has_errors());
    assert!(report.merged_xml().is_none());
    assert!(errors(&report).iter().any(|m| m.contains("<appName>")));
}

#[test]
fn test_placeholders_left_alone_when_disabled() {
    let provider = MemoryProvider::default().with(
        "main.xml",
        manifest(r#"package="com.app""#, r#"<application android:label="${appName}"/>"#),
    );

    let report = in_memory("main.xml", provider)
        .with_features([Feature::NoPlaceholderReplacement])
        .merge()
        .unwrap();
    assert_eq!(application(merged(&report)).android_attribute("label").unwrap().value, "${appName}");
}

#[test]
fn test_package_override_feeds_application_id() {
    let provider = MemoryProvider::default().with(
        "main.xml",
        manifest(
            r#"package="com.app""#,
            r#"<application><provider android:name="com.app.P" android:authorities="${applicationId}"/></application>"#,
        ),
    );

    let report = in_memory("main.xml", provider)
        .set_override(SystemProperty::Package, "com.app.debug")
        .merge()
        .unwrap();

    let document = merged(&report);
    assert_eq!(document.package(), Some("com.app.debug"));
    let provider = application(document).child_elements().next().unwrap();
    assert_eq!(provider.android_attribute("authorities").unwrap().value, "com.app.debug");
}

#[test]
fn test_min_sdk_override_synthesizes_uses_sdk() {
    let provider = MemoryProvider::default().with("main.xml", manifest(r#"package="com.app""#, "<application/>"));

    let report = in_memory("main.xml", provider)
        .set_override(SystemProperty::MinSdkVersion, "21")
        .merge()
        .unwrap();

    let document = merged(&report);
    let uses_sdk = document.root.find_child(NodeType::UsesSdk, None).unwrap();
    assert_eq!(uses_sdk.android_attribute("minSdkVersion").unwrap().value, "21");
    assert!(report.merged_xml().unwrap().contains("<uses-sdk android:minSdkVersion=\"21\" />"));

    let key = NodeKey::new("uses-sdk", None);
    assert_eq!(report.actions().node_records(&key)[0].action_type, ActionType::Injected);
}

#[test]
fn test_version_overrides_replace_manifest_values() {
    let provider = MemoryProvider::default().with(
        "main.xml",
        manifest(r#"package="com.app" android:versionCode="1" android:versionName="1.0""#, ""),
    );

    let report = in_memory("main.xml", provider)
        .set_override(SystemProperty::VersionCode, "42")
        .set_override(SystemProperty::VersionName, "4.2")
        .merge()
        .unwrap();

    let root = &merged(&report).root;
    assert_eq!(root.android_attribute("versionCode").unwrap().value, "42");
    assert_eq!(root.android_attribute("versionName").unwrap().value, "4.2");
}

#[test]
fn test_invalid_override_is_an_error() {
    let provider = MemoryProvider::default().with("main.xml", manifest(r#"package="com.app""#, ""));

    let report = in_memory("main.xml", provider)
        .set_override(SystemProperty::VersionCode, "forty-two")
        .merge()
        .unwrap();
    assert!(report.has_errors());
}

// ============================================================================
// Fatal failures
// ============================================================================

#[test]
fn test_missing_file_is_io_failure() {
    let result = in_memory("missing.xml", MemoryProvider::default()).merge();
    assert!(matches!(result, Err(MergeFailure::Io { .. })));
}

#[test]
fn test_malformed_library_is_parse_failure() {
    let provider = MemoryProvider::default()
        .with("main.xml", manifest(r#"package="com.app""#, ""))
        .with("lib.xml", "<manifest>\n  <application>\n</manifest>");

    let result = in_memory("main.xml", provider)
        .add_library_manifests([("lib", "lib.xml")])
        .merge();
    match result {
        Err(MergeFailure::Parse { path, line, .. }) => {
            assert_eq!(path, PathBuf::from("lib.xml"));
            assert!(line >= 2);
        }
        Err(other) => panic!("unexpected failure {}", other),
        Ok(_) => panic!("malformed library merged"),
    }
}

#[test]
fn test_empty_main_path_is_invalid() {
    let result = ManifestMerger::new_merger("").merge();
    assert!(matches!(result, Err(MergeFailure::InvalidInvocation(_))));
}

#[test]
fn test_wrong_root_element_is_reported() {
    let provider = MemoryProvider::default().with("main.xml", "<application/>");
    let report = in_memory("main.xml", provider).merge().unwrap();
    assert!(report.has_errors());
    assert!(report.merged_document().is_none());
}
