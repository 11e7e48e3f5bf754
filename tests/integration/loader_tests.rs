//! Loader integration tests
//!
//! Source positions must not depend on the file encoding or on the line
//! ending style.

use encoding_rs::{Encoding, MACINTOSH, WINDOWS_1252};
use manifest_merger::xml::{LoadError, SourceFile, SourceKind, XmlDocument, XmlLoader, ANDROID_URI};
use manifest_merger::NodeType;

const LINES: [&str; 6] = [
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android""#,
    r#"    package="com.example.app">"#,
    r#"    <application android:label="Demo">"#,
    r#"        <activity android:name=".Main" android:exported="true"/>"#,
    r#"    </application>"#,
];

fn text(line_ending: &str) -> String {
    let mut text = LINES.join(line_ending);
    text.push_str(line_ending);
    text.push_str("</manifest>");
    text.push_str(line_ending);
    text
}

fn load(bytes: &[u8]) -> XmlDocument {
    XmlLoader::load_bytes(bytes, SourceFile::in_memory("AndroidManifest.xml", SourceKind::Main)).unwrap()
}

fn utf16(text: &str, big_endian: bool) -> Vec<u8> {
    let mut bytes = if big_endian { vec![0xFE, 0xFF] } else { vec![0xFF, 0xFE] };
    for unit in text.encode_utf16() {
        let pair = if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() };
        bytes.extend_from_slice(&pair);
    }
    bytes
}

fn utf32(text: &str, big_endian: bool, bom: bool) -> Vec<u8> {
    let mut bytes = Vec::new();
    for c in bom.then_some('\u{feff}').into_iter().chain(text.chars()) {
        let scalar = c as u32;
        let quad = if big_endian { scalar.to_be_bytes() } else { scalar.to_le_bytes() };
        bytes.extend_from_slice(&quad);
    }
    bytes
}

/// Text declaring `name`, with a non-ASCII application label, in that charset
fn declared(charset: &'static Encoding, name: &str, line_ending: &str) -> Vec<u8> {
    let text = text(line_ending)
        .replace("utf-8", name)
        .replace("\"Demo\"", "\"Démo\"");
    let (bytes, _, unmappable) = charset.encode(&text);
    assert!(!unmappable);
    bytes.into_owned()
}

/// (line, column) of label, activity, exported
fn positions(document: &XmlDocument) -> [(usize, usize); 3] {
    let application = document.root.find_child(NodeType::Application, None).unwrap();
    let label = application.attribute(Some(ANDROID_URI), "label").unwrap();
    let activity = application.child_elements().next().unwrap();
    let exported = activity.android_attribute("exported").unwrap();
    [
        (label.position.start_line, label.position.start_column),
        (activity.position.start_line, activity.position.start_column),
        (exported.position.start_line, exported.position.start_column),
    ]
}

const EXPECTED: [(usize, usize); 3] = [(4, 18), (5, 9), (5, 40)];

#[test]
fn test_positions_for_each_line_ending() {
    for ending in ["\n", "\r\n", "\r"] {
        let document = load(text(ending).as_bytes());
        assert_eq!(positions(&document), EXPECTED, "line ending {:?}", ending);
    }
}

#[test]
fn test_positions_for_each_encoding() {
    let plain = text("\n");

    let mut with_bom = vec![0xEF, 0xBB, 0xBF];
    with_bom.extend_from_slice(plain.as_bytes());

    let encoded = [
        ("utf-8", plain.as_bytes().to_vec()),
        ("utf-8 bom", with_bom),
        ("utf-16le", utf16(&plain.replace("utf-8", "utf-16"), false)),
        ("utf-16be", utf16(&plain.replace("utf-8", "utf-16"), true)),
    ];
    for (name, bytes) in encoded {
        let document = load(&bytes);
        assert_eq!(positions(&document), EXPECTED, "encoding {}", name);
        assert_eq!(document.package(), Some("com.example.app"), "encoding {}", name);
    }
}

#[test]
fn test_crlf_utf16_combination() {
    let bytes = utf16(&text("\r\n").replace("utf-8", "utf-16"), false);
    assert_eq!(positions(&load(&bytes)), EXPECTED);
}

#[test]
fn test_element_span_covers_start_tag() {
    let document = load(text("\n").as_bytes());
    let activity = document
        .root
        .find_child(NodeType::Application, None)
        .unwrap()
        .child_elements()
        .next()
        .unwrap();
    assert_eq!(activity.position.end_line, 5);
    assert!(activity.position.end_offset > activity.position.start_offset);
}

#[test]
fn test_non_ascii_columns_count_characters() {
    let text = "<manifest package=\"com.a\">\n  <application label=\"日本語\" icon=\"x\"/>\n</manifest>";
    let document = load(text.as_bytes());
    let application = document.root.child_elements().next().unwrap();
    let icon = application.attribute(None, "icon").unwrap();
    assert_eq!((icon.position.start_line, icon.position.start_column), (2, 28));
}

#[test]
fn test_parse_errors_carry_line() {
    let result = XmlLoader::load_str(
        "<manifest>\n  <application>\n  </activity>\n</manifest>",
        SourceFile::in_memory("broken.xml", SourceKind::Library),
    );
    match result {
        Err(LoadError::Parse { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected a parse error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unbound_prefix_is_rejected() {
    let result = XmlLoader::load_str(
        "<manifest><application foo:label=\"x\"/></manifest>",
        SourceFile::in_memory("broken.xml", SourceKind::Main),
    );
    assert!(result.is_err());
}

#[test]
fn test_positions_for_utf32() {
    let plain = text("\n").replace("utf-8", "utf-32");
    for big_endian in [false, true] {
        for bom in [false, true] {
            let document = load(&utf32(&plain, big_endian, bom));
            assert_eq!(positions(&document), EXPECTED, "big endian {} bom {}", big_endian, bom);
        }
    }
}

#[test]
fn test_positions_for_declared_single_byte_charsets() {
    for (charset, name) in [(WINDOWS_1252, "windows-1252"), (MACINTOSH, "MacRoman")] {
        for ending in ["\n", "\r", "\r\n"] {
            let document = load(&declared(charset, name, ending));
            assert_eq!(positions(&document), EXPECTED, "{} {:?}", name, ending);

            let application = document.root.find_child(NodeType::Application, None).unwrap();
            assert_eq!(application.attribute(Some(ANDROID_URI), "label").unwrap().value, "Démo");
        }
    }
}
