// Byte-order-mark and encoding declaration handling for manifest sources

use encoding_rs::{Encoding, REPLACEMENT, UTF_16BE, UTF_16LE, UTF_8};
use std::borrow::Cow;
use std::fmt;

/// Text encodings a manifest may be stored in.
///
/// Everything `encoding_rs` knows is a `Charset`. UTF-32 has no
/// `encoding_rs` codec and is decoded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Charset(&'static Encoding),
    Utf32Le,
    Utf32Be,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Charset(charset) => charset.name(),
            TextEncoding::Utf32Le => "UTF-32LE",
            TextEncoding::Utf32Be => "UTF-32BE",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the encoding of `bytes` and decode them, dropping any BOM.
///
/// Detection order: byte-order mark, then the layout of the first `<?` bytes,
/// then the `encoding=` pseudo-attribute of the XML declaration, then UTF-8.
pub fn decode(bytes: &[u8]) -> Result<(String, TextEncoding), String> {
    let (encoding, bom_len) = detect(bytes)?;
    let body = &bytes[bom_len..];

    let text = match encoding {
        TextEncoding::Charset(charset) => charset
            .decode_without_bom_handling_and_without_replacement(body)
            .map(Cow::into_owned)
            .ok_or_else(|| format!("Invalid {} content", charset.name()))?,
        TextEncoding::Utf32Le => decode_utf32(body, u32::from_le_bytes)?,
        TextEncoding::Utf32Be => decode_utf32(body, u32::from_be_bytes)?,
    };

    let text = match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    };

    Ok((text, encoding))
}

fn detect(bytes: &[u8]) -> Result<(TextEncoding, usize), String> {
    use TextEncoding::{Charset, Utf32Be, Utf32Le};

    match bytes {
        [0x00, 0x00, 0xFE, 0xFF, ..] => return Ok((Utf32Be, 4)),
        [0xFF, 0xFE, 0x00, 0x00, ..] => return Ok((Utf32Le, 4)),
        [0xEF, 0xBB, 0xBF, ..] => return Ok((Charset(UTF_8), 3)),
        [0xFE, 0xFF, ..] => return Ok((Charset(UTF_16BE), 2)),
        [0xFF, 0xFE, ..] => return Ok((Charset(UTF_16LE), 2)),
        [0x00, 0x00, 0x00, 0x3C, ..] => return Ok((Utf32Be, 0)),
        [0x3C, 0x00, 0x00, 0x00, ..] => return Ok((Utf32Le, 0)),
        [0x00, 0x3C, 0x00, 0x3F, ..] => return Ok((Charset(UTF_16BE), 0)),
        [0x3C, 0x00, 0x3F, 0x00, ..] => return Ok((Charset(UTF_16LE), 0)),
        _ => {}
    }

    match declared_encoding(bytes) {
        None => Ok((Charset(UTF_8), 0)),
        Some(label) => charset_for_label(&label)
            .map(|charset| (Charset(charset), 0))
            .ok_or_else(|| format!("Unsupported encoding declaration: {}", label)),
    }
}

/// Map a declared charset name to a decoder for an ASCII-compatible file
fn charset_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().to_ascii_lowercase();
    // Java charset names with no WHATWG label
    let label = match label.as_str() {
        "macroman" | "mac-roman" | "x-macroman" => "macintosh",
        l if l.starts_with("utf-32") || l == "ucs-4" => "utf-8",
        l => l,
    };
    let charset = Encoding::for_label(label.as_bytes())?;
    if charset == REPLACEMENT {
        return None;
    }
    // An ASCII-compatible prefix cannot really be UTF-16, fall back
    Some(if charset.is_ascii_compatible() { charset } else { UTF_8 })
}

/// Read `encoding="..."` out of an ASCII-compatible XML declaration
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    let decl = String::from_utf8_lossy(&bytes[..end]);
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_string())
}

fn decode_utf32(body: &[u8], to_scalar: fn([u8; 4]) -> u32) -> Result<String, String> {
    if body.len() % 4 != 0 {
        return Err("Truncated UTF-32 content".to_string());
    }
    body.chunks_exact(4)
        .map(|c| {
            let scalar = to_scalar([c[0], c[1], c[2], c[3]]);
            char::from_u32(scalar).ok_or_else(|| format!("Invalid UTF-32 scalar 0x{:X}", scalar))
        })
        .collect()
}
