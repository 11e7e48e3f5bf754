use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a manifest came from in the merge invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Main,
    Library,
    Overlay,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Main => "main",
            SourceKind::Library => "library",
            SourceKind::Overlay => "overlay",
        }
    }
}

/// Identity of a loaded manifest file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Location on disk, absent for in-memory sources
    pub path: Option<PathBuf>,
    /// Alias given by the caller (library name)
    pub name: Option<String>,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: Some(path.into()),
            name: None,
            kind,
        }
    }

    pub fn in_memory(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            path: None,
            name: Some(name.into()),
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Printable form, optionally using only the file name
    pub fn describe(&self, simple: bool) -> String {
        match (&self.path, &self.name) {
            (Some(path), _) if simple => simple_name(path),
            (Some(path), _) => path.display().to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => "[unknown]".to_string(),
        }
    }
}

fn simple_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(false))
    }
}

/// A span in the original text.
///
/// Lines and columns are 1-based; offsets are 0-based character offsets into
/// the decoded text, so they do not depend on the file encoding. The end is
/// exclusive. A zero start line means the position is unknown (synthesized
/// nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourcePosition {
    pub start_line: usize,
    pub start_column: usize,
    pub start_offset: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub end_offset: usize,
}

impl SourcePosition {
    pub const UNKNOWN: SourcePosition = SourcePosition {
        start_line: 0,
        start_column: 0,
        start_offset: 0,
        end_line: 0,
        end_column: 0,
        end_offset: 0,
    };

    pub fn is_known(&self) -> bool {
        self.start_line > 0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.start_line, self.start_column)
        } else {
            write!(f, "?")
        }
    }
}

/// A file plus a position inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Arc<SourceFile>,
    pub position: SourcePosition,
}

impl SourceLocation {
    pub fn new(file: Arc<SourceFile>, position: SourcePosition) -> Self {
        Self { file, position }
    }

    pub fn describe(&self, simple: bool) -> String {
        if self.position.is_known() {
            format!("{}:{}", self.file.describe(simple), self.position)
        } else {
            self.file.describe(simple)
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(false))
    }
}

/// Maps byte offsets of a decoded document to line/column/character offsets.
///
/// `\n`, `\r` and `\r\n` each terminate exactly one line.
pub(crate) struct LineIndex {
    /// (byte offset, char offset) of the first character of every line
    starts: Vec<(usize, usize)>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![(0, 0)];
        let mut chars = text.char_indices().peekable();
        let mut char_count = 0;

        while let Some((i, c)) = chars.next() {
            char_count += 1;
            match c {
                '\n' => starts.push((i + 1, char_count)),
                '\r' => {
                    if let Some(&(_, '\n')) = chars.peek() {
                        chars.next();
                        char_count += 1;
                        starts.push((i + 2, char_count));
                    } else {
                        starts.push((i + 1, char_count));
                    }
                }
                _ => {}
            }
        }

        Self { starts }
    }

    /// Returns (line, column, char offset) for a byte offset on a char boundary
    pub fn locate(&self, text: &str, byte: usize) -> (usize, usize, usize) {
        let byte = byte.min(text.len());
        let line = match self.starts.binary_search_by_key(&byte, |&(b, _)| b) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let (line_byte, line_char) = self.starts[line];
        let column = text[line_byte..byte].chars().count();
        (line + 1, column + 1, line_char + column)
    }

    pub fn span(&self, text: &str, start: usize, end: usize) -> SourcePosition {
        let (start_line, start_column, start_offset) = self.locate(text, start);
        let (end_line, end_column, end_offset) = self.locate(text, end);
        SourcePosition {
            start_line,
            start_column,
            start_offset,
            end_line,
            end_column,
            end_offset,
        }
    }
}
