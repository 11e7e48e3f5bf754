//! Positional XML document model for manifests
//!
//! Documents are owned trees: merging clones the higher priority tree and
//! folds lower priority content into the clone, so inputs are never aliased.

mod document;
pub mod encoding;
mod loader;
mod node;
mod position;
mod printer;

pub use document::XmlDocument;
pub use loader::{LoadError, XmlLoader};
pub use node::{NamespaceDecl, QName, XmlAttribute, XmlElement, XmlNode, XmlText};
pub use position::{SourceFile, SourceKind, SourceLocation, SourcePosition};

pub const ANDROID_URI: &str = "http://schemas.android.com/apk/res/android";
pub const TOOLS_URI: &str = "http://schemas.android.com/tools";
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
