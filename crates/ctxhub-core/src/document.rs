//! Document context handed to selectors and resolvers.

use serde::{Deserialize, Serialize};

/// Zero-based line/character position in a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// The document a completion is requested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    /// Document URI (e.g. `file:///src/main.ts`).
    pub uri: String,
    /// Language identifier (e.g. `typescript`).
    pub language_id: String,
    /// Document version, incremented on every edit.
    pub version: i32,
    /// Cursor offset in UTF-16 code units.
    pub offset: usize,
    /// Cursor position.
    pub position: Position,
}

impl DocumentContext {
    /// Create a document context positioned at the start of the document.
    pub fn new(uri: impl Into<String>, language_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            version: 1,
            offset: 0,
            position: Position::default(),
        }
    }

    /// The path component of the URI, with any `scheme://` prefix stripped.
    pub fn path(&self) -> &str {
        self.uri
            .split_once("://")
            .map_or(self.uri.as_str(), |(_, rest)| rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_strips_scheme() {
        let doc = DocumentContext::new("file:///src/main.ts", "typescript");
        assert_eq!(doc.path(), "/src/main.ts");
    }

    #[test]
    fn test_path_without_scheme() {
        let doc = DocumentContext::new("untitled-1", "md");
        assert_eq!(doc.path(), "untitled-1");
    }

    #[test]
    fn test_serializes_camel_case() {
        let doc = DocumentContext::new("file:///test.txt", "md");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["languageId"], "md");
        assert_eq!(json["position"]["line"], 0);
    }
}
