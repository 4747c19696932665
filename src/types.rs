//! Type-safe newtypes and wire types for codesearch.
//!
//! Newtypes give compile-time safety for index identifiers; the request and
//! reply structs define the JSON contract of the `/codesearch` endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a file inside the trigram index.
///
/// Using u32 supports ~4 billion files which is sufficient for any corpus,
/// and matches the value domain of `RoaringBitmap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u32);

impl FileId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0;
        write!(f, "file:{id}")
    }
}

impl From<u32> for FileId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<FileId> for u32 {
    fn from(id: FileId) -> Self {
        id.0
    }
}

/// Three-byte trigram for substring indexing.
///
/// A file can only match a literal if it contains every trigram of it:
/// "auth" → ["aut", "uth"].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trigram(pub [u8; 3]);

impl Trigram {
    #[must_use]
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Extracts all trigrams from bytes. Inputs shorter than 3 bytes yield none.
    pub fn from_bytes(bytes: &[u8]) -> impl Iterator<Item = Trigram> + '_ {
        bytes.windows(3).map(|w| Trigram([w[0], w[1], w[2]]))
    }

    /// Builds a trigram from a stored blob, rejecting blobs of the wrong length.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 3]>::try_from(bytes).ok().map(Self)
    }
}

impl fmt::Debug for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(s) = std::str::from_utf8(&self.0) {
            write!(f, "Trigram({s:?})")
        } else {
            let [a, b, c] = self.0;
            write!(f, "Trigram({a:02x}{b:02x}{c:02x})")
        }
    }
}

impl fmt::Display for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(s) = std::str::from_utf8(&self.0) {
            write!(f, "{s}")
        } else {
            let [a, b, c] = self.0;
            write!(f, "{a:02x}{b:02x}{c:02x}")
        }
    }
}

/// A user search specification: the raw expression plus case handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regexp {
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl Regexp {
    #[must_use]
    pub fn new(expr: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            expr: expr.into(),
            case_sensitive,
        }
    }
}

/// Body of a `/codesearch` request.
///
/// `regexp` is optional on the wire so that a request without any search
/// specification can be told apart from one with an empty expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<Regexp>,
}

impl CodeSearchRequest {
    /// Convenience constructor for a request carrying a pattern.
    #[must_use]
    pub fn new(expr: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            regexp: Some(Regexp::new(expr, case_sensitive)),
        }
    }
}

/// One line of source text associated with a single match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub content: String,
    /// 1-based physical line number.
    pub line_number: i32,
}

/// All snippets found in one file, in match order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatch {
    pub filename: String,
    #[serde(default)]
    pub snippet: Vec<Snippet>,
}

/// Reply to a `/codesearch` request. Files appear in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSearchReply {
    #[serde(rename = "match", default)]
    pub matches: Vec<FileMatch>,
}

impl CodeSearchReply {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Total number of snippets across all files.
    #[must_use]
    pub fn snippet_count(&self) -> usize {
        self.matches.iter().map(|m| m.snippet.len()).sum()
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<FileId>();
    assert_send_sync::<Trigram>();
    assert_send_sync::<CodeSearchRequest>();
    assert_send_sync::<CodeSearchReply>();
};
