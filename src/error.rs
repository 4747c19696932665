//! Error types for codesearch.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation.

use crate::security::SecurityError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level server error.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    Migration { expected: u32, found: String },
}

/// Failures turning a user expression into a matcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Empty search regexp provided")]
    Empty,

    #[error("Invalid regex pattern: {0}")]
    Syntax(String),
}

/// Search pipeline errors. Every variant is terminal for its request.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("No search regexp provided")]
    MissingPattern,

    #[error("Search regexp compilation error: {0}")]
    QueryCompilation(#[from] PatternError),

    #[error("Index query failed: {0}")]
    IndexQuery(String),

    #[error("Search in file contents failed for {ticket}: {source}")]
    ContentFetch {
        ticket: String,
        #[source]
        source: ContentError,
    },
}

/// Content service errors.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("File read error for {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Decorations request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decorations request returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid source text encoding: {0}")]
    Decode(String),

    #[error("Content fetch timed out after {millis}ms")]
    Timeout { millis: u128 },
}

/// Indexing errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Walk error: {0}")]
    Walk(String),

    #[error("Index corruption detected: {0}")]
    Corruption(String),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for database operations.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Result type alias for content fetches.
pub type ContentResult<T> = std::result::Result<T, ContentError>;

// Error code implementations for machine-readable error responses
impl ServerError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(e) => e.code(),
            Self::Search(e) => e.code(),
            Self::Index(e) => e.code(),
            Self::Content(e) => e.code(),
        }
    }
}

impl DbError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Migration { .. } => "MIGRATION_ERROR",
        }
    }
}

impl PatternError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY_PATTERN",
            Self::Syntax(_) => "PATTERN_SYNTAX",
        }
    }
}

impl SearchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPattern => "MISSING_PATTERN",
            Self::QueryCompilation(e) => e.code(),
            Self::IndexQuery(_) => "INDEX_QUERY_ERROR",
            Self::ContentFetch { .. } => "CONTENT_FETCH_ERROR",
        }
    }

    /// True when the request itself was at fault rather than the backends.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingPattern | Self::QueryCompilation(_))
    }
}

impl ContentError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "FILE_READ_ERROR",
            Self::Security(e) => e.code(),
            Self::Http(_) => "HTTP_ERROR",
            Self::Status { .. } => "HTTP_STATUS",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }
}

impl IndexError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Walk(_) => "WALK_ERROR",
            Self::Corruption(_) => "INDEX_CORRUPT",
        }
    }
}
