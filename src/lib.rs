//! codesearch: regex code search over a trigram-indexed corpus.
//!
//! A request's pattern is compiled once, turned into a trigram posting
//! query to prune the corpus, and then verified against each candidate's
//! content, producing up to a fixed number of line snippets per file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          HTTP transport (axum)              │
//! │      POST /codesearch    GET /health        │
//! └─────────────────┬───────────────────────────┘
//!                   │ CodeSearchService
//! ┌─────────────────▼───────────────────────────┐
//! │           Search orchestrator                │
//! │  compile → posting query → fetch → snippets │
//! └───────┬─────────────────────────┬───────────┘
//!         │ CandidateIndex          │ ContentService
//!    ┌────▼──────────┐      ┌───────▼──────────────┐
//!    │ Trigram index │      │ corpus dir (tokio fs)│
//!    │ RoaringBitmap │      │ or decorations (HTTP)│
//!    └────┬──────────┘      └──────────────────────┘
//!         │ loaded once at startup
//!    ┌────▼─────────────────────────┐
//!    │  SQLite index (r2d2 pool)    │
//!    │  written by the Indexer      │
//!    └──────────────────────────────┘
//! ```

pub mod db;
pub mod error;
pub mod fmt;
pub mod security;
pub mod server;
pub mod services;
pub mod types;

pub use error::{Result, ServerError};
pub use types::{CodeSearchReply, CodeSearchRequest, FileId, FileMatch, Regexp, Snippet, Trigram};
