//! Core services: pattern compilation, candidate lookup, content retrieval,
//! snippet extraction and the search orchestrator built on top of them.

pub mod content;
pub mod corpus;
pub mod indexer;
pub mod pattern;
pub mod query;
mod search;
pub mod snippets;
mod trigram;

pub use content::{ContentService, DecorationsClient, FsContentService, StaticContentService};
pub use corpus::{CandidateIndex, CorpusIndex};
pub use indexer::{IndexConfig, IndexProgress, IndexStats, Indexer};
pub use pattern::{compile, CompiledMatcher};
pub use query::TrigramQuery;
pub use search::{CodeSearchService, LocalSearchService, SearchConfig};
pub use snippets::{extract_snippets, MAX_SNIPPETS_PER_FILE};
pub use trigram::TrigramIndex;
