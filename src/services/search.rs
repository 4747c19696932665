//! Search orchestrator: request → candidates → content → snippets.
//!
//! The index query is CPU-bound and runs under `spawn_blocking`; content
//! fetches are awaited one candidate at a time so results keep the index's
//! order. Any failure aborts the whole request.

use crate::error::{ContentError, SearchError, SearchResult};
use crate::services::content::ContentService;
use crate::services::corpus::CandidateIndex;
use crate::services::query::TrigramQuery;
use crate::services::snippets::{extract_snippets, MAX_SNIPPETS_PER_FILE};
use crate::types::{CodeSearchReply, CodeSearchRequest, FileMatch};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Snippets kept per file
    pub max_snippets_per_file: usize,
    /// Deadline for the whole request (index query plus every fetch)
    pub request_timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_snippets_per_file: MAX_SNIPPETS_PER_FILE,
            request_timeout: None,
        }
    }
}

/// The search capability the transport is written against.
#[async_trait]
pub trait CodeSearchService: Send + Sync {
    /// Runs one search request to completion.
    async fn search(&self, request: CodeSearchRequest) -> SearchResult<CodeSearchReply>;
}

/// Searches a local candidate index, verifying candidates with fetched content.
pub struct LocalSearchService {
    index: Arc<dyn CandidateIndex>,
    content: Arc<dyn ContentService>,
    config: SearchConfig,
}

impl LocalSearchService {
    /// Creates a search service with default configuration.
    pub fn new(index: Arc<dyn CandidateIndex>, content: Arc<dyn ContentService>) -> Self {
        Self::with_config(index, content, SearchConfig::default())
    }

    /// Creates a search service with custom configuration.
    pub fn with_config(
        index: Arc<dyn CandidateIndex>,
        content: Arc<dyn ContentService>,
        config: SearchConfig,
    ) -> Self {
        Self {
            index,
            content,
            config,
        }
    }
}

#[async_trait]
impl CodeSearchService for LocalSearchService {
    async fn search(&self, request: CodeSearchRequest) -> SearchResult<CodeSearchReply> {
        let regexp = request.regexp.ok_or(SearchError::MissingPattern)?;
        let matcher = regexp.compile()?;
        let deadline = self.config.request_timeout.map(|t| Instant::now() + t);

        let query = TrigramQuery::from_hir(matcher.syntax());
        tracing::debug!(expr = %matcher.as_str(), query = %query, "posting query");

        let index = Arc::clone(&self.index);
        let candidates = within(deadline, tokio::task::spawn_blocking(move || {
            index.posting_query(&query)
        }))
        .await
        .ok_or_else(|| SearchError::IndexQuery("index query timed out".to_string()))?
        .map_err(|e| SearchError::IndexQuery(e.to_string()))??;

        let mut reply = CodeSearchReply::default();
        for id in candidates {
            let name = self
                .index
                .name(id)
                .ok_or_else(|| SearchError::IndexQuery(format!("no name for {id}")))?;

            let content = within(deadline, self.content.fetch_source_text(&name))
                .await
                .unwrap_or_else(|| {
                    Err(ContentError::Timeout {
                        millis: self
                            .config
                            .request_timeout
                            .unwrap_or_default()
                            .as_millis(),
                    })
                })
                .map_err(|source| SearchError::ContentFetch {
                    ticket: name.to_string(),
                    source,
                })?;

            let snippet = extract_snippets(&content, &matcher, self.config.max_snippets_per_file);
            if !snippet.is_empty() {
                reply.matches.push(FileMatch {
                    filename: name.to_string(),
                    snippet,
                });
            }
        }

        Ok(reply)
    }
}

/// Awaits `fut`, giving up at `deadline`. `None` means the deadline passed.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
