//! Content services: fetch a file's raw bytes by ticket.
//!
//! The ticket is the name the index assigned to a file. Two backends:
//! - [`FsContentService`] reads tickets as paths under a corpus root
//! - [`DecorationsClient`] asks a remote decorations endpoint for source text

use crate::error::{ContentError, ContentResult};
use crate::security::validate_read_access;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Retrieves the raw text of one file.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Returns the full content of the file named by `ticket`.
    async fn fetch_source_text(&self, ticket: &str) -> ContentResult<Vec<u8>>;
}

// ============================================================================
// Filesystem
// ============================================================================

/// Serves content straight from a corpus directory.
#[derive(Debug, Clone)]
pub struct FsContentService {
    root: PathBuf,
}

impl FsContentService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentService for FsContentService {
    async fn fetch_source_text(&self, ticket: &str) -> ContentResult<Vec<u8>> {
        let path = validate_read_access(&self.root, ticket)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| ContentError::Read { path, source })
    }
}

// ============================================================================
// Remote decorations endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct DecorationsRequest<'a> {
    location: Location<'a>,
    source_text: bool,
    references: bool,
}

#[derive(Debug, Serialize)]
struct Location<'a> {
    ticket: &'a str,
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct DecorationsReply {
    #[serde(default)]
    source_text: String,
}

/// Client for a remote `POST {base}/decorations` endpoint.
///
/// Only the file's source text is requested; references are never asked for.
#[derive(Debug, Clone)]
pub struct DecorationsClient {
    endpoint: String,
    http: reqwest::Client,
}

impl DecorationsClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> ContentResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            endpoint: format!("{}/decorations", base_url.trim_end_matches('/')),
            http: builder.build()?,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ContentService for DecorationsClient {
    async fn fetch_source_text(&self, ticket: &str) -> ContentResult<Vec<u8>> {
        let body = DecorationsRequest {
            location: Location {
                ticket,
                kind: "FILE",
            },
            source_text: true,
            references: false,
        };

        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ContentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: DecorationsReply = resp.json().await?;
        STANDARD
            .decode(reply.source_text.as_bytes())
            .map_err(|e| ContentError::Decode(e.to_string()))
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Fixed ticket → content map. Unknown tickets fail with a not-found read error.
///
/// Counts every fetch, which lets callers assert whether content was touched.
#[derive(Debug, Default)]
pub struct StaticContentService {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl StaticContentService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file.
    #[must_use]
    pub fn with_file(mut self, ticket: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(ticket.to_string(), content.into());
        self
    }

    /// Number of fetches served so far, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentService for StaticContentService {
    async fn fetch_source_text(&self, ticket: &str) -> ContentResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.files
            .get(ticket)
            .cloned()
            .ok_or_else(|| ContentError::Read {
                path: PathBuf::from(ticket),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such ticket"),
            })
    }
}
