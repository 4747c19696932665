//! Common test utilities for codesearch integration tests.
//!
//! `TestEnv` wires a temporary corpus directory, an in-memory index
//! database, the indexer and the search service together.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use codesearch::db::Database;
use codesearch::error::{SearchError, SearchResult};
use codesearch::services::{
    CandidateIndex, CorpusIndex, FsContentService, Indexer, LocalSearchService, SearchConfig,
    TrigramQuery,
};
use codesearch::types::FileId;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A corpus directory plus its index database.
pub struct TestEnv {
    pub dir: TempDir,
    pub db: Arc<Database>,
}

impl TestEnv {
    /// Creates a new empty test environment.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let db = Arc::new(Database::in_memory().expect("Failed to create in-memory database"));
        Self { dir, db }
    }

    /// Creates an indexer for this environment.
    pub fn indexer(&self) -> Indexer {
        Indexer::new(Arc::clone(&self.db), self.dir.path().to_path_buf())
    }

    /// Writes a file to the corpus directory.
    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write test file");
    }

    /// Indexes all files in the corpus directory.
    pub fn index_all(&self) {
        self.indexer()
            .index(false)
            .expect("Failed to index files");
    }

    /// Loads the serving-side index from the database.
    pub fn corpus(&self) -> CorpusIndex {
        CorpusIndex::load(&self.db).expect("Failed to load corpus index")
    }

    /// Search service reading content from the corpus directory.
    pub fn service(&self) -> LocalSearchService {
        self.service_with(SearchConfig::default())
    }

    pub fn service_with(&self, config: SearchConfig) -> LocalSearchService {
        LocalSearchService::with_config(
            Arc::new(self.corpus()),
            Arc::new(FsContentService::new(self.dir.path())),
            config,
        )
    }

    /// Makes every insert into the posting table fail until unblocked.
    pub fn block_postings(&self) {
        self.db
            .conn()
            .expect("Failed to get connection")
            .execute_batch(
                "CREATE TRIGGER block_postings BEFORE INSERT ON trigrams
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .expect("Failed to create trigger");
    }

    pub fn unblock_postings(&self) {
        self.db
            .conn()
            .expect("Failed to get connection")
            .execute_batch("DROP TRIGGER block_postings")
            .expect("Failed to drop trigger");
    }

    /// Gets the full path to a file in the corpus directory.
    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates an indexed environment holding a small Go corpus.
pub fn go_corpus() -> TestEnv {
    let env = TestEnv::new();

    env.write_file("a.go", "foo\nbar\nfoobar\n");
    env.write_file(
        "cmd/server/main.go",
        r#"package main

import "net/http"

func main() {
	http.HandleFunc("/codesearch", handler)
	http.ListenAndServe(":8080", nil)
}
"#,
    );
    env.write_file(
        "lib/util.go",
        r#"package lib

// ABC is exported.
const ABC = 1

func Helper() int {
	return ABC
}
"#,
    );

    env.index_all();
    env
}

/// Candidate index double that counts posting queries.
pub struct CountingIndex<I> {
    pub inner: I,
    queries: AtomicUsize,
}

impl<I> CountingIndex<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl<I: CandidateIndex> CandidateIndex for CountingIndex<I> {
    fn posting_query(&self, query: &TrigramQuery) -> SearchResult<Vec<FileId>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.posting_query(query)
    }

    fn name(&self, id: FileId) -> Option<Arc<str>> {
        self.inner.name(id)
    }
}

/// Candidate index double with a fixed misbehavior.
pub enum StubIndex {
    /// Returns these ids but knows no names for them.
    Unnamed(Vec<FileId>),
    /// Fails every posting query with this message.
    Failing(&'static str),
    /// Blocks the querying thread before answering with nothing.
    Slow(Duration),
    /// Panics inside the posting query.
    Panicking,
}

impl CandidateIndex for StubIndex {
    fn posting_query(&self, _query: &TrigramQuery) -> SearchResult<Vec<FileId>> {
        match self {
            Self::Unnamed(ids) => Ok(ids.clone()),
            Self::Failing(msg) => Err(SearchError::IndexQuery((*msg).to_string())),
            Self::Slow(delay) => {
                std::thread::sleep(*delay);
                Ok(Vec::new())
            }
            Self::Panicking => panic!("posting lists poisoned"),
        }
    }

    fn name(&self, _id: FileId) -> Option<Arc<str>> {
        None
    }
}
