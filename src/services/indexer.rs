//! Incremental corpus indexer with change detection.
//!
//! Walks a corpus root, hashes every text file with xxh3 and only
//! re-extracts trigrams for files whose hash changed. Files that vanished
//! from the corpus are dropped from both the file table and the posting
//! lists.

use crate::db::{Database, FileData};
use crate::error::{IndexError, ServerError};
use crate::security::is_sensitive_file;
use crate::services::TrigramIndex;
use crate::types::{FileId, Trigram};
use ahash::AHashSet;
use ignore::WalkBuilder;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Indexing progress information.
#[derive(Debug, Clone, Default)]
pub struct IndexProgress {
    pub files_processed: usize,
    pub files_total: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub files_deleted: usize,
}

/// Configuration for indexing.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Include hidden files
    pub include_hidden: bool,
    /// Follow symlinks
    pub follow_symlinks: bool,
    /// Maximum file size to index (bytes)
    pub max_file_size: u64,
    /// File extensions to index (empty = every non-binary file)
    pub extensions: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include_hidden: false,
            follow_symlinks: false,
            max_file_size: 1024 * 1024, // 1MB
            extensions: Vec::new(),
        }
    }
}

/// Result of scanning one file on a worker thread.
enum Scanned {
    Unchanged(String),
    Changed {
        ticket: String,
        hash: u64,
        trigrams: Vec<Trigram>,
    },
    Skipped,
}

/// Incremental corpus indexer.
pub struct Indexer {
    db: Arc<Database>,
    root: PathBuf,
    config: IndexConfig,
}

impl Indexer {
    /// Creates a new indexer.
    pub fn new(db: Arc<Database>, root: PathBuf) -> Self {
        Self::with_config(db, root, IndexConfig::default())
    }

    /// Creates an indexer with custom configuration.
    pub fn with_config(db: Arc<Database>, root: PathBuf, config: IndexConfig) -> Self {
        Self { db, root, config }
    }

    /// Performs incremental indexing. With `force`, every file is re-read and
    /// the posting lists are rebuilt from scratch.
    ///
    /// The file table and the posting lists are written in one transaction,
    /// so a failed pass leaves the previous index intact.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Database` if database operations fail.
    /// Returns `ServerError::Index` if the walk fails or the stored posting
    /// lists are corrupt.
    pub fn index(&self, force: bool) -> Result<IndexProgress, ServerError> {
        let existing = self.db.get_all_hashes()?;

        let mut trigram = if force {
            TrigramIndex::new()
        } else {
            TrigramIndex::from_db_entries(
                self.db.load_all_trigrams()?,
                existing.values().map(|(id, _)| *id),
            )?
        };

        let files = self.collect_files()?;
        let mut state = IndexProgress {
            files_total: files.len(),
            ..IndexProgress::default()
        };

        let scanned: Vec<Scanned> = files
            .par_iter()
            .map(|path| self.scan_file(path, force, &existing))
            .collect();

        let mut seen: HashSet<String> = HashSet::with_capacity(scanned.len());
        let mut changed = Vec::new();
        let mut pending = Vec::new();
        for item in scanned {
            state.files_processed += 1;
            match item {
                Scanned::Unchanged(ticket) => {
                    state.files_unchanged += 1;
                    seen.insert(ticket);
                }
                Scanned::Changed {
                    ticket,
                    hash,
                    trigrams,
                } => {
                    seen.insert(ticket.clone());
                    changed.push(FileData { path: ticket, hash });
                    pending.push(trigrams);
                }
                Scanned::Skipped => state.files_skipped += 1,
            }
        }

        // Stale postings: files that changed or disappeared.
        let mut stale = RoaringBitmap::new();
        for data in &changed {
            if let Some((id, _)) = existing.get(&data.path) {
                stale.insert(id.as_u32());
            }
        }
        let mut deleted: Vec<&str> = Vec::new();
        for (path, (id, _)) in &existing {
            if !seen.contains(path) {
                stale.insert(id.as_u32());
                deleted.push(path);
            }
        }
        trigram.remove_files(&stale);

        let commit = self.db.commit_index(&changed, &deleted, |file_ids| {
            for (file_id, trigrams) in file_ids.iter().zip(pending) {
                trigram.add_trigrams(*file_id, trigrams);
            }
            trigram.to_db_entries()
        })?;
        state.files_indexed = commit.file_ids.len();
        state.files_deleted = commit.deleted;

        self.db.analyze()?;

        tracing::info!(
            root = %self.root.display(),
            indexed = state.files_indexed,
            unchanged = state.files_unchanged,
            deleted = state.files_deleted,
            skipped = state.files_skipped,
            trigrams = trigram.trigram_count(),
            "indexing complete"
        );

        Ok(state)
    }

    /// Reads, hashes and (if changed) extracts trigrams for one file.
    fn scan_file(
        &self,
        path: &Path,
        force: bool,
        existing: &std::collections::HashMap<String, (FileId, u64)>,
    ) -> Scanned {
        let Some(ticket) = ticket_for(&self.root, path) else {
            return Scanned::Skipped;
        };
        if let Some(reason) = is_sensitive_file(Path::new(&ticket)) {
            tracing::debug!(ticket = %ticket, reason, "skipping sensitive file");
            return Scanned::Skipped;
        }

        let content = match fs::read(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
                return Scanned::Skipped;
            }
        };
        if is_binary(&content) {
            return Scanned::Skipped;
        }

        let hash = xxh3_64(&content);
        if !force && existing.get(&ticket).is_some_and(|(_, h)| *h == hash) {
            return Scanned::Unchanged(ticket);
        }

        let trigrams: AHashSet<Trigram> = Trigram::from_bytes(&content).collect();
        Scanned::Changed {
            ticket,
            hash,
            trigrams: trigrams.into_iter().collect(),
        }
    }

    /// Collects candidate files under the root.
    fn collect_files(&self) -> Result<Vec<PathBuf>, ServerError> {
        if !self.root.is_dir() {
            return Err(IndexError::Walk(format!(
                "corpus root is not a directory: {}",
                self.root.display()
            ))
            .into());
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_symlinks)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build();

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();

            if !self.config.extensions.is_empty() && !self.extension_allowed(path) {
                continue;
            }

            if let Ok(metadata) = entry.metadata() {
                if metadata.len() > self.config.max_file_size {
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        Ok(files)
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        // Extensionless files like Makefile match on the whole name.
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();

        self.config
            .extensions
            .iter()
            .map(|e| e.to_lowercase())
            .any(|e| e == ext || e == filename)
    }

    /// Gets indexing statistics.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Database` if a count query fails.
    pub fn stats(&self) -> Result<IndexStats, ServerError> {
        IndexStats::load(&self.db)
    }
}

/// Index statistics.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub file_count: u64,
    pub trigram_count: u64,
}

impl IndexStats {
    /// Reads the counts stored in an index database.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Database` if a count query fails.
    pub fn load(db: &Database) -> Result<Self, ServerError> {
        Ok(Self {
            file_count: db.file_count()?,
            trigram_count: db.trigram_count()?,
        })
    }
}

/// Corpus-relative ticket with `/` separators, or `None` for paths outside the root.
fn ticket_for(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(BINARY_SNIFF_LEN)];
    memchr::memchr(0, head).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_env() -> (TempDir, Arc<Database>) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());

        fs::write(dir.path().join("main.go"), "package main\nfunc main() {}\n").unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/greet.go"), "func Greet() {}\n").unwrap();

        (dir, db)
    }

    #[test]
    fn test_indexer() {
        let (dir, db) = setup_test_env();
        let indexer = Indexer::new(db.clone(), dir.path().to_path_buf());

        let progress = indexer.index(false).unwrap();
        assert_eq!(progress.files_indexed, 2);
        let stats = indexer.stats().unwrap();
        assert_eq!(stats.file_count, 2);
        assert!(stats.trigram_count > 0);

        let mut paths: Vec<String> = db
            .get_all_file_paths()
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["lib/greet.go", "main.go"]);
    }

    #[test]
    fn test_incremental_index() {
        let (dir, db) = setup_test_env();
        let indexer = Indexer::new(db.clone(), dir.path().to_path_buf());

        let progress1 = indexer.index(false).unwrap();
        assert_eq!(progress1.files_indexed, 2);

        let progress2 = indexer.index(false).unwrap();
        assert_eq!(progress2.files_indexed, 0);
        assert_eq!(progress2.files_unchanged, 2);

        fs::write(dir.path().join("main.go"), "package main\nfunc other() {}\n").unwrap();

        let progress3 = indexer.index(false).unwrap();
        assert_eq!(progress3.files_indexed, 1);
        assert_eq!(progress3.files_unchanged, 1);

        let progress4 = indexer.index(true).unwrap();
        assert_eq!(progress4.files_indexed, 2);
    }

    #[test]
    fn test_changed_file_postings_replaced() {
        let (dir, db) = setup_test_env();
        let indexer = Indexer::new(db.clone(), dir.path().to_path_buf());
        indexer.index(false).unwrap();

        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        indexer.index(false).unwrap();

        let index = TrigramIndex::from_db_entries(
            db.load_all_trigrams().unwrap(),
            db.get_all_file_paths().unwrap().into_iter().map(|(id, _)| id),
        )
        .unwrap();
        let q = crate::services::TrigramQuery::literal(b"func main");
        assert!(index.posting_query(&q).is_empty());
    }

    #[test]
    fn test_deleted_files_removed() {
        let (dir, db) = setup_test_env();
        let indexer = Indexer::new(db.clone(), dir.path().to_path_buf());
        indexer.index(false).unwrap();

        fs::remove_file(dir.path().join("lib/greet.go")).unwrap();
        let progress = indexer.index(false).unwrap();
        assert_eq!(progress.files_deleted, 1);
        assert_eq!(db.file_count().unwrap(), 1);
    }

    #[test]
    fn test_failed_pass_is_retried_in_full() {
        let (dir, db) = setup_test_env();
        let indexer = Indexer::new(db.clone(), dir.path().to_path_buf());

        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_postings BEFORE INSERT ON trigrams
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        let err = indexer.index(false).unwrap_err();
        assert_eq!(err.code(), "SQLITE_ERROR");
        // No hashes were stored, so nothing looks unchanged next time.
        assert!(db.get_all_hashes().unwrap().is_empty());

        db.conn()
            .unwrap()
            .execute_batch("DROP TRIGGER block_postings")
            .unwrap();
        let progress = indexer.index(false).unwrap();
        assert_eq!(progress.files_indexed, 2);
        assert_eq!(progress.files_unchanged, 0);

        let index = TrigramIndex::from_db_entries(
            db.load_all_trigrams().unwrap(),
            db.get_all_file_paths().unwrap().into_iter().map(|(id, _)| id),
        )
        .unwrap();
        let q = crate::services::TrigramQuery::literal(b"func Greet");
        assert_eq!(index.posting_query(&q).len(), 1);
    }

    #[test]
    fn test_binary_and_sensitive_files_skipped() {
        let (dir, db) = setup_test_env();
        fs::write(dir.path().join("blob.bin"), b"abc\0def").unwrap();
        fs::write(dir.path().join("server.pem"), "-----BEGIN KEY-----").unwrap();

        let indexer = Indexer::new(db.clone(), dir.path().to_path_buf());
        let progress = indexer.index(false).unwrap();
        assert_eq!(progress.files_indexed, 2);
        assert_eq!(progress.files_skipped, 2);
    }

    #[test]
    fn test_extension_filter() {
        let (dir, db) = setup_test_env();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let config = IndexConfig {
            extensions: vec!["txt".to_string()],
            ..IndexConfig::default()
        };
        let indexer = Indexer::with_config(db.clone(), dir.path().to_path_buf(), config);
        let progress = indexer.index(false).unwrap();
        assert_eq!(progress.files_indexed, 1);
    }

    #[test]
    fn test_missing_root_is_walk_error() {
        let db = Arc::new(Database::in_memory().unwrap());
        let indexer = Indexer::new(db, PathBuf::from("/definitely/not/here"));
        let err = indexer.index(false).unwrap_err();
        assert_eq!(err.code(), "WALK_ERROR");
    }

    #[test]
    fn test_ticket_for() {
        let root = Path::new("/corpus");
        assert_eq!(
            ticket_for(root, Path::new("/corpus/src/a.go")).as_deref(),
            Some("src/a.go")
        );
        assert_eq!(ticket_for(root, Path::new("/elsewhere/a.go")), None);
    }

    #[test]
    fn test_is_binary() {
        assert!(is_binary(b"ab\0cd"));
        assert!(!is_binary(b"plain text\n"));
    }
}
