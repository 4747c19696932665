//! Read-only candidate index used while serving searches.

use crate::db::Database;
use crate::error::{Result, SearchError, SearchResult};
use crate::services::query::TrigramQuery;
use crate::services::TrigramIndex;
use crate::types::FileId;
use ahash::AHashMap;
use std::path::Path;
use std::sync::Arc;

/// Source of candidate files for a posting query.
///
/// Implementations are shared across concurrent requests and must not
/// require exclusive access to answer a query.
pub trait CandidateIndex: Send + Sync {
    /// Files that may match `query`, in the index's iteration order.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::IndexQuery` if the index cannot be queried.
    fn posting_query(&self, query: &TrigramQuery) -> SearchResult<Vec<FileId>>;

    /// Display name (and content ticket) of an indexed file.
    fn name(&self, id: FileId) -> Option<Arc<str>>;
}

/// Trigram index and file names loaded once from an index database.
#[derive(Debug)]
pub struct CorpusIndex {
    trigrams: TrigramIndex,
    names: AHashMap<FileId, Arc<str>>,
}

impl CorpusIndex {
    /// Opens the index database at `path` read-only and loads it into memory.
    ///
    /// The file is never created or modified, so an index on read-only
    /// storage can be served.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Database` if the database cannot be opened or
    /// read, and `ServerError::Index` if its posting lists are corrupt.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::open_read_only(path)?;
        let index = Self::load(&db)?;
        tracing::info!(
            path = %path.display(),
            files = index.file_count(),
            trigrams = index.trigrams.trigram_count(),
            "opened corpus index"
        );
        Ok(index)
    }

    /// Loads the file table and posting lists from an open database.
    ///
    /// # Errors
    ///
    /// Same as [`CorpusIndex::open`].
    pub fn load(db: &Database) -> Result<Self> {
        let files = db.get_all_file_paths()?;
        let trigrams =
            TrigramIndex::from_db_entries(db.load_all_trigrams()?, files.iter().map(|(id, _)| *id))?;
        let names = files
            .into_iter()
            .map(|(id, path)| (id, Arc::<str>::from(path)))
            .collect();
        Ok(Self { trigrams, names })
    }

    /// Builds an index directly from `(name, content)` pairs, numbering
    /// files from 1 in the given order.
    #[must_use]
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        let mut trigrams = TrigramIndex::new();
        let mut names = AHashMap::new();
        for (n, (name, content)) in (1u32..).zip(docs) {
            let id = FileId::new(n);
            trigrams.add_file(id, content);
            names.insert(id, Arc::<str>::from(name));
        }
        Self { trigrams, names }
    }

    /// Number of indexed files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.names.len()
    }
}

impl CandidateIndex for CorpusIndex {
    fn posting_query(&self, query: &TrigramQuery) -> SearchResult<Vec<FileId>> {
        let hits = self.trigrams.posting_query(query);
        let ids: Vec<FileId> = hits.iter().map(FileId::new).collect();
        if let Some(missing) = ids.iter().find(|id| !self.names.contains_key(*id)) {
            return Err(SearchError::IndexQuery(format!(
                "posting list references unknown {missing}"
            )));
        }
        Ok(ids)
    }

    fn name(&self, id: FileId) -> Option<Arc<str>> {
        self.names.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FileData;
    use crate::services::pattern::compile;

    fn query(expr: &str) -> TrigramQuery {
        TrigramQuery::from_hir(compile(expr, true).unwrap().syntax())
    }

    #[test]
    fn test_from_documents() {
        let index = CorpusIndex::from_documents([
            ("a.go", b"func alpha() {}".as_slice()),
            ("b.go", b"func beta() {}".as_slice()),
        ]);
        assert_eq!(index.file_count(), 2);

        let ids = index.posting_query(&query("beta")).unwrap();
        assert_eq!(ids, vec![FileId::new(2)]);
        assert_eq!(index.name(ids[0]).as_deref(), Some("b.go"));
    }

    #[test]
    fn test_all_query_returns_every_file_in_id_order() {
        let index = CorpusIndex::from_documents([
            ("z.go", b"zz".as_slice()),
            ("a.go", b"aa".as_slice()),
        ]);
        let ids = index.posting_query(&query("a*")).unwrap();
        assert_eq!(ids, vec![FileId::new(1), FileId::new(2)]);
    }

    #[test]
    fn test_load_from_database() {
        let db = Database::in_memory().unwrap();
        let commit = db
            .commit_index(
                &[FileData {
                    path: "src/a.go".into(),
                    hash: 1,
                }],
                &[],
                |ids| {
                    let mut trigrams = TrigramIndex::new();
                    trigrams.add_file(ids[0], b"hello world");
                    trigrams.to_db_entries()
                },
            )
            .unwrap();
        let ids = commit.file_ids;

        let index = CorpusIndex::load(&db).unwrap();
        let hits = index.posting_query(&query("world")).unwrap();
        assert_eq!(hits, ids);
        assert_eq!(index.name(ids[0]).as_deref(), Some("src/a.go"));
    }

    #[test]
    fn test_dangling_posting_is_index_error() {
        let db = Database::in_memory().unwrap();
        db.commit_index(&[], &[], |_| {
            let mut trigrams = TrigramIndex::new();
            trigrams.add_file(FileId::new(42), b"orphan");
            trigrams.to_db_entries()
        })
        .unwrap();

        let index = CorpusIndex::load(&db).unwrap();
        let err = index.posting_query(&query("orphan")).unwrap_err();
        assert_eq!(err.code(), "INDEX_QUERY_ERROR");
    }

    #[test]
    fn test_unknown_name() {
        let index = CorpusIndex::from_documents(std::iter::empty());
        assert!(index.name(FileId::new(1)).is_none());
    }
}
