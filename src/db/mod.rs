//! Index database with connection pooling.
//!
//! Stores the file table (id, corpus-relative path, content hash) and the
//! serialized trigram posting lists. File content itself is never stored;
//! it is fetched from the content service at search time.

mod pragmas;
mod schema;

pub use pragmas::{analyze, apply_pragmas, apply_read_only_pragmas};
pub use schema::{check_schema_version, init_schema, SCHEMA_VERSION};

use crate::error::{DbError, DbResult};
use crate::types::FileId;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;

/// File metadata for batch upserts.
#[derive(Debug, Clone)]
pub struct FileData {
    /// Corpus-relative path with `/` separators
    pub path: String,
    /// Content hash (xxh3)
    pub hash: u64,
}

/// What one committed indexing pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCommit {
    /// Ids of the upserted files, in input order
    pub file_ids: Vec<FileId>,
    /// File rows that existed and were removed
    pub deleted: usize,
}

/// Database handle with connection pooling.
///
/// `rusqlite::Connection` is not `Sync`; r2d2 hands out one connection per
/// caller so the handle can be shared across threads.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if connection pool creation fails.
    /// Returns `DbError::Sqlite` or `DbError::Migration` if schema
    /// initialization fails.
    pub fn open(path: &Path) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .min_idle(Some(1))
            .build(manager)?;

        {
            let conn = pool.get()?;
            apply_pragmas(&conn)?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Opens an existing index for reading only.
    ///
    /// Nothing is created or written: the file must already hold an index
    /// of the current schema version, and the journal mode is left as the
    /// indexer set it.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if the file cannot be opened.
    /// Returns `DbError::Migration` if it is not an index of this version.
    pub fn open_read_only(path: &Path) -> DbResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        // Checked on a plain connection first: r2d2 keeps retrying a file
        // that cannot be opened until its connection timeout.
        {
            let conn = Connection::open_with_flags(path, flags)?;
            check_schema_version(&conn)?;
        }

        let manager = SqliteConnectionManager::file(path).with_flags(flags);
        let pool = Pool::builder().max_size(1).build(manager)?;

        {
            let conn = pool.get()?;
            apply_read_only_pragmas(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Creates an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`].
    pub fn in_memory() -> DbResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;

        {
            let conn = pool.get()?;
            apply_pragmas(&conn)?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Gets a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available within the timeout.
    pub fn conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(DbError::from)
    }

    /// Commits one indexing pass in a single immediate transaction.
    ///
    /// Upserts `changed`, deletes the rows for `deleted`, then replaces the
    /// whole trigrams table with the rows `postings` builds from the ids
    /// assigned to `changed` (same order). Either everything lands or the
    /// previous index is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if any statement fails; nothing is committed.
    pub fn commit_index<F>(
        &self,
        changed: &[FileData],
        deleted: &[&str],
        postings: F,
    ) -> DbResult<IndexCommit>
    where
        F: FnOnce(&[FileId]) -> Vec<(Vec<u8>, Vec<u8>)>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let file_ids = upsert_files(&tx, changed)?;
        let deleted = delete_files(&tx, deleted)?;
        replace_trigrams(&tx, &postings(&file_ids))?;

        tx.commit()?;
        Ok(IndexCommit { file_ids, deleted })
    }

    /// Gets every indexed file as `(id, path)`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn get_all_file_paths(&self) -> DbResult<Vec<(FileId, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT file_id, path FROM files ORDER BY file_id")?;
        let results = stmt
            .query_map([], |row| {
                Ok((FileId::new(row.get::<_, u32>(0)?), row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Gets all indexed paths with their hashes, for change detection.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn get_all_hashes(&self) -> DbResult<HashMap<String, (FileId, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT path, file_id, hash FROM files")?;
        let results = stmt
            .query_map([], |row| {
                let path: String = row.get(0)?;
                let id: u32 = row.get(1)?;
                let hash: i64 = row.get(2)?;
                Ok((path, (FileId::new(id), hash as u64)))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(results)
    }

    /// Loads every `(trigram, bitmap)` row.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn load_all_trigrams(&self) -> DbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT trigram, file_ids FROM trigrams")?;
        let results = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Refreshes planner statistics; run once after indexing.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if ANALYZE fails.
    pub fn analyze(&self) -> DbResult<()> {
        let conn = self.conn()?;
        analyze(&conn)
    }

    /// Gets the number of stored trigrams.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn trigram_count(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trigrams", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Gets total file count.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn file_count(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Upserts file rows, returning their ids in input order.
fn upsert_files(conn: &Connection, files: &[FileData]) -> DbResult<Vec<FileId>> {
    let mut insert_stmt = conn.prepare_cached(
        r"
        INSERT INTO files (path, hash, indexed_at)
        VALUES (?1, ?2, datetime('now'))
        ON CONFLICT(path) DO UPDATE SET
            hash = excluded.hash,
            indexed_at = excluded.indexed_at
        ",
    )?;
    // last_insert_rowid() is unreliable with ON CONFLICT DO UPDATE
    let mut select_stmt = conn.prepare_cached("SELECT file_id FROM files WHERE path = ?1")?;

    let mut file_ids = Vec::with_capacity(files.len());
    for data in files {
        // SQLite INTEGER is signed
        let hash_i64 = data.hash as i64;
        insert_stmt.execute(rusqlite::params![&data.path, hash_i64])?;
        let file_id: u32 = select_stmt.query_row(rusqlite::params![&data.path], |row| row.get(0))?;
        file_ids.push(FileId::new(file_id));
    }
    Ok(file_ids)
}

/// Deletes file rows by path, returning how many existed.
fn delete_files(conn: &Connection, paths: &[&str]) -> DbResult<usize> {
    let mut stmt = conn.prepare_cached("DELETE FROM files WHERE path = ?1")?;
    let mut deleted = 0;
    for path in paths {
        deleted += stmt.execute(rusqlite::params![path])?;
    }
    Ok(deleted)
}

/// Replaces the whole trigrams table. An empty slice clears it.
fn replace_trigrams(conn: &Connection, entries: &[(Vec<u8>, Vec<u8>)]) -> DbResult<()> {
    conn.execute("DELETE FROM trigrams", [])?;
    let mut stmt = conn.prepare_cached("INSERT INTO trigrams (trigram, file_ids) VALUES (?1, ?2)")?;
    for (trigram, file_ids) in entries {
        stmt.execute(rusqlite::params![trigram, file_ids])?;
    }
    Ok(())
}

// Compile-time assertion for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Database>();
};
