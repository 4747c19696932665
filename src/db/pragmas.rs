//! `SQLite` PRAGMA configuration for the index database.

use crate::error::DbResult;
use rusqlite::Connection;

/// Executes a single SQL statement that may return rows (PRAGMAs).
fn exec_stmt(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    conn.prepare(sql)?.query([])?.next()?;
    Ok(())
}

/// Applies read-oriented PRAGMA settings.
///
/// The serving process only reads the index; the indexer writes it in bulk.
/// WAL lets a `serve` process keep reading while `index` rewrites the file.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if any PRAGMA statement fails.
pub fn apply_pragmas(conn: &Connection) -> DbResult<()> {
    exec_stmt(conn, "PRAGMA journal_mode = WAL")?;
    exec_stmt(conn, "PRAGMA synchronous = NORMAL")?;
    apply_read_only_pragmas(conn)
}

/// Applies the connection-local settings that never write to the file.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if any PRAGMA statement fails.
pub fn apply_read_only_pragmas(conn: &Connection) -> DbResult<()> {
    // 8MB page cache
    exec_stmt(conn, "PRAGMA cache_size = -8000")?;
    // 64MB memory-mapped I/O
    exec_stmt(conn, "PRAGMA mmap_size = 67108864")?;
    exec_stmt(conn, "PRAGMA busy_timeout = 5000")?;
    exec_stmt(conn, "PRAGMA temp_store = MEMORY")?;
    Ok(())
}

/// Refreshes query planner statistics after a bulk write.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if ANALYZE fails.
pub fn analyze(conn: &Connection) -> DbResult<()> {
    conn.execute("ANALYZE", [])?;
    Ok(())
}
