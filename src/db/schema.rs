//! Index database schema.

use crate::error::{DbError, DbResult};
use rusqlite::{Connection, OptionalExtension};

/// Current schema version. Databases written with another version are refused.
pub const SCHEMA_VERSION: u32 = 3;

/// Creates the schema if missing, then checks the stored version.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if schema creation fails and
/// `DbError::Migration` if the database was written by another schema version.
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r"
        -- One row per indexed file; path is the ticket handed to the content service
        CREATE TABLE IF NOT EXISTS files (
            file_id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            hash INTEGER NOT NULL,
            indexed_at TEXT NOT NULL
        );

        -- RoaringBitmap-encoded file IDs per trigram
        CREATE TABLE IF NOT EXISTS trigrams (
            trigram BLOB PRIMARY KEY,
            file_ids BLOB NOT NULL
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;
        ",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_info (key, value) VALUES ('version', ?1)",
        rusqlite::params![SCHEMA_VERSION.to_string()],
    )?;

    check_schema_version(conn)
}

/// Checks the stored schema version without writing anything.
///
/// # Errors
///
/// Returns `DbError::Migration` if the version is missing or differs, which
/// includes files that are not an index at all.
pub fn check_schema_version(conn: &Connection) -> DbResult<()> {
    let has_info: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_info')",
        [],
        |row| row.get(0),
    )?;
    let found: Option<String> = if has_info {
        conn.query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?
    } else {
        None
    };

    match found {
        Some(v) if v == SCHEMA_VERSION.to_string() => Ok(()),
        other => Err(DbError::Migration {
            expected: SCHEMA_VERSION,
            found: other.unwrap_or_else(|| "none".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pragmas::apply_pragmas;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"trigrams".to_string()));
        assert!(tables.contains(&"schema_info".to_string()));
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_check_version_on_foreign_database() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (body TEXT)").unwrap();

        match check_schema_version(&conn) {
            Err(DbError::Migration { found, .. }) => assert_eq!(found, "none"),
            other => panic!("expected migration error, got {other:?}"),
        }
        // Nothing was created by the check.
        let tables: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("UPDATE schema_info SET value = '1' WHERE key = 'version'", [])
            .unwrap();

        match init_schema(&conn) {
            Err(DbError::Migration { expected, found }) => {
                assert_eq!(expected, SCHEMA_VERSION);
                assert_eq!(found, "1");
            }
            other => panic!("expected migration error, got {other:?}"),
        }
    }
}
