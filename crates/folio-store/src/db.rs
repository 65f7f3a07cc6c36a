//! SQLite persistence for the record cache.
//!
//! One row per cache key, partitioned by workspace. Values are the
//! JSON-serialized `RecordWithRole`, stored verbatim.

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};
use std::path::Path;

/// Database handle for cache persistence.
pub struct RecordDb {
    conn: Connection,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    workspace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER DEFAULT (unixepoch()),
    PRIMARY KEY (workspace, key)
);
"#;

impl RecordDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // =========================================================================
    // Record rows
    // =========================================================================

    /// Insert or replace the value stored under `key`.
    pub fn put(&self, workspace: &str, key: &str, value: &str) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO records (workspace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (workspace, key)
             DO UPDATE SET value = excluded.value, updated_at = unixepoch()",
            params![workspace, key, value],
        )?;
        Ok(())
    }

    /// Remove the row for `key`. Returns whether a row existed.
    pub fn remove(&self, workspace: &str, key: &str) -> SqliteResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM records WHERE workspace = ?1 AND key = ?2",
            params![workspace, key],
        )?;
        Ok(n > 0)
    }

    /// Get the value stored under `key`.
    pub fn get(&self, workspace: &str, key: &str) -> SqliteResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM records WHERE workspace = ?1 AND key = ?2",
                params![workspace, key],
                |row| row.get(0),
            )
            .optional()
    }

    /// All `(key, value)` rows of a workspace, ordered by key.
    pub fn load_workspace(&self, workspace: &str) -> SqliteResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM records WHERE workspace = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![workspace], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// Drop every row of a workspace. Returns the number removed.
    pub fn clear_workspace(&self, workspace: &str) -> SqliteResult<usize> {
        self.conn
            .execute("DELETE FROM records WHERE workspace = ?1", params![workspace])
    }

    /// Number of rows in a workspace.
    pub fn count(&self, workspace: &str) -> SqliteResult<usize> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE workspace = ?1",
            params![workspace],
            |row| row.get::<_, i64>(0).map(|n| n as usize),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_replace() {
        let db = RecordDb::in_memory().unwrap();
        db.put("ws", "block:b1:u1", r#"{"v":1}"#).unwrap();
        assert_eq!(db.get("ws", "block:b1:u1").unwrap().as_deref(), Some(r#"{"v":1}"#));

        db.put("ws", "block:b1:u1", r#"{"v":2}"#).unwrap();
        assert_eq!(db.get("ws", "block:b1:u1").unwrap().as_deref(), Some(r#"{"v":2}"#));
        assert_eq!(db.count("ws").unwrap(), 1);
    }

    #[test]
    fn test_workspaces_are_partitioned() {
        let db = RecordDb::in_memory().unwrap();
        db.put("a", "k", "1").unwrap();
        db.put("b", "k", "2").unwrap();

        assert_eq!(db.load_workspace("a").unwrap(), vec![("k".to_string(), "1".to_string())]);
        assert_eq!(db.clear_workspace("a").unwrap(), 1);
        assert!(db.get("a", "k").unwrap().is_none());
        assert_eq!(db.get("b", "k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_remove() {
        let db = RecordDb::in_memory().unwrap();
        db.put("ws", "k", "1").unwrap();
        assert!(db.remove("ws", "k").unwrap());
        assert!(!db.remove("ws", "k").unwrap());
        assert!(db.get("ws", "k").unwrap().is_none());
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        {
            let db = RecordDb::open(&path).unwrap();
            db.put("ws", "k", "1").unwrap();
        }
        let db = RecordDb::open(&path).unwrap();
        assert_eq!(db.get("ws", "k").unwrap().as_deref(), Some("1"));
    }
}
