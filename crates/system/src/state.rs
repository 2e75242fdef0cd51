//! Persistent bucket/key/value state
//!
//! A missing key is a valid state: `get` returns `Ok(None)` and `delete`
//! of a missing key succeeds.

use crate::error::Result;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable mapping of bucket → key → value
pub trait PersistentState: Send + Sync {
    /// Get the value stored under `key`, or `None` if absent
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, overwriting any previous value
    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`; a missing key is not an error
    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()>;
}

/// State that remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistentState;

impl PersistentState for NullPersistentState {
    fn get(&self, _bucket: &str, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&mut self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&mut self, _bucket: &str, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// In-memory state, used for tests and throwaway runs
#[derive(Debug, Default, Clone)]
pub struct MemoryPersistentState {
    buckets: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryPersistentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// All buckets and their contents
    pub fn buckets(&self) -> &BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>> {
        &self.buckets
    }
}

impl PersistentState for MemoryPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.buckets.get(bucket).and_then(|b| b.get(key)).cloned())
    }

    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()> {
        if let Some(b) = self.buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }
}

/// A row of persisted state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub bucket: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// SQLite-backed persistent state
///
/// Opened once per process; every `set`/`delete` is committed immediately.
pub struct SqliteState {
    conn: Mutex<Connection>,
}

impl SqliteState {
    /// Open or create the state database at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::Error::from_io(parent, e))?;
        }

        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// Open the database at `db_path` only if it already exists
    ///
    /// Neither the file nor its parent directory is created.
    pub fn open_existing(db_path: &Path) -> Result<Option<Self>> {
        if !db_path
            .try_exists()
            .map_err(|e| crate::Error::from_io(db_path, e))?
        {
            return Ok(None);
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)?;
        Self::init(conn).map(Some)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS state (
                bucket TEXT NOT NULL,
                key BLOB NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (bucket, key)
            );
            ",
        )?;
        log::debug!("Opened persistent state");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // SQLite keeps the data consistent across a panicked holder
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every record, ordered by bucket then key
    pub fn records(&self) -> Result<Vec<StateRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT bucket, key, value FROM state ORDER BY bucket, key")?;
        let rows = stmt.query_map([], |row| {
            Ok(StateRecord {
                bucket: row.get(0)?,
                key: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Delete every key in `bucket`, returning how many were removed
    pub fn delete_bucket(&mut self, bucket: &str) -> Result<usize> {
        let removed = self
            .conn()
            .execute("DELETE FROM state WHERE bucket = ?1", params![bucket])?;
        Ok(removed)
    }
}

impl PersistentState for SqliteState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM state WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.conn().execute(
            "INSERT INTO state (bucket, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value",
            params![bucket, key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()> {
        self.conn().execute(
            "DELETE FROM state WHERE bucket = ?1 AND key = ?2",
            params![bucket, key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_null_state_remembers_nothing() {
        let mut state = NullPersistentState;
        state.set("script", b"k", b"v").unwrap();
        assert_eq!(state.get("script", b"k").unwrap(), None);
        state.delete("script", b"k").unwrap();
    }

    #[test]
    fn test_memory_state() {
        let mut state = MemoryPersistentState::new();
        assert_eq!(state.get("b", b"k").unwrap(), None);
        state.set("b", b"k", b"v1").unwrap();
        state.set("b", b"k", b"v2").unwrap();
        assert_eq!(state.get("b", b"k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(state.get("other", b"k").unwrap(), None);
        state.delete("b", b"k").unwrap();
        state.delete("b", b"missing").unwrap();
        assert_eq!(state.get("b", b"k").unwrap(), None);
    }

    #[test]
    fn test_sqlite_set_get_delete() {
        let mut state = SqliteState::open_in_memory().unwrap();
        let key = b"c0ffee";

        assert_eq!(state.get("script", key).unwrap(), None);
        state.set("script", key, b"2024-01-01T00:00:00Z").unwrap();
        assert_eq!(
            state.get("script", key).unwrap(),
            Some(b"2024-01-01T00:00:00Z".to_vec())
        );

        state.delete("script", key).unwrap();
        assert_eq!(state.get("script", key).unwrap(), None);
        // Deleting again is still fine
        state.delete("script", key).unwrap();
    }

    #[test]
    fn test_sqlite_persists_across_opens() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("state.db");

        {
            let mut state = SqliteState::open(&db_path).unwrap();
            state.set("script", b"a", b"1").unwrap();
            state.set("scriptOnChange", b"a", b"2").unwrap();
        }

        let mut state = SqliteState::open(&db_path).unwrap();
        assert_eq!(state.get("script", b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(state.records().unwrap().len(), 2);

        assert_eq!(state.delete_bucket("script").unwrap(), 1);
        assert_eq!(state.get("script", b"a").unwrap(), None);
        assert_eq!(
            state.get("scriptOnChange", b"a").unwrap(),
            Some(b"2".to_vec())
        );
    }

    #[test]
    fn test_open_existing_does_not_create() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("state.db");

        assert!(SqliteState::open_existing(&db_path).unwrap().is_none());
        assert!(!tmp.path().join("nested").exists());

        SqliteState::open(&db_path)
            .unwrap()
            .set("script", b"a", b"1")
            .unwrap();
        let state = SqliteState::open_existing(&db_path).unwrap().unwrap();
        assert_eq!(state.get("script", b"a").unwrap(), Some(b"1".to_vec()));
    }
}
