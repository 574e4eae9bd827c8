use std::future::Future;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CoreError;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_kv_store.sql");

/// Key holding the persisted theme preference.
pub const THEME_KEY: &str = "@app_theme_preference";

/// Key holding the push token that identifies this install to the backend.
pub const DEVICE_TOKEN_KEY: &str = "@push_token";

/// Async string key-value storage.
///
/// Implementations decide where suspension happens; callers only see futures.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CoreError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// SQLite-backed key-value storage.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or overwrite a value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> Result<(), CoreError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}
