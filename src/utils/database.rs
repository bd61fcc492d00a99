//! Provides functions for interacting with the application's SQLite database.
//! Handles table creation and the rows backing the persistent key/value cache.

use rusqlite::{Connection, Result as SqlResult, params};
use std::path::Path;

/// The default filename for the SQLite database.
pub const APPDATA_DB: &str = "application_data.db";

/// A persisted key/value cache row. `expires_at` is a unix timestamp in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheRow {
    pub key: String,
    pub value: String,
    pub expires_at: i64,
}

/// Creates the `key_value_cache` table if it doesn't exist.
pub fn init_db(path: &Path) -> SqlResult<()> {
    let conn = Connection::open(path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS key_value_cache (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Inserts or replaces a cache row.
pub fn store_cache_row(path: &Path, row: &CacheRow) -> SqlResult<()> {
    let conn = Connection::open(path)?;
    conn.execute(
        "INSERT OR REPLACE INTO key_value_cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
        params![row.key, row.value, row.expires_at],
    )?;
    Ok(())
}

/// Deletes the row for `key` if it expired at or before `now`.
/// A row that was refreshed in the meantime is kept.
pub fn delete_expired_cache_row(path: &Path, key: &str, now: i64) -> SqlResult<()> {
    let conn = Connection::open(path)?;
    conn.execute(
        "DELETE FROM key_value_cache WHERE key = ?1 AND expires_at <= ?2",
        params![key, now],
    )?;
    Ok(())
}

/// Drops every row that expired at or before `now` and returns the remaining ones.
pub fn load_live_cache_rows(path: &Path, now: i64) -> SqlResult<Vec<CacheRow>> {
    let conn = Connection::open(path)?;
    conn.execute(
        "DELETE FROM key_value_cache WHERE expires_at <= ?1",
        params![now],
    )?;

    let mut statement = conn.prepare("SELECT key, value, expires_at FROM key_value_cache")?;
    let rows = statement.query_map([], |row| {
        Ok(CacheRow {
            key: row.get(0)?,
            value: row.get(1)?,
            expires_at: row.get(2)?,
        })
    })?;

    rows.collect()
}
