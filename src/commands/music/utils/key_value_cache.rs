//! A generic get-or-compute cache with per-entry expiry.
//!
//! Values are stored as JSON so a single cache can hold results of any
//! serializable type. Entries expire passively: staleness is only checked when a
//! key is read. Concurrent misses on the same key are coalesced so that only one
//! caller runs the computation while the others wait for its result.
//!
//! When built with [`KeyValueCache::with_database`], every stored entry is also
//! written to SQLite so the cache survives restarts.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::utils::database::{self, CacheRow};

use super::music_error::{MusicError, MusicResult};

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Shared key/value cache used by the autocomplete pipeline.
#[derive(Default)]
pub struct KeyValueCache {
    entries: DashMap<String, CacheEntry>,
    // One lock per key currently being computed
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    database: Option<PathBuf>,
}

impl KeyValueCache {
    /// Creates an in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that writes every entry through to the SQLite database at `path`.
    pub fn with_database(path: impl Into<PathBuf>) -> MusicResult<Self> {
        let path = path.into();
        database::init_db(&path)?;
        info!("Key/value cache persisted to {:?}", path);

        Ok(Self {
            database: Some(path),
            ..Self::default()
        })
    }

    /// Warms the in-memory map from the database, skipping expired rows.
    /// Returns the number of entries loaded.
    pub async fn load_persisted(&self) -> MusicResult<usize> {
        let Some(path) = self.database.clone() else {
            return Ok(0);
        };

        let now_ms = unix_millis_now();
        let rows =
            tokio::task::spawn_blocking(move || database::load_live_cache_rows(&path, now_ms))
                .await
                .map_err(|e| MusicError::TaskFailed(e.to_string()))??;

        let now = Instant::now();
        let mut loaded = 0;
        for row in rows {
            match serde_json::from_str::<Value>(&row.value) {
                Ok(value) => {
                    let remaining = Duration::from_millis((row.expires_at - now_ms).max(0) as u64);
                    self.entries.insert(
                        row.key,
                        CacheEntry {
                            value,
                            expires_at: now + remaining,
                        },
                    );
                    loaded += 1;
                }
                Err(e) => warn!("Skipping unreadable cache row '{}': {}", row.key, e),
            }
        }

        info!("Loaded {} cache entries from disk", loaded);
        Ok(loaded)
    }

    /// Returns the cached value for `key`, or runs `compute`, stores its result for
    /// `ttl` and returns it. Errors from `compute` are returned as-is and never cached.
    pub async fn wrap<T, E, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let lock = self.in_flight.entry(key.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        // Filled by whoever held the lock before us
        if let Some(value) = self.get(key).await {
            self.release(key, &lock);
            return Ok(value);
        }

        debug!("Cache miss for key: {}", key);
        let result = compute().await;
        if let Ok(value) = &result {
            self.set(key, value, ttl).await;
        }

        self.release(key, &lock);
        result
    }

    /// Reads a live entry. Expired entries are removed on the way.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                debug!("Cache hit for key: {}", key);
                return match serde_json::from_value(entry.value.clone()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!("Cached value for '{}' has an unexpected shape: {}", key, e);
                        None
                    }
                };
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("Cache entry expired for key: {}", key);
            self.entries
                .remove_if(key, |_, entry| entry.is_expired(Instant::now()));

            if let Some(path) = self.database.clone() {
                let key = key.to_string();
                let now_ms = unix_millis_now();
                persist(move || database::delete_expired_cache_row(&path, &key, now_ms)).await;
            }
        }

        None
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Not caching '{}', value is not serializable: {}", key, e);
                return;
            }
        };

        if let Some(path) = self.database.clone() {
            let row = CacheRow {
                key: key.to_string(),
                value: json.to_string(),
                expires_at: unix_millis_now().saturating_add(ttl.as_millis() as i64),
            };
            persist(move || database::store_cache_row(&path, &row)).await;
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: json,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Number of entries held in memory, including ones not yet found expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every in-memory entry. Persisted rows are left alone and expire on their own.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn release(&self, key: &str, lock: &Arc<Mutex<()>>) {
        self.in_flight
            .remove_if(key, |_, current| Arc::ptr_eq(current, lock));
    }
}

/// Runs a blocking database write. Failures are logged and never reach the caller.
async fn persist<F>(operation: F)
where
    F: FnOnce() -> rusqlite::Result<()> + Send + 'static,
{
    match tokio::task::spawn_blocking(operation).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to persist cache entry: {}", e),
        Err(e) => warn!("Cache persistence task failed: {}", e),
    }
}

fn unix_millis_now() -> i64 {
    Utc::now().timestamp_millis()
}
