// src/api/cache.rs
//! Time-based content cache over an injected key-value store.
//!
//! Entries are invalidated by the server-supplied last-edited timestamp
//! plus an optional absolute expiry. Reads never fail — a missing or
//! corrupt entry is a cache miss — and writes are best-effort, so a broken
//! store never blocks a fresh fetch.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{CACHE_KIND_BLOCK, CACHE_KIND_PAGE, CACHE_NAMESPACE};

/// An externally injected key-value store capability.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>);
    fn delete(&self, key: &str);
}

/// In-memory store; the test fake and the disabled-cache default.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// File-per-key store under a cache directory, filenames hashed so keys
/// never need escaping. All failures are swallowed: the cache is an
/// optimization, not a dependency.
pub struct DiskStore {
    cache_dir: PathBuf,
}

impl DiskStore {
    pub fn new(cache_dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.cache_dir.join(format!("{:016x}.json", hasher.finish()))
    }
}

impl KeyValueStore for DiskStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.key_to_path(key)).ok()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        if let Err(err) = std::fs::write(self.key_to_path(key), value) {
            log::debug!("cache write for {} failed: {}", key, err);
        }
    }

    fn delete(&self, key: &str) {
        let _ = std::fs::remove_file(self.key_to_path(key));
    }
}

/// What kind of payload a cache entry holds. Kinds never share keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Page,
    Blocks,
}

impl CacheKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Page => CACHE_KIND_PAGE,
            Self::Blocks => CACHE_KIND_BLOCK,
        }
    }
}

/// A cached payload with the timestamps that decide its fate.
///
/// Immutable once written; a cache set always replaces, never merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    /// Epoch milliseconds, truncated to the minute. The truncation trades a
    /// small staleness window for resilience to clock skew between this
    /// host and the remote clock.
    pub cached_time: i64,
    /// Absolute epoch-ms expiry, when a max age is configured.
    pub expires_at: Option<i64>,
}

impl<T> CacheEntry<T> {
    /// The freshness invariant: usable iff written strictly after the
    /// source's last edit, and not past its expiry.
    pub fn is_usable(&self, last_edited_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.cached_time > last_edited_time.timestamp_millis()
            && self
                .expires_at
                .map_or(true, |expires_at| now.timestamp_millis() <= expires_at)
    }
}

fn minute_truncated_now() -> i64 {
    let now = Utc::now().timestamp_millis();
    now - now.rem_euclid(60_000)
}

/// Typed get/set of content payloads keyed by (kind, id).
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn KeyValueStore>,
    max_age: Option<Duration>,
    enabled: bool,
}

impl ContentCache {
    pub fn new(store: Arc<dyn KeyValueStore>, max_age: Option<Duration>) -> Self {
        Self {
            store,
            max_age,
            enabled: true,
        }
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            max_age: None,
            enabled: false,
        }
    }

    fn cache_key(kind: CacheKind, id: &str) -> String {
        format!("{}_{}_{}", CACHE_NAMESPACE, kind.prefix(), id)
    }

    /// Reads an entry. Missing, corrupt, or undecodable entries are misses.
    pub fn get<T: DeserializeOwned>(&self, kind: CacheKind, id: &str) -> Option<CacheEntry<T>> {
        if !self.enabled {
            return None;
        }
        let bytes = self.store.get(&Self::cache_key(kind, id))?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Writes an entry, stamping it with the truncated current minute and
    /// the configured expiry. Returns the entry it wrote.
    pub fn set<T: Serialize>(&self, kind: CacheKind, id: &str, payload: T) -> CacheEntry<T> {
        let cached_time = minute_truncated_now();
        let entry = CacheEntry {
            payload,
            cached_time,
            expires_at: self
                .max_age
                .map(|max_age| cached_time + max_age.as_millis() as i64),
        };
        if self.enabled {
            match serde_json::to_vec(&entry) {
                Ok(bytes) => self.store.set(&Self::cache_key(kind, id), bytes),
                Err(err) => log::debug!("cache encode for {} {} failed: {}", kind.prefix(), id, err),
            }
        }
        entry
    }

    /// The payload, only if a usable entry exists for this source state.
    /// `None` means "go fetch".
    pub fn get_if_fresh<T: DeserializeOwned>(
        &self,
        kind: CacheKind,
        id: &str,
        last_edited_time: DateTime<Utc>,
    ) -> Option<T> {
        let entry = match self.get::<T>(kind, id) {
            Some(entry) => entry,
            None => {
                if self.enabled {
                    log::info!("cache miss for {} {}", kind.prefix(), id);
                }
                return None;
            }
        };

        if !entry.is_usable(last_edited_time, Utc::now()) {
            log::info!(
                "{} {} is updated or expired: refetching...",
                kind.prefix(),
                id
            );
            return None;
        }

        Some(entry.payload)
    }

    /// Deletes any entry for this (kind, id).
    pub fn invalidate(&self, kind: CacheKind, id: &str) {
        self.store.delete(&Self::cache_key(kind, id));
    }
}
