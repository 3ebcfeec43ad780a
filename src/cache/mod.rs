//! In-process TTL cache used for computed read models (the dashboard summary).

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() >= expires_at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<DashMap<String, CacheEntry>>,
    /// Bumped by every delete or clear
    generation: Arc<AtomicU64>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.store.remove(key);
        }
        None
    }

    pub fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        self.store
            .insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    pub fn delete(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.remove(key);
    }

    /// Token for [`InMemoryCache::set_json_if_fresh`]; read it before computing the value
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.clear();
    }

    /// Reads and deserializes a JSON value; a corrupt entry counts as a miss.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping unreadable cache entry");
                self.delete(key);
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl);
        Ok(())
    }

    /// Stores `value` unless an invalidation happened since `generation` was read.
    ///
    /// Returns whether the value stayed cached. A delete racing with the insert either
    /// bumps the generation before the re-check or removes the entry after it.
    pub fn set_json_if_fresh<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        generation: u64,
    ) -> Result<bool, CacheError> {
        let raw = serde_json::to_string(value)?;
        if self.generation() != generation {
            return Ok(false);
        }
        self.set(key, raw, ttl);
        if self.generation() != generation {
            self.store.remove(key);
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("a", "1".into(), None);
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert!(cache.exists("a"));
        cache.delete("a");
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = InMemoryCache::new();
        cache.set("a", "1".into(), Some(Duration::ZERO));
        assert!(cache.get("a").is_none());
        assert!(!cache.exists("a"));
    }

    #[test]
    fn stale_values_are_not_stored() {
        let cache = InMemoryCache::new();
        let seen = cache.generation();
        cache.delete("summary");
        assert!(!cache.set_json_if_fresh("summary", &1, None, seen).unwrap());
        assert!(cache.get("summary").is_none());

        let seen = cache.generation();
        assert!(cache.set_json_if_fresh("summary", &2, None, seen).unwrap());
        assert_eq!(cache.get_json::<i32>("summary"), Some(2));
    }

    #[test]
    fn json_roundtrip_and_corrupt_entry() {
        let cache = InMemoryCache::new();
        cache.set_json("n", &vec![1, 2, 3], None).unwrap();
        assert_eq!(cache.get_json::<Vec<i32>>("n"), Some(vec![1, 2, 3]));

        cache.set("bad", "{not json".into(), None);
        assert_eq!(cache.get_json::<Vec<i32>>("bad"), None);
        assert!(cache.get("bad").is_none());
    }
}
