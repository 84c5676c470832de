use chrono::{DateTime, Duration, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;

// chrono durations top out at i64::MAX milliseconds.
const MAX_TTL_SECONDS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub ttl_seconds: u64,
}

/// In-memory store with one TTL for every entry.
///
/// Expired entries stay in the map until the next `get` for their key (or
/// until the capacity bound needs room); nothing sweeps in the background.
pub struct ExpiringCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(ttl_seconds: u64, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let fresh = match entries.get(key) {
            Some(entry) => self.is_fresh(entry, now),
            None => return None,
        };

        if fresh {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn set(&self, key: String, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| now - entry.created_at < self.ttl);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::debug!("Cache full, evicting {}", oldest);
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
            },
        );
    }

    /// Drops every entry and returns how many were held.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let active = entries
            .values()
            .filter(|entry| self.is_fresh(entry, now))
            .count();

        CacheStats {
            total_entries: entries.len(),
            active_entries: active,
            expired_entries: entries.len() - active,
            ttl_seconds: self.ttl.num_seconds().max(0) as u64,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: DateTime<Local>) -> bool {
        now - entry.created_at < self.ttl
    }
}
