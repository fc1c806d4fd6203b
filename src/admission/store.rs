//! Concurrent per-key admission state.
//!
//! # Design Decisions
//! - `DashMap` shards keys across independent locks; keys on different
//!   shards never contend
//! - The `EntryGuard` returned by `get_or_create` holds the shard's write
//!   lock, which serializes every read-modify-write for that key
//! - Sweeping goes through `retain`, which takes the same shard locks, so an
//!   entry is never removed while it is being updated

use std::time::{Duration, Instant};

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use thiserror::Error;

use crate::admission::delay::DelayState;
use crate::admission::key::Key;
use crate::admission::window::WindowState;
use crate::observability::metrics;

/// Exclusive handle on one key's entry. Drop it to release the key.
pub type EntryGuard<'a> = RefMut<'a, Key, PerKeyEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("admission store is full ({max_keys} keys) and no stale entry can be evicted")]
    CapacityExceeded { max_keys: usize },
}

/// Everything tracked for a single key.
#[derive(Debug, Clone)]
pub struct PerKeyEntry {
    pub window: WindowState,
    pub delay: DelayState,
    pub last_accessed: Instant,
}

impl PerKeyEntry {
    pub fn new(now: Instant) -> Self {
        Self {
            window: WindowState::new(now),
            delay: DelayState::new(now),
            last_accessed: now,
        }
    }

    /// True once both windows have run out, i.e. the next request would
    /// start from zero anyway.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        now.saturating_duration_since(self.window.window_start) >= stale_after
            && now.saturating_duration_since(self.delay.window_start) >= stale_after
    }
}

pub struct StateStore {
    entries: DashMap<Key, PerKeyEntry>,
    max_keys: Option<usize>,
    stale_after: Duration,
}

impl StateStore {
    /// Create an unbounded store. `stale_after` is the longest window in use
    /// and decides which entries may be displaced when a cap is set.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_keys: None,
            stale_after,
        }
    }

    /// Bound the number of distinct keys.
    pub fn with_max_keys(mut self, max_keys: Option<usize>) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Return the entry for `key`, creating a fresh one if needed.
    ///
    /// At most one entry exists per key even when many callers race on first
    /// access: creation goes through the map's entry API under the shard lock.
    pub fn get_or_create(&self, key: &Key, now: Instant) -> Result<EntryGuard<'_>, StoreError> {
        if let Some(entry) = self.entries.get_mut(key) {
            return Ok(entry);
        }

        if let Some(max_keys) = self.max_keys {
            if self.entries.len() >= max_keys && !self.evict_stale(now) {
                // Another caller may have created this key since the first lookup.
                if let Some(entry) = self.entries.get_mut(key) {
                    return Ok(entry);
                }
                tracing::warn!(key = %key, max_keys, "Admission store full, denying new key");
                return Err(StoreError::CapacityExceeded { max_keys });
            }
        }

        // The tracked-keys gauge is refreshed by `sweep`: reading `len()` here
        // would need the shard lock this guard already holds.
        Ok(self
            .entries
            .entry(key.clone())
            .or_insert_with(|| PerKeyEntry::new(now)))
    }

    /// Remove the stale entry that was touched longest ago.
    fn evict_stale(&self, now: Instant) -> bool {
        let candidate = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_stale(now, self.stale_after))
            .min_by_key(|entry| entry.value().last_accessed)
            .map(|entry| entry.key().clone());

        let Some(key) = candidate else {
            return false;
        };

        // Re-check under the write lock; the entry may have been used since.
        let evicted = self
            .entries
            .remove_if(&key, |_, entry| entry.is_stale(now, self.stale_after))
            .is_some();

        if evicted {
            tracing::debug!(key = %key, "Evicted stale key to make room");
            metrics::record_eviction("capacity", 1);
        }
        evicted
    }

    /// Drop every entry idle for at least `idle_threshold`. Returns the number
    /// of entries removed.
    pub fn sweep(&self, now: Instant, idle_threshold: Duration) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now.saturating_duration_since(entry.last_accessed) < idle_threshold;
            if !keep {
                removed += 1;
            }
            keep
        });

        metrics::record_tracked_keys(self.entries.len());
        if removed > 0 {
            metrics::record_eviction("idle", removed as u64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Copy of the entry for `key`, if tracked.
    pub fn snapshot(&self, key: &Key) -> Option<PerKeyEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_get_or_create_is_lazy() {
        let store = StateStore::new(WINDOW);
        let now = Instant::now();
        let key = Key::from("198.51.100.1");

        assert!(store.is_empty());
        {
            let entry = store.get_or_create(&key, now).unwrap();
            assert_eq!(entry.window.count, 0);
            assert_eq!(entry.last_accessed, now);
        }
        assert!(store.contains(&key));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_existing_entry_is_returned() {
        let store = StateStore::new(WINDOW);
        let now = Instant::now();
        let key = Key::from("a");

        store.get_or_create(&key, now).unwrap().window.count = 7;
        let later = now + Duration::from_secs(1);
        let entry = store.get_or_create(&key, later).unwrap();
        assert_eq!(entry.window.count, 7);
        assert_eq!(entry.window.window_start, now);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_entry() {
        let store = Arc::new(StateStore::new(WINDOW));
        let now = Instant::now();
        let key = Key::from("shared-nat");

        std::thread::scope(|scope| {
            for _ in 0..32 {
                let store = store.clone();
                let key = key.clone();
                scope.spawn(move || {
                    let mut entry = store.get_or_create(&key, now).unwrap();
                    entry.window.count += 1;
                });
            }
        });

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot(&key).unwrap().window.count, 32);
    }

    #[test]
    fn test_sweep_removes_only_idle_entries() {
        let store = StateStore::new(WINDOW);
        let start = Instant::now();
        let idle = Duration::from_secs(120);

        store.get_or_create(&Key::from("old"), start).unwrap();
        let mut fresh = store.get_or_create(&Key::from("fresh"), start).unwrap();
        fresh.last_accessed = start + Duration::from_secs(100);
        drop(fresh);

        let removed = store.sweep(start + idle, idle);
        assert_eq!(removed, 1);
        assert!(!store.contains(&Key::from("old")));
        assert!(store.contains(&Key::from("fresh")));
    }

    #[test]
    fn test_capacity_evicts_oldest_stale_entry() {
        let store = StateStore::new(WINDOW).with_max_keys(Some(2));
        let start = Instant::now();

        store.get_or_create(&Key::from("first"), start).unwrap();
        let mut second = store.get_or_create(&Key::from("second"), start).unwrap();
        second.last_accessed = start + Duration::from_secs(1);
        drop(second);

        let later = start + WINDOW;
        store.get_or_create(&Key::from("third"), later).unwrap();

        assert_eq!(store.len(), 2);
        assert!(!store.contains(&Key::from("first")));
        assert!(store.contains(&Key::from("second")));
        assert!(store.contains(&Key::from("third")));
    }

    #[test]
    fn test_capacity_denies_new_key_without_stale_entries() {
        let store = StateStore::new(WINDOW).with_max_keys(Some(1));
        let now = Instant::now();

        store.get_or_create(&Key::from("resident"), now).unwrap();
        assert!(matches!(
            store.get_or_create(&Key::from("newcomer"), now),
            Err(StoreError::CapacityExceeded { max_keys: 1 })
        ));

        // Existing keys keep working at capacity.
        assert!(store.get_or_create(&Key::from("resident"), now).is_ok());
    }

    #[test]
    fn test_racing_first_access_at_capacity_never_denies_the_key() {
        let now = Instant::now();
        let key = Key::from("only-slot");

        for _ in 0..200 {
            let store = StateStore::new(WINDOW).with_max_keys(Some(1));
            let barrier = std::sync::Barrier::new(4);
            let denied = std::sync::atomic::AtomicUsize::new(0);

            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        barrier.wait();
                        if store.get_or_create(&key, now).is_err() {
                            denied.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(denied.into_inner(), 0);
            assert_eq!(store.len(), 1);
        }
    }
}
