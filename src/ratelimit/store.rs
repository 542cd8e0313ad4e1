//! Shared window record store.
//!
//! The store is created once at startup and handed to every limiter. It is
//! backed by a [`DashMap`], and the per-key check-or-create, increment and
//! read-back in [`WindowStore::hit`] all happen under that key's shard write
//! guard. A plain `get` followed by `insert` would lose increments when two
//! workers race on the same caller.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::key::WindowKey;
use super::window::WindowRecord;

/// Handle to the window record store. Clones share state.
#[derive(Clone, Default)]
pub struct WindowStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    records: DashMap<WindowKey, WindowRecord>,
    /// Soft bound on the number of records
    max_records: Option<usize>,
}

impl WindowStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `max_records` records.
    ///
    /// The bound is best effort: concurrent inserts of brand new keys may
    /// briefly overshoot it by the number of racing workers.
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                records: DashMap::new(),
                max_records: Some(max_records),
            }),
        }
    }

    /// Count one request against `key` and return the updated record.
    ///
    /// Opens a fresh window when no record exists or the stored one has
    /// expired at `now`.
    pub fn hit(&self, key: WindowKey, now: u64, window_ms: u64) -> WindowRecord {
        if let Some(max) = self.inner.max_records {
            // Must run before `entry` below: DashMap deadlocks if we touch
            // other shards while holding an entry guard.
            if self.inner.records.len() >= max && !self.inner.records.contains_key(&key) {
                self.make_room(now, max);
            }
        }

        let mut entry = self
            .inner
            .records
            .entry(key)
            .or_insert_with(|| WindowRecord::open(now, window_ms));

        if entry.is_expired(now) {
            trace!(scope = %entry.key().scope, "Window expired, opening a new one");
            *entry = WindowRecord::open(now, window_ms);
        }

        entry.count += 1;
        *entry
    }

    /// Look up the record stored for `key`, stale or not.
    pub fn get(&self, key: &WindowKey) -> Option<WindowRecord> {
        self.inner.records.get(key).map(|r| *r)
    }

    /// Remove every record whose window has closed at `now`.
    ///
    /// Returns the number of records removed.
    pub fn sweep(&self, now: u64) -> usize {
        let mut removed = 0;
        self.inner.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!(removed, remaining = self.len(), "Swept expired window records");
        }
        removed
    }

    /// Number of stored records, including stale ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Clear all records.
    pub fn clear(&self) {
        self.inner.records.clear();
    }

    /// Free at least one slot: sweep expired records, then evict the record
    /// whose window closes first.
    fn make_room(&self, now: u64, max: usize) {
        self.sweep(now);
        if self.inner.records.len() < max {
            return;
        }

        let victim = self
            .inner
            .records
            .iter()
            .min_by_key(|r| r.value().reset_time)
            .map(|r| r.key().clone());

        if let Some(key) = victim {
            debug!(scope = %key.scope, "Window store full, evicting oldest record");
            self.inner.records.remove(&key);
        }
    }
}
