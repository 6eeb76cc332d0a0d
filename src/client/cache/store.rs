//! In-memory query cache
//!
//! Maps [`CacheKey`]s to [`CacheEntry`]s. Each entry records who wrote it last
//! (an optimistic projection or server-confirmed data), whether it is stale,
//! and the sequence number of the most recent mutation that projected onto it.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, trace};

use super::key::{CacheKey, KeyPattern};
use super::value::{CacheValue, ServerDelta};

/// Who produced the value currently held by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// Projected by the pending mutation with this sequence number
    Optimistic { seq: u64 },
    ServerConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: CacheValue,
    pub written_by: WriteOrigin,
    /// Set by invalidation; the next read refetches
    pub stale: bool,
    /// Highest mutation sequence number that projected onto this key
    ///
    /// Survives server writes, and is restored with the rest of the entry on
    /// rollback.
    pub touched_seq: Option<u64>,
}

impl CacheEntry {
    pub fn confirmed(value: CacheValue) -> Self {
        Self {
            value,
            written_by: WriteOrigin::ServerConfirmed,
            stale: false,
            touched_seq: None,
        }
    }

    /// Apply a server delta to this entry in place
    ///
    /// Returns `true` if the entry changed.
    pub fn merge(&mut self, key: &CacheKey, delta: &ServerDelta) -> bool {
        if let ServerDelta::Invalidate = delta {
            let changed = !self.stale;
            self.stale = true;
            return changed;
        }
        match delta.apply(key, Some(&self.value)) {
            Some(value) => {
                self.value = value;
                self.written_by = WriteOrigin::ServerConfirmed;
                if delta.refreshes() {
                    self.stale = false;
                }
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A projection was attempted with a sequence number older than the
    /// one that last touched the key
    #[error("optimistic write to {key} with seq {seq} after seq {touched}")]
    StaleOptimisticWrite { key: String, seq: u64, touched: u64 },
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `key`, stale or not
    pub fn read(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Whether a read of `key` has to go to the server
    pub fn needs_fetch(&self, key: &CacheKey) -> bool {
        self.entries.get(key).map_or(true, |entry| entry.stale)
    }

    pub fn touched_seq(&self, key: &CacheKey) -> Option<u64> {
        self.entries.get(key).and_then(|entry| entry.touched_seq)
    }

    /// Store server-confirmed data under `key`
    ///
    /// Clears the stale flag and keeps `touched_seq`.
    pub fn write(&mut self, key: CacheKey, value: CacheValue) {
        trace!("[Cache] write {}", key);
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.written_by = WriteOrigin::ServerConfirmed;
                entry.stale = false;
            }
            None => {
                self.entries.insert(key, CacheEntry::confirmed(value));
            }
        }
    }

    /// Apply a server delta to the live entry
    ///
    /// Creates the entry when the delta yields a value for an absent key.
    /// Returns `true` if anything changed.
    pub fn merge(&mut self, key: CacheKey, delta: &ServerDelta) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.merge(&key, delta),
            None => match delta.apply(&key, None) {
                Some(value) => {
                    self.entries.insert(key, CacheEntry::confirmed(value));
                    true
                }
                None => false,
            },
        }
    }

    /// Replace the value under `key` with `f(current)`
    ///
    /// `f` returning `None` leaves the entry untouched. The write origin and
    /// flags of an existing entry are kept.
    pub fn transform(
        &mut self,
        key: CacheKey,
        f: impl FnOnce(Option<&CacheValue>) -> Option<CacheValue>,
    ) -> bool {
        let Some(value) = f(self.read(&key)) else {
            return false;
        };
        match self.entries.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                self.entries.insert(key, CacheEntry::confirmed(value));
            }
        }
        true
    }

    /// Project the effect of the pending mutation `seq` onto `key`
    ///
    /// # Errors
    ///
    /// Fails if a newer mutation has already projected onto the key.
    pub fn transform_optimistic(
        &mut self,
        key: CacheKey,
        seq: u64,
        f: impl FnOnce(Option<&CacheValue>) -> Option<CacheValue>,
    ) -> Result<bool, CacheError> {
        if let Some(touched) = self.touched_seq(&key) {
            if touched > seq {
                return Err(CacheError::StaleOptimisticWrite {
                    key: key.to_string(),
                    seq,
                    touched,
                });
            }
        }
        let Some(value) = f(self.read(&key)) else {
            return Ok(false);
        };
        trace!("[Cache] optimistic write {} (seq {})", key, seq);
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| CacheEntry::confirmed(value.clone()));
        entry.value = value;
        entry.written_by = WriteOrigin::Optimistic { seq };
        entry.touched_seq = Some(seq);
        Ok(true)
    }

    /// The server has answered for whatever is in the entry now
    pub fn confirm(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.written_by = WriteOrigin::ServerConfirmed;
        }
    }

    pub fn mark_fresh(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = false;
        }
    }

    /// Mark matching entries stale; returns how many were marked
    pub fn invalidate(&mut self, pattern: KeyPattern) -> usize {
        let mut count = 0;
        for (key, entry) in self.entries.iter_mut() {
            if pattern.matches(key) && !entry.stale {
                entry.stale = true;
                count += 1;
            }
        }
        if count > 0 {
            debug!("[Cache] invalidated {} entries matching {:?}", count, pattern);
        }
        count
    }

    /// Put an entry back exactly as captured; `None` removes the key
    pub fn restore(&mut self, key: CacheKey, entry: Option<CacheEntry>) {
        match entry {
            Some(entry) => {
                self.entries.insert(key, entry);
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    pub fn keys_matching(&self, pattern: KeyPattern) -> Vec<CacheKey> {
        self.entries
            .keys()
            .filter(|key| pattern.matches(key))
            .copied()
            .collect()
    }

    /// Keys whose value is stale
    pub fn stale_keys(&self) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
