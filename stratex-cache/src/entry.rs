//! A single cached value and its timing metadata.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use stratex_core::Digest;

/// Cached value keyed by a content digest.
///
/// An entry is visible to readers only while `now < expires_at`. An expiry
/// past the end of `Instant`'s range is stored as `None` and never lapses.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    key: Digest,
    value: V,
    created_at: Instant,
    last_accessed_at: Instant,
    expires_at: Option<Instant>,
    /// Logical access counter from the owning cache; separates entries
    /// whose timestamps coincide.
    access_seq: u64,
    hits: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(key: Digest, value: V, now: Instant, ttl: Duration, seq: u64) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_accessed_at: now,
            expires_at: now.checked_add(ttl),
            access_seq: seq,
            hits: 0,
        }
    }

    pub fn key(&self) -> &Digest {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Reads served by this entry since it was stored.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }

    pub(crate) fn touch(&mut self, now: Instant, seq: u64) {
        self.last_accessed_at = now;
        self.access_seq = seq;
        self.hits += 1;
    }

    /// Eviction order: entries never read go first, then oldest
    /// `last_accessed_at`, then oldest `created_at`, then the earlier logical
    /// access.
    pub(crate) fn recency_cmp(&self, other: &Self) -> Ordering {
        (self.hits > 0)
            .cmp(&(other.hits > 0))
            .then(self.last_accessed_at.cmp(&other.last_accessed_at))
            .then(self.created_at.cmp(&other.created_at))
            .then(self.access_seq.cmp(&other.access_seq))
    }
}
