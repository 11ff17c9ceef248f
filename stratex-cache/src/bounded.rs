//! TTL and capacity bounded cache.
//!
//! All state lives behind one mutex per cache instance, so lookups,
//! population, eviction and the hit/miss counters always observe a single
//! consistent snapshot. Expiry is evaluated lazily on read; `purge_expired`
//! is available for callers that want to reclaim memory eagerly.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use stratex_core::{CacheError, CacheSettings, Clock, Digest, StratexResult, SystemClock};

use crate::entry::CacheEntry;
use crate::stats::CacheStats;

/// Upper bound on slots reserved up front; `max_entries` is a limit, not a
/// size hint.
const INITIAL_CAPACITY_LIMIT: usize = 64;

/// Mutable cache state guarded by the cache mutex.
struct CacheState<V> {
    entries: HashMap<Digest, CacheEntry<V>>,
    hit_count: u64,
    miss_count: u64,
    evictions: u64,
    expirations: u64,
    /// Logical clock bumped on every insert and hit.
    seq: u64,
}

impl<V> CacheState<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(INITIAL_CAPACITY_LIMIT)),
            hit_count: 0,
            miss_count: 0,
            evictions: 0,
            expirations: 0,
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn least_recently_used(&self) -> Option<Digest> {
        self.entries
            .values()
            .min_by(|a, b| a.recency_cmp(b))
            .map(|entry| *entry.key())
    }
}

/// Bounded associative store keyed by content digest.
///
/// # Example
///
/// ```rust,ignore
/// let cache: BoundedCache<String> =
///     BoundedCache::new("schema", &CacheSettings::new(60, 2), Arc::new(SystemClock))?;
///
/// cache.put(Digest::of(b"x"), "v1".to_string())?;
/// assert_eq!(cache.get(&Digest::of(b"x"))?, Some("v1".to_string()));
/// ```
pub struct BoundedCache<V> {
    name: String,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone + Send> BoundedCache<V> {
    /// Create a cache, rejecting zero or oversized TTL and zero capacity.
    pub fn new(
        name: impl Into<String>,
        settings: &CacheSettings,
        clock: Arc<dyn Clock>,
    ) -> StratexResult<Self> {
        let name = name.into();
        settings.validate(&name)?;
        Ok(Self {
            ttl: settings.ttl(),
            max_entries: settings.max_entries,
            clock,
            state: Mutex::new(CacheState::new(settings.max_entries)),
            name,
        })
    }

    /// Create a cache driven by the system clock.
    pub fn with_system_clock(
        name: impl Into<String>,
        settings: &CacheSettings,
    ) -> StratexResult<Self> {
        Self::new(name, settings, Arc::new(SystemClock))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    fn lock(&self) -> StratexResult<MutexGuard<'_, CacheState<V>>> {
        self.state.lock().map_err(|_| {
            CacheError::LockPoisoned {
                cache: self.name.clone(),
            }
            .into()
        })
    }

    /// Look up a live entry.
    ///
    /// A hit refreshes the entry's recency. An entry found past its expiry
    /// is removed and counted as a miss.
    pub fn get(&self, key: &Digest) -> StratexResult<Option<V>> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            Some(entry) => !entry.is_live(now),
            None => {
                state.miss_count += 1;
                tracing::trace!(cache = %self.name, key = %key.short(), "cache miss");
                return Ok(None);
            }
        };

        if expired {
            state.entries.remove(key);
            state.expirations += 1;
            state.miss_count += 1;
            tracing::debug!(cache = %self.name, key = %key.short(), "expired entry dropped on read");
            return Ok(None);
        }

        let seq = state.next_seq();
        let value = match state.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now, seq);
                entry.value().clone()
            }
            None => return Ok(None),
        };
        state.hit_count += 1;
        tracing::trace!(cache = %self.name, key = %key.short(), "cache hit");
        Ok(Some(value))
    }

    /// Insert or overwrite an entry.
    ///
    /// Inserting a new key into a full cache first evicts one entry: the
    /// oldest entry never read since it was stored, or, if every entry has
    /// been read, the least recently used one. Overwriting an existing key
    /// never evicts.
    pub fn put(&self, key: Digest, value: V) -> StratexResult<()> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let seq = state.next_seq();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            if let Some(victim) = state.least_recently_used() {
                state.entries.remove(&victim);
                state.evictions += 1;
                tracing::debug!(
                    cache = %self.name,
                    evicted = %victim.short(),
                    inserted = %key.short(),
                    "evicted least recently used entry"
                );
            }
        }

        state
            .entries
            .insert(key, CacheEntry::new(key, value, now, self.ttl, seq));
        self.check_capacity(state)
    }

    /// Remove an entry. Returns whether anything was removed.
    pub fn invalidate(&self, key: &Digest) -> StratexResult<bool> {
        let removed = self.lock()?.entries.remove(key).is_some();
        if removed {
            tracing::debug!(cache = %self.name, key = %key.short(), "entry invalidated");
        }
        Ok(removed)
    }

    /// Remove every entry, keeping the lifetime hit/miss counters.
    pub fn clear(&self) -> StratexResult<usize> {
        let mut state = self.lock()?;
        let removed = state.entries.len();
        state.entries.clear();
        Ok(removed)
    }

    /// Drop every entry whose TTL has passed.
    pub fn purge_expired(&self) -> StratexResult<usize> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_live(now));
        let purged = before - state.entries.len();
        state.expirations += purged as u64;
        if purged > 0 {
            tracing::debug!(cache = %self.name, purged, "purged expired entries");
        }
        Ok(purged)
    }

    /// Whether a live entry exists. Does not touch recency or counters.
    pub fn contains(&self, key: &Digest) -> StratexResult<bool> {
        let now = self.clock.now();
        Ok(self
            .lock()?
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    /// Number of entries physically held.
    pub fn len(&self) -> StratexResult<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> StratexResult<bool> {
        Ok(self.lock()?.entries.is_empty())
    }

    /// Snapshot of size and counters.
    pub fn stats(&self) -> StratexResult<CacheStats> {
        let state = self.lock()?;
        Ok(CacheStats {
            size: state.entries.len(),
            capacity: self.max_entries,
            hit_count: state.hit_count,
            miss_count: state.miss_count,
            hit_ratio: CacheStats::ratio(state.hit_count, state.miss_count),
            evictions: state.evictions,
            expirations: state.expirations,
        })
    }

    /// Time left before `key` expires, if it is live.
    pub fn time_to_live(&self, key: &Digest) -> StratexResult<Option<Duration>> {
        let now = self.clock.now();
        Ok(self
            .lock()?
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| remaining(entry.expires_at(), now)))
    }

    fn check_capacity(&self, state: &CacheState<V>) -> StratexResult<()> {
        let size = state.entries.len();
        debug_assert!(
            size <= self.max_entries,
            "cache {} holds {} entries over capacity {}",
            self.name,
            size,
            self.max_entries
        );
        if size > self.max_entries {
            return Err(CacheError::InvariantViolation {
                cache: self.name.clone(),
                size,
                capacity: self.max_entries,
            }
            .into());
        }
        Ok(())
    }
}

fn remaining(expires_at: Option<Instant>, now: Instant) -> Duration {
    expires_at.map_or(Duration::MAX, |expires_at| {
        expires_at.saturating_duration_since(now)
    })
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}
