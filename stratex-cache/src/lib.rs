//! stratex Cache - Bounded TTL Cache
//!
//! A content-addressed cache with time-based expiry and least-recently-used
//! capacity eviction. The export coordinator runs two instances of it: one
//! for schema validation verdicts and one for export artifacts.
//!
//! # Semantics
//!
//! - An entry is visible only while `now < expires_at`; expired entries are
//!   removed by the read that finds them or by [`BoundedCache::purge_expired`].
//! - `size <= max_entries` holds after every mutation. Inserting a new key
//!   into a full cache evicts exactly one entry. Entries that were never read
//!   go first (oldest first); among entries that were read, the least
//!   recently used goes.
//! - Hit and miss counters cover the cache's whole lifetime and survive
//!   [`BoundedCache::clear`].

pub mod bounded;
pub mod entry;
pub mod stats;

pub use bounded::BoundedCache;
pub use entry::CacheEntry;
pub use stats::CacheStats;
