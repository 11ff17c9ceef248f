//! stratex Core - Shared Types
//!
//! Data types used by every stratex crate: content digests, the clock
//! abstraction, performance samples, configuration and the error taxonomy.
//! Nothing in here owns mutable shared state.

pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod perf;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheSettings, ExportCacheConfig, MonitorSettings, MAX_TTL_MINUTES};
pub use error::{
    AlertError, CacheError, ConfigError, ExportError, MonitorError, StratexError, StratexResult,
};
pub use health::{HealthCheck, HealthStatus};
pub use identity::{Digest, DigestBuilder, DigestParseError, Timestamp};
pub use perf::{duration_to_ms, CacheType, PerformanceSample};
