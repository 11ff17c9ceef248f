//! Error types for stratex operations

use thiserror::Error;

/// Configuration errors.
///
/// Raised at construction time only. Nothing in stratex falls back to a
/// default once a value has been rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Bounded cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned: {cache}")]
    LockPoisoned { cache: String },

    /// The cache holds more entries than its capacity after a mutation.
    /// Only reachable through a locking bug.
    #[error("Cache invariant violated in {cache}: {size} entries exceed capacity {capacity}")]
    InvariantViolation {
        cache: String,
        size: usize,
        capacity: usize,
    },
}

/// Performance monitor errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Invalid performance sample: {reason}")]
    InvalidSample { reason: String },

    #[error("Monitor lock poisoned")]
    LockPoisoned,

    #[error("Metrics registration failed: {reason}")]
    Metrics { reason: String },
}

/// Failures of the underlying export routine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("Export failed: {reason}")]
    Failed { reason: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Export timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

/// Alert delivery errors returned by an alert sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AlertError {
    #[error("Alert delivery to {sink} failed: {reason}")]
    Delivery { sink: String, reason: String },
}

/// Master error type for all stratex errors.
#[derive(Debug, Clone, Error)]
pub enum StratexError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),
}

/// Result type alias for stratex operations.
pub type StratexResult<T> = Result<T, StratexError>;

// =============================================================================
// TESTS
// =============================================================================
