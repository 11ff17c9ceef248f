//! Performance sample types shared by the monitor and the coordinator.

use crate::{MonitorError, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which cache, if any, served the result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Schema,
    Export,
    #[default]
    None,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Schema => "schema",
            CacheType::Export => "export",
            CacheType::None => "none",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded operation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: Timestamp,
    pub duration_ms: f64,
    pub cache_hit: bool,
    pub cache_type: CacheType,
}

impl PerformanceSample {
    /// Sample stamped with the current wall-clock time.
    pub fn new(duration_ms: f64, cache_hit: bool, cache_type: CacheType) -> Self {
        Self {
            timestamp: Utc::now(),
            duration_ms,
            cache_hit,
            cache_type,
        }
    }

    /// Sample for an operation served by `cache_type`.
    pub fn hit(duration: Duration, cache_type: CacheType) -> Self {
        Self::new(duration_to_ms(duration), true, cache_type)
    }

    /// Sample for an operation no cache served.
    pub fn miss(duration: Duration) -> Self {
        Self::new(duration_to_ms(duration), false, CacheType::None)
    }

    /// Reject samples that would corrupt derived statistics.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !self.duration_ms.is_finite() {
            return Err(MonitorError::InvalidSample {
                reason: format!("duration_ms must be finite, got {}", self.duration_ms),
            });
        }
        if self.duration_ms < 0.0 {
            return Err(MonitorError::InvalidSample {
                reason: format!("duration_ms must not be negative, got {}", self.duration_ms),
            });
        }
        if self.cache_hit && self.cache_type == CacheType::None {
            return Err(MonitorError::InvalidSample {
                reason: "cache hit must name the cache that served it".to_string(),
            });
        }
        Ok(())
    }
}

/// Convert a duration to fractional milliseconds.
pub fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_duration_rejected() {
        let sample = PerformanceSample::new(-1.0, false, CacheType::None);
        assert!(matches!(
            sample.validate(),
            Err(MonitorError::InvalidSample { .. })
        ));
    }

    #[test]
    fn test_nan_duration_rejected() {
        let sample = PerformanceSample::new(f64::NAN, false, CacheType::None);
        assert!(sample.validate().is_err());
    }

    #[test]
    fn test_hit_without_cache_type_rejected() {
        let sample = PerformanceSample::new(3.0, true, CacheType::None);
        assert!(sample.validate().is_err());
    }

    #[test]
    fn test_constructors() {
        let hit = PerformanceSample::hit(Duration::from_millis(12), CacheType::Export);
        assert!(hit.cache_hit);
        assert_eq!(hit.cache_type, CacheType::Export);
        assert!((hit.duration_ms - 12.0).abs() < 1e-9);
        assert!(hit.validate().is_ok());

        let miss = PerformanceSample::miss(Duration::ZERO);
        assert!(!miss.cache_hit);
        assert_eq!(miss.cache_type, CacheType::None);
        assert!(miss.validate().is_ok());
    }

    #[test]
    fn test_cache_type_serializes_lowercase() {
        let json = serde_json::to_string(&CacheType::Schema).unwrap();
        assert_eq!(json, "\"schema\"");
        assert_eq!(CacheType::default(), CacheType::None);
    }
}
