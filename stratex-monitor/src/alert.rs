//! Slow-operation alert sinks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use stratex_core::{AlertError, PerformanceSample};
use uuid::Uuid;

/// Receiver of slow-operation alerts.
///
/// Invoked by the monitor for every recorded sample slower than the
/// configured threshold. Each delivery runs on its own task under a
/// per-sink timeout, so a slow or failing sink cannot stall recording.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn on_slow_operation(&self, sample: &PerformanceSample) -> Result<(), AlertError>;
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sink that writes a structured warning per slow operation.
#[derive(Debug, Clone, Default)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn on_slow_operation(&self, sample: &PerformanceSample) -> Result<(), AlertError> {
        tracing::warn!(
            duration_ms = sample.duration_ms,
            cache_hit = sample.cache_hit,
            cache_type = %sample.cache_type,
            at = %sample.timestamp,
            "slow export operation"
        );
        Ok(())
    }
}

/// Sink that discards alerts.
#[derive(Debug, Clone, Default)]
pub struct NoopAlertSink;

#[async_trait]
impl AlertSink for NoopAlertSink {
    async fn on_slow_operation(&self, _sample: &PerformanceSample) -> Result<(), AlertError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratex_core::CacheType;

    #[tokio::test]
    async fn test_builtin_sinks_accept_samples() {
        let sample = PerformanceSample::new(150.0, false, CacheType::None);
        assert!(LoggingAlertSink.on_slow_operation(&sample).await.is_ok());
        assert!(NoopAlertSink.on_slow_operation(&sample).await.is_ok());
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let a = SubscriptionId::new();
        let b = SubscriptionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }
}
