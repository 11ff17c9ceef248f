//! Prometheus metrics for export operations.
//!
//! Metrics live on a registry owned by [`ExportMetrics`] rather than the
//! process-global default registry, so independent instances can coexist.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use stratex_core::{AlertError, CacheType, MonitorError, PerformanceSample, StratexResult};

use crate::alert::AlertSink;

/// Export latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
const EXPORT_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Container for all export metrics.
#[derive(Clone)]
pub struct ExportMetrics {
    registry: Registry,

    /// Export operation counter - labels: outcome, cache_type
    pub exports_total: IntCounterVec,

    /// Export duration histogram - labels: cache_type
    pub export_duration_seconds: HistogramVec,

    /// Slow operation counter - labels: cache_type
    pub slow_operations_total: IntCounterVec,

    /// Current entry count - labels: cache
    pub cache_entries: IntGaugeVec,
}

fn registration_error(metric: &str, e: prometheus::Error) -> MonitorError {
    MonitorError::Metrics {
        reason: format!("Failed to register {}: {}", metric, e),
    }
}

impl ExportMetrics {
    /// Create and register all metrics on a fresh registry.
    pub fn new() -> StratexResult<Self> {
        let registry = Registry::new();

        let exports_total = IntCounterVec::new(
            Opts::new("stratex_exports_total", "Total number of export operations"),
            &["outcome", "cache_type"],
        )
        .map_err(|e| registration_error("exports_total", e))?;

        let export_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stratex_export_duration_seconds",
                "Export operation duration in seconds",
            )
            .buckets(EXPORT_LATENCY_BUCKETS.to_vec()),
            &["cache_type"],
        )
        .map_err(|e| registration_error("export_duration_seconds", e))?;

        let slow_operations_total = IntCounterVec::new(
            Opts::new(
                "stratex_slow_operations_total",
                "Operations slower than the alert threshold",
            ),
            &["cache_type"],
        )
        .map_err(|e| registration_error("slow_operations_total", e))?;

        let cache_entries = IntGaugeVec::new(
            Opts::new("stratex_cache_entries", "Entries currently held per cache"),
            &["cache"],
        )
        .map_err(|e| registration_error("cache_entries", e))?;

        registry
            .register(Box::new(exports_total.clone()))
            .map_err(|e| registration_error("exports_total", e))?;
        registry
            .register(Box::new(export_duration_seconds.clone()))
            .map_err(|e| registration_error("export_duration_seconds", e))?;
        registry
            .register(Box::new(slow_operations_total.clone()))
            .map_err(|e| registration_error("slow_operations_total", e))?;
        registry
            .register(Box::new(cache_entries.clone()))
            .map_err(|e| registration_error("cache_entries", e))?;

        Ok(Self {
            registry,
            exports_total,
            export_duration_seconds,
            slow_operations_total,
            cache_entries,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one finished export.
    pub fn record_export(&self, outcome: &str, cache_type: CacheType, duration: Duration) {
        self.exports_total
            .with_label_values(&[outcome, cache_type.as_str()])
            .inc();
        self.export_duration_seconds
            .with_label_values(&[cache_type.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Record one operation slower than the alert threshold.
    pub fn record_slow_operation(&self, sample: &PerformanceSample) {
        self.slow_operations_total
            .with_label_values(&[sample.cache_type.as_str()])
            .inc();
    }

    /// Set the entry gauge for a cache.
    pub fn set_cache_entries(&self, cache: &str, entries: usize) {
        self.cache_entries
            .with_label_values(&[cache])
            .set(i64::try_from(entries).unwrap_or(i64::MAX));
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode_text(&self) -> StratexResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MonitorError::Metrics {
                reason: format!("Failed to encode metrics: {}", e),
            })?;
        String::from_utf8(buffer).map_err(|e| {
            MonitorError::Metrics {
                reason: format!("Metrics output is not UTF-8: {}", e),
            }
            .into()
        })
    }
}

/// Alert sink that counts slow operations in [`ExportMetrics`].
#[derive(Clone)]
pub struct MetricsAlertSink {
    metrics: Arc<ExportMetrics>,
}

impl MetricsAlertSink {
    pub fn new(metrics: Arc<ExportMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl AlertSink for MetricsAlertSink {
    async fn on_slow_operation(&self, sample: &PerformanceSample) -> Result<(), AlertError> {
        self.metrics.record_slow_operation(sample);
        Ok(())
    }
}
