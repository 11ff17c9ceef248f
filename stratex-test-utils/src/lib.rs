//! stratex Test Utilities
//!
//! Shared test infrastructure for the stratex workspace:
//! - Mock schema validator and export routine with call counters
//! - Recording, failing and slow alert sinks
//! - Proptest generators for samples, schemas and export inputs
//! - Fixtures and assertions for coordinator tests

pub use stratex_core::{
    CacheSettings, CacheType, Clock, Digest, ExportCacheConfig, ExportError, ManualClock,
    MonitorSettings, PerformanceSample, StratexError, StratexResult, SystemClock,
};
pub use stratex_export::{
    ArtifactExporter, ExportArtifact, ExportCacheCoordinator, ExportFailure, ExportInput,
    ExportOutcome, SchemaDescriptor, SchemaField, SchemaValidator, ValidationVerdict,
};
pub use stratex_monitor::{AlertSink, PerformanceMonitor};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use stratex_core::AlertError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

/// Schema validator returning a fixed verdict and counting calls.
#[derive(Debug)]
pub struct MockValidator {
    verdict: ValidationVerdict,
    calls: AtomicUsize,
}

impl MockValidator {
    pub fn accepting() -> Self {
        Self {
            verdict: ValidationVerdict::accepted(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(reasons: &[&str]) -> Self {
        Self {
            verdict: ValidationVerdict::rejected(reasons.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaValidator for MockValidator {
    async fn validate(&self, _schema: &SchemaDescriptor) -> ValidationVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

/// Export routine that echoes its payload.
///
/// Can be told to fail or to take a fixed amount of (tokio) time.
#[derive(Debug, Default)]
pub struct MockExporter {
    calls: AtomicUsize,
    delay: Option<Duration>,
    failure: Mutex<Option<ExportError>>,
}

impl MockExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before producing the artifact.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail every call with `error` until [`succeed`](Self::succeed).
    pub fn failing(error: ExportError) -> Self {
        let exporter = Self::default();
        exporter.fail_with(error);
        exporter
    }

    pub fn fail_with(&self, error: ExportError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactExporter for MockExporter {
    async fn export_artifact(
        &self,
        input: &ExportInput,
        schema: &SchemaDescriptor,
    ) -> Result<ExportArtifact, ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        Ok(ExportArtifact {
            file_name: format!("{}-{}.csv", schema.name, schema.version),
            content_type: "text/csv".to_string(),
            data: input.payload.clone(),
            row_count: input.payload.iter().filter(|b| **b == b'\n').count() as u64,
            created_at: Utc::now(),
        })
    }
}

// ============================================================================
// ALERT SINKS
// ============================================================================

/// Sink that keeps every sample it receives.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    samples: Mutex<Vec<PerformanceSample>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<PerformanceSample> {
        lock(&self.samples).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.samples).len()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn on_slow_operation(&self, sample: &PerformanceSample) -> Result<(), AlertError> {
        lock(&self.samples).push(sample.clone());
        Ok(())
    }
}

/// Sink that always fails.
#[derive(Debug, Default)]
pub struct FailingAlertSink {
    calls: AtomicUsize,
}

impl FailingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertSink for FailingAlertSink {
    async fn on_slow_operation(&self, _sample: &PerformanceSample) -> Result<(), AlertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AlertError::Delivery {
            sink: "failing".to_string(),
            reason: "delivery refused".to_string(),
        })
    }
}

/// Sink that sleeps before acknowledging.
#[derive(Debug)]
pub struct SlowAlertSink {
    delay: Duration,
    completed: AtomicUsize,
}

impl SlowAlertSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            completed: AtomicUsize::new(0),
        }
    }

    /// Deliveries that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertSink for SlowAlertSink {
    async fn on_slow_operation(&self, _sample: &PerformanceSample) -> Result<(), AlertError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for stratex types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_cache_type() -> impl Strategy<Value = CacheType> {
        prop_oneof![
            Just(CacheType::Schema),
            Just(CacheType::Export),
            Just(CacheType::None),
        ]
    }

    /// Samples that pass validation: hits always name a cache.
    pub fn arb_sample() -> impl Strategy<Value = PerformanceSample> {
        (0.0f64..5_000.0, arb_cache_type()).prop_map(|(duration_ms, cache_type)| {
            PerformanceSample::new(duration_ms, cache_type != CacheType::None, cache_type)
        })
    }

    pub fn arb_schema_field() -> impl Strategy<Value = SchemaField> {
        (
            "[a-z_]{1,12}",
            prop_oneof![Just("decimal"), Just("datetime"), Just("string"), Just("int")],
            any::<bool>(),
        )
            .prop_map(|(name, data_type, required)| SchemaField::new(name, data_type, required))
    }

    pub fn arb_schema_descriptor() -> impl Strategy<Value = SchemaDescriptor> {
        (
            "[a-z]{1,10}",
            "v[0-9]{1,2}",
            prop::collection::vec(arb_schema_field(), 0..6),
        )
            .prop_map(|(name, version, fields)| SchemaDescriptor {
                name,
                version,
                fields,
            })
    }

    pub fn arb_export_input() -> impl Strategy<Value = ExportInput> {
        (
            prop::collection::vec(any::<u8>(), 0..256),
            prop_oneof![Just("csv"), Just("tsv"), Just("json")],
            any::<bool>(),
        )
            .prop_map(|(payload, format, header)| {
                ExportInput::new(
                    payload,
                    serde_json::json!({ "format": format, "include_header": header }),
                )
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs and coordinators.

    use super::*;
    use std::sync::Arc;

    pub fn trades_schema() -> SchemaDescriptor {
        SchemaDescriptor::new("trades", "v1")
            .with_field(SchemaField::new("timestamp", "datetime", true))
            .with_field(SchemaField::new("symbol", "string", true))
            .with_field(SchemaField::new("pnl", "decimal", false))
    }

    pub fn trades_input(rows: &str) -> ExportInput {
        ExportInput::new(
            rows.as_bytes().to_vec(),
            serde_json::json!({ "format": "csv", "delimiter": "," }),
        )
    }

    /// Small caches, a 100 ms alert threshold and a short alert timeout.
    pub fn test_config() -> ExportCacheConfig {
        ExportCacheConfig {
            schema_cache: CacheSettings::new(60, 8),
            export_cache: CacheSettings::new(30, 8),
            monitor: MonitorSettings {
                alert_threshold_ms: 100.0,
                sample_window_size: 100,
                alert_timeout_ms: 50,
            },
            export_timeout_ms: None,
            sweep_interval_secs: None,
        }
    }

    pub fn coordinator(
        config: ExportCacheConfig,
        validator: Arc<MockValidator>,
        exporter: Arc<MockExporter>,
        clock: Arc<dyn Clock>,
    ) -> ExportCacheCoordinator {
        match ExportCacheCoordinator::new(config, validator, exporter, clock) {
            Ok(coordinator) => coordinator,
            Err(e) => panic!("fixture config must be valid: {}", e),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over export outcomes and results.

    use super::*;

    /// Assert that the outcome was served from the result cache.
    #[track_caller]
    pub fn assert_export_hit(outcome: &ExportOutcome) {
        assert!(outcome.is_success(), "Expected success, got {:?}", outcome.result);
        assert!(outcome.cache_hit, "Expected cache hit");
        assert_eq!(outcome.cache_type, CacheType::Export);
    }

    /// Assert that the outcome succeeded without a cache hit.
    #[track_caller]
    pub fn assert_export_miss(outcome: &ExportOutcome) {
        assert!(outcome.is_success(), "Expected success, got {:?}", outcome.result);
        assert!(!outcome.cache_hit, "Expected cache miss");
        assert_eq!(outcome.cache_type, CacheType::None);
    }

    /// Assert that a result is a configuration error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &StratexResult<T>) {
        match result {
            Err(StratexError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_exporter_failure_toggle() {
        let exporter = MockExporter::failing(ExportError::Cancelled);
        let schema = fixtures::trades_schema();
        let input = fixtures::trades_input("a\nb\n");

        assert!(exporter.export_artifact(&input, &schema).await.is_err());
        exporter.succeed();
        let artifact = exporter.export_artifact(&input, &schema).await.unwrap();
        assert_eq!(artifact.row_count, 2);
        assert_eq!(exporter.calls(), 2);
    }

    #[tokio::test]
    async fn test_recording_sink_keeps_samples() {
        let sink = RecordingAlertSink::new();
        let sample = PerformanceSample::new(150.0, false, CacheType::None);
        sink.on_slow_operation(&sample).await.unwrap();
        assert_eq!(sink.samples(), vec![sample]);
    }

    #[test]
    fn test_fixture_config_is_valid() {
        assert!(fixtures::test_config().validate().is_ok());
    }
}
