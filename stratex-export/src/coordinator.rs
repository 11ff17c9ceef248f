//! Cache-aware export coordination.
//!
//! Each call to [`ExportCacheCoordinator::export_with_cache`]:
//!
//! 1. Resolves the schema verdict from the schema cache, validating and
//!    caching on a miss.
//! 2. Short-circuits with [`ExportFailure::SchemaRejected`] when the verdict
//!    is negative. The result cache is not consulted.
//! 3. Looks up the artifact by content digest in the result cache.
//! 4. On a miss runs the exporter (under the optional timeout) and caches
//!    the artifact only if it succeeded.
//! 5. Reports exactly one sample to the performance monitor.
//!
//! No cache lock is held while the validator or exporter runs. Internal cache
//! and monitor errors are logged and degrade to a miss; they never turn an
//! export that succeeded into a failure.

use std::sync::Arc;
use std::time::Duration;

use stratex_cache::BoundedCache;
use stratex_core::{
    CacheType, Clock, Digest, ExportCacheConfig, ExportError, HealthCheck, PerformanceSample,
    StratexResult, SystemClock,
};
use stratex_monitor::{ExportMetrics, PerformanceMonitor};

use crate::traits::{ArtifactExporter, SchemaValidator};
use crate::types::{
    ExportArtifact, ExportCacheDiagnostics, ExportFailure, ExportInput, ExportOutcome,
    SchemaDescriptor, ValidationVerdict,
};

const SCHEMA_CACHE: &str = "schema";
const EXPORT_CACHE: &str = "export";
const HEALTH_COMPONENT: &str = "export_cache";

/// Metric outcome labels.
mod outcome {
    pub const HIT: &str = "hit";
    pub const MISS: &str = "miss";
    pub const REJECTED: &str = "rejected";
    pub const FAILED: &str = "failed";
}

struct SchemaResolution {
    digest: Digest,
    verdict: ValidationVerdict,
    cache_hit: bool,
}

/// Orchestrates the schema cache, the result cache, the export routine and
/// the performance monitor.
pub struct ExportCacheCoordinator {
    config: ExportCacheConfig,
    schema_cache: BoundedCache<ValidationVerdict>,
    export_cache: BoundedCache<Arc<ExportArtifact>>,
    monitor: Arc<PerformanceMonitor>,
    validator: Arc<dyn SchemaValidator>,
    exporter: Arc<dyn ArtifactExporter>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<ExportMetrics>>,
}

impl ExportCacheCoordinator {
    /// Build a coordinator with its own monitor. Fails if `config` does not
    /// validate.
    pub fn new(
        config: ExportCacheConfig,
        validator: Arc<dyn SchemaValidator>,
        exporter: Arc<dyn ArtifactExporter>,
        clock: Arc<dyn Clock>,
    ) -> StratexResult<Self> {
        let monitor = Arc::new(PerformanceMonitor::new(&config.monitor)?);
        Self::with_monitor(config, validator, exporter, clock, monitor)
    }

    /// Build a coordinator that reports into an existing monitor.
    pub fn with_monitor(
        config: ExportCacheConfig,
        validator: Arc<dyn SchemaValidator>,
        exporter: Arc<dyn ArtifactExporter>,
        clock: Arc<dyn Clock>,
        monitor: Arc<PerformanceMonitor>,
    ) -> StratexResult<Self> {
        config.validate()?;
        let schema_cache =
            BoundedCache::new(SCHEMA_CACHE, &config.schema_cache, Arc::clone(&clock))?;
        let export_cache =
            BoundedCache::new(EXPORT_CACHE, &config.export_cache, Arc::clone(&clock))?;
        Ok(Self {
            config,
            schema_cache,
            export_cache,
            monitor,
            validator,
            exporter,
            clock,
            metrics: None,
        })
    }

    /// Build a coordinator driven by the system clock.
    pub fn with_system_clock(
        config: ExportCacheConfig,
        validator: Arc<dyn SchemaValidator>,
        exporter: Arc<dyn ArtifactExporter>,
    ) -> StratexResult<Self> {
        Self::new(config, validator, exporter, Arc::new(SystemClock))
    }

    /// Record every outcome into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<ExportMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ExportCacheConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn metrics(&self) -> Option<&Arc<ExportMetrics>> {
        self.metrics.as_ref()
    }

    // ========================================================================
    // EXPORT PATH
    // ========================================================================

    /// Export `input` under `schema`, serving from cache where possible.
    ///
    /// Never fails at this boundary: schema rejections and export errors are
    /// returned inside the outcome.
    pub async fn export_with_cache(
        &self,
        input: &ExportInput,
        schema: &SchemaDescriptor,
    ) -> ExportOutcome {
        let started = self.clock.now();
        let resolution = self.resolve_schema(schema).await;

        if !resolution.verdict.valid {
            let elapsed = self.clock.elapsed_since(started);
            tracing::debug!(
                schema = %schema.name,
                digest = %resolution.digest,
                reasons = ?resolution.verdict.reasons,
                "schema rejected, export skipped"
            );
            self.report(PerformanceSample::miss(elapsed), outcome::REJECTED)
                .await;
            return ExportOutcome {
                result: Err(ExportFailure::SchemaRejected {
                    reasons: resolution.verdict.reasons,
                }),
                cache_hit: false,
                cache_type: CacheType::None,
                schema_cache_hit: resolution.cache_hit,
                schema_digest: resolution.digest,
                content_digest: None,
                elapsed,
            };
        }

        let content_digest = input.content_digest(&resolution.digest);
        let finish = |result, cache_hit, elapsed| ExportOutcome {
            result,
            cache_hit,
            cache_type: if cache_hit {
                CacheType::Export
            } else {
                CacheType::None
            },
            schema_cache_hit: resolution.cache_hit,
            schema_digest: resolution.digest,
            content_digest: Some(content_digest),
            elapsed,
        };

        if let Some(artifact) = self.lookup(&self.export_cache, &content_digest) {
            let elapsed = self.clock.elapsed_since(started);
            self.report(
                PerformanceSample::hit(elapsed, CacheType::Export),
                outcome::HIT,
            )
            .await;
            return finish(Ok(artifact), true, elapsed);
        }

        let result = self.run_export(input, schema).await;
        let elapsed = self.clock.elapsed_since(started);

        match result {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                if let Err(e) = self.export_cache.put(content_digest, Arc::clone(&artifact)) {
                    tracing::warn!(
                        digest = %content_digest,
                        error = %e,
                        "failed to cache export artifact"
                    );
                }
                self.report(PerformanceSample::miss(elapsed), outcome::MISS)
                    .await;
                finish(Ok(artifact), false, elapsed)
            }
            Err(e) => {
                tracing::warn!(
                    schema = %schema.name,
                    digest = %content_digest,
                    error = %e,
                    "export failed"
                );
                self.report(PerformanceSample::miss(elapsed), outcome::FAILED)
                    .await;
                finish(Err(ExportFailure::Export(e)), false, elapsed)
            }
        }
    }

    /// Validate `schema`, serving the verdict from the schema cache where
    /// possible. Reports one sample typed as a schema cache hit or a miss.
    pub async fn validate_schema(&self, schema: &SchemaDescriptor) -> ValidationVerdict {
        let started = self.clock.now();
        let resolution = self.resolve_schema(schema).await;
        let elapsed = self.clock.elapsed_since(started);

        let (sample, label) = if resolution.cache_hit {
            (PerformanceSample::hit(elapsed, CacheType::Schema), outcome::HIT)
        } else {
            (PerformanceSample::miss(elapsed), outcome::MISS)
        };
        self.report(sample, label).await;
        resolution.verdict
    }

    async fn resolve_schema(&self, schema: &SchemaDescriptor) -> SchemaResolution {
        let digest = schema.digest();
        if let Some(verdict) = self.lookup(&self.schema_cache, &digest) {
            return SchemaResolution {
                digest,
                verdict,
                cache_hit: true,
            };
        }

        let verdict = self.validator.validate(schema).await;
        if let Err(e) = self.schema_cache.put(digest, verdict.clone()) {
            tracing::warn!(digest = %digest, error = %e, "failed to cache schema verdict");
        }
        SchemaResolution {
            digest,
            verdict,
            cache_hit: false,
        }
    }

    fn lookup<V: Clone + Send>(&self, cache: &BoundedCache<V>, key: &Digest) -> Option<V> {
        match cache.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    cache = cache.name(),
                    error = %e,
                    "cache lookup failed, treating as miss"
                );
                None
            }
        }
    }

    async fn run_export(
        &self,
        input: &ExportInput,
        schema: &SchemaDescriptor,
    ) -> Result<ExportArtifact, ExportError> {
        let export = self.exporter.export_artifact(input, schema);
        match self.config.export_timeout_ms {
            Some(after_ms) => tokio::time::timeout(Duration::from_millis(after_ms), export)
                .await
                .unwrap_or(Err(ExportError::TimedOut { after_ms })),
            None => export.await,
        }
    }

    async fn report(&self, sample: PerformanceSample, label: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_export(
                label,
                sample.cache_type,
                Duration::try_from_secs_f64(sample.duration_ms / 1000.0).unwrap_or_default(),
            );
        }
        if let Err(e) = self.monitor.record(sample).await {
            tracing::warn!(error = %e, "failed to record performance sample");
        }
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Remove the entry keyed by `digest` from both caches.
    ///
    /// Returns `true` if either cache held it.
    pub fn invalidate_by_content(&self, digest: &Digest) -> StratexResult<bool> {
        let export = self.export_cache.invalidate(digest)?;
        let schema = self.schema_cache.invalidate(digest)?;
        Ok(export || schema)
    }

    /// Clear both caches. Returns the number of entries removed.
    pub fn invalidate_all(&self) -> StratexResult<usize> {
        let removed = self.schema_cache.clear()? + self.export_cache.clear()?;
        tracing::info!(removed, "export caches cleared");
        Ok(removed)
    }

    /// Drop expired entries from both caches. Returns the number removed.
    pub fn purge_expired(&self) -> StratexResult<usize> {
        Ok(self.schema_cache.purge_expired()? + self.export_cache.purge_expired()?)
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Statistics of both caches and the monitor.
    pub fn diagnostics(&self) -> StratexResult<ExportCacheDiagnostics> {
        let diagnostics = ExportCacheDiagnostics {
            schema_cache: self.schema_cache.stats()?,
            export_cache: self.export_cache.stats()?,
            performance: self.monitor.summary()?,
        };
        if let Some(metrics) = &self.metrics {
            metrics.set_cache_entries(SCHEMA_CACHE, diagnostics.schema_cache.size);
            metrics.set_cache_entries(EXPORT_CACHE, diagnostics.export_cache.size);
        }
        Ok(diagnostics)
    }

    /// Degraded when the window's p95 exceeds the alert threshold.
    pub fn health(&self) -> HealthCheck {
        let diagnostics = match self.diagnostics() {
            Ok(d) => d,
            Err(e) => return HealthCheck::unhealthy(HEALTH_COMPONENT, e.to_string()),
        };

        let p95 = diagnostics.performance.p95_duration_ms;
        let threshold = self.monitor.threshold_ms();
        let check = if p95 > threshold {
            HealthCheck::degraded(
                HEALTH_COMPONENT,
                format!("p95 latency {:.1}ms exceeds alert threshold {:.1}ms", p95, threshold),
            )
        } else {
            HealthCheck::healthy(HEALTH_COMPONENT)
        };

        check
            .with_metric("p95_duration_ms", p95)
            .with_metric("cache_hit_ratio", diagnostics.performance.cache_hit_ratio)
            .with_metric("schema_cache_size", diagnostics.schema_cache.size as f64)
            .with_metric("export_cache_size", diagnostics.export_cache.size as f64)
    }
}

impl std::fmt::Debug for ExportCacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCacheCoordinator")
            .field("schema_cache", &self.schema_cache)
            .field("export_cache", &self.export_cache)
            .field("monitor", &self.monitor)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
