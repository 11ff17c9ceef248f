//! stratex Export - Cache-Aware Export Coordination
//!
//! The [`ExportCacheCoordinator`] sits in front of an export routine and
//! a schema validator. It caches validation verdicts by schema digest and
//! export artifacts by content digest, and reports one performance sample
//! per call to a [`PerformanceMonitor`](stratex_monitor::PerformanceMonitor).
//!
//! ```ignore
//! let coordinator = ExportCacheCoordinator::with_system_clock(
//!     ExportCacheConfig::from_env()?,
//!     Arc::new(MyValidator),
//!     Arc::new(MyExporter),
//! )?;
//!
//! let outcome = coordinator.export_with_cache(&input, &schema).await;
//! if outcome.cache_hit {
//!     // served from the result cache
//! }
//! ```

pub mod coordinator;
pub mod sweeper;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use coordinator::ExportCacheCoordinator;
pub use sweeper::{
    expiry_sweeper_task, spawn_expiry_sweeper, SweeperMetrics, SweeperSnapshot,
    DEFAULT_SWEEP_INTERVAL,
};
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};
pub use traits::{ArtifactExporter, SchemaValidator};
pub use types::{
    ExportArtifact, ExportCacheDiagnostics, ExportFailure, ExportInput, ExportOutcome,
    SchemaDescriptor, SchemaField, ValidationVerdict,
};
