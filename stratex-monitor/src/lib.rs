//! stratex Monitor - Export Performance Monitoring
//!
//! Records one [`PerformanceSample`](stratex_core::PerformanceSample) per
//! export operation into a bounded FIFO window and derives latency
//! percentiles, cache hit ratios and an efficiency score from it.
//!
//! Samples slower than the configured threshold are delivered to every
//! registered [`AlertSink`]. Delivery runs on separate tasks with a per-sink
//! timeout; a sink that fails, panics or hangs is logged and counted and has
//! no effect on other sinks or on the caller of
//! [`PerformanceMonitor::record`].

pub mod alert;
pub mod metrics;
pub mod monitor;
pub mod summary;

pub use alert::{AlertSink, LoggingAlertSink, NoopAlertSink, SubscriptionId};
pub use metrics::{ExportMetrics, MetricsAlertSink};
pub use monitor::PerformanceMonitor;
pub use summary::{efficiency_score, nearest_rank, PerformanceSummary};
