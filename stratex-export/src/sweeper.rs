//! Expiry Sweeper Background Task
//!
//! Expired cache entries are normally dropped by the read that finds them.
//! Entries that are never read again stay resident until capacity eviction
//! or a clear reclaims them. The sweeper bounds that memory by periodically
//! purging expired entries from both coordinator caches.
//!
//! The task is optional. Lookups never return expired values whether or not
//! it runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::coordinator::ExportCacheCoordinator;

/// Period used when the caller passes a zero interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Counters for sweeper activity since the task started.
#[derive(Debug, Default)]
pub struct SweeperMetrics {
    /// Completed sweep cycles
    pub sweeps: AtomicU64,

    /// Expired entries removed across both caches
    pub entries_purged: AtomicU64,

    /// Sweep cycles that failed
    pub sweep_errors: AtomicU64,
}

impl SweeperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweeperSnapshot {
        SweeperSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            entries_purged: self.entries_purged.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SweeperMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperSnapshot {
    pub sweeps: u64,
    pub entries_purged: u64,
    pub sweep_errors: u64,
}

/// Spawn [`expiry_sweeper_task`] on the current runtime.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = spawn_expiry_sweeper(coordinator, Duration::from_secs(60), shutdown_rx);
///
/// // Later
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub fn spawn_expiry_sweeper(
    coordinator: Arc<ExportCacheCoordinator>,
    every: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<Arc<SweeperMetrics>> {
    tokio::spawn(expiry_sweeper_task(coordinator, every, shutdown_rx))
}

/// Purge expired entries every `every` until `true` is sent on the shutdown
/// channel or its sender is dropped. A zero `every` runs at
/// [`DEFAULT_SWEEP_INTERVAL`].
pub async fn expiry_sweeper_task(
    coordinator: Arc<ExportCacheCoordinator>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweeperMetrics> {
    let metrics = Arc::new(SweeperMetrics::new());

    let every = if every.is_zero() {
        tracing::warn!(
            fallback_ms = DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            "Zero sweep interval requested"
        );
        DEFAULT_SWEEP_INTERVAL
    } else {
        every
    };
    let mut sweep_interval = interval(every);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_ms = every.as_millis() as u64, "Expiry sweeper started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Expiry sweeper shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep(&coordinator, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        entries_purged = snapshot.entries_purged,
        sweep_errors = snapshot.sweep_errors,
        "Expiry sweeper completed"
    );

    metrics
}

fn sweep(coordinator: &ExportCacheCoordinator, metrics: &SweeperMetrics) {
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);
    match coordinator.purge_expired() {
        Ok(0) => tracing::trace!("Expiry sweep found nothing to purge"),
        Ok(purged) => {
            metrics
                .entries_purged
                .fetch_add(purged as u64, Ordering::Relaxed);
            tracing::debug!(purged, "Expiry sweep purged entries");
        }
        Err(e) => {
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Expiry sweep failed");
        }
    }
}
