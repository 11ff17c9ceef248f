//! Rolling-window performance monitor with slow-operation alerts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures_util::future::join_all;
use stratex_core::{MonitorError, MonitorSettings, PerformanceSample, StratexResult};

use crate::alert::{AlertSink, SubscriptionId};
use crate::summary::PerformanceSummary;

type Subscribers = Vec<(SubscriptionId, Arc<dyn AlertSink>)>;

#[derive(Debug, Default)]
struct MonitorState {
    samples: VecDeque<PerformanceSample>,
    lifetime_operations: u64,
    lifetime_alerts: u64,
}

/// Records operation samples and derives statistics over the most recent
/// `sample_window_size` of them.
///
/// Constructed explicitly and passed to whoever reports samples; there is no
/// process-global instance.
pub struct PerformanceMonitor {
    settings: MonitorSettings,
    state: Mutex<MonitorState>,
    subscribers: RwLock<Subscribers>,
    failed_alert_deliveries: AtomicU64,
}

impl PerformanceMonitor {
    /// Create a monitor. Fails if the settings do not validate.
    pub fn new(settings: &MonitorSettings) -> StratexResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings: settings.clone(),
            state: Mutex::new(MonitorState::default()),
            subscribers: RwLock::new(Vec::new()),
            failed_alert_deliveries: AtomicU64::new(0),
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn threshold_ms(&self) -> f64 {
        self.settings.alert_threshold_ms
    }

    /// Record one operation.
    ///
    /// The sample is appended before any subscriber runs. When it is slower
    /// than the alert threshold every subscriber is notified on its own task;
    /// this call waits at most `alert_timeout` for them. Delivery failures are
    /// logged and counted, never returned.
    pub async fn record(&self, sample: PerformanceSample) -> StratexResult<()> {
        sample.validate()?;

        let slow = sample.duration_ms > self.settings.alert_threshold_ms;
        {
            let mut state = self.state.lock().map_err(|_| MonitorError::LockPoisoned)?;
            if state.samples.len() == self.settings.sample_window_size {
                state.samples.pop_front();
            }
            state.samples.push_back(sample.clone());
            state.lifetime_operations += 1;
            if slow {
                state.lifetime_alerts += 1;
            }
        }

        if !slow {
            return Ok(());
        }

        tracing::warn!(
            duration_ms = sample.duration_ms,
            threshold_ms = self.settings.alert_threshold_ms,
            cache_type = %sample.cache_type,
            "slow operation"
        );

        let sinks: Subscribers = self
            .subscribers
            .read()
            .map_err(|_| MonitorError::LockPoisoned)?
            .clone();
        if !sinks.is_empty() {
            self.dispatch(Arc::new(sample), sinks).await;
        }
        Ok(())
    }

    async fn dispatch(&self, sample: Arc<PerformanceSample>, sinks: Subscribers) {
        let timeout = self.settings.alert_timeout();
        let handles = sinks.into_iter().map(|(id, sink)| {
            let sample = Arc::clone(&sample);
            let handle = tokio::spawn(async move {
                tokio::time::timeout(timeout, sink.on_slow_operation(&sample)).await
            });
            (id, handle)
        });
        let (ids, handles): (Vec<_>, Vec<_>) = handles.unzip();

        for (id, result) in ids.into_iter().zip(join_all(handles).await) {
            let failure = match result {
                Ok(Ok(Ok(()))) => continue,
                Ok(Ok(Err(e))) => e.to_string(),
                Ok(Err(_)) => format!("timed out after {}ms", timeout.as_millis()),
                Err(e) if e.is_panic() => "subscriber panicked".to_string(),
                Err(e) => e.to_string(),
            };
            self.failed_alert_deliveries.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(subscription = %id, error = %failure, "alert delivery failed");
        }
    }

    /// Register an alert sink.
    pub fn subscribe(&self, sink: Arc<dyn AlertSink>) -> StratexResult<SubscriptionId> {
        let id = SubscriptionId::new();
        self.subscribers
            .write()
            .map_err(|_| MonitorError::LockPoisoned)?
            .push((id, sink));
        tracing::debug!(subscription = %id, "alert sink subscribed");
        Ok(id)
    }

    /// Remove an alert sink. Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> StratexResult<bool> {
        let mut subscribers = self
            .subscribers
            .write()
            .map_err(|_| MonitorError::LockPoisoned)?;
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        Ok(subscribers.len() != before)
    }

    pub fn subscriber_count(&self) -> StratexResult<usize> {
        Ok(self
            .subscribers
            .read()
            .map_err(|_| MonitorError::LockPoisoned)?
            .len())
    }

    /// Statistics over the current window plus lifetime counters.
    pub fn summary(&self) -> StratexResult<PerformanceSummary> {
        let (window, lifetime_operations, lifetime_alerts) = {
            let state = self.state.lock().map_err(|_| MonitorError::LockPoisoned)?;
            let window: Vec<PerformanceSample> = state.samples.iter().cloned().collect();
            (window, state.lifetime_operations, state.lifetime_alerts)
        };

        Ok(PerformanceSummary {
            lifetime_operations,
            lifetime_alerts,
            failed_alert_deliveries: self.failed_alert_deliveries.load(Ordering::Relaxed),
            ..PerformanceSummary::from_window(&window, self.settings.alert_threshold_ms)
        })
    }

    /// Drop every sample from the window. Lifetime counters are kept.
    pub fn reset(&self) -> StratexResult<()> {
        self.state
            .lock()
            .map_err(|_| MonitorError::LockPoisoned)?
            .samples
            .clear();
        Ok(())
    }

    pub fn window_len(&self) -> StratexResult<usize> {
        Ok(self
            .state
            .lock()
            .map_err(|_| MonitorError::LockPoisoned)?
            .samples
            .len())
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("settings", &self.settings)
            .field(
                "failed_alert_deliveries",
                &self.failed_alert_deliveries.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use stratex_core::{AlertError, CacheType, StratexError};

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<PerformanceSample>>,
    }

    #[async_trait]
    impl AlertSink for Recording {
        async fn on_slow_operation(&self, sample: &PerformanceSample) -> Result<(), AlertError> {
            self.seen.lock().unwrap().push(sample.clone());
            Ok(())
        }
    }

    struct Failing(AtomicUsize);

    #[async_trait]
    impl AlertSink for Failing {
        async fn on_slow_operation(&self, _sample: &PerformanceSample) -> Result<(), AlertError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AlertError::Delivery {
                sink: "failing".to_string(),
                reason: "unreachable".to_string(),
            })
        }
    }

    struct Sleeping(Duration);

    #[async_trait]
    impl AlertSink for Sleeping {
        async fn on_slow_operation(&self, _sample: &PerformanceSample) -> Result<(), AlertError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait]
    impl AlertSink for Panicking {
        async fn on_slow_operation(&self, _sample: &PerformanceSample) -> Result<(), AlertError> {
            panic!("sink exploded");
        }
    }

    fn settings(threshold: f64, window: usize) -> MonitorSettings {
        MonitorSettings {
            alert_threshold_ms: threshold,
            sample_window_size: window,
            ..MonitorSettings::default()
        }
    }

    fn miss(ms: f64) -> PerformanceSample {
        PerformanceSample::new(ms, false, CacheType::None)
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let result = PerformanceMonitor::new(&settings(0.0, 10));
        assert!(matches!(result, Err(StratexError::Config(_))));
        let result = PerformanceMonitor::new(&settings(100.0, 0));
        assert!(matches!(result, Err(StratexError::Config(_))));
    }

    #[tokio::test]
    async fn test_huge_window_allocates_on_demand() {
        let monitor = PerformanceMonitor::new(&settings(100.0, usize::MAX / 2)).unwrap();
        monitor.record(miss(10.0)).await.unwrap();
        assert_eq!(monitor.window_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_slow_sample_notifies_every_subscriber_once() {
        let monitor = PerformanceMonitor::new(&settings(100.0, 10)).unwrap();
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        monitor.subscribe(first.clone()).unwrap();
        monitor.subscribe(second.clone()).unwrap();

        monitor.record(miss(150.0)).await.unwrap();

        for sink in [&first, &second] {
            let seen = sink.seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].duration_ms, 150.0);
        }
    }

    #[tokio::test]
    async fn test_fast_sample_does_not_alert() {
        let monitor = PerformanceMonitor::new(&settings(100.0, 10)).unwrap();
        let sink = Arc::new(Recording::default());
        monitor.subscribe(sink.clone()).unwrap();

        monitor.record(miss(100.0)).await.unwrap();

        assert!(sink.seen.lock().unwrap().is_empty());
        assert_eq!(monitor.summary().unwrap().recent_alert_count, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let monitor = PerformanceMonitor::new(&settings(10.0, 10)).unwrap();
        let sink = Arc::new(Recording::default());
        let id = monitor.subscribe(sink.clone()).unwrap();

        assert!(monitor.unsubscribe(id).unwrap());
        assert!(!monitor.unsubscribe(id).unwrap());
        assert_eq!(monitor.subscriber_count().unwrap(), 0);

        monitor.record(miss(50.0)).await.unwrap();
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_sink_is_isolated() {
        let monitor = PerformanceMonitor::new(&settings(10.0, 10)).unwrap();
        let failing = Arc::new(Failing(AtomicUsize::new(0)));
        let recording = Arc::new(Recording::default());
        monitor.subscribe(failing.clone()).unwrap();
        monitor.subscribe(recording.clone()).unwrap();

        monitor.record(miss(50.0)).await.unwrap();

        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
        assert_eq!(recording.seen.lock().unwrap().len(), 1);
        assert_eq!(monitor.summary().unwrap().failed_alert_deliveries, 1);
    }

    #[tokio::test]
    async fn test_panicking_sink_is_isolated() {
        let monitor = PerformanceMonitor::new(&settings(10.0, 10)).unwrap();
        let recording = Arc::new(Recording::default());
        monitor.subscribe(Arc::new(Panicking)).unwrap();
        monitor.subscribe(recording.clone()).unwrap();

        monitor.record(miss(50.0)).await.unwrap();

        assert_eq!(recording.seen.lock().unwrap().len(), 1);
        assert_eq!(monitor.summary().unwrap().failed_alert_deliveries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_times_out() {
        let monitor = PerformanceMonitor::new(&MonitorSettings {
            alert_threshold_ms: 10.0,
            sample_window_size: 10,
            alert_timeout_ms: 50,
        })
        .unwrap();
        monitor
            .subscribe(Arc::new(Sleeping(Duration::from_secs(60))))
            .unwrap();

        let started = tokio::time::Instant::now();
        monitor.record(miss(50.0)).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        let summary = monitor.summary().unwrap();
        assert_eq!(summary.failed_alert_deliveries, 1);
        assert_eq!(summary.total_operations, 1);
    }

    #[tokio::test]
    async fn test_invalid_sample_leaves_state_unchanged() {
        let monitor = PerformanceMonitor::new(&settings(100.0, 10)).unwrap();
        monitor.record(miss(5.0)).await.unwrap();
        let before = monitor.summary().unwrap();

        let negative = monitor.record(miss(-1.0)).await;
        assert!(matches!(
            negative,
            Err(StratexError::Monitor(MonitorError::InvalidSample { .. }))
        ));
        let untyped_hit = monitor
            .record(PerformanceSample::new(1.0, true, CacheType::None))
            .await;
        assert!(untyped_hit.is_err());
        let nan = monitor.record(miss(f64::NAN)).await;
        assert!(nan.is_err());

        assert_eq!(monitor.summary().unwrap(), before);
    }

    #[tokio::test]
    async fn test_window_drops_oldest_samples() {
        let monitor = PerformanceMonitor::new(&settings(1000.0, 3)).unwrap();
        for ms in [100.0, 1.0, 2.0, 3.0] {
            monitor.record(miss(ms)).await.unwrap();
        }

        let summary = monitor.summary().unwrap();
        assert_eq!(summary.total_operations, 3);
        assert_eq!(summary.max_duration_ms, 3.0);
        assert_eq!(summary.lifetime_operations, 4);
    }

    #[tokio::test]
    async fn test_summary_counts_alerts_and_ratios() {
        let monitor = PerformanceMonitor::new(&settings(100.0, 10)).unwrap();
        monitor
            .record(PerformanceSample::hit(Duration::from_millis(2), CacheType::Export))
            .await
            .unwrap();
        monitor
            .record(PerformanceSample::hit(Duration::from_millis(1), CacheType::Schema))
            .await
            .unwrap();
        monitor.record(miss(150.0)).await.unwrap();
        monitor.record(miss(80.0)).await.unwrap();

        let summary = monitor.summary().unwrap();
        assert_eq!(summary.total_operations, 4);
        assert!((summary.cache_hit_ratio - 0.5).abs() < 1e-9);
        assert!((summary.combined_cache_hit_ratio - 0.5).abs() < 1e-9);
        assert_eq!(summary.recent_alert_count, 1);
        assert_eq!(summary.lifetime_alerts, 1);
        assert!(summary.cache_efficiency_score > 0.3);
    }

    #[tokio::test]
    async fn test_reset_keeps_lifetime_counters() {
        let monitor = PerformanceMonitor::new(&settings(10.0, 10)).unwrap();
        monitor.record(miss(20.0)).await.unwrap();
        monitor.record(miss(5.0)).await.unwrap();

        monitor.reset().unwrap();

        let summary = monitor.summary().unwrap();
        assert_eq!(summary.total_operations, 0);
        assert_eq!(summary.p95_duration_ms, 0.0);
        assert_eq!(summary.lifetime_operations, 2);
        assert_eq!(summary.lifetime_alerts, 1);
        assert_eq!(monitor.window_len().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_all_counted() {
        let monitor = Arc::new(PerformanceMonitor::new(&settings(1000.0, 10_000)).unwrap());
        let tasks: Vec<_> = (0..8)
            .map(|t| {
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    for i in 0..100 {
                        monitor.record(miss(f64::from(t * 100 + i))).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let summary = monitor.summary().unwrap();
        assert_eq!(summary.total_operations, 800);
        assert_eq!(summary.lifetime_operations, 800);
    }
}
