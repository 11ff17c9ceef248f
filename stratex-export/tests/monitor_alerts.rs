//! Alert fan-out through the public monitor API.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use stratex_monitor::{ExportMetrics, MetricsAlertSink};
use stratex_test_utils::generators::arb_sample;
use stratex_test_utils::{
    CacheType, FailingAlertSink, MonitorSettings, PerformanceMonitor, PerformanceSample,
    RecordingAlertSink, SlowAlertSink,
};

fn monitor(threshold_ms: f64, alert_timeout_ms: u64) -> PerformanceMonitor {
    PerformanceMonitor::new(&MonitorSettings {
        alert_threshold_ms: threshold_ms,
        sample_window_size: 50,
        alert_timeout_ms,
    })
    .unwrap()
}

#[tokio::test]
async fn test_each_subscriber_receives_slow_sample_once() {
    let monitor = monitor(100.0, 250);
    let sinks: Vec<_> = (0..3).map(|_| Arc::new(RecordingAlertSink::new())).collect();
    for sink in &sinks {
        monitor.subscribe(sink.clone()).unwrap();
    }

    let sample = PerformanceSample::new(150.0, false, CacheType::None);
    monitor.record(sample.clone()).await.unwrap();

    for sink in &sinks {
        assert_eq!(sink.samples(), vec![sample.clone()]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_misbehaving_sinks_do_not_block_healthy_ones() {
    let monitor = monitor(100.0, 20);
    let failing = Arc::new(FailingAlertSink::new());
    let slow = Arc::new(SlowAlertSink::new(Duration::from_secs(10)));
    let recording = Arc::new(RecordingAlertSink::new());
    monitor.subscribe(failing.clone()).unwrap();
    monitor.subscribe(slow.clone()).unwrap();
    monitor.subscribe(recording.clone()).unwrap();

    let started = tokio::time::Instant::now();
    monitor
        .record(PerformanceSample::new(400.0, false, CacheType::None))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(failing.calls(), 1);
    assert_eq!(slow.completed(), 0);
    assert_eq!(recording.count(), 1);
    assert_eq!(monitor.summary().unwrap().failed_alert_deliveries, 2);
}

#[tokio::test]
async fn test_metrics_sink_counts_by_cache_type() {
    let monitor = monitor(10.0, 250);
    let metrics = Arc::new(ExportMetrics::new().unwrap());
    monitor
        .subscribe(Arc::new(MetricsAlertSink::new(Arc::clone(&metrics))))
        .unwrap();

    monitor
        .record(PerformanceSample::new(20.0, true, CacheType::Export))
        .await
        .unwrap();
    monitor
        .record(PerformanceSample::new(30.0, false, CacheType::None))
        .await
        .unwrap();
    monitor
        .record(PerformanceSample::new(5.0, false, CacheType::None))
        .await
        .unwrap();

    let slow = |cache_type: &str| {
        metrics
            .slow_operations_total
            .with_label_values(&[cache_type])
            .get()
    };
    assert_eq!(slow("export"), 1);
    assert_eq!(slow("none"), 1);
    assert!(metrics
        .encode_text()
        .unwrap()
        .contains("stratex_slow_operations_total"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn summary_reflects_most_recent_window(samples in prop::collection::vec(arb_sample(), 0..60)) {
        const WINDOW: usize = 20;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let monitor = PerformanceMonitor::new(&MonitorSettings {
            alert_threshold_ms: 1_000.0,
            sample_window_size: WINDOW,
            alert_timeout_ms: 50,
        })
        .unwrap();

        runtime.block_on(async {
            for sample in &samples {
                monitor.record(sample.clone()).await.unwrap();
            }
        });
        let summary = monitor.summary().unwrap();

        let window = &samples[samples.len().saturating_sub(WINDOW)..];
        prop_assert_eq!(summary.total_operations, window.len());
        prop_assert_eq!(summary.lifetime_operations, samples.len() as u64);
        prop_assert_eq!(
            summary.recent_alert_count,
            window.iter().filter(|s| s.duration_ms > 1_000.0).count()
        );
        prop_assert!((0.0..=1.0).contains(&summary.cache_hit_ratio));
        prop_assert!((0.0..=1.0).contains(&summary.cache_efficiency_score));
        prop_assert_eq!(summary.combined_cache_hit_ratio, summary.cache_hit_ratio);
        if let Some(max) = window.iter().map(|s| s.duration_ms).reduce(f64::max) {
            let min = window.iter().map(|s| s.duration_ms).fold(f64::INFINITY, f64::min);
            prop_assert!(summary.p95_duration_ms >= min && summary.p95_duration_ms <= max);
            prop_assert_eq!(summary.max_duration_ms, max);
        } else {
            prop_assert_eq!(summary.p95_duration_ms, 0.0);
        }
    }
}
