//! Derived statistics over a window of performance samples.

use serde::{Deserialize, Serialize};
use stratex_core::{CacheType, PerformanceSample};

/// Weight of the hit ratio in the efficiency score.
const HIT_RATIO_WEIGHT: f64 = 0.6;
/// Weight of the latency reduction of hits over misses.
const LATENCY_GAIN_WEIGHT: f64 = 0.4;

/// Statistics over the monitor's current sample window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Samples in the window.
    pub total_operations: usize,
    pub average_duration_ms: f64,
    /// Nearest-rank 95th percentile, 0 for an empty window.
    pub p95_duration_ms: f64,
    pub max_duration_ms: f64,
    /// Fraction of samples with `cache_hit = true`.
    pub cache_hit_ratio: f64,
    /// Hits from every tracked cache type over all samples.
    pub combined_cache_hit_ratio: f64,
    /// Share of samples served by the schema cache.
    pub schema_hit_ratio: f64,
    /// Share of samples served by the export cache.
    pub export_hit_ratio: f64,
    /// Blend of hit ratio and hit latency gain, in `[0, 1]`.
    pub cache_efficiency_score: f64,
    /// Samples in the window slower than the alert threshold.
    pub recent_alert_count: usize,
    /// Samples recorded since construction.
    pub lifetime_operations: u64,
    /// Slow samples recorded since construction.
    pub lifetime_alerts: u64,
    /// Alert deliveries that failed, panicked or timed out.
    pub failed_alert_deliveries: u64,
}

impl PerformanceSummary {
    /// Compute window statistics. Lifetime counters are left at zero for the
    /// caller to fill in.
    pub fn from_window(samples: &[PerformanceSample], alert_threshold_ms: f64) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len();
        let total = n as f64;
        let mut durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
        durations.sort_by(f64::total_cmp);

        let sum: f64 = durations.iter().sum();
        let hits = samples.iter().filter(|s| s.cache_hit).count();
        let hits_of = |cache_type: CacheType| {
            samples
                .iter()
                .filter(|s| s.cache_hit && s.cache_type == cache_type)
                .count()
        };
        let schema_hits = hits_of(CacheType::Schema);
        let export_hits = hits_of(CacheType::Export);

        let cache_hit_ratio = hits as f64 / total;

        Self {
            total_operations: n,
            average_duration_ms: sum / total,
            p95_duration_ms: nearest_rank(&durations, 0.95),
            max_duration_ms: durations[n - 1],
            cache_hit_ratio,
            combined_cache_hit_ratio: (schema_hits + export_hits) as f64 / total,
            schema_hit_ratio: schema_hits as f64 / total,
            export_hit_ratio: export_hits as f64 / total,
            cache_efficiency_score: efficiency_score(cache_hit_ratio, samples),
            recent_alert_count: samples
                .iter()
                .filter(|s| s.duration_ms > alert_threshold_ms)
                .count(),
            ..Self::default()
        }
    }
}

/// Nearest-rank percentile over ascending `sorted` values.
///
/// rank = ceil(p * n), 1-indexed. Returns 0 for an empty slice.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = (p * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

/// `0.6 * hit_ratio + 0.4 * latency_gain`.
///
/// `latency_gain` is the relative reduction of mean hit latency against
/// mean miss latency, clamped to `[0, 1]`. With hits but no misses it is 1;
/// with no hits it is 0. The score rises with the hit ratio and falls with
/// hit latency.
pub fn efficiency_score(hit_ratio: f64, samples: &[PerformanceSample]) -> f64 {
    let mean = |hit: bool| {
        let (sum, count) = samples
            .iter()
            .filter(|s| s.cache_hit == hit)
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.duration_ms, count + 1));
        (count > 0).then(|| sum / count as f64)
    };

    let latency_gain = match (mean(true), mean(false)) {
        (Some(hit), Some(miss)) if miss > 0.0 => ((miss - hit) / miss).clamp(0.0, 1.0),
        (Some(_), None) => 1.0,
        _ => 0.0,
    };

    (HIT_RATIO_WEIGHT * hit_ratio + LATENCY_GAIN_WEIGHT * latency_gain).clamp(0.0, 1.0)
}
