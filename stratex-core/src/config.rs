//! Configuration types
//!
//! Defaults live here and in [`ExportCacheConfig::from_env`]. Once a config
//! reaches a constructor it is validated and rejected as a whole; no
//! component patches an invalid value back to a default.

use crate::{ConfigError, StratexResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted `ttl_minutes` (a little over 8000 years).
pub const MAX_TTL_MINUTES: u64 = u32::MAX as u64;

/// Settings for one bounded cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entry lifetime in minutes.
    pub ttl_minutes: u64,
    /// Hard capacity.
    pub max_entries: usize,
}

impl CacheSettings {
    pub fn new(ttl_minutes: u64, max_entries: usize) -> Self {
        Self {
            ttl_minutes,
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.saturating_mul(60))
    }

    /// Validate, prefixing field names with `scope` (e.g. `export_cache`).
    pub fn validate(&self, scope: &str) -> Result<(), ConfigError> {
        if self.ttl_minutes == 0 {
            return Err(ConfigError::invalid(
                format!("{scope}.ttl_minutes"),
                self.ttl_minutes,
                "must be greater than zero",
            ));
        }
        if self.ttl_minutes > MAX_TTL_MINUTES {
            return Err(ConfigError::invalid(
                format!("{scope}.ttl_minutes"),
                self.ttl_minutes,
                format!("must not exceed {MAX_TTL_MINUTES}"),
            ));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::invalid(
                format!("{scope}.max_entries"),
                self.max_entries,
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            max_entries: 256,
        }
    }
}

/// Settings for the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Operations slower than this fire alerts.
    pub alert_threshold_ms: f64,
    /// Number of most recent samples kept for statistics.
    pub sample_window_size: usize,
    /// Upper bound on how long `record` waits for a single alert sink.
    pub alert_timeout_ms: u64,
}

impl MonitorSettings {
    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alert_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alert_threshold_ms.is_finite() || self.alert_threshold_ms <= 0.0 {
            return Err(ConfigError::invalid(
                "monitor.alert_threshold_ms",
                self.alert_threshold_ms,
                "must be a positive number",
            ));
        }
        if self.sample_window_size == 0 {
            return Err(ConfigError::invalid(
                "monitor.sample_window_size",
                self.sample_window_size,
                "must be greater than zero",
            ));
        }
        if self.alert_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "monitor.alert_timeout_ms",
                self.alert_timeout_ms,
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            alert_threshold_ms: 1000.0,
            sample_window_size: 1000,
            alert_timeout_ms: 250,
        }
    }
}

/// Master configuration for the export cache subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportCacheConfig {
    pub schema_cache: CacheSettings,
    pub export_cache: CacheSettings,
    pub monitor: MonitorSettings,
    /// Deadline for the underlying export routine. `None` waits indefinitely.
    pub export_timeout_ms: Option<u64>,
    /// Interval of the optional expiry sweeper. `None` keeps expiry lazy.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for ExportCacheConfig {
    fn default() -> Self {
        Self {
            schema_cache: CacheSettings::new(60, 256),
            export_cache: CacheSettings::new(30, 128),
            monitor: MonitorSettings::default(),
            export_timeout_ms: None,
            sweep_interval_secs: None,
        }
    }
}

impl ExportCacheConfig {
    pub fn export_timeout(&self) -> Option<Duration> {
        self.export_timeout_ms.map(Duration::from_millis)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema_cache.validate("schema_cache")?;
        self.export_cache.validate("export_cache")?;
        self.monitor.validate()?;
        if self.export_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "export_timeout_ms",
                0,
                "must be greater than zero when set",
            ));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(ConfigError::invalid(
                "sweep_interval_secs",
                0,
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables over the defaults.
    ///
    /// Environment variables:
    /// - `STRATEX_SCHEMA_CACHE_TTL_MINUTES` (default: 60)
    /// - `STRATEX_SCHEMA_CACHE_MAX_ENTRIES` (default: 256)
    /// - `STRATEX_EXPORT_CACHE_TTL_MINUTES` (default: 30)
    /// - `STRATEX_EXPORT_CACHE_MAX_ENTRIES` (default: 128)
    /// - `STRATEX_ALERT_THRESHOLD_MS` (default: 1000)
    /// - `STRATEX_SAMPLE_WINDOW_SIZE` (default: 1000)
    /// - `STRATEX_ALERT_TIMEOUT_MS` (default: 250)
    /// - `STRATEX_EXPORT_TIMEOUT_MS` (default: unset)
    /// - `STRATEX_SWEEP_INTERVAL_SECS` (default: unset)
    ///
    /// Unparseable values are errors, not silently replaced by defaults.
    pub fn from_env() -> StratexResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> StratexResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "STRATEX_SCHEMA_CACHE_TTL_MINUTES")? {
            config.schema_cache.ttl_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATEX_SCHEMA_CACHE_MAX_ENTRIES")? {
            config.schema_cache.max_entries = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATEX_EXPORT_CACHE_TTL_MINUTES")? {
            config.export_cache.ttl_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATEX_EXPORT_CACHE_MAX_ENTRIES")? {
            config.export_cache.max_entries = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATEX_ALERT_THRESHOLD_MS")? {
            config.monitor.alert_threshold_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATEX_SAMPLE_WINDOW_SIZE")? {
            config.monitor.sample_window_size = v;
        }
        if let Some(v) = parse_var(&lookup, "STRATEX_ALERT_TIMEOUT_MS")? {
            config.monitor.alert_timeout_ms = v;
        }
        config.export_timeout_ms = parse_var(&lookup, "STRATEX_EXPORT_TIMEOUT_MS")?;
        config.sweep_interval_secs = parse_var(&lookup, "STRATEX_SWEEP_INTERVAL_SECS")?;

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            trimmed
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::invalid(key, trimmed, e.to_string()))
        }
    }
}
