//! Data produced by the parser and the rate tracker.
//! `Snapshot` is one scrape; `DerivedMetrics` is what the renderer reads.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cumulative CPU seconds since boot. `total` sums every non-idle mode line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CpuTimes {
    pub total: f64,
    pub idle: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryGauge {
    pub total_bytes: f64,
    pub available_bytes: f64,
}

// cumulative counters for the primary interface; diff to get rates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetCounters {
    pub received_bytes: f64,
    pub transmitted_bytes: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FilesystemUsage {
    pub size_bytes: f64,
    pub avail_bytes: f64,
}

/// One parsed scrape of one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub cpu: CpuTimes,
    pub memory: MemoryGauge,
    pub network: NetCounters,
    pub temperature_celsius: Option<f64>,
    pub filesystem: Option<FilesystemUsage>,
    pub boot_time_epoch_seconds: Option<f64>,
}

/// Read-only view of one target handed to the renderer.
///
/// `None` means "unknown": either never observed, or not computable this tick
/// (first sample, counter reset, zero denominator).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub cpu_usage_percent: Option<f64>,
    pub memory_usage_percent: Option<f64>,
    pub memory_used_bytes: f64,
    pub memory_total_bytes: f64,
    pub upload_bytes_per_second: Option<f64>,
    pub download_bytes_per_second: Option<f64>,
    pub disk_usage_percent: Option<f64>,
    pub disk_used_bytes: Option<f64>,
    pub disk_size_bytes: Option<f64>,
    pub temperature_celsius: Option<f64>,
    pub uptime_seconds: Option<f64>,
    pub boot_time: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Bounded chart series for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesView {
    pub cpu_percent: Vec<f64>,
    pub upload_bytes_per_second: Vec<f64>,
    pub download_bytes_per_second: Vec<f64>,
}

/// One card: the target, its display host and the latest derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetView {
    pub url: String,
    pub host: String,
    pub metrics: DerivedMetrics,
    pub series: SeriesView,
}

/// Every configured target in configured order.
pub type Board = Vec<TargetView>;
