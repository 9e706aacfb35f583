//! Per-target rate state: turns consecutive snapshots into `DerivedMetrics`.
//!
//! Counters only ever yield a rate from two samples of the same boot. A
//! regression (the host rebooted and the exporter restarted its counters) or
//! a zero interval gives `None` for that tick; a negative or made-up rate is
//! never reported.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::history::MetricHistory;
use crate::types::{CpuTimes, DerivedMetrics, SeriesView, Snapshot};

/// f64 delta, `None` on counter regression.
pub fn df64(curr: f64, prev: f64) -> Option<f64> {
    (curr >= prev).then_some(curr - prev)
}

/// `100 * (1 - idleDelta / totalDelta)`, clamped to 0..=100.
pub fn cpu_usage_percent(prev: &CpuTimes, curr: &CpuTimes) -> Option<f64> {
    let total = df64(curr.total, prev.total).filter(|d| *d > 0.0)?;
    let idle = df64(curr.idle, prev.idle)?;
    Some((100.0 * (1.0 - idle / total)).clamp(0.0, 100.0))
}

/// `100 * used / total`, `None` when the denominator is zero.
pub fn usage_percent(used: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| 100.0 * used / total)
}

/// Rate tracking state for one monitored host.
#[derive(Debug, Clone)]
pub struct TargetState {
    previous: Option<Snapshot>,
    last_sampled_at_ms: Option<i64>,
    derived: DerivedMetrics,
    history: MetricHistory,
    // uptime at the last commit and when it was committed
    uptime_anchor: Option<(f64, Instant)>,
}

impl TargetState {
    pub fn new(history_len: usize) -> Self {
        Self {
            previous: None,
            last_sampled_at_ms: None,
            derived: DerivedMetrics::default(),
            history: MetricHistory::new(history_len),
            uptime_anchor: None,
        }
    }

    pub fn derived(&self) -> &DerivedMetrics {
        &self.derived
    }

    pub fn previous_snapshot(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn last_sampled_at_ms(&self) -> Option<i64> {
        self.last_sampled_at_ms
    }

    pub fn series(&self) -> SeriesView {
        self.history.view()
    }

    /// Fold in a successful scrape taken at `now_ms` (unix millis) and commit it
    /// as the new baseline. Clears any previous error.
    pub fn observe(&mut self, snapshot: Snapshot, now_ms: i64) -> &DerivedMetrics {
        let mut d = DerivedMetrics::default();

        if let Some(prev) = &self.previous {
            d.cpu_usage_percent = cpu_usage_percent(&prev.cpu, &snapshot.cpu);

            if let Some(last) = self.last_sampled_at_ms {
                let dt = (now_ms - last) as f64 / 1000.0;
                if dt > 0.0 {
                    d.upload_bytes_per_second = df64(
                        snapshot.network.transmitted_bytes,
                        prev.network.transmitted_bytes,
                    )
                    .map(|b| b / dt);
                    d.download_bytes_per_second =
                        df64(snapshot.network.received_bytes, prev.network.received_bytes)
                            .map(|b| b / dt);
                }
            }
        }

        let mem = &snapshot.memory;
        let mem_used = (mem.total_bytes - mem.available_bytes).max(0.0);
        d.memory_used_bytes = mem_used;
        d.memory_total_bytes = mem.total_bytes;
        d.memory_usage_percent = usage_percent(mem_used, mem.total_bytes);

        if let Some(fs) = &snapshot.filesystem {
            let used = (fs.size_bytes - fs.avail_bytes).max(0.0);
            d.disk_usage_percent = usage_percent(used, fs.size_bytes);
            if d.disk_usage_percent.is_some() {
                d.disk_used_bytes = Some(used);
                d.disk_size_bytes = Some(fs.size_bytes);
            }
        }

        d.temperature_celsius = snapshot.temperature_celsius;

        self.uptime_anchor = None;
        if let Some(boot) = snapshot.boot_time_epoch_seconds.filter(|b| *b > 0.0) {
            let uptime = (now_ms as f64 / 1000.0 - boot).max(0.0);
            d.uptime_seconds = Some(uptime);
            d.boot_time = DateTime::<Utc>::from_timestamp_millis((boot * 1000.0) as i64);
            self.uptime_anchor = Some((uptime, Instant::now()));
        }

        d.last_updated_at = DateTime::<Utc>::from_timestamp_millis(now_ms);
        d.last_error = None;

        self.history.push(
            d.cpu_usage_percent,
            d.upload_bytes_per_second,
            d.download_bytes_per_second,
        );
        self.previous = Some(snapshot);
        self.last_sampled_at_ms = Some(now_ms);
        self.derived = d;
        &self.derived
    }

    /// A failed tick: keep every value as it was, only surface the error.
    pub fn record_error(&mut self, err: impl Into<String>) {
        self.derived.last_error = Some(err.into());
    }

    /// Move the displayed uptime forward between scrapes: the committed value
    /// plus the time elapsed since that commit, as of `now`. No-op while the
    /// boot time is unknown.
    pub fn advance_uptime(&mut self, now: Instant) -> bool {
        match self.uptime_anchor {
            Some((base, at)) => {
                let up = base + now.saturating_duration_since(at).as_secs_f64();
                self.derived.uptime_seconds = Some(up);
                true
            }
            None => false,
        }
    }
}
