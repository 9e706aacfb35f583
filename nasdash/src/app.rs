//! App main loop: waits for board updates from the poller and prints one line per
//! target whenever that target has a new scrape result.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};

use crate::format::{format_bytes, format_percent, format_speed, format_uptime};
use crate::poller::Poller;
use crate::types::{Board, TargetView};

/// One-line card for a target.
pub fn render_line(v: &TargetView) -> String {
    let m = &v.metrics;
    let net = match (m.upload_bytes_per_second, m.download_bytes_per_second) {
        (None, None) => "--".to_string(),
        (up, down) => format!(
            "up {} / down {}",
            up.map(|b| format_speed(b, 2)).unwrap_or_else(|| "--".into()),
            down.map(|b| format_speed(b, 2)).unwrap_or_else(|| "--".into()),
        ),
    };
    let mut line = format!(
        "{host:<24} cpu {cpu:>6} | mem {mem:>6} ({used}/{total}) | net {net}",
        host = v.host,
        cpu = format_percent(m.cpu_usage_percent),
        mem = format_percent(m.memory_usage_percent),
        used = format_bytes(m.memory_used_bytes, 2),
        total = format_bytes(m.memory_total_bytes, 2),
    );
    if let (Some(pct), Some(used), Some(size)) =
        (m.disk_usage_percent, m.disk_used_bytes, m.disk_size_bytes)
    {
        line.push_str(&format!(
            " | disk {} ({}/{})",
            format_percent(Some(pct)),
            format_bytes(used, 1),
            format_bytes(size, 1)
        ));
    }
    if let Some(t) = m.temperature_celsius {
        line.push_str(&format!(" | {t:.1}°C"));
    }
    line.push_str(&format!(" | up {}", format_uptime(m.uptime_seconds)));
    match m.last_updated_at {
        Some(at) => line.push_str(&format!(" | updated {}", local_time(at))),
        None => line.push_str(" | waiting"),
    }
    if let Some(err) = &m.last_error {
        line.push_str(&format!(" | error: {err}"));
    }
    line
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub struct App {
    poller: Poller,
    json: bool,
    // url -> (last_updated_at, last_error) of the last printed line
    printed: HashMap<String, (Option<DateTime<Utc>>, Option<String>)>,
}

impl App {
    pub fn new(poller: Poller, json: bool) -> Self {
        Self {
            poller,
            json,
            printed: HashMap::new(),
        }
    }

    /// Single scrape round, print the board, done. Rates need two samples, so
    /// they show as unknown here.
    pub async fn run_once(&mut self) -> anyhow::Result<()> {
        self.poller.scrape_all().await;
        let board = self.poller.board();
        self.emit(&board, true)
    }

    /// Poll until Ctrl-C.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut rx = self.poller.subscribe();
        self.poller.start();
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let board = rx.borrow_and_update().clone();
                    self.emit(&board, false)?;
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        self.poller.stop();
        Ok(())
    }

    fn emit(&mut self, board: &Board, all: bool) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if self.json {
            if all {
                writeln!(out, "{}", serde_json::to_string_pretty(board)?)?;
            } else {
                for v in board.iter().filter(|v| self.is_fresh(v)) {
                    writeln!(out, "{}", serde_json::to_string(v)?)?;
                }
            }
        } else {
            for v in board.iter().filter(|v| all || self.is_fresh(v)) {
                writeln!(out, "{}", render_line(v))?;
            }
        }
        out.flush()?;
        for v in board {
            self.printed.insert(
                v.url.clone(),
                (v.metrics.last_updated_at, v.metrics.last_error.clone()),
            );
        }
        Ok(())
    }

    // uptime ticks republish the board every second; only scrape results are printed
    fn is_fresh(&self, v: &TargetView) -> bool {
        let key = (v.metrics.last_updated_at, v.metrics.last_error.clone());
        key != (None, None) && self.printed.get(&v.url) != Some(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DerivedMetrics, SeriesView};

    fn view(metrics: DerivedMetrics) -> TargetView {
        TargetView {
            url: "http://nas.local:9100/metrics".into(),
            host: "nas.local".into(),
            metrics,
            series: SeriesView::default(),
        }
    }

    #[test]
    fn renders_unknowns_as_dashes() {
        let line = render_line(&view(DerivedMetrics::default()));
        assert!(line.starts_with("nas.local"));
        assert!(line.contains("cpu     --"));
        assert!(line.contains("net --"));
        assert!(line.contains("up --"));
        assert!(line.contains("waiting"));
        assert!(!line.contains("disk"));
    }

    #[test]
    fn renders_known_values_and_error() {
        let m = DerivedMetrics {
            cpu_usage_percent: Some(12.34),
            memory_usage_percent: Some(75.0),
            memory_used_bytes: 1536.0,
            memory_total_bytes: 2048.0,
            upload_bytes_per_second: Some(100.0),
            download_bytes_per_second: None,
            disk_usage_percent: Some(50.0),
            disk_used_bytes: Some(1024.0),
            disk_size_bytes: Some(2048.0),
            temperature_celsius: Some(48.0),
            uptime_seconds: Some(3_660.0),
            last_error: Some("HTTP 502".into()),
            ..DerivedMetrics::default()
        };
        let line = render_line(&view(m));
        assert!(line.contains("cpu  12.3%"));
        assert!(line.contains("mem  75.0% (1.5 KB/2 KB)"));
        assert!(line.contains("net up 100 B/s / down --"));
        assert!(line.contains("disk 50.0% (1 KB/2 KB)"));
        assert!(line.contains("48.0°C"));
        assert!(line.contains("up 0d 1h 1m"));
        assert!(line.ends_with("error: HTTP 502"));
    }
}
