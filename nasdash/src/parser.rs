//! Prometheus exposition text -> `Snapshot`.
//!
//! Parsing is lenient: exporters omit whole sections (no thermal
//! zones, no matching mount) and emit metrics we do not care about, so
//! unrecognized or malformed lines are skipped and missing fields stay at
//! their zero/absent defaults. `parse_strict` reports the malformed lines
//! instead, for checking an exporter by hand.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CpuTimes, FilesystemUsage, MemoryGauge, NetCounters, Snapshot};

pub const CPU_SECONDS: &str = "node_cpu_seconds_total";
pub const MEM_TOTAL: &str = "node_memory_MemTotal_bytes";
pub const MEM_AVAILABLE: &str = "node_memory_MemAvailable_bytes";
pub const BOOT_TIME: &str = "node_boot_time_seconds";
pub const TEMPERATURE: [&str; 2] = ["node_thermal_zone_temp", "node_hwmon_temp_input"];
pub const NET_RECEIVE: &str = "node_network_receive_bytes_total";
pub const NET_TRANSMIT: &str = "node_network_transmit_bytes_total";
pub const FS_SIZE: &str = "node_filesystem_size_bytes";
pub const FS_AVAIL: &str = "node_filesystem_avail_bytes";

/// Disk metrics are read for this mount only. Inside the exporter's container
/// it is bind-mounted from the host's root filesystem.
pub const TARGET_MOUNTPOINT: &str = "/etc/hostname";

/// Interface name prefixes never chosen as the primary interface
/// (loopback, veth pairs, docker bridge, tailscale tunnel).
pub const IGNORED_INTERFACE_PREFIXES: [&str; 4] = ["lo", "veth", "docker0", "tailscale0"];

/// Used when every observed device is denylisted.
pub const FALLBACK_INTERFACE: &str = "eth0";

/// Scale of raw temperature samples. Exporters disagree: hwmon/thermal_zone
/// values are sometimes millidegrees and sometimes already degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Millicelsius,
    /// Values above 150 are taken as millidegrees.
    #[default]
    Auto,
}

impl TemperatureUnit {
    pub fn to_celsius(self, raw: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => raw,
            TemperatureUnit::Millicelsius => raw / 1000.0,
            TemperatureUnit::Auto if raw > 150.0 => raw / 1000.0,
            TemperatureUnit::Auto => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub temperature_unit: TemperatureUnit,
}

/// A malformed sample line. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Anomaly {
    #[error("line {line}: label block is not terminated")]
    UnterminatedLabels { line: usize },
    #[error("line {line}: no value after metric identifier")]
    MissingValue { line: usize },
    #[error("line {line}: value {value:?} is not a number")]
    InvalidValue { line: usize, value: String },
    #[error("line {line}: value is not finite")]
    NonFiniteValue { line: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} malformed line(s) in exposition text{}", .anomalies.len(), first_anomaly(.anomalies))]
pub struct ParseError {
    pub anomalies: Vec<Anomaly>,
}

fn first_anomaly(anomalies: &[Anomaly]) -> String {
    anomalies
        .first()
        .map(|a| format!(", first: {a}"))
        .unwrap_or_default()
}

/// Best-effort parse with default options. Never fails.
pub fn parse(text: &str) -> Snapshot {
    parse_with(text, &ParseOptions::default())
}

pub fn parse_with(text: &str, opts: &ParseOptions) -> Snapshot {
    let mut acc = Accumulator::default();
    for (idx, line) in text.lines().enumerate() {
        if let Ok(Some((ident, value))) = split_sample(line, idx + 1) {
            acc.feed(ident, value, opts);
        }
    }
    acc.finish()
}

/// Same extraction as `parse_with`, but any malformed sample line fails the
/// whole parse. Unknown metric names are still fine.
pub fn parse_strict(text: &str, opts: &ParseOptions) -> Result<Snapshot, ParseError> {
    let mut acc = Accumulator::default();
    let mut anomalies = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match split_sample(line, idx + 1) {
            Ok(Some((ident, value))) => acc.feed(ident, value, opts),
            Ok(None) => {}
            Err(a) => anomalies.push(a),
        }
    }
    if anomalies.is_empty() {
        Ok(acc.finish())
    } else {
        Err(ParseError { anomalies })
    }
}

/// Split a sample line into (identifier, value). `Ok(None)` for blank and
/// comment lines.
fn split_sample(line: &str, lineno: usize) -> Result<Option<(&str, f64)>, Anomaly> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let brace = line.find('{');
    let space = line.find(char::is_whitespace);
    // label values may contain spaces, so the identifier runs to the closing brace
    let ident_end = match (brace, space) {
        (Some(b), s) if s.map_or(true, |s| b < s) => match line[b..].find('}') {
            Some(close) => b + close + 1,
            None => return Err(Anomaly::UnterminatedLabels { line: lineno }),
        },
        (_, Some(s)) => s,
        (_, None) => return Err(Anomaly::MissingValue { line: lineno }),
    };

    let (ident, rest) = line.split_at(ident_end);
    let raw = rest
        .split_whitespace()
        .next()
        .ok_or(Anomaly::MissingValue { line: lineno })?;
    let value: f64 = raw.parse().map_err(|_| Anomaly::InvalidValue {
        line: lineno,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(Anomaly::NonFiniteValue { line: lineno });
    }
    Ok(Some((ident, value)))
}

/// Value of label `key` in `name{k="v",...}`, if present.
pub fn label<'a>(ident: &'a str, key: &str) -> Option<&'a str> {
    let open = ident.find('{')?;
    let mut rest = &ident[open + 1..];
    loop {
        rest = rest.trim_start_matches([',', ' ']);
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        let quoted = rest[eq + 1..].trim_start().strip_prefix('"')?;
        let close = quoted.find('"')?;
        if name == key {
            return Some(&quoted[..close]);
        }
        rest = &quoted[close + 1..];
    }
}

pub fn is_ignored_interface(device: &str) -> bool {
    IGNORED_INTERFACE_PREFIXES
        .iter()
        .any(|p| device.starts_with(p))
}

#[derive(Default)]
struct Accumulator<'a> {
    cpu: CpuTimes,
    memory: MemoryGauge,
    boot_time: Option<f64>,
    temperature: Option<f64>,
    // per-device counters in discovery order
    devices: Vec<(&'a str, NetCounters)>,
    fs_size: Option<f64>,
    fs_avail: Option<f64>,
}

impl<'a> Accumulator<'a> {
    fn feed(&mut self, ident: &'a str, value: f64, opts: &ParseOptions) {
        if ident.starts_with(CPU_SECONDS) {
            if label(ident, "mode") == Some("idle") {
                self.cpu.idle += value;
            } else {
                self.cpu.total += value;
            }
        } else if ident.starts_with(MEM_TOTAL) {
            self.memory.total_bytes = value;
        } else if ident.starts_with(MEM_AVAILABLE) {
            self.memory.available_bytes = value;
        } else if ident.starts_with(BOOT_TIME) {
            self.boot_time = Some(value);
        } else if TEMPERATURE.iter().any(|p| ident.starts_with(p)) {
            if self.temperature.is_none() {
                self.temperature = Some(opts.temperature_unit.to_celsius(value));
            }
        } else if ident.starts_with(NET_RECEIVE) || ident.starts_with(NET_TRANSMIT) {
            if let Some(dev) = label(ident, "device") {
                let counters = self.device_mut(dev);
                if ident.starts_with(NET_RECEIVE) {
                    counters.received_bytes = value;
                } else {
                    counters.transmitted_bytes = value;
                }
            }
        } else if ident.starts_with(FS_SIZE) || ident.starts_with(FS_AVAIL) {
            if label(ident, "mountpoint") == Some(TARGET_MOUNTPOINT) {
                if ident.starts_with(FS_SIZE) {
                    self.fs_size = Some(value);
                } else {
                    self.fs_avail = Some(value);
                }
            }
        }
    }

    fn device_mut(&mut self, dev: &'a str) -> &mut NetCounters {
        let idx = match self.devices.iter().position(|(name, _)| *name == dev) {
            Some(i) => i,
            None => {
                self.devices.push((dev, NetCounters::default()));
                self.devices.len() - 1
            }
        };
        &mut self.devices[idx].1
    }

    fn primary_interface(&self) -> Option<NetCounters> {
        let name = self
            .devices
            .iter()
            .map(|(name, _)| *name)
            .find(|name| !is_ignored_interface(name))
            .unwrap_or(FALLBACK_INTERFACE);
        self.devices
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }

    fn finish(self) -> Snapshot {
        let filesystem = match (self.fs_size, self.fs_avail) {
            (None, None) => None,
            (size, avail) => Some(FilesystemUsage {
                size_bytes: size.unwrap_or(0.0),
                avail_bytes: avail.unwrap_or(0.0),
            }),
        };
        Snapshot {
            cpu: self.cpu,
            memory: self.memory,
            network: self.primary_interface().unwrap_or_default(),
            temperature_celsius: self.temperature,
            filesystem,
            boot_time_epoch_seconds: self.boot_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"# HELP node_cpu_seconds_total Seconds the CPUs spent in each mode.
# TYPE node_cpu_seconds_total counter
node_cpu_seconds_total{cpu="0",mode="idle"} 1000.5
node_cpu_seconds_total{cpu="0",mode="user"} 200.25
node_cpu_seconds_total{cpu="0",mode="system"} 50
node_cpu_seconds_total{cpu="1",mode="idle"} 999.5
node_cpu_seconds_total{cpu="1",mode="user"} 100
node_memory_MemTotal_bytes 8e+09
node_memory_MemAvailable_bytes 2e+09
node_boot_time_seconds 1.7e+09
node_thermal_zone_temp{type="x86_pkg_temp",zone="0"} 48000
node_thermal_zone_temp{type="acpitz",zone="1"} 30000
node_network_receive_bytes_total{device="lo"} 999999
node_network_transmit_bytes_total{device="lo"} 999999
node_network_receive_bytes_total{device="docker0"} 5
node_network_receive_bytes_total{device="eth0"} 123456
node_network_transmit_bytes_total{device="eth0"} 654321
node_filesystem_size_bytes{device="/dev/sda1",fstype="ext4",mountpoint="/"} 1
node_filesystem_size_bytes{device="/dev/sda1",fstype="ext4",mountpoint="/etc/hostname"} 1000
node_filesystem_avail_bytes{device="/dev/sda1",fstype="ext4",mountpoint="/etc/hostname"} 250
"#;

    #[test]
    fn parses_full_exposition() {
        let s = parse(SAMPLE);
        assert_eq!(s.cpu.idle, 2000.0);
        assert_eq!(s.cpu.total, 350.25);
        assert_eq!(s.memory.total_bytes, 8e9);
        assert_eq!(s.memory.available_bytes, 2e9);
        assert_eq!(s.boot_time_epoch_seconds, Some(1.7e9));
        assert_eq!(s.network.received_bytes, 123456.0);
        assert_eq!(s.network.transmitted_bytes, 654321.0);
        assert_eq!(
            s.filesystem,
            Some(FilesystemUsage {
                size_bytes: 1000.0,
                avail_bytes: 250.0
            })
        );
    }

    #[test]
    fn first_temperature_wins() {
        let s = parse(SAMPLE);
        assert_eq!(s.temperature_celsius, Some(48.0));

        let celsius = ParseOptions {
            temperature_unit: TemperatureUnit::Celsius,
        };
        let text = "node_hwmon_temp_input{chip=\"a\"} 41.5\nnode_hwmon_temp_input{chip=\"b\"} 60\n";
        assert_eq!(parse_with(text, &celsius).temperature_celsius, Some(41.5));
    }

    #[test]
    fn primary_interface_skips_denylist() {
        let text = "\
node_network_receive_bytes_total{device=\"lo\"} 1
node_network_receive_bytes_total{device=\"docker0\"} 2
node_network_receive_bytes_total{device=\"eth0\"} 3
node_network_transmit_bytes_total{device=\"eth0\"} 4
";
        let s = parse(text);
        assert_eq!(s.network.received_bytes, 3.0);
        assert_eq!(s.network.transmitted_bytes, 4.0);
    }

    #[test]
    fn primary_interface_uses_discovery_order() {
        let text = "\
node_network_receive_bytes_total{device=\"veth12ab\"} 9
node_network_receive_bytes_total{device=\"enp3s0\"} 10
node_network_receive_bytes_total{device=\"eth0\"} 11
";
        assert_eq!(parse(text).network.received_bytes, 10.0);
    }

    #[test]
    fn falls_back_to_eth0_then_zero() {
        let text = "\
node_network_receive_bytes_total{device=\"lo\"} 1
node_network_receive_bytes_total{device=\"tailscale0\"} 2
";
        assert_eq!(parse(text).network, NetCounters::default());
    }

    #[test]
    fn skips_garbage_lines() {
        let text = "\
garbage
node_memory_MemTotal_bytes NaN
node_memory_MemTotal_bytes notanumber
node_memory_MemTotal_bytes{broken=\"x\" 5
node_memory_MemTotal_bytes 4096

node_memory_MemAvailable_bytes +Inf
";
        let s = parse(text);
        assert_eq!(s.memory.total_bytes, 4096.0);
        assert_eq!(s.memory.available_bytes, 0.0);
    }

    #[test]
    fn empty_text_gives_defaults() {
        let s = parse("");
        assert_eq!(s, Snapshot::default());
        assert!(s.filesystem.is_none());
        assert!(s.temperature_celsius.is_none());
    }

    #[test]
    fn strict_mode_reports_every_anomaly() {
        let text = "node_boot_time_seconds\nnode_boot_time_seconds x\nnode_boot_time_seconds 5\nfoo{a=\"b\" 1\n";
        let err = parse_strict(text, &ParseOptions::default()).unwrap_err();
        assert_eq!(
            err.anomalies,
            vec![
                Anomaly::MissingValue { line: 1 },
                Anomaly::InvalidValue {
                    line: 2,
                    value: "x".into()
                },
                Anomaly::UnterminatedLabels { line: 4 },
            ]
        );
        assert_eq!(
            parse_strict(SAMPLE, &ParseOptions::default()).unwrap(),
            parse(SAMPLE)
        );
    }

    #[test]
    fn parse_error_message() {
        let err = ParseError {
            anomalies: vec![Anomaly::MissingValue { line: 3 }],
        };
        assert_eq!(
            err.to_string(),
            "1 malformed line(s) in exposition text, first: line 3: no value after metric identifier"
        );
        let empty = ParseError { anomalies: vec![] };
        assert_eq!(empty.to_string(), "0 malformed line(s) in exposition text");
    }

    #[test]
    fn label_lookup() {
        let ident = r#"node_filesystem_size_bytes{device="/dev/sda1", mountpoint="/mnt/a b"}"#;
        assert_eq!(label(ident, "mountpoint"), Some("/mnt/a b"));
        assert_eq!(label(ident, "device"), Some("/dev/sda1"));
        assert_eq!(label(ident, "fstype"), None);
        assert_eq!(label("node_boot_time_seconds", "mode"), None);
    }

    #[test]
    fn value_may_be_followed_by_timestamp() {
        let s = parse("node_memory_MemTotal_bytes{host=\"a b\"} 1024 1700000000000\n");
        assert_eq!(s.memory.total_bytes, 1024.0);
    }
}
