//! Human-readable sizes, speeds and durations for the renderer.

const K: f64 = 1024.0;

fn scaled(value: f64, units: &[&str], decimals: usize) -> String {
    let i = ((value.ln() / K.ln()).floor().max(0.0) as usize).min(units.len() - 1);
    let v = format!("{:.*}", decimals, value / K.powi(i as i32));
    // "1.50" -> "1.5", "2.00" -> "2"
    let v = if v.contains('.') {
        v.trim_end_matches('0').trim_end_matches('.')
    } else {
        v.as_str()
    };
    format!("{v} {}", units[i])
}

/// `0 B`, `1.5 KB`, `3.2 GB`. Non-positive input gives `0 B`.
pub fn format_bytes(bytes: f64, decimals: usize) -> String {
    if bytes.is_nan() || bytes <= 0.0 {
        return "0 B".into();
    }
    scaled(bytes, &["B", "KB", "MB", "GB", "TB"], decimals)
}

/// Rates below one byte per second read as idle.
pub fn format_speed(bytes_per_second: f64, decimals: usize) -> String {
    if bytes_per_second.is_nan() || bytes_per_second < 1.0 {
        return "0 KB/s".into();
    }
    scaled(bytes_per_second, &["B/s", "KB/s", "MB/s", "GB/s"], decimals)
}

/// `3d 4h 5m`, or `--` while unknown.
pub fn format_uptime(seconds: Option<f64>) -> String {
    let secs = match seconds {
        Some(s) if s > 0.0 => s.floor() as u64,
        _ => return "--".into(),
    };
    let d = secs / 86_400;
    let h = secs % 86_400 / 3_600;
    let m = secs % 3_600 / 60;
    format!("{d}d {h}h {m}m")
}

pub fn format_percent(v: Option<f64>) -> String {
    v.map(|p| format!("{p:.1}%")).unwrap_or_else(|| "--".into())
}
