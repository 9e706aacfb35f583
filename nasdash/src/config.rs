//! Dashboard settings: load/save a small JSON file with the target list and polling knobs.
//! Stored under XDG config dir: $XDG_CONFIG_HOME/nasdash/config.json (fallback ~/.config/nasdash/config.json)

use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::warn;

use crate::parser::{ParseOptions, TemperatureUnit};
use crate::poller::{PollSettings, DEFAULT_HISTORY_LEN};

pub const DEFAULT_TARGETS: [&str; 2] = [
    "https://nas-api.111312.xyz/metrics",
    "https://wkyapi.111312.xyz/metrics",
];

pub const DEFAULT_HOOK: &str = "https://nas-hook.111312.xyz/";

/// Overrides the hook endpoint from the config file; empty disables the hook.
pub const HOOK_ENV: &str = "NASDASH_HOOK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid target url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

fn default_hook() -> Option<String> {
    Some(DEFAULT_HOOK.to_string())
}
fn default_scrape_secs() -> u64 {
    10
}
fn default_uptime_secs() -> u64 {
    1
}
fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}
fn default_version() -> u32 {
    1
}

/// Upper bound on points kept per chart series (a day at the default cadence).
pub const MAX_HISTORY_LEN: usize = 8_640;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    /// Persisted target list; empty means "use the built-in defaults".
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_hook")]
    pub hook: Option<String>,
    #[serde(default = "default_scrape_secs")]
    pub scrape_interval_secs: u64,
    #[serde(default = "default_uptime_secs")]
    pub uptime_interval_secs: u64,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            hook: default_hook(),
            scrape_interval_secs: default_scrape_secs(),
            uptime_interval_secs: default_uptime_secs(),
            temperature_unit: TemperatureUnit::default(),
            history_len: default_history_len(),
            version: default_version(),
        }
    }
}

impl ConfigFile {
    pub fn poll_settings(&self) -> PollSettings {
        let scrape_every = Duration::from_secs(self.scrape_interval_secs.max(1));
        PollSettings {
            scrape_every,
            uptime_every: Duration::from_secs(self.uptime_interval_secs.max(1)),
            fetch_timeout: scrape_every,
            history_len: self.history_len.min(MAX_HISTORY_LEN),
            parse: ParseOptions {
                temperature_unit: self.temperature_unit,
            },
        }
    }

    /// Hook endpoint after applying `NASDASH_HOOK`.
    pub fn effective_hook(&self) -> Option<String> {
        match std::env::var(HOOK_ENV) {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => self.hook.clone(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("nasdash")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nasdash")
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Missing file means defaults; a corrupt one is logged and also means defaults.
pub fn load_config() -> ConfigFile {
    let path = config_path();
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            ConfigFile::default()
        }),
        Err(_) => ConfigFile::default(),
    }
}

pub fn save_config(c: &ConfigFile) -> Result<(), ConfigError> {
    for t in &c.targets {
        validate_target(t)?;
    }
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(c)?;
    fs::write(path, data)?;
    Ok(())
}

pub fn validate_target(url: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

/// Final target list: CLI URLs, else persisted targets, else the defaults.
/// Invalid persisted entries are skipped with a warning.
pub fn resolve_targets(cli: &[String], cfg: &ConfigFile) -> Vec<String> {
    if !cli.is_empty() {
        return cli.to_vec();
    }
    let persisted: Vec<String> = cfg
        .targets
        .iter()
        .filter(|t| match validate_target(t) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "skipping persisted target");
                false
            }
        })
        .cloned()
        .collect();
    if !persisted.is_empty() {
        return persisted;
    }
    DEFAULT_TARGETS.iter().map(|s| s.to_string()).collect()
}
