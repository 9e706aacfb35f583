//! Shared hook state: one pooled upstream client.

use std::time::Duration;

use once_cell::sync::OnceCell;

/// Upstream request timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "NASDASH_HOOK_TIMEOUT_MS";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_millis(8_000);

// read once
pub fn upstream_timeout() -> Duration {
    static V: OnceCell<Duration> = OnceCell::new();
    *V.get_or_init(|| {
        std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT)
    })
}

#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nasdash_hook/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}
