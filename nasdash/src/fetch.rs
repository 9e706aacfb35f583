//! HTTP fetch layer: pulls exposition text for one target, either directly
//! from the exporter or through the metrics hook proxy.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Prefix of a body that reports a failure instead of carrying metrics.
pub const REMOTE_ERROR_MARKER: &str = "Error:";

#[derive(Debug, Error)]
pub enum FetchError {
    /// Request never produced a response (DNS, connect, timeout, body read).
    #[error("transport: {0}")]
    Transport(String),
    /// Response with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// The hook or exporter answered, but the body reports an error.
    #[error("{0}")]
    Remote(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(code) => FetchError::Status(code.as_u16()),
            None => FetchError::Transport(e.to_string()),
        }
    }
}

/// Anything that can produce exposition text for a target URL.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, target: &str) -> Result<String, FetchError>;
}

/// Turn a response body into metrics text, or the remote error it carries.
pub fn check_body(body: String) -> Result<String, FetchError> {
    match body.trim_start().strip_prefix(REMOTE_ERROR_MARKER) {
        Some(msg) => Err(FetchError::Remote(msg.trim().to_string())),
        None => Ok(body),
    }
}

#[derive(Serialize)]
struct HookRequest<'a> {
    url: &'a str,
}

/// reqwest-backed fetcher. With a hook configured every scrape is a
/// `POST {hook}` carrying `{"url": target}`; without one the target is
/// fetched with a plain GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    hook: Option<String>,
}

impl HttpFetcher {
    pub fn new(hook: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nasdash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, hook })
    }

    pub fn hook(&self) -> Option<&str> {
        self.hook.as_deref()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<String, FetchError> {
        let req = match &self.hook {
            Some(hook) => self.client.post(hook).json(&HookRequest { url: target }),
            None => self.client.get(target),
        };
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        check_body(body)
    }
}
