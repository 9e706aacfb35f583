//! `POST /` scrape proxy. Every outcome is a 200: either the exporter's text
//! or a body starting with `Error:` that the poller reports as the target's error.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
}

pub async fn scrape_handler(
    State(state): State<AppState>,
    req: Result<Json<ScrapeRequest>, JsonRejection>,
) -> String {
    let url = match req {
        Ok(Json(r)) => r.url,
        Err(e) => return format!("Error: invalid request: {}", e.body_text()),
    };
    match scrape(&state.client, &url).await {
        Ok(text) => {
            debug!(%url, bytes = text.len(), "scraped");
            text
        }
        Err(msg) => {
            warn!(%url, error = %msg, "scrape failed");
            format!("Error: {msg}")
        }
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

async fn scrape(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let target = reqwest::Url::parse(url).map_err(|e| format!("invalid url {url}: {e}"))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", target.scheme()));
    }
    let resp = client
        .get(target)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("upstream returned HTTP {}", status.as_u16()));
    }
    resp.text()
        .await
        .map_err(|e| format!("reading body failed: {e}"))
}
