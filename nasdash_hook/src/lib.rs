//! nasdash_hook - scrape proxy for the nasdash poller.
//!
//! Exporters on the home network are not reachable from everywhere the
//! dashboard runs; the hook fetches them on the poller's behalf.

pub mod proxy;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

use tracing_subscriber::EnvFilter;

use crate::proxy::{healthz, scrape_handler};
use crate::state::AppState;

pub const DEFAULT_PORT: u16 = 8787;

/// `RUST_LOG` filter, `info` when unset.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(scrape_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Listen port for the hook. `--port`/`--port=` beats `-p` when both are
/// given; a missing or non-numeric value keeps `default_port`.
pub fn parse_port<I: IntoIterator<Item = String>>(args: I, default_port: u16) -> u16 {
    let mut args = args.into_iter().skip(1);
    let (mut long, mut short) = (None, None);
    while let Some(arg) = args.next() {
        if let Some(v) = arg.strip_prefix("--port=") {
            long = Some(v.to_string());
            continue;
        }
        match arg.as_str() {
            "--port" => long = args.next(),
            "-p" => short = args.next(),
            _ => {}
        }
    }
    long.or(short)
        .and_then(|p| p.parse().ok())
        .unwrap_or(default_port)
}
