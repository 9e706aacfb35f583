//! nasdash_hook binary: serves the scrape proxy until Ctrl-C.

use std::env;
use std::net::SocketAddr;

use nasdash_hook::state::{upstream_timeout, AppState};
use nasdash_hook::{init_logging, parse_port, router, DEFAULT_PORT};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if env::args().any(|a| a == "-h" || a == "--help") {
        println!("Usage: nasdash_hook [--port PORT|-p PORT]  (default {DEFAULT_PORT})");
        return Ok(());
    }
    init_logging();

    let port = parse_port(env::args(), DEFAULT_PORT);
    let timeout = upstream_timeout();
    let state = AppState::new(timeout)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, timeout_ms = timeout.as_millis() as u64, "metrics hook listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("metrics hook stopped");
    Ok(())
}
