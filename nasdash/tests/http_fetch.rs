//! HttpFetcher against in-process exporter and hook stand-ins.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use nasdash::fetch::{FetchError, Fetcher, HttpFetcher};
use nasdash::poller::{PollSettings, Poller};
use serde::Deserialize;

const EXPOSITION: &str = "\
# HELP node_memory_MemTotal_bytes Memory information field MemTotal_bytes.
node_memory_MemTotal_bytes 8e+09
node_memory_MemAvailable_bytes 2e+09
node_filesystem_size_bytes{device=\"/dev/sda1\",mountpoint=\"/etc/hostname\"} 400
node_filesystem_avail_bytes{device=\"/dev/sda1\",mountpoint=\"/etc/hostname\"} 300
";

#[derive(Deserialize)]
struct HookRequest {
    url: String,
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn fake_exporter() -> SocketAddr {
    serve(
        Router::new()
            .route("/metrics", get(|| async { EXPOSITION }))
            .route(
                "/broken",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            ),
    )
    .await
}

// answers like the hook: metrics text, or "Error: ..." with a 200
async fn fake_hook() -> SocketAddr {
    serve(Router::new().route(
        "/",
        post(|Json(req): Json<HookRequest>| async move {
            if req.url.contains("offline") {
                format!("Error: cannot reach {}", req.url)
            } else {
                EXPOSITION.to_string()
            }
        }),
    ))
    .await
}

fn fetcher(hook: Option<String>) -> HttpFetcher {
    HttpFetcher::new(hook, Duration::from_secs(2)).expect("client")
}

#[tokio::test]
async fn direct_mode_fetches_and_maps_status() {
    let addr = fake_exporter().await;
    let f = fetcher(None);

    let body = f
        .fetch(&format!("http://{addr}/metrics"))
        .await
        .expect("metrics");
    assert!(body.contains("node_memory_MemTotal_bytes"));

    match f.fetch(&format!("http://{addr}/broken")).await {
        Err(FetchError::Status(503)) => {}
        other => panic!("expected HTTP 503, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_target_is_a_transport_error() {
    // bind then drop to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("port")
        .port();
    match fetcher(None)
        .fetch(&format!("http://127.0.0.1:{port}/metrics"))
        .await
    {
        Err(FetchError::Transport(_)) => {}
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn hook_mode_posts_target_and_surfaces_remote_errors() {
    let hook = fake_hook().await;
    let f = fetcher(Some(format!("http://{hook}/")));
    assert_eq!(f.hook(), Some(format!("http://{hook}/").as_str()));

    let body = f.fetch("http://nas.local:9100/metrics").await.expect("ok");
    assert_eq!(body, EXPOSITION);

    match f.fetch("http://offline.local:9100/metrics").await {
        Err(FetchError::Remote(msg)) => {
            assert_eq!(msg, "cannot reach http://offline.local:9100/metrics")
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn poller_over_http_end_to_end() {
    let addr = fake_exporter().await;
    let good = format!("http://{addr}/metrics");
    let bad = format!("http://{addr}/broken");
    let poller = Poller::new(Arc::new(fetcher(None)), PollSettings::default());
    poller.set_targets(&[good.clone(), bad.clone()]).await;
    poller.scrape_all().await;

    let board = poller.board();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].url, good);
    assert_eq!(board[0].host, "127.0.0.1");
    assert_eq!(board[0].metrics.memory_usage_percent, Some(75.0));
    assert_eq!(board[0].metrics.disk_usage_percent, Some(25.0));
    assert_eq!(board[0].metrics.cpu_usage_percent, None);
    assert_eq!(board[1].metrics.last_error.as_deref(), Some("HTTP 503"));
}
