//! HTTP surface: routing, modes, auth and failure mapping.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use serverstats_core::table::{AtomicCounterTable, CounterTable, MappedCounterTable};
use serverstats_gateway::app_state::AppState;
use serverstats_gateway::config::{self, StatsConfig};
use serverstats_gateway::ops::DEGRADED_HEADER;
use serverstats_gateway::provider::FileSnapshotProvider;
use serverstats_gateway::router::build_router;

fn snapshot_vector() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../serverstats-core/tests/vectors/snapshot_basic.json")
}

fn cfg(yaml: &str) -> StatsConfig {
    config::load_from_str(yaml).expect("config")
}

fn app_with_table(yaml: &str, table: Arc<dyn CounterTable>) -> Router {
    let provider = Arc::new(FileSnapshotProvider::new(snapshot_vector()));
    build_router(AppState::with_table(cfg(yaml), table, provider))
}

fn app(yaml: &str) -> Router {
    app_with_table(yaml, Arc::new(AtomicCounterTable::with_capacity(16)))
}

async fn get(app: &Router, uri: &str, auth: Option<&str>) -> (StatusCode, HeaderMap, String) {
    let mut req = Request::builder().uri(uri);
    if let Some(a) = auth {
        req = req.header(header::AUTHORIZATION, a);
    }
    let resp = app
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn default_mode_serves_exposition_text() {
    let app = app("version: 1\ngateway:\n  worker_id: 2\n");
    let (status, headers, body) = get(&app, "/metrics", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_TYPE],
        "text/plain; version=0.0.4; charset=utf-8"
    );
    assert!(headers.get(DEGRADED_HEADER).is_none());
    assert!(body.contains("# TYPE openswoole_requests_total counter\n"));
    assert!(body.contains("openswoole_requests_total{service=\"openswoole\"} 119\n"));
    assert!(body.contains(
        "openswoole_event_workers_dispatch_count{service=\"openswoole\",worker_id=\"2\"} 49\n"
    ));
    assert!(body.ends_with("# EOF"));
}

#[tokio::test]
async fn json_mode_and_unknown_mode_fallback() {
    let app = app("version: 1\n");

    let (status, headers, body) = get(&app, "/metrics?mode=json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["openswoole_requests_total"][0]["value"], 119);
    assert_eq!(
        doc["openswoole_requests_total"][0]["labels"]["service"],
        "openswoole"
    );

    let (_, headers, body) = get(&app, "/metrics?mode=xml", None).await;
    assert_eq!(
        headers[header::CONTENT_TYPE],
        "text/plain; version=0.0.4; charset=utf-8"
    );
    assert!(body.ends_with("# EOF"));
}

#[tokio::test]
async fn repeated_scrapes_subtract_their_own_traffic() {
    let app = app("version: 1\n");

    let (_, _, first) = get(&app, "/metrics", None).await;
    let (_, _, second) = get(&app, "/metrics", None).await;

    assert!(first.contains("openswoole_requests_total{service=\"openswoole\"} 119\n"));
    assert!(second.contains("openswoole_requests_total{service=\"openswoole\"} 118\n"));
    assert!(second.contains("openswoole_connections_accepted{service=\"openswoole\"} 38\n"));
}

#[tokio::test]
async fn configured_labels_and_endpoint() {
    let app = app(
        r#"
version: 1
service:
  name: "Checkout"
  labels:
    env: "prod"
metrics:
  endpoint: "/stats"
"#,
    );

    let (status, _, _) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = get(&app, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("openswoole_up{env=\"prod\",service=\"checkout\"} 1\n"));
}

#[tokio::test]
async fn secure_endpoint_requires_bearer_token() {
    let app = app(
        r#"
version: 1
metrics:
  secure: true
  bearer_token: "s3cret"
"#,
    );

    let (status, headers, body) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["code"], "UNAUTHORIZED");

    for wrong in ["Bearer nope", "Bearer s3creT", "Bearer s3cre", "Bearer s3cret2", "s3cret"] {
        let (status, _, _) = get(&app, "/metrics", Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{wrong}");
    }

    let (status, _, _) = get(&app, "/metrics", Some("Bearer s3cret")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rejected_requests_are_not_counted() {
    let table = Arc::new(AtomicCounterTable::with_capacity(16));
    let app = app_with_table(
        "version: 1\nmetrics:\n  secure: true\n  bearer_token: \"t\"\n",
        table.clone(),
    );

    let (status, _, _) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(table.len(), 0);
}

#[tokio::test]
async fn missing_snapshot_maps_to_500() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(FileSnapshotProvider::new(dir.path().join("absent.json")));
    let table = Arc::new(AtomicCounterTable::with_capacity(16));
    let app = build_router(AppState::with_table(cfg("version: 1\n"), table.clone(), provider));

    let (status, _, body) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["code"], "SNAPSHOT_UNAVAILABLE");
    assert_eq!(table.get("metrics"), 1);
}

#[tokio::test]
async fn invalid_snapshot_file_maps_to_500() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    std::fs::write(&path, b"{\"schema\": 1, \"bogus\": true}").unwrap();
    let provider = Arc::new(FileSnapshotProvider::new(path));
    let app = build_router(AppState::with_table(
        cfg("version: 1\n"),
        Arc::new(AtomicCounterTable::with_capacity(16)),
        provider,
    ));

    let (status, _, body) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["code"], "INVALID_SNAPSHOT");
}

#[tokio::test]
async fn full_table_serves_degraded() {
    // Room for the global key only; the worker key cannot be inserted.
    let app = app_with_table(
        "version: 1\ngateway:\n  worker_id: 2\n",
        Arc::new(AtomicCounterTable::with_capacity(1)),
    );

    let (status, headers, body) = get(&app, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(DEGRADED_HEADER).is_some());
    assert!(body.contains("openswoole_requests_total{service=\"openswoole\"} 119\n"));
    assert!(body.contains("worker_id=\"2\"} 50\n"));
}

#[tokio::test]
async fn healthz_and_websocket_root() {
    let plain = app("version: 1\n");
    let (status, _, body) = get(&plain, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    let (status, _, _) = get(&plain, "/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let ws = app("version: 1\ngateway:\n  websocket: true\n");
    let (status, _, body) = get(&ws, "/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Nothing here.");
    let (status, _, _) = get(&ws, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn workers_share_a_mapped_table() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("skip.tbl");
    let table_yaml = format!("{:?}", table_path.display().to_string());
    let yaml = |worker: u32, attach: bool| {
        format!(
            "version: 1\n\
             gateway:\n  worker_id: {worker}\n\
             skip_table:\n  capacity: 64\n  path: {table_yaml}\n  attach: {attach}\n"
        )
    };
    let snapshot = Arc::new(FileSnapshotProvider::new(snapshot_vector()));

    let owner = AppState::new(cfg(&yaml(0, false)), snapshot.clone()).unwrap();
    let worker = AppState::new(cfg(&yaml(2, true)), snapshot).unwrap();
    let owner_app = build_router(owner);
    let worker_app = build_router(worker);

    let (_, _, _) = get(&worker_app, "/metrics", None).await;
    let (_, _, body) = get(&owner_app, "/metrics", None).await;

    // Both hits land on the shared global key.
    assert!(body.contains("openswoole_requests_total{service=\"openswoole\"} 118\n"));
    assert!(body.contains(
        "openswoole_event_workers_dispatch_count{service=\"openswoole\",worker_id=\"2\"} 49\n"
    ));

    let attached = MappedCounterTable::open(&table_path).unwrap();
    assert_eq!(attached.get("metrics"), 2);
    assert_eq!(attached.get("metrics-0"), 1);
}
