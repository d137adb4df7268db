//! Operational HTTP endpoints.
//!
//! - `/healthz`           : liveness
//! - `<metrics.endpoint>` : exposition text, or JSON with `?mode=json`
//! - `/`                  : "Nothing here." in websocket mode

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use serverstats_core::error::{ClientCode, StatsError};
use serverstats_core::Format;

use crate::app_state::AppState;

/// Set on scrapes served while self-traffic could not be recorded.
pub const DEGRADED_HEADER: &str = "x-serverstats-degraded";

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

fn error_json(code: &str, msg: &str) -> String {
    json!({
        "code": code,
        "msg": msg
    })
    .to_string()
}

fn error_response(err: &StatsError) -> Response {
    let status = match err.client_code() {
        ClientCode::BadRequest => StatusCode::BAD_REQUEST,
        ClientCode::Unauthorized => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        error_json(err.client_code().as_str(), &err.to_string()),
    )
        .into_response()
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn ws_home() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Nothing here.")
}

pub async fn metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<MetricsQuery>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = state.authorize_metrics(authorization) {
        tracing::debug!(error = %e, "metrics request rejected");
        return error_response(&e);
    }

    let format = Format::from_mode(q.mode.as_deref());
    let worker_id = state.cfg().gateway.worker_id;

    // Snapshot reads and rendering are synchronous; keep them off the reactor.
    let task_state = state.clone();
    let joined = tokio::task::spawn_blocking(move || {
        task_state
            .engine()
            .scrape(task_state.provider(), worker_id, format)
    })
    .await;

    let scrape = match joined {
        Ok(Ok(scrape)) => scrape,
        Ok(Err(e)) => {
            tracing::error!(code = e.client_code().as_str(), error = %e, "metrics scrape failed");
            return error_response(&e);
        }
        Err(e) => {
            let e = StatsError::Internal(format!("scrape task failed: {e}"));
            tracing::error!(error = %e, "metrics scrape failed");
            return error_response(&e);
        }
    };

    let mut resp = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, scrape.content_type)],
        scrape.body,
    )
        .into_response();
    if scrape.degraded {
        resp.headers_mut()
            .insert(DEGRADED_HEADER, HeaderValue::from_static("skip-table"));
    }
    resp
}
