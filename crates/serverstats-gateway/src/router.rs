//! Axum router wiring.
//!
//! Exposes `/healthz` and the configured metrics endpoint; websocket mode
//! also answers `/`.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    let endpoint = state.cfg().metrics.endpoint.clone();
    let websocket = state.cfg().gateway.websocket;

    let mut router = Router::new()
        .route("/healthz", get(ops::healthz))
        .route(&endpoint, get(ops::metrics));
    if websocket {
        router = router.route("/", get(ops::ws_home));
    }
    router.with_state(state)
}
