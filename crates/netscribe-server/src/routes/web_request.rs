//! Request lifecycle events reported by the host browser.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use netscribe_capture::{BeforeSendEvent, CompletedEvent, EventOutcome, FailedEvent};
use serde::Serialize;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/web-request/before-send", post(before_send))
        .route("/web-request/completed", post(completed))
        .route("/web-request/failed", post(failed))
}

#[derive(Serialize)]
struct OutcomeResponse {
    outcome: EventOutcome,
    session: u64,
}

async fn before_send(
    State(state): State<Arc<AppState>>,
    Json(event): Json<BeforeSendEvent>,
) -> Json<OutcomeResponse> {
    let mut observer = state.observer().write();
    let outcome = observer.on_before_send(event);
    Json(OutcomeResponse {
        outcome,
        session: observer.session(),
    })
}

async fn completed(
    State(state): State<Arc<AppState>>,
    Json(event): Json<CompletedEvent>,
) -> Json<OutcomeResponse> {
    let mut observer = state.observer().write();
    let outcome = observer.on_completed(event);
    Json(OutcomeResponse {
        outcome,
        session: observer.session(),
    })
}

async fn failed(
    State(state): State<Arc<AppState>>,
    Json(event): Json<FailedEvent>,
) -> Json<OutcomeResponse> {
    let mut observer = state.observer().write();
    let outcome = observer.on_failed(event);
    Json(OutcomeResponse {
        outcome,
        session: observer.session(),
    })
}
