//! Page loads and the messages their interceptors post.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, post};
use axum::{Json, Router};
use netscribe_capture::Envelope;
use serde::Deserialize;
use tracing::warn;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pages", post(open_page))
        .route("/pages/{id}", delete(close_page))
        .route("/pages/{id}/messages", post(post_message))
}

#[derive(Debug, Deserialize)]
struct OpenPageBody {
    url: String,
}

/// POST /api/pages — a page finished loading; attach a relay.
async fn open_page(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OpenPageBody>,
) -> impl IntoResponse {
    match state
        .pages
        .open(&body.url, state.store.clone(), state.clock.clone())
    {
        Ok(opened) => (StatusCode::CREATED, Json(serde_json::json!(opened))),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// DELETE /api/pages/:id — the page navigated away or closed.
async fn close_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.pages.close(&id) {
        (StatusCode::OK, Json(serde_json::json!({ "success": true })))
    } else {
        error_response(StatusCode::NOT_FOUND, "Page not found")
    }
}

/// POST /api/pages/:id/messages — raw data posted on the page's channel.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(data): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(relay) = state.pages.relay(&id) else {
        return error_response(StatusCode::NOT_FOUND, "Page not found");
    };
    let mut relay = relay.lock();
    let envelope = Envelope {
        sender: relay.page().window(),
        data,
    };
    match relay.handle_envelope(&envelope) {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!(outcome))),
        Err(e) => {
            warn!("Failed to persist message from page {}: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
