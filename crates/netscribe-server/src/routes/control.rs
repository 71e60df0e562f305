//! Control messages, settings form, counters, export.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use netscribe_capture::ControlMessage;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/control", post(control))
        .route("/settings", get(get_settings).put(save_settings))
        .route("/counts", get(counts))
        .route("/clear", post(clear))
        .route("/export", post(export))
}

#[derive(Debug, Deserialize)]
struct SettingsBody {
    #[serde(rename = "apiTargetUrl", default)]
    api_target_url: String,
    #[serde(rename = "consoleTargetUrl", default)]
    console_target_url: String,
    #[serde(rename = "isLoggingActive", default)]
    logging_active: bool,
}

/// POST /api/control — answer one control message.
async fn control(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ControlMessage>, JsonRejection>,
) -> impl IntoResponse {
    let msg = match body {
        Ok(Json(msg)) => msg,
        Err(rejection) => {
            debug!("Rejected control message: {}", rejection.body_text());
            return error_response(rejection.status(), rejection.body_text());
        }
    };
    match state.control.handle(msg) {
        Ok(response) => (StatusCode::OK, Json(serde_json::json!(response))),
        Err(e) => {
            warn!("Control message failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /api/settings — current settings as the panel shows them.
async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.panel.load_settings() {
        Ok(settings) => (StatusCode::OK, Json(serde_json::json!(settings))),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// PUT /api/settings — save the settings form.
async fn save_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SettingsBody>,
) -> impl IntoResponse {
    match state
        .panel
        .save_settings(&body.api_target_url, &body.console_target_url, body.logging_active)
    {
        Ok(status) if status.is_error => (StatusCode::BAD_REQUEST, Json(serde_json::json!(status))),
        Ok(status) => {
            info!(
                "Settings saved: api={:?} console={:?} active={}",
                body.api_target_url, body.console_target_url, body.logging_active
            );
            (StatusCode::OK, Json(serde_json::json!(status)))
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// GET /api/counts — observer, page-network and console counters.
async fn counts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.panel.counts() {
        Ok(counts) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "network": counts.network,
                "pageNetwork": counts.page_network,
                "console": counts.console,
                "openPages": state.pages.len(),
            })),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// POST /api/clear — discard every captured log.
async fn clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.panel.clear() {
        Ok(status) => (StatusCode::OK, Json(serde_json::json!(status))),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// POST /api/export — write the text reports into the exports directory.
async fn export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.panel.download() {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(e) => {
            warn!("Export failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
