//! HTTP routes
//!
//! | Route | Success | Failure |
//! |-------|---------|---------|
//! | `GET /health` | 200 `{success, message}` | none |
//! | `GET /instances` | 200 `{success, data}` | none |
//! | `GET /change-ip?instance=NAME` | 200 rotation result | 400 bad name, 500 provider error |
//!
//! Every body is JSON. The routes only translate; validation and rotation
//! belong to [`RotationRequestHandler`].

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use iprotate_core::{RequestError, RotationRequestHandler};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<RotationRequestHandler>,
}

impl AppState {
    pub fn new(handler: Arc<RotationRequestHandler>) -> Self {
        Self { handler }
    }
}

/// Query string of `/change-ip`
#[derive(Debug, Deserialize)]
pub struct ChangeIpQuery {
    pub instance: Option<String>,
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/instances", get(list_instances))
        .route("/change-ip", get(change_ip))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.handler.health())
}

async fn list_instances(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": state.handler.list_instances(),
    }))
}

async fn change_ip(
    State(state): State<AppState>,
    Query(query): Query<ChangeIpQuery>,
) -> Response {
    match state.handler.change_ip(query.instance.as_deref()).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: RequestError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = err.to_string();

    let body = match err {
        RequestError::Rotation {
            instance_name,
            failure,
        } => json!({
            "success": false,
            "message": message,
            "instance": instance_name,
            "old_ip": failure.old_ip,
            "new_ip": failure.new_ip,
            "warnings": failure.warnings,
        }),
        RequestError::MissingInstance | RequestError::NotFound(_) => json!({
            "success": false,
            "message": message,
        }),
    };

    (status, Json(body)).into_response()
}
