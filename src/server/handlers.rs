// src/server/handlers.rs

//! Webhook handlers.
//!
//! Deployments are fire-and-forget relative to the HTTP response: the
//! handler parses the payload, spawns the coordinator call and answers
//! `202 Accepted` straight away.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::coordinator::{Coordinator, DeployReport};
use crate::event::PushEvent;
use crate::server::error::{ApiError, ApiResult};

fn parse_event(body: &Bytes) -> ApiResult<PushEvent> {
    PushEvent::from_body(body).map_err(|e| {
        warn!(error = %e, "rejecting webhook payload");
        ApiError::BadRequest(format!("invalid push payload: {e}"))
    })
}

fn log_report(kind: &str, report: &DeployReport) {
    info!(
        kind,
        repo = %report.repository,
        projects = report.projects.len(),
        success = report.success(),
        "deployment request handled"
    );
}

/// POST {hooks}/redeploy
pub async fn redeploy(
    State(coordinator): State<Arc<Coordinator>>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let event = parse_event(&body)?;
    info!(repo = %event.repository_name(), "redeploy hook received");

    tokio::spawn(async move {
        let report = coordinator.redeploy(&event).await;
        log_report("redeploy", &report);
    });

    Ok(StatusCode::ACCEPTED)
}

/// POST {hooks}/restart
pub async fn restart(
    State(coordinator): State<Arc<Coordinator>>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let event = parse_event(&body)?;
    info!(repo = %event.repository_name(), "restart hook received");

    tokio::spawn(async move {
        let report = coordinator.restart(&event).await;
        log_report("restart", &report);
    });

    Ok(StatusCode::ACCEPTED)
}

/// POST {hooks}/reset
///
/// Kills every tracked process. Does not wait for a running deployment.
/// Always answers 200; a kill error is reported in `last_error`.
pub async fn reset(State(coordinator): State<Arc<Coordinator>>) -> Json<Value> {
    info!("reset hook received");

    let cleared = coordinator.context().registry.clear_all().await;
    let last_error = cleared.last_error.map(|e| e.to_string());

    Json(json!({ "killed": cleared.killed, "last_error": last_error }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
