// src/server/mod.rs

//! HTTP front end (axum).

pub mod error;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::coordinator::Coordinator;
use crate::errors::Result;

/// Build the router: webhook routes under `[server].hooks_path`, plus
/// `/health`.
pub fn create_router(coordinator: Arc<Coordinator>) -> Router {
    let hooks_path = coordinator
        .context()
        .config
        .server
        .hooks_path
        .trim_end_matches('/')
        .to_string();

    let hooks = Router::new()
        .route("/redeploy", post(handlers::redeploy))
        .route("/restart", post(handlers::restart))
        .route("/reset", post(handlers::reset));

    let router = Router::new().route("/health", get(handlers::health));
    let router = if hooks_path.is_empty() {
        router.merge(hooks)
    } else {
        router.nest(&hooks_path, hooks)
    };

    router
        .with_state(coordinator)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(coordinator: Arc<Coordinator>, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening for webhooks");
    }

    axum::serve(listener, create_router(coordinator))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
