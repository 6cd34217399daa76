//! Status endpoint for external monitoring.
//!
//! A single unauthenticated, read-only route: `GET /health` returns the
//! launcher's current `HealthState` as JSON.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::watch;

use crate::health::{HealthState, HealthView};

async fn health(State(view): State<HealthView>) -> Json<HealthState> {
    let state = view.current();
    log::debug!("[HTTP] GET /health -> {}", state.status());
    Json(state)
}

/// Build the status router.
pub fn health_router(view: HealthView) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(view)
}

/// Serve `/health` on `0.0.0.0:<port>` until `shutdown_rx` fires.
pub async fn run_health_server(
    view: HealthView,
    port: u16,
    mut shutdown_rx: watch::Receiver<()>,
) -> std::io::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on port {}", port);

    axum::serve(listener, health_router(view))
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await?;

    log::info!("Health server stopped.");
    Ok(())
}
