//! HTTP route handlers.

pub mod integrations;
pub mod oauth;
pub mod sync;
pub mod warehouses;

use axum::{Router, http::StatusCode, routing::get};

use crate::state::AppState;

/// Build the full application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(oauth::router())
        .merge(sync::router())
        .merge(integrations::router())
        .merge(warehouses::router())
}

/// Liveness probe.
async fn health() -> &'static str {
    "OK"
}

/// Readiness probe: storage must answer before we accept traffic.
async fn readiness(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<&'static str, StatusCode> {
    state
        .storage()
        .list_warehouses(&orderflow_core::StoreId::new("readiness-probe"))
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok("READY")
}
