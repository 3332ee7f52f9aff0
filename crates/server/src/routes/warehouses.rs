//! Warehouse routing configuration routes.

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use tracing::instrument;

use orderflow_core::{RoutingMode, StoreId, WarehouseAssignment, WarehouseConfig};

use crate::error::AppError;
use crate::routing;
use crate::state::AppState;
use crate::storage::Storage;

/// Build the warehouse configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/stores/{store_id}/warehouse-config",
            get(get_config).put(set_config),
        )
        .route(
            "/stores/{store_id}/warehouses/auto-assign",
            post(auto_assign),
        )
}

/// GET /stores/{store_id}/warehouse-config
#[instrument(skip(state))]
async fn get_config(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<WarehouseConfig>, AppError> {
    let store_id = StoreId::new(store_id);
    let config = state
        .storage()
        .get_warehouse_config(&store_id)
        .await?
        .unwrap_or_else(|| WarehouseConfig::simple(None, None));
    Ok(Json(config))
}

/// PUT /stores/{store_id}/warehouse-config
#[instrument(skip(state, config))]
async fn set_config(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Json(config): Json<WarehouseConfig>,
) -> Result<Json<WarehouseConfig>, AppError> {
    let store_id = StoreId::new(store_id);
    state
        .storage()
        .set_warehouse_config(&store_id, config.clone())
        .await?;
    Ok(Json(config))
}

/// POST /stores/{store_id}/warehouses/auto-assign
///
/// Seed region assignments from the store's warehouses and switch the
/// config to advanced region routing.
#[instrument(skip(state))]
async fn auto_assign(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<Vec<WarehouseAssignment>>, AppError> {
    let store_id = StoreId::new(store_id);
    let warehouses = state.storage().list_warehouses(&store_id).await?;
    if warehouses.iter().all(|w| !w.active) {
        return Err(AppError::BadRequest(
            "store has no active warehouses".to_string(),
        ));
    }

    let assignments = routing::auto_assign(&warehouses);

    let mut config = state
        .storage()
        .get_warehouse_config(&store_id)
        .await?
        .unwrap_or_else(|| WarehouseConfig::simple(None, None));
    config.mode = RoutingMode::Advanced;
    config.enable_region_routing = true;
    config.assignments.clone_from(&assignments);
    state.storage().set_warehouse_config(&store_id, config).await?;

    Ok(Json(assignments))
}
