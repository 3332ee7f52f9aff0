//! Sync trigger route.

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use orderflow_core::{StoreId, SyncType, WarehouseId};

use crate::error::AppError;
use crate::state::AppState;
use crate::storage::Storage;
use crate::sync::{SyncOutcome, SyncRequest};

/// Build the sync router.
pub fn router() -> Router<AppState> {
    Router::new().route("/integrations/{provider}/sync", post(trigger_sync))
}

#[derive(Debug, Deserialize)]
struct SyncBody {
    store_id: String,
    account_id: String,
    sync_type: SyncType,
    #[serde(default)]
    force_full_sync: bool,
    warehouse_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_count: Option<usize>,
    is_incremental: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<SyncOutcome> for SyncResponse {
    fn from(outcome: SyncOutcome) -> Self {
        let error = outcome
            .orders
            .as_ref()
            .and_then(|r| r.error.clone())
            .or_else(|| outcome.products.as_ref().and_then(|r| r.error.clone()));
        Self {
            success: outcome.is_complete(),
            order_count: outcome.orders.as_ref().map(|r| r.fetched),
            product_count: outcome.products.as_ref().map(|r| r.fetched),
            is_incremental: outcome.is_incremental,
            error,
        }
    }
}

/// POST /integrations/{provider}/sync - Run a sync for one integration.
#[instrument(skip(state, body), fields(store_id = %body.store_id, sync_type = ?body.sync_type))]
async fn trigger_sync(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<SyncBody>,
) -> Result<Json<SyncResponse>, AppError> {
    let store_id = StoreId::new(body.store_id);
    let integration = state
        .storage()
        .find_integration(&store_id, &provider)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("integration {provider} for {store_id}")))?;

    if integration.account_id.as_str() != body.account_id {
        return Err(AppError::Unauthorized(
            "integration belongs to a different account".to_string(),
        ));
    }

    let request = SyncRequest {
        sync_type: body.sync_type,
        force_full_sync: body.force_full_sync,
        warehouse_id: body.warehouse_id.map(WarehouseId::new),
    };

    let outcome = state.orchestrator().run_sync(&integration, &request).await?;
    Ok(Json(outcome.into()))
}
