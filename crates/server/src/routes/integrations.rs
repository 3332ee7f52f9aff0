//! Integration lifecycle and compliance routes.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{delete, post},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use orderflow_core::{
    AccountId, Integration, IntegrationConfig, IntegrationFeatures, IntegrationId,
    IntegrationStatus, IntegrationType, StoreId,
};

use crate::error::AppError;
use crate::oauth::verify_webhook_hmac;
use crate::state::AppState;
use crate::storage::Storage;
use crate::vault::{CredentialVault, Credentials};

/// Build the lifecycle router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/integrations/{provider}/connect", post(connect))
        .route("/integrations/{provider}/disconnect", post(disconnect))
        .route("/integrations/{provider}", delete(remove))
        .route(
            "/integrations/{provider}/gdpr/customers-data-request",
            post(gdpr_data_request),
        )
}

#[derive(Debug, Deserialize)]
struct ConnectBody {
    store_id: String,
    account_id: String,
    /// WooCommerce site URL.
    site_url: Option<String>,
    /// WooCommerce REST key pair.
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    /// USPS customer registration id and API key.
    crid: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConnectResponse {
    success: bool,
    integration_id: IntegrationId,
}

fn required(field: Option<String>, name: &str) -> Result<String, AppError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
}

/// POST /integrations/{provider}/connect - Save API-key credentials directly.
///
/// OAuth-less providers (WooCommerce REST keys, USPS API keys) are created
/// here: the secret half goes into the vault, the non-secret half onto the
/// persisted config. Reconnecting reuses the existing integration record so
/// the store never ends up with duplicates.
#[instrument(skip(state, body), fields(store_id = %body.store_id))]
async fn connect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<ConnectBody>,
) -> Result<Json<ConnectResponse>, AppError> {
    let provider = provider.to_ascii_lowercase();
    let store_id = StoreId::new(body.store_id);
    let account_id = AccountId::new(body.account_id);

    let (config, secret, integration_type, features) = match provider.as_str() {
        "woocommerce" => (
            IntegrationConfig::Woocommerce {
                site_url: required(body.site_url, "site_url")?,
                consumer_key: Some(required(body.consumer_key, "consumer_key")?),
                consumer_secret: None,
            },
            required(body.consumer_secret, "consumer_secret")?,
            IntegrationType::Ecommerce,
            IntegrationFeatures::ecommerce(),
        ),
        "usps" => (
            IntegrationConfig::Usps {
                crid: required(body.crid, "crid")?,
                api_key: None,
            },
            required(body.api_key, "api_key")?,
            IntegrationType::Shipping,
            IntegrationFeatures::shipping(),
        ),
        _ => {
            return Err(AppError::BadRequest(format!(
                "{provider} connects through its oauth flow"
            )));
        }
    };

    let id = match state.storage().find_integration(&store_id, &provider).await? {
        Some(existing) => existing.id,
        None => IntegrationId::new(uuid::Uuid::new_v4().to_string()),
    };

    state
        .vault()
        .set(&account_id, &id, Credentials::token(secret))
        .await;

    let integration = Integration {
        id: id.clone(),
        provider: provider.clone(),
        integration_type,
        status: IntegrationStatus::Connected,
        enabled: true,
        store_id,
        account_id,
        config,
        features,
        connected_at: Some(Utc::now()),
        last_sync_at: None,
    };
    state.storage().upsert_integration(integration).await?;

    tracing::info!(%provider, "integration connected with api credentials");
    Ok(Json(ConnectResponse {
        success: true,
        integration_id: id,
    }))
}

#[derive(Debug, Deserialize)]
struct DisconnectBody {
    store_id: String,
}

#[derive(Debug, Serialize)]
struct LifecycleResponse {
    success: bool,
}

/// POST /integrations/{provider}/disconnect - Disconnect without deleting.
///
/// Clears vault credentials and sensitive config fields; the integration
/// record and its synced data stay behind for a later reconnect.
#[instrument(skip(state, body), fields(store_id = %body.store_id))]
async fn disconnect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<DisconnectBody>,
) -> Result<Json<LifecycleResponse>, AppError> {
    let store_id = StoreId::new(body.store_id);
    let mut integration = state
        .storage()
        .find_integration(&store_id, &provider)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("integration {provider} for {store_id}")))?;

    state
        .vault()
        .clear(&integration.account_id, &integration.id)
        .await;
    integration.disconnect();
    state.storage().upsert_integration(integration).await?;

    tracing::info!(%provider, %store_id, "integration disconnected");
    Ok(Json(LifecycleResponse { success: true }))
}

#[derive(Debug, Deserialize)]
struct RemoveParams {
    store_id: String,
    /// Also delete orders/products sourced from this integration.
    #[serde(default)]
    cascade: bool,
}

/// DELETE /integrations/{provider} - Remove the integration entirely.
#[instrument(skip(state, params), fields(store_id = %params.store_id, cascade = params.cascade))]
async fn remove(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<RemoveParams>,
) -> Result<Json<LifecycleResponse>, AppError> {
    let store_id = StoreId::new(params.store_id);
    let integration = state
        .storage()
        .find_integration(&store_id, &provider)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("integration {provider} for {store_id}")))?;

    state
        .vault()
        .clear(&integration.account_id, &integration.id)
        .await;
    state
        .storage()
        .delete_integration(&integration.id, params.cascade)
        .await?;

    tracing::info!(%provider, %store_id, "integration deleted");
    Ok(Json(LifecycleResponse { success: true }))
}

#[derive(Debug, Deserialize)]
struct GdprRequestBody {
    store_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct GdprSnapshot {
    order_count: usize,
    product_count: usize,
    orders: Vec<orderflow_core::Order>,
    products: Vec<orderflow_core::Product>,
}

/// POST /integrations/{provider}/gdpr/customers-data-request
///
/// Compliance webhook: the provider signs the raw body with the app secret
/// and sends the digest base64-encoded in an `X-{Provider}-Hmac-Sha256`
/// header. A bad or missing signature is a 401 before the body is parsed.
#[instrument(skip(state, headers, body))]
async fn gdpr_data_request(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<GdprSnapshot>, AppError> {
    let provider = provider.to_ascii_lowercase();
    // Only Shopify delivers compliance webhooks today.
    let secret = match provider.as_str() {
        "shopify" => state
            .config()
            .shopify
            .as_ref()
            .map(|app| app.client_secret.expose_secret().to_string()),
        _ => None,
    }
    .ok_or_else(|| AppError::NotFound(format!("no compliance webhooks for {provider}")))?;

    let header_name = format!("x-{provider}-hmac-sha256");
    let provided = headers
        .get(&header_name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing hmac header".to_string()))?;

    if !verify_webhook_hmac(&body, provided, &secret) {
        tracing::warn!(%provider, "gdpr webhook hmac verification failed");
        return Err(AppError::Unauthorized(
            "hmac verification failed".to_string(),
        ));
    }

    let request: GdprRequestBody = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook body: {e}")))?;

    let (orders, products) = match request.store_id {
        Some(store_id) => {
            let store_id = StoreId::new(store_id);
            (
                state.storage().list_orders(&store_id).await?,
                state.storage().list_products(&store_id).await?,
            )
        }
        None => (Vec::new(), Vec::new()),
    };

    Ok(Json(GdprSnapshot {
        order_count: orders.len(),
        product_count: products.len(),
        orders,
        products,
    }))
}
