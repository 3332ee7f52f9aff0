//! OAuth connect/callback routes.
//!
//! `GET /auth/{provider}/connect` starts a flow: it issues a CSRF state
//! token, stashes the flow context, and redirects to the provider's
//! authorization page. `GET /auth/{provider}/callback` (POST delegates to
//! the same logic) completes it: signature and state checks, code exchange,
//! credentials into the vault, integration record upserted. Every outcome
//! redirects back to the dashboard with `{provider}_success=true` or
//! `{provider}_error=<code>`, and transient cookies are cleared on success
//! and failure alike.

use std::collections::HashMap;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::instrument;
use url::Url;

use orderflow_core::{
    AccountId, Integration, IntegrationConfig, IntegrationFeatures, IntegrationId,
    IntegrationStatus, IntegrationType, StoreId,
};

use crate::oauth::{
    self, PendingAuth, exchange_etsy_code, exchange_shopify_code, exchange_ups_code,
    verify_callback_hmac,
};
use crate::state::AppState;
use crate::storage::Storage;
use crate::vault::CredentialVault;

/// Scopes requested from Shopify stores.
const SHOPIFY_SCOPES: &str = "read_orders,read_products,read_fulfillments";

/// Scopes requested from Etsy shops.
const ETSY_SCOPES: &str = "transactions_r listings_r";

/// Transient cookies set by the UPS connect handler.
const UPS_STATE_COOKIE: &str = "ups_oauth_state";
const UPS_ACCOUNT_COOKIE: &str = "ups_account_number";
const UPS_ENVIRONMENT_COOKIE: &str = "ups_environment";

/// Build the OAuth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/{provider}/connect", get(connect))
        .route("/auth/{provider}/callback", get(callback).post(callback))
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    store_id: String,
    account_id: String,
    /// Shopify shop domain or Etsy shop id, depending on the provider.
    shop: Option<String>,
    /// UPS shipper account number.
    account_number: Option<String>,
    /// UPS carrier environment ("production" or "sandbox").
    environment: Option<String>,
}

fn success_redirect(state: &AppState, provider: &str) -> Redirect {
    Redirect::to(&format!(
        "{}?{provider}_success=true",
        state.config().dashboard_url
    ))
}

fn error_redirect(state: &AppState, provider: &str, code: &str) -> Redirect {
    Redirect::to(&format!(
        "{}?{provider}_error={code}",
        state.config().dashboard_url
    ))
}

fn clear_transient(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::from(UPS_STATE_COOKIE))
        .remove(Cookie::from(UPS_ACCOUNT_COOKIE))
        .remove(Cookie::from(UPS_ENVIRONMENT_COOKIE))
}

/// Reuse the id of an existing integration for this `(store, provider)` so
/// reconnecting does not duplicate records.
async fn integration_id_for(
    state: &AppState,
    store_id: &StoreId,
    provider: &str,
) -> IntegrationId {
    match state.storage().find_integration(store_id, provider).await {
        Ok(Some(existing)) => existing.id,
        _ => IntegrationId::new(uuid::Uuid::new_v4().to_string()),
    }
}

/// GET /auth/{provider}/connect - Start an OAuth flow.
#[instrument(skip(state, jar, params), fields(store_id = %params.store_id))]
async fn connect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(params): Query<ConnectParams>,
) -> Response {
    let provider = provider.to_ascii_lowercase();
    let store_id = StoreId::new(params.store_id.clone());
    let account_id = AccountId::new(params.account_id.clone());
    let integration_id = integration_id_for(&state, &store_id, &provider).await;
    let redirect_uri = state.config().callback_url(&provider);

    match provider.as_str() {
        "shopify" => {
            let Some(app) = &state.config().shopify else {
                return error_redirect(&state, &provider, "not_configured").into_response();
            };
            let Some(shop) = params.shop else {
                return error_redirect(&state, &provider, "missing_shop").into_response();
            };

            let token = state
                .oauth_states()
                .issue(PendingAuth {
                    account_id,
                    store_id,
                    integration_id,
                    provider: provider.clone(),
                    shop_domain: Some(shop.clone()),
                    code_verifier: None,
                })
                .await;

            let Ok(mut auth_url) = Url::parse(&format!("https://{shop}/admin/oauth/authorize"))
            else {
                return error_redirect(&state, &provider, "invalid_shop").into_response();
            };
            auth_url
                .query_pairs_mut()
                .append_pair("client_id", &app.client_id)
                .append_pair("scope", SHOPIFY_SCOPES)
                .append_pair("redirect_uri", &redirect_uri)
                .append_pair("state", &token);
            Redirect::to(auth_url.as_str()).into_response()
        }
        "etsy" => {
            let Some(app) = &state.config().etsy else {
                return error_redirect(&state, &provider, "not_configured").into_response();
            };
            let Some(shop) = params.shop else {
                return error_redirect(&state, &provider, "missing_shop").into_response();
            };

            let code_verifier = oauth::random_token(64);
            let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));

            let token = state
                .oauth_states()
                .issue(PendingAuth {
                    account_id,
                    store_id,
                    integration_id,
                    provider: provider.clone(),
                    shop_domain: Some(shop),
                    code_verifier: Some(code_verifier),
                })
                .await;

            let Ok(mut auth_url) = Url::parse("https://www.etsy.com/oauth/connect") else {
                return error_redirect(&state, &provider, "oauth_failed").into_response();
            };
            auth_url
                .query_pairs_mut()
                .append_pair("response_type", "code")
                .append_pair("client_id", &app.client_id)
                .append_pair("redirect_uri", &redirect_uri)
                .append_pair("scope", ETSY_SCOPES)
                .append_pair("state", &token)
                .append_pair("code_challenge", &challenge)
                .append_pair("code_challenge_method", "S256");
            Redirect::to(auth_url.as_str()).into_response()
        }
        "ups" => {
            if state.config().ups.is_none() {
                return error_redirect(&state, &provider, "not_configured").into_response();
            }
            let Some(account_number) = params.account_number else {
                return error_redirect(&state, &provider, "missing_account_number")
                    .into_response();
            };
            let environment = params
                .environment
                .unwrap_or_else(|| "production".to_string());

            let token = state
                .oauth_states()
                .issue(PendingAuth {
                    account_id,
                    store_id,
                    integration_id,
                    provider: provider.clone(),
                    shop_domain: None,
                    code_verifier: None,
                })
                .await;

            let host = if environment.eq_ignore_ascii_case("production") {
                "https://onlinetools.ups.com"
            } else {
                "https://wwwcie.ups.com"
            };
            let client_id = state
                .config()
                .ups
                .as_ref()
                .map(|app| app.client_id.clone())
                .unwrap_or_default();
            let Ok(mut auth_url) = Url::parse(&format!("{host}/security/v1/oauth/authorize"))
            else {
                return error_redirect(&state, &provider, "oauth_failed").into_response();
            };
            auth_url
                .query_pairs_mut()
                .append_pair("client_id", &client_id)
                .append_pair("redirect_uri", &redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("state", &token);

            let jar = jar
                .add(Cookie::new(UPS_STATE_COOKIE, token))
                .add(Cookie::new(UPS_ACCOUNT_COOKIE, account_number))
                .add(Cookie::new(UPS_ENVIRONMENT_COOKIE, environment));
            (jar, Redirect::to(auth_url.as_str())).into_response()
        }
        _ => {
            tracing::warn!(%provider, "oauth connect for unknown provider");
            error_redirect(&state, &provider, "unknown_provider").into_response()
        }
    }
}

/// GET/POST /auth/{provider}/callback - Complete an OAuth flow.
#[instrument(skip(state, jar, params))]
async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let provider = provider.to_ascii_lowercase();
    // Cookies are transient: cleared on every outcome.
    let cleared = clear_transient(jar.clone());

    if let Some(error) = params.get("error") {
        tracing::warn!(%provider, %error, "provider reported an oauth error");
        return (cleared, error_redirect(&state, &provider, "oauth_denied")).into_response();
    }

    let result = match provider.as_str() {
        "shopify" => shopify_callback(&state, &params).await,
        "etsy" => etsy_callback(&state, &params).await,
        "ups" => ups_callback(&state, &jar, &params).await,
        _ => {
            tracing::warn!(%provider, "oauth callback for unknown provider");
            Err("unknown_provider")
        }
    };

    match result {
        Ok(()) => (cleared, success_redirect(&state, &provider)).into_response(),
        Err(code) => (cleared, error_redirect(&state, &provider, code)).into_response(),
    }
}

async fn shopify_callback(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<(), &'static str> {
    let Some(app) = &state.config().shopify else {
        return Err("not_configured");
    };

    // Verify the HMAC signature before touching anything else.
    let pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let provided_hmac = params.get("hmac").ok_or("oauth_invalid_hmac")?;
    if !verify_callback_hmac(&pairs, provided_hmac, app.client_secret.expose_secret()) {
        tracing::error!("invalid hmac signature in oauth callback");
        return Err("oauth_invalid_hmac");
    }

    let code = params.get("code").ok_or("oauth_failed")?;
    let state_token = params.get("state").ok_or("oauth_failed")?;

    let pending = state
        .oauth_states()
        .consume(state_token)
        .await
        .map_err(|_| "oauth_invalid_state")?;

    // The callback must come back for the shop the flow started for.
    let shop = params.get("shop").ok_or("oauth_failed")?;
    if pending.shop_domain.as_deref() != Some(shop.as_str()) {
        tracing::error!(%shop, "oauth callback shop mismatch");
        return Err("oauth_shop_mismatch");
    }

    let tokens = exchange_shopify_code(
        state.http_client(),
        shop,
        &app.client_id,
        &app.client_secret,
        code,
    )
    .await
    .map_err(|error| {
        tracing::error!(%error, "shopify code exchange failed");
        "oauth_exchange_failed"
    })?;

    state
        .vault()
        .set(
            &pending.account_id,
            &pending.integration_id,
            tokens.into_credentials(),
        )
        .await;

    let integration = Integration {
        id: pending.integration_id,
        provider: "shopify".to_string(),
        integration_type: IntegrationType::Ecommerce,
        status: IntegrationStatus::Connected,
        enabled: true,
        store_id: pending.store_id,
        account_id: pending.account_id,
        config: IntegrationConfig::Shopify {
            shop_domain: shop.clone(),
            access_token: None,
        },
        features: IntegrationFeatures::ecommerce(),
        connected_at: Some(Utc::now()),
        last_sync_at: None,
    };
    state
        .storage()
        .upsert_integration(integration)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to save integration");
            "oauth_save_failed"
        })?;

    tracing::info!(%shop, "connected shopify store");
    Ok(())
}

async fn etsy_callback(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<(), &'static str> {
    let Some(app) = &state.config().etsy else {
        return Err("not_configured");
    };

    let code = params.get("code").ok_or("oauth_failed")?;
    let state_token = params.get("state").ok_or("oauth_failed")?;

    let pending = state
        .oauth_states()
        .consume(state_token)
        .await
        .map_err(|_| "oauth_invalid_state")?;
    let code_verifier = pending.code_verifier.as_deref().ok_or("oauth_failed")?;
    let shop_id = pending.shop_domain.clone().ok_or("oauth_failed")?;

    let tokens = exchange_etsy_code(
        state.http_client(),
        &app.client_id,
        &state.config().callback_url("etsy"),
        code,
        code_verifier,
    )
    .await
    .map_err(|error| {
        tracing::error!(%error, "etsy code exchange failed");
        "oauth_exchange_failed"
    })?;

    state
        .vault()
        .set(
            &pending.account_id,
            &pending.integration_id,
            tokens.into_credentials(),
        )
        .await;

    let integration = Integration {
        id: pending.integration_id,
        provider: "etsy".to_string(),
        integration_type: IntegrationType::Ecommerce,
        status: IntegrationStatus::Connected,
        enabled: true,
        store_id: pending.store_id,
        account_id: pending.account_id,
        config: IntegrationConfig::Etsy {
            shop_id,
            access_token: None,
            refresh_token: None,
        },
        features: IntegrationFeatures::ecommerce(),
        connected_at: Some(Utc::now()),
        last_sync_at: None,
    };
    state
        .storage()
        .upsert_integration(integration)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to save integration");
            "oauth_save_failed"
        })?;

    Ok(())
}

async fn ups_callback(
    state: &AppState,
    jar: &CookieJar,
    params: &HashMap<String, String>,
) -> Result<(), &'static str> {
    let Some(app) = &state.config().ups else {
        return Err("not_configured");
    };

    let code = params.get("code").ok_or("oauth_failed")?;
    let state_token = params.get("state").ok_or("oauth_failed")?;

    // UPS flows double-check the state against the cookie set at initiation.
    let cookie_state = jar.get(UPS_STATE_COOKIE).map(Cookie::value);
    if cookie_state != Some(state_token.as_str()) {
        tracing::error!("ups oauth state cookie mismatch");
        return Err("oauth_invalid_state");
    }

    let pending = state
        .oauth_states()
        .consume(state_token)
        .await
        .map_err(|_| "oauth_invalid_state")?;

    let account_number = jar
        .get(UPS_ACCOUNT_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or("oauth_failed")?;
    let environment = jar
        .get(UPS_ENVIRONMENT_COOKIE)
        .map_or_else(|| "production".to_string(), |c| c.value().to_string());

    let tokens = exchange_ups_code(
        state.http_client(),
        &environment,
        &app.client_id,
        &app.client_secret,
        &state.config().callback_url("ups"),
        code,
    )
    .await
    .map_err(|error| {
        tracing::error!(%error, "ups code exchange failed");
        "oauth_exchange_failed"
    })?;

    state
        .vault()
        .set(
            &pending.account_id,
            &pending.integration_id,
            tokens.into_credentials(),
        )
        .await;

    let integration = Integration {
        id: pending.integration_id,
        provider: "ups".to_string(),
        integration_type: IntegrationType::Shipping,
        status: IntegrationStatus::Connected,
        enabled: true,
        store_id: pending.store_id,
        account_id: pending.account_id,
        config: IntegrationConfig::Ups {
            account_number,
            environment,
            access_token: None,
            refresh_token: None,
        },
        features: IntegrationFeatures::shipping(),
        connected_at: Some(Utc::now()),
        last_sync_at: None,
    };
    state
        .storage()
        .upsert_integration(integration)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to save integration");
            "oauth_save_failed"
        })?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use hmac::{Hmac, Mac};
    use secrecy::SecretString;

    use crate::config::{ServerConfig, ShopifyAppConfig};
    use crate::storage::{MemoryStorage, Storage};
    use crate::vault::MemoryVault;

    use super::*;

    const CLIENT_SECRET: &str = "shpss_route_test_secret";

    fn test_state() -> AppState {
        let config = ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: "https://app.test".to_string(),
            dashboard_url: "https://dash.test".to_string(),
            shopify: Some(ShopifyAppConfig {
                client_id: "client-id".to_string(),
                client_secret: SecretString::from(CLIENT_SECRET),
            }),
            etsy: None,
            ups: None,
            sentry_dsn: None,
            sentry_environment: None,
        };
        AppState::new(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryVault::new()),
        )
    }

    /// Signs params the way Shopify does: sorted `key=value` pairs joined
    /// with `&`, excluding the `hmac` param itself.
    fn sign(params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> =
            params.iter().filter(|(k, _)| *k != "hmac").collect();
        sorted.sort();
        let message = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut mac = Hmac::<Sha256>::new_from_slice(CLIENT_SECRET.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn params_map(params: &[(&str, &str)], hmac: &str) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        map.insert("hmac".to_string(), hmac.to_string());
        map
    }

    async fn run_callback(state: AppState, params: HashMap<String, String>) -> Response {
        callback(
            State(state),
            Path("shopify".to_string()),
            CookieJar::new(),
            Query(params),
        )
        .await
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(axum::http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn test_callback_with_unknown_state_redirects_without_exchanging() {
        let state = test_state();
        let params = [
            ("code", "auth-code"),
            ("shop", "demo.myshopify.com"),
            ("state", "never-issued"),
        ];
        let signature = sign(&params);

        let response = run_callback(state.clone(), params_map(&params, &signature)).await;

        assert!(location(&response).contains("shopify_error=oauth_invalid_state"));
        let saved = state
            .storage()
            .find_integration(&StoreId::new("store-1"), "shopify")
            .await
            .unwrap();
        assert!(saved.is_none(), "no integration may be created");
    }

    #[tokio::test]
    async fn test_callback_with_bad_signature_is_rejected_before_state_lookup() {
        let state = test_state();
        let token = state
            .oauth_states()
            .issue(PendingAuth {
                account_id: AccountId::new("acct-1"),
                store_id: StoreId::new("store-1"),
                integration_id: IntegrationId::new("int-1"),
                provider: "shopify".to_string(),
                shop_domain: Some("demo.myshopify.com".to_string()),
                code_verifier: None,
            })
            .await;
        let params = [
            ("code", "auth-code"),
            ("shop", "demo.myshopify.com"),
            ("state", token.as_str()),
        ];

        let response =
            run_callback(state.clone(), params_map(&params, "deadbeef")).await;
        assert!(location(&response).contains("shopify_error=oauth_invalid_hmac"));

        // The state token was never consumed, so it is still redeemable.
        assert!(state.oauth_states().consume(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_provider_reported_error_short_circuits() {
        let state = test_state();
        let mut params = HashMap::new();
        params.insert("error".to_string(), "access_denied".to_string());

        let response = run_callback(state, params).await;
        assert!(location(&response).contains("shopify_error=oauth_denied"));
    }
}
