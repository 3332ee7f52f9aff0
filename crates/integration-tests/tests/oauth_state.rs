//! OAuth callback verification scenarios: CSRF state lifecycle plus the two
//! HMAC schemes (query-parameter callbacks and raw-body webhooks) checked
//! against signatures computed the way the platform computes them.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use orderflow_core::{AccountId, IntegrationId, StoreId};
use orderflow_server::oauth::{
    OAuthError, OAuthStateStore, PendingAuth, verify_callback_hmac, verify_webhook_hmac,
};

fn pending() -> PendingAuth {
    PendingAuth {
        account_id: AccountId::new("acct-1"),
        store_id: StoreId::new("store-1"),
        integration_id: IntegrationId::new("int-shopify"),
        provider: "shopify".to_string(),
        shop_domain: Some("demo.myshopify.com".to_string()),
        code_verifier: None,
    }
}

/// Sign sorted `key=value` pairs the way the platform signs callback URLs.
fn platform_callback_signature(params: &[(String, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params
        .iter()
        .filter(|(k, _)| k != "hmac" && k != "signature")
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let message = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn params(code: &str, state: &str) -> Vec<(String, String)> {
    vec![
        ("code".to_string(), code.to_string()),
        ("shop".to_string(), "demo.myshopify.com".to_string()),
        ("state".to_string(), state.to_string()),
        ("timestamp".to_string(), "1717243200".to_string()),
    ]
}

#[tokio::test]
async fn callback_with_valid_state_and_signature_is_accepted() {
    let store = OAuthStateStore::new();
    let secret = "app-secret";

    let state = store.issue(pending()).await;
    let mut query = params("auth-code", &state);
    let signature = platform_callback_signature(&query, secret);
    query.push(("hmac".to_string(), signature.clone()));

    assert!(verify_callback_hmac(&query, &signature, secret));

    let resolved = store.consume(&state).await.unwrap();
    assert_eq!(resolved.shop_domain.as_deref(), Some("demo.myshopify.com"));
}

#[tokio::test]
async fn replayed_callback_is_rejected() {
    let store = OAuthStateStore::new();
    let state = store.issue(pending()).await;

    assert!(store.consume(&state).await.is_ok());
    assert!(matches!(
        store.consume(&state).await,
        Err(OAuthError::InvalidState)
    ));
}

#[tokio::test]
async fn concurrent_callbacks_consume_the_state_exactly_once() {
    let store = OAuthStateStore::new();
    let state = store.issue(pending()).await;

    let (a, b) = tokio::join!(store.consume(&state), store.consume(&state));
    let successes = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn expired_state_is_rejected() {
    let store = OAuthStateStore::with_ttl(Duration::from_millis(20));
    let state = store.issue(pending()).await;

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(matches!(
        store.consume(&state).await,
        Err(OAuthError::InvalidState)
    ));
}

#[test]
fn tampered_callback_parameters_fail_verification() {
    let secret = "app-secret";
    let query = params("auth-code", "state-token");
    let signature = platform_callback_signature(&query, secret);

    let mut tampered = params("attacker-code", "state-token");
    tampered.push(("hmac".to_string(), signature.clone()));

    assert!(!verify_callback_hmac(&tampered, &signature, secret));
}

#[test]
fn callback_signature_ignores_the_hmac_parameter_itself() {
    let secret = "app-secret";
    let mut query = params("auth-code", "state-token");
    let signature = platform_callback_signature(&query, secret);
    query.push(("hmac".to_string(), signature.clone()));
    query.push(("signature".to_string(), "legacy".to_string()));

    assert!(verify_callback_hmac(&query, &signature, secret));
}

#[test]
fn webhook_body_signature_roundtrip() {
    let secret = "app-secret";
    let body = br#"{"store_id":"store-1"}"#;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    let digest = STANDARD.encode(mac.finalize().into_bytes());

    assert!(verify_webhook_hmac(body, &digest, secret));
    assert!(!verify_webhook_hmac(b"{}", &digest, secret));
    assert!(!verify_webhook_hmac(body, "not-base64!!", secret));
}
