//! Authorization-code exchange against provider token endpoints.
//!
//! Each provider speaks a slightly different dialect: Shopify takes JSON at
//! the shop's own domain, Etsy is form-encoded with PKCE, UPS wants HTTP
//! basic client auth against an environment-specific host. All of them fold
//! into a [`TokenSet`] for the vault.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use crate::vault::Credentials;

use super::OAuthError;

/// Tokens returned by a successful exchange.
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Convert into vault credentials, stamping the obtained-at instant.
    #[must_use]
    pub fn into_credentials(self) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            obtained_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    /// Lifetime in seconds; absent for non-expiring tokens (Shopify).
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token_set(self) -> TokenSet {
        TokenSet {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at: self
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
        }
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenSet, OAuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OAuthError::TokenExchangeFailed {
            status: status.as_u16(),
            body,
        });
    }
    let parsed: TokenResponse = response.json().await?;
    Ok(parsed.into_token_set())
}

/// Exchange a Shopify authorization code for a permanent access token.
///
/// # Errors
///
/// Returns [`OAuthError::TokenExchangeFailed`] with the raw response body
/// when Shopify answers with a non-success status.
#[instrument(skip(client, client_secret, code))]
pub async fn exchange_shopify_code(
    client: &reqwest::Client,
    shop_domain: &str,
    client_id: &str,
    client_secret: &SecretString,
    code: &str,
) -> Result<TokenSet, OAuthError> {
    let response = client
        .post(format!("https://{shop_domain}/admin/oauth/access_token"))
        .json(&serde_json::json!({
            "client_id": client_id,
            "client_secret": client_secret.expose_secret(),
            "code": code,
        }))
        .send()
        .await?;
    read_token_response(response).await
}

/// Exchange an Etsy authorization code (PKCE flow) for access and refresh
/// tokens.
///
/// # Errors
///
/// Returns [`OAuthError::TokenExchangeFailed`] with the raw response body
/// when Etsy answers with a non-success status.
#[instrument(skip(client, code, code_verifier))]
pub async fn exchange_etsy_code(
    client: &reqwest::Client,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    code_verifier: &str,
) -> Result<TokenSet, OAuthError> {
    let response = client
        .post("https://api.etsy.com/v3/public/oauth/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("code", code),
            ("code_verifier", code_verifier),
        ])
        .send()
        .await?;
    read_token_response(response).await
}

/// Exchange a UPS authorization code for access and refresh tokens.
///
/// The token endpoint host follows the carrier environment, same as API
/// calls.
///
/// # Errors
///
/// Returns [`OAuthError::TokenExchangeFailed`] with the raw response body
/// when UPS answers with a non-success status.
#[instrument(skip(client, client_secret, code))]
pub async fn exchange_ups_code(
    client: &reqwest::Client,
    environment: &str,
    client_id: &str,
    client_secret: &SecretString,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenSet, OAuthError> {
    let host = if environment.eq_ignore_ascii_case("production") {
        "https://onlinetools.ups.com"
    } else {
        "https://wwwcie.ups.com"
    };
    let response = client
        .post(format!("{host}/security/v1/oauth/token"))
        .basic_auth(client_id, Some(client_secret.expose_secret()))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await?;
    read_token_response(response).await
}
