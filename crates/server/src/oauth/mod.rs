//! OAuth connection coordinator.
//!
//! Owns the CSRF state tokens issued when an OAuth flow starts and consumed
//! exactly once when the provider calls back. State entries live in a TTL
//! cache; an expired or replayed token fails closed with
//! [`OAuthError::InvalidState`].

pub mod exchange;
pub mod hmac;

use std::time::Duration;

use moka::future::Cache;
use rand::Rng;
use thiserror::Error;

use orderflow_core::{AccountId, IntegrationId, StoreId};

pub use exchange::{TokenSet, exchange_etsy_code, exchange_shopify_code, exchange_ups_code};
pub use hmac::{verify_callback_hmac, verify_webhook_hmac};

/// How long an issued state token stays valid.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Errors raised while completing an OAuth flow.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The state token is unknown, expired, or already consumed.
    #[error("oauth state is invalid, expired, or already used")]
    InvalidState,

    /// The callback's shop does not match the shop the flow started for.
    #[error("oauth callback shop does not match the initiating shop")]
    ShopMismatch,

    /// The callback's HMAC signature failed verification.
    #[error("oauth callback hmac verification failed")]
    HmacVerificationFailed,

    /// The provider rejected the authorization-code exchange.
    #[error("token exchange failed ({status}): {body}")]
    TokenExchangeFailed { status: u16, body: String },

    /// Transport-level failure reaching the provider's token endpoint.
    #[error("token endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),
}

/// Context captured when an OAuth flow starts, returned when the state token
/// is consumed on callback.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub account_id: AccountId,
    pub store_id: StoreId,
    pub integration_id: IntegrationId,
    pub provider: String,
    /// Shop domain the flow was initiated for, when the provider echoes one
    /// back (Shopify). Checked against the callback to reject token swaps.
    pub shop_domain: Option<String>,
    /// PKCE code verifier for providers that require it (Etsy).
    pub code_verifier: Option<String>,
}

/// TTL-bounded, single-use store of in-flight OAuth states.
#[derive(Clone)]
pub struct OAuthStateStore {
    entries: Cache<String, PendingAuth>,
}

impl OAuthStateStore {
    /// Create a store with the default 10 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    /// Create a store with a custom TTL. Used by tests.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Issue a fresh state token bound to `pending`.
    pub async fn issue(&self, pending: PendingAuth) -> String {
        let token = generate_state_token();
        self.entries.insert(token.clone(), pending).await;
        token
    }

    /// Consume a state token, returning its context.
    ///
    /// The removal is atomic, so two concurrent callbacks presenting the same
    /// token cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidState`] when the token is unknown,
    /// expired, or was already consumed.
    pub async fn consume(&self, token: &str) -> Result<PendingAuth, OAuthError> {
        self.entries
            .remove(token)
            .await
            .ok_or(OAuthError::InvalidState)
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a cryptographically secure random state token.
fn generate_state_token() -> String {
    random_token(32)
}

/// Random alphanumeric token of the given length. Also used for PKCE code
/// verifiers.
pub(crate) fn random_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            char::from(CHARSET[idx])
        })
        .collect()
}
