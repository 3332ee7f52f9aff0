//! Credential vault for per-account, per-integration secrets.
//!
//! Stores OAuth tokens and API keys keyed by `(account_id, integration_id)`.
//! Writes are last-writer-wins per key; callers serialize writes per key via
//! the at-most-one-in-flight-sync rule enforced by the sync gate.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::RwLock;

use orderflow_core::{AccountId, IntegrationId};

/// Credentials held for one integration.
///
/// Implements `Debug` manually to redact token material.
#[derive(Clone)]
pub struct Credentials {
    /// Primary access token or API key.
    pub access_token: SecretString,
    /// Refresh token, if the platform issues one.
    pub refresh_token: Option<SecretString>,
    /// When the access token expires, if known.
    pub expires_at: Option<DateTime<Utc>>,
    /// When these credentials were obtained.
    pub obtained_at: DateTime<Utc>,
}

impl Credentials {
    /// Credentials consisting of a single non-expiring token.
    #[must_use]
    pub fn token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            expires_at: None,
            obtained_at: Utc::now(),
        }
    }

    /// Whether the access token is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Vault interface consumed by the OAuth coordinator and sync orchestrator.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Fetch credentials, or `None` if the integration was never connected
    /// (or has been disconnected).
    async fn get(
        &self,
        account_id: &AccountId,
        integration_id: &IntegrationId,
    ) -> Option<Credentials>;

    /// Store credentials, replacing any previous entry for the key.
    async fn set(
        &self,
        account_id: &AccountId,
        integration_id: &IntegrationId,
        credentials: Credentials,
    );

    /// Remove credentials. Used on disconnect.
    async fn clear(&self, account_id: &AccountId, integration_id: &IntegrationId);
}

/// In-memory vault implementation.
#[derive(Default)]
pub struct MemoryVault {
    entries: RwLock<HashMap<(AccountId, IntegrationId), Credentials>>,
}

impl MemoryVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn get(
        &self,
        account_id: &AccountId,
        integration_id: &IntegrationId,
    ) -> Option<Credentials> {
        let entries = self.entries.read().await;
        entries
            .get(&(account_id.clone(), integration_id.clone()))
            .cloned()
    }

    async fn set(
        &self,
        account_id: &AccountId,
        integration_id: &IntegrationId,
        credentials: Credentials,
    ) {
        let mut entries = self.entries.write().await;
        entries.insert((account_id.clone(), integration_id.clone()), credentials);
    }

    async fn clear(&self, account_id: &AccountId, integration_id: &IntegrationId) {
        let mut entries = self.entries.write().await;
        entries.remove(&(account_id.clone(), integration_id.clone()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[tokio::test]
    async fn test_set_get_clear() {
        let vault = MemoryVault::new();
        let account = AccountId::new("a1");
        let integration = IntegrationId::new("i1");

        assert!(vault.get(&account, &integration).await.is_none());

        vault
            .set(&account, &integration, Credentials::token("shpat_abc"))
            .await;
        let creds = vault.get(&account, &integration).await.unwrap();
        assert_eq!(creds.access_token.expose_secret(), "shpat_abc");

        vault.clear(&account, &integration).await;
        assert!(vault.get(&account, &integration).await.is_none());
    }

    #[tokio::test]
    async fn test_set_is_last_writer_wins() {
        let vault = MemoryVault::new();
        let account = AccountId::new("a1");
        let integration = IntegrationId::new("i1");

        vault
            .set(&account, &integration, Credentials::token("old"))
            .await;
        vault
            .set(&account, &integration, Credentials::token("new"))
            .await;

        let creds = vault.get(&account, &integration).await.unwrap();
        assert_eq!(creds.access_token.expose_secret(), "new");
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let creds = Credentials::token("super-secret-token");
        let output = format!("{creds:?}");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("super-secret-token"));
    }

    #[test]
    fn test_expiry() {
        let mut creds = Credentials::token("t");
        assert!(!creds.is_expired());
        creds.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(creds.is_expired());
    }
}
