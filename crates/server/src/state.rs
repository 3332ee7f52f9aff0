//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::integrations::AdapterRegistry;
use crate::oauth::OAuthStateStore;
use crate::storage::Storage;
use crate::sync::{SyncGate, SyncOrchestrator};
use crate::vault::CredentialVault;

/// HTTP client timeout for outbound platform/carrier calls.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    storage: Arc<dyn Storage>,
    vault: Arc<dyn CredentialVault>,
    registry: Arc<AdapterRegistry>,
    oauth_states: OAuthStateStore,
    orchestrator: SyncOrchestrator,
    http_client: reqwest::Client,
}

impl AppState {
    /// Assemble the state graph from its leaf services.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized for the outbound
    /// HTTP client; this is a startup-time failure.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        vault: Arc<dyn CredentialVault>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .expect("failed to build http client");

        let registry = Arc::new(AdapterRegistry::new(
            http_client.clone(),
            config.etsy.as_ref().map(|etsy| etsy.client_id.clone()),
        ));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&storage),
            Arc::clone(&vault),
            Arc::clone(&registry),
            SyncGate::new(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                vault,
                registry,
                oauth_states: OAuthStateStore::new(),
                orchestrator,
                http_client,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    #[must_use]
    pub fn vault(&self) -> &Arc<dyn CredentialVault> {
        &self.inner.vault
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.inner.registry
    }

    #[must_use]
    pub fn oauth_states(&self) -> &OAuthStateStore {
        &self.inner.oauth_states
    }

    #[must_use]
    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.inner.orchestrator
    }

    #[must_use]
    pub fn http_client(&self) -> &reqwest::Client {
        &self.inner.http_client
    }
}
