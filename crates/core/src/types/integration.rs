//! Integration records and their provider-specific configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AccountId, IntegrationId, StoreId};
use super::status::{IntegrationStatus, IntegrationType};

/// A connected carrier or e-commerce platform for one store.
///
/// Created on the first successful OAuth flow or config save. Never
/// hard-deleted while orders reference it; disconnecting clears the sensitive
/// config fields instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    /// Provider name as registered with the adapter registry (e.g. "shopify").
    pub provider: String,
    pub integration_type: IntegrationType,
    pub status: IntegrationStatus,
    pub enabled: bool,
    pub store_id: StoreId,
    pub account_id: AccountId,
    /// Provider-specific configuration. The shape is a tagged union keyed by
    /// provider, never duck-typed.
    pub config: IntegrationConfig,
    pub features: IntegrationFeatures,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Integration {
    /// Disconnect this integration in place.
    ///
    /// Clears sensitive config fields, marks the integration disconnected,
    /// and disables it. The record itself is retained so orders keep a valid
    /// integration reference.
    pub fn disconnect(&mut self) {
        self.config.clear_secrets();
        self.status = IntegrationStatus::Disconnected;
        self.enabled = false;
    }
}

/// Provider-specific credentials and endpoints.
///
/// Access tokens here mirror what the credential vault holds so a persisted
/// integration record is self-describing; `clear_secrets` removes them on
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum IntegrationConfig {
    Shopify {
        shop_domain: String,
        access_token: Option<String>,
    },
    Woocommerce {
        site_url: String,
        consumer_key: Option<String>,
        consumer_secret: Option<String>,
    },
    Etsy {
        shop_id: String,
        access_token: Option<String>,
        refresh_token: Option<String>,
    },
    Usps {
        crid: String,
        api_key: Option<String>,
    },
    Ups {
        account_number: String,
        /// "production" or "sandbox" carrier environment.
        environment: String,
        access_token: Option<String>,
        refresh_token: Option<String>,
    },
}

impl IntegrationConfig {
    /// Remove every credential field, keeping non-sensitive endpoints intact.
    pub fn clear_secrets(&mut self) {
        match self {
            Self::Shopify { access_token, .. } => *access_token = None,
            Self::Woocommerce {
                consumer_key,
                consumer_secret,
                ..
            } => {
                *consumer_key = None;
                *consumer_secret = None;
            }
            Self::Etsy {
                access_token,
                refresh_token,
                ..
            }
            | Self::Ups {
                access_token,
                refresh_token,
                ..
            } => {
                *access_token = None;
                *refresh_token = None;
            }
            Self::Usps { api_key, .. } => *api_key = None,
        }
    }

    /// Registry name of the provider this config belongs to.
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        match self {
            Self::Shopify { .. } => "shopify",
            Self::Woocommerce { .. } => "woocommerce",
            Self::Etsy { .. } => "etsy",
            Self::Usps { .. } => "usps",
            Self::Ups { .. } => "ups",
        }
    }
}

/// Capability flags advertised by an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IntegrationFeatures {
    pub sync_orders: bool,
    pub sync_products: bool,
    pub create_labels: bool,
    pub get_rates: bool,
    pub track_packages: bool,
}

impl IntegrationFeatures {
    /// Standard capability set for an e-commerce platform.
    #[must_use]
    pub const fn ecommerce() -> Self {
        Self {
            sync_orders: true,
            sync_products: true,
            create_labels: false,
            get_rates: false,
            track_packages: false,
        }
    }

    /// Standard capability set for a shipping carrier.
    #[must_use]
    pub const fn shipping() -> Self {
        Self {
            sync_orders: false,
            sync_products: false,
            create_labels: true,
            get_rates: true,
            track_packages: true,
        }
    }
}
