//! Registry/factory mapping provider names to adapter constructors.
//!
//! Call sites never branch on provider names themselves: they hand a
//! persisted [`Integration`] plus its vault credentials to [`AdapterRegistry::create`]
//! and get back a capability-tagged [`Adapter`]. Unknown providers and
//! config-shape mismatches produce `None` with a logged warning, never a
//! panic, so one corrupt integration cannot take down a bulk operation.

use std::collections::HashMap;
use std::sync::Arc;

use orderflow_core::{Integration, IntegrationConfig};

use crate::vault::Credentials;

use super::etsy::EtsyAdapter;
use super::shopify::ShopifyAdapter;
use super::ups::UpsAdapter;
use super::usps::UspsAdapter;
use super::woocommerce::WooCommerceAdapter;
use super::Adapter;

type Constructor = fn(&AdapterRegistry, &Integration, &Credentials) -> Option<Adapter>;

/// Central adapter registry.
///
/// Providers are keyed case-insensitively. New carriers/platforms register a
/// constructor here and become available everywhere without touching calling
/// code.
pub struct AdapterRegistry {
    client: reqwest::Client,
    /// App-level Etsy API key (keystring), shared across Etsy integrations.
    etsy_api_key: Option<String>,
    constructors: HashMap<&'static str, Constructor>,
}

impl AdapterRegistry {
    /// Build a registry with all built-in providers registered.
    #[must_use]
    pub fn new(client: reqwest::Client, etsy_api_key: Option<String>) -> Self {
        let mut constructors: HashMap<&'static str, Constructor> = HashMap::new();
        constructors.insert("shopify", Self::build_shopify);
        constructors.insert("woocommerce", Self::build_woocommerce);
        constructors.insert("etsy", Self::build_etsy);
        constructors.insert("usps", Self::build_usps);
        constructors.insert("ups", Self::build_ups);

        Self {
            client,
            etsy_api_key,
            constructors,
        }
    }

    /// Whether a provider name is registered (case-insensitive).
    #[must_use]
    pub fn is_registered(&self, provider: &str) -> bool {
        self.constructors
            .contains_key(provider.to_ascii_lowercase().as_str())
    }

    /// Instantiate an adapter for a persisted integration.
    ///
    /// Returns `None` (with a logged warning) if the provider is not
    /// registered or the stored config shape does not match the provider.
    #[must_use]
    pub fn create(&self, integration: &Integration, credentials: &Credentials) -> Option<Adapter> {
        let provider = integration.provider.to_ascii_lowercase();
        let Some(constructor) = self.constructors.get(provider.as_str()) else {
            tracing::warn!(
                provider = %integration.provider,
                integration_id = %integration.id,
                "no adapter registered for provider"
            );
            return None;
        };

        let adapter = constructor(self, integration, credentials);
        if adapter.is_none() {
            tracing::warn!(
                provider = %integration.provider,
                integration_id = %integration.id,
                "integration config shape does not match its provider"
            );
        }
        adapter
    }

    /// Instantiate adapters for a batch, dropping the ones that fail.
    #[must_use]
    pub fn create_many<'a, I>(&self, integrations: I) -> Vec<Adapter>
    where
        I: IntoIterator<Item = (&'a Integration, &'a Credentials)>,
    {
        integrations
            .into_iter()
            .filter_map(|(integration, credentials)| self.create(integration, credentials))
            .collect()
    }

    // =========================================================================
    // Provider constructors
    // =========================================================================

    fn build_shopify(
        &self,
        integration: &Integration,
        credentials: &Credentials,
    ) -> Option<Adapter> {
        let IntegrationConfig::Shopify { shop_domain, .. } = &integration.config else {
            return None;
        };
        Some(Adapter::Ecommerce(Arc::new(ShopifyAdapter::new(
            self.client.clone(),
            shop_domain.clone(),
            credentials.access_token.clone(),
            integration.store_id.clone(),
            integration.id.clone(),
        ))))
    }

    fn build_woocommerce(
        &self,
        integration: &Integration,
        credentials: &Credentials,
    ) -> Option<Adapter> {
        let IntegrationConfig::Woocommerce {
            site_url,
            consumer_key,
            ..
        } = &integration.config
        else {
            return None;
        };
        // The consumer secret lives in the vault; the (non-secret) key is
        // part of the persisted config.
        let consumer_key = consumer_key.as_ref()?;
        Some(Adapter::Ecommerce(Arc::new(WooCommerceAdapter::new(
            self.client.clone(),
            site_url.clone(),
            consumer_key.clone(),
            credentials.access_token.clone(),
            integration.store_id.clone(),
            integration.id.clone(),
        ))))
    }

    fn build_etsy(&self, integration: &Integration, credentials: &Credentials) -> Option<Adapter> {
        let IntegrationConfig::Etsy { shop_id, .. } = &integration.config else {
            return None;
        };
        let api_key = self.etsy_api_key.as_ref()?;
        Some(Adapter::Ecommerce(Arc::new(EtsyAdapter::new(
            self.client.clone(),
            shop_id.clone(),
            api_key.clone(),
            credentials.access_token.clone(),
            integration.store_id.clone(),
            integration.id.clone(),
        ))))
    }

    fn build_usps(&self, integration: &Integration, credentials: &Credentials) -> Option<Adapter> {
        let IntegrationConfig::Usps { crid, .. } = &integration.config else {
            return None;
        };
        Some(Adapter::Shipping(Arc::new(UspsAdapter::new(
            self.client.clone(),
            crid.clone(),
            credentials.access_token.clone(),
        ))))
    }

    fn build_ups(&self, integration: &Integration, credentials: &Credentials) -> Option<Adapter> {
        let IntegrationConfig::Ups {
            account_number,
            environment,
            ..
        } = &integration.config
        else {
            return None;
        };
        Some(Adapter::Shipping(Arc::new(UpsAdapter::new(
            self.client.clone(),
            account_number.clone(),
            environment,
            credentials.access_token.clone(),
        ))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use orderflow_core::{
        AccountId, IntegrationFeatures, IntegrationId, IntegrationStatus, IntegrationType, StoreId,
    };

    use super::*;

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new(reqwest::Client::new(), Some("etsy-key".to_string()))
    }

    fn integration(provider: &str, config: IntegrationConfig) -> Integration {
        Integration {
            id: IntegrationId::new("i1"),
            provider: provider.to_string(),
            integration_type: IntegrationType::Ecommerce,
            status: IntegrationStatus::Connected,
            enabled: true,
            store_id: StoreId::new("s1"),
            account_id: AccountId::new("a1"),
            config,
            features: IntegrationFeatures::ecommerce(),
            connected_at: Some(Utc::now()),
            last_sync_at: None,
        }
    }

    fn shopify_config() -> IntegrationConfig {
        IntegrationConfig::Shopify {
            shop_domain: "demo.myshopify.com".to_string(),
            access_token: None,
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = registry();
        assert!(registry.is_registered("Shopify"));
        assert!(registry.is_registered("UPS"));
        assert!(!registry.is_registered("magento"));

        let adapter = registry.create(
            &integration("Shopify", shopify_config()),
            &Credentials::token("shpat_x"),
        );
        assert_eq!(adapter.unwrap().provider(), "shopify");
    }

    #[test]
    fn test_unregistered_provider_returns_none() {
        let registry = registry();
        let adapter = registry.create(
            &integration("magento", shopify_config()),
            &Credentials::token("t"),
        );
        assert!(adapter.is_none());
    }

    #[test]
    fn test_config_shape_mismatch_returns_none() {
        let registry = registry();
        // Provider says ups, config says shopify: corrupt record, not a panic.
        let adapter = registry.create(
            &integration("ups", shopify_config()),
            &Credentials::token("t"),
        );
        assert!(adapter.is_none());
    }

    #[test]
    fn test_create_many_filters_failures() {
        let registry = registry();
        let good = integration("shopify", shopify_config());
        let bad = integration("magento", shopify_config());
        let creds = Credentials::token("t");

        let adapters = registry.create_many([(&good, &creds), (&bad, &creds)]);
        assert_eq!(adapters.len(), 1);
    }

    #[test]
    fn test_shipping_adapter_is_tagged_shipping() {
        let registry = registry();
        let ups = integration(
            "ups",
            IntegrationConfig::Ups {
                account_number: "A1B2C3".to_string(),
                environment: "sandbox".to_string(),
                access_token: None,
                refresh_token: None,
            },
        );
        let adapter = registry.create(&ups, &Credentials::token("t")).unwrap();
        assert!(adapter.as_shipping().is_some());
        assert!(adapter.as_ecommerce().is_none());
    }
}
