//! Status enums for integrations, orders, and sync runs.

use serde::{Deserialize, Serialize};

/// Connection status of an integration.
///
/// Disconnecting an integration clears its sensitive config fields and moves
/// it here; reconnecting moves it back to `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Connected,
    #[default]
    Disconnected,
    Error,
}

/// Capability class of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    /// Order/product sources (Shopify, WooCommerce, Etsy).
    Ecommerce,
    /// Label/rate/tracking carriers (USPS, UPS).
    Shipping,
}

/// Order fulfillment status, normalized across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    PartiallyFulfilled,
    Fulfilled,
    Cancelled,
}

/// Which entity kinds a sync invocation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Orders,
    Products,
    All,
}

impl SyncType {
    /// Whether this sync type includes order records.
    #[must_use]
    pub const fn includes_orders(self) -> bool {
        matches!(self, Self::Orders | Self::All)
    }

    /// Whether this sync type includes product records.
    #[must_use]
    pub const fn includes_products(self) -> bool {
        matches!(self, Self::Products | Self::All)
    }
}
