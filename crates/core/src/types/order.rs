//! The canonical order model that platform-native records are mapped into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ExternalId, IntegrationId, OrderId, StoreId, WarehouseId};
use super::status::FulfillmentStatus;

/// A canonical order, owned by the account.
///
/// `(external_id, store_id)` is the natural key used for idempotent merge
/// against platform-sourced records. `warehouse_id` is computed by the
/// warehouse router and may be recomputed if the shipping address changes;
/// a manually set value survives re-sync because incoming payloads omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub external_id: ExternalId,
    pub store_id: StoreId,
    pub integration_id: IntegrationId,
    /// Assigned warehouse; `None` means the order is flagged unassigned.
    pub warehouse_id: Option<WarehouseId>,
    pub order_number: String,
    pub customer_name: String,
    pub shipping_address: ShippingAddress,
    pub fulfillment_status: FulfillmentStatus,
    pub tracking_number: Option<String>,
    pub line_items: Vec<LineItem>,
    pub total_price: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Destination address fields the warehouse router cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ShippingAddress {
    pub name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    /// State or province code (e.g. "CA", "NY").
    pub province: Option<String>,
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
}

/// One purchased line on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub external_id: Option<ExternalId>,
    pub sku: Option<String>,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Option<String>,
}
