//! Cross-module integration tests for Orderflow.
//!
//! The scenarios under `tests/` exercise the public seams between the
//! server's engines - sync orchestration, merge, warehouse routing, the
//! OAuth state coordinator - wired together over the in-memory storage and
//! vault implementations, the same way the server composes them.
//!
//! This crate body only holds shared fixtures; every scenario lives in
//! `tests/`.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};

use orderflow_core::{
    AccountId, ExternalId, FulfillmentStatus, Integration, IntegrationConfig, IntegrationFeatures,
    IntegrationId, IntegrationStatus, IntegrationType, Order, OrderId, Product, ProductId,
    ShippingAddress, StoreId, Warehouse, WarehouseId,
};

/// Deterministic timestamp `n` seconds into the test epoch.
#[must_use]
pub fn ts(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(n)
}

/// A connected integration record for the given provider.
#[must_use]
pub fn integration(provider: &str, config: IntegrationConfig) -> Integration {
    let integration_type = match provider {
        "usps" | "ups" => IntegrationType::Shipping,
        _ => IntegrationType::Ecommerce,
    };
    let features = match integration_type {
        IntegrationType::Ecommerce => IntegrationFeatures::ecommerce(),
        IntegrationType::Shipping => IntegrationFeatures::shipping(),
    };
    Integration {
        id: IntegrationId::new(format!("int-{provider}")),
        provider: provider.to_string(),
        integration_type,
        status: IntegrationStatus::Connected,
        enabled: true,
        store_id: StoreId::new("store-1"),
        account_id: AccountId::new("acct-1"),
        config,
        features,
        connected_at: Some(ts(0)),
        last_sync_at: None,
    }
}

/// An order destined for the given US state.
#[must_use]
pub fn order_to(n: u32, state: &str) -> Order {
    Order {
        id: OrderId::new(format!("store-1:{n}")),
        external_id: ExternalId::new(n.to_string()),
        store_id: StoreId::new("store-1"),
        integration_id: IntegrationId::new("int-shopify"),
        warehouse_id: None,
        order_number: format!("#{n}"),
        customer_name: "Customer".to_string(),
        shipping_address: ShippingAddress {
            province: Some(state.to_string()),
            country_code: Some("US".to_string()),
            ..ShippingAddress::default()
        },
        fulfillment_status: FulfillmentStatus::Unfulfilled,
        tracking_number: None,
        line_items: Vec::new(),
        total_price: "25.00".to_string(),
        currency: "USD".to_string(),
        created_at: ts(i64::from(n)),
        updated_at: ts(i64::from(n)),
    }
}

/// A product record as a platform adapter would map it.
#[must_use]
pub fn product(n: u32) -> Product {
    Product {
        id: ProductId::new(format!("store-1:{n}")),
        external_id: ExternalId::new(n.to_string()),
        store_id: StoreId::new("store-1"),
        integration_id: IntegrationId::new("int-shopify"),
        sku: Some(format!("SKU-{n}")),
        title: format!("Product {n}"),
        warehouse_stock: Vec::new(),
        customized: false,
        created_at: ts(i64::from(n)),
        updated_at: ts(i64::from(n)),
    }
}

/// An active warehouse located in the given US state.
#[must_use]
pub fn warehouse(id: &str, state: &str) -> Warehouse {
    Warehouse {
        id: WarehouseId::new(id),
        name: format!("Warehouse {id}"),
        state: state.to_string(),
        active: true,
    }
}
