//! WooCommerce REST adapter.
//!
//! WooCommerce paginates with 1-based page numbers rather than opaque
//! cursors; the page number is carried as the cursor string. Incremental
//! syncs use the `modified_after` filter. Authentication is HTTP basic with
//! the consumer key/secret pair.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use orderflow_core::{
    ExternalId, FulfillmentStatus, IntegrationId, LineItem, Order, Product, ProductId,
    ShippingAddress, StoreId,
};

use super::shopify::canonical_order_id;
use super::{
    AdapterError, ConnectionTest, EcommerceAdapter, IntegrationAdapter, Page, PageRequest,
    error_body,
};

const PAGE_LIMIT: u32 = 100;

/// WooCommerce REST adapter.
#[derive(Clone)]
pub struct WooCommerceAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    site_url: String,
    consumer_key: String,
    consumer_secret: SecretString,
    store_id: StoreId,
    integration_id: IntegrationId,
}

impl WooCommerceAdapter {
    /// Create an adapter for one WooCommerce site.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        site_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: SecretString,
        store_id: StoreId,
        integration_id: IntegrationId,
    ) -> Self {
        let site_url = site_url.into();
        Self {
            inner: Arc::new(Inner {
                client,
                site_url: site_url.trim_end_matches('/').to_string(),
                consumer_key: consumer_key.into(),
                consumer_secret,
                store_id,
                integration_id,
            }),
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/wp-json/wc/v3/{resource}", self.inner.site_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, AdapterError> {
        let response = self
            .inner
            .client
            .get(url)
            .basic_auth(
                &self.inner.consumer_key,
                Some(self.inner.consumer_secret.expose_secret()),
            )
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth(
                "woocommerce rejected the consumer key/secret".to_string(),
            ));
        }
        if !status.is_success() {
            let (status, body) = error_body(response).await;
            return Err(AdapterError::Api { status, body });
        }

        Ok(response.json::<T>().await?)
    }

    /// Parse the page-number cursor; a missing or garbled cursor restarts at
    /// page 1.
    fn page_number(request: &PageRequest) -> u32 {
        request
            .cursor
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(1)
    }

    fn page_query(request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("per_page", PAGE_LIMIT.to_string()),
            ("page", Self::page_number(request).to_string()),
            ("orderby", "id".to_string()),
            ("order", "asc".to_string()),
        ];
        if let Some(since) = request.updated_since {
            query.push(("modified_after", since.to_rfc3339()));
        }
        query
    }

    /// Next cursor: the following page number while pages come back full.
    fn next_cursor(request: &PageRequest, returned: usize) -> Option<String> {
        let returned = u32::try_from(returned).unwrap_or(u32::MAX);
        (returned >= PAGE_LIMIT).then(|| (Self::page_number(request) + 1).to_string())
    }
}

#[async_trait]
impl IntegrationAdapter for WooCommerceAdapter {
    fn provider(&self) -> &'static str {
        "woocommerce"
    }

    #[instrument(skip(self), fields(site = %self.inner.site_url))]
    async fn test_connection(&self) -> ConnectionTest {
        match self
            .get_json::<serde_json::Value>(self.url("system_status"), &[])
            .await
        {
            Ok(_) => ConnectionTest::ok(format!("Connected to {}", self.inner.site_url)),
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl EcommerceAdapter for WooCommerceAdapter {
    #[instrument(skip(self), fields(site = %self.inner.site_url))]
    async fn fetch_orders_page(&self, request: &PageRequest) -> Result<Page<Order>, AdapterError> {
        let query = Self::page_query(request);
        let orders: Vec<WooOrder> = self.get_json(self.url("orders"), &query).await?;
        let next_cursor = Self::next_cursor(request, orders.len());
        let items = orders
            .into_iter()
            .map(|o| convert_order(o, &self.inner.store_id, &self.inner.integration_id))
            .collect();

        Ok(Page { items, next_cursor })
    }

    #[instrument(skip(self), fields(site = %self.inner.site_url))]
    async fn fetch_products_page(
        &self,
        request: &PageRequest,
    ) -> Result<Page<Product>, AdapterError> {
        let query = Self::page_query(request);
        let products: Vec<WooProduct> = self.get_json(self.url("products"), &query).await?;
        let next_cursor = Self::next_cursor(request, products.len());
        let items = products
            .into_iter()
            .map(|p| convert_product(p, &self.inner.store_id, &self.inner.integration_id))
            .collect();

        Ok(Page { items, next_cursor })
    }
}

// =============================================================================
// Platform-native record shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct WooOrder {
    id: i64,
    number: Option<String>,
    status: Option<String>,
    date_created_gmt: Option<chrono::NaiveDateTime>,
    date_modified_gmt: Option<chrono::NaiveDateTime>,
    total: Option<String>,
    currency: Option<String>,
    shipping: Option<WooAddress>,
    billing: Option<WooBilling>,
    #[serde(default)]
    line_items: Vec<WooLineItem>,
}

#[derive(Debug, Deserialize)]
struct WooAddress {
    first_name: Option<String>,
    last_name: Option<String>,
    address_1: Option<String>,
    address_2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WooBilling {
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WooLineItem {
    id: i64,
    sku: Option<String>,
    name: Option<String>,
    quantity: Option<u32>,
    price: Option<serde_json::Number>,
}

#[derive(Debug, Deserialize)]
struct WooProduct {
    id: i64,
    name: Option<String>,
    sku: Option<String>,
    date_created_gmt: Option<chrono::NaiveDateTime>,
    date_modified_gmt: Option<chrono::NaiveDateTime>,
}

// =============================================================================
// Conversions into the canonical model
// =============================================================================

fn utc(naive: Option<chrono::NaiveDateTime>) -> DateTime<Utc> {
    naive.map_or_else(Utc::now, |n| n.and_utc())
}

fn convert_order(order: WooOrder, store_id: &StoreId, integration_id: &IntegrationId) -> Order {
    let external_id = ExternalId::new(order.id.to_string());
    let customer_name = order.billing.map_or_else(String::new, |b| {
        [b.first_name, b.last_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    });

    Order {
        id: canonical_order_id(store_id, &external_id),
        external_id,
        store_id: store_id.clone(),
        integration_id: integration_id.clone(),
        warehouse_id: None,
        order_number: order.number.unwrap_or_else(|| order.id.to_string()),
        customer_name,
        shipping_address: order.shipping.map_or_else(ShippingAddress::default, |a| {
            ShippingAddress {
                name: match (a.first_name, a.last_name) {
                    (None, None) => None,
                    (first, last) => Some(
                        [first, last]
                            .into_iter()
                            .flatten()
                            .collect::<Vec<_>>()
                            .join(" "),
                    ),
                },
                line1: a.address_1,
                line2: a.address_2,
                city: a.city,
                province: a.state,
                postal_code: a.postcode,
                country_code: a.country,
            }
        }),
        fulfillment_status: convert_status(order.status.as_deref()),
        tracking_number: None,
        line_items: order.line_items.into_iter().map(convert_line_item).collect(),
        total_price: order.total.unwrap_or_else(|| "0.00".to_string()),
        currency: order.currency.unwrap_or_else(|| "USD".to_string()),
        created_at: utc(order.date_created_gmt),
        updated_at: utc(order.date_modified_gmt),
    }
}

fn convert_line_item(item: WooLineItem) -> LineItem {
    LineItem {
        external_id: Some(ExternalId::new(item.id.to_string())),
        sku: item.sku.filter(|s| !s.is_empty()),
        title: item.name.unwrap_or_default(),
        quantity: item.quantity.unwrap_or(1),
        unit_price: item.price.map(|p| p.to_string()),
    }
}

fn convert_status(status: Option<&str>) -> FulfillmentStatus {
    match status {
        Some("completed") => FulfillmentStatus::Fulfilled,
        Some("cancelled" | "refunded" | "trash") => FulfillmentStatus::Cancelled,
        _ => FulfillmentStatus::Unfulfilled,
    }
}

fn convert_product(
    product: WooProduct,
    store_id: &StoreId,
    integration_id: &IntegrationId,
) -> Product {
    let external_id = ExternalId::new(product.id.to_string());
    Product {
        id: ProductId::new(format!("{store_id}:{external_id}")),
        external_id,
        store_id: store_id.clone(),
        integration_id: integration_id.clone(),
        sku: product.sku.filter(|s| !s.is_empty()),
        title: product.name.unwrap_or_default(),
        warehouse_stock: Vec::new(),
        customized: false,
        created_at: utc(product.date_created_gmt),
        updated_at: utc(product.date_modified_gmt),
    }
}
