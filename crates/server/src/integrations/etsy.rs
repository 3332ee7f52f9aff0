//! Etsy Open API v3 adapter.
//!
//! Etsy paginates with numeric offsets (carried as the cursor string) and
//! bounds incremental receipt syncs with `min_last_modified` epoch seconds.
//! Requests carry both the app API key and the OAuth bearer token.

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
const BASE_URL: &str = "https://api.etsy.com/v3/application";

/// Etsy Open API adapter.
#[derive(Clone)]
pub struct EtsyAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    shop_id: String,
    api_key: String,
    access_token: SecretString,
    store_id: StoreId,
    integration_id: IntegrationId,
}

impl EtsyAdapter {
    /// Create an adapter for one Etsy shop.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        shop_id: impl Into<String>,
        api_key: impl Into<String>,
        access_token: SecretString,
        store_id: StoreId,
        integration_id: IntegrationId,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                shop_id: shop_id.into(),
                api_key: api_key.into(),
                access_token,
                store_id,
                integration_id,
            }),
        }
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
            .header("x-api-key", &self.inner.api_key)
            .bearer_auth(self.inner.access_token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth(
                "etsy rejected the oauth token".to_string(),
            ));
        }
        if !status.is_success() {
            let (status, body) = error_body(response).await;
            return Err(AdapterError::Api { status, body });
        }

        Ok(response.json::<T>().await?)
    }

    fn offset(request: &PageRequest) -> u32 {
        request
            .cursor
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0)
    }

    fn next_cursor(request: &PageRequest, returned: usize) -> Option<String> {
        let returned = u32::try_from(returned).unwrap_or(u32::MAX);
        (returned >= PAGE_LIMIT).then(|| (Self::offset(request) + PAGE_LIMIT).to_string())
    }
}

#[async_trait]
impl IntegrationAdapter for EtsyAdapter {
    fn provider(&self) -> &'static str {
        "etsy"
    }

    #[instrument(skip(self), fields(shop_id = %self.inner.shop_id))]
    async fn test_connection(&self) -> ConnectionTest {
        let url = format!("{BASE_URL}/shops/{}", self.inner.shop_id);
        match self.get_json::<EtsyShop>(url, &[]).await {
            Ok(shop) => ConnectionTest::ok(format!("Connected to {}", shop.shop_name)),
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl EcommerceAdapter for EtsyAdapter {
    #[instrument(skip(self), fields(shop_id = %self.inner.shop_id))]
    async fn fetch_orders_page(&self, request: &PageRequest) -> Result<Page<Order>, AdapterError> {
        let mut query = vec![
            ("limit", PAGE_LIMIT.to_string()),
            ("offset", Self::offset(request).to_string()),
        ];
        if let Some(since) = request.updated_since {
            query.push(("min_last_modified", since.timestamp().to_string()));
        }

        let url = format!("{BASE_URL}/shops/{}/receipts", self.inner.shop_id);
        let response: EtsyList<EtsyReceipt> = self.get_json(url, &query).await?;
        let next_cursor = Self::next_cursor(request, response.results.len());
        let items = response
            .results
            .into_iter()
            .map(|r| convert_receipt(r, &self.inner.store_id, &self.inner.integration_id))
            .collect();

        Ok(Page { items, next_cursor })
    }

    #[instrument(skip(self), fields(shop_id = %self.inner.shop_id))]
    async fn fetch_products_page(
        &self,
        request: &PageRequest,
    ) -> Result<Page<Product>, AdapterError> {
        let query = vec![
            ("limit", PAGE_LIMIT.to_string()),
            ("offset", Self::offset(request).to_string()),
        ];

        let url = format!("{BASE_URL}/shops/{}/listings", self.inner.shop_id);
        let response: EtsyList<EtsyListing> = self.get_json(url, &query).await?;
        let next_cursor = Self::next_cursor(request, response.results.len());
        let items = response
            .results
            .into_iter()
            .map(|l| convert_listing(l, &self.inner.store_id, &self.inner.integration_id))
            .collect();

        Ok(Page { items, next_cursor })
    }
}

// =============================================================================
// Platform-native record shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct EtsyShop {
    shop_name: String,
}

#[derive(Debug, Deserialize)]
struct EtsyList<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct EtsyReceipt {
    receipt_id: i64,
    name: Option<String>,
    status: Option<String>,
    first_line: Option<String>,
    second_line: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip: Option<String>,
    country_iso: Option<String>,
    grandtotal: Option<EtsyMoney>,
    created_timestamp: Option<i64>,
    updated_timestamp: Option<i64>,
    #[serde(default)]
    transactions: Vec<EtsyTransaction>,
    #[serde(default)]
    shipments: Vec<EtsyShipment>,
}

#[derive(Debug, Deserialize)]
struct EtsyMoney {
    amount: i64,
    divisor: i64,
    currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EtsyTransaction {
    transaction_id: i64,
    title: Option<String>,
    sku: Option<String>,
    quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EtsyShipment {
    tracking_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EtsyListing {
    listing_id: i64,
    title: Option<String>,
    #[serde(default)]
    skus: Vec<String>,
    created_timestamp: Option<i64>,
    updated_timestamp: Option<i64>,
}

// =============================================================================
// Conversions into the canonical model
// =============================================================================

fn epoch(seconds: Option<i64>) -> DateTime<Utc> {
    seconds
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_else(Utc::now)
}

fn format_money(money: Option<&EtsyMoney>) -> String {
    money.map_or_else(
        || "0.00".to_string(),
        |m| {
            let divisor = if m.divisor > 0 { m.divisor } else { 100 };
            #[allow(clippy::cast_precision_loss)]
            let value = m.amount as f64 / divisor as f64;
            format!("{value:.2}")
        },
    )
}

fn convert_receipt(
    receipt: EtsyReceipt,
    store_id: &StoreId,
    integration_id: &IntegrationId,
) -> Order {
    let external_id = ExternalId::new(receipt.receipt_id.to_string());
    let currency = receipt
        .grandtotal
        .as_ref()
        .and_then(|m| m.currency_code.clone())
        .unwrap_or_else(|| "USD".to_string());

    Order {
        id: canonical_order_id(store_id, &external_id),
        external_id,
        store_id: store_id.clone(),
        integration_id: integration_id.clone(),
        warehouse_id: None,
        order_number: receipt.receipt_id.to_string(),
        customer_name: receipt.name.clone().unwrap_or_default(),
        shipping_address: ShippingAddress {
            name: receipt.name,
            line1: receipt.first_line,
            line2: receipt.second_line,
            city: receipt.city,
            province: receipt.state,
            postal_code: receipt.zip,
            country_code: receipt.country_iso,
        },
        fulfillment_status: match receipt.status.as_deref() {
            Some("Completed") => FulfillmentStatus::Fulfilled,
            Some("Canceled") => FulfillmentStatus::Cancelled,
            _ => FulfillmentStatus::Unfulfilled,
        },
        tracking_number: receipt
            .shipments
            .into_iter()
            .find_map(|s| s.tracking_code),
        line_items: receipt
            .transactions
            .into_iter()
            .map(|t| LineItem {
                external_id: Some(ExternalId::new(t.transaction_id.to_string())),
                sku: t.sku.filter(|s| !s.is_empty()),
                title: t.title.unwrap_or_default(),
                quantity: t.quantity.unwrap_or(1),
                unit_price: None,
            })
            .collect(),
        total_price: format_money(receipt.grandtotal.as_ref()),
        currency,
        created_at: epoch(receipt.created_timestamp),
        updated_at: epoch(receipt.updated_timestamp),
    }
}

fn convert_listing(
    listing: EtsyListing,
    store_id: &StoreId,
    integration_id: &IntegrationId,
) -> Product {
    let external_id = ExternalId::new(listing.listing_id.to_string());
    Product {
        id: ProductId::new(format!("{store_id}:{external_id}")),
        external_id,
        store_id: store_id.clone(),
        integration_id: integration_id.clone(),
        sku: listing.skus.into_iter().next(),
        title: listing.title.unwrap_or_default(),
        warehouse_stock: Vec::new(),
        customized: false,
        created_at: epoch(listing.created_timestamp),
        updated_at: epoch(listing.updated_timestamp),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_cursor_math() {
        let request = PageRequest {
            cursor: Some("200".to_string()),
            updated_since: None,
        };
        assert_eq!(EtsyAdapter::offset(&request), 200);
        assert_eq!(
            EtsyAdapter::next_cursor(&request, PAGE_LIMIT as usize),
            Some("300".to_string())
        );
        assert_eq!(EtsyAdapter::next_cursor(&request, 3), None);
    }

    #[test]
    fn test_convert_receipt_formats_money_and_state() {
        let raw: EtsyReceipt = serde_json::from_value(serde_json::json!({
            "receipt_id": 321,
            "name": "Pat Maker",
            "status": "Completed",
            "state": "NV",
            "country_iso": "US",
            "grandtotal": {"amount": 1250, "divisor": 100, "currency_code": "USD"},
            "created_timestamp": 1_700_000_000,
            "updated_timestamp": 1_700_000_500,
            "transactions": [{"transaction_id": 9, "title": "Mug", "quantity": 1}]
        }))
        .unwrap();

        let order = convert_receipt(raw, &StoreId::new("s1"), &IntegrationId::new("i1"));
        assert_eq!(order.total_price, "12.50");
        assert_eq!(order.shipping_address.province.as_deref(), Some("NV"));
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Fulfilled);
        assert_eq!(order.updated_at.timestamp(), 1_700_000_500);
    }
}
