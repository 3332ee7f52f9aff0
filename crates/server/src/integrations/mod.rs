//! Integration adapters for carriers and e-commerce platforms.
//!
//! Every external platform is reached through one of two capability traits:
//! [`EcommerceAdapter`] (paged order/product listings) or [`ShippingAdapter`]
//! (labels, rates, tracking), both extending [`IntegrationAdapter`]. Adapters
//! perform network calls only - they return data for the sync orchestrator to
//! persist and never write to storage themselves.
//!
//! Concrete adapters are instantiated through the [`registry`], keyed by
//! provider name, so new platforms can be added without touching call sites.

pub mod etsy;
pub mod registry;
pub mod shopify;
pub mod ups;
pub mod usps;
pub mod woocommerce;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderflow_core::{Order, Product, ShippingAddress};

pub use registry::AdapterRegistry;

/// Errors surfaced by adapter calls.
///
/// Network and auth failures are expected/operational - they surface here as
/// values rather than panics, and the orchestrator folds them into sync
/// reports.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport-level failure reaching the platform.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-success status.
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Credentials were rejected or absent at the platform.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The platform returned a payload we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result of probing an integration's connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
}

impl ConnectionTest {
    /// Successful probe.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Failed probe; the message is user-facing.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// One paginated listing request.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Platform-native cursor from the previous page, if any.
    pub cursor: Option<String>,
    /// Incremental lower bound: only records updated at or after this
    /// instant are wanted. `None` means a full sync.
    pub updated_since: Option<DateTime<Utc>>,
}

/// One page of canonical records plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when the platform signalled the end of pagination.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// An empty terminal page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Contract shared by every adapter.
#[async_trait]
pub trait IntegrationAdapter: Send + Sync {
    /// Registry name of the provider (lowercase).
    fn provider(&self) -> &'static str;

    /// Probe connectivity and credentials. Never panics past this boundary;
    /// failures come back as an unsuccessful [`ConnectionTest`].
    async fn test_connection(&self) -> ConnectionTest;
}

/// Adapter for platforms that source orders and products.
///
/// Records come back already mapped into the canonical model; the mapping is
/// platform-specific but deterministic and total (every required canonical
/// field populated or explicitly defaulted).
#[async_trait]
pub trait EcommerceAdapter: IntegrationAdapter {
    async fn fetch_orders_page(&self, request: &PageRequest) -> Result<Page<Order>, AdapterError>;

    async fn fetch_products_page(
        &self,
        request: &PageRequest,
    ) -> Result<Page<Product>, AdapterError>;
}

/// Adapter for shipping carriers.
#[async_trait]
pub trait ShippingAdapter: IntegrationAdapter {
    async fn create_label(&self, request: &LabelRequest) -> Result<Label, AdapterError>;

    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<Rate>, AdapterError>;

    async fn track_package(&self, tracking_number: &str) -> Result<TrackingInfo, AdapterError>;
}

/// A constructed adapter, tagged by capability class.
#[derive(Clone)]
pub enum Adapter {
    Ecommerce(Arc<dyn EcommerceAdapter>),
    Shipping(Arc<dyn ShippingAdapter>),
}

impl Adapter {
    /// The ecommerce capability, if this adapter has it.
    #[must_use]
    pub fn as_ecommerce(&self) -> Option<&Arc<dyn EcommerceAdapter>> {
        match self {
            Self::Ecommerce(adapter) => Some(adapter),
            Self::Shipping(_) => None,
        }
    }

    /// The shipping capability, if this adapter has it.
    #[must_use]
    pub fn as_shipping(&self) -> Option<&Arc<dyn ShippingAdapter>> {
        match self {
            Self::Shipping(adapter) => Some(adapter),
            Self::Ecommerce(_) => None,
        }
    }

    /// Provider name of the wrapped adapter.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Ecommerce(adapter) => adapter.provider(),
            Self::Shipping(adapter) => adapter.provider(),
        }
    }
}

// =============================================================================
// Shipping request/response types
// =============================================================================

/// Request to purchase a shipping label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRequest {
    pub from: ShippingAddress,
    pub to: ShippingAddress,
    pub weight_oz: f64,
    /// Carrier service code (e.g. "usps_priority", "ups_ground").
    pub service_code: String,
    /// Packaging box code, if a preset box is used.
    pub box_code: Option<String>,
}

/// A purchased label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub tracking_number: String,
    pub label_url: String,
    pub cost: String,
    pub currency: String,
}

/// Request to quote shipping rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRequest {
    pub from: ShippingAddress,
    pub to: ShippingAddress,
    pub weight_oz: f64,
}

/// One quoted rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    pub service_code: String,
    pub service_name: String,
    pub amount: String,
    pub currency: String,
    pub delivery_days: Option<u32>,
}

/// Tracking status for one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub status: String,
    pub events: Vec<TrackingEvent>,
}

/// One scan event in a package's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub description: String,
    pub location: Option<String>,
}

/// Read a response body for diagnostics, mapping failures to an empty string.
pub(crate) async fn error_body(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}
