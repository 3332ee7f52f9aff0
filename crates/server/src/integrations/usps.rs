//! USPS shipping adapter.
//!
//! Covers label purchase, rate quotes, and package tracking against the USPS
//! APIs platform. This is a shipping-only adapter: the sync orchestrator
//! rejects order/product sync requests against it before any call lands here.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{
    AdapterError, ConnectionTest, IntegrationAdapter, Label, LabelRequest, Rate, RateRequest,
    ShippingAdapter, TrackingEvent, TrackingInfo, error_body,
};

const BASE_URL: &str = "https://apis.usps.com";

/// USPS adapter.
#[derive(Clone)]
pub struct UspsAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    crid: String,
    api_key: SecretString,
}

impl UspsAdapter {
    /// Create an adapter for one USPS customer registration.
    #[must_use]
    pub fn new(client: reqwest::Client, crid: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                crid: crid.into(),
                api_key,
            }),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth("usps rejected the api key".to_string()));
        }
        if !status.is_success() {
            let (status, body) = error_body(response).await;
            return Err(AdapterError::Api { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl IntegrationAdapter for UspsAdapter {
    fn provider(&self) -> &'static str {
        "usps"
    }

    #[instrument(skip(self), fields(crid = %self.inner.crid))]
    async fn test_connection(&self) -> ConnectionTest {
        // Rate search is the cheapest authenticated call available.
        let probe = RateRequest {
            from: orderflow_core::ShippingAddress {
                postal_code: Some("90210".to_string()),
                ..Default::default()
            },
            to: orderflow_core::ShippingAddress {
                postal_code: Some("10001".to_string()),
                ..Default::default()
            },
            weight_oz: 8.0,
        };
        match self.get_rates(&probe).await {
            Ok(_) => ConnectionTest::ok("USPS credentials accepted"),
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl ShippingAdapter for UspsAdapter {
    #[instrument(skip(self, request))]
    async fn create_label(&self, request: &LabelRequest) -> Result<Label, AdapterError> {
        let payload = UspsLabelPayload::from_request(request, &self.inner.crid);
        let response = self
            .inner
            .client
            .post(format!("{BASE_URL}/labels/v3/label"))
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UspsLabelResponse = response.json().await?;
        Ok(Label {
            tracking_number: body.tracking_number,
            label_url: body.label_url.unwrap_or_default(),
            cost: body.postage.unwrap_or_else(|| "0.00".to_string()),
            currency: "USD".to_string(),
        })
    }

    #[instrument(skip(self, request))]
    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<Rate>, AdapterError> {
        let payload = UspsRatePayload {
            origin_zip_code: request.from.postal_code.clone().unwrap_or_default(),
            destination_zip_code: request.to.postal_code.clone().unwrap_or_default(),
            weight: request.weight_oz / 16.0,
        };
        let response = self
            .inner
            .client
            .post(format!("{BASE_URL}/prices/v3/base-rates/search"))
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UspsRateResponse = response.json().await?;
        Ok(body
            .rates
            .into_iter()
            .map(|r| Rate {
                service_code: r.mail_class.clone().unwrap_or_default(),
                service_name: r.description.unwrap_or_else(|| "USPS".to_string()),
                amount: r.price.map_or_else(|| "0.00".to_string(), |p| p.to_string()),
                currency: "USD".to_string(),
                delivery_days: r.delivery_days,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn track_package(&self, tracking_number: &str) -> Result<TrackingInfo, AdapterError> {
        let response = self
            .inner
            .client
            .get(format!("{BASE_URL}/tracking/v3/tracking/{tracking_number}"))
            .bearer_auth(self.inner.api_key.expose_secret())
            .query(&[("expand", "DETAIL")])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UspsTrackingResponse = response.json().await?;
        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status: body.status_summary.unwrap_or_else(|| "UNKNOWN".to_string()),
            events: body
                .tracking_events
                .into_iter()
                .map(|e| TrackingEvent {
                    timestamp: e.event_timestamp,
                    description: e.event_type.unwrap_or_default(),
                    location: e.event_city,
                })
                .collect(),
        })
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UspsLabelPayload {
    crid: String,
    mail_class: String,
    weight: f64,
    origin_zip: String,
    destination_zip: String,
    package_code: Option<String>,
}

impl UspsLabelPayload {
    fn from_request(request: &LabelRequest, crid: &str) -> Self {
        Self {
            crid: crid.to_string(),
            mail_class: request.service_code.clone(),
            weight: request.weight_oz / 16.0,
            origin_zip: request.from.postal_code.clone().unwrap_or_default(),
            destination_zip: request.to.postal_code.clone().unwrap_or_default(),
            package_code: request.box_code.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UspsLabelResponse {
    tracking_number: String,
    label_url: Option<String>,
    postage: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UspsRatePayload {
    origin_zip_code: String,
    destination_zip_code: String,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct UspsRateResponse {
    #[serde(default)]
    rates: Vec<UspsRate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UspsRate {
    mail_class: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    delivery_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UspsTrackingResponse {
    status_summary: Option<String>,
    #[serde(default)]
    tracking_events: Vec<UspsTrackingEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UspsTrackingEvent {
    event_type: Option<String>,
    event_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    event_city: Option<String>,
}
