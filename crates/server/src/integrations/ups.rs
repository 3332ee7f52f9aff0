//! UPS shipping adapter.
//!
//! Talks to the UPS REST APIs with an OAuth bearer token. The carrier
//! environment ("production" or "sandbox") selects the API host; the
//! sandbox host is UPS's customer integration environment.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{
    AdapterError, ConnectionTest, IntegrationAdapter, Label, LabelRequest, Rate, RateRequest,
    ShippingAdapter, TrackingEvent, TrackingInfo, error_body,
};

const PRODUCTION_URL: &str = "https://onlinetools.ups.com";
const SANDBOX_URL: &str = "https://wwwcie.ups.com";

/// UPS adapter.
#[derive(Clone)]
pub struct UpsAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    account_number: String,
    base_url: &'static str,
    access_token: SecretString,
}

impl UpsAdapter {
    /// Create an adapter for one UPS account.
    ///
    /// Any `environment` other than `"production"` selects the sandbox host.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        account_number: impl Into<String>,
        environment: &str,
        access_token: SecretString,
    ) -> Self {
        let base_url = if environment.eq_ignore_ascii_case("production") {
            PRODUCTION_URL
        } else {
            SANDBOX_URL
        };
        Self {
            inner: Arc::new(Inner {
                client,
                account_number: account_number.into(),
                base_url,
                access_token,
            }),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth(
                "ups rejected the access token".to_string(),
            ));
        }
        if !status.is_success() {
            let (status, body) = error_body(response).await;
            return Err(AdapterError::Api { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl IntegrationAdapter for UpsAdapter {
    fn provider(&self) -> &'static str {
        "ups"
    }

    #[instrument(skip(self), fields(account = %self.inner.account_number))]
    async fn test_connection(&self) -> ConnectionTest {
        let probe = RateRequest {
            from: orderflow_core::ShippingAddress {
                postal_code: Some("30303".to_string()),
                country_code: Some("US".to_string()),
                ..Default::default()
            },
            to: orderflow_core::ShippingAddress {
                postal_code: Some("10001".to_string()),
                country_code: Some("US".to_string()),
                ..Default::default()
            },
            weight_oz: 16.0,
        };
        match self.get_rates(&probe).await {
            Ok(_) => ConnectionTest::ok("UPS credentials accepted"),
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl ShippingAdapter for UpsAdapter {
    #[instrument(skip(self, request))]
    async fn create_label(&self, request: &LabelRequest) -> Result<Label, AdapterError> {
        let payload = UpsShipmentPayload::from_request(request, &self.inner.account_number);
        let response = self
            .inner
            .client
            .post(format!("{}/api/shipments/v2403/ship", self.inner.base_url))
            .bearer_auth(self.inner.access_token.expose_secret())
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UpsShipmentResponse = response.json().await?;
        let result = body.shipment_response.shipment_results;
        Ok(Label {
            tracking_number: result.tracking_number.unwrap_or_default(),
            label_url: result.label_url.unwrap_or_default(),
            cost: result
                .charges
                .as_ref()
                .map_or_else(|| "0.00".to_string(), |c| c.monetary_value.clone()),
            currency: result
                .charges
                .map_or_else(|| "USD".to_string(), |c| c.currency_code),
        })
    }

    #[instrument(skip(self, request))]
    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<Rate>, AdapterError> {
        let payload = UpsRatePayload::from_request(request, &self.inner.account_number);
        let response = self
            .inner
            .client
            .post(format!("{}/api/rating/v2403/Shop", self.inner.base_url))
            .bearer_auth(self.inner.access_token.expose_secret())
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UpsRateResponse = response.json().await?;
        Ok(body
            .rate_response
            .rated_shipments
            .into_iter()
            .map(|r| Rate {
                service_code: r.service.as_ref().map_or_else(String::new, |s| s.code.clone()),
                service_name: r
                    .service
                    .and_then(|s| s.description)
                    .unwrap_or_else(|| "UPS".to_string()),
                amount: r
                    .total_charges
                    .as_ref()
                    .map_or_else(|| "0.00".to_string(), |c| c.monetary_value.clone()),
                currency: r
                    .total_charges
                    .map_or_else(|| "USD".to_string(), |c| c.currency_code),
                delivery_days: None,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn track_package(&self, tracking_number: &str) -> Result<TrackingInfo, AdapterError> {
        let response = self
            .inner
            .client
            .get(format!(
                "{}/api/track/v1/details/{tracking_number}",
                self.inner.base_url
            ))
            .bearer_auth(self.inner.access_token.expose_secret())
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: UpsTrackResponse = response.json().await?;
        let activity = body
            .track_response
            .shipment
            .into_iter()
            .flat_map(|s| s.package)
            .flat_map(|p| p.activity)
            .collect::<Vec<_>>();

        let status = activity
            .first()
            .and_then(|a| a.status.as_ref())
            .map_or_else(|| "UNKNOWN".to_string(), |s| s.description.clone());

        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status,
            events: activity
                .into_iter()
                .map(|a| TrackingEvent {
                    timestamp: None,
                    description: a.status.map(|s| s.description).unwrap_or_default(),
                    location: a.location.and_then(|l| l.city),
                })
                .collect(),
        })
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpsShipmentPayload {
    shipper_number: String,
    service_code: String,
    weight_lbs: f64,
    origin_postal: String,
    destination_postal: String,
}

impl UpsShipmentPayload {
    fn from_request(request: &LabelRequest, account_number: &str) -> Self {
        Self {
            shipper_number: account_number.to_string(),
            service_code: request.service_code.clone(),
            weight_lbs: request.weight_oz / 16.0,
            origin_postal: request.from.postal_code.clone().unwrap_or_default(),
            destination_postal: request.to.postal_code.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsShipmentResponse {
    shipment_response: UpsShipmentBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsShipmentBody {
    shipment_results: UpsShipmentResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsShipmentResults {
    tracking_number: Option<String>,
    label_url: Option<String>,
    charges: Option<UpsCharges>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsCharges {
    currency_code: String,
    monetary_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpsRatePayload {
    shipper_number: String,
    weight_lbs: f64,
    origin_postal: String,
    destination_postal: String,
}

impl UpsRatePayload {
    fn from_request(request: &RateRequest, account_number: &str) -> Self {
        Self {
            shipper_number: account_number.to_string(),
            weight_lbs: request.weight_oz / 16.0,
            origin_postal: request.from.postal_code.clone().unwrap_or_default(),
            destination_postal: request.to.postal_code.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsRateResponse {
    rate_response: UpsRateBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsRateBody {
    #[serde(default)]
    rated_shipments: Vec<UpsRatedShipment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsRatedShipment {
    service: Option<UpsService>,
    total_charges: Option<UpsCharges>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpsService {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsTrackResponse {
    track_response: UpsTrackBody,
}

#[derive(Debug, Deserialize)]
struct UpsTrackBody {
    #[serde(default)]
    shipment: Vec<UpsTrackShipment>,
}

#[derive(Debug, Deserialize)]
struct UpsTrackShipment {
    #[serde(default)]
    package: Vec<UpsTrackPackage>,
}

#[derive(Debug, Deserialize)]
struct UpsTrackPackage {
    #[serde(default)]
    activity: Vec<UpsActivity>,
}

#[derive(Debug, Deserialize)]
struct UpsActivity {
    status: Option<UpsActivityStatus>,
    location: Option<UpsActivityLocation>,
}

#[derive(Debug, Deserialize)]
struct UpsActivityStatus {
    description: String,
}

#[derive(Debug, Deserialize)]
struct UpsActivityLocation {
    city: Option<String>,
}
