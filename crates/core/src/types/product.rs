//! Product and packaging records synced from platforms and carriers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ExternalId, IntegrationId, ProductId, StoreId, WarehouseId};

/// A canonical product synced from an e-commerce platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub external_id: ExternalId,
    pub store_id: StoreId,
    pub integration_id: IntegrationId,
    pub sku: Option<String>,
    pub title: String,
    /// Per-warehouse stock levels.
    pub warehouse_stock: Vec<WarehouseStock>,
    /// Set when a user has edited this record locally. The flag itself and
    /// the stock levels survive re-sync; platform-sourced fields refresh.
    pub customized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock quantity of a product at one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStock {
    pub warehouse_id: WarehouseId,
    pub quantity: u32,
}

/// A packaging box preset, either carrier-provided or user-defined.
///
/// Carrier APIs periodically re-deliver their box catalogs; a box the user
/// has edited (concrete dimensions on a non-variable type, or the explicit
/// flag) must keep its local values across those re-syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingBox {
    /// Stable carrier/platform code used as the merge key (e.g. "usps_flat_rate_md").
    pub code: String,
    pub name: String,
    pub box_type: BoxType,
    pub dimensions: Option<BoxDimensions>,
    /// Explicit user-customization marker.
    pub customized: bool,
}

impl PackagingBox {
    /// Whether this record counts as user-customized for merge purposes.
    ///
    /// Either the explicit flag is set, or the box carries concrete
    /// dimensions and is not a variable placeholder type.
    #[must_use]
    pub const fn is_user_customized(&self) -> bool {
        self.customized || (self.dimensions.is_some() && !matches!(self.box_type, BoxType::Variable))
    }
}

/// Classification of a packaging box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxType {
    Box,
    Envelope,
    /// Placeholder type whose dimensions are chosen at label time.
    Variable,
}

/// Interior dimensions of a box, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}
