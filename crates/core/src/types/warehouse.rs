//! Warehouse routing configuration.

use serde::{Deserialize, Serialize};

use super::id::{AssignmentId, WarehouseId};

/// A physical warehouse that orders can be routed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    /// State code of the warehouse's own location, used by auto-assign to
    /// derive its geographic region.
    pub state: String,
    pub active: bool,
}

/// Per-store warehouse routing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub mode: RoutingMode,
    pub primary_warehouse_id: Option<WarehouseId>,
    pub fallback_warehouse_id: Option<WarehouseId>,
    pub enable_region_routing: bool,
    /// Region assignments, scanned in ascending `priority` order.
    pub assignments: Vec<WarehouseAssignment>,
}

impl WarehouseConfig {
    /// A simple primary/fallback configuration with no region routing.
    #[must_use]
    pub const fn simple(
        primary: Option<WarehouseId>,
        fallback: Option<WarehouseId>,
    ) -> Self {
        Self {
            mode: RoutingMode::Simple,
            primary_warehouse_id: primary,
            fallback_warehouse_id: fallback,
            enable_region_routing: false,
            assignments: Vec::new(),
        }
    }
}

/// Routing strategy for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Simple,
    Advanced,
}

/// One warehouse's claim over a set of regions.
///
/// Invariant (maintained by assign/auto-assign logic, not by this type): a
/// given state code appears in at most one assignment's region set at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseAssignment {
    pub id: AssignmentId,
    pub warehouse_id: WarehouseId,
    /// Lower priority wins first during routing.
    pub priority: u32,
    pub regions: Vec<Region>,
    pub is_active: bool,
}

impl WarehouseAssignment {
    /// Whether any of this assignment's regions contains the given state code.
    #[must_use]
    pub fn covers_state(&self, state: &str) -> bool {
        self.regions
            .iter()
            .any(|r| r.states.iter().any(|s| s.eq_ignore_ascii_case(state)))
    }

    /// Remove a state code from every region of this assignment.
    pub fn remove_state(&mut self, state: &str) {
        for region in &mut self.regions {
            region.states.retain(|s| !s.eq_ignore_ascii_case(state));
        }
    }
}

/// A named group of states inside one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub country: String,
    pub country_code: String,
    pub states: Vec<String>,
}

impl Region {
    /// A United States region holding the given state codes.
    #[must_use]
    pub fn us(states: Vec<String>) -> Self {
        Self {
            country: "United States".to_string(),
            country_code: "US".to_string(),
            states,
        }
    }
}
