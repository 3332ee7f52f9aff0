//! Warehouse routing.
//!
//! Resolution is pure and storage-free: given an order's destination and the
//! store's routing configuration, return the warehouse that should fulfill
//! it, or `None` to leave the order unassigned for manual triage (never an
//! error). Auto-assign seeds a region-based configuration from the
//! warehouses' own locations using fixed US census region tables.

pub mod regions;

use orderflow_core::{
    AssignmentId, Order, Region, RoutingMode, Warehouse, WarehouseAssignment, WarehouseConfig,
    WarehouseId,
};

pub use regions::CensusRegion;

/// Resolve the warehouse for an order under the store's configuration.
///
/// Advanced mode scans active assignments in ascending priority and picks
/// the first whose regions contain the destination state; anything without a
/// match (including orders with no usable state code) falls back to the
/// simple primary/fallback chain.
#[must_use]
pub fn resolve_warehouse(order: &Order, config: &WarehouseConfig) -> Option<WarehouseId> {
    if config.mode == RoutingMode::Advanced && config.enable_region_routing {
        if let Some(state) = destination_state(order) {
            let mut assignments: Vec<&WarehouseAssignment> =
                config.assignments.iter().filter(|a| a.is_active).collect();
            assignments.sort_by_key(|a| a.priority);

            if let Some(hit) = assignments.iter().find(|a| a.covers_state(state)) {
                return Some(hit.warehouse_id.clone());
            }
        }
    }

    config
        .primary_warehouse_id
        .clone()
        .or_else(|| config.fallback_warehouse_id.clone())
}

fn destination_state(order: &Order) -> Option<&str> {
    order
        .shipping_address
        .province
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Generate one assignment per active warehouse covering all 50 US states.
///
/// Pass 1: every warehouse claims the states of its own census region; when
/// two warehouses share a region, the earlier one in the input wins. Pass 2:
/// states in regions no warehouse lives in go to the closest warehouse,
/// scored 0 (same region), 1 (adjacent region), 2 (otherwise), ties broken
/// by input order.
///
/// Post-condition: each of the 50 states appears in exactly one returned
/// assignment.
#[must_use]
pub fn auto_assign(warehouses: &[Warehouse]) -> Vec<WarehouseAssignment> {
    let active: Vec<&Warehouse> = warehouses.iter().filter(|w| w.active).collect();
    if active.is_empty() {
        return Vec::new();
    }

    let home_regions: Vec<Option<CensusRegion>> = active
        .iter()
        .map(|w| CensusRegion::of_state(&w.state))
        .collect();

    let mut state_sets: Vec<Vec<String>> = vec![Vec::new(); active.len()];

    for region in CensusRegion::ALL {
        let owner = home_regions
            .iter()
            .position(|home| *home == Some(region))
            .unwrap_or_else(|| closest_warehouse(&home_regions, region));
        state_sets[owner].extend(region.states().iter().map(ToString::to_string));
    }

    active
        .iter()
        .zip(state_sets)
        .enumerate()
        .map(|(i, (warehouse, states))| WarehouseAssignment {
            id: AssignmentId::new(uuid::Uuid::new_v4().to_string()),
            warehouse_id: warehouse.id.clone(),
            priority: u32::try_from(i).unwrap_or(u32::MAX),
            regions: vec![Region::us(states)],
            is_active: true,
        })
        .collect()
}

/// Index of the best-scoring warehouse for an unclaimed region.
fn closest_warehouse(home_regions: &[Option<CensusRegion>], region: CensusRegion) -> usize {
    let score = |home: Option<CensusRegion>| -> u8 {
        match home {
            Some(h) if h == region => 0,
            Some(h) if h.is_adjacent_to(region) => 1,
            _ => 2,
        }
    };

    home_regions
        .iter()
        .enumerate()
        .min_by_key(|(i, home)| (score(**home), *i))
        .map_or(0, |(i, _)| i)
}

/// Move a state into the given assignment, removing it from every other one
/// first so the one-assignment-per-state invariant holds.
pub fn move_state_to(assignments: &mut [WarehouseAssignment], target: &AssignmentId, state: &str) {
    let state = state.trim().to_ascii_uppercase();
    for assignment in assignments.iter_mut() {
        assignment.remove_state(&state);
    }
    if let Some(assignment) = assignments.iter_mut().find(|a| &a.id == target) {
        match assignment.regions.first_mut() {
            Some(region) => region.states.push(state),
            None => assignment.regions.push(Region::us(vec![state])),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use orderflow_core::{
        ExternalId, FulfillmentStatus, IntegrationId, OrderId, ShippingAddress, StoreId,
    };

    use super::*;

    fn order_to(state: Option<&str>) -> Order {
        Order {
            id: OrderId::new("s1:1"),
            external_id: ExternalId::new("1"),
            store_id: StoreId::new("s1"),
            integration_id: IntegrationId::new("i1"),
            warehouse_id: None,
            order_number: "#1".to_string(),
            customer_name: String::new(),
            shipping_address: ShippingAddress {
                province: state.map(ToString::to_string),
                country_code: Some("US".to_string()),
                ..Default::default()
            },
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            tracking_number: None,
            line_items: Vec::new(),
            total_price: "0.00".to_string(),
            currency: "USD".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn warehouse(id: &str, state: &str) -> Warehouse {
        Warehouse {
            id: WarehouseId::new(id),
            name: id.to_string(),
            state: state.to_string(),
            active: true,
        }
    }

    fn advanced_config(assignments: Vec<WarehouseAssignment>) -> WarehouseConfig {
        WarehouseConfig {
            mode: RoutingMode::Advanced,
            primary_warehouse_id: Some(WarehouseId::new("primary")),
            fallback_warehouse_id: Some(WarehouseId::new("fallback")),
            enable_region_routing: true,
            assignments,
        }
    }

    fn assignment(id: &str, warehouse: &str, priority: u32, states: &[&str]) -> WarehouseAssignment {
        WarehouseAssignment {
            id: AssignmentId::new(id),
            warehouse_id: WarehouseId::new(warehouse),
            priority,
            regions: vec![Region::us(states.iter().map(ToString::to_string).collect())],
            is_active: true,
        }
    }

    #[test]
    fn test_simple_mode_prefers_primary_then_fallback() {
        let order = order_to(Some("NY"));

        let both = WarehouseConfig::simple(
            Some(WarehouseId::new("w1")),
            Some(WarehouseId::new("w2")),
        );
        assert_eq!(resolve_warehouse(&order, &both), Some(WarehouseId::new("w1")));

        let fallback_only = WarehouseConfig::simple(None, Some(WarehouseId::new("w2")));
        assert_eq!(
            resolve_warehouse(&order, &fallback_only),
            Some(WarehouseId::new("w2"))
        );

        let neither = WarehouseConfig::simple(None, None);
        assert_eq!(resolve_warehouse(&order, &neither), None);
    }

    #[test]
    fn test_advanced_mode_scans_by_priority() {
        let config = advanced_config(vec![
            assignment("a2", "w2", 2, &["NY", "TX"]),
            assignment("a1", "w1", 1, &["NY"]),
        ]);
        // Both cover NY; the lower priority number wins.
        assert_eq!(
            resolve_warehouse(&order_to(Some("NY")), &config),
            Some(WarehouseId::new("w1"))
        );
        assert_eq!(
            resolve_warehouse(&order_to(Some("TX")), &config),
            Some(WarehouseId::new("w2"))
        );
    }

    #[test]
    fn test_advanced_mode_ignores_inactive_and_falls_back() {
        let mut inactive = assignment("a1", "w1", 1, &["NY"]);
        inactive.is_active = false;
        let config = advanced_config(vec![inactive]);

        assert_eq!(
            resolve_warehouse(&order_to(Some("NY")), &config),
            Some(WarehouseId::new("primary"))
        );
        assert_eq!(
            resolve_warehouse(&order_to(None), &config),
            Some(WarehouseId::new("primary"))
        );
    }

    #[test]
    fn test_auto_assign_covers_fifty_states_exactly_once() {
        let warehouses = [warehouse("w1", "TX"), warehouse("w2", "NY")];
        let assignments = auto_assign(&warehouses);
        assert_eq!(assignments.len(), 2);

        let mut seen: Vec<String> = assignments
            .iter()
            .flat_map(|a| a.regions.iter())
            .flat_map(|r| r.states.iter().cloned())
            .collect();
        let unique: HashSet<String> = seen.iter().cloned().collect();
        seen.sort();
        assert_eq!(seen.len(), 50);
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn test_auto_assign_scores_adjacency() {
        // TX is South, NY is Northeast. West is adjacent to neither from the
        // warehouses' side, but South's neighbor list includes West, so the
        // Texas warehouse takes it. Midwest is adjacent to both; the tie
        // goes to input order.
        let warehouses = [warehouse("w1", "TX"), warehouse("w2", "NY")];
        let assignments = auto_assign(&warehouses);

        let texas = &assignments[0];
        assert!(texas.covers_state("TX"));
        assert!(texas.covers_state("CA"), "West goes to the South warehouse");
        assert!(texas.covers_state("IL"), "Midwest tie breaks to input order");

        let newyork = &assignments[1];
        assert!(newyork.covers_state("NY"));
        assert!(newyork.covers_state("MA"));
        assert!(!newyork.covers_state("CA"));
    }

    #[test]
    fn test_auto_assign_same_region_first_wins() {
        let warehouses = [warehouse("w1", "CA"), warehouse("w2", "WA")];
        let assignments = auto_assign(&warehouses);
        assert!(assignments[0].covers_state("CA"));
        assert!(assignments[0].covers_state("WA"));
        // Everything lands on the first warehouse; the second covers nothing
        // but all 50 states remain covered exactly once.
        let total: usize = assignments
            .iter()
            .flat_map(|a| a.regions.iter())
            .map(|r| r.states.len())
            .sum();
        assert_eq!(total, 50);
    }

    #[test]
    fn test_auto_assign_skips_inactive_warehouses() {
        let mut inactive = warehouse("w1", "TX");
        inactive.active = false;
        let assignments = auto_assign(&[inactive, warehouse("w2", "NY")]);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].warehouse_id, WarehouseId::new("w2"));
    }

    #[test]
    fn test_move_state_keeps_single_ownership() {
        let mut assignments = vec![
            assignment("a1", "w1", 1, &["NY", "NJ"]),
            assignment("a2", "w2", 2, &["TX"]),
        ];
        move_state_to(&mut assignments, &AssignmentId::new("a2"), "ny");

        assert!(!assignments[0].covers_state("NY"));
        assert!(assignments[1].covers_state("NY"));
        assert!(assignments[0].covers_state("NJ"));
    }
}
