//! End-to-end warehouse routing scenarios: auto-assignment seeded from
//! warehouse locations, persisted through storage, and consulted during
//! order resolution.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use orderflow_core::{RoutingMode, StoreId, WarehouseConfig, WarehouseId};
use orderflow_server::routing::{self, CensusRegion};
use orderflow_server::storage::{MemoryStorage, Storage};

use orderflow_integration_tests::{order_to, warehouse};

#[test]
fn simple_mode_routes_everything_to_primary() {
    let config = WarehouseConfig::simple(Some(WarehouseId::new("W1")), Some(WarehouseId::new("W2")));

    assert_eq!(
        routing::resolve_warehouse(&order_to(1, "TX"), &config),
        Some(WarehouseId::new("W1"))
    );
    assert_eq!(
        routing::resolve_warehouse(&order_to(2, "NY"), &config),
        Some(WarehouseId::new("W1"))
    );
}

#[test]
fn unconfigured_store_leaves_orders_unassigned() {
    let config = WarehouseConfig::simple(None, None);
    assert_eq!(routing::resolve_warehouse(&order_to(1, "TX"), &config), None);
}

#[test]
fn auto_assignment_covers_all_fifty_states_exactly_once() {
    let warehouses = [warehouse("W1", "TX"), warehouse("W2", "NY")];
    let assignments = routing::auto_assign(&warehouses);
    assert_eq!(assignments.len(), 2);

    let mut seen = HashSet::new();
    for assignment in &assignments {
        for region in &assignment.regions {
            for state in &region.states {
                assert!(seen.insert(state.clone()), "state {state} assigned twice");
            }
        }
    }
    assert_eq!(seen.len(), 50);
}

#[test]
fn auto_assignment_gives_each_warehouse_its_home_region() {
    // W1 sits in the South, W2 in the Northeast; unclaimed regions go to the
    // nearest warehouse by region adjacency.
    let warehouses = [warehouse("W1", "TX"), warehouse("W2", "NY")];
    let assignments = routing::auto_assign(&warehouses);

    let covering = |state: &str| -> WarehouseId {
        assignments
            .iter()
            .find(|a| a.covers_state(state))
            .map(|a| a.warehouse_id.clone())
            .unwrap()
    };

    assert_eq!(covering("TX"), WarehouseId::new("W1"));
    assert_eq!(covering("NY"), WarehouseId::new("W2"));
    // West has no resident warehouse; the South is adjacent to it, the
    // Northeast is not.
    assert_eq!(covering("CA"), WarehouseId::new("W1"));
}

#[tokio::test]
async fn auto_assigned_config_routes_orders_by_destination_state() {
    let storage = MemoryStorage::new();
    let store_id = StoreId::new("store-1");

    let warehouses = vec![warehouse("W1", "TX"), warehouse("W2", "NY")];
    storage
        .upsert_warehouses(&store_id, warehouses.clone())
        .await
        .unwrap();

    let assignments = routing::auto_assign(&warehouses);
    let config = WarehouseConfig {
        mode: RoutingMode::Advanced,
        primary_warehouse_id: Some(WarehouseId::new("W1")),
        fallback_warehouse_id: None,
        enable_region_routing: true,
        assignments,
    };
    storage
        .set_warehouse_config(&store_id, config)
        .await
        .unwrap();

    let config = storage
        .get_warehouse_config(&store_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        routing::resolve_warehouse(&order_to(1, "TX"), &config),
        Some(WarehouseId::new("W1"))
    );
    assert_eq!(
        routing::resolve_warehouse(&order_to(2, "NY"), &config),
        Some(WarehouseId::new("W2"))
    );
    // No usable destination state: fall back to the primary.
    assert_eq!(
        routing::resolve_warehouse(&order_to(3, "  "), &config),
        Some(WarehouseId::new("W1"))
    );
    // Non-US province codes match no region and also fall back.
    assert_eq!(
        routing::resolve_warehouse(&order_to(4, "ON"), &config),
        Some(WarehouseId::new("W1"))
    );
}

#[test]
fn disabled_region_routing_ignores_assignments() {
    let warehouses = [warehouse("W1", "TX"), warehouse("W2", "NY")];
    let mut config = WarehouseConfig {
        mode: RoutingMode::Advanced,
        primary_warehouse_id: Some(WarehouseId::new("W1")),
        fallback_warehouse_id: None,
        enable_region_routing: true,
        assignments: routing::auto_assign(&warehouses),
    };

    assert_eq!(
        routing::resolve_warehouse(&order_to(1, "NY"), &config),
        Some(WarehouseId::new("W2"))
    );

    config.enable_region_routing = false;
    assert_eq!(
        routing::resolve_warehouse(&order_to(1, "NY"), &config),
        Some(WarehouseId::new("W1"))
    );
}

#[test]
fn moving_a_state_keeps_single_ownership() {
    let warehouses = [warehouse("W1", "TX"), warehouse("W2", "NY")];
    let mut assignments = routing::auto_assign(&warehouses);

    let target = assignments
        .iter()
        .find(|a| a.warehouse_id == WarehouseId::new("W2"))
        .map(|a| a.id.clone())
        .unwrap();

    routing::move_state_to(&mut assignments, &target, "fl");

    let owners: Vec<_> = assignments.iter().filter(|a| a.covers_state("FL")).collect();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].warehouse_id, WarehouseId::new("W2"));
}

#[test]
fn census_regions_partition_the_fifty_states() {
    let total: usize = CensusRegion::ALL.iter().map(|r| r.states().len()).sum();
    assert_eq!(total, 50);

    assert_eq!(CensusRegion::of_state("ca"), Some(CensusRegion::West));
    assert_eq!(CensusRegion::of_state(" TX "), Some(CensusRegion::South));
    assert_eq!(CensusRegion::of_state("PR"), None);
}
