//! Merge engine for reconciling synced records with stored state.
//!
//! Two policies live here. Orders and products merge supplied-fields-win:
//! the platform is authoritative for everything it sends, while locally
//! owned fields (warehouse assignment, record creation time) survive the
//! merge. Packaging boxes merge union-by-code: a catalog refresh may add
//! boxes and update factory presets, but it never overwrites a box the user
//! has customized.
//!
//! Every function is pure. Callers persist the returned records; running a
//! merge twice with the same inputs yields the same output.

use std::collections::HashMap;

use chrono::Utc;

use orderflow_core::{Order, PackagingBox, Product, StoreId};

/// Identity used to match an incoming order against a stored one.
///
/// External id plus store id is the durable identity; the canonical id is
/// derived from the same pair, so the fallback only matters for records
/// created before an external id was known.
fn order_key(order: &Order) -> (StoreId, String) {
    let external = order.external_id.as_str();
    if external.is_empty() {
        (order.store_id.clone(), order.id.to_string())
    } else {
        (order.store_id.clone(), external.to_string())
    }
}

/// Merge a batch of incoming orders against stored ones.
///
/// Returns the records to upsert: one per incoming order, merged with its
/// stored counterpart when one exists. Stored orders that did not appear in
/// the batch are untouched (and not returned).
#[must_use]
pub fn merge_orders(existing: &[Order], incoming: Vec<Order>) -> Vec<Order> {
    let by_key: HashMap<(StoreId, String), &Order> =
        existing.iter().map(|o| (order_key(o), o)).collect();

    incoming
        .into_iter()
        .map(|incoming| match by_key.get(&order_key(&incoming)) {
            Some(stored) => merge_order(stored, incoming),
            None => incoming,
        })
        .collect()
}

/// Merge one incoming order into its stored counterpart.
fn merge_order(stored: &Order, mut incoming: Order) -> Order {
    // Keep the stored primary key: the platform never learns about it.
    incoming.id = stored.id.clone();

    // Warehouse assignment is owned locally. The platform can never unset
    // it; an incoming value (a platform-driven reroute) wins.
    if incoming.warehouse_id.is_none() {
        incoming.warehouse_id = stored.warehouse_id.clone();
    }
    if incoming.tracking_number.is_none() {
        incoming.tracking_number = stored.tracking_number.clone();
    }

    incoming.created_at = stored.created_at;
    incoming.updated_at = Utc::now();
    incoming
}

/// Merge a batch of incoming products against stored ones, keyed like
/// orders on `(store_id, external_id)`.
#[must_use]
pub fn merge_products(existing: &[Product], incoming: Vec<Product>) -> Vec<Product> {
    let by_key: HashMap<(StoreId, String), &Product> = existing
        .iter()
        .map(|p| {
            (
                (p.store_id.clone(), p.external_id.as_str().to_string()),
                p,
            )
        })
        .collect();

    incoming
        .into_iter()
        .map(|mut incoming| {
            let key = (
                incoming.store_id.clone(),
                incoming.external_id.as_str().to_string(),
            );
            if let Some(stored) = by_key.get(&key) {
                incoming.id = stored.id.clone();
                incoming.created_at = stored.created_at;
                // Warehouse stock and the customization flag are managed
                // locally, not sourced from the platform.
                incoming.warehouse_stock = stored.warehouse_stock.clone();
                incoming.customized = stored.customized;
                incoming.updated_at = Utc::now();
            }
            incoming
        })
        .collect()
}

/// Merge a refreshed box catalog into the user's box list.
///
/// The result is the union by box code. For codes present on both sides the
/// incoming preset wins unless the stored box is user-customized, in which
/// case the stored box survives unchanged. Stored boxes absent from the
/// refresh are kept; a catalog refresh is additive, never a deletion.
#[must_use]
pub fn merge_boxes(existing: Vec<PackagingBox>, incoming: Vec<PackagingBox>) -> Vec<PackagingBox> {
    let mut merged: Vec<PackagingBox> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index_by_code: HashMap<String, usize> = HashMap::new();

    for stored in existing {
        index_by_code.insert(stored.code.clone(), merged.len());
        merged.push(stored);
    }

    for replacement in incoming {
        match index_by_code.get(&replacement.code) {
            Some(&i) => {
                if !merged[i].is_user_customized() {
                    merged[i] = replacement;
                }
            }
            None => {
                index_by_code.insert(replacement.code.clone(), merged.len());
                merged.push(replacement);
            }
        }
    }

    merged
}
