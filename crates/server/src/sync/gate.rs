//! At-most-one-in-flight sync enforcement.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use orderflow_core::{IntegrationId, StoreId};

type Key = (StoreId, IntegrationId);

/// Tracks which `(store, integration)` pairs currently have a sync running.
///
/// Cloning the gate shares the underlying set. The permit releases its key
/// on drop, so a panicking or early-returning sync cannot wedge the pair.
#[derive(Clone, Default)]
pub struct SyncGate {
    in_flight: Arc<Mutex<HashSet<Key>>>,
}

impl SyncGate {
    /// Create an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the pair. Returns `None` if a sync is already running
    /// for it.
    #[must_use]
    pub fn try_acquire(
        &self,
        store_id: &StoreId,
        integration_id: &IntegrationId,
    ) -> Option<SyncPermit> {
        let key = (store_id.clone(), integration_id.clone());
        let mut in_flight = self.in_flight.lock().ok()?;
        if in_flight.insert(key.clone()) {
            Some(SyncPermit {
                in_flight: Arc::clone(&self.in_flight),
                key,
            })
        } else {
            None
        }
    }
}

/// Exclusive claim on one `(store, integration)` pair, released on drop.
pub struct SyncPermit {
    in_flight: Arc<Mutex<HashSet<Key>>>,
    key: Key,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}
