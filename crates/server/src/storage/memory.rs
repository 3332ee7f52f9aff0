//! In-memory storage implementation.
//!
//! Backs tests and single-node deployments. Every collection lives behind one
//! `RwLock`ed map; batch upserts take the write lock once, so a batch commits
//! atomically with respect to readers.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use orderflow_core::{
    AccountId, Integration, IntegrationId, Order, OrderId, PackagingBox, Product, ProductId,
    StoreId, Warehouse, WarehouseConfig, WarehouseId,
};

use super::{Storage, StorageError, SyncState};

/// In-memory [`Storage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    orders: RwLock<HashMap<OrderId, Order>>,
    products: RwLock<HashMap<ProductId, Product>>,
    boxes: RwLock<HashMap<AccountId, Vec<PackagingBox>>>,
    integrations: RwLock<HashMap<IntegrationId, Integration>>,
    warehouses: RwLock<HashMap<StoreId, HashMap<WarehouseId, Warehouse>>>,
    warehouse_configs: RwLock<HashMap<StoreId, WarehouseConfig>>,
    sync_states: RwLock<HashMap<(StoreId, IntegrationId), SyncState>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_orders(&self, store_id: &StoreId) -> Result<Vec<Order>, StorageError> {
        let orders = self.orders.read().await;
        let mut matched: Vec<Order> = orders
            .values()
            .filter(|o| &o.store_id == store_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn upsert_orders(&self, batch: Vec<Order>) -> Result<(), StorageError> {
        let mut orders = self.orders.write().await;
        for order in batch {
            orders.insert(order.id.clone(), order);
        }
        Ok(())
    }

    async fn delete_orders(&self, ids: &[OrderId]) -> Result<(), StorageError> {
        let mut orders = self.orders.write().await;
        for id in ids {
            orders.remove(id);
        }
        Ok(())
    }

    async fn list_products(&self, store_id: &StoreId) -> Result<Vec<Product>, StorageError> {
        let products = self.products.read().await;
        let mut matched: Vec<Product> = products
            .values()
            .filter(|p| &p.store_id == store_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn upsert_products(&self, batch: Vec<Product>) -> Result<(), StorageError> {
        let mut products = self.products.write().await;
        for product in batch {
            products.insert(product.id.clone(), product);
        }
        Ok(())
    }

    async fn delete_products(&self, ids: &[ProductId]) -> Result<(), StorageError> {
        let mut products = self.products.write().await;
        for id in ids {
            products.remove(id);
        }
        Ok(())
    }

    async fn list_boxes(&self, account_id: &AccountId) -> Result<Vec<PackagingBox>, StorageError> {
        let boxes = self.boxes.read().await;
        Ok(boxes.get(account_id).cloned().unwrap_or_default())
    }

    async fn replace_boxes(
        &self,
        account_id: &AccountId,
        batch: Vec<PackagingBox>,
    ) -> Result<(), StorageError> {
        let mut boxes = self.boxes.write().await;
        boxes.insert(account_id.clone(), batch);
        Ok(())
    }

    async fn get_integration(
        &self,
        id: &IntegrationId,
    ) -> Result<Option<Integration>, StorageError> {
        Ok(self.integrations.read().await.get(id).cloned())
    }

    async fn find_integration(
        &self,
        store_id: &StoreId,
        provider: &str,
    ) -> Result<Option<Integration>, StorageError> {
        let integrations = self.integrations.read().await;
        Ok(integrations
            .values()
            .find(|i| &i.store_id == store_id && i.provider.eq_ignore_ascii_case(provider))
            .cloned())
    }

    async fn upsert_integration(&self, integration: Integration) -> Result<(), StorageError> {
        let mut integrations = self.integrations.write().await;
        integrations.insert(integration.id.clone(), integration);
        Ok(())
    }

    async fn delete_integration(
        &self,
        id: &IntegrationId,
        cascade: bool,
    ) -> Result<(), StorageError> {
        let mut integrations = self.integrations.write().await;
        if integrations.remove(id).is_none() {
            return Err(StorageError::NotFound);
        }
        drop(integrations);

        if cascade {
            self.orders
                .write()
                .await
                .retain(|_, o| &o.integration_id != id);
            self.products
                .write()
                .await
                .retain(|_, p| &p.integration_id != id);
        }
        Ok(())
    }

    async fn list_warehouses(&self, store_id: &StoreId) -> Result<Vec<Warehouse>, StorageError> {
        let warehouses = self.warehouses.read().await;
        let mut matched: Vec<Warehouse> = warehouses
            .get(store_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn upsert_warehouses(
        &self,
        store_id: &StoreId,
        batch: Vec<Warehouse>,
    ) -> Result<(), StorageError> {
        let mut warehouses = self.warehouses.write().await;
        let entry = warehouses.entry(store_id.clone()).or_default();
        for warehouse in batch {
            entry.insert(warehouse.id.clone(), warehouse);
        }
        Ok(())
    }

    async fn get_warehouse_config(
        &self,
        store_id: &StoreId,
    ) -> Result<Option<WarehouseConfig>, StorageError> {
        Ok(self.warehouse_configs.read().await.get(store_id).cloned())
    }

    async fn set_warehouse_config(
        &self,
        store_id: &StoreId,
        config: WarehouseConfig,
    ) -> Result<(), StorageError> {
        self.warehouse_configs
            .write()
            .await
            .insert(store_id.clone(), config);
        Ok(())
    }

    async fn get_sync_state(
        &self,
        store_id: &StoreId,
        integration_id: &IntegrationId,
    ) -> Result<Option<SyncState>, StorageError> {
        let states = self.sync_states.read().await;
        Ok(states
            .get(&(store_id.clone(), integration_id.clone()))
            .cloned())
    }

    async fn set_sync_state(&self, state: SyncState) -> Result<(), StorageError> {
        let key = (state.store_id.clone(), state.integration_id.clone());
        self.sync_states.write().await.insert(key, state);
        Ok(())
    }
}
