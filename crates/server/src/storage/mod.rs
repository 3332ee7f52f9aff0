//! Engine-agnostic storage interface.
//!
//! The sync and routing engines never assume a specific persistence engine:
//! they talk to the [`Storage`] trait, which exposes typed list/upsert/delete
//! operations per entity plus the sync watermark bookkeeping. The in-memory
//! implementation in [`memory`] backs tests and single-node deployments; a
//! database-backed implementation can be swapped in without touching callers.
//!
//! Batch upserts are atomic per call: either the whole batch commits or the
//! call fails and nothing is written.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use orderflow_core::{
    AccountId, Integration, IntegrationId, Order, OrderId, PackagingBox, Product, ProductId,
    StoreId, Warehouse, WarehouseConfig,
};

pub use memory::MemoryStorage;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The backing engine rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Last-successful-sync watermarks for one `(store, integration)` pair.
///
/// Watermarks are kept per entity kind so a failed product sync cannot
/// advance the order watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub store_id: StoreId,
    pub integration_id: IntegrationId,
    /// Max `updated_at` observed across successfully merged orders.
    pub orders_synced_at: Option<DateTime<Utc>>,
    /// Max `updated_at` observed across successfully merged products.
    pub products_synced_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Empty sync state for a pair that has never synced.
    #[must_use]
    pub const fn empty(store_id: StoreId, integration_id: IntegrationId) -> Self {
        Self {
            store_id,
            integration_id,
            orders_synced_at: None,
            products_synced_at: None,
        }
    }
}

/// Typed CRUD storage consumed by the sync, merge, and routing engines.
#[async_trait]
pub trait Storage: Send + Sync {
    // Orders
    async fn list_orders(&self, store_id: &StoreId) -> Result<Vec<Order>, StorageError>;
    async fn upsert_orders(&self, orders: Vec<Order>) -> Result<(), StorageError>;
    async fn delete_orders(&self, ids: &[OrderId]) -> Result<(), StorageError>;

    // Products
    async fn list_products(&self, store_id: &StoreId) -> Result<Vec<Product>, StorageError>;
    async fn upsert_products(&self, products: Vec<Product>) -> Result<(), StorageError>;
    async fn delete_products(&self, ids: &[ProductId]) -> Result<(), StorageError>;

    // Packaging boxes (per account, keyed by carrier code)
    async fn list_boxes(&self, account_id: &AccountId) -> Result<Vec<PackagingBox>, StorageError>;
    async fn replace_boxes(
        &self,
        account_id: &AccountId,
        boxes: Vec<PackagingBox>,
    ) -> Result<(), StorageError>;

    // Integrations
    async fn get_integration(
        &self,
        id: &IntegrationId,
    ) -> Result<Option<Integration>, StorageError>;
    async fn find_integration(
        &self,
        store_id: &StoreId,
        provider: &str,
    ) -> Result<Option<Integration>, StorageError>;
    async fn upsert_integration(&self, integration: Integration) -> Result<(), StorageError>;
    /// Remove an integration. With `cascade`, orders and products sourced
    /// from it are deleted as well.
    async fn delete_integration(
        &self,
        id: &IntegrationId,
        cascade: bool,
    ) -> Result<(), StorageError>;

    // Warehouses and routing configuration
    async fn list_warehouses(&self, store_id: &StoreId) -> Result<Vec<Warehouse>, StorageError>;
    async fn upsert_warehouses(
        &self,
        store_id: &StoreId,
        warehouses: Vec<Warehouse>,
    ) -> Result<(), StorageError>;
    async fn get_warehouse_config(
        &self,
        store_id: &StoreId,
    ) -> Result<Option<WarehouseConfig>, StorageError>;
    async fn set_warehouse_config(
        &self,
        store_id: &StoreId,
        config: WarehouseConfig,
    ) -> Result<(), StorageError>;

    // Sync watermarks
    async fn get_sync_state(
        &self,
        store_id: &StoreId,
        integration_id: &IntegrationId,
    ) -> Result<Option<SyncState>, StorageError>;
    async fn set_sync_state(&self, state: SyncState) -> Result<(), StorageError>;
}
