//! Sync orchestrator.
//!
//! Drives one full fetch-merge-persist cycle against an e-commerce
//! integration. The orchestrator owns sequencing and failure policy; the
//! adapters fetch, the merge engine reconciles, storage persists. Partial
//! progress is kept: a page failure mid-run merges everything fetched so far
//! and surfaces the error on the report instead of rolling back.

pub mod gate;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use orderflow_core::{Integration, Order, Product, SyncType, WarehouseId};

use crate::integrations::{Adapter, AdapterError, AdapterRegistry, EcommerceAdapter, PageRequest};
use crate::merge;
use crate::routing;
use crate::storage::{Storage, StorageError, SyncState};
use crate::vault::CredentialVault;

pub use gate::{SyncGate, SyncPermit};

/// Default per-page fetch timeout.
const PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that abort a sync before any entity completes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync for this `(store, integration)` pair is already in flight.
    #[error("a sync is already running for this integration")]
    AlreadyRunning,

    /// No credentials in the vault; the integration was never connected or
    /// has been disconnected. Fatal, not retried.
    #[error("no credentials stored for this integration")]
    CredentialsMissing,

    /// The integration cannot sync orders/products (e.g. a shipping carrier).
    #[error("provider {provider} does not support order/product sync")]
    UnsupportedOperation { provider: String },

    /// The registry could not build an adapter for this integration.
    #[error("no adapter available for provider {provider}")]
    AdapterUnavailable { provider: String },

    /// The very first page fetch failed; nothing was synced.
    #[error("fetch failed before any page completed: {0}")]
    FetchFailed(#[from] AdapterError),

    /// The very first page fetch timed out; nothing was synced.
    #[error("page fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    /// The merge batch could not be committed. Nothing from the batch was
    /// written; the watermark is untouched.
    #[error("merge commit failed: {0}")]
    MergeFailed(StorageError),

    /// Storage failure outside the merge commit.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parameters for one sync run.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub sync_type: SyncType,
    /// Ignore the stored watermark and fetch everything.
    pub force_full_sync: bool,
    /// Assign this warehouse to fetched orders instead of consulting the
    /// store's routing configuration.
    pub warehouse_id: Option<WarehouseId>,
}

/// Outcome of the fetch-and-merge for one entity kind.
#[derive(Debug, Clone, Default)]
pub struct EntityReport {
    pub fetched: usize,
    pub merged: usize,
    /// Set when a page fetch failed after at least one page had succeeded;
    /// everything fetched up to that point was still merged.
    pub partial: bool,
    pub error: Option<String>,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub is_incremental: bool,
    pub orders: Option<EntityReport>,
    pub products: Option<EntityReport>,
}

impl SyncOutcome {
    /// Whether every requested entity completed without a partial failure.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let clean = |report: &Option<EntityReport>| report.as_ref().is_none_or(|r| !r.partial);
        clean(&self.orders) && clean(&self.products)
    }
}

/// One accumulated fetch: all pages' items plus bookkeeping for the
/// watermark and partial-failure reporting.
struct Fetched<T> {
    items: Vec<T>,
    max_updated_at: Option<DateTime<Utc>>,
    partial_error: Option<String>,
}

/// Coordinates sync runs across adapters, merge, and storage.
pub struct SyncOrchestrator {
    storage: Arc<dyn Storage>,
    vault: Arc<dyn CredentialVault>,
    registry: Arc<AdapterRegistry>,
    gate: SyncGate,
    page_timeout: Duration,
}

impl SyncOrchestrator {
    /// Create an orchestrator with the default per-page timeout.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        vault: Arc<dyn CredentialVault>,
        registry: Arc<AdapterRegistry>,
        gate: SyncGate,
    ) -> Self {
        Self {
            storage,
            vault,
            registry,
            gate,
            page_timeout: PAGE_TIMEOUT,
        }
    }

    /// Override the per-page timeout. Used by tests.
    #[must_use]
    pub const fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Run one sync for the integration.
    ///
    /// # Errors
    ///
    /// See [`SyncError`]. A partial page failure after the first page is not
    /// an error; it comes back on the [`SyncOutcome`] reports.
    #[instrument(
        skip(self, integration, request),
        fields(
            provider = %integration.provider,
            store_id = %integration.store_id,
            sync_type = ?request.sync_type,
        )
    )]
    pub async fn run_sync(
        &self,
        integration: &Integration,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, SyncError> {
        let _permit = self
            .gate
            .try_acquire(&integration.store_id, &integration.id)
            .ok_or(SyncError::AlreadyRunning)?;

        let credentials = self
            .vault
            .get(&integration.account_id, &integration.id)
            .await
            .ok_or(SyncError::CredentialsMissing)?;

        let adapter = self
            .registry
            .create(integration, &credentials)
            .ok_or_else(|| SyncError::AdapterUnavailable {
                provider: integration.provider.clone(),
            })?;
        let adapter = match adapter {
            Adapter::Ecommerce(adapter) => adapter,
            Adapter::Shipping(_) => {
                return Err(SyncError::UnsupportedOperation {
                    provider: integration.provider.clone(),
                });
            }
        };

        let sync_state = self
            .storage
            .get_sync_state(&integration.store_id, &integration.id)
            .await?
            .unwrap_or_else(|| {
                SyncState::empty(integration.store_id.clone(), integration.id.clone())
            });

        let mut outcome = SyncOutcome::default();

        if request.sync_type.includes_orders() {
            let since = (!request.force_full_sync)
                .then_some(sync_state.orders_synced_at)
                .flatten();
            outcome.is_incremental = since.is_some();
            outcome.orders = Some(
                self.sync_orders(integration, &adapter, request, &sync_state, since)
                    .await?,
            );
        }

        if request.sync_type.includes_products() {
            let since = (!request.force_full_sync)
                .then_some(sync_state.products_synced_at)
                .flatten();
            outcome.is_incremental = outcome.is_incremental || since.is_some();
            outcome.products = Some(
                self.sync_products(integration, &adapter, &sync_state, since)
                    .await?,
            );
        }

        let mut updated = integration.clone();
        updated.last_sync_at = Some(Utc::now());
        self.storage.upsert_integration(updated).await?;

        Ok(outcome)
    }

    async fn sync_orders(
        &self,
        integration: &Integration,
        adapter: &Arc<dyn EcommerceAdapter>,
        request: &SyncRequest,
        sync_state: &SyncState,
        since: Option<DateTime<Utc>>,
    ) -> Result<EntityReport, SyncError> {
        let Fetched {
            items,
            max_updated_at,
            partial_error,
        } = self
            .fetch_all(since, |page_request| async move {
                adapter
                    .fetch_orders_page(&page_request)
                    .await
                    .map(|page| (page.items, page.next_cursor))
            })
            .await?;
        let fetched_count = items.len();

        let existing = self.storage.list_orders(&integration.store_id).await?;
        let mut merged = merge::merge_orders(&existing, items);
        self.assign_warehouses(integration, request, &mut merged)
            .await?;

        let merged_count = merged.len();
        self.storage
            .upsert_orders(merged)
            .await
            .map_err(SyncError::MergeFailed)?;

        if partial_error.is_none() {
            let mut state = sync_state.clone();
            state.orders_synced_at = max_updated_at.or(state.orders_synced_at);
            self.storage.set_sync_state(state).await?;
        }

        Ok(EntityReport {
            fetched: fetched_count,
            merged: merged_count,
            partial: partial_error.is_some(),
            error: partial_error,
        })
    }

    async fn sync_products(
        &self,
        integration: &Integration,
        adapter: &Arc<dyn EcommerceAdapter>,
        sync_state: &SyncState,
        since: Option<DateTime<Utc>>,
    ) -> Result<EntityReport, SyncError> {
        let Fetched {
            items,
            max_updated_at,
            partial_error,
        } = self
            .fetch_all(since, |page_request| async move {
                adapter
                    .fetch_products_page(&page_request)
                    .await
                    .map(|page| (page.items, page.next_cursor))
            })
            .await?;
        let fetched_count = items.len();

        let existing = self.storage.list_products(&integration.store_id).await?;
        let merged = merge::merge_products(&existing, items);

        let merged_count = merged.len();
        self.storage
            .upsert_products(merged)
            .await
            .map_err(SyncError::MergeFailed)?;

        if partial_error.is_none() {
            // Re-read: an orders pass in the same run may have advanced its
            // own watermark already.
            let mut state = self
                .storage
                .get_sync_state(&sync_state.store_id, &sync_state.integration_id)
                .await?
                .unwrap_or_else(|| sync_state.clone());
            state.products_synced_at = max_updated_at.or(state.products_synced_at);
            self.storage.set_sync_state(state).await?;
        }

        Ok(EntityReport {
            fetched: fetched_count,
            merged: merged_count,
            partial: partial_error.is_some(),
            error: partial_error,
        })
    }

    /// Fetch pages sequentially until the platform signals the end.
    ///
    /// A repeated cursor is treated as end-of-pagination (defensive stop
    /// against platforms that echo the final cursor forever). A failure or
    /// timeout on the first page is fatal; after at least one page it
    /// degrades to a partial result.
    async fn fetch_all<T, F, Fut>(
        &self,
        since: Option<DateTime<Utc>>,
        fetch_page: F,
    ) -> Result<Fetched<T>, SyncError>
    where
        T: HasUpdatedAt,
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<(Vec<T>, Option<String>), AdapterError>>,
    {
        let mut items: Vec<T> = Vec::new();
        let mut max_updated_at: Option<DateTime<Utc>> = None;
        let mut cursor: Option<String> = None;
        let mut partial_error: Option<String> = None;

        loop {
            let page_request = PageRequest {
                cursor: cursor.clone(),
                updated_since: since,
            };

            let result =
                tokio::time::timeout(self.page_timeout, fetch_page(page_request)).await;
            let (page_items, next_cursor) = match result {
                Ok(Ok(page)) => page,
                Ok(Err(error)) => {
                    if items.is_empty() {
                        return Err(SyncError::FetchFailed(error));
                    }
                    tracing::warn!(%error, pages_fetched = items.len(), "page fetch failed mid-sync, keeping partial batch");
                    partial_error = Some(error.to_string());
                    break;
                }
                Err(_) => {
                    if items.is_empty() {
                        return Err(SyncError::FetchTimeout(self.page_timeout));
                    }
                    tracing::warn!(timeout = ?self.page_timeout, "page fetch timed out mid-sync, keeping partial batch");
                    partial_error = Some(format!(
                        "page fetch timed out after {:?}",
                        self.page_timeout
                    ));
                    break;
                }
            };

            if page_items.is_empty() {
                break;
            }

            for item in &page_items {
                let updated = item.updated_at();
                if max_updated_at.is_none_or(|max| updated > max) {
                    max_updated_at = Some(updated);
                }
            }
            items.extend(page_items);

            match next_cursor {
                None => break,
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    tracing::warn!(cursor = %next, "platform repeated the pagination cursor, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
            }
        }

        Ok(Fetched {
            items,
            max_updated_at,
            partial_error,
        })
    }

    /// Route unassigned orders to a warehouse.
    ///
    /// An explicit warehouse on the request wins; otherwise the store's
    /// routing configuration decides. Orders that already carry an
    /// assignment are left alone.
    async fn assign_warehouses(
        &self,
        integration: &Integration,
        request: &SyncRequest,
        orders: &mut [Order],
    ) -> Result<(), SyncError> {
        if orders.iter().all(|o| o.warehouse_id.is_some()) {
            return Ok(());
        }

        if let Some(warehouse_id) = &request.warehouse_id {
            for order in orders.iter_mut().filter(|o| o.warehouse_id.is_none()) {
                order.warehouse_id = Some(warehouse_id.clone());
            }
            return Ok(());
        }

        let Some(config) = self
            .storage
            .get_warehouse_config(&integration.store_id)
            .await?
        else {
            return Ok(());
        };

        for order in orders.iter_mut().filter(|o| o.warehouse_id.is_none()) {
            order.warehouse_id = routing::resolve_warehouse(order, &config);
        }
        Ok(())
    }
}

/// Access to the watermark field shared by syncable entities.
trait HasUpdatedAt {
    fn updated_at(&self) -> DateTime<Utc>;
}

impl HasUpdatedAt for Order {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl HasUpdatedAt for Product {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use orderflow_core::{
        AccountId, ExternalId, FulfillmentStatus, IntegrationConfig, IntegrationFeatures,
        IntegrationId, IntegrationStatus, IntegrationType, OrderId, ProductId, ShippingAddress,
        StoreId, WarehouseConfig,
    };

    use crate::integrations::{ConnectionTest, IntegrationAdapter, Page};
    use crate::storage::MemoryStorage;
    use crate::vault::MemoryVault;

    use super::*;

    // =========================================================================
    // Scripted adapter
    // =========================================================================

    /// Adapter that replays a script of pages and records what it was asked.
    #[derive(Default)]
    struct ScriptedAdapter {
        order_pages: Mutex<VecDeque<Result<Page<Order>, AdapterError>>>,
        product_pages: Mutex<VecDeque<Result<Page<Product>, AdapterError>>>,
        requests: AtomicUsize,
        seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
        delay: Option<Duration>,
    }

    impl ScriptedAdapter {
        fn with_order_pages(pages: Vec<Result<Page<Order>, AdapterError>>) -> Self {
            Self {
                order_pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        fn with_product_pages(pages: Vec<Result<Page<Product>, AdapterError>>) -> Self {
            Self {
                product_pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        fn record(&self, request: &PageRequest) {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.seen_since.lock().unwrap().push(request.updated_since);
        }

        fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IntegrationAdapter for ScriptedAdapter {
        fn provider(&self) -> &'static str {
            "scripted"
        }

        async fn test_connection(&self) -> ConnectionTest {
            ConnectionTest::ok("scripted")
        }
    }

    #[async_trait::async_trait]
    impl EcommerceAdapter for ScriptedAdapter {
        async fn fetch_orders_page(
            &self,
            request: &PageRequest,
        ) -> Result<Page<Order>, AdapterError> {
            self.record(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.order_pages.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Page::empty()))
        }

        async fn fetch_products_page(
            &self,
            request: &PageRequest,
        ) -> Result<Page<Product>, AdapterError> {
            self.record(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.product_pages.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Page::empty()))
        }
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn ts(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(n)
    }

    fn integration() -> Integration {
        Integration {
            id: IntegrationId::new("int-1"),
            provider: "scripted".to_string(),
            integration_type: IntegrationType::Ecommerce,
            status: IntegrationStatus::Connected,
            enabled: true,
            store_id: StoreId::new("store-1"),
            account_id: AccountId::new("acct-1"),
            config: IntegrationConfig::Shopify {
                shop_domain: "demo.myshopify.com".to_string(),
                access_token: None,
            },
            features: IntegrationFeatures::ecommerce(),
            connected_at: Some(ts(0)),
            last_sync_at: None,
        }
    }

    fn order(n: u32, updated: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new(format!("store-1:{n}")),
            external_id: ExternalId::new(n.to_string()),
            store_id: StoreId::new("store-1"),
            integration_id: IntegrationId::new("int-1"),
            warehouse_id: None,
            order_number: format!("#{n}"),
            customer_name: "Customer".to_string(),
            shipping_address: ShippingAddress {
                province: Some("TX".to_string()),
                country_code: Some("US".to_string()),
                ..ShippingAddress::default()
            },
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            tracking_number: None,
            line_items: Vec::new(),
            total_price: "10.00".to_string(),
            currency: "USD".to_string(),
            created_at: updated,
            updated_at: updated,
        }
    }

    fn product(n: u32, updated: DateTime<Utc>) -> Product {
        Product {
            id: ProductId::new(format!("store-1:{n}")),
            external_id: ExternalId::new(n.to_string()),
            store_id: StoreId::new("store-1"),
            integration_id: IntegrationId::new("int-1"),
            sku: Some(format!("SKU-{n}")),
            title: format!("Product {n}"),
            warehouse_stock: Vec::new(),
            customized: false,
            created_at: updated,
            updated_at: updated,
        }
    }

    fn order_page(range: std::ops::Range<u32>, next_cursor: Option<&str>) -> Page<Order> {
        Page {
            items: range.map(|n| order(n, ts(i64::from(n)))).collect(),
            next_cursor: next_cursor.map(ToString::to_string),
        }
    }

    fn product_page(range: std::ops::Range<u32>, next_cursor: Option<&str>) -> Page<Product> {
        Page {
            items: range.map(|n| product(n, ts(i64::from(n)))).collect(),
            next_cursor: next_cursor.map(ToString::to_string),
        }
    }

    fn api_error() -> AdapterError {
        AdapterError::Api {
            status: 500,
            body: "upstream exploded".to_string(),
        }
    }

    fn request(sync_type: SyncType) -> SyncRequest {
        SyncRequest {
            sync_type,
            force_full_sync: false,
            warehouse_id: None,
        }
    }

    struct Fixture {
        storage: Arc<MemoryStorage>,
        orchestrator: SyncOrchestrator,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(AdapterRegistry::new(reqwest::Client::new(), None));
        let orchestrator = SyncOrchestrator::new(
            storage.clone(),
            Arc::new(MemoryVault::new()),
            registry,
            SyncGate::default(),
        );
        Fixture {
            storage,
            orchestrator,
        }
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    #[tokio::test]
    async fn test_fetch_walks_pages_until_empty_page() {
        let fx = fixture();
        let adapter: Arc<dyn EcommerceAdapter> = Arc::new(ScriptedAdapter::with_product_pages(
            vec![
                Ok(product_page(0..50, Some("page-2"))),
                Ok(product_page(50..100, Some("page-3"))),
                Ok(Page::empty()),
            ],
        ));
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        let report = fx
            .orchestrator
            .sync_products(&integration, &adapter, &state, None)
            .await
            .unwrap();

        assert_eq!(report.fetched, 100);
        assert_eq!(report.merged, 100);
        assert!(!report.partial);

        let stored = fx
            .storage
            .list_products(&integration.store_id)
            .await
            .unwrap();
        assert_eq!(stored.len(), 100);
    }

    #[tokio::test]
    async fn test_page_count_is_exactly_pages_plus_terminal_probe() {
        let fx = fixture();
        let scripted = Arc::new(ScriptedAdapter::with_product_pages(vec![
            Ok(product_page(0..50, Some("page-2"))),
            Ok(product_page(50..100, Some("page-3"))),
            Ok(Page::empty()),
        ]));
        let adapter: Arc<dyn EcommerceAdapter> = scripted.clone();
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        fx.orchestrator
            .sync_products(&integration, &adapter, &state, None)
            .await
            .unwrap();

        // Two full pages plus the empty terminal page, nothing refetched.
        assert_eq!(scripted.request_count(), 3);
    }

    #[tokio::test]
    async fn test_watermark_advances_to_max_updated_at_on_complete_fetch() {
        let fx = fixture();
        let adapter: Arc<dyn EcommerceAdapter> = Arc::new(ScriptedAdapter::with_product_pages(
            vec![Ok(product_page(0..100, None))],
        ));
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        fx.orchestrator
            .sync_products(&integration, &adapter, &state, None)
            .await
            .unwrap();

        let stored = fx
            .storage
            .get_sync_state(&integration.store_id, &integration.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.products_synced_at, Some(ts(99)));
        assert_eq!(stored.orders_synced_at, None);
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops_pagination() {
        let fx = fixture();
        let scripted = Arc::new(ScriptedAdapter::with_order_pages(vec![
            Ok(order_page(0..10, Some("echo"))),
            Ok(order_page(10..20, Some("echo"))),
            Ok(order_page(20..30, Some("echo"))),
        ]));
        let adapter: Arc<dyn EcommerceAdapter> = scripted.clone();
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        let report = fx
            .orchestrator
            .sync_orders(
                &integration,
                &adapter,
                &request(SyncType::Orders),
                &state,
                None,
            )
            .await
            .unwrap();

        // Second page echoed the cursor it was fetched with; the loop stops
        // instead of spinning on page three forever.
        assert_eq!(scripted.request_count(), 2);
        assert_eq!(report.fetched, 20);
        assert!(!report.partial);
    }

    #[tokio::test]
    async fn test_incremental_lower_bound_reaches_the_adapter() {
        let fx = fixture();
        let scripted = Arc::new(ScriptedAdapter::with_order_pages(vec![Ok(order_page(
            0..5,
            None,
        ))]));
        let adapter: Arc<dyn EcommerceAdapter> = scripted.clone();
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        fx.orchestrator
            .sync_orders(
                &integration,
                &adapter,
                &request(SyncType::Orders),
                &state,
                Some(ts(42)),
            )
            .await
            .unwrap();

        let seen = scripted.seen_since.lock().unwrap().clone();
        assert_eq!(seen, vec![Some(ts(42))]);
    }

    // =========================================================================
    // Failure policy
    // =========================================================================

    #[tokio::test]
    async fn test_first_page_failure_is_fatal() {
        let fx = fixture();
        let adapter: Arc<dyn EcommerceAdapter> =
            Arc::new(ScriptedAdapter::with_order_pages(vec![Err(api_error())]));
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        let result = fx
            .orchestrator
            .sync_orders(
                &integration,
                &adapter,
                &request(SyncType::Orders),
                &state,
                None,
            )
            .await;

        assert!(matches!(result, Err(SyncError::FetchFailed(_))));
        let stored = fx.storage.list_orders(&integration.store_id).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_mid_sync_failure_keeps_partial_batch_and_watermark() {
        let fx = fixture();
        let adapter: Arc<dyn EcommerceAdapter> = Arc::new(ScriptedAdapter::with_order_pages(
            vec![Ok(order_page(0..50, Some("page-2"))), Err(api_error())],
        ));
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        let report = fx
            .orchestrator
            .sync_orders(
                &integration,
                &adapter,
                &request(SyncType::Orders),
                &state,
                None,
            )
            .await
            .unwrap();

        assert!(report.partial);
        assert_eq!(report.fetched, 50);
        assert!(report.error.is_some());

        // The first page was merged anyway.
        let stored = fx.storage.list_orders(&integration.store_id).await.unwrap();
        assert_eq!(stored.len(), 50);

        // But the watermark did not move: the records beyond the failure
        // point must be picked up by the next run.
        let stored_state = fx
            .storage
            .get_sync_state(&integration.store_id, &integration.id)
            .await
            .unwrap();
        assert!(stored_state.is_none());
    }

    #[tokio::test]
    async fn test_first_page_timeout_is_fatal() {
        let fx = fixture();
        let scripted = ScriptedAdapter {
            order_pages: Mutex::new(vec![Ok(order_page(0..5, None))].into()),
            delay: Some(Duration::from_millis(200)),
            ..ScriptedAdapter::default()
        };
        let adapter: Arc<dyn EcommerceAdapter> = Arc::new(scripted);
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        let orchestrator = fx
            .orchestrator
            .with_page_timeout(Duration::from_millis(10));
        let result = orchestrator
            .sync_orders(
                &integration,
                &adapter,
                &request(SyncType::Orders),
                &state,
                None,
            )
            .await;

        assert!(matches!(result, Err(SyncError::FetchTimeout(_))));
    }

    // =========================================================================
    // Warehouse assignment and watermark isolation
    // =========================================================================

    #[tokio::test]
    async fn test_explicit_warehouse_on_request_wins() {
        let fx = fixture();
        let adapter: Arc<dyn EcommerceAdapter> =
            Arc::new(ScriptedAdapter::with_order_pages(vec![Ok(order_page(
                0..3,
                None,
            ))]));
        let integration = integration();
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());
        let request = SyncRequest {
            sync_type: SyncType::Orders,
            force_full_sync: false,
            warehouse_id: Some(WarehouseId::new("W9")),
        };

        fx.orchestrator
            .sync_orders(&integration, &adapter, &request, &state, None)
            .await
            .unwrap();

        let stored = fx.storage.list_orders(&integration.store_id).await.unwrap();
        assert!(
            stored
                .iter()
                .all(|o| o.warehouse_id == Some(WarehouseId::new("W9")))
        );
    }

    #[tokio::test]
    async fn test_store_routing_config_assigns_unrouted_orders() {
        let fx = fixture();
        let integration = integration();
        fx.storage
            .set_warehouse_config(
                &integration.store_id,
                WarehouseConfig::simple(Some(WarehouseId::new("W1")), None),
            )
            .await
            .unwrap();

        let adapter: Arc<dyn EcommerceAdapter> =
            Arc::new(ScriptedAdapter::with_order_pages(vec![Ok(order_page(
                0..3,
                None,
            ))]));
        let state = SyncState::empty(integration.store_id.clone(), integration.id.clone());

        fx.orchestrator
            .sync_orders(
                &integration,
                &adapter,
                &request(SyncType::Orders),
                &state,
                None,
            )
            .await
            .unwrap();

        let stored = fx.storage.list_orders(&integration.store_id).await.unwrap();
        assert!(
            stored
                .iter()
                .all(|o| o.warehouse_id == Some(WarehouseId::new("W1")))
        );
    }

    #[tokio::test]
    async fn test_product_watermark_does_not_clobber_order_watermark() {
        let fx = fixture();
        let integration = integration();
        let mut state = SyncState::empty(integration.store_id.clone(), integration.id.clone());
        state.orders_synced_at = Some(ts(500));
        fx.storage.set_sync_state(state.clone()).await.unwrap();

        let adapter: Arc<dyn EcommerceAdapter> = Arc::new(ScriptedAdapter::with_product_pages(
            vec![Ok(product_page(0..10, None))],
        ));

        fx.orchestrator
            .sync_products(&integration, &adapter, &state, None)
            .await
            .unwrap();

        let stored = fx
            .storage
            .get_sync_state(&integration.store_id, &integration.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.orders_synced_at, Some(ts(500)));
        assert_eq!(stored.products_synced_at, Some(ts(9)));
    }
}
