use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use evwarranty_core::{
    CaseLineId, CompanyId, ComponentId, ReservationId, ServiceCenterId, StockId,
    TransferRequestId, TypeComponentId, WarehouseId,
};
use evwarranty_inventory::{
    Component, ComponentReservation, InventoryAdjustment, ReservationStatus, Stock,
    StockHistoryEntry, StockTransferRequest, TransferStatus, TypeComponent, Warehouse,
};

/// Storage failure.
///
/// These are infrastructure errors, as opposed to domain errors (validation,
/// invariants, state transitions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (e.g. a serial number that already exists).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored row could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub case_line_id: Option<CaseLineId>,
    pub warehouse_ids: Option<Vec<WarehouseId>>,
    pub status: Option<ReservationStatus>,
}

/// `warehouse_ids` matches either side of the transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFilter {
    pub warehouse_ids: Option<Vec<WarehouseId>>,
    pub status: Option<TransferStatus>,
}

/// Installed-component usage for one component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCount {
    pub type_component_id: TypeComponentId,
    pub installations: i64,
    pub quantity: i64,
}

/// Transactional access to the inventory tables.
///
/// Every engine operation runs inside one `InventoryTx`: reads and writes are
/// invisible to other transactions until [`InventoryTx::commit`]. Dropping the
/// transaction without committing discards every write.
///
/// `lock_*` methods take a row lock (`SELECT ... FOR UPDATE` on Postgres) that
/// is held until commit or rollback.
#[async_trait]
pub trait InventoryTx: Send {
    // catalog
    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<(), StoreError>;
    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError>;
    async fn list_warehouses(&mut self) -> Result<Vec<Warehouse>, StoreError>;
    async fn service_center_warehouse(
        &mut self,
        service_center_id: ServiceCenterId,
    ) -> Result<Option<Warehouse>, StoreError>;
    async fn central_warehouse(
        &mut self,
        company_id: CompanyId,
    ) -> Result<Option<Warehouse>, StoreError>;
    async fn insert_type_component(&mut self, component: &TypeComponent) -> Result<(), StoreError>;
    async fn get_type_component(
        &mut self,
        id: TypeComponentId,
    ) -> Result<Option<TypeComponent>, StoreError>;
    async fn find_type_component_by_sku(
        &mut self,
        sku: &str,
    ) -> Result<Option<TypeComponent>, StoreError>;

    // stock buckets
    /// Insert `candidate` unless a bucket already exists for its
    /// `(warehouse, type component)` pair; return whichever row is stored.
    async fn get_or_create_stock(&mut self, candidate: &Stock) -> Result<Stock, StoreError>;
    async fn get_stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError>;
    async fn lock_stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError>;
    async fn find_stock(
        &mut self,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
    ) -> Result<Option<Stock>, StoreError>;
    async fn update_stock(&mut self, stock: &Stock) -> Result<(), StoreError>;
    /// `None` lists every bucket.
    async fn list_stocks(
        &mut self,
        warehouse_ids: Option<&[WarehouseId]>,
    ) -> Result<Vec<Stock>, StoreError>;

    // components
    /// Returns `false` and writes nothing when the serial number is already
    /// taken. The transaction stays usable either way.
    async fn insert_component(&mut self, component: &Component) -> Result<bool, StoreError>;
    async fn update_component(&mut self, component: &Component) -> Result<(), StoreError>;
    async fn find_component_by_serial(
        &mut self,
        serial_number: &str,
    ) -> Result<Option<Component>, StoreError>;
    async fn lock_components(&mut self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError>;
    /// IN_STOCK units of one type in one warehouse, oldest first, locked.
    async fn lock_available_components(
        &mut self,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
        limit: i64,
    ) -> Result<Vec<Component>, StoreError>;

    // reservations
    async fn insert_reservation(&mut self, reservation: &ComponentReservation)
    -> Result<(), StoreError>;
    async fn update_reservation(&mut self, reservation: &ComponentReservation)
    -> Result<(), StoreError>;
    async fn get_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<ComponentReservation>, StoreError>;
    async fn lock_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<ComponentReservation>, StoreError>;
    async fn list_reservations(
        &mut self,
        filter: &ReservationFilter,
    ) -> Result<Vec<ComponentReservation>, StoreError>;
    /// INSTALLED reservations grouped by component type, most used first.
    async fn installed_usage(
        &mut self,
        warehouse_ids: Option<&[WarehouseId]>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageCount>, StoreError>;

    // adjustments (append-only)
    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment)
    -> Result<(), StoreError>;
    async fn list_adjustments(
        &mut self,
        stock_id: StockId,
    ) -> Result<Vec<InventoryAdjustment>, StoreError>;

    // transfer requests
    async fn insert_transfer(&mut self, request: &StockTransferRequest) -> Result<(), StoreError>;
    async fn update_transfer(&mut self, request: &StockTransferRequest) -> Result<(), StoreError>;
    async fn get_transfer(
        &mut self,
        id: TransferRequestId,
    ) -> Result<Option<StockTransferRequest>, StoreError>;
    async fn lock_transfer(
        &mut self,
        id: TransferRequestId,
    ) -> Result<Option<StockTransferRequest>, StoreError>;
    async fn list_transfers(
        &mut self,
        filter: &TransferFilter,
    ) -> Result<Vec<StockTransferRequest>, StoreError>;

    // history (append-only)
    async fn append_history(&mut self, entry: &StockHistoryEntry) -> Result<(), StoreError>;
    /// Newest first. Returns the page and the total entry count for the bucket.
    async fn history_page(
        &mut self,
        stock_id: StockId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<StockHistoryEntry>, i64), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Transaction factory.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for std::sync::Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        (**self).begin().await
    }
}
