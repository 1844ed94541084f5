use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use evwarranty_core::{
    CompanyId, ComponentId, ReservationId, ServiceCenterId, StockId, TransferRequestId,
    TypeComponentId, WarehouseId,
};
use evwarranty_inventory::{
    Component, ComponentReservation, ComponentStatus, InventoryAdjustment, ReservationStatus,
    Stock, StockHistoryEntry, StockTransferRequest, TypeComponent, Warehouse, WarehouseOwner,
};

use super::r#trait::{
    InventoryStore, InventoryTx, ReservationFilter, StoreError, TransferFilter, UsageCount,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    warehouses: HashMap<WarehouseId, Warehouse>,
    type_components: HashMap<TypeComponentId, TypeComponent>,
    stocks: HashMap<StockId, Stock>,
    components: HashMap<ComponentId, Component>,
    serials: HashMap<String, ComponentId>,
    reservations: HashMap<ReservationId, ComponentReservation>,
    adjustments: Vec<InventoryAdjustment>,
    transfers: HashMap<TransferRequestId, StockTransferRequest>,
    history: Vec<StockHistoryEntry>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. A transaction holds the store-wide lock from
/// `begin` until commit or drop and works on a private copy of the tables, so
/// transactions are fully serialized and uncommitted writes are never seen.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn in_scope(warehouse_ids: Option<&[WarehouseId]>, id: WarehouseId) -> bool {
    warehouse_ids.is_none_or(|ids| ids.contains(&id))
}

#[async_trait]
impl InventoryTx for InMemoryTx {
    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<(), StoreError> {
        if self.working.warehouses.contains_key(&warehouse.id) {
            return Err(StoreError::UniqueViolation(format!("warehouse {}", warehouse.id)));
        }
        self.working
            .warehouses
            .insert(warehouse.id, warehouse.clone());
        Ok(())
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        Ok(self.working.warehouses.get(&id).cloned())
    }

    async fn list_warehouses(&mut self) -> Result<Vec<Warehouse>, StoreError> {
        let mut out: Vec<Warehouse> = self.working.warehouses.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn service_center_warehouse(
        &mut self,
        service_center_id: ServiceCenterId,
    ) -> Result<Option<Warehouse>, StoreError> {
        Ok(self
            .working
            .warehouses
            .values()
            .filter(|w| w.service_center_id() == Some(service_center_id))
            .min_by_key(|w| w.created_at)
            .cloned())
    }

    async fn central_warehouse(
        &mut self,
        company_id: CompanyId,
    ) -> Result<Option<Warehouse>, StoreError> {
        Ok(self
            .working
            .warehouses
            .values()
            .filter(|w| w.is_central && w.owner == WarehouseOwner::Company { company_id })
            .min_by_key(|w| w.created_at)
            .cloned())
    }

    async fn insert_type_component(&mut self, component: &TypeComponent) -> Result<(), StoreError> {
        if self
            .working
            .type_components
            .values()
            .any(|t| t.sku == component.sku)
        {
            return Err(StoreError::UniqueViolation(format!("sku {}", component.sku)));
        }
        self.working
            .type_components
            .insert(component.id, component.clone());
        Ok(())
    }

    async fn get_type_component(
        &mut self,
        id: TypeComponentId,
    ) -> Result<Option<TypeComponent>, StoreError> {
        Ok(self.working.type_components.get(&id).cloned())
    }

    async fn find_type_component_by_sku(
        &mut self,
        sku: &str,
    ) -> Result<Option<TypeComponent>, StoreError> {
        Ok(self
            .working
            .type_components
            .values()
            .find(|t| t.sku == sku)
            .cloned())
    }

    async fn get_or_create_stock(&mut self, candidate: &Stock) -> Result<Stock, StoreError> {
        if let Some(existing) = self
            .working
            .stocks
            .values()
            .find(|s| {
                s.warehouse_id == candidate.warehouse_id
                    && s.type_component_id == candidate.type_component_id
            })
        {
            return Ok(existing.clone());
        }
        self.working.stocks.insert(candidate.id, candidate.clone());
        Ok(candidate.clone())
    }

    async fn get_stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError> {
        Ok(self.working.stocks.get(&id).cloned())
    }

    async fn lock_stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError> {
        // The transaction already holds the store-wide lock.
        Ok(self.working.stocks.get(&id).cloned())
    }

    async fn find_stock(
        &mut self,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
    ) -> Result<Option<Stock>, StoreError> {
        Ok(self
            .working
            .stocks
            .values()
            .find(|s| s.warehouse_id == warehouse_id && s.type_component_id == type_component_id)
            .cloned())
    }

    async fn update_stock(&mut self, stock: &Stock) -> Result<(), StoreError> {
        match self.working.stocks.get_mut(&stock.id) {
            Some(row) => {
                *row = stock.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("stock {} does not exist", stock.id))),
        }
    }

    async fn list_stocks(
        &mut self,
        warehouse_ids: Option<&[WarehouseId]>,
    ) -> Result<Vec<Stock>, StoreError> {
        let mut out: Vec<Stock> = self
            .working
            .stocks
            .values()
            .filter(|s| in_scope(warehouse_ids, s.warehouse_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.warehouse_id
                .cmp(&b.warehouse_id)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(out)
    }

    async fn insert_component(&mut self, component: &Component) -> Result<bool, StoreError> {
        if self.working.serials.contains_key(&component.serial_number) {
            return Ok(false);
        }
        if self.working.components.contains_key(&component.id) {
            return Err(StoreError::UniqueViolation(format!("component {}", component.id)));
        }
        self.working
            .serials
            .insert(component.serial_number.clone(), component.id);
        self.working
            .components
            .insert(component.id, component.clone());
        Ok(true)
    }

    async fn update_component(&mut self, component: &Component) -> Result<(), StoreError> {
        match self.working.components.get_mut(&component.id) {
            Some(row) => {
                *row = component.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "component {} does not exist",
                component.id
            ))),
        }
    }

    async fn find_component_by_serial(
        &mut self,
        serial_number: &str,
    ) -> Result<Option<Component>, StoreError> {
        Ok(self
            .working
            .serials
            .get(serial_number)
            .and_then(|id| self.working.components.get(id))
            .cloned())
    }

    async fn lock_components(&mut self, ids: &[ComponentId]) -> Result<Vec<Component>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.components.get(id).cloned())
            .collect())
    }

    async fn lock_available_components(
        &mut self,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
        limit: i64,
    ) -> Result<Vec<Component>, StoreError> {
        let mut out: Vec<Component> = self
            .working
            .components
            .values()
            .filter(|c| {
                c.status == ComponentStatus::InStock
                    && c.warehouse_id == Some(warehouse_id)
                    && c.type_component_id == type_component_id
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn insert_reservation(
        &mut self,
        reservation: &ComponentReservation,
    ) -> Result<(), StoreError> {
        let id = reservation.id_typed();
        if self.working.reservations.contains_key(&id) {
            return Err(StoreError::UniqueViolation(format!("reservation {id}")));
        }
        self.working.reservations.insert(id, reservation.clone());
        Ok(())
    }

    async fn update_reservation(
        &mut self,
        reservation: &ComponentReservation,
    ) -> Result<(), StoreError> {
        self.working
            .reservations
            .insert(reservation.id_typed(), reservation.clone());
        Ok(())
    }

    async fn get_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<ComponentReservation>, StoreError> {
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn lock_reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<ComponentReservation>, StoreError> {
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn list_reservations(
        &mut self,
        filter: &ReservationFilter,
    ) -> Result<Vec<ComponentReservation>, StoreError> {
        let mut out: Vec<ComponentReservation> = self
            .working
            .reservations
            .values()
            .filter(|r| filter.case_line_id.is_none_or(|id| r.case_line_id() == Some(id)))
            .filter(|r| filter.status.is_none_or(|s| r.status() == s))
            .filter(|r| match (&filter.warehouse_ids, r.warehouse_id()) {
                (None, _) => true,
                (Some(ids), Some(w)) => ids.contains(&w),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.reserved_at().cmp(&b.reserved_at()).then(a.id_typed().cmp(&b.id_typed())));
        Ok(out)
    }

    async fn installed_usage(
        &mut self,
        warehouse_ids: Option<&[WarehouseId]>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageCount>, StoreError> {
        let mut by_type: HashMap<TypeComponentId, UsageCount> = HashMap::new();
        for r in self.working.reservations.values() {
            if r.status() != ReservationStatus::Installed {
                continue;
            }
            let (Some(type_component_id), Some(warehouse_id)) =
                (r.type_component_id(), r.warehouse_id())
            else {
                continue;
            };
            if !in_scope(warehouse_ids, warehouse_id) {
                continue;
            }
            if let (Some(since), Some(at)) = (since, r.installed_at()) {
                if at < since {
                    continue;
                }
            }
            let usage = by_type.entry(type_component_id).or_insert(UsageCount {
                type_component_id,
                installations: 0,
                quantity: 0,
            });
            usage.installations += 1;
            usage.quantity += r.quantity();
        }
        let mut out: Vec<UsageCount> = by_type.into_values().collect();
        out.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(b.installations.cmp(&a.installations))
                .then(a.type_component_id.cmp(&b.type_component_id))
        });
        Ok(out)
    }

    async fn insert_adjustment(
        &mut self,
        adjustment: &InventoryAdjustment,
    ) -> Result<(), StoreError> {
        self.working.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn list_adjustments(
        &mut self,
        stock_id: StockId,
    ) -> Result<Vec<InventoryAdjustment>, StoreError> {
        Ok(self
            .working
            .adjustments
            .iter()
            .filter(|a| a.stock_id == stock_id)
            .cloned()
            .collect())
    }

    async fn insert_transfer(&mut self, request: &StockTransferRequest) -> Result<(), StoreError> {
        let id = request.id_typed();
        if self.working.transfers.contains_key(&id) {
            return Err(StoreError::UniqueViolation(format!("transfer request {id}")));
        }
        self.working.transfers.insert(id, request.clone());
        Ok(())
    }

    async fn update_transfer(&mut self, request: &StockTransferRequest) -> Result<(), StoreError> {
        self.working
            .transfers
            .insert(request.id_typed(), request.clone());
        Ok(())
    }

    async fn get_transfer(
        &mut self,
        id: TransferRequestId,
    ) -> Result<Option<StockTransferRequest>, StoreError> {
        Ok(self.working.transfers.get(&id).cloned())
    }

    async fn lock_transfer(
        &mut self,
        id: TransferRequestId,
    ) -> Result<Option<StockTransferRequest>, StoreError> {
        Ok(self.working.transfers.get(&id).cloned())
    }

    async fn list_transfers(
        &mut self,
        filter: &TransferFilter,
    ) -> Result<Vec<StockTransferRequest>, StoreError> {
        let mut out: Vec<StockTransferRequest> = self
            .working
            .transfers
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status() == s))
            .filter(|t| match &filter.warehouse_ids {
                None => true,
                Some(ids) => {
                    t.requesting_warehouse_id().is_some_and(|w| ids.contains(&w))
                        || t.sourcing_warehouse_id().is_some_and(|w| ids.contains(&w))
                }
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.requested_at()
                .cmp(&a.requested_at())
                .then(b.id_typed().cmp(&a.id_typed()))
        });
        Ok(out)
    }

    async fn append_history(&mut self, entry: &StockHistoryEntry) -> Result<(), StoreError> {
        self.working.history.push(entry.clone());
        Ok(())
    }

    async fn history_page(
        &mut self,
        stock_id: StockId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<StockHistoryEntry>, i64), StoreError> {
        let entries: Vec<&StockHistoryEntry> = self
            .working
            .history
            .iter()
            .filter(|e| e.stock_id == stock_id)
            .collect();
        let total = entries.len() as i64;
        let page = entries
            .into_iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(warehouse_id: WarehouseId, type_component_id: TypeComponentId) -> Stock {
        Stock::new(StockId::new(), warehouse_id, type_component_id, 5, Utc::now())
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = InMemoryInventoryStore::new();
        let w = Warehouse::for_company(WarehouseId::new(), "Central", CompanyId::new(), true, Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_warehouse(&w).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_warehouse(w.id).await.unwrap().is_none());
        tx.insert_warehouse(&w).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_warehouse(w.id).await.unwrap(), Some(w));
    }

    #[tokio::test]
    async fn get_or_create_stock_keeps_the_first_row() {
        let store = InMemoryInventoryStore::new();
        let (w, t) = (WarehouseId::new(), TypeComponentId::new());
        let first = bucket(w, t);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_or_create_stock(&first).await.unwrap().id, first.id);
        let again = tx.get_or_create_stock(&bucket(w, t)).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(tx.list_stocks(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn serial_numbers_are_unique() {
        let store = InMemoryInventoryStore::new();
        let (w, t) = (WarehouseId::new(), TypeComponentId::new());
        let mut tx = store.begin().await.unwrap();
        let a = Component::received(ComponentId::new(), "SN-1".into(), t, w, Utc::now());
        let b = Component::received(ComponentId::new(), "SN-1".into(), t, w, Utc::now());
        assert!(tx.insert_component(&a).await.unwrap());
        assert!(!tx.insert_component(&b).await.unwrap());
        assert_eq!(
            tx.find_component_by_serial("SN-1").await.unwrap().map(|c| c.id),
            Some(a.id)
        );
    }
}
