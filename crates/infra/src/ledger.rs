//! Stock ledger: the single choke point for stock quantity changes.
//!
//! Reservation, adjustment and transfer code never writes the counters of a
//! [`Stock`] themselves; they describe the change as a [`QuantityChange`] and
//! call [`StockLedger::adjust_quantities`] inside their own transaction. The
//! ledger locks the bucket, applies both deltas atomically, runs the low-stock
//! hook, persists the row and appends exactly one history entry.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use evwarranty_core::{
    DomainError, ExpectedVersion, HistoryEntryId, StockId, TypeComponentId, UserId, WarehouseId,
};
use evwarranty_inventory::{HistoryCause, LowStockSignal, Stock, StockHistoryEntry};

use crate::config::InventoryConfig;
use crate::error::InventoryResult;
use crate::notify::{Notification, Outbox};
use crate::store::InventoryTx;

/// One quantity mutation, described by its cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityChange {
    pub delta_in_stock: i64,
    pub delta_reserved: i64,
    pub expected_version: ExpectedVersion,
    pub cause: HistoryCause,
    /// Adjustment, reservation or transfer request behind the change.
    pub reference_id: Uuid,
    pub actor: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl QuantityChange {
    pub fn new(
        cause: HistoryCause,
        reference_id: impl Into<Uuid>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            delta_in_stock: 0,
            delta_reserved: 0,
            expected_version: ExpectedVersion::Any,
            cause,
            reference_id: reference_id.into(),
            actor,
            note: None,
            occurred_at,
        }
    }

    pub fn in_stock(mut self, delta: i64) -> Self {
        self.delta_in_stock = delta;
        self
    }

    pub fn reserved(mut self, delta: i64) -> Self {
        self.delta_reserved = delta;
        self
    }

    pub fn expecting(mut self, version: ExpectedVersion) -> Self {
        self.expected_version = version;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StockLedger {
    default_reorder_point: i64,
    low_stock_cooldown: Duration,
}

impl StockLedger {
    pub fn new(default_reorder_point: i64, low_stock_cooldown: Duration) -> Self {
        Self {
            default_reorder_point: default_reorder_point.max(0),
            low_stock_cooldown,
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(config.default_reorder_point, config.low_stock_cooldown)
    }

    /// Return the bucket for `(warehouse, type)`, creating an empty one on
    /// first use. Safe under concurrent creators: the store does an
    /// insert-or-fetch against the unique key, so there is never a second row.
    pub async fn get_or_create_stock(
        &self,
        tx: &mut dyn InventoryTx,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
    ) -> InventoryResult<Stock> {
        if tx.get_warehouse(warehouse_id).await?.is_none() {
            return Err(DomainError::not_found(format!("warehouse {warehouse_id}")).into());
        }
        if tx.get_type_component(type_component_id).await?.is_none() {
            return Err(DomainError::not_found(format!("type component {type_component_id}")).into());
        }

        let candidate = Stock::new(
            StockId::new(),
            warehouse_id,
            type_component_id,
            self.default_reorder_point,
            Utc::now(),
        );
        Ok(tx.get_or_create_stock(&candidate).await?)
    }

    /// Lock the bucket row for the rest of the transaction.
    pub async fn lock(&self, tx: &mut dyn InventoryTx, stock_id: StockId) -> InventoryResult<Stock> {
        tx.lock_stock(stock_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("stock {stock_id}")).into())
    }

    /// Lock several buckets, always in ascending id order. Duplicates are
    /// locked once; the result follows the same order.
    pub async fn lock_many(
        &self,
        tx: &mut dyn InventoryTx,
        stock_ids: &[StockId],
    ) -> InventoryResult<Vec<Stock>> {
        let mut ids = stock_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let mut locked = Vec::with_capacity(ids.len());
        for id in ids {
            locked.push(self.lock(tx, id).await?);
        }
        Ok(locked)
    }

    /// Apply `change` to the bucket. Fails with `InvariantViolation` (and
    /// writes nothing) if either counter would go negative or reserved would
    /// exceed in-stock; fails with `Conflict` on a stale expected version.
    #[instrument(
        skip(self, tx, change, outbox),
        fields(
            stock_id = %stock_id,
            cause = change.cause.as_str(),
            delta_in_stock = change.delta_in_stock,
            delta_reserved = change.delta_reserved
        ),
        err
    )]
    pub async fn adjust_quantities(
        &self,
        tx: &mut dyn InventoryTx,
        stock_id: StockId,
        change: QuantityChange,
        outbox: &mut Outbox,
    ) -> InventoryResult<Stock> {
        let mut stock = self.lock(tx, stock_id).await?;
        change.expected_version.check(stock.version())?;

        if let Err(err) = stock.apply_delta(change.delta_in_stock, change.delta_reserved, change.occurred_at) {
            if let DomainError::InvariantViolation(msg) = &err {
                error!(
                    stock_id = %stock_id,
                    in_stock = stock.quantity_in_stock(),
                    reserved = stock.quantity_reserved(),
                    "stock invariant violated: {msg}"
                );
            }
            return Err(err.into());
        }

        self.recompute_low_stock(&mut stock, change.occurred_at, outbox);
        tx.update_stock(&stock).await?;

        let entry = StockHistoryEntry {
            id: HistoryEntryId::new(),
            stock_id,
            cause: change.cause,
            reference_id: change.reference_id,
            delta_in_stock: change.delta_in_stock,
            delta_reserved: change.delta_reserved,
            in_stock_after: stock.quantity_in_stock(),
            reserved_after: stock.quantity_reserved(),
            actor_id: change.actor,
            note: change.note,
            occurred_at: change.occurred_at,
        };
        tx.append_history(&entry).await?;

        debug!(
            in_stock = stock.quantity_in_stock(),
            reserved = stock.quantity_reserved(),
            version = stock.version(),
            "stock quantities updated"
        );
        Ok(stock)
    }

    /// Low-stock hook. Queues an alert when the bucket is (still) low and the
    /// cooldown elapsed; clears the flag once it recovers. The caller persists
    /// `stock`.
    pub fn recompute_low_stock(
        &self,
        stock: &mut Stock,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> LowStockSignal {
        let signal = stock.refresh_low_stock(now, self.low_stock_cooldown);
        if signal == LowStockSignal::Raised {
            outbox.push(Notification::LowStock {
                stock_id: stock.id,
                warehouse_id: stock.warehouse_id,
                type_component_id: stock.type_component_id,
                quantity_available: stock.quantity_available(),
                reorder_point: stock.reorder_point,
                occurred_at: now,
            });
        }
        signal
    }

    /// Change the reorder point and re-run the low-stock hook.
    pub async fn set_reorder_point(
        &self,
        tx: &mut dyn InventoryTx,
        stock_id: StockId,
        reorder_point: i64,
        outbox: &mut Outbox,
    ) -> InventoryResult<Stock> {
        if reorder_point < 0 {
            return Err(DomainError::validation("reorder point cannot be negative").into());
        }
        let mut stock = self.lock(tx, stock_id).await?;
        let now = Utc::now();
        stock.reorder_point = reorder_point;
        stock.updated_at = now;
        self.recompute_low_stock(&mut stock, now, outbox);
        tx.update_stock(&stock).await?;
        Ok(stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryInventoryStore, InventoryStore};
    use evwarranty_core::CompanyId;
    use evwarranty_inventory::{TypeComponent, Warehouse};

    async fn seeded(store: &InMemoryInventoryStore) -> (WarehouseId, TypeComponentId) {
        let mut tx = store.begin().await.unwrap();
        let warehouse = Warehouse::for_company(WarehouseId::new(), "Main", CompanyId::new(), true, Utc::now());
        let tc = TypeComponent::new(TypeComponentId::new(), "brake_pad", "Brake pad", "brakes", 1_500).unwrap();
        tx.insert_warehouse(&warehouse).await.unwrap();
        tx.insert_type_component(&tc).await.unwrap();
        tx.commit().await.unwrap();
        (warehouse.id, tc.id)
    }

    fn change(cause: HistoryCause) -> QuantityChange {
        QuantityChange::new(cause, Uuid::now_v7(), UserId::new(), Utc::now())
    }

    #[tokio::test]
    async fn invariant_violation_leaves_bucket_untouched() {
        let store = InMemoryInventoryStore::new();
        let (w, t) = seeded(&store).await;
        let ledger = StockLedger::new(0, Duration::hours(2));
        let mut outbox = Outbox::new();

        let mut tx = store.begin().await.unwrap();
        let stock = ledger.get_or_create_stock(tx.as_mut(), w, t).await.unwrap();
        ledger
            .adjust_quantities(tx.as_mut(), stock.id, change(HistoryCause::AdjustmentIn).in_stock(2), &mut outbox)
            .await
            .unwrap();

        let err = ledger
            .adjust_quantities(tx.as_mut(), stock.id, change(HistoryCause::ReservationCreated).reserved(3), &mut outbox)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invariant_violation");

        let after = tx.get_stock(stock.id).await.unwrap().unwrap();
        assert_eq!((after.quantity_in_stock(), after.quantity_reserved()), (2, 0));
        let (entries, total) = tx.history_page(stock.id, 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].in_stock_after, 2);
    }

    #[tokio::test]
    async fn stale_expected_version_is_a_conflict() {
        let store = InMemoryInventoryStore::new();
        let (w, t) = seeded(&store).await;
        let ledger = StockLedger::new(0, Duration::hours(2));
        let mut outbox = Outbox::new();

        let mut tx = store.begin().await.unwrap();
        let stock = ledger.get_or_create_stock(tx.as_mut(), w, t).await.unwrap();
        let err = ledger
            .adjust_quantities(
                tx.as_mut(),
                stock.id,
                change(HistoryCause::AdjustmentIn)
                    .in_stock(1)
                    .expecting(ExpectedVersion::Exact(stock.version() + 1)),
                &mut outbox,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn low_stock_alert_respects_cooldown_and_clears_on_recovery() {
        let store = InMemoryInventoryStore::new();
        let (w, t) = seeded(&store).await;
        let ledger = StockLedger::new(2, Duration::hours(2));
        let mut outbox = Outbox::new();

        let mut tx = store.begin().await.unwrap();
        let stock = ledger.get_or_create_stock(tx.as_mut(), w, t).await.unwrap();

        // 0 -> 1 available: low, first alert.
        ledger
            .adjust_quantities(tx.as_mut(), stock.id, change(HistoryCause::AdjustmentIn).in_stock(1), &mut outbox)
            .await
            .unwrap();
        // 1 -> 2 available: still low, inside the cooldown.
        ledger
            .adjust_quantities(tx.as_mut(), stock.id, change(HistoryCause::AdjustmentIn).in_stock(1), &mut outbox)
            .await
            .unwrap();
        assert_eq!(outbox.len(), 1);

        // 2 -> 5 available: recovered, flag cleared.
        let recovered = ledger
            .adjust_quantities(tx.as_mut(), stock.id, change(HistoryCause::AdjustmentIn).in_stock(3), &mut outbox)
            .await
            .unwrap();
        assert!(recovered.low_stock_notified_at.is_none());

        // Dropping back under the reorder point alerts again.
        ledger
            .adjust_quantities(tx.as_mut(), stock.id, change(HistoryCause::AdjustmentOut).in_stock(-4), &mut outbox)
            .await
            .unwrap();
        assert_eq!(outbox.len(), 2);
        assert!(outbox.iter().all(|n| matches!(n, Notification::LowStock { .. })));
    }

    #[tokio::test]
    async fn lock_many_locks_each_bucket_once_in_id_order() {
        let store = InMemoryInventoryStore::new();
        let (w, t) = seeded(&store).await;
        let ledger = StockLedger::new(0, Duration::hours(2));

        let mut tx = store.begin().await.unwrap();
        let other = TypeComponent::new(TypeComponentId::new(), "rotor", "Rotor", "brakes", 9_000).unwrap();
        tx.insert_type_component(&other).await.unwrap();
        let a = ledger.get_or_create_stock(tx.as_mut(), w, t).await.unwrap();
        let b = ledger.get_or_create_stock(tx.as_mut(), w, other.id).await.unwrap();
        let (low, high) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };

        let locked = ledger
            .lock_many(tx.as_mut(), &[high, low, high])
            .await
            .unwrap();
        assert_eq!(locked.iter().map(|s| s.id).collect::<Vec<_>>(), vec![low, high]);

        let err = ledger
            .lock_many(tx.as_mut(), &[low, StockId::new()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn unknown_warehouse_is_not_found() {
        let store = InMemoryInventoryStore::new();
        let (_, t) = seeded(&store).await;
        let ledger = StockLedger::new(0, Duration::hours(2));

        let mut tx = store.begin().await.unwrap();
        let err = ledger
            .get_or_create_stock(tx.as_mut(), WarehouseId::new(), t)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
