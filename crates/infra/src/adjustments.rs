//! Adjustment engine: audited IN/OUT corrections of physical stock.
//!
//! Every adjustment is written once as an [`InventoryAdjustment`] with one line
//! per serialized unit and is never updated afterwards. The quantity change
//! goes through the stock ledger in the same transaction.
//!
//! The unit-level helpers at the bottom of this module are shared with the
//! transfer engine, which records shipments (OUT) and receipts (IN) as
//! adjustments too.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use evwarranty_auth::{Action, Actor};
use evwarranty_core::{
    AdjustmentId, ComponentId, DomainError, StockId, TransferRequestId, UserId, WarehouseId,
};
use evwarranty_inventory::{
    AdjustmentLine, AdjustmentType, Component, ComponentStatus, HistoryCause,
    InventoryAdjustment, Stock, StockHistoryEntry, normalize_serial, normalize_sku,
    validate_reason, validate_serials,
};

use crate::access;
use crate::error::{InventoryError, InventoryResult};
use crate::ledger::{QuantityChange, StockLedger};
use crate::notify::{Notification, NotificationSink, Outbox};
use crate::store::{InventoryStore, InventoryTx};

/// Input for [`AdjustmentEngine::create_adjustment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentRequest {
    pub stock_id: StockId,
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub note: Option<String>,
    pub serial_numbers: Vec<String>,
}

/// One `{sku, serialNumber}` pair from a pre-parsed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSerial {
    pub sku: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAdjustmentRequest {
    pub warehouse_id: WarehouseId,
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub note: Option<String>,
    pub components: Vec<SkuSerial>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BulkItemResult {
    Applied { adjustment_id: AdjustmentId },
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemOutcome {
    pub sku: String,
    pub serial_number: String,
    #[serde(flatten)]
    pub result: BulkItemResult,
}

impl BulkItemOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.result, BulkItemResult::Applied { .. })
    }
}

/// Per-item report of a bulk adjustment, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAdjustmentReport {
    pub items: Vec<BulkItemOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<StockHistoryEntry>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Clone)]
pub struct AdjustmentEngine {
    store: Arc<dyn InventoryStore>,
    ledger: StockLedger,
    sink: Arc<dyn NotificationSink>,
    max_history_page_size: u32,
}

impl AdjustmentEngine {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        ledger: StockLedger,
        sink: Arc<dyn NotificationSink>,
        max_history_page_size: u32,
    ) -> Self {
        Self {
            store,
            ledger,
            sink,
            max_history_page_size: max_history_page_size.max(1),
        }
    }

    /// Apply one IN or OUT adjustment to a bucket, atomically.
    ///
    /// IN creates one `IN_STOCK` component per serial. OUT requires every
    /// serial to be an `IN_STOCK` unit of this bucket and marks it `REMOVED`.
    #[instrument(
        skip(self, actor, request),
        fields(
            user_id = %actor.user_id,
            stock_id = %request.stock_id,
            adjustment_type = request.adjustment_type.as_str(),
            units = request.serial_numbers.len()
        ),
        err
    )]
    pub async fn create_adjustment(
        &self,
        actor: &Actor,
        request: AdjustmentRequest,
    ) -> InventoryResult<(InventoryAdjustment, Stock)> {
        access::require(actor, Action::AdjustStock)?;
        let reason = validate_reason(&request.reason)?;
        let serials = validate_serials(&request.serial_numbers)?;

        let mut tx = self.store.begin().await?;
        let stock = self.ledger.lock(tx.as_mut(), request.stock_id).await?;
        access::accessible_warehouse(tx.as_mut(), actor, stock.warehouse_id).await?;

        let now = Utc::now();
        let header = AdjustmentHeader {
            adjustment_type: request.adjustment_type,
            reason,
            note: clean_note(request.note),
            adjusted_by: actor.user_id,
            adjusted_at: now,
            transfer_request_id: None,
        };
        let mut outbox = Outbox::new();
        let (adjustment, stock) =
            apply_serials(&self.ledger, tx.as_mut(), &stock, header, &serials, &mut outbox).await?;

        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(adjustment_id = %adjustment.id, delta = adjustment.quantity_delta(), "adjustment recorded");
        Ok((adjustment, stock))
    }

    /// Apply a pre-parsed `{sku, serial}` upload.
    ///
    /// Items are grouped by SKU; each group is its own transaction. A serial
    /// that is already taken (IN) or not removable (OUT) fails on its own and
    /// the rest of its group is still applied. Never fails as a whole once
    /// the caller's role and warehouse check passed.
    #[instrument(
        skip(self, actor, request),
        fields(
            user_id = %actor.user_id,
            warehouse_id = %request.warehouse_id,
            adjustment_type = request.adjustment_type.as_str(),
            items = request.components.len()
        ),
        err
    )]
    pub async fn create_bulk_adjustments(
        &self,
        actor: &Actor,
        request: BulkAdjustmentRequest,
    ) -> InventoryResult<BulkAdjustmentReport> {
        access::require(actor, Action::AdjustStock)?;
        let reason = validate_reason(&request.reason)?;
        {
            let mut tx = self.store.begin().await?;
            access::accessible_warehouse(tx.as_mut(), actor, request.warehouse_id).await?;
            tx.rollback().await?;
        }

        let mut outcomes: Vec<Option<BulkItemOutcome>> = vec![None; request.components.len()];
        let mut seen_serials = HashSet::new();
        // SKU -> (input index, serial) in input order.
        let mut groups: Vec<(String, Vec<(usize, String)>)> = Vec::new();

        for (idx, item) in request.components.iter().enumerate() {
            let fail = |err: DomainError| {
                Some(failed_outcome(&item.sku, &item.serial_number, &InventoryError::from(err)))
            };
            let Some(sku) = normalize_sku(&item.sku) else {
                outcomes[idx] = fail(DomainError::validation("SKU cannot be blank"));
                continue;
            };
            let Some(serial) = normalize_serial(&item.serial_number) else {
                outcomes[idx] = fail(DomainError::validation("serial number cannot be blank"));
                continue;
            };
            if !seen_serials.insert(serial.clone()) {
                outcomes[idx] = fail(DomainError::duplicate_serial(serial));
                continue;
            }
            match groups.iter_mut().find(|(s, _)| *s == sku) {
                Some((_, members)) => members.push((idx, serial)),
                None => groups.push((sku, vec![(idx, serial)])),
            }
        }

        let note = clean_note(request.note);
        for (sku, members) in groups {
            let header = AdjustmentHeader {
                adjustment_type: request.adjustment_type,
                reason: reason.clone(),
                note: note.clone(),
                adjusted_by: actor.user_id,
                adjusted_at: Utc::now(),
                transfer_request_id: None,
            };
            let results = self
                .apply_sku_group(request.warehouse_id, &sku, &members, header)
                .await;
            for ((idx, _), result) in members.iter().zip(results) {
                let item = &request.components[*idx];
                outcomes[*idx] = Some(match result {
                    Ok(adjustment_id) => BulkItemOutcome {
                        sku: item.sku.clone(),
                        serial_number: item.serial_number.clone(),
                        result: BulkItemResult::Applied { adjustment_id },
                    },
                    Err(err) => failed_outcome(&item.sku, &item.serial_number, &err),
                });
            }
        }

        let items: Vec<BulkItemOutcome> = outcomes.into_iter().flatten().collect();
        let succeeded = items.iter().filter(|o| o.is_applied()).count();
        let failed = items.len() - succeeded;
        info!(succeeded, failed, "bulk adjustment finished");
        Ok(BulkAdjustmentReport {
            items,
            succeeded,
            failed,
        })
    }

    /// One SKU group of a bulk upload. Returns one result per member, in order.
    async fn apply_sku_group(
        &self,
        warehouse_id: WarehouseId,
        sku: &str,
        members: &[(usize, String)],
        header: AdjustmentHeader,
    ) -> Vec<Result<AdjustmentId, InventoryError>> {
        let mut outbox = Outbox::new();
        match self
            .try_apply_sku_group(warehouse_id, sku, members, header, &mut outbox)
            .await
        {
            Ok(results) => {
                outbox.flush(self.sink.as_ref());
                results
            }
            Err(err) => {
                warn!(sku, error = %err, "bulk adjustment group failed");
                members.iter().map(|_| Err(err.clone())).collect()
            }
        }
    }

    async fn try_apply_sku_group(
        &self,
        warehouse_id: WarehouseId,
        sku: &str,
        members: &[(usize, String)],
        header: AdjustmentHeader,
        outbox: &mut Outbox,
    ) -> InventoryResult<Vec<Result<AdjustmentId, InventoryError>>> {
        let mut tx = self.store.begin().await?;
        let type_component = tx
            .find_type_component_by_sku(sku)
            .await?
            .ok_or_else(|| DomainError::validation(format!("unknown SKU {sku}")))?;

        let stock = match header.adjustment_type {
            AdjustmentType::In => {
                self.ledger
                    .get_or_create_stock(tx.as_mut(), warehouse_id, type_component.id)
                    .await?
            }
            AdjustmentType::Out => tx
                .find_stock(warehouse_id, type_component.id)
                .await?
                .ok_or_else(|| {
                    DomainError::component_not_available(format!(
                        "no stock of {sku} in warehouse {warehouse_id}"
                    ))
                })?,
        };
        let stock = self.ledger.lock(tx.as_mut(), stock.id).await?;

        let mut checks: Vec<InventoryResult<()>> = Vec::with_capacity(members.len());
        let lines = match header.adjustment_type {
            AdjustmentType::In => {
                let mut lines = Vec::with_capacity(members.len());
                for (_, serial) in members {
                    match claim_new_unit(tx.as_mut(), &stock, serial, header.adjusted_at).await? {
                        Some(line) => {
                            lines.push(line);
                            checks.push(Ok(()));
                        }
                        None => checks.push(Err(DomainError::duplicate_serial(serial.clone()).into())),
                    }
                }
                lines
            }
            AdjustmentType::Out => {
                let mut ids = Vec::with_capacity(members.len());
                for (_, serial) in members {
                    let check = check_removable(tx.as_mut(), &stock, serial).await;
                    ids.push(check.as_ref().ok().copied());
                    checks.push(check.map(|_| ()));
                }
                let wanted: Vec<ComponentId> = ids.iter().flatten().copied().collect();
                let locked = tx.lock_components(&wanted).await?;
                // Re-check under the row locks; a unit taken meanwhile fails on its own.
                let mut units = Vec::with_capacity(wanted.len());
                for (id, check) in ids.iter().zip(checks.iter_mut()) {
                    let Some(id) = id else { continue };
                    let unit = locked.iter().find(|c| c.id == *id).ok_or_else(|| {
                        DomainError::component_not_available(format!("component {id} vanished"))
                    });
                    match unit.and_then(|u| ensure_removable(&stock, u).map(|()| u)) {
                        Ok(unit) => units.push(unit.clone()),
                        Err(err) => *check = Err(err.into()),
                    }
                }
                take_out_units(tx.as_mut(), &stock, units, ComponentStatus::Removed, header.adjusted_at)
                    .await?
            }
        };

        let adjustment_id = if lines.is_empty() {
            None
        } else {
            let (adjustment, _) =
                write_adjustment(&self.ledger, tx.as_mut(), &stock, header, lines, outbox).await?;
            tx.commit().await?;
            Some(adjustment.id)
        };

        Ok(checks
            .into_iter()
            .map(|check| {
                check.and_then(|()| {
                    adjustment_id
                        .ok_or_else(|| DomainError::invariant("no adjustment was written").into())
                })
            })
            .collect())
    }

    /// Paginated, newest-first history of one bucket. `page` is 1-based;
    /// `limit` is clamped to `[1, max_history_page_size]`.
    pub async fn get_stock_history(
        &self,
        actor: &Actor,
        stock_id: StockId,
        page: u32,
        limit: u32,
    ) -> InventoryResult<HistoryPage> {
        access::require(actor, Action::ViewInventory)?;
        let page = page.max(1);
        let limit = limit.clamp(1, self.max_history_page_size);

        let mut tx = self.store.begin().await?;
        let stock = tx
            .get_stock(stock_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("stock {stock_id}")))?;
        access::accessible_warehouse(tx.as_mut(), actor, stock.warehouse_id).await?;

        let offset = i64::from(page - 1) * i64::from(limit);
        let (entries, total) = tx.history_page(stock_id, offset, i64::from(limit)).await?;
        tx.rollback().await?;

        let limit_i = i64::from(limit);
        Ok(HistoryPage {
            entries,
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        })
    }

    pub async fn list_adjustments(
        &self,
        actor: &Actor,
        stock_id: StockId,
    ) -> InventoryResult<Vec<InventoryAdjustment>> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let stock = tx
            .get_stock(stock_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("stock {stock_id}")))?;
        access::accessible_warehouse(tx.as_mut(), actor, stock.warehouse_id).await?;
        let adjustments = tx.list_adjustments(stock_id).await?;
        tx.rollback().await?;
        Ok(adjustments)
    }

    /// Change a bucket's reorder point. May raise or clear the low-stock flag.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn set_reorder_point(
        &self,
        actor: &Actor,
        stock_id: StockId,
        reorder_point: i64,
    ) -> InventoryResult<Stock> {
        access::require(actor, Action::ManageReorderPoints)?;
        let mut tx = self.store.begin().await?;
        let stock = self.ledger.lock(tx.as_mut(), stock_id).await?;
        access::accessible_warehouse(tx.as_mut(), actor, stock.warehouse_id).await?;

        let mut outbox = Outbox::new();
        let stock = self
            .ledger
            .set_reorder_point(tx.as_mut(), stock_id, reorder_point, &mut outbox)
            .await?;
        tx.commit().await?;
        outbox.flush(self.sink.as_ref());
        Ok(stock)
    }
}

/// Everything about an adjustment except its lines.
#[derive(Debug, Clone)]
pub(crate) struct AdjustmentHeader {
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub note: Option<String>,
    pub adjusted_by: UserId,
    pub adjusted_at: DateTime<Utc>,
    pub transfer_request_id: Option<TransferRequestId>,
}

/// IN: create units from serials. OUT: remove `IN_STOCK` units by serial.
async fn apply_serials(
    ledger: &StockLedger,
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    header: AdjustmentHeader,
    serials: &[String],
    outbox: &mut Outbox,
) -> InventoryResult<(InventoryAdjustment, Stock)> {
    let lines = match header.adjustment_type {
        AdjustmentType::In => receive_new_units(tx, stock, serials, header.adjusted_at).await?,
        AdjustmentType::Out => {
            let units = removable_units(tx, stock, serials).await?;
            take_out_units(tx, stock, units, ComponentStatus::Removed, header.adjusted_at).await?
        }
    };
    write_adjustment(ledger, tx, stock, header, lines, outbox).await
}

/// Create a fresh `IN_STOCK` component per serial in the bucket's warehouse.
pub(crate) async fn receive_new_units(
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    serials: &[String],
    now: DateTime<Utc>,
) -> InventoryResult<Vec<AdjustmentLine>> {
    let mut lines = Vec::with_capacity(serials.len());
    for serial in serials {
        let line = claim_new_unit(tx, stock, serial, now)
            .await?
            .ok_or_else(|| DomainError::duplicate_serial(serial.clone()))?;
        lines.push(line);
    }
    Ok(lines)
}

/// Insert one `IN_STOCK` unit. `None` when the serial number is already taken,
/// including by a transaction that committed after our checks.
async fn claim_new_unit(
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    serial: &str,
    now: DateTime<Utc>,
) -> InventoryResult<Option<AdjustmentLine>> {
    let component = Component::received(
        ComponentId::new(),
        serial.to_string(),
        stock.type_component_id,
        stock.warehouse_id,
        now,
    );
    if !tx.insert_component(&component).await? {
        return Ok(None);
    }
    Ok(Some(AdjustmentLine {
        component_id: component.id,
        serial_number: component.serial_number,
        old_status: None,
        new_status: ComponentStatus::InStock,
        delta: 1,
    }))
}

/// Resolve serials to locked `IN_STOCK` units of this bucket.
pub(crate) async fn removable_units(
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    serials: &[String],
) -> InventoryResult<Vec<Component>> {
    let mut ids = Vec::with_capacity(serials.len());
    for serial in serials {
        ids.push(check_removable(tx, stock, serial).await?);
    }
    let locked = tx.lock_components(&ids).await?;
    // Re-check under the row locks and keep the caller's order.
    let mut units = Vec::with_capacity(ids.len());
    for id in ids {
        let unit = locked
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DomainError::component_not_available(format!("component {id} vanished")))?;
        ensure_removable(stock, unit)?;
        units.push(unit.clone());
    }
    Ok(units)
}

/// Move locked `IN_STOCK` units out of their bucket, to `REMOVED` or `IN_TRANSIT`.
pub(crate) async fn take_out_units(
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    units: Vec<Component>,
    new_status: ComponentStatus,
    now: DateTime<Utc>,
) -> InventoryResult<Vec<AdjustmentLine>> {
    let count = units.len() as i64;
    if stock.quantity_available() < count {
        return Err(DomainError::insufficient_stock(count, stock.quantity_available()).into());
    }

    let mut lines = Vec::with_capacity(units.len());
    for mut unit in units {
        let old_status = unit.status;
        match new_status {
            ComponentStatus::InTransit => unit.dispatch(now)?,
            ComponentStatus::Removed => unit.remove(now)?,
            other => {
                return Err(DomainError::invariant(format!("cannot take units out as {other}")).into());
            }
        }
        tx.update_component(&unit).await?;
        lines.push(AdjustmentLine {
            component_id: unit.id,
            serial_number: unit.serial_number,
            old_status: Some(old_status),
            new_status,
            delta: -1,
        });
    }
    Ok(lines)
}

/// Ledger write plus the immutable adjustment record.
pub(crate) async fn write_adjustment(
    ledger: &StockLedger,
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    header: AdjustmentHeader,
    lines: Vec<AdjustmentLine>,
    outbox: &mut Outbox,
) -> InventoryResult<(InventoryAdjustment, Stock)> {
    let adjustment = InventoryAdjustment {
        id: AdjustmentId::new(),
        stock_id: stock.id,
        adjustment_type: header.adjustment_type,
        reason: header.reason,
        note: header.note,
        lines,
        adjusted_by: header.adjusted_by,
        adjusted_at: header.adjusted_at,
        transfer_request_id: header.transfer_request_id,
    };

    let change = match adjustment.transfer_request_id {
        Some(request_id) => {
            let cause = match adjustment.adjustment_type {
                AdjustmentType::In => HistoryCause::TransferReceived,
                AdjustmentType::Out => HistoryCause::TransferShipped,
            };
            QuantityChange::new(cause, request_id, adjustment.adjusted_by, adjustment.adjusted_at)
        }
        None => {
            let cause = match adjustment.adjustment_type {
                AdjustmentType::In => HistoryCause::AdjustmentIn,
                AdjustmentType::Out => HistoryCause::AdjustmentOut,
            };
            QuantityChange::new(cause, adjustment.id, adjustment.adjusted_by, adjustment.adjusted_at)
        }
    }
    .in_stock(adjustment.quantity_delta())
    .with_note(Some(adjustment.reason.clone()));

    let stock = ledger.adjust_quantities(tx, stock.id, change, outbox).await?;
    tx.insert_adjustment(&adjustment).await?;

    outbox.push(Notification::AdjustmentCreated {
        adjustment_id: adjustment.id,
        stock_id: stock.id,
        warehouse_id: stock.warehouse_id,
        adjustment_type: adjustment.adjustment_type,
        quantity_delta: adjustment.quantity_delta(),
        transfer_request_id: adjustment.transfer_request_id,
        adjusted_by: adjustment.adjusted_by,
        occurred_at: adjustment.adjusted_at,
    });
    Ok((adjustment, stock))
}

async fn check_removable(
    tx: &mut dyn InventoryTx,
    stock: &Stock,
    serial: &str,
) -> InventoryResult<ComponentId> {
    let unit = tx.find_component_by_serial(serial).await?.ok_or_else(|| {
        DomainError::component_not_available(format!("serial {serial} is not in the catalog"))
    })?;
    ensure_removable(stock, &unit)?;
    Ok(unit.id)
}

fn ensure_removable(stock: &Stock, unit: &Component) -> Result<(), DomainError> {
    if unit.type_component_id != stock.type_component_id
        || unit.warehouse_id != Some(stock.warehouse_id)
    {
        return Err(DomainError::component_not_available(format!(
            "serial {} does not belong to stock {}",
            unit.serial_number, stock.id
        )));
    }
    if !unit.is_available() {
        return Err(DomainError::component_not_available(format!(
            "serial {} is {}",
            unit.serial_number, unit.status
        )));
    }
    Ok(())
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn failed_outcome(sku: &str, serial_number: &str, err: &InventoryError) -> BulkItemOutcome {
    BulkItemOutcome {
        sku: sku.to_string(),
        serial_number: serial_number.to_string(),
        result: BulkItemResult::Failed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        },
    }
}
