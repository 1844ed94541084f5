//! Transfer orchestrator: moves stock custody between two warehouses.
//!
//! ```text
//! PENDING_APPROVAL --approve--> APPROVED --ship--> SHIPPED --receive--> RECEIVED
//! PENDING_APPROVAL --reject---> REJECTED
//! PENDING_APPROVAL | APPROVED --cancel--> CANCELLED
//! ```
//!
//! Stock moves exactly twice per request: an OUT adjustment on the sourcing
//! warehouse when the request ships (units become `IN_TRANSIT`) and an IN
//! adjustment on the requesting warehouse when it is received (the same
//! units become `IN_STOCK` again). Creating, approving, rejecting and
//! cancelling never touch quantities.
//!
//! Role gates: requesting-side roles create, receive and cancel;
//! company-side roles approve and reject; the sourcing side ships.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

use evwarranty_auth::{Action, Actor};
use evwarranty_core::{
    Aggregate, CaseLineId, DomainError, TransferRequestId, TypeComponentId, UserId, WarehouseId,
};
use evwarranty_inventory::{
    AdjustmentLine, AdjustmentType, ApproveTransfer, CancelTransfer, ComponentStatus,
    ItemApproval, ItemShipment, ReceiveTransfer, RejectTransfer, RequestTransfer, RequestedItem,
    ShipTransfer, ShippedUnit, StockTransferRequest, TransferCommand, TransferKind,
    TransferStatus, Warehouse, normalize_serial, normalize_sku,
};

use crate::access;
use crate::adjustments::{
    AdjustmentHeader, SkuSerial, removable_units, take_out_units, write_adjustment,
};
use crate::error::InventoryResult;
use crate::ledger::StockLedger;
use crate::notify::{Notification, NotificationSink, Outbox};
use crate::store::{InventoryStore, InventoryTx, TransferFilter};

/// One requested line. Identify the component type by id or by SKU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferItemInput {
    pub type_component_id: Option<TypeComponentId>,
    pub sku: Option<String>,
    pub quantity_requested: i64,
    pub case_line_id: Option<CaseLineId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTransferRequest {
    /// Defaults to the actor's service-center warehouse.
    pub requesting_warehouse_id: Option<WarehouseId>,
    pub items: Vec<TransferItemInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub request_id: TransferRequestId,
    /// Required for service-center transfers; restocks always source from
    /// the company's central warehouse.
    pub sourcing_warehouse_id: Option<WarehouseId>,
    /// Per-line caps set by the approver. Lines not listed ask for the full
    /// requested quantity. Either way the source's availability caps it.
    pub quantities: Vec<ItemApproval>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRequest {
    pub request_id: TransferRequestId,
    pub estimated_delivery_date: Option<NaiveDate>,
    /// Exact units to ship. Without a manifest the oldest `IN_STOCK` units
    /// of each bucket are picked.
    pub manifest: Option<Vec<SkuSerial>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRequest {
    pub request_id: TransferRequestId,
    /// Serials counted at the receiving dock. `None` accepts the shipped manifest.
    pub received_serials: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn InventoryStore>,
    ledger: StockLedger,
    sink: Arc<dyn NotificationSink>,
}

impl TransferEngine {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        ledger: StockLedger,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, ledger, sink }
    }

    /// Ask another warehouse for stock. Persists `PENDING_APPROVAL`; the
    /// source is chosen at approval.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, items = request.items.len()), err)]
    pub async fn create_stock_transfer_request(
        &self,
        actor: &Actor,
        request: NewTransferRequest,
    ) -> InventoryResult<StockTransferRequest> {
        self.create(actor, request, TransferKind::ServiceCenterTransfer).await
    }

    /// Ask the company's central warehouse for stock.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, items = request.items.len()), err)]
    pub async fn create_warehouse_restock_request(
        &self,
        actor: &Actor,
        request: NewTransferRequest,
    ) -> InventoryResult<StockTransferRequest> {
        self.create(actor, request, TransferKind::WarehouseRestock).await
    }

    async fn create(
        &self,
        actor: &Actor,
        request: NewTransferRequest,
        kind: TransferKind,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::RequestTransfer)?;

        let mut tx = self.store.begin().await?;
        let requesting =
            access::resolve_warehouse(tx.as_mut(), actor, request.requesting_warehouse_id).await?;
        if kind == TransferKind::WarehouseRestock {
            let central = central_warehouse_of(tx.as_mut(), &requesting).await?;
            if central.id == requesting.id {
                return Err(DomainError::validation(
                    "the central warehouse cannot restock from itself",
                )
                .into());
            }
        }

        let mut items = Vec::with_capacity(request.items.len());
        for input in &request.items {
            items.push(resolve_item(tx.as_mut(), input).await?);
        }

        let request_id = TransferRequestId::new();
        let mut transfer = StockTransferRequest::empty(request_id);
        transfer.execute(&TransferCommand::Request(RequestTransfer {
            request_id,
            kind,
            requesting_warehouse_id: requesting.id,
            items,
            requested_by: actor.user_id,
            occurred_at: Utc::now(),
        }))?;
        tx.insert_transfer(&transfer).await?;

        let mut outbox = Outbox::new();
        push_status(&mut outbox, &transfer, actor.user_id);
        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(request_id = %request_id, kind = kind.as_str(), "transfer requested");
        Ok(transfer)
    }

    /// Bind the source and approved quantities. Partial approval is allowed;
    /// the unapproved remainder is dropped. No stock moves yet.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, request_id = %request.request_id), err)]
    pub async fn approve_stock_transfer_request(
        &self,
        actor: &Actor,
        request: ApprovalRequest,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::ApproveTransfer)?;

        let mut tx = self.store.begin().await?;
        let mut transfer = locked_transfer(tx.as_mut(), request.request_id).await?;
        expect_status(&transfer, &[TransferStatus::PendingApproval], "approve")?;
        let requesting = access::accessible_warehouse(tx.as_mut(), actor, requesting_of(&transfer)?).await?;

        let source = match transfer.kind() {
            TransferKind::WarehouseRestock => {
                let central = central_warehouse_of(tx.as_mut(), &requesting).await?;
                if request.sourcing_warehouse_id.is_some_and(|explicit| explicit != central.id) {
                    return Err(DomainError::validation(
                        "restock requests are sourced from the central warehouse",
                    )
                    .into());
                }
                central
            }
            TransferKind::ServiceCenterTransfer => {
                let id = request.sourcing_warehouse_id.ok_or_else(|| {
                    DomainError::validation("a sourcing warehouse is required to approve a transfer")
                })?;
                access::load_warehouse(tx.as_mut(), id).await?
            }
        };
        access::ensure_access(actor, &source)?;

        let mut approvals = Vec::with_capacity(transfer.items().len());
        for item in transfer.items() {
            let wanted = match request.quantities.iter().find(|q| q.line_no == item.line_no) {
                Some(cap) if cap.quantity_approved < 0 || cap.quantity_approved > item.quantity_requested => {
                    return Err(DomainError::validation(format!(
                        "item {}: approved quantity must be between 0 and {}",
                        item.sku, item.quantity_requested
                    ))
                    .into());
                }
                Some(cap) => cap.quantity_approved,
                None => item.quantity_requested,
            };
            let available = tx
                .find_stock(source.id, item.type_component_id)
                .await?
                .map(|s| s.quantity_available())
                .unwrap_or(0);
            approvals.push(ItemApproval {
                line_no: item.line_no,
                quantity_approved: wanted.min(available),
            });
        }

        transfer.execute(&TransferCommand::Approve(ApproveTransfer {
            request_id: request.request_id,
            sourcing_warehouse_id: source.id,
            approvals,
            approved_by: actor.user_id,
            occurred_at: Utc::now(),
        }))?;
        tx.update_transfer(&transfer).await?;

        let mut outbox = Outbox::new();
        push_status(&mut outbox, &transfer, actor.user_id);
        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(sourcing_warehouse_id = %source.id, "transfer approved");
        Ok(transfer)
    }

    /// Ship an approved request: OUT adjustment on the source for every
    /// approved line, all in one transaction.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, request_id = %request.request_id), err)]
    pub async fn ship_stock_transfer_request(
        &self,
        actor: &Actor,
        request: ShipmentRequest,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::ShipTransfer)?;

        let mut tx = self.store.begin().await?;
        let mut transfer = locked_transfer(tx.as_mut(), request.request_id).await?;
        expect_status(&transfer, &[TransferStatus::Approved], "ship")?;
        let source_id = transfer.sourcing_warehouse_id().ok_or_else(|| {
            DomainError::invariant(format!("approved request {} has no source", request.request_id))
        })?;
        access::accessible_warehouse(tx.as_mut(), actor, source_id).await?;

        let mut manifest = match &request.manifest {
            Some(entries) => Some(group_manifest(&transfer, entries)?),
            None => None,
        };

        let mut source_buckets = Vec::new();
        for item in transfer.items().iter().filter(|i| i.quantity_approved.unwrap_or(0) > 0) {
            if let Some(stock) = tx.find_stock(source_id, item.type_component_id).await? {
                source_buckets.push(stock.id);
            }
        }
        self.ledger.lock_many(tx.as_mut(), &source_buckets).await?;

        let now = Utc::now();
        let mut outbox = Outbox::new();
        let mut shipments = Vec::new();
        for item in transfer.items().to_vec() {
            let approved = item.quantity_approved.unwrap_or(0);
            let listed = manifest.as_mut().and_then(|m| m.remove(&item.sku));
            if approved == 0 {
                if listed.is_some_and(|serials| !serials.is_empty()) {
                    return Err(DomainError::validation(format!(
                        "item {} was approved for 0 units",
                        item.sku
                    ))
                    .into());
                }
                continue;
            }

            let stock = tx
                .find_stock(source_id, item.type_component_id)
                .await?
                .ok_or_else(|| DomainError::insufficient_stock(approved, 0))?;
            let stock = self.ledger.lock(tx.as_mut(), stock.id).await?;
            if stock.quantity_available() < approved {
                return Err(
                    DomainError::insufficient_stock(approved, stock.quantity_available()).into(),
                );
            }

            let units = match (&manifest, listed) {
                (_, Some(serials)) => {
                    if serials.len() as i64 != approved {
                        return Err(DomainError::validation(format!(
                            "item {}: manifest lists {} units, approved {approved}",
                            item.sku,
                            serials.len()
                        ))
                        .into());
                    }
                    removable_units(tx.as_mut(), &stock, &serials).await?
                }
                (Some(_), None) => {
                    return Err(DomainError::validation(format!(
                        "manifest has no units for item {}",
                        item.sku
                    ))
                    .into());
                }
                (None, None) => {
                    let units = tx
                        .lock_available_components(source_id, item.type_component_id, approved)
                        .await?;
                    if (units.len() as i64) < approved {
                        return Err(
                            DomainError::insufficient_stock(approved, units.len() as i64).into(),
                        );
                    }
                    units
                }
            };

            let shipped: Vec<ShippedUnit> = units
                .iter()
                .map(|u| ShippedUnit {
                    component_id: u.id,
                    serial_number: u.serial_number.clone(),
                })
                .collect();
            let lines =
                take_out_units(tx.as_mut(), &stock, units, ComponentStatus::InTransit, now).await?;
            let header = transfer_header(AdjustmentType::Out, &transfer, actor.user_id, now);
            write_adjustment(&self.ledger, tx.as_mut(), &stock, header, lines, &mut outbox).await?;

            shipments.push(ItemShipment {
                line_no: item.line_no,
                units: shipped,
            });
        }
        transfer.execute(&TransferCommand::Ship(ShipTransfer {
            request_id: request.request_id,
            shipments,
            estimated_delivery_date: request.estimated_delivery_date,
            shipped_by: actor.user_id,
            occurred_at: now,
        }))?;
        tx.update_transfer(&transfer).await?;
        push_status(&mut outbox, &transfer, actor.user_id);

        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(units = transfer.shipped_serials().len(), "transfer shipped");
        Ok(transfer)
    }

    /// Ship a restock request with an uploaded `{sku, serial}` manifest.
    pub async fn dispatch_warehouse_restock_request_with_file(
        &self,
        actor: &Actor,
        request_id: TransferRequestId,
        manifest: Vec<SkuSerial>,
        estimated_delivery_date: Option<NaiveDate>,
    ) -> InventoryResult<StockTransferRequest> {
        {
            let mut tx = self.store.begin().await?;
            let transfer = tx
                .get_transfer(request_id)
                .await?
                .ok_or_else(|| DomainError::not_found(format!("transfer request {request_id}")))?;
            tx.rollback().await?;
            if transfer.kind() != TransferKind::WarehouseRestock {
                return Err(DomainError::validation(format!(
                    "transfer request {request_id} is not a warehouse restock"
                ))
                .into());
            }
        }
        self.ship_stock_transfer_request(
            actor,
            ShipmentRequest {
                request_id,
                estimated_delivery_date,
                manifest: Some(manifest),
            },
        )
        .await
    }

    /// Receive a shipped request: the shipped units arrive as `IN_STOCK` in
    /// the requesting warehouse. Strict 1:1 serial matching.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, request_id = %request.request_id), err)]
    pub async fn receive_stock_transfer_request(
        &self,
        actor: &Actor,
        request: ReceiptRequest,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::ReceiveTransfer)?;

        let mut tx = self.store.begin().await?;
        let mut transfer = locked_transfer(tx.as_mut(), request.request_id).await?;
        let requesting =
            access::accessible_warehouse(tx.as_mut(), actor, requesting_of(&transfer)?).await?;

        let now = Utc::now();
        transfer.execute(&TransferCommand::Receive(ReceiveTransfer {
            request_id: request.request_id,
            received_serials: request.received_serials,
            received_by: actor.user_id,
            occurred_at: now,
        }))?;

        let mut destination_buckets = Vec::new();
        for item in transfer.items().iter().filter(|i| !i.shipped.is_empty()) {
            let stock = self
                .ledger
                .get_or_create_stock(tx.as_mut(), requesting.id, item.type_component_id)
                .await?;
            destination_buckets.push(stock.id);
        }
        self.ledger.lock_many(tx.as_mut(), &destination_buckets).await?;

        let mut outbox = Outbox::new();
        let shipped_items = transfer.items().iter().filter(|i| !i.shipped.is_empty());
        for (item, stock_id) in shipped_items.zip(destination_buckets) {
            let stock = self.ledger.lock(tx.as_mut(), stock_id).await?;

            let ids: Vec<_> = item.shipped.iter().map(|u| u.component_id).collect();
            let components = tx.lock_components(&ids).await?;
            if components.len() != ids.len() {
                return Err(DomainError::receipt_mismatch(format!(
                    "item {}: {} shipped units are unknown",
                    item.sku,
                    ids.len() - components.len()
                ))
                .into());
            }

            let mut lines = Vec::with_capacity(components.len());
            for mut unit in components {
                let old_status = unit.status;
                unit.arrive(requesting.id, now)?;
                tx.update_component(&unit).await?;
                lines.push(AdjustmentLine {
                    component_id: unit.id,
                    serial_number: unit.serial_number,
                    old_status: Some(old_status),
                    new_status: ComponentStatus::InStock,
                    delta: 1,
                });
            }
            let header = transfer_header(AdjustmentType::In, &transfer, actor.user_id, now);
            write_adjustment(&self.ledger, tx.as_mut(), &stock, header, lines, &mut outbox).await?;
        }

        tx.update_transfer(&transfer).await?;
        push_status(&mut outbox, &transfer, actor.user_id);
        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(units = transfer.shipped_serials().len(), "transfer received");
        Ok(transfer)
    }

    #[instrument(skip(self, actor, reason), fields(user_id = %actor.user_id), err)]
    pub async fn reject_stock_transfer_request(
        &self,
        actor: &Actor,
        request_id: TransferRequestId,
        reason: &str,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::RejectTransfer)?;
        self.transition(actor, request_id, |transfer, at| {
            TransferCommand::Reject(RejectTransfer {
                request_id: transfer.id_typed(),
                reason: reason.to_string(),
                rejected_by: actor.user_id,
                occurred_at: at,
            })
        })
        .await
    }

    /// Only before shipment: once units left the source, corrections are
    /// forward-only adjustments.
    #[instrument(skip(self, actor, reason), fields(user_id = %actor.user_id), err)]
    pub async fn cancel_stock_transfer_request(
        &self,
        actor: &Actor,
        request_id: TransferRequestId,
        reason: &str,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::CancelTransfer)?;
        self.transition(actor, request_id, |transfer, at| {
            TransferCommand::Cancel(CancelTransfer {
                request_id: transfer.id_typed(),
                reason: reason.to_string(),
                cancelled_by: actor.user_id,
                occurred_at: at,
            })
        })
        .await
    }

    /// Status-only transition guarded by the requesting warehouse.
    async fn transition<F>(
        &self,
        actor: &Actor,
        request_id: TransferRequestId,
        command: F,
    ) -> InventoryResult<StockTransferRequest>
    where
        F: FnOnce(&StockTransferRequest, chrono::DateTime<Utc>) -> TransferCommand,
    {
        let mut tx = self.store.begin().await?;
        let mut transfer = locked_transfer(tx.as_mut(), request_id).await?;
        access::accessible_warehouse(tx.as_mut(), actor, requesting_of(&transfer)?).await?;

        let cmd = command(&transfer, Utc::now());
        transfer.execute(&cmd)?;
        tx.update_transfer(&transfer).await?;

        let mut outbox = Outbox::new();
        push_status(&mut outbox, &transfer, actor.user_id);
        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(request_id = %request_id, status = transfer.status().as_str(), "transfer closed");
        Ok(transfer)
    }

    pub async fn get_stock_transfer_request(
        &self,
        actor: &Actor,
        request_id: TransferRequestId,
    ) -> InventoryResult<StockTransferRequest> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let transfer = tx
            .get_transfer(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("transfer request {request_id}")))?;
        let visible = access::visible_warehouses(tx.as_mut(), actor).await?;
        tx.rollback().await?;

        let sees = |id: Option<WarehouseId>| id.is_some_and(|id| visible.iter().any(|w| w.id == id));
        if !sees(transfer.requesting_warehouse_id()) && !sees(transfer.sourcing_warehouse_id()) {
            return Err(DomainError::unauthorized(format!(
                "user {} cannot view transfer request {request_id}",
                actor.user_id
            ))
            .into());
        }
        Ok(transfer)
    }

    /// Requests touching any warehouse the actor can see, newest first.
    pub async fn list_stock_transfer_requests(
        &self,
        actor: &Actor,
        status: Option<TransferStatus>,
    ) -> InventoryResult<Vec<StockTransferRequest>> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let visible = access::visible_warehouses(tx.as_mut(), actor).await?;
        let filter = TransferFilter {
            warehouse_ids: Some(visible.iter().map(|w| w.id).collect()),
            status,
        };
        let transfers = tx.list_transfers(&filter).await?;
        tx.rollback().await?;
        Ok(transfers)
    }
}

async fn locked_transfer(
    tx: &mut dyn InventoryTx,
    request_id: TransferRequestId,
) -> InventoryResult<StockTransferRequest> {
    tx.lock_transfer(request_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("transfer request {request_id}")).into())
}

fn requesting_of(transfer: &StockTransferRequest) -> InventoryResult<WarehouseId> {
    transfer.requesting_warehouse_id().ok_or_else(|| {
        DomainError::invariant(format!(
            "transfer request {} has no requesting warehouse",
            transfer.id_typed()
        ))
        .into()
    })
}

/// Same error the aggregate reports, raised before any side effect runs.
fn expect_status(
    transfer: &StockTransferRequest,
    allowed: &[TransferStatus],
    action: &'static str,
) -> Result<(), DomainError> {
    if allowed.contains(&transfer.status()) {
        Ok(())
    } else {
        Err(DomainError::invalid_transition(
            "transfer request",
            transfer.id_typed(),
            transfer.status(),
            action,
        ))
    }
}

async fn central_warehouse_of(
    tx: &mut dyn InventoryTx,
    warehouse: &Warehouse,
) -> InventoryResult<Warehouse> {
    let company_id = warehouse.company_id();
    tx.central_warehouse(company_id).await?.ok_or_else(|| {
        DomainError::validation(format!("company {company_id} has no central warehouse")).into()
    })
}

async fn resolve_item(
    tx: &mut dyn InventoryTx,
    input: &TransferItemInput,
) -> InventoryResult<RequestedItem> {
    let type_component = match (input.type_component_id, input.sku.as_deref()) {
        (Some(id), _) => tx.get_type_component(id).await?.ok_or_else(|| {
            DomainError::validation(format!("unknown component type {id}"))
        })?,
        (None, Some(sku)) => {
            let sku = normalize_sku(sku)
                .ok_or_else(|| DomainError::validation("item SKU cannot be blank"))?;
            tx.find_type_component_by_sku(&sku)
                .await?
                .ok_or_else(|| DomainError::validation(format!("unknown SKU {sku}")))?
        }
        (None, None) => {
            return Err(DomainError::validation("item needs a SKU or a component type").into());
        }
    };
    Ok(RequestedItem {
        type_component_id: type_component.id,
        sku: type_component.sku,
        quantity_requested: input.quantity_requested,
        case_line_id: input.case_line_id,
    })
}

/// Manifest serials grouped by the request's SKUs.
fn group_manifest(
    transfer: &StockTransferRequest,
    entries: &[SkuSerial],
) -> Result<BTreeMap<String, Vec<String>>, DomainError> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in entries {
        let sku = normalize_sku(&entry.sku)
            .ok_or_else(|| DomainError::validation("manifest SKU cannot be blank"))?;
        let serial = normalize_serial(&entry.serial_number)
            .ok_or_else(|| DomainError::validation("manifest serial number cannot be blank"))?;
        if !transfer.items().iter().any(|i| i.sku == sku) {
            return Err(DomainError::validation(format!(
                "manifest lists SKU {sku}, which is not part of this request"
            )));
        }
        if !seen.insert(serial.clone()) {
            return Err(DomainError::duplicate_serial(serial));
        }
        grouped.entry(sku).or_default().push(serial);
    }
    Ok(grouped)
}

fn transfer_header(
    adjustment_type: AdjustmentType,
    transfer: &StockTransferRequest,
    actor: UserId,
    at: chrono::DateTime<Utc>,
) -> AdjustmentHeader {
    let verb = match adjustment_type {
        AdjustmentType::Out => "shipped",
        AdjustmentType::In => "received",
    };
    AdjustmentHeader {
        adjustment_type,
        reason: format!("transfer request {} {verb}", transfer.id_typed()),
        note: None,
        adjusted_by: actor,
        adjusted_at: at,
        transfer_request_id: Some(transfer.id_typed()),
    }
}

fn push_status(outbox: &mut Outbox, transfer: &StockTransferRequest, changed_by: UserId) {
    let Some(requesting_warehouse_id) = transfer.requesting_warehouse_id() else {
        return;
    };
    outbox.push(Notification::TransferStatusChanged {
        request_id: transfer.id_typed(),
        kind: transfer.kind(),
        status: transfer.status(),
        requesting_warehouse_id,
        sourcing_warehouse_id: transfer.sourcing_warehouse_id(),
        changed_by,
        occurred_at: Utc::now(),
    });
}
