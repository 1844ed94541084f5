//! Stock transfer request aggregate.
//!
//! ```text
//! PENDING_APPROVAL --approve--> APPROVED --ship--> SHIPPED --receive--> RECEIVED
//! PENDING_APPROVAL --reject---> REJECTED
//! PENDING_APPROVAL|APPROVED --cancel--> CANCELLED
//! ```
//!
//! Quantities only move at ship and receive; the orchestrator performs those
//! side effects in the same transaction that persists the new state.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use evwarranty_core::{
    Aggregate, AggregateRoot, CaseLineId, ComponentId, DomainError, TransferRequestId,
    TypeComponentId, UserId, WarehouseId,
};
use evwarranty_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferKind {
    /// Service center asks for stock from another warehouse chosen at approval.
    ServiceCenterTransfer,
    /// Service center asks its company's central warehouse for stock.
    WarehouseRestock,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::ServiceCenterTransfer => "SERVICE_CENTER_TRANSFER",
            TransferKind::WarehouseRestock => "WAREHOUSE_RESTOCK",
        }
    }
}

impl core::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransferKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERVICE_CENTER_TRANSFER" => Ok(TransferKind::ServiceCenterTransfer),
            "WAREHOUSE_RESTOCK" => Ok(TransferKind::WarehouseRestock),
            other => Err(DomainError::validation(format!("unknown transfer kind '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    PendingApproval,
    Approved,
    Shipped,
    Received,
    Rejected,
    Cancelled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 6] = [
        TransferStatus::PendingApproval,
        TransferStatus::Approved,
        TransferStatus::Shipped,
        TransferStatus::Received,
        TransferStatus::Rejected,
        TransferStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::PendingApproval => "PENDING_APPROVAL",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Shipped => "SHIPPED",
            TransferStatus::Received => "RECEIVED",
            TransferStatus::Rejected => "REJECTED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Received | TransferStatus::Rejected | TransferStatus::Cancelled
        )
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransferStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown transfer status '{s}'")))
    }
}

/// A serialized unit that left the source warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShippedUnit {
    pub component_id: ComponentId,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub line_no: u32,
    pub type_component_id: TypeComponentId,
    pub sku: String,
    pub quantity_requested: i64,
    pub quantity_approved: Option<i64>,
    pub case_line_id: Option<CaseLineId>,
    pub shipped: Vec<ShippedUnit>,
}

/// Aggregate root: StockTransferRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransferRequest {
    id: TransferRequestId,
    kind: TransferKind,
    status: TransferStatus,
    requesting_warehouse_id: Option<WarehouseId>,
    sourcing_warehouse_id: Option<WarehouseId>,
    items: Vec<TransferItem>,
    requested_by: Option<UserId>,
    requested_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    shipped_by: Option<UserId>,
    shipped_at: Option<DateTime<Utc>>,
    estimated_delivery_date: Option<NaiveDate>,
    received_by: Option<UserId>,
    received_at: Option<DateTime<Utc>>,
    rejected_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    cancelled_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    version: u64,
    created: bool,
}

impl StockTransferRequest {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: TransferRequestId) -> Self {
        Self {
            id,
            kind: TransferKind::ServiceCenterTransfer,
            status: TransferStatus::PendingApproval,
            requesting_warehouse_id: None,
            sourcing_warehouse_id: None,
            items: Vec::new(),
            requested_by: None,
            requested_at: None,
            approved_by: None,
            approved_at: None,
            shipped_by: None,
            shipped_at: None,
            estimated_delivery_date: None,
            received_by: None,
            received_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferRequestId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn requesting_warehouse_id(&self) -> Option<WarehouseId> {
        self.requesting_warehouse_id
    }

    pub fn sourcing_warehouse_id(&self) -> Option<WarehouseId> {
        self.sourcing_warehouse_id
    }

    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn estimated_delivery_date(&self) -> Option<NaiveDate> {
        self.estimated_delivery_date
    }

    pub fn received_by(&self) -> Option<UserId> {
        self.received_by
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Every serial that left the source, across all items.
    pub fn shipped_serials(&self) -> BTreeSet<&str> {
        self.items
            .iter()
            .flat_map(|i| i.shipped.iter().map(|u| u.serial_number.as_str()))
            .collect()
    }
}

impl AggregateRoot for StockTransferRequest {
    type Id = TransferRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub type_component_id: TypeComponentId,
    pub sku: String,
    pub quantity_requested: i64,
    pub case_line_id: Option<CaseLineId>,
}

/// Command: RequestTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTransfer {
    pub request_id: TransferRequestId,
    pub kind: TransferKind,
    pub requesting_warehouse_id: WarehouseId,
    pub items: Vec<RequestedItem>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemApproval {
    pub line_no: u32,
    pub quantity_approved: i64,
}

/// Command: ApproveTransfer. Approved quantities are already clamped to what
/// the source can cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveTransfer {
    pub request_id: TransferRequestId,
    pub sourcing_warehouse_id: WarehouseId,
    pub approvals: Vec<ItemApproval>,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemShipment {
    pub line_no: u32,
    pub units: Vec<ShippedUnit>,
}

/// Command: ShipTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipTransfer {
    pub request_id: TransferRequestId,
    pub shipments: Vec<ItemShipment>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub shipped_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveTransfer. `received_serials = None` accepts the manifest as shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveTransfer {
    pub request_id: TransferRequestId,
    pub received_serials: Option<Vec<String>>,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectTransfer {
    pub request_id: TransferRequestId,
    pub reason: String,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransfer {
    pub request_id: TransferRequestId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Request(RequestTransfer),
    Approve(ApproveTransfer),
    Ship(ShipTransfer),
    Receive(ReceiveTransfer),
    Reject(RejectTransfer),
    Cancel(CancelTransfer),
}

/// Event: TransferRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequested {
    pub request_id: TransferRequestId,
    pub kind: TransferKind,
    pub requesting_warehouse_id: WarehouseId,
    pub items: Vec<TransferItem>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferApproved {
    pub request_id: TransferRequestId,
    pub sourcing_warehouse_id: WarehouseId,
    pub approvals: Vec<ItemApproval>,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShipped {
    pub request_id: TransferRequestId,
    pub shipments: Vec<ItemShipment>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub shipped_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceived {
    pub request_id: TransferRequestId,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRejected {
    pub request_id: TransferRequestId,
    pub reason: String,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub request_id: TransferRequestId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    Requested(TransferRequested),
    Approved(TransferApproved),
    Shipped(TransferShipped),
    Received(TransferReceived),
    Rejected(TransferRejected),
    Cancelled(TransferCancelled),
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Requested(_) => "inventory.transfer.requested",
            TransferEvent::Approved(_) => "inventory.transfer.approved",
            TransferEvent::Shipped(_) => "inventory.transfer.shipped",
            TransferEvent::Received(_) => "inventory.transfer.received",
            TransferEvent::Rejected(_) => "inventory.transfer.rejected",
            TransferEvent::Cancelled(_) => "inventory.transfer.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::Requested(e) => e.occurred_at,
            TransferEvent::Approved(e) => e.occurred_at,
            TransferEvent::Shipped(e) => e.occurred_at,
            TransferEvent::Received(e) => e.occurred_at,
            TransferEvent::Rejected(e) => e.occurred_at,
            TransferEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockTransferRequest {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Requested(e) => {
                self.id = e.request_id;
                self.kind = e.kind;
                self.status = TransferStatus::PendingApproval;
                self.requesting_warehouse_id = Some(e.requesting_warehouse_id);
                self.items = e.items.clone();
                self.requested_by = Some(e.requested_by);
                self.requested_at = Some(e.occurred_at);
                self.created = true;
            }
            TransferEvent::Approved(e) => {
                self.status = TransferStatus::Approved;
                self.sourcing_warehouse_id = Some(e.sourcing_warehouse_id);
                for approval in &e.approvals {
                    if let Some(item) = self.item_mut(approval.line_no) {
                        item.quantity_approved = Some(approval.quantity_approved);
                    }
                }
                self.approved_by = Some(e.approved_by);
                self.approved_at = Some(e.occurred_at);
            }
            TransferEvent::Shipped(e) => {
                self.status = TransferStatus::Shipped;
                for shipment in &e.shipments {
                    if let Some(item) = self.item_mut(shipment.line_no) {
                        item.shipped = shipment.units.clone();
                    }
                }
                self.estimated_delivery_date = e.estimated_delivery_date;
                self.shipped_by = Some(e.shipped_by);
                self.shipped_at = Some(e.occurred_at);
            }
            TransferEvent::Received(e) => {
                self.status = TransferStatus::Received;
                self.received_by = Some(e.received_by);
                self.received_at = Some(e.occurred_at);
            }
            TransferEvent::Rejected(e) => {
                self.status = TransferStatus::Rejected;
                self.rejection_reason = Some(e.reason.clone());
                self.rejected_by = Some(e.rejected_by);
                self.rejected_at = Some(e.occurred_at);
            }
            TransferEvent::Cancelled(e) => {
                self.status = TransferStatus::Cancelled;
                self.cancellation_reason = Some(e.reason.clone());
                self.cancelled_by = Some(e.cancelled_by);
                self.cancelled_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Request(cmd) => self.handle_request(cmd),
            TransferCommand::Approve(cmd) => self.handle_approve(cmd),
            TransferCommand::Ship(cmd) => self.handle_ship(cmd),
            TransferCommand::Receive(cmd) => self.handle_receive(cmd),
            TransferCommand::Reject(cmd) => self.handle_reject(cmd),
            TransferCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl StockTransferRequest {
    fn item_mut(&mut self, line_no: u32) -> Option<&mut TransferItem> {
        self.items.iter_mut().find(|i| i.line_no == line_no)
    }

    fn ensure_request_id(&self, request_id: TransferRequestId) -> Result<(), DomainError> {
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(
        &self,
        request_id: TransferRequestId,
        allowed: &[TransferStatus],
        action: &'static str,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("transfer request {}", self.id)));
        }
        self.ensure_request_id(request_id)?;
        if !allowed.contains(&self.status) {
            return Err(DomainError::invalid_transition(
                "transfer request",
                self.id,
                self.status,
                action,
            ));
        }
        Ok(())
    }

    fn handle_request(&self, cmd: &RequestTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer request already exists"));
        }
        self.ensure_request_id(cmd.request_id)?;

        if cmd.items.is_empty() {
            return Err(DomainError::validation("a transfer request needs at least one item"));
        }
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(cmd.items.len());
        for (idx, item) in cmd.items.iter().enumerate() {
            if item.quantity_requested < 1 {
                return Err(DomainError::validation(format!(
                    "item {}: quantity requested must be at least 1",
                    item.sku
                )));
            }
            if !seen.insert(item.type_component_id) {
                return Err(DomainError::validation(format!(
                    "component type {} appears more than once",
                    item.sku
                )));
            }
            items.push(TransferItem {
                line_no: idx as u32 + 1,
                type_component_id: item.type_component_id,
                sku: item.sku.clone(),
                quantity_requested: item.quantity_requested,
                quantity_approved: None,
                case_line_id: item.case_line_id,
                shipped: Vec::new(),
            });
        }

        Ok(vec![TransferEvent::Requested(TransferRequested {
            request_id: cmd.request_id,
            kind: cmd.kind,
            requesting_warehouse_id: cmd.requesting_warehouse_id,
            items,
            requested_by: cmd.requested_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_transition(cmd.request_id, &[TransferStatus::PendingApproval], "approve")?;

        if self.requesting_warehouse_id == Some(cmd.sourcing_warehouse_id) {
            return Err(DomainError::validation(
                "sourcing warehouse must differ from the requesting warehouse",
            ));
        }
        if cmd.approvals.len() != self.items.len() {
            return Err(DomainError::validation("every item needs an approved quantity"));
        }
        for item in &self.items {
            let approval = cmd
                .approvals
                .iter()
                .find(|a| a.line_no == item.line_no)
                .ok_or_else(|| {
                    DomainError::validation(format!("missing approval for item {}", item.sku))
                })?;
            if approval.quantity_approved < 0
                || approval.quantity_approved > item.quantity_requested
            {
                return Err(DomainError::validation(format!(
                    "item {}: approved quantity must be between 0 and {}",
                    item.sku, item.quantity_requested
                )));
            }
        }
        if cmd.approvals.iter().all(|a| a.quantity_approved == 0) {
            let requested = self.items.iter().map(|i| i.quantity_requested).sum();
            return Err(DomainError::insufficient_stock(requested, 0));
        }

        Ok(vec![TransferEvent::Approved(TransferApproved {
            request_id: cmd.request_id,
            sourcing_warehouse_id: cmd.sourcing_warehouse_id,
            approvals: cmd.approvals.clone(),
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_transition(cmd.request_id, &[TransferStatus::Approved], "ship")?;

        let mut serials = HashSet::new();
        for item in &self.items {
            let approved = item.quantity_approved.unwrap_or(0);
            let units = cmd
                .shipments
                .iter()
                .find(|s| s.line_no == item.line_no)
                .map(|s| s.units.as_slice())
                .unwrap_or(&[]);
            if units.len() as i64 != approved {
                return Err(DomainError::validation(format!(
                    "item {}: shipping {} units, approved {approved}",
                    item.sku,
                    units.len()
                )));
            }
            for unit in units {
                if !serials.insert(unit.serial_number.as_str()) {
                    return Err(DomainError::duplicate_serial(unit.serial_number.clone()));
                }
            }
        }
        if cmd
            .shipments
            .iter()
            .any(|s| !self.items.iter().any(|i| i.line_no == s.line_no))
        {
            return Err(DomainError::validation("shipment references an unknown item"));
        }

        Ok(vec![TransferEvent::Shipped(TransferShipped {
            request_id: cmd.request_id,
            shipments: cmd.shipments.clone(),
            estimated_delivery_date: cmd.estimated_delivery_date,
            shipped_by: cmd.shipped_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_transition(cmd.request_id, &[TransferStatus::Shipped], "receive")?;

        if let Some(received) = &cmd.received_serials {
            let shipped = self.shipped_serials();
            let got: BTreeSet<&str> = received.iter().map(|s| s.trim()).collect();
            if got.len() != received.len() || got != shipped {
                let missing: Vec<&str> = shipped.difference(&got).copied().collect();
                let unexpected: Vec<&str> = got.difference(&shipped).copied().collect();
                return Err(DomainError::receipt_mismatch(format!(
                    "shipped {} units, received {}; missing {missing:?}, unexpected {unexpected:?}",
                    shipped.len(),
                    received.len()
                )));
            }
        }

        Ok(vec![TransferEvent::Received(TransferReceived {
            request_id: cmd.request_id,
            received_by: cmd.received_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_transition(cmd.request_id, &[TransferStatus::PendingApproval], "reject")?;
        let reason = required_reason(&cmd.reason, "rejection")?;

        Ok(vec![TransferEvent::Rejected(TransferRejected {
            request_id: cmd.request_id,
            reason,
            rejected_by: cmd.rejected_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_transition(
            cmd.request_id,
            &[TransferStatus::PendingApproval, TransferStatus::Approved],
            "cancel",
        )?;
        let reason = required_reason(&cmd.reason, "cancellation")?;

        Ok(vec![TransferEvent::Cancelled(TransferCancelled {
            request_id: cmd.request_id,
            reason,
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn required_reason(reason: &str, what: &str) -> Result<String, DomainError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::validation(format!("{what} reason is required")));
    }
    Ok(reason.to_string())
}
