//! Outbound notifications (low stock, adjustments, status changes).
//!
//! Engines collect notifications in an [`Outbox`] while a transaction is open
//! and hand them to the [`NotificationSink`] only after the commit succeeded.
//! Delivery is fire-and-forget: a failing sink is logged, never retried, and
//! never affects the ledger write that produced the notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use evwarranty_core::{
    AdjustmentId, CaseLineId, ReservationId, StockId, TransferRequestId, TypeComponentId, UserId,
    WarehouseId,
};
use evwarranty_events::{Event, EventBus, EventEnvelope};
use evwarranty_inventory::{AdjustmentType, ReservationStatus, TransferKind, TransferStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Availability dropped to or below the reorder point.
    LowStock {
        stock_id: StockId,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
        quantity_available: i64,
        reorder_point: i64,
        occurred_at: DateTime<Utc>,
    },
    AdjustmentCreated {
        adjustment_id: AdjustmentId,
        stock_id: StockId,
        warehouse_id: WarehouseId,
        adjustment_type: AdjustmentType,
        quantity_delta: i64,
        transfer_request_id: Option<TransferRequestId>,
        adjusted_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    TransferStatusChanged {
        request_id: TransferRequestId,
        kind: TransferKind,
        status: TransferStatus,
        requesting_warehouse_id: WarehouseId,
        sourcing_warehouse_id: Option<WarehouseId>,
        changed_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReservationChanged {
        reservation_id: ReservationId,
        case_line_id: CaseLineId,
        status: ReservationStatus,
        changed_by: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Notification {
    /// Id of the record the notification is about.
    pub fn subject_id(&self) -> Uuid {
        match self {
            Notification::LowStock { stock_id, .. } => (*stock_id).into(),
            Notification::AdjustmentCreated { adjustment_id, .. } => (*adjustment_id).into(),
            Notification::TransferStatusChanged { request_id, .. } => (*request_id).into(),
            Notification::ReservationChanged { reservation_id, .. } => (*reservation_id).into(),
        }
    }
}

impl Event for Notification {
    fn event_type(&self) -> &'static str {
        match self {
            Notification::LowStock { .. } => "inventory.stock.low",
            Notification::AdjustmentCreated { .. } => "inventory.adjustment.created",
            Notification::TransferStatusChanged { .. } => "inventory.transfer.status_changed",
            Notification::ReservationChanged { .. } => "inventory.reservation.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Notification::LowStock { occurred_at, .. }
            | Notification::AdjustmentCreated { occurred_at, .. }
            | Notification::TransferStatusChanged { occurred_at, .. }
            | Notification::ReservationChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

/// External receiver of inventory notifications.
///
/// Implementations must not block for long and must not panic; the caller
/// has already committed and will not look at the outcome.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<S> NotificationSink for std::sync::Arc<S>
where
    S: NotificationSink + ?Sized,
{
    fn notify(&self, notification: &Notification) {
        (**self).notify(notification)
    }
}

/// Publishes every notification as a JSON [`EventEnvelope`] on an event bus.
#[derive(Debug)]
pub struct BusNotificationSink<B> {
    bus: B,
}

impl<B> BusNotificationSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> NotificationSink for BusNotificationSink<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn notify(&self, notification: &Notification) {
        let envelope = match EventEnvelope::from_event(notification.subject_id(), notification) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    event_type = notification.event_type(),
                    error = %err,
                    "failed to serialize notification; dropped"
                );
                return;
            }
        };
        if let Err(err) = self.bus.publish(envelope) {
            warn!(
                event_type = notification.event_type(),
                error = ?err,
                "notification bus rejected message; dropped"
            );
        }
    }
}

/// Writes notifications to the log. Default sink when nothing else is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: &Notification) {
        info!(
            event_type = notification.event_type(),
            subject_id = %notification.subject_id(),
            "inventory notification"
        );
    }
}

/// Notifications queued by one transaction.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.pending.iter()
    }

    /// Deliver everything queued. Call only after the transaction committed.
    pub fn flush(self, sink: &dyn NotificationSink) {
        for notification in &self.pending {
            debug!(event_type = notification.event_type(), "delivering notification");
            sink.notify(notification);
        }
    }
}
