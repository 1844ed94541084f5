//! Component reservation aggregate.
//!
//! State machine: `PENDING -> PICKED_UP -> INSTALLED`, or `PENDING -> CANCELLED`.
//! The aggregate only decides; the reservation engine applies the matching
//! quantity deltas to the stock bucket inside the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evwarranty_core::{
    Aggregate, AggregateRoot, CaseLineId, ComponentId, DomainError, ReservationId, StockId,
    TypeComponentId, UserId, WarehouseId,
};
use evwarranty_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    PickedUp,
    Installed,
    Cancelled,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 4] = [
        ReservationStatus::Pending,
        ReservationStatus::PickedUp,
        ReservationStatus::Installed,
        ReservationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::PickedUp => "PICKED_UP",
            ReservationStatus::Installed => "INSTALLED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still holding quantity on the stock bucket.
    pub fn is_open(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::PickedUp)
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReservationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown reservation status '{s}'")))
    }
}

/// Aggregate root: ComponentReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReservation {
    id: ReservationId,
    case_line_id: Option<CaseLineId>,
    stock_id: Option<StockId>,
    warehouse_id: Option<WarehouseId>,
    type_component_id: Option<TypeComponentId>,
    quantity: i64,
    component_ids: Vec<ComponentId>,
    status: ReservationStatus,
    reserved_by: Option<UserId>,
    reserved_at: Option<DateTime<Utc>>,
    picked_up_by: Option<UserId>,
    picked_up_at: Option<DateTime<Utc>>,
    installed_by: Option<UserId>,
    installed_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    version: u64,
    created: bool,
}

impl ComponentReservation {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ReservationId) -> Self {
        Self {
            id,
            case_line_id: None,
            stock_id: None,
            warehouse_id: None,
            type_component_id: None,
            quantity: 0,
            component_ids: Vec::new(),
            status: ReservationStatus::Pending,
            reserved_by: None,
            reserved_at: None,
            picked_up_by: None,
            picked_up_at: None,
            installed_by: None,
            installed_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReservationId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn case_line_id(&self) -> Option<CaseLineId> {
        self.case_line_id
    }

    pub fn stock_id(&self) -> Option<StockId> {
        self.stock_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn type_component_id(&self) -> Option<TypeComponentId> {
        self.type_component_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Serialized units bound to this reservation. May be fewer than `quantity`.
    pub fn component_ids(&self) -> &[ComponentId] {
        &self.component_ids
    }

    pub fn reserved_by(&self) -> Option<UserId> {
        self.reserved_by
    }

    pub fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    pub fn picked_up_by(&self) -> Option<UserId> {
        self.picked_up_by
    }

    pub fn picked_up_at(&self) -> Option<DateTime<Utc>> {
        self.picked_up_at
    }

    pub fn installed_by(&self) -> Option<UserId> {
        self.installed_by
    }

    pub fn installed_at(&self) -> Option<DateTime<Utc>> {
        self.installed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }
}

impl AggregateRoot for ComponentReservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReserveComponents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveComponents {
    pub reservation_id: ReservationId,
    pub case_line_id: CaseLineId,
    pub stock_id: StockId,
    pub warehouse_id: WarehouseId,
    pub type_component_id: TypeComponentId,
    pub quantity: i64,
    pub component_ids: Vec<ComponentId>,
    pub reserved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PickUp. Marks physical hand-off to the technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickUp {
    pub reservation_id: ReservationId,
    pub picked_up_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Install {
    pub reservation_id: ReservationId,
    pub installed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: ReservationId,
    pub cancelled_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationCommand {
    Reserve(ReserveComponents),
    PickUp(PickUp),
    Install(Install),
    Cancel(CancelReservation),
}

/// Event: ComponentsReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentsReserved {
    pub reservation_id: ReservationId,
    pub case_line_id: CaseLineId,
    pub stock_id: StockId,
    pub warehouse_id: WarehouseId,
    pub type_component_id: TypeComponentId,
    pub quantity: i64,
    pub component_ids: Vec<ComponentId>,
    pub reserved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationPickedUp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPickedUp {
    pub reservation_id: ReservationId,
    pub picked_up_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ComponentsInstalled. The bucket loses `quantity` from both counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentsInstalled {
    pub reservation_id: ReservationId,
    pub stock_id: StockId,
    pub quantity: i64,
    pub component_ids: Vec<ComponentId>,
    pub installed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationCancelled. The bucket gets `quantity` back as available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCancelled {
    pub reservation_id: ReservationId,
    pub stock_id: StockId,
    pub quantity: i64,
    pub component_ids: Vec<ComponentId>,
    pub cancelled_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    Reserved(ComponentsReserved),
    PickedUp(ReservationPickedUp),
    Installed(ComponentsInstalled),
    Cancelled(ReservationCancelled),
}

impl Event for ReservationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::Reserved(_) => "inventory.reservation.created",
            ReservationEvent::PickedUp(_) => "inventory.reservation.picked_up",
            ReservationEvent::Installed(_) => "inventory.reservation.installed",
            ReservationEvent::Cancelled(_) => "inventory.reservation.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReservationEvent::Reserved(e) => e.occurred_at,
            ReservationEvent::PickedUp(e) => e.occurred_at,
            ReservationEvent::Installed(e) => e.occurred_at,
            ReservationEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ComponentReservation {
    type Command = ReservationCommand;
    type Event = ReservationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReservationEvent::Reserved(e) => {
                self.id = e.reservation_id;
                self.case_line_id = Some(e.case_line_id);
                self.stock_id = Some(e.stock_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.type_component_id = Some(e.type_component_id);
                self.quantity = e.quantity;
                self.component_ids = e.component_ids.clone();
                self.status = ReservationStatus::Pending;
                self.reserved_by = Some(e.reserved_by);
                self.reserved_at = Some(e.occurred_at);
                self.created = true;
            }
            ReservationEvent::PickedUp(e) => {
                self.status = ReservationStatus::PickedUp;
                self.picked_up_by = Some(e.picked_up_by);
                self.picked_up_at = Some(e.occurred_at);
            }
            ReservationEvent::Installed(e) => {
                self.status = ReservationStatus::Installed;
                self.installed_by = Some(e.installed_by);
                self.installed_at = Some(e.occurred_at);
            }
            ReservationEvent::Cancelled(e) => {
                self.status = ReservationStatus::Cancelled;
                self.cancelled_by = Some(e.cancelled_by);
                self.cancelled_at = Some(e.occurred_at);
                self.cancellation_reason = e.reason.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReservationCommand::Reserve(cmd) => self.handle_reserve(cmd),
            ReservationCommand::PickUp(cmd) => self.handle_pick_up(cmd),
            ReservationCommand::Install(cmd) => self.handle_install(cmd),
            ReservationCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ComponentReservation {
    fn ensure_reservation_id(&self, reservation_id: ReservationId) -> Result<(), DomainError> {
        if self.id != reservation_id {
            return Err(DomainError::invariant("reservation_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("reservation {}", self.id)));
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        expected: ReservationStatus,
        action: &'static str,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(
                "reservation",
                self.id,
                self.status,
                action,
            ));
        }
        Ok(())
    }

    // Callers resolve a stock bucket before reserving; these accessors are only
    // `None` on an empty aggregate, which `ensure_created` already rules out.
    fn bucket(&self) -> Result<StockId, DomainError> {
        self.stock_id
            .ok_or_else(|| DomainError::invariant(format!("reservation {} has no stock", self.id)))
    }

    fn handle_reserve(&self, cmd: &ReserveComponents) -> Result<Vec<ReservationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("reservation already exists"));
        }
        self.ensure_reservation_id(cmd.reservation_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.component_ids.len() as i64 > cmd.quantity {
            return Err(DomainError::validation(
                "cannot bind more components than the reserved quantity",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        if !cmd.component_ids.iter().all(|id| seen.insert(*id)) {
            return Err(DomainError::validation("component bound twice to one reservation"));
        }

        Ok(vec![ReservationEvent::Reserved(ComponentsReserved {
            reservation_id: cmd.reservation_id,
            case_line_id: cmd.case_line_id,
            stock_id: cmd.stock_id,
            warehouse_id: cmd.warehouse_id,
            type_component_id: cmd.type_component_id,
            quantity: cmd.quantity,
            component_ids: cmd.component_ids.clone(),
            reserved_by: cmd.reserved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pick_up(&self, cmd: &PickUp) -> Result<Vec<ReservationEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_reservation_id(cmd.reservation_id)?;
        self.ensure_status(ReservationStatus::Pending, "pick up")?;

        Ok(vec![ReservationEvent::PickedUp(ReservationPickedUp {
            reservation_id: cmd.reservation_id,
            picked_up_by: cmd.picked_up_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_install(&self, cmd: &Install) -> Result<Vec<ReservationEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_reservation_id(cmd.reservation_id)?;
        self.ensure_status(ReservationStatus::PickedUp, "install")?;

        Ok(vec![ReservationEvent::Installed(ComponentsInstalled {
            reservation_id: cmd.reservation_id,
            stock_id: self.bucket()?,
            quantity: self.quantity,
            component_ids: self.component_ids.clone(),
            installed_by: cmd.installed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelReservation) -> Result<Vec<ReservationEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_reservation_id(cmd.reservation_id)?;
        self.ensure_status(ReservationStatus::Pending, "cancel")?;

        let reason = cmd
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Ok(vec![ReservationEvent::Cancelled(ReservationCancelled {
            reservation_id: cmd.reservation_id,
            stock_id: self.bucket()?,
            quantity: self.quantity,
            component_ids: self.component_ids.clone(),
            cancelled_by: cmd.cancelled_by,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn reserve_cmd(id: ReservationId, quantity: i64) -> ReserveComponents {
        ReserveComponents {
            reservation_id: id,
            case_line_id: CaseLineId::new(),
            stock_id: StockId::new(),
            warehouse_id: WarehouseId::new(),
            type_component_id: TypeComponentId::new(),
            quantity,
            component_ids: vec![ComponentId::new()],
            reserved_by: UserId::new(),
            occurred_at: test_time(),
        }
    }

    fn reserved(quantity: i64) -> ComponentReservation {
        let id = ReservationId::new();
        let mut r = ComponentReservation::empty(id);
        r.execute(&ReservationCommand::Reserve(reserve_cmd(id, quantity)))
            .unwrap();
        r
    }

    #[test]
    fn reserve_emits_reserved_event() {
        let id = ReservationId::new();
        let r = ComponentReservation::empty(id);
        let cmd = reserve_cmd(id, 4);

        let events = r.handle(&ReservationCommand::Reserve(cmd.clone())).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ReservationEvent::Reserved(e) => {
                assert_eq!(e.quantity, 4);
                assert_eq!(e.stock_id, cmd.stock_id);
                assert_eq!(e.component_ids, cmd.component_ids);
            }
            _ => panic!("Expected Reserved event"),
        }
    }

    #[test]
    fn reserve_rejects_non_positive_quantity() {
        let id = ReservationId::new();
        let mut cmd = reserve_cmd(id, 0);
        cmd.component_ids.clear();
        let err = ComponentReservation::empty(id)
            .handle(&ReservationCommand::Reserve(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_pending_to_installed() {
        let mut r = reserved(2);
        let id = r.id_typed();
        let tech = UserId::new();

        r.execute(&ReservationCommand::PickUp(PickUp {
            reservation_id: id,
            picked_up_by: tech,
            occurred_at: test_time(),
        }))
        .unwrap();
        assert_eq!(r.status(), ReservationStatus::PickedUp);

        let events = r
            .execute(&ReservationCommand::Install(Install {
                reservation_id: id,
                installed_by: tech,
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            ReservationEvent::Installed(e) => assert_eq!(e.quantity, 2),
            _ => panic!("Expected Installed event"),
        }
        assert_eq!(r.status(), ReservationStatus::Installed);
        assert_eq!(r.version(), 3);
    }

    #[test]
    fn install_requires_pick_up_first() {
        let r = reserved(1);
        let err = r
            .handle(&ReservationCommand::Install(Install {
                reservation_id: r.id_typed(),
                installed_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn cannot_cancel_after_pick_up() {
        let mut r = reserved(1);
        let id = r.id_typed();
        r.execute(&ReservationCommand::PickUp(PickUp {
            reservation_id: id,
            picked_up_by: UserId::new(),
            occurred_at: test_time(),
        }))
        .unwrap();

        let err = r
            .handle(&ReservationCommand::Cancel(CancelReservation {
                reservation_id: id,
                cancelled_by: UserId::new(),
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("cannot cancel reservation {id} while it is PICKED_UP")
        );
    }

    #[test]
    fn cancel_returns_quantity_and_records_reason() {
        let mut r = reserved(3);
        let events = r
            .execute(&ReservationCommand::Cancel(CancelReservation {
                reservation_id: r.id_typed(),
                cancelled_by: UserId::new(),
                reason: Some("  case line abandoned ".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            ReservationEvent::Cancelled(e) => assert_eq!(e.quantity, 3),
            _ => panic!("Expected Cancelled event"),
        }
        assert_eq!(r.cancellation_reason(), Some("case line abandoned"));
        assert!(!r.status().is_open());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let r = reserved(1);
        let before = r.clone();
        let _ = r.handle(&ReservationCommand::PickUp(PickUp {
            reservation_id: r.id_typed(),
            picked_up_by: UserId::new(),
            occurred_at: test_time(),
        }));
        assert_eq!(r, before);
    }
}
