//! Reservation engine: holds stock for repair case lines.
//!
//! ```text
//! PENDING --pick up--> PICKED_UP --install--> INSTALLED
//! PENDING --cancel---> CANCELLED
//! ```
//!
//! Quantity effects go through the ledger: reserving raises `reserved`,
//! cancelling lowers it, installing lowers both `reserved` and `in_stock`.
//! Pick-up is a physical hand-off and does not touch the counters.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use evwarranty_auth::{Action, Actor};
use evwarranty_core::{
    Aggregate, CaseLineId, DomainError, ReservationId, TypeComponentId, UserId, WarehouseId,
};
use evwarranty_inventory::{
    CancelReservation, Component, ComponentReservation, HistoryCause, Install, PickUp,
    ReservationCommand, ReserveComponents,
};

use crate::access;
use crate::error::InventoryResult;
use crate::ledger::{QuantityChange, StockLedger};
use crate::notify::{Notification, NotificationSink, Outbox};
use crate::store::{InventoryStore, InventoryTx, ReservationFilter};

/// Input for [`ReservationEngine::reserve_components`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest {
    pub case_line_id: CaseLineId,
    pub type_component_id: TypeComponentId,
    pub quantity: i64,
    /// Defaults to the actor's service-center warehouse.
    pub warehouse_id: Option<WarehouseId>,
}

/// Result of installing a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub reservation: ComponentReservation,
    pub components: Vec<Component>,
}

#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn InventoryStore>,
    ledger: StockLedger,
    sink: Arc<dyn NotificationSink>,
}

impl ReservationEngine {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        ledger: StockLedger,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, ledger, sink }
    }

    /// Hold `quantity` units of a component type for a case line.
    ///
    /// The bucket row is locked before `available` is read, so two concurrent
    /// reservations can never both consume the last unit. No partial
    /// reservations: either the full quantity is held or nothing changes.
    #[instrument(
        skip(self, actor, request),
        fields(
            user_id = %actor.user_id,
            case_line_id = %request.case_line_id,
            type_component_id = %request.type_component_id,
            quantity = request.quantity
        ),
        err
    )]
    pub async fn reserve_components(
        &self,
        actor: &Actor,
        request: ReserveRequest,
    ) -> InventoryResult<ComponentReservation> {
        access::require(actor, Action::ReserveComponents)?;
        if request.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1").into());
        }

        let mut tx = self.store.begin().await?;
        let warehouse = access::resolve_warehouse(tx.as_mut(), actor, request.warehouse_id).await?;
        let stock = self
            .ledger
            .get_or_create_stock(tx.as_mut(), warehouse.id, request.type_component_id)
            .await?;
        let stock = self.ledger.lock(tx.as_mut(), stock.id).await?;

        if stock.quantity_available() < request.quantity {
            return Err(
                DomainError::insufficient_stock(request.quantity, stock.quantity_available()).into(),
            );
        }

        let now = Utc::now();
        let reservation_id = ReservationId::new();
        let mut units = tx
            .lock_available_components(warehouse.id, request.type_component_id, request.quantity)
            .await?;

        let mut reservation = ComponentReservation::empty(reservation_id);
        reservation.execute(&ReservationCommand::Reserve(ReserveComponents {
            reservation_id,
            case_line_id: request.case_line_id,
            stock_id: stock.id,
            warehouse_id: warehouse.id,
            type_component_id: request.type_component_id,
            quantity: request.quantity,
            component_ids: units.iter().map(|c| c.id).collect(),
            reserved_by: actor.user_id,
            occurred_at: now,
        }))?;

        for unit in &mut units {
            unit.reserve(reservation_id, now)?;
            tx.update_component(unit).await?;
        }

        let mut outbox = Outbox::new();
        self.ledger
            .adjust_quantities(
                tx.as_mut(),
                stock.id,
                QuantityChange::new(HistoryCause::ReservationCreated, reservation_id, actor.user_id, now)
                    .reserved(request.quantity),
                &mut outbox,
            )
            .await?;
        tx.insert_reservation(&reservation).await?;
        push_changed(&mut outbox, &reservation, actor.user_id);

        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(reservation_id = %reservation_id, bound = units.len(), "components reserved");
        Ok(reservation)
    }

    /// Mark reservations as handed to a technician. All or nothing: if any
    /// reservation is not `PENDING`, none is picked up.
    #[instrument(skip(self, actor, reservation_ids), fields(user_id = %actor.user_id, count = reservation_ids.len()), err)]
    pub async fn pickup_reserved_components(
        &self,
        actor: &Actor,
        reservation_ids: &[ReservationId],
        picked_up_by: UserId,
    ) -> InventoryResult<Vec<ComponentReservation>> {
        access::require(actor, Action::PickUpComponents)?;
        if reservation_ids.is_empty() {
            return Err(DomainError::validation("at least one reservation is required").into());
        }
        let mut seen = HashSet::with_capacity(reservation_ids.len());
        if let Some(dup) = reservation_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(DomainError::validation(format!("reservation {dup} listed twice")).into());
        }

        let mut tx = self.store.begin().await?;
        let now = Utc::now();
        let mut outbox = Outbox::new();
        let mut picked = Vec::with_capacity(reservation_ids.len());

        for id in reservation_ids {
            let mut reservation = self.locked_reservation(tx.as_mut(), actor, *id).await?;
            reservation.execute(&ReservationCommand::PickUp(PickUp {
                reservation_id: *id,
                picked_up_by,
                occurred_at: now,
            }))?;
            tx.update_reservation(&reservation).await?;
            push_changed(&mut outbox, &reservation, actor.user_id);
            picked.push(reservation);
        }

        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(count = picked.len(), "reservations picked up");
        Ok(picked)
    }

    /// Install a picked-up reservation: the parts leave the warehouse for good.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn install_component(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> InventoryResult<Installation> {
        access::require(actor, Action::InstallComponents)?;

        let mut tx = self.store.begin().await?;
        let now = Utc::now();
        let mut reservation = self.locked_reservation(tx.as_mut(), actor, reservation_id).await?;
        reservation.execute(&ReservationCommand::Install(Install {
            reservation_id,
            installed_by: actor.user_id,
            occurred_at: now,
        }))?;
        let stock_id = stock_of(&reservation)?;
        self.ledger.lock(tx.as_mut(), stock_id).await?;

        let mut components = tx.lock_components(reservation.component_ids()).await?;
        for component in &mut components {
            component.install(now)?;
            tx.update_component(component).await?;
        }

        let mut outbox = Outbox::new();
        let quantity = reservation.quantity();
        self.ledger
            .adjust_quantities(
                tx.as_mut(),
                stock_id,
                QuantityChange::new(HistoryCause::ComponentsInstalled, reservation_id, actor.user_id, now)
                    .in_stock(-quantity)
                    .reserved(-quantity),
                &mut outbox,
            )
            .await?;
        tx.update_reservation(&reservation).await?;
        push_changed(&mut outbox, &reservation, actor.user_id);

        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(reservation_id = %reservation_id, quantity, "reservation installed");
        Ok(Installation {
            reservation,
            components,
        })
    }

    /// Release a pending reservation back to available stock.
    #[instrument(skip(self, actor, reason), fields(user_id = %actor.user_id), err)]
    pub async fn cancel_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
        reason: Option<String>,
    ) -> InventoryResult<ComponentReservation> {
        access::require(actor, Action::CancelReservations)?;

        let mut tx = self.store.begin().await?;
        let now = Utc::now();
        let mut reservation = self.locked_reservation(tx.as_mut(), actor, reservation_id).await?;
        reservation.execute(&ReservationCommand::Cancel(CancelReservation {
            reservation_id,
            cancelled_by: actor.user_id,
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            occurred_at: now,
        }))?;
        let stock_id = stock_of(&reservation)?;
        self.ledger.lock(tx.as_mut(), stock_id).await?;

        for mut component in tx.lock_components(reservation.component_ids()).await? {
            component.release(now)?;
            tx.update_component(&component).await?;
        }

        let mut outbox = Outbox::new();
        self.ledger
            .adjust_quantities(
                tx.as_mut(),
                stock_id,
                QuantityChange::new(HistoryCause::ReservationCancelled, reservation_id, actor.user_id, now)
                    .reserved(-reservation.quantity())
                    .with_note(reservation.cancellation_reason().map(str::to_string)),
                &mut outbox,
            )
            .await?;
        tx.update_reservation(&reservation).await?;
        push_changed(&mut outbox, &reservation, actor.user_id);

        tx.commit().await?;
        outbox.flush(self.sink.as_ref());

        info!(reservation_id = %reservation_id, "reservation cancelled");
        Ok(reservation)
    }

    pub async fn get_reservation(
        &self,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> InventoryResult<ComponentReservation> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let reservation = tx
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("reservation {reservation_id}")))?;
        ensure_reservation_access(tx.as_mut(), actor, &reservation).await?;
        tx.rollback().await?;
        Ok(reservation)
    }

    /// Reservations of one case line, restricted to warehouses the actor can see.
    pub async fn list_for_case_line(
        &self,
        actor: &Actor,
        case_line_id: CaseLineId,
    ) -> InventoryResult<Vec<ComponentReservation>> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let visible = access::visible_warehouses(tx.as_mut(), actor).await?;
        let filter = ReservationFilter {
            case_line_id: Some(case_line_id),
            warehouse_ids: Some(visible.iter().map(|w| w.id).collect()),
            status: None,
        };
        let reservations = tx.list_reservations(&filter).await?;
        tx.rollback().await?;
        Ok(reservations)
    }

    async fn locked_reservation(
        &self,
        tx: &mut dyn InventoryTx,
        actor: &Actor,
        reservation_id: ReservationId,
    ) -> InventoryResult<ComponentReservation> {
        let reservation = tx
            .lock_reservation(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("reservation {reservation_id}")))?;
        ensure_reservation_access(tx, actor, &reservation).await?;
        Ok(reservation)
    }
}

async fn ensure_reservation_access(
    tx: &mut dyn InventoryTx,
    actor: &Actor,
    reservation: &ComponentReservation,
) -> InventoryResult<()> {
    let warehouse_id = reservation.warehouse_id().ok_or_else(|| {
        DomainError::invariant(format!("reservation {} has no warehouse", reservation.id_typed()))
    })?;
    access::accessible_warehouse(tx, actor, warehouse_id).await?;
    Ok(())
}

fn stock_of(reservation: &ComponentReservation) -> InventoryResult<evwarranty_core::StockId> {
    reservation.stock_id().ok_or_else(|| {
        DomainError::invariant(format!("reservation {} has no stock", reservation.id_typed())).into()
    })
}

fn push_changed(outbox: &mut Outbox, reservation: &ComponentReservation, changed_by: UserId) {
    if let (Some(case_line_id), Some(occurred_at)) = (
        reservation.case_line_id(),
        reservation
            .cancelled_at()
            .or(reservation.installed_at())
            .or(reservation.picked_up_at())
            .or(reservation.reserved_at()),
    ) {
        outbox.push(Notification::ReservationChanged {
            reservation_id: reservation.id_typed(),
            case_line_id,
            status: reservation.status(),
            changed_by,
            occurred_at,
        });
    }
}
