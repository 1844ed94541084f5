use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evwarranty_core::{
    ComponentId, DomainError, DomainResult, ReservationId, TypeComponentId, WarehouseId,
};

/// Lifecycle of a single serialized unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    InStock,
    Reserved,
    Installed,
    InTransit,
    Removed,
    Returned,
    Defective,
}

impl ComponentStatus {
    pub const ALL: [ComponentStatus; 7] = [
        ComponentStatus::InStock,
        ComponentStatus::Reserved,
        ComponentStatus::Installed,
        ComponentStatus::InTransit,
        ComponentStatus::Removed,
        ComponentStatus::Returned,
        ComponentStatus::Defective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::InStock => "IN_STOCK",
            ComponentStatus::Reserved => "RESERVED",
            ComponentStatus::Installed => "INSTALLED",
            ComponentStatus::InTransit => "IN_TRANSIT",
            ComponentStatus::Removed => "REMOVED",
            ComponentStatus::Returned => "RETURNED",
            ComponentStatus::Defective => "DEFECTIVE",
        }
    }
}

impl core::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ComponentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown component status '{s}'")))
    }
}

/// A physical, serialized unit.
///
/// `warehouse_id` is `None` while the unit is in transit or installed on a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub serial_number: String,
    pub type_component_id: TypeComponentId,
    pub warehouse_id: Option<WarehouseId>,
    pub status: ComponentStatus,
    pub reservation_id: Option<ReservationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Component {
    /// A unit entering a warehouse through an IN adjustment.
    pub fn received(
        id: ComponentId,
        serial_number: String,
        type_component_id: TypeComponentId,
        warehouse_id: WarehouseId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            serial_number,
            type_component_id,
            warehouse_id: Some(warehouse_id),
            status: ComponentStatus::InStock,
            reservation_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ComponentStatus::InStock
    }

    pub fn reserve(&mut self, reservation_id: ReservationId, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ComponentStatus::InStock, ComponentStatus::Reserved, now)?;
        self.reservation_id = Some(reservation_id);
        Ok(())
    }

    pub fn release(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ComponentStatus::Reserved, ComponentStatus::InStock, now)?;
        self.reservation_id = None;
        Ok(())
    }

    pub fn install(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ComponentStatus::Reserved, ComponentStatus::Installed, now)?;
        self.warehouse_id = None;
        Ok(())
    }

    pub fn remove(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ComponentStatus::InStock, ComponentStatus::Removed, now)
    }

    /// Leave the source warehouse on a transfer shipment.
    pub fn dispatch(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ComponentStatus::InStock, ComponentStatus::InTransit, now)?;
        self.warehouse_id = None;
        Ok(())
    }

    /// Arrive at the requesting warehouse on transfer receipt.
    pub fn arrive(&mut self, warehouse_id: WarehouseId, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ComponentStatus::InTransit, ComponentStatus::InStock, now)?;
        self.warehouse_id = Some(warehouse_id);
        Ok(())
    }

    fn transition(
        &mut self,
        from: ComponentStatus,
        to: ComponentStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != from {
            return Err(DomainError::component_not_available(format!(
                "component {} is {}, expected {from}",
                self.serial_number, self.status
            )));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

/// Trim a serial number; blank input is rejected.
pub fn normalize_serial(serial: &str) -> Option<String> {
    let serial = serial.trim();
    if serial.is_empty() {
        None
    } else {
        Some(serial.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Component {
        Component::received(
            ComponentId::new(),
            "SN-001".to_string(),
            TypeComponentId::new(),
            WarehouseId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in ComponentStatus::ALL {
            assert_eq!(status.as_str().parse::<ComponentStatus>().unwrap(), status);
        }
        assert!("LOST".parse::<ComponentStatus>().is_err());
    }

    #[test]
    fn reserve_install_lifecycle() {
        let mut c = unit();
        let reservation = ReservationId::new();
        c.reserve(reservation, Utc::now()).unwrap();
        assert_eq!(c.reservation_id, Some(reservation));

        c.install(Utc::now()).unwrap();
        assert_eq!(c.status, ComponentStatus::Installed);
        assert_eq!(c.warehouse_id, None);
    }

    #[test]
    fn cannot_remove_a_reserved_unit() {
        let mut c = unit();
        c.reserve(ReservationId::new(), Utc::now()).unwrap();
        let err = c.remove(Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::ComponentNotAvailable(_)));
        assert_eq!(c.status, ComponentStatus::Reserved);
    }

    #[test]
    fn transit_rehomes_the_unit() {
        let mut c = unit();
        let destination = WarehouseId::new();
        c.dispatch(Utc::now()).unwrap();
        assert_eq!(c.warehouse_id, None);
        c.arrive(destination, Utc::now()).unwrap();
        assert_eq!(c.warehouse_id, Some(destination));
        assert!(c.is_available());
    }
}
