//! Warehouse inventory domain.
//!
//! Business rules for stock buckets, serialized components, reservations,
//! adjustments and transfer requests, implemented as deterministic domain
//! logic (no IO, no storage). The infra crate drives these types inside
//! store transactions.

pub mod adjustment;
pub mod catalog;
pub mod component;
pub mod history;
pub mod reservation;
pub mod stock;
pub mod transfer;

pub use adjustment::{
    AdjustmentLine, AdjustmentType, InventoryAdjustment, validate_reason, validate_serials,
};
pub use catalog::{TypeComponent, Warehouse, WarehouseOwner, normalize_sku};
pub use component::{Component, ComponentStatus, normalize_serial};
pub use history::{HistoryCause, StockHistoryEntry};
pub use reservation::{
    CancelReservation, ComponentReservation, ComponentsInstalled, ComponentsReserved, Install,
    PickUp, ReservationCancelled, ReservationCommand, ReservationEvent, ReservationPickedUp,
    ReservationStatus, ReserveComponents,
};
pub use stock::{LowStockSignal, Stock, available};
pub use transfer::{
    ApproveTransfer, CancelTransfer, ItemApproval, ItemShipment, ReceiveTransfer, RejectTransfer,
    RequestTransfer, RequestedItem, ShipTransfer, ShippedUnit, StockTransferRequest,
    TransferCommand, TransferEvent, TransferItem, TransferKind, TransferStatus,
};
