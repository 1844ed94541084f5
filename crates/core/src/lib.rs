//! `evwarranty-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    AdjustmentId, CaseLineId, CompanyId, ComponentId, HistoryEntryId, ReservationId,
    ServiceCenterId, StockId, TransferRequestId, TypeComponentId, UserId, WarehouseId,
};
