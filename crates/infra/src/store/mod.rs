//! Transactional storage boundary for the inventory tables.
//!
//! Engines talk to storage only through [`InventoryStore`] / [`InventoryTx`].
//! Two implementations ship: an in-memory store for tests/dev and a Postgres
//! store for production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{
    InventoryStore, InventoryTx, ReservationFilter, StoreError, TransferFilter, UsageCount,
};
