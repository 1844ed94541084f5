//! Infrastructure layer: storage, the stock ledger and the inventory engines.

pub mod access;
pub mod adjustments;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod reporting;
pub mod reservations;
pub mod services;
pub mod store;
pub mod transfers;

mod integration_tests;

pub use adjustments::{
    AdjustmentEngine, AdjustmentRequest, BulkAdjustmentReport, BulkAdjustmentRequest,
    BulkItemOutcome, BulkItemResult, HistoryPage, SkuSerial,
};
pub use catalog::CatalogService;
pub use config::InventoryConfig;
pub use error::{InventoryError, InventoryResult};
pub use ledger::{QuantityChange, StockLedger};
pub use notify::{BusNotificationSink, LogNotificationSink, Notification, NotificationSink, Outbox};
pub use reporting::{ComponentUsage, InventoryReporter, StockLine, WarehouseSummary};
pub use reservations::{Installation, ReservationEngine, ReserveRequest};
pub use services::InventoryServices;
pub use store::{InMemoryInventoryStore, InventoryStore, InventoryTx, PostgresInventoryStore};
pub use transfers::{
    ApprovalRequest, NewTransferRequest, ReceiptRequest, ShipmentRequest, TransferEngine,
    TransferItemInput,
};
