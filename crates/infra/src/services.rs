//! Explicit composition of the inventory engines over one store and one sink.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::adjustments::AdjustmentEngine;
use crate::catalog::CatalogService;
use crate::config::InventoryConfig;
use crate::ledger::StockLedger;
use crate::notify::{LogNotificationSink, NotificationSink};
use crate::reporting::InventoryReporter;
use crate::reservations::ReservationEngine;
use crate::store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};
use crate::transfers::TransferEngine;

#[derive(Clone)]
pub struct InventoryServices {
    pub catalog: CatalogService,
    pub reservations: ReservationEngine,
    pub adjustments: AdjustmentEngine,
    pub transfers: TransferEngine,
    pub reporting: InventoryReporter,
    pub config: InventoryConfig,
}

impl InventoryServices {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        sink: Arc<dyn NotificationSink>,
        config: InventoryConfig,
    ) -> Self {
        let ledger = StockLedger::from_config(&config);
        Self {
            catalog: CatalogService::new(store.clone()),
            reservations: ReservationEngine::new(store.clone(), ledger.clone(), sink.clone()),
            adjustments: AdjustmentEngine::new(
                store.clone(),
                ledger.clone(),
                sink.clone(),
                config.max_history_page_size,
            ),
            transfers: TransferEngine::new(store.clone(), ledger, sink),
            reporting: InventoryReporter::new(store),
            config,
        }
    }

    /// In-memory store with the default configuration.
    pub fn in_memory(sink: Arc<dyn NotificationSink>) -> Self {
        Self::new(
            Arc::new(InMemoryInventoryStore::new()),
            sink,
            InventoryConfig::default(),
        )
    }

    /// Build from the process environment: Postgres (migrated) when
    /// `DATABASE_URL` is set, the in-memory store otherwise. Notifications
    /// go to the log.
    pub async fn from_env() -> anyhow::Result<Self> {
        let config = InventoryConfig::from_env();
        let store: Arc<dyn InventoryStore> = if config.database_url.is_some() {
            let store = PostgresInventoryStore::connect(&config)
                .await
                .context("connecting to the inventory database")?;
            store
                .migrate()
                .await
                .context("running inventory migrations")?;
            info!(max_connections = config.db_max_connections, "using postgres inventory store");
            Arc::new(store)
        } else {
            info!("DATABASE_URL not set; using in-memory inventory store");
            Arc::new(InMemoryInventoryStore::new())
        };
        Ok(Self::new(store, Arc::new(LogNotificationSink), config))
    }
}
