//! Provisioning of reference data (warehouses, component catalog).
//!
//! Warehouses and catalog entries are owned by upstream systems; this service
//! only records them so the engines can resolve ids and SKUs.

use std::sync::Arc;

use tracing::{info, instrument};

use evwarranty_core::DomainError;
use evwarranty_inventory::{TypeComponent, Warehouse};

use crate::error::{InventoryError, InventoryResult};
use crate::store::{InventoryStore, StoreError};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn InventoryStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// At most one central warehouse per company and one warehouse per
    /// service center.
    #[instrument(skip(self, warehouse), fields(warehouse_id = %warehouse.id), err)]
    pub async fn add_warehouse(&self, warehouse: Warehouse) -> InventoryResult<Warehouse> {
        if warehouse.name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty").into());
        }

        let mut tx = self.store.begin().await?;
        if warehouse.is_central && warehouse.service_center_id().is_some() {
            return Err(
                DomainError::validation("a service-center warehouse cannot be central").into(),
            );
        }
        if warehouse.is_central && tx.central_warehouse(warehouse.company_id()).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "company {} already has a central warehouse",
                warehouse.company_id()
            ))
            .into());
        }
        if let Some(sc) = warehouse.service_center_id() {
            if tx.service_center_warehouse(sc).await?.is_some() {
                return Err(DomainError::conflict(format!(
                    "service center {sc} already has a warehouse"
                ))
                .into());
            }
        }

        tx.insert_warehouse(&warehouse).await.map_err(unique_as_conflict)?;
        tx.commit().await?;

        info!(name = %warehouse.name, central = warehouse.is_central, "warehouse added");
        Ok(warehouse)
    }

    #[instrument(skip(self, component), fields(sku = %component.sku), err)]
    pub async fn add_type_component(&self, component: TypeComponent) -> InventoryResult<TypeComponent> {
        let mut tx = self.store.begin().await?;
        if tx.find_type_component_by_sku(&component.sku).await?.is_some() {
            return Err(DomainError::conflict(format!("SKU {} already exists", component.sku)).into());
        }
        tx.insert_type_component(&component).await.map_err(unique_as_conflict)?;
        tx.commit().await?;

        info!(type_component_id = %component.id, "component type added");
        Ok(component)
    }
}

fn unique_as_conflict(err: StoreError) -> InventoryError {
    match err {
        StoreError::UniqueViolation(what) => DomainError::conflict(what).into(),
        other => other.into(),
    }
}
