//! Read-only views over the ledger: per-warehouse totals, stock lines and
//! component usage. Everything is scoped to the warehouses the actor acts for.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use evwarranty_auth::{Action, Actor};
use evwarranty_core::{StockId, TypeComponentId, WarehouseId};
use evwarranty_inventory::{Stock, TypeComponent};

use crate::access;
use crate::error::InventoryResult;
use crate::store::{InventoryStore, InventoryTx};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseSummary {
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub total_in_stock: i64,
    pub total_reserved: i64,
    pub total_available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLine {
    pub stock_id: StockId,
    pub warehouse_id: WarehouseId,
    pub type_component_id: TypeComponentId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity_in_stock: i64,
    pub quantity_reserved: i64,
    pub quantity_available: i64,
    pub reorder_point: i64,
    pub is_low: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentUsage {
    pub type_component_id: TypeComponentId,
    pub sku: String,
    pub name: String,
    pub installations: i64,
    pub quantity: i64,
}

#[derive(Clone)]
pub struct InventoryReporter {
    store: Arc<dyn InventoryStore>,
}

impl InventoryReporter {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// One row per visible warehouse, empty warehouses included.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn inventory_summary(&self, actor: &Actor) -> InventoryResult<Vec<WarehouseSummary>> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let warehouses = access::visible_warehouses(tx.as_mut(), actor).await?;
        let ids: Vec<WarehouseId> = warehouses.iter().map(|w| w.id).collect();
        let stocks = tx.list_stocks(Some(ids.as_slice())).await?;
        tx.rollback().await?;

        let mut totals: HashMap<WarehouseId, (i64, i64)> = HashMap::new();
        for stock in &stocks {
            let entry = totals.entry(stock.warehouse_id).or_default();
            entry.0 += stock.quantity_in_stock();
            entry.1 += stock.quantity_reserved();
        }

        let mut summary: Vec<WarehouseSummary> = warehouses
            .into_iter()
            .map(|w| {
                let (in_stock, reserved) = totals.get(&w.id).copied().unwrap_or_default();
                WarehouseSummary {
                    warehouse_id: w.id,
                    warehouse_name: w.name,
                    total_in_stock: in_stock,
                    total_reserved: reserved,
                    total_available: (in_stock - reserved).max(0),
                }
            })
            .collect();
        summary.sort_by(|a, b| a.warehouse_name.cmp(&b.warehouse_name));
        Ok(summary)
    }

    /// Buckets of one warehouse (the actor's own when `None`), ordered by SKU.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn stock_lines(
        &self,
        actor: &Actor,
        warehouse_id: Option<WarehouseId>,
        low_stock_only: bool,
    ) -> InventoryResult<Vec<StockLine>> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let warehouse = access::resolve_warehouse(tx.as_mut(), actor, warehouse_id).await?;
        let stocks = tx.list_stocks(Some(std::slice::from_ref(&warehouse.id))).await?;

        let mut lines = Vec::with_capacity(stocks.len());
        for stock in stocks.into_iter().filter(|s| !low_stock_only || s.is_low()) {
            let component = type_component(tx.as_mut(), stock.type_component_id).await?;
            lines.push(stock_line(&stock, component));
        }
        tx.rollback().await?;

        lines.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(lines)
    }

    /// Component types ranked by installed quantity over the visible
    /// warehouses, optionally only installs at or after `since`.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn most_used_components(
        &self,
        actor: &Actor,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> InventoryResult<Vec<ComponentUsage>> {
        access::require(actor, Action::ViewInventory)?;
        let mut tx = self.store.begin().await?;
        let warehouses = access::visible_warehouses(tx.as_mut(), actor).await?;
        let ids: Vec<WarehouseId> = warehouses.iter().map(|w| w.id).collect();
        let usage = tx.installed_usage(Some(ids.as_slice()), since).await?;

        let mut ranked = Vec::with_capacity(usage.len().min(limit));
        for count in usage.into_iter().take(limit) {
            let component = type_component(tx.as_mut(), count.type_component_id).await?;
            let (sku, name) = component
                .map(|c| (c.sku, c.name))
                .unwrap_or_default();
            ranked.push(ComponentUsage {
                type_component_id: count.type_component_id,
                sku,
                name,
                installations: count.installations,
                quantity: count.quantity,
            });
        }
        tx.rollback().await?;
        Ok(ranked)
    }
}

async fn type_component(
    tx: &mut dyn InventoryTx,
    id: TypeComponentId,
) -> InventoryResult<Option<TypeComponent>> {
    Ok(tx.get_type_component(id).await?)
}

fn stock_line(stock: &Stock, component: Option<TypeComponent>) -> StockLine {
    let (sku, name, category) = component
        .map(|c| (c.sku, c.name, c.category))
        .unwrap_or_default();
    StockLine {
        stock_id: stock.id,
        warehouse_id: stock.warehouse_id,
        type_component_id: stock.type_component_id,
        sku,
        name,
        category,
        quantity_in_stock: stock.quantity_in_stock(),
        quantity_reserved: stock.quantity_reserved(),
        quantity_available: stock.quantity_available(),
        reorder_point: stock.reorder_point,
        is_low: stock.is_low(),
    }
}
