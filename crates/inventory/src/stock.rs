//! Stock bucket: the `(warehouse, component type)` quantity record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use evwarranty_core::{DomainError, DomainResult, StockId, TypeComponentId, WarehouseId};

/// Quantity record for one component type in one warehouse.
///
/// Invariant: `0 <= reserved <= in_stock`. `available` is derived and never
/// stored. Counters can only change through [`Stock::apply_delta`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub warehouse_id: WarehouseId,
    pub type_component_id: TypeComponentId,
    quantity_in_stock: i64,
    quantity_reserved: i64,
    pub reorder_point: i64,
    pub low_stock_notified_at: Option<DateTime<Utc>>,
    version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of re-evaluating the low-stock flag after a mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LowStockSignal {
    /// Crossed (or stayed) under the reorder point and the cooldown elapsed: alert.
    Raised,
    /// Back above the reorder point; the flag was cleared.
    Cleared,
    Unchanged,
}

impl Stock {
    /// A fresh, empty bucket.
    pub fn new(
        id: StockId,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
        reorder_point: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            warehouse_id,
            type_component_id,
            quantity_in_stock: 0,
            quantity_reserved: 0,
            reorder_point: reorder_point.max(0),
            low_stock_notified_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a bucket loaded from storage, re-checking the invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: StockId,
        warehouse_id: WarehouseId,
        type_component_id: TypeComponentId,
        quantity_in_stock: i64,
        quantity_reserved: i64,
        reorder_point: i64,
        low_stock_notified_at: Option<DateTime<Utc>>,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        check_quantities(quantity_in_stock, quantity_reserved)?;
        Ok(Self {
            id,
            warehouse_id,
            type_component_id,
            quantity_in_stock,
            quantity_reserved,
            reorder_point,
            low_stock_notified_at,
            version,
            created_at,
            updated_at,
        })
    }

    pub fn quantity_in_stock(&self) -> i64 {
        self.quantity_in_stock
    }

    pub fn quantity_reserved(&self) -> i64 {
        self.quantity_reserved
    }

    pub fn quantity_available(&self) -> i64 {
        available(self.quantity_in_stock, self.quantity_reserved)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_low(&self) -> bool {
        self.quantity_available() <= self.reorder_point
    }

    /// Apply both deltas atomically or not at all.
    pub fn apply_delta(
        &mut self,
        delta_in_stock: i64,
        delta_reserved: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let in_stock = self
            .quantity_in_stock
            .checked_add(delta_in_stock)
            .ok_or_else(|| DomainError::invariant("in-stock quantity overflow"))?;
        let reserved = self
            .quantity_reserved
            .checked_add(delta_reserved)
            .ok_or_else(|| DomainError::invariant("reserved quantity overflow"))?;
        check_quantities(in_stock, reserved).map_err(|e| match e {
            DomainError::InvariantViolation(msg) => {
                DomainError::invariant(format!("stock {}: {msg}", self.id))
            }
            other => other,
        })?;

        self.quantity_in_stock = in_stock;
        self.quantity_reserved = reserved;
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Low-stock hook, run after every successful quantity mutation.
    ///
    /// Raises at most once per `cooldown` while the bucket stays low, and
    /// clears the flag once availability climbs back above the reorder point.
    pub fn refresh_low_stock(&mut self, now: DateTime<Utc>, cooldown: Duration) -> LowStockSignal {
        if self.is_low() {
            let cooled_down = match self.low_stock_notified_at {
                None => true,
                Some(at) => now - at >= cooldown,
            };
            if cooled_down {
                self.low_stock_notified_at = Some(now);
                return LowStockSignal::Raised;
            }
            LowStockSignal::Unchanged
        } else if self.low_stock_notified_at.is_some() {
            self.low_stock_notified_at = None;
            LowStockSignal::Cleared
        } else {
            LowStockSignal::Unchanged
        }
    }
}

/// `in_stock - reserved`, clamped at zero for display safety.
pub fn available(in_stock: i64, reserved: i64) -> i64 {
    (in_stock - reserved).max(0)
}

fn check_quantities(in_stock: i64, reserved: i64) -> DomainResult<()> {
    if in_stock < 0 {
        return Err(DomainError::invariant(format!(
            "in-stock quantity cannot go negative (would be {in_stock})"
        )));
    }
    if reserved < 0 {
        return Err(DomainError::invariant(format!(
            "reserved quantity cannot go negative (would be {reserved})"
        )));
    }
    if reserved > in_stock {
        return Err(DomainError::invariant(format!(
            "reserved ({reserved}) cannot exceed in-stock ({in_stock})"
        )));
    }
    Ok(())
}
