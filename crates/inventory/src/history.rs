use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use evwarranty_core::{DomainError, HistoryEntryId, StockId, UserId};

/// What caused a stock quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryCause {
    AdjustmentIn,
    AdjustmentOut,
    ReservationCreated,
    ReservationCancelled,
    ComponentsInstalled,
    TransferShipped,
    TransferReceived,
}

impl HistoryCause {
    pub const ALL: [HistoryCause; 7] = [
        HistoryCause::AdjustmentIn,
        HistoryCause::AdjustmentOut,
        HistoryCause::ReservationCreated,
        HistoryCause::ReservationCancelled,
        HistoryCause::ComponentsInstalled,
        HistoryCause::TransferShipped,
        HistoryCause::TransferReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryCause::AdjustmentIn => "ADJUSTMENT_IN",
            HistoryCause::AdjustmentOut => "ADJUSTMENT_OUT",
            HistoryCause::ReservationCreated => "RESERVATION_CREATED",
            HistoryCause::ReservationCancelled => "RESERVATION_CANCELLED",
            HistoryCause::ComponentsInstalled => "COMPONENTS_INSTALLED",
            HistoryCause::TransferShipped => "TRANSFER_SHIPPED",
            HistoryCause::TransferReceived => "TRANSFER_RECEIVED",
        }
    }
}

impl core::fmt::Display for HistoryCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for HistoryCause {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HistoryCause::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown history cause '{s}'")))
    }
}

/// Append-only record of one quantity mutation on a stock bucket.
///
/// Summing `delta_in_stock` over a bucket's entries reconciles to its current
/// `quantity_in_stock`; same for `delta_reserved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistoryEntry {
    pub id: HistoryEntryId,
    pub stock_id: StockId,
    pub cause: HistoryCause,
    /// Adjustment, reservation or transfer request that caused the change.
    pub reference_id: Uuid,
    pub delta_in_stock: i64,
    pub delta_reserved: i64,
    pub in_stock_after: i64,
    pub reserved_after: i64,
    pub actor_id: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_parses_its_own_name() {
        for cause in HistoryCause::ALL {
            assert_eq!(cause.to_string().parse::<HistoryCause>().unwrap(), cause);
        }
    }
}
