//! Audited stock adjustments.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evwarranty_core::{
    AdjustmentId, ComponentId, DomainError, DomainResult, StockId, TransferRequestId, UserId,
};

use crate::component::{ComponentStatus, normalize_serial};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    In,
    Out,
}

impl AdjustmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::In => "IN",
            AdjustmentType::Out => "OUT",
        }
    }
}

impl core::fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AdjustmentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(AdjustmentType::In),
            "OUT" => Ok(AdjustmentType::Out),
            other => Err(DomainError::validation(format!(
                "unknown adjustment type '{other}'"
            ))),
        }
    }
}

/// One unit touched by an adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub component_id: ComponentId,
    pub serial_number: String,
    /// `None` for units created by this adjustment.
    pub old_status: Option<ComponentStatus>,
    pub new_status: ComponentStatus,
    pub delta: i64,
}

/// Immutable audit record. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub id: AdjustmentId,
    pub stock_id: StockId,
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub note: Option<String>,
    pub lines: Vec<AdjustmentLine>,
    pub adjusted_by: UserId,
    pub adjusted_at: DateTime<Utc>,
    /// Set when the adjustment records a transfer shipment or receipt.
    pub transfer_request_id: Option<TransferRequestId>,
}

impl InventoryAdjustment {
    /// Net change to `quantity_in_stock` described by the lines.
    pub fn quantity_delta(&self) -> i64 {
        self.lines.iter().map(|l| l.delta).sum()
    }
}

/// Reasons are mandatory on every adjustment.
pub fn validate_reason(reason: &str) -> DomainResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::validation("reason is required"));
    }
    Ok(reason.to_string())
}

/// Trim every serial, reject blanks, and reject repeats within one request.
pub fn validate_serials<S: AsRef<str>>(serials: &[S]) -> DomainResult<Vec<String>> {
    if serials.is_empty() {
        return Err(DomainError::validation("at least one serial number is required"));
    }
    let mut seen = HashSet::with_capacity(serials.len());
    let mut out = Vec::with_capacity(serials.len());
    for raw in serials {
        let serial = normalize_serial(raw.as_ref())
            .ok_or_else(|| DomainError::validation("serial number cannot be blank"))?;
        if !seen.insert(serial.clone()) {
            return Err(DomainError::duplicate_serial(serial));
        }
        out.push(serial);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_are_trimmed_and_deduplicated() {
        let ok = validate_serials(&[" A1 ", "A2"]).unwrap();
        assert_eq!(ok, vec!["A1".to_string(), "A2".to_string()]);

        let err = validate_serials(&["A1", "A1 "]).unwrap_err();
        assert_eq!(err, DomainError::duplicate_serial("A1"));

        assert!(matches!(
            validate_serials::<&str>(&[]).unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            validate_serials(&["  "]).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn reason_is_required() {
        assert!(validate_reason("   ").is_err());
        assert_eq!(validate_reason(" damaged ").unwrap(), "damaged");
    }

    #[test]
    fn quantity_delta_sums_lines() {
        let adj = InventoryAdjustment {
            id: AdjustmentId::new(),
            stock_id: StockId::new(),
            adjustment_type: AdjustmentType::Out,
            reason: "damaged".into(),
            note: None,
            lines: vec![
                AdjustmentLine {
                    component_id: ComponentId::new(),
                    serial_number: "A".into(),
                    old_status: Some(ComponentStatus::InStock),
                    new_status: ComponentStatus::Removed,
                    delta: -1,
                },
                AdjustmentLine {
                    component_id: ComponentId::new(),
                    serial_number: "B".into(),
                    old_status: Some(ComponentStatus::InStock),
                    new_status: ComponentStatus::Removed,
                    delta: -1,
                },
            ],
            adjusted_by: UserId::new(),
            adjusted_at: Utc::now(),
            transfer_request_id: None,
        };
        assert_eq!(adj.quantity_delta(), -2);
        assert_eq!("out".parse::<AdjustmentType>().unwrap(), AdjustmentType::Out);
    }
}
