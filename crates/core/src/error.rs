//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Storage and transport
/// failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input, detected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested quantity exceeds what the bucket can give. Never backorders.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// Attempted transition is not legal from the entity's current status.
    #[error("cannot {action} {entity} {id} while it is {from}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        from: String,
        action: &'static str,
    },

    /// A component targeted by an operation is not in the expected status or bucket.
    #[error("component not available: {0}")]
    ComponentNotAvailable(String),

    #[error("duplicate serial number: {0}")]
    DuplicateSerialNumber(String),

    /// Received components do not match the shipped manifest.
    #[error("receipt mismatch: {0}")]
    ReceiptMismatch(String),

    /// Role or ownership check failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A domain invariant was violated. Signals a logic defect, not user error.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Stale version / optimistic concurrency failure.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl ToString,
        from: impl ToString,
        action: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            id: id.to_string(),
            from: from.to_string(),
            action,
        }
    }

    pub fn component_not_available(msg: impl Into<String>) -> Self {
        Self::ComponentNotAvailable(msg.into())
    }

    pub fn duplicate_serial(serial: impl Into<String>) -> Self {
        Self::DuplicateSerialNumber(serial.into())
    }

    pub fn receipt_mismatch(msg: impl Into<String>) -> Self {
        Self::ReceiptMismatch(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Stable machine-readable kind, used in per-item batch outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InvalidStateTransition { .. } => "invalid_state_transition",
            DomainError::ComponentNotAvailable(_) => "component_not_available",
            DomainError::DuplicateSerialNumber(_) => "duplicate_serial_number",
            DomainError::ReceiptMismatch(_) => "receipt_mismatch",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
        }
    }
}
