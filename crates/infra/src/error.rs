use thiserror::Error;

use evwarranty_auth::AuthzError;
use evwarranty_core::DomainError;

use crate::store::StoreError;

/// Error returned by every inventory service operation.
///
/// Business failures arrive as [`DomainError`] and are meant for the caller;
/// storage failures arrive as [`StoreError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<AuthzError> for InventoryError {
    fn from(value: AuthzError) -> Self {
        InventoryError::Domain(DomainError::unauthorized(value.to_string()))
    }
}

impl InventoryError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::Domain(e) => e.kind(),
            InventoryError::Store(_) => "storage_error",
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            InventoryError::Domain(e) => Some(e),
            InventoryError::Store(_) => None,
        }
    }
}
