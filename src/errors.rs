use serde::Serialize;
use uuid::Uuid;

use crate::store::StoreError;

/// Crate-wide operation error.
///
/// Every failure here is local, synchronous and recoverable: operations that
/// fail leave all stock, order and commission state exactly as it was. The
/// caller decides whether to surface, retry or compensate.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(
        #[from]
        #[serde(skip)]
        StoreError,
    ),

    #[error("not found: {0}")]
    RecordNotFound(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order has no items")]
    EmptyOrder,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("event error: {0}")]
    EventError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Convenience constructor for the common "aggregate with this id does
    /// not exist" failure.
    pub fn record_not_found(kind: &str, id: Uuid) -> Self {
        ServiceError::RecordNotFound(format!("{} {} not found", kind, id))
    }
}
