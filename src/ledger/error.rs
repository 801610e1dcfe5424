use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::store::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state transition for {entity}: {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn transition(entity: &'static str, from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        Self::InvalidStateTransition {
            entity,
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
