//! Domain Error Types
//!
//! Outcomes of the transfer, purchase and query operations.

use thiserror::Error;

use super::UserId;
use crate::store::StoreError;

/// Errors returned by the ledger engines.
///
/// Validation and domain-state variants are expected business outcomes.
/// `Store` wraps infrastructure failures; the atomic unit has already been
/// aborted by the time one is returned.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Item type is not in the catalog
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Transfer target username does not exist
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if this is an infrastructure failure
    pub fn is_infrastructure_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
