//! Command definitions
//!
//! Commands represent intentions to change the ledger.

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move coins from one user to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Authenticated sender
    pub from_user_id: UserId,
    /// Recipient, addressed by username
    pub to_username: String,
    /// Coins to move; validated by the handler
    pub amount: i64,
}

impl TransferCommand {
    pub fn new(from_user_id: UserId, to_username: impl Into<String>, amount: i64) -> Self {
        Self {
            from_user_id,
            to_username: to_username.into(),
            amount,
        }
    }
}

// =========================================================================
// PurchaseCommand
// =========================================================================

/// Command to buy one unit of a catalog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCommand {
    pub user_id: UserId,
    pub item_type: String,
}

impl PurchaseCommand {
    pub fn new(user_id: UserId, item_type: impl Into<String>) -> Self {
        Self {
            user_id,
            item_type: item_type.into(),
        }
    }
}

/// Result of a successful transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub to_username: String,
    pub amount: i64,
    /// Sender balance after the transfer committed
    pub sender_balance: i64,
}

/// Result of a successful purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub user_id: UserId,
    pub item_type: String,
    pub price: i64,
    pub remaining_balance: i64,
    /// Units of this item owned after the purchase
    pub quantity: i64,
}
