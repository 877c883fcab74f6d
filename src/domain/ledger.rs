//! Ledger records
//!
//! Rows of the transfer log and the inventory table, plus the aggregate
//! view returned by the query service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, UserId};

/// Which side of a coin movement a log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Direction::Sent),
            "received" => Ok(Direction::Received),
            other => Err(format!("unknown transaction direction: {other}")),
        }
    }
}

/// One side of a transfer, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEvent {
    pub user_id: UserId,
    pub direction: Direction,
    pub counterparty: String,
    pub amount: Amount,
}

impl NewLedgerEvent {
    pub fn sent(user_id: UserId, to_username: impl Into<String>, amount: Amount) -> Self {
        Self {
            user_id,
            direction: Direction::Sent,
            counterparty: to_username.into(),
            amount,
        }
    }

    pub fn received(user_id: UserId, from_username: impl Into<String>, amount: Amount) -> Self {
        Self {
            user_id,
            direction: Direction::Received,
            counterparty: from_username.into(),
            amount,
        }
    }
}

/// Committed, immutable transfer log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: i64,
    pub user_id: UserId,
    pub direction: Direction,
    pub counterparty: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Quantity of one item type owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub item_type: String,
    pub quantity: i64,
}

/// Incoming coins, as shown in a user's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedCoins {
    pub from_user: String,
    pub amount: i64,
}

/// Outgoing coins, as shown in a user's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentCoins {
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinHistory {
    pub received: Vec<ReceivedCoins>,
    pub sent: Vec<SentCoins>,
}

/// Status view of a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub coins: i64,
    pub inventory: Vec<InventoryEntry>,
    pub coin_history: CoinHistory,
}
