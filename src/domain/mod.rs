//! Domain module
//!
//! Core domain types and business rules.

pub mod amount;
pub mod catalog;
pub mod context;
pub mod error;
pub mod ledger;
pub mod user;

pub use amount::{Amount, AmountError, Balance};
pub use catalog::{Catalog, CatalogError};
pub use context::OperationContext;
pub use error::LedgerError;
pub use ledger::{
    CoinHistory, Direction, InventoryEntry, LedgerEvent, NewLedgerEvent, ReceivedCoins, SentCoins,
    UserInfo,
};
pub use user::{AuthenticatedUser, UserId};
