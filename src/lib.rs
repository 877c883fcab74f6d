//! coin_shop Library
//!
//! Coin ledger for an internal merch shop: balances, transfers between
//! users, catalog purchases and per-user history.
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod auth;
pub mod domain;
pub mod handlers;
pub mod jobs;
pub mod query;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorResponse};
pub use domain::{Amount, AmountError, Balance, LedgerError, OperationContext, UserId};
pub use store::{Ledger, MemoryLedger, PgLedger, StoreError};
