//! Command Handlers module
//!
//! Handlers that change the ledger. Each one runs its whole operation inside
//! a single atomic unit of the store.

mod commands;
mod purchase_handler;
mod transfer_handler;

#[cfg(test)]
mod tests;

pub use commands::*;
pub use purchase_handler::PurchaseHandler;
pub use transfer_handler::TransferHandler;
