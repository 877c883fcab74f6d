//! Query module
//!
//! Read-only views over the ledger.

mod service;

pub use service::QueryService;
