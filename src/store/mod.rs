//! Store module
//!
//! Contracts of the ledger, inventory and transaction log stores, and the
//! atomic unit that spans them. Two backends implement them: PostgreSQL for
//! production and an in-process store for tests and local runs.
//!
//! Every mutation happens on an [`AtomicUnit`] obtained from
//! [`Ledger::begin`]. Rows read through a `lock_*` method stay exclusively
//! held until the unit is committed or dropped. Dropping a unit without
//! committing aborts it.

mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Amount, AuthenticatedUser, Balance, Direction, InventoryEntry, LedgerEvent, NewLedgerEvent,
    UserId,
};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryLedger;
pub use postgres::PgLedger;

/// User row as seen under an exclusive lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedAccount {
    pub id: UserId,
    pub username: String,
    pub balance: Balance,
}

/// Stored login data for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

/// Balance rows, scoped to one atomic unit
#[async_trait]
pub trait LedgerStore: Send {
    /// Read a balance and hold the user row until the unit ends.
    /// `None` if no such user exists.
    async fn lock_balance(&mut self, user_id: UserId) -> StoreResult<Option<LockedAccount>>;

    /// Map a username to its id. Usernames are immutable, so the id stays
    /// valid for the rest of the unit; lock it with `lock_balance`.
    async fn resolve_username(&mut self, username: &str) -> StoreResult<Option<UserId>>;

    async fn increment(&mut self, user_id: UserId, amount: Amount) -> StoreResult<()>;

    /// Does not check the result against zero; callers validate the locked
    /// balance first.
    async fn decrement(&mut self, user_id: UserId, amount: Amount) -> StoreResult<()>;
}

/// Inventory rows, scoped to one atomic unit
#[async_trait]
pub trait InventoryStore: Send {
    /// Current quantity of `(user, item)`, held until the unit ends
    async fn lock_quantity(&mut self, user_id: UserId, item_type: &str)
        -> StoreResult<Option<i64>>;

    /// Add `delta` to an existing row or create it with `quantity = delta`
    async fn upsert_increment(
        &mut self,
        user_id: UserId,
        item_type: &str,
        delta: i64,
    ) -> StoreResult<()>;
}

/// Append-only transfer log, scoped to one atomic unit
#[async_trait]
pub trait TransactionLogStore: Send {
    async fn append(&mut self, event: &NewLedgerEvent) -> StoreResult<()>;
}

/// One all-or-nothing set of store operations
#[async_trait]
pub trait AtomicUnit: LedgerStore + InventoryStore + TransactionLogStore + Sized {
    /// Make every staged mutation visible at once and release all row locks
    async fn commit(self) -> StoreResult<()>;
}

/// Entry point to a ledger backend
#[async_trait]
pub trait Ledger: Clone + Send + Sync + 'static {
    type Unit: AtomicUnit + 'static;

    /// Open a new atomic unit
    async fn begin(&self) -> StoreResult<Self::Unit>;

    /// Committed balance, without locking
    async fn read_balance(&self, user_id: UserId) -> StoreResult<Option<Balance>>;

    /// Inventory of a user, ordered by item type
    async fn list_inventory(&self, user_id: UserId) -> StoreResult<Vec<InventoryEntry>>;

    /// Transfer log entries of one direction, in commit order
    async fn list_events(
        &self,
        user_id: UserId,
        direction: Direction,
    ) -> StoreResult<Vec<LedgerEvent>>;
}

/// Accounts and bearer sessions, used by the authentication layer
#[async_trait]
pub trait UserDirectory: Clone + Send + Sync + 'static {
    /// Insert a new user. `None` when the username is already taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        coins: Balance,
    ) -> StoreResult<Option<UserId>>;

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<UserCredentials>>;

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// User owning a session that is still valid at `now`
    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthenticatedUser>>;
}
