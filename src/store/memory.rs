//! In-memory ledger store.
//!
//! Keeps all tables in process memory and reproduces the locking behaviour
//! of the PostgreSQL backend: every user row and every `(user, item)` pair
//! has its own async mutex, acquired by the `lock_*` methods and held by the
//! atomic unit until it commits or is dropped. Mutations are staged on the
//! unit and applied in one step on commit.
//!
//! Intended for tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use crate::domain::{
    Amount, AmountError, AuthenticatedUser, Balance, Direction, InventoryEntry, LedgerEvent,
    NewLedgerEvent, UserId,
};

use super::{
    AtomicUnit, InventoryStore, Ledger, LedgerStore, LockedAccount, StoreError, StoreResult,
    TransactionLogStore, UserCredentials, UserDirectory,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    User(UserId),
    Inventory(UserId, String),
}

#[derive(Debug)]
struct UserRow {
    username: String,
    password_hash: String,
    coins: i64,
}

#[derive(Debug)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRow>,
    usernames: HashMap<String, UserId>,
    inventory: BTreeMap<(UserId, String), i64>,
    events: Vec<LedgerEvent>,
    sessions: HashMap<String, Session>,
    last_user_id: i64,
    last_event_id: i64,
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    lock_timeout: Duration,
}

impl Shared {
    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))
    }

    fn row_lock(&self, key: &RowKey) -> StoreResult<Arc<RowMutex<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| StoreError::Unavailable("row lock table poisoned".to_string()))?;
        Ok(locks.entry(key.clone()).or_default().clone())
    }
}

/// In-process ledger backend
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    shared: Arc<Shared>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Bound how long a unit waits for a row held by another unit
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Atomic unit over a [`MemoryLedger`]
#[derive(Debug)]
pub struct MemoryUnit {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    balance_deltas: HashMap<UserId, i64>,
    inventory_deltas: BTreeMap<(UserId, String), i64>,
    appended: Vec<NewLedgerEvent>,
}

impl MemoryUnit {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            held: HashMap::new(),
            balance_deltas: HashMap::new(),
            inventory_deltas: BTreeMap::new(),
            appended: Vec::new(),
        }
    }

    /// Take the row lock for `key` unless this unit already holds it
    async fn acquire(&mut self, key: RowKey) -> StoreResult<()> {
        if self.held.contains_key(&key) {
            return Ok(());
        }

        let mutex = self.shared.row_lock(&key)?;
        let guard = tokio::time::timeout(self.shared.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| StoreError::Timeout)?;

        self.held.insert(key, guard);
        Ok(())
    }

    fn staged_delta(&self, user_id: UserId) -> i64 {
        self.balance_deltas.get(&user_id).copied().unwrap_or(0)
    }

    fn adjust_balance(&mut self, user_id: UserId, delta: i64) -> StoreResult<()> {
        let exists = self.shared.read()?.users.contains_key(&user_id);
        if !exists {
            return Err(StoreError::MissingRow(format!("user {user_id}")));
        }
        let staged = self.balance_deltas.entry(user_id).or_insert(0);
        *staged = staged.checked_add(delta).ok_or_else(|| {
            StoreError::Constraint(format!("balance change for user {user_id} overflows"))
        })?;
        Ok(())
    }

    fn apply(self) -> StoreResult<()> {
        let mut tables = self.shared.write()?;

        // Validate everything before touching any row so a rejected unit
        // leaves the tables untouched.
        let mut new_balances = Vec::with_capacity(self.balance_deltas.len());
        for (user_id, delta) in &self.balance_deltas {
            let row = tables
                .users
                .get(user_id)
                .ok_or_else(|| StoreError::MissingRow(format!("user {user_id}")))?;
            let coins = row.coins.checked_add(*delta).ok_or_else(|| {
                StoreError::Constraint(format!("balance of user {user_id} overflows"))
            })?;
            if coins < 0 {
                return Err(StoreError::Constraint(format!(
                    "balance of user {user_id} would become {coins}"
                )));
            }
            new_balances.push((*user_id, coins));
        }

        for (user_id, coins) in new_balances {
            if let Some(row) = tables.users.get_mut(&user_id) {
                row.coins = coins;
            }
        }

        for (key, delta) in self.inventory_deltas {
            *tables.inventory.entry(key).or_insert(0) += delta;
        }

        let created_at = Utc::now();
        for event in self.appended {
            tables.last_event_id += 1;
            let id = tables.last_event_id;
            tables.events.push(LedgerEvent {
                id,
                user_id: event.user_id,
                direction: event.direction,
                counterparty: event.counterparty,
                amount: event.amount,
                created_at,
            });
        }

        // Row guards in `self.held` are released when this function returns,
        // after the table write lock above has been dropped.
        drop(tables);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryUnit {
    async fn lock_balance(&mut self, user_id: UserId) -> StoreResult<Option<LockedAccount>> {
        self.acquire(RowKey::User(user_id)).await?;

        let delta = self.staged_delta(user_id);
        let tables = self.shared.read()?;
        let Some(row) = tables.users.get(&user_id) else {
            return Ok(None);
        };

        let balance = row
            .coins
            .checked_add(delta)
            .ok_or(AmountError::Overflow)
            .and_then(Balance::new)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        Ok(Some(LockedAccount {
            id: user_id,
            username: row.username.clone(),
            balance,
        }))
    }

    async fn resolve_username(&mut self, username: &str) -> StoreResult<Option<UserId>> {
        Ok(self.shared.read()?.usernames.get(username).copied())
    }

    async fn increment(&mut self, user_id: UserId, amount: Amount) -> StoreResult<()> {
        self.adjust_balance(user_id, amount.value())
    }

    async fn decrement(&mut self, user_id: UserId, amount: Amount) -> StoreResult<()> {
        self.adjust_balance(user_id, -amount.value())
    }
}

#[async_trait]
impl InventoryStore for MemoryUnit {
    async fn lock_quantity(
        &mut self,
        user_id: UserId,
        item_type: &str,
    ) -> StoreResult<Option<i64>> {
        // The pair is locked even when no row exists yet, so two units cannot
        // both create the same entry.
        self.acquire(RowKey::Inventory(user_id, item_type.to_string()))
            .await?;

        let key = (user_id, item_type.to_string());
        let staged = self.inventory_deltas.get(&key).copied();
        let committed = self.shared.read()?.inventory.get(&key).copied();

        Ok(match (committed, staged) {
            (None, None) => None,
            (committed, staged) => Some(committed.unwrap_or(0) + staged.unwrap_or(0)),
        })
    }

    async fn upsert_increment(
        &mut self,
        user_id: UserId,
        item_type: &str,
        delta: i64,
    ) -> StoreResult<()> {
        *self
            .inventory_deltas
            .entry((user_id, item_type.to_string()))
            .or_insert(0) += delta;
        Ok(())
    }
}

#[async_trait]
impl TransactionLogStore for MemoryUnit {
    async fn append(&mut self, event: &NewLedgerEvent) -> StoreResult<()> {
        self.appended.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl AtomicUnit for MemoryUnit {
    async fn commit(self) -> StoreResult<()> {
        self.apply()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    type Unit = MemoryUnit;

    async fn begin(&self) -> StoreResult<MemoryUnit> {
        Ok(MemoryUnit::new(self.shared.clone()))
    }

    async fn read_balance(&self, user_id: UserId) -> StoreResult<Option<Balance>> {
        let tables = self.shared.read()?;
        tables
            .users
            .get(&user_id)
            .map(|row| Balance::new(row.coins).map_err(|e| StoreError::InvalidData(e.to_string())))
            .transpose()
    }

    async fn list_inventory(&self, user_id: UserId) -> StoreResult<Vec<InventoryEntry>> {
        let tables = self.shared.read()?;
        Ok(tables
            .inventory
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((_, item_type), quantity)| InventoryEntry {
                item_type: item_type.clone(),
                quantity: *quantity,
            })
            .collect())
    }

    async fn list_events(
        &self,
        user_id: UserId,
        direction: Direction,
    ) -> StoreResult<Vec<LedgerEvent>> {
        let tables = self.shared.read()?;
        Ok(tables
            .events
            .iter()
            .filter(|event| event.user_id == user_id && event.direction == direction)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryLedger {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        coins: Balance,
    ) -> StoreResult<Option<UserId>> {
        let mut tables = self.shared.write()?;
        if tables.usernames.contains_key(username) {
            return Ok(None);
        }

        tables.last_user_id += 1;
        let id = UserId::new(tables.last_user_id);
        tables.users.insert(
            id,
            UserRow {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                coins: coins.value(),
            },
        );
        tables.usernames.insert(username.to_string(), id);

        Ok(Some(id))
    }

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<UserCredentials>> {
        let tables = self.shared.read()?;
        Ok(tables.usernames.get(username).and_then(|id| {
            tables.users.get(id).map(|row| UserCredentials {
                id: *id,
                username: row.username.clone(),
                password_hash: row.password_hash.clone(),
            })
        }))
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.shared.write()?;
        tables.sessions.insert(
            token_hash.to_string(),
            Session {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthenticatedUser>> {
        let tables = self.shared.read()?;
        Ok(tables
            .sessions
            .get(token_hash)
            .filter(|session| session.expires_at > now)
            .and_then(|session| {
                tables
                    .users
                    .get(&session.user_id)
                    .map(|row| AuthenticatedUser::new(session.user_id, row.username.clone()))
            }))
    }
}
