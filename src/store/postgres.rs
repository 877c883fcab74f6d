//! PostgreSQL ledger store.
//!
//! Each atomic unit is one database transaction. Row locks come from
//! `SELECT ... FOR UPDATE`; `lock_timeout` is set per transaction so a unit
//! stuck behind another one fails with [`StoreError::Timeout`] instead of
//! waiting forever.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    Amount, AuthenticatedUser, Balance, Direction, InventoryEntry, LedgerEvent, NewLedgerEvent,
    UserId,
};

use super::{
    AtomicUnit, InventoryStore, Ledger, LedgerStore, LockedAccount, StoreError, StoreResult,
    TransactionLogStore, UserCredentials, UserDirectory,
};

/// PostgreSQL-backed ledger
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgLedger {
    /// Create a new PgLedger
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

/// Atomic unit backed by an open PostgreSQL transaction
pub struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

fn to_balance(coins: i64) -> StoreResult<Balance> {
    Balance::new(coins).map_err(|e| StoreError::InvalidData(e.to_string()))
}

#[async_trait]
impl LedgerStore for PgUnit {
    async fn lock_balance(&mut self, user_id: UserId) -> StoreResult<Option<LockedAccount>> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, username, coins FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|(id, username, coins)| -> StoreResult<LockedAccount> {
            Ok(LockedAccount {
                id: UserId::new(id),
                username,
                balance: to_balance(coins)?,
            })
        })
        .transpose()
    }

    async fn resolve_username(&mut self, username: &str) -> StoreResult<Option<UserId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(id.map(UserId::new))
    }

    async fn increment(&mut self, user_id: UserId, amount: Amount) -> StoreResult<()> {
        self.apply_delta(user_id, amount.value()).await
    }

    async fn decrement(&mut self, user_id: UserId, amount: Amount) -> StoreResult<()> {
        self.apply_delta(user_id, -amount.value()).await
    }
}

impl PgUnit {
    async fn apply_delta(&mut self, user_id: UserId, delta: i64) -> StoreResult<()> {
        let rows_affected = sqlx::query("UPDATE users SET coins = coins + $1 WHERE id = $2")
            .bind(delta)
            .bind(user_id.value())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::MissingRow(format!("user {user_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgUnit {
    async fn lock_quantity(
        &mut self,
        user_id: UserId,
        item_type: &str,
    ) -> StoreResult<Option<i64>> {
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM inventories
            WHERE user_id = $1 AND item_type = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id.value())
        .bind(item_type)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(quantity)
    }

    async fn upsert_increment(
        &mut self,
        user_id: UserId,
        item_type: &str,
        delta: i64,
    ) -> StoreResult<()> {
        // The unique (user_id, item_type) constraint turns a concurrent first
        // insert into an update instead of a second row.
        sqlx::query(
            r#"
            INSERT INTO inventories (user_id, item_type, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, item_type)
            DO UPDATE SET quantity = inventories.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(user_id.value())
        .bind(item_type)
        .bind(delta)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TransactionLogStore for PgUnit {
    async fn append(&mut self, event: &NewLedgerEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coin_transactions (user_id, transaction_type, counterparty, amount)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.user_id.value())
        .bind(event.direction.as_str())
        .bind(&event.counterparty)
        .bind(event.amount.value())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AtomicUnit for PgUnit {
    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    type Unit = PgUnit;

    async fn begin(&self) -> StoreResult<PgUnit> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement).execute(&mut *tx).await?;

        Ok(PgUnit { tx })
    }

    async fn read_balance(&self, user_id: UserId) -> StoreResult<Option<Balance>> {
        let coins: Option<i64> = sqlx::query_scalar("SELECT coins FROM users WHERE id = $1")
            .bind(user_id.value())
            .fetch_optional(&self.pool)
            .await?;

        coins.map(to_balance).transpose()
    }

    async fn list_inventory(&self, user_id: UserId) -> StoreResult<Vec<InventoryEntry>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT item_type, quantity FROM inventories
            WHERE user_id = $1
            ORDER BY item_type
            "#,
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_type, quantity)| InventoryEntry {
                item_type,
                quantity,
            })
            .collect())
    }

    async fn list_events(
        &self,
        user_id: UserId,
        direction: Direction,
    ) -> StoreResult<Vec<LedgerEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, transaction_type, counterparty, amount, created_at
            FROM coin_transactions
            WHERE user_id = $1 AND transaction_type = $2
            ORDER BY id
            "#,
        )
        .bind(user_id.value())
        .bind(direction.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }
}

/// `coin_transactions` row as selected by `list_events`
type EventRow = (i64, i64, String, String, i64, DateTime<Utc>);

fn event_from_row(row: EventRow) -> StoreResult<LedgerEvent> {
    let (id, user_id, direction, counterparty, amount, created_at) = row;

    Ok(LedgerEvent {
        id,
        user_id: UserId::new(user_id),
        direction: direction.parse().map_err(StoreError::InvalidData)?,
        counterparty,
        amount: Amount::new(amount).map_err(|e| StoreError::InvalidData(e.to_string()))?,
        created_at,
    })
}

#[async_trait]
impl UserDirectory for PgLedger {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        coins: Balance,
    ) -> StoreResult<Option<UserId>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password_hash, coins)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(coins.value())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<UserCredentials>> {
        let row: Option<(i64, String, String)> = sqlx::query_as(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, password_hash)| UserCredentials {
            id: UserId::new(id),
            username,
            password_hash,
        }))
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_hash)
        .bind(user_id.value())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthenticatedUser>> {
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.username
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username)| AuthenticatedUser::new(UserId::new(id), username)))
    }
}
