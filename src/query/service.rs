//! Query Service
//!
//! Assembles a user's balance, inventory and transfer history from
//! lock-free reads. Each read sees committed data only; a transfer that
//! commits between two reads may be visible in one and not the other.

use crate::domain::{
    CoinHistory, Direction, LedgerError, ReceivedCoins, SentCoins, UserId, UserInfo,
};
use crate::store::Ledger;

/// Query Service for user status views
#[derive(Debug, Clone)]
pub struct QueryService<L> {
    ledger: L,
}

impl<L: Ledger> QueryService<L> {
    /// Create a new QueryService
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Balance, inventory and coin history of `user_id`
    pub async fn get_user_info(&self, user_id: UserId) -> Result<UserInfo, LedgerError> {
        // Checked explicitly: the list queries below return empty
        // collections for unknown users.
        let coins = self
            .ledger
            .read_balance(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;

        let inventory = self.ledger.list_inventory(user_id).await?;

        let received = self
            .ledger
            .list_events(user_id, Direction::Received)
            .await?
            .into_iter()
            .map(|event| ReceivedCoins {
                from_user: event.counterparty,
                amount: event.amount.value(),
            })
            .collect();

        let sent = self
            .ledger
            .list_events(user_id, Direction::Sent)
            .await?
            .into_iter()
            .map(|event| SentCoins {
                to_user: event.counterparty,
                amount: event.amount.value(),
            })
            .collect();

        tracing::debug!(user_id = %user_id, coins = coins.value(), "User info assembled");

        Ok(UserInfo {
            coins: coins.value(),
            inventory,
            coin_history: CoinHistory { received, sent },
        })
    }
}
