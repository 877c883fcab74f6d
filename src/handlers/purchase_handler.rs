//! Purchase Handler
//!
//! Exchanges coins for one unit of a catalog item. The buyer's debit and the
//! inventory increment share one atomic unit. Purchases leave no transfer
//! log entry; the coins simply leave circulation.

use std::sync::Arc;

use crate::domain::{Catalog, LedgerError, OperationContext};
use crate::store::{AtomicUnit, InventoryStore, Ledger, LedgerStore};

use super::{PurchaseCommand, PurchaseResult};

/// Handler for catalog purchases
#[derive(Debug, Clone)]
pub struct PurchaseHandler<L> {
    ledger: L,
    catalog: Arc<Catalog>,
}

impl<L: Ledger> PurchaseHandler<L> {
    pub fn new(ledger: L, catalog: Arc<Catalog>) -> Self {
        Self { ledger, catalog }
    }

    /// Execute the purchase command
    pub async fn execute(
        &self,
        command: PurchaseCommand,
        context: &OperationContext,
    ) -> Result<PurchaseResult, LedgerError> {
        let result = self.purchase(&command).await;

        match &result {
            Ok(purchase) => tracing::info!(
                user_id = %purchase.user_id,
                item = %purchase.item_type,
                price = purchase.price,
                correlation_id = ?context.correlation_id,
                "Item purchased"
            ),
            Err(e) if e.is_infrastructure_error() => tracing::error!(
                user_id = %command.user_id,
                item = %command.item_type,
                correlation_id = ?context.correlation_id,
                error = %e,
                "Purchase aborted"
            ),
            Err(e) => tracing::debug!(
                user_id = %command.user_id,
                item = %command.item_type,
                correlation_id = ?context.correlation_id,
                reason = %e,
                "Purchase rejected"
            ),
        }

        result
    }

    async fn purchase(&self, command: &PurchaseCommand) -> Result<PurchaseResult, LedgerError> {
        let price = self
            .catalog
            .price_of(&command.item_type)
            .ok_or_else(|| LedgerError::ItemNotFound(command.item_type.clone()))?;

        let mut unit = self.ledger.begin().await?;

        let buyer = unit
            .lock_balance(command.user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(command.user_id))?;

        let remaining = buyer
            .balance
            .debit(price)
            .map_err(|_| LedgerError::insufficient_funds(price.value(), buyer.balance.value()))?;

        unit.decrement(buyer.id, price).await?;

        // Lock before upserting so concurrent first purchases of the same
        // item by the same user serialize on one row.
        let owned = unit.lock_quantity(buyer.id, &command.item_type).await?;
        unit.upsert_increment(buyer.id, &command.item_type, 1).await?;

        unit.commit().await?;

        Ok(PurchaseResult {
            user_id: buyer.id,
            item_type: command.item_type.clone(),
            price: price.value(),
            remaining_balance: remaining.value(),
            quantity: owned.unwrap_or(0) + 1,
        })
    }
}
