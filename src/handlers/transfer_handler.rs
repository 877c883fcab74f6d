//! Transfer Handler
//!
//! Moves coins between two users inside one atomic unit: sender debit,
//! recipient credit and both transfer log entries commit together or not
//! at all.

use crate::domain::{Amount, LedgerError, NewLedgerEvent, OperationContext, UserId};
use crate::store::{AtomicUnit, Ledger, LedgerStore, LockedAccount, TransactionLogStore};

use super::{TransferCommand, TransferResult};

/// Handler for coin transfers
#[derive(Debug, Clone)]
pub struct TransferHandler<L> {
    ledger: L,
}

impl<L: Ledger> TransferHandler<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Execute the transfer command
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, LedgerError> {
        let result = self.transfer(&command).await;

        match &result {
            Ok(transfer) => tracing::info!(
                from_user_id = %transfer.from_user_id,
                to_user = %transfer.to_username,
                amount = transfer.amount,
                correlation_id = ?context.correlation_id,
                "Coins transferred"
            ),
            Err(e) if e.is_infrastructure_error() => tracing::error!(
                from_user_id = %command.from_user_id,
                to_user = %command.to_username,
                amount = command.amount,
                correlation_id = ?context.correlation_id,
                error = %e,
                "Transfer aborted"
            ),
            Err(e) => tracing::debug!(
                from_user_id = %command.from_user_id,
                to_user = %command.to_username,
                amount = command.amount,
                correlation_id = ?context.correlation_id,
                reason = %e,
                "Transfer rejected"
            ),
        }

        result
    }

    async fn transfer(&self, command: &TransferCommand) -> Result<TransferResult, LedgerError> {
        let amount =
            Amount::new(command.amount).map_err(|_| LedgerError::InvalidAmount(command.amount))?;

        // Dropping `unit` on any early return aborts everything staged so far.
        let mut unit = self.ledger.begin().await?;

        let recipient_id = unit.resolve_username(&command.to_username).await?;
        let (sender, recipient) =
            lock_participants(&mut unit, command.from_user_id, recipient_id).await?;

        let sender = sender.ok_or(LedgerError::UserNotFound(command.from_user_id))?;
        let remaining = sender
            .balance
            .debit(amount)
            .map_err(|_| LedgerError::insufficient_funds(amount.value(), sender.balance.value()))?;

        unit.decrement(sender.id, amount).await?;

        let recipient =
            recipient.ok_or_else(|| LedgerError::RecipientNotFound(command.to_username.clone()))?;

        unit.increment(recipient.id, amount).await?;
        unit.append(&NewLedgerEvent::sent(
            sender.id,
            recipient.username.as_str(),
            amount,
        ))
        .await?;
        unit.append(&NewLedgerEvent::received(
            recipient.id,
            sender.username.as_str(),
            amount,
        ))
        .await?;

        unit.commit().await?;

        let sender_balance = if sender.id == recipient.id {
            sender.balance.value()
        } else {
            remaining.value()
        };

        Ok(TransferResult {
            from_user_id: sender.id,
            to_user_id: recipient.id,
            to_username: recipient.username,
            amount: amount.value(),
            sender_balance,
        })
    }
}

/// Lock sender and recipient rows in ascending id order.
///
/// Two opposite transfers between the same pair of users therefore always
/// queue on the same first row instead of each holding the row the other
/// one needs. A self-transfer locks its single row once.
async fn lock_participants<U: AtomicUnit>(
    unit: &mut U,
    sender_id: UserId,
    recipient_id: Option<UserId>,
) -> Result<(Option<LockedAccount>, Option<LockedAccount>), LedgerError> {
    match recipient_id {
        None => Ok((unit.lock_balance(sender_id).await?, None)),
        Some(recipient_id) if recipient_id == sender_id => {
            let account = unit.lock_balance(sender_id).await?;
            Ok((account.clone(), account))
        }
        Some(recipient_id) if recipient_id < sender_id => {
            let recipient = unit.lock_balance(recipient_id).await?;
            let sender = unit.lock_balance(sender_id).await?;
            Ok((sender, recipient))
        }
        Some(recipient_id) => {
            let sender = unit.lock_balance(sender_id).await?;
            let recipient = unit.lock_balance(recipient_id).await?;
            Ok((sender, recipient))
        }
    }
}
