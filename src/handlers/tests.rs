//! Handler tests against the in-process ledger

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::domain::{Balance, Catalog, Direction, LedgerError, OperationContext, UserId};
    use crate::handlers::{PurchaseCommand, PurchaseHandler, TransferCommand, TransferHandler};
    use crate::store::{Ledger, LedgerStore, MemoryLedger, StoreError, UserDirectory};

    async fn seed(ledger: &MemoryLedger, username: &str, coins: i64) -> UserId {
        ledger
            .create_user(username, "hash", Balance::new(coins).unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    async fn balance(ledger: &MemoryLedger, user_id: UserId) -> i64 {
        ledger.read_balance(user_id).await.unwrap().unwrap().value()
    }

    fn purchase_handler(ledger: &MemoryLedger) -> PurchaseHandler<MemoryLedger> {
        PurchaseHandler::new(ledger.clone(), Arc::new(Catalog::default()))
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    #[tokio::test]
    async fn test_transfer_moves_coins_and_logs_both_sides() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 1000).await;
        let bob = seed(&ledger, "bob", 1000).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "bob", 300), &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(result.to_user_id, bob);
        assert_eq!(result.sender_balance, 700);
        assert_eq!(balance(&ledger, alice).await, 700);
        assert_eq!(balance(&ledger, bob).await, 1300);

        let sent = ledger.list_events(alice, Direction::Sent).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].counterparty, "bob");
        assert_eq!(sent[0].amount.value(), 300);

        let received = ledger.list_events(bob, Direction::Received).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].counterparty, "alice");
    }

    #[tokio::test]
    async fn test_transfer_of_entire_balance() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 250).await;
        seed(&ledger, "bob", 0).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "bob", 250), &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(result.sender_balance, 0);
        assert_eq!(balance(&ledger, alice).await, 0);
    }

    #[tokio::test]
    async fn test_transfer_rejects_non_positive_amount() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 100).await;
        seed(&ledger, "bob", 100).await;
        let handler = TransferHandler::new(ledger.clone());

        for amount in [0, -5] {
            let result = handler
                .execute(TransferCommand::new(alice, "bob", amount), &OperationContext::new())
                .await;
            assert!(matches!(result, Err(LedgerError::InvalidAmount(a)) if a == amount));
        }
        assert_eq!(balance(&ledger, alice).await, 100);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_changes_nothing() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 100).await;
        let bob = seed(&ledger, "bob", 100).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "bob", 101), &OperationContext::new())
            .await;

        match result {
            Err(LedgerError::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, 101);
                assert_eq!(available, 100);
            }
            other => panic!("Expected InsufficientFunds, got: {:?}", other),
        }
        assert_eq!(balance(&ledger, alice).await, 100);
        assert_eq!(balance(&ledger, bob).await, 100);
        assert!(ledger.list_events(alice, Direction::Sent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_recipient_rolls_back() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 100).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "nobody", 10), &OperationContext::new())
            .await;

        assert!(matches!(result, Err(LedgerError::RecipientNotFound(name)) if name == "nobody"));
        assert_eq!(balance(&ledger, alice).await, 100);
        assert!(ledger.list_events(alice, Direction::Sent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_funds_reported_before_unknown_recipient() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 5).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "nobody", 10), &OperationContext::new())
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_transfer_from_unknown_sender() {
        let ledger = MemoryLedger::new();
        seed(&ledger, "bob", 100).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(
                TransferCommand::new(UserId::new(999), "bob", 10),
                &OperationContext::new(),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::UserNotFound(id)) if id == UserId::new(999)));
    }

    #[tokio::test]
    async fn test_self_transfer_keeps_balance_and_logs_twice() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 100).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "alice", 40), &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(result.sender_balance, 100);
        assert_eq!(balance(&ledger, alice).await, 100);
        assert_eq!(ledger.list_events(alice, Direction::Sent).await.unwrap().len(), 1);
        assert_eq!(ledger.list_events(alice, Direction::Received).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_self_transfer_still_requires_funds() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 10).await;
        let handler = TransferHandler::new(ledger.clone());

        let result = handler
            .execute(TransferCommand::new(alice, "alice", 11), &OperationContext::new())
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_transfer_times_out_on_held_row() {
        let ledger = MemoryLedger::with_lock_timeout(Duration::from_millis(50));
        let alice = seed(&ledger, "alice", 1000).await;
        let bob = seed(&ledger, "bob", 1000).await;
        let handler = TransferHandler::new(ledger.clone());

        let mut holder = ledger.begin().await.unwrap();
        holder.lock_balance(alice).await.unwrap();

        let result = handler
            .execute(TransferCommand::new(alice, "bob", 10), &OperationContext::new())
            .await;
        assert!(matches!(result, Err(LedgerError::Store(StoreError::Timeout))));

        drop(holder);
        assert_eq!(balance(&ledger, alice).await, 1000);
        assert_eq!(balance(&ledger, bob).await, 1000);
        assert!(ledger.list_events(alice, Direction::Sent).await.unwrap().is_empty());
        assert!(ledger.list_events(bob, Direction::Received).await.unwrap().is_empty());
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    #[tokio::test]
    async fn test_purchase_debits_price_and_adds_item() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 1000).await;
        let handler = purchase_handler(&ledger);

        let result = handler
            .execute(PurchaseCommand::new(alice, "t-shirt"), &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(result.price, 80);
        assert_eq!(result.remaining_balance, 920);
        assert_eq!(result.quantity, 1);
        assert_eq!(balance(&ledger, alice).await, 920);

        let inventory = ledger.list_inventory(alice).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].item_type, "t-shirt");
        assert_eq!(inventory[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_repeat_purchase_increments_same_row() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 1000).await;
        let handler = purchase_handler(&ledger);

        for _ in 0..3 {
            handler
                .execute(PurchaseCommand::new(alice, "pen"), &OperationContext::new())
                .await
                .unwrap();
        }

        let inventory = ledger.list_inventory(alice).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].quantity, 3);
        assert_eq!(balance(&ledger, alice).await, 970);
    }

    #[tokio::test]
    async fn test_purchase_unknown_item() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 1000).await;
        let handler = purchase_handler(&ledger);

        let result = handler
            .execute(PurchaseCommand::new(alice, "yacht"), &OperationContext::new())
            .await;

        assert!(matches!(result, Err(LedgerError::ItemNotFound(item)) if item == "yacht"));
        assert_eq!(balance(&ledger, alice).await, 1000);
    }

    #[tokio::test]
    async fn test_purchase_insufficient_funds() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 499).await;
        let handler = purchase_handler(&ledger);

        let result = handler
            .execute(PurchaseCommand::new(alice, "pink-hoody"), &OperationContext::new())
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds {
                required: 500,
                available: 499
            })
        ));
        assert!(ledger.list_inventory(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_leaves_no_transfer_log() {
        let ledger = MemoryLedger::new();
        let alice = seed(&ledger, "alice", 100).await;
        let handler = purchase_handler(&ledger);

        handler
            .execute(PurchaseCommand::new(alice, "cup"), &OperationContext::new())
            .await
            .unwrap();

        assert!(ledger.list_events(alice, Direction::Sent).await.unwrap().is_empty());
        assert!(ledger.list_events(alice, Direction::Received).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_by_unknown_user() {
        let ledger = MemoryLedger::new();
        let handler = purchase_handler(&ledger);

        let result = handler
            .execute(PurchaseCommand::new(UserId::new(7), "cup"), &OperationContext::new())
            .await;

        assert!(matches!(result, Err(LedgerError::UserNotFound(_))));
    }
}
