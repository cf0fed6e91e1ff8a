use super::error::{LedgerError, LedgerResult};
use super::types::{
    CoinPackage, GiftReceipt, PurchaseReceipt, Transaction, TransactionReason, UserId,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A user's balance and the log that produced it.
/// Both are only ever touched together under the account mutex.
#[derive(Default)]
struct Account {
    balance: i64,
    history: Vec<Transaction>,
}

impl Account {
    /// Balance after applying `delta`, without mutating anything
    fn checked_balance(&self, user_id: UserId, delta: i64) -> LedgerResult<i64> {
        let new_balance = self
            .balance
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow(user_id))?;

        if new_balance < 0 {
            return Err(LedgerError::InsufficientBalance {
                balance: self.balance,
                requested: -delta,
            });
        }

        Ok(new_balance)
    }

    fn replayed(&self) -> i64 {
        self.history.iter().map(|tx| tx.delta).sum()
    }
}

/// Who a gift row points at, and which catalog gift it was
#[derive(Clone, Copy)]
struct GiftLink<'a> {
    counterparty: UserId,
    gift_id: Option<&'a str>,
}

pub struct Ledger {
    accounts: RwLock<HashMap<UserId, Arc<Mutex<Account>>>>,
    transaction_id_counter: AtomicU64,
    /// Percentage of a gift's cost credited to the recipient
    creator_share_percent: u32,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_creator_share(100)
    }

    /// Creates a ledger where recipients keep `percent` of each gift (capped at 100)
    pub fn with_creator_share(percent: u32) -> Self {
        Ledger {
            accounts: RwLock::new(HashMap::new()),
            transaction_id_counter: 0.into(),
            creator_share_percent: percent.min(100),
        }
    }

    pub fn creator_share_percent(&self) -> u32 {
        self.creator_share_percent
    }

    /// Returns the account handle for `user_id`, creating an empty one on first use
    fn account(&self, user_id: UserId) -> Arc<Mutex<Account>> {
        if let Some(account) = self.accounts.read().get(&user_id) {
            return Arc::clone(account);
        }

        let mut accounts = self.accounts.write();
        Arc::clone(accounts.entry(user_id).or_default())
    }

    fn existing_account(&self, user_id: UserId) -> Option<Arc<Mutex<Account>>> {
        self.accounts.read().get(&user_id).cloned()
    }

    /// Appends a transaction and moves the balance. Caller has validated `new_balance`.
    fn record(
        &self,
        user_id: UserId,
        account: &mut Account,
        delta: i64,
        reason: TransactionReason,
        new_balance: i64,
        link: Option<GiftLink<'_>>,
    ) -> Transaction {
        let transaction = Transaction {
            id: self.transaction_id_counter.fetch_add(1, Ordering::Relaxed),
            user_id,
            delta,
            reason,
            balance_after: new_balance,
            counterparty: link.map(|link| link.counterparty),
            gift_id: link.and_then(|link| link.gift_id).map(str::to_string),
            timestamp: Utc::now(),
        };

        account.balance = new_balance;
        account.history.push(transaction.clone());

        tracing::debug!(
            "tx {} user {} {:?} {:+} -> {}",
            transaction.id,
            user_id,
            reason,
            delta,
            new_balance
        );

        transaction
    }

    fn apply(
        &self,
        user_id: UserId,
        delta: i64,
        reason: TransactionReason,
    ) -> LedgerResult<Transaction> {
        let account = self.account(user_id);
        let mut account = account.lock();
        let new_balance = account.checked_balance(user_id, delta)?;
        Ok(self.record(user_id, &mut account, delta, reason, new_balance, None))
    }

    /// Adds `amount` coins to the user's balance as a purchase
    pub fn credit(&self, user_id: UserId, amount: i64) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let transaction = self.apply(user_id, amount, TransactionReason::Purchase)?;
        Ok(transaction.balance_after)
    }

    /// Removes `amount` coins from the user's balance as a sent gift
    pub fn debit(&self, user_id: UserId, amount: i64) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let transaction = self.apply(user_id, -amount, TransactionReason::GiftSent)?;
        Ok(transaction.balance_after)
    }

    pub fn purchase(&self, user_id: UserId, package: &CoinPackage) -> LedgerResult<PurchaseReceipt> {
        let coins = package.total_coins();
        if coins <= 0 {
            return Err(LedgerError::InvalidAmount(coins));
        }

        let transaction = self.apply(user_id, coins, TransactionReason::Purchase)?;

        Ok(PurchaseReceipt {
            coins_credited: coins,
            new_balance: transaction.balance_after,
            transaction_id: transaction.id,
        })
    }

    /// Moves `amount` coins from sender to recipient in a single unit of work.
    /// The recipient is credited their share of the gift, rounded down.
    /// `gift_id` names the catalog gift, if any, on both rows.
    pub fn send_gift(
        &self,
        sender: UserId,
        recipient: UserId,
        amount: i64,
        gift_id: Option<&str>,
    ) -> LedgerResult<GiftReceipt> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if sender == recipient {
            return Err(LedgerError::SelfGift(sender));
        }

        let share = (amount as i128 * self.creator_share_percent as i128 / 100) as i64;

        let sender_account = self.account(sender);
        let recipient_account = self.account(recipient);

        // Always lock the lower user id first
        let (mut sender_guard, mut recipient_guard) = if sender < recipient {
            let s = sender_account.lock();
            let r = recipient_account.lock();
            (s, r)
        } else {
            let r = recipient_account.lock();
            let s = sender_account.lock();
            (s, r)
        };

        let sender_balance = sender_guard.checked_balance(sender, -amount)?;
        let recipient_balance = recipient_guard.checked_balance(recipient, share)?;

        self.record(
            sender,
            &mut sender_guard,
            -amount,
            TransactionReason::GiftSent,
            sender_balance,
            Some(GiftLink {
                counterparty: recipient,
                gift_id,
            }),
        );
        if share > 0 {
            self.record(
                recipient,
                &mut recipient_guard,
                share,
                TransactionReason::GiftReceived,
                recipient_balance,
                Some(GiftLink {
                    counterparty: sender,
                    gift_id,
                }),
            );
        }

        Ok(GiftReceipt {
            coins_spent: amount,
            coins_received: share,
            sender_balance,
            recipient_balance,
        })
    }

    /// Current balance; users without an account have 0
    pub fn balance(&self, user_id: UserId) -> i64 {
        self.existing_account(user_id)
            .map(|account| account.lock().balance)
            .unwrap_or(0)
    }

    /// The user's transactions in the order they were applied
    pub fn transactions(&self, user_id: UserId) -> Vec<Transaction> {
        self.existing_account(user_id)
            .map(|account| account.lock().history.clone())
            .unwrap_or_default()
    }

    /// Sum of every delta recorded for the user
    pub fn replayed_balance(&self, user_id: UserId) -> i64 {
        self.existing_account(user_id)
            .map(|account| account.lock().replayed())
            .unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    /// Checks that every balance equals the sum of its transactions
    pub fn audit(&self) -> LedgerResult<()> {
        let mut accounts: Vec<(UserId, Arc<Mutex<Account>>)> = self
            .accounts
            .read()
            .iter()
            .map(|(&user_id, account)| (user_id, Arc::clone(account)))
            .collect();
        accounts.sort_by_key(|(user_id, _)| *user_id);

        for (user_id, account) in accounts {
            let account = account.lock();
            let replayed = account.replayed();
            if replayed != account.balance {
                return Err(LedgerError::LedgerInconsistent {
                    user_id,
                    balance: account.balance,
                    replayed,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PackageCatalog;
    use std::sync::Barrier;
    use std::thread;

    fn setup_ledger() -> Ledger {
        Ledger::new()
    }

    #[test]
    fn test_new_ledger() {
        let ledger = setup_ledger();
        assert_eq!(ledger.account_count(), 0);
        assert_eq!(ledger.balance(1), 0);
        assert!(ledger.transactions(1).is_empty());
        assert_eq!(ledger.creator_share_percent(), 100);
        // Reads do not create accounts
        assert_eq!(ledger.account_count(), 0);
    }

    #[test]
    fn test_credit_increases_balance() {
        let ledger = setup_ledger();
        assert_eq!(ledger.credit(1, 100), Ok(100));
        assert_eq!(ledger.credit(1, 50), Ok(150));
        assert_eq!(ledger.balance(1), 150);

        let history = ledger.transactions(1);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|tx| tx.reason == TransactionReason::Purchase));
        assert_eq!(history[1].balance_after, 150);
    }

    #[test]
    fn test_credit_rejects_non_positive_amounts() {
        let ledger = setup_ledger();
        assert_eq!(ledger.credit(1, 0), Err(LedgerError::InvalidAmount(0)));
        assert_eq!(ledger.credit(1, -5), Err(LedgerError::InvalidAmount(-5)));
        assert_eq!(ledger.balance(1), 0);
        assert!(ledger.transactions(1).is_empty());
    }

    #[test]
    fn test_debit_decreases_balance() {
        let ledger = setup_ledger();
        ledger.credit(1, 100).unwrap();
        assert_eq!(ledger.debit(1, 30), Ok(70));

        let history = ledger.transactions(1);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].delta, -30);
        assert_eq!(history[1].reason, TransactionReason::GiftSent);
    }

    #[test]
    fn test_debit_exact_balance_reaches_zero() {
        let ledger = setup_ledger();
        ledger.credit(1, 100).unwrap();
        assert_eq!(ledger.debit(1, 100), Ok(0));
    }

    #[test]
    fn test_debit_insufficient_balance() {
        let ledger = setup_ledger();
        ledger.credit(1, 100).unwrap();
        assert_eq!(
            ledger.debit(1, 101),
            Err(LedgerError::InsufficientBalance {
                balance: 100,
                requested: 101
            })
        );
        assert_eq!(ledger.balance(1), 100);
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_debit_rejects_non_positive_amounts() {
        let ledger = setup_ledger();
        ledger.credit(1, 10).unwrap();
        assert_eq!(ledger.debit(1, 0), Err(LedgerError::InvalidAmount(0)));
        assert_eq!(ledger.debit(1, -10), Err(LedgerError::InvalidAmount(-10)));
        assert_eq!(ledger.balance(1), 10);
    }

    #[test]
    fn test_credit_overflow_leaves_state_unchanged() {
        let ledger = setup_ledger();
        ledger.credit(1, i64::MAX).unwrap();
        assert_eq!(ledger.credit(1, 1), Err(LedgerError::BalanceOverflow(1)));
        assert_eq!(ledger.balance(1), i64::MAX);
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_purchase_then_gift_example() {
        let ledger = setup_ledger();
        let catalog = PackageCatalog::default();

        let package = catalog.resolve("coins_350").unwrap();
        let receipt = ledger.purchase(1, package).unwrap();
        assert_eq!(receipt.coins_credited, 350);
        assert_eq!(receipt.new_balance, 350);

        let gift = ledger.send_gift(1, 2, 100, None).unwrap();
        assert_eq!(gift.sender_balance, 250);
        assert_eq!(ledger.balance(1), 250);

        let deltas: Vec<i64> = ledger.transactions(1).iter().map(|tx| tx.delta).collect();
        assert_eq!(deltas, vec![350, -100]);
    }

    #[test]
    fn test_purchase_applies_bonus() {
        let ledger = setup_ledger();
        let catalog = PackageCatalog::default();

        let receipt = ledger.purchase(1, catalog.resolve("coins_7000").unwrap()).unwrap();
        assert_eq!(receipt.coins_credited, 7_350);
        assert_eq!(ledger.balance(1), 7_350);
    }

    #[test]
    fn test_unknown_package_leaves_balance_unchanged() {
        let ledger = setup_ledger();
        let catalog = PackageCatalog::default();
        ledger.credit(1, 20).unwrap();

        let result = catalog
            .resolve("coins_999")
            .and_then(|package| ledger.purchase(1, package));

        assert_eq!(result, Err(LedgerError::UnknownPackage("coins_999".into())));
        assert_eq!(ledger.balance(1), 20);
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_send_gift_credits_recipient() {
        let ledger = setup_ledger();
        ledger.credit(1, 500).unwrap();

        let receipt = ledger.send_gift(1, 2, 200, None).unwrap();
        assert_eq!(receipt.coins_spent, 200);
        assert_eq!(receipt.coins_received, 200);
        assert_eq!(receipt.sender_balance, 300);
        assert_eq!(receipt.recipient_balance, 200);

        let received = ledger.transactions(2);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].reason, TransactionReason::GiftReceived);
        assert_eq!(received[0].delta, 200);
    }

    #[test]
    fn test_gift_rows_point_at_each_other() {
        let ledger = setup_ledger();
        ledger.credit(1, 500).unwrap();
        ledger.send_gift(1, 2, 100, Some("rocket")).unwrap();
        ledger.send_gift(1, 2, 7, None).unwrap();

        let sent = ledger.transactions(1);
        assert_eq!(sent[0].counterparty, None);
        assert_eq!(sent[0].gift_id, None);
        assert_eq!(sent[1].counterparty, Some(2));
        assert_eq!(sent[1].gift_id.as_deref(), Some("rocket"));
        assert_eq!(sent[2].counterparty, Some(2));
        assert_eq!(sent[2].gift_id, None);

        let received = ledger.transactions(2);
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].reason, TransactionReason::GiftReceived);
        assert_eq!(received[0].counterparty, Some(1));
        assert_eq!(received[0].gift_id.as_deref(), Some("rocket"));
        assert_eq!(received[1].counterparty, Some(1));
    }

    #[test]
    fn test_send_gift_with_creator_share() {
        let ledger = Ledger::with_creator_share(75);
        ledger.credit(1, 100).unwrap();

        let receipt = ledger.send_gift(1, 2, 5, None).unwrap();
        // 75% of 5 is 3.75, rounded down
        assert_eq!(receipt.coins_received, 3);
        assert_eq!(ledger.balance(1), 95);
        assert_eq!(ledger.balance(2), 3);
    }

    #[test]
    fn test_send_gift_zero_share_writes_no_recipient_row() {
        let ledger = Ledger::with_creator_share(0);
        ledger.credit(1, 100).unwrap();

        let receipt = ledger.send_gift(1, 2, 10, None).unwrap();
        assert_eq!(receipt.coins_received, 0);
        assert_eq!(ledger.balance(2), 0);
        assert!(ledger.transactions(2).is_empty());
        assert_eq!(ledger.transactions(1).len(), 2);
    }

    #[test]
    fn test_creator_share_is_capped() {
        let ledger = Ledger::with_creator_share(250);
        assert_eq!(ledger.creator_share_percent(), 100);
    }

    #[test]
    fn test_send_gift_insufficient_balance_is_atomic() {
        let ledger = setup_ledger();
        ledger.credit(1, 50).unwrap();

        assert_eq!(
            ledger.send_gift(1, 2, 60, None),
            Err(LedgerError::InsufficientBalance {
                balance: 50,
                requested: 60
            })
        );
        assert_eq!(ledger.balance(1), 50);
        assert_eq!(ledger.balance(2), 0);
        assert!(ledger.transactions(2).is_empty());
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_send_gift_recipient_overflow_is_atomic() {
        let ledger = setup_ledger();
        ledger.credit(1, 10).unwrap();
        ledger.credit(2, i64::MAX).unwrap();

        assert_eq!(ledger.send_gift(1, 2, 5, None), Err(LedgerError::BalanceOverflow(2)));
        assert_eq!(ledger.balance(1), 10);
        assert_eq!(ledger.transactions(1).len(), 1);
    }

    #[test]
    fn test_send_gift_to_self_is_rejected() {
        let ledger = setup_ledger();
        ledger.credit(1, 50).unwrap();
        assert_eq!(ledger.send_gift(1, 1, 10, None), Err(LedgerError::SelfGift(1)));
        assert_eq!(ledger.balance(1), 50);
    }

    #[test]
    fn test_send_gift_rejects_non_positive_amounts() {
        let ledger = setup_ledger();
        assert_eq!(ledger.send_gift(1, 2, 0, None), Err(LedgerError::InvalidAmount(0)));
        assert_eq!(ledger.account_count(), 0);
    }

    #[test]
    fn test_transaction_ids_are_unique_and_increasing() {
        let ledger = setup_ledger();
        ledger.credit(1, 100).unwrap();
        ledger.credit(2, 100).unwrap();
        ledger.send_gift(1, 2, 10, None).unwrap();
        ledger.debit(2, 5).unwrap();

        let mut ids: Vec<u64> = ledger
            .transactions(1)
            .into_iter()
            .chain(ledger.transactions(2))
            .map(|tx| tx.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        let user_two: Vec<u64> = ledger.transactions(2).iter().map(|tx| tx.id).collect();
        assert!(user_two.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_balance_equals_sum_of_transactions() {
        let ledger = setup_ledger();
        for user_id in 1..=5 {
            ledger.credit(user_id, 1_000).unwrap();
        }
        for i in 0..50u64 {
            let sender = 1 + i % 5;
            let recipient = 1 + (i + 2) % 5;
            let _ = ledger.send_gift(sender, recipient, 37 + i as i64, None);
            let _ = ledger.debit(recipient, 11);
        }

        for user_id in 1..=5 {
            assert_eq!(ledger.balance(user_id), ledger.replayed_balance(user_id));
            assert!(ledger.balance(user_id) >= 0);
        }
        assert_eq!(ledger.audit(), Ok(()));
    }

    #[test]
    fn test_concurrent_debits_exactly_one_succeeds() {
        let ledger = Arc::new(setup_ledger());
        ledger.credit(1, 100).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.send_gift(1, 2 + i, 60, None)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(LedgerError::InsufficientBalance {
                balance: 40,
                requested: 60
            })
        )));
        assert_eq!(ledger.balance(1), 40);
        assert_eq!(ledger.audit(), Ok(()));
    }

    #[test]
    fn test_opposing_gifts_do_not_deadlock() {
        let ledger = Arc::new(setup_ledger());
        ledger.credit(1, 10_000).unwrap();
        ledger.credit(2, 10_000).unwrap();

        let handles: Vec<_> = [(1, 2), (2, 1)]
            .into_iter()
            .map(|(sender, recipient)| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        ledger.send_gift(sender, recipient, 1, None).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.balance(1), 10_000);
        assert_eq!(ledger.balance(2), 10_000);
        assert_eq!(ledger.transactions(1).len(), 2_001);
        assert_eq!(ledger.audit(), Ok(()));
    }

    #[test]
    fn test_concurrent_credits_on_different_users() {
        let ledger = Arc::new(setup_ledger());

        let handles: Vec<_> = (1..=8u64)
            .map(|user_id| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..500 {
                        ledger.credit(user_id, 2).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for user_id in 1..=8 {
            assert_eq!(ledger.balance(user_id), 1_000);
        }
        assert_eq!(ledger.account_count(), 8);
        assert_eq!(ledger.audit(), Ok(()));
    }
}
