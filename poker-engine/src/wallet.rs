//! The wallet ledger: atomic movement of funds between a player's
//! real-money wallet and their on-table stack. Pure in-memory bookkeeping
//! — the server crate is responsible for mirroring it to durable storage
//! and for not holding a table lock across the async calls that surround
//! a deposit or withdrawal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

pub type UserId = String;
/// Monetary amount in minor units (cents), avoiding float drift while
/// keeping 2-decimal precision.
pub type Cents = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("wallet not found")]
    WalletNotFound,
    #[error("transaction not found")]
    TransactionNotFound,
    #[error("transaction is not in a pending state")]
    NotPending,
    #[error("insufficient balance")]
    InsufficientFunds,
    #[error("amount is below the minimum")]
    BelowMinimum,
    #[error("destination is not a valid payout address")]
    InvalidDestination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    BuyIn,
    CashOut,
    AdminAdjust,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    PendingApproval,
    Completed,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user: UserId,
    pub kind: TransactionKind,
    /// Signed: positive for credits to the wallet, negative for debits.
    pub amount: Cents,
    pub status: TransactionStatus,
    pub external_ref: Option<String>,
    pub description: String,
    pub created_at_unix: i64,
    pub completed_at_unix: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Cents,
    pub total_deposited: Cents,
    pub total_withdrawn: Cents,
}

const MIN_DEPOSIT: Cents = 100; // $1.00
const MIN_WITHDRAWAL: Cents = 1000; // $10.00

struct LedgerInner {
    wallets: HashMap<UserId, Wallet>,
    transactions: Vec<Transaction>,
    next_id: u64,
}

/// The ledger for every user's wallet, guarded by a single lock over the
/// whole table of wallets rather than per-row locks, since all
/// operations are cheap in-memory bookkeeping. The server crate is what
/// actually needs the wallet-then-table lock ordering, and it acquires
/// this lock for the shortest possible span around each call.
pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                wallets: HashMap::new(),
                transactions: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Called at registration: creates an empty wallet for a new user.
    pub fn open_wallet(&self, user: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.wallets.entry(user.to_string()).or_default();
    }

    pub fn balance(&self, user: &str) -> Result<Wallet, LedgerError> {
        let inner = self.inner.lock().unwrap();
        inner.wallets.get(user).copied().ok_or(LedgerError::WalletNotFound)
    }

    pub fn transactions_for(&self, user: &str) -> Vec<Transaction> {
        let inner = self.inner.lock().unwrap();
        inner.transactions.iter().filter(|t| t.user == user).cloned().collect()
    }

    fn push_transaction(
        inner: &mut LedgerInner,
        user: &str,
        kind: TransactionKind,
        amount: Cents,
        status: TransactionStatus,
        external_ref: Option<String>,
        description: impl Into<String>,
        now_unix: i64,
    ) -> u64 {
        let id = inner.next_id;
        inner.next_id += 1;
        let completed_at_unix = matches!(status, TransactionStatus::Completed).then_some(now_unix);
        inner.transactions.push(Transaction {
            id,
            user: user.to_string(),
            kind,
            amount,
            status,
            external_ref,
            description: description.into(),
            created_at_unix: now_unix,
            completed_at_unix,
        });
        id
    }

    /// Phase one of a deposit: records a `pending` transaction tied to an
    /// external payment-provider reference. Balance is untouched until
    /// `complete_deposit` is called with provider confirmation.
    pub fn start_deposit(&self, user: &str, amount: Cents, external_ref: &str, now_unix: i64) -> Result<u64, LedgerError> {
        if amount < MIN_DEPOSIT {
            return Err(LedgerError::BelowMinimum);
        }
        let mut inner = self.inner.lock().unwrap();
        if !inner.wallets.contains_key(user) {
            return Err(LedgerError::WalletNotFound);
        }
        Ok(Self::push_transaction(
            &mut inner,
            user,
            TransactionKind::Deposit,
            amount,
            TransactionStatus::Pending,
            Some(external_ref.to_string()),
            "wallet deposit",
            now_unix,
        ))
    }

    /// Provider confirmed the order: move the transaction to `completed`
    /// and credit the wallet. Idempotent — a second `complete_deposit`
    /// with the same id is a no-op success rather than an error.
    pub fn complete_deposit(&self, transaction_id: u64, now_unix: i64) -> Result<Wallet, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or(LedgerError::TransactionNotFound)?;

        if inner.transactions[idx].status == TransactionStatus::Completed {
            let user = inner.transactions[idx].user.clone();
            return Ok(*inner.wallets.get(&user).ok_or(LedgerError::WalletNotFound)?);
        }
        if inner.transactions[idx].status != TransactionStatus::Pending {
            return Err(LedgerError::NotPending);
        }

        let (user, amount) = (inner.transactions[idx].user.clone(), inner.transactions[idx].amount);
        inner.transactions[idx].status = TransactionStatus::Completed;
        inner.transactions[idx].completed_at_unix = Some(now_unix);

        let wallet = inner.wallets.entry(user).or_default();
        wallet.balance += amount;
        wallet.total_deposited += amount;
        Ok(*wallet)
    }

    /// Cancels a still-pending deposit. Balance was never touched, so this
    /// leaves it unchanged.
    pub fn cancel_deposit(&self, transaction_id: u64) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or(LedgerError::TransactionNotFound)?;
        if inner.transactions[idx].status != TransactionStatus::Pending {
            return Err(LedgerError::NotPending);
        }
        inner.transactions[idx].status = TransactionStatus::Cancelled;
        Ok(())
    }

    /// Withdrawal: debits immediately and parks the transaction in
    /// `pending_approval`. Preconditions (minimum amount, destination
    /// format, sufficient balance) are checked before the debit.
    pub fn request_withdrawal(
        &self,
        user: &str,
        amount: Cents,
        destination: &str,
        now_unix: i64,
    ) -> Result<u64, LedgerError> {
        if amount < MIN_WITHDRAWAL {
            return Err(LedgerError::BelowMinimum);
        }
        if !destination.contains('@') {
            return Err(LedgerError::InvalidDestination);
        }
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner.wallets.get_mut(user).ok_or(LedgerError::WalletNotFound)?;
        if wallet.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        wallet.balance -= amount;
        wallet.total_withdrawn += amount;
        Ok(Self::push_transaction(
            &mut inner,
            user,
            TransactionKind::Withdrawal,
            -amount,
            TransactionStatus::PendingApproval,
            Some(destination.to_string()),
            format!("withdrawal to {destination}"),
            now_unix,
        ))
    }

    /// Approver completes a pending-approval withdrawal.
    pub fn approve_withdrawal(&self, transaction_id: u64, now_unix: i64) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let t = inner
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or(LedgerError::TransactionNotFound)?;
        if t.status != TransactionStatus::PendingApproval {
            return Err(LedgerError::NotPending);
        }
        t.status = TransactionStatus::Completed;
        t.completed_at_unix = Some(now_unix);
        Ok(())
    }

    /// Approver rejects a pending-approval withdrawal: the debited amount
    /// is credited back.
    pub fn reject_withdrawal(&self, transaction_id: u64) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or(LedgerError::TransactionNotFound)?;
        if inner.transactions[idx].status != TransactionStatus::PendingApproval {
            return Err(LedgerError::NotPending);
        }
        let (user, amount) = (inner.transactions[idx].user.clone(), -inner.transactions[idx].amount);
        inner.transactions[idx].status = TransactionStatus::Rejected;
        let wallet = inner.wallets.entry(user).or_default();
        wallet.balance += amount;
        wallet.total_withdrawn -= amount;
        Ok(())
    }

    /// Debits the wallet for a table buy-in. The caller (the server,
    /// which also owns the Table) is expected to refund via
    /// `refund_buy_in` if seating then fails.
    pub fn buy_in(&self, user: &str, amount: Cents, table_id: &str, now_unix: i64) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner.wallets.get_mut(user).ok_or(LedgerError::WalletNotFound)?;
        if wallet.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        wallet.balance -= amount;
        Self::push_transaction(
            &mut inner,
            user,
            TransactionKind::BuyIn,
            -amount,
            TransactionStatus::Completed,
            None,
            format!("buy-in at table {table_id}"),
            now_unix,
        );
        Ok(())
    }

    /// Compensates a buy-in whose seat assignment failed after the debit.
    pub fn refund_buy_in(&self, user: &str, amount: Cents, now_unix: i64) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner.wallets.get_mut(user).ok_or(LedgerError::WalletNotFound)?;
        wallet.balance += amount;
        Self::push_transaction(
            &mut inner,
            user,
            TransactionKind::Refund,
            amount,
            TransactionStatus::Completed,
            None,
            "buy-in refund",
            now_unix,
        );
        Ok(())
    }

    pub fn cash_out(&self, user: &str, amount: Cents, table_id: &str, now_unix: i64) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner.wallets.entry(user.to_string()).or_default();
        wallet.balance += amount;
        Self::push_transaction(
            &mut inner,
            user,
            TransactionKind::CashOut,
            amount,
            TransactionStatus::Completed,
            None,
            format!("cash-out from table {table_id}"),
            now_unix,
        );
        Ok(())
    }

    /// Arbitrary signed admin adjustment, recorded for audit.
    pub fn admin_adjust(&self, user: &str, delta: Cents, reason: &str, now_unix: i64) -> Result<Wallet, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner.wallets.entry(user.to_string()).or_default();
        wallet.balance += delta;
        Self::push_transaction(
            &mut inner,
            user,
            TransactionKind::AdminAdjust,
            delta,
            TransactionStatus::Completed,
            None,
            reason.to_string(),
            now_unix,
        );
        Ok(*wallet)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_then_cancel_leaves_balance_unchanged() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        let tx = ledger.start_deposit("u1", 500, "order-1", 0).unwrap();
        ledger.cancel_deposit(tx).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 0);
    }

    #[test]
    fn deposit_lifecycle_is_idempotent_on_capture() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        let tx = ledger.start_deposit("u1", 1000, "order-1", 0).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 0);

        let w1 = ledger.complete_deposit(tx, 1).unwrap();
        assert_eq!(w1.balance, 1000);

        let w2 = ledger.complete_deposit(tx, 2).unwrap();
        assert_eq!(w2.balance, 1000);
    }

    #[test]
    fn withdrawal_rejection_refunds_balance() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        ledger.admin_adjust("u1", 5000, "seed", 0).unwrap();
        let tx = ledger.request_withdrawal("u1", 2000, "user@example.com", 0).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 3000);
        ledger.reject_withdrawal(tx).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 5000);
    }

    #[test]
    fn withdrawal_approval_keeps_balance_debited() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        ledger.admin_adjust("u1", 5000, "seed", 0).unwrap();
        let tx = ledger.request_withdrawal("u1", 2000, "user@example.com", 0).unwrap();
        ledger.approve_withdrawal(tx, 1).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 3000);
    }

    #[test]
    fn buy_in_refund_restores_balance_on_seat_failure() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        ledger.admin_adjust("u1", 5000, "seed", 0).unwrap();
        ledger.buy_in("u1", 1000, "t1", 0).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 4000);
        ledger.refund_buy_in("u1", 1000, 1).unwrap();
        assert_eq!(ledger.balance("u1").unwrap().balance, 5000);
    }

    #[test]
    fn balance_always_equals_completed_credits_minus_debits() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        let tx = ledger.start_deposit("u1", 2000, "order-1", 0).unwrap();
        ledger.complete_deposit(tx, 1).unwrap();
        ledger.buy_in("u1", 500, "t1", 2).unwrap();
        ledger.cash_out("u1", 700, "t1", 3).unwrap();

        let sum: Cents = ledger
            .transactions_for("u1")
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .map(|t| t.amount)
            .sum();
        assert_eq!(ledger.balance("u1").unwrap().balance, sum);
    }

    #[test]
    fn withdrawal_below_minimum_is_rejected() {
        let ledger = Ledger::new();
        ledger.open_wallet("u1");
        ledger.admin_adjust("u1", 5000, "seed", 0).unwrap();
        assert_eq!(
            ledger.request_withdrawal("u1", 1, "user@example.com", 0),
            Err(LedgerError::BelowMinimum)
        );
    }
}
