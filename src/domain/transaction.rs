use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents, LoanStatus};

pub type TransactionId = Uuid;

/// What kind of balance event a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Withdrawal,
    /// One leg of a two-account transfer. The debit leg carries a negative
    /// amount, the credit leg a positive one.
    Transfer,
    /// A requested or approved loan. Does not affect the balance.
    Loan,
    /// A repaid loan. The repayment debited the principal from the balance.
    LoanPaid,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdrawal => "withdrawal",
            TxKind::Transfer => "transfer",
            TxKind::Loan => "loan",
            TxKind::LoanPaid => "loan_paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TxKind::Deposit),
            "withdrawal" => Some(TxKind::Withdrawal),
            "transfer" => Some(TxKind::Transfer),
            "loan" => Some(TxKind::Loan),
            "loan_paid" => Some(TxKind::LoanPaid),
            _ => None,
        }
    }

    pub fn is_loan(&self) -> bool {
        matches!(self, TxKind::Loan | TxKind::LoanPaid)
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the append-only transaction log. Immutable once committed,
/// except that loan repayment flips kind Loan -> LoanPaid, advances the
/// loan status, and refreshes the balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing sequence number for ordering, assigned by
    /// the repository in the same commit as the insert.
    pub sequence: i64,
    pub account_id: AccountId,
    /// Signed amount in cents: credits positive, debits negative. Loan
    /// transactions carry the (positive) principal.
    pub amount_cents: Cents,
    /// Account balance right after this transaction committed.
    pub balance_after_cents: Cents,
    pub kind: TxKind,
    /// Present only for Loan/LoanPaid kinds.
    pub loan_status: Option<LoanStatus>,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    fn new(account_id: AccountId, amount_cents: Cents, balance_after_cents: Cents, kind: TxKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // assigned by the repository
            account_id,
            amount_cents,
            balance_after_cents,
            kind,
            loan_status: None,
            timestamp: Utc::now(),
        }
    }

    pub fn deposit(account_id: AccountId, amount_cents: Cents, balance_after_cents: Cents) -> Self {
        debug_assert!(amount_cents > 0);
        Self::new(account_id, amount_cents, balance_after_cents, TxKind::Deposit)
    }

    pub fn withdrawal(account_id: AccountId, amount_cents: Cents, balance_after_cents: Cents) -> Self {
        debug_assert!(amount_cents > 0);
        Self::new(account_id, -amount_cents, balance_after_cents, TxKind::Withdrawal)
    }

    /// The sender's leg of a transfer: balance decreases by `amount_cents`.
    pub fn transfer_debit(
        account_id: AccountId,
        amount_cents: Cents,
        balance_after_cents: Cents,
    ) -> Self {
        debug_assert!(amount_cents > 0);
        Self::new(account_id, -amount_cents, balance_after_cents, TxKind::Transfer)
    }

    /// The recipient's leg of a transfer: balance increases by `amount_cents`.
    pub fn transfer_credit(
        account_id: AccountId,
        amount_cents: Cents,
        balance_after_cents: Cents,
    ) -> Self {
        debug_assert!(amount_cents > 0);
        Self::new(account_id, amount_cents, balance_after_cents, TxKind::Transfer)
    }

    /// A freshly requested loan. The principal is recorded but the balance
    /// is untouched until repayment.
    pub fn loan_request(account_id: AccountId, principal_cents: Cents, balance_cents: Cents) -> Self {
        debug_assert!(principal_cents > 0);
        let mut tx = Self::new(account_id, principal_cents, balance_cents, TxKind::Loan);
        tx.loan_status = Some(LoanStatus::Requested);
        tx
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_is_positive() {
        let account = Uuid::new_v4();
        let tx = Transaction::deposit(account, 50000, 50000);
        assert_eq!(tx.amount_cents, 50000);
        assert_eq!(tx.balance_after_cents, 50000);
        assert_eq!(tx.kind, TxKind::Deposit);
        assert!(tx.loan_status.is_none());
    }

    #[test]
    fn test_withdrawal_is_negative() {
        let account = Uuid::new_v4();
        let tx = Transaction::withdrawal(account, 20000, 30000);
        assert_eq!(tx.amount_cents, -20000);
        assert_eq!(tx.kind, TxKind::Withdrawal);
    }

    #[test]
    fn test_transfer_legs_have_opposite_signs() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let debit = Transaction::transfer_debit(sender, 15000, 5000);
        let credit = Transaction::transfer_credit(recipient, 15000, 25000);
        assert_eq!(debit.amount_cents, -15000);
        assert_eq!(credit.amount_cents, 15000);
        assert_eq!(debit.amount_cents + credit.amount_cents, 0);
    }

    #[test]
    fn test_loan_request_starts_requested() {
        let account = Uuid::new_v4();
        let tx = Transaction::loan_request(account, 100000, 2500);
        assert_eq!(tx.kind, TxKind::Loan);
        assert_eq!(tx.loan_status, Some(LoanStatus::Requested));
        assert_eq!(tx.amount_cents, 100000);
        // Requesting a loan leaves the balance alone.
        assert_eq!(tx.balance_after_cents, 2500);
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            TxKind::Deposit,
            TxKind::Withdrawal,
            TxKind::Transfer,
            TxKind::Loan,
            TxKind::LoanPaid,
        ] {
            assert_eq!(TxKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TxKind::from_str("interest"), None);
    }
}
