use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// A customer bank account. The balance column is a snapshot kept in sync
/// with the transaction log by the repository: both are always written in
/// the same database transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Externally assigned account number, unique across the bank.
    /// Transfers address the recipient by this number.
    pub account_no: String,
    /// Name of the account holder. Identity verification is the session
    /// provider's job; the ledger trusts this reference as-is.
    pub owner: String,
    /// Current balance in cents. Never negative after a committed operation.
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new account with a zero balance.
    pub fn open(account_no: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_no: account_no.into(),
            owner: owner.into(),
            balance_cents: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_balance(mut self, balance_cents: Cents) -> Self {
        self.balance_cents = balance_cents;
        self
    }
}
