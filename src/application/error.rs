use thiserror::Error;

use crate::domain::{Cents, LoanStatus};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Insufficient funds in account {account_no}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_no: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Cannot transfer less than {minimum} cents (requested {requested})")]
    BelowMinimumTransfer { minimum: Cents, requested: Cents },

    #[error("Cannot transfer from account {0} to itself")]
    SelfTransfer(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Loan limit exceeded: account {account_no} already has {approved} approved loans")]
    LoanLimitExceeded { account_no: String, approved: i64 },

    #[error("Loan {0} is not approved")]
    LoanNotApproved(String),

    #[error("Transaction {0} is not a loan")]
    NotALoan(String),

    #[error("Illegal loan transition: {from} -> {to}")]
    InvalidLoanTransition { from: LoanStatus, to: LoanStatus },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
