use chrono::{DateTime, Utc};

use crate::domain::{Account, Cents, LoanStatus, Transaction, TransactionId, TxKind};
use crate::storage::{RepaymentOutcome, Repository};

use super::AppError;

/// Default minimum transfer amount: 100.00 units.
pub const DEFAULT_MIN_TRANSFER_CENTS: Cents = 10_000;

/// Maximum number of approved-and-unpaid loans per account.
pub const MAX_APPROVED_LOANS: i64 = 3;

/// Application service providing the banking operations over the ledger.
/// This is the primary interface for any client (CLI, API, etc.). The
/// caller identity is assumed to be verified upstream; operations address
/// accounts by account number.
pub struct BankService {
    repo: Repository,
    min_transfer_cents: Cents,
}

/// Result of a deposit or withdrawal.
pub struct MovementReceipt {
    pub transaction: Transaction,
    pub balance_cents: Cents,
    pub account_no: String,
}

/// Result of a completed transfer: both legs and both post-balances.
pub struct TransferReceipt {
    pub debit: Transaction,
    pub credit: Transaction,
    pub sender_account_no: String,
    pub recipient_account_no: String,
}

/// Result of repaying a loan.
pub struct RepaymentReceipt {
    pub loan: Transaction,
    pub balance_cents: Cents,
}

/// An account's transaction history plus the balance figure, computed as
/// one value (the list and the figure never disagree about the same read).
pub struct TransactionReport {
    pub account: Account,
    pub transactions: Vec<Transaction>,
    /// Current account balance when no range was given; otherwise the sum
    /// of amounts across all accounts inside the range (see DESIGN.md).
    pub balance_cents: Cents,
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl BankService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            min_transfer_cents: DEFAULT_MIN_TRANSFER_CENTS,
        }
    }

    /// Override the minimum transfer amount.
    pub fn with_min_transfer(mut self, min_transfer_cents: Cents) -> Self {
        self.min_transfer_cents = min_transfer_cents;
        self
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account with a zero balance.
    pub async fn open_account(
        &self,
        account_no: String,
        owner: String,
    ) -> Result<Account, AppError> {
        if self.repo.get_account_by_no(&account_no).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(account_no));
        }

        let account = Account::open(account_no, owner);
        self.repo.save_account(&account).await?;
        Ok(account)
    }

    /// Resolve an account by number.
    pub async fn get_account(&self, account_no: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_no(account_no)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_no.to_string()))
    }

    /// List all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    /// Current balance of an account.
    pub async fn balance_of(&self, account_no: &str) -> Result<Cents, AppError> {
        Ok(self.get_account(account_no).await?.balance_cents)
    }

    // ========================
    // Deposits and withdrawals
    // ========================

    /// Deposit into an account.
    pub async fn deposit(
        &self,
        account_no: &str,
        amount_cents: Cents,
    ) -> Result<MovementReceipt, AppError> {
        Self::require_positive(amount_cents)?;
        let account = self.get_account(account_no).await?;

        let transaction = self.repo.deposit(account.id, amount_cents, Utc::now()).await?;

        Ok(MovementReceipt {
            balance_cents: transaction.balance_after_cents,
            account_no: account.account_no,
            transaction,
        })
    }

    /// Withdraw from an account. Fails with `InsufficientFunds` when the
    /// balance cannot cover the amount, including when a concurrent debit
    /// wins the race after our pre-check.
    pub async fn withdraw(
        &self,
        account_no: &str,
        amount_cents: Cents,
    ) -> Result<MovementReceipt, AppError> {
        Self::require_positive(amount_cents)?;
        let account = self.get_account(account_no).await?;

        if account.balance_cents < amount_cents {
            return Err(AppError::InsufficientFunds {
                account_no: account.account_no,
                balance: account.balance_cents,
                required: amount_cents,
            });
        }

        let transaction = self
            .repo
            .withdraw(account.id, amount_cents, Utc::now())
            .await?
            .ok_or_else(|| AppError::InsufficientFunds {
                account_no: account.account_no.clone(),
                balance: account.balance_cents,
                required: amount_cents,
            })?;

        Ok(MovementReceipt {
            balance_cents: transaction.balance_after_cents,
            account_no: account.account_no,
            transaction,
        })
    }

    // ========================
    // Transfer workflow
    // ========================

    /// Transfer money from sender to recipient as one atomic unit: either
    /// both legs (balance change + log row each) become durable, or
    /// neither is observable.
    pub async fn transfer(
        &self,
        sender_account_no: &str,
        recipient_account_no: &str,
        amount_cents: Cents,
    ) -> Result<TransferReceipt, AppError> {
        Self::require_positive(amount_cents)?;

        let sender = self.get_account(sender_account_no).await?;
        let recipient = self.get_account(recipient_account_no).await?;

        if sender.id == recipient.id {
            return Err(AppError::SelfTransfer(sender.account_no));
        }

        if amount_cents < self.min_transfer_cents {
            return Err(AppError::BelowMinimumTransfer {
                minimum: self.min_transfer_cents,
                requested: amount_cents,
            });
        }

        if sender.balance_cents < amount_cents {
            return Err(AppError::InsufficientFunds {
                account_no: sender.account_no,
                balance: sender.balance_cents,
                required: amount_cents,
            });
        }

        let (debit, credit) = self
            .repo
            .transfer(sender.id, recipient.id, amount_cents, Utc::now())
            .await?
            .ok_or_else(|| AppError::InsufficientFunds {
                account_no: sender.account_no.clone(),
                balance: sender.balance_cents,
                required: amount_cents,
            })?;

        Ok(TransferReceipt {
            debit,
            credit,
            sender_account_no: sender.account_no,
            recipient_account_no: recipient.account_no,
        })
    }

    // ========================
    // Loan workflow
    // ========================

    /// Request a loan. The principal is logged but not disbursed; the
    /// request waits for administrator approval.
    pub async fn request_loan(
        &self,
        account_no: &str,
        principal_cents: Cents,
    ) -> Result<Transaction, AppError> {
        Self::require_positive(principal_cents)?;
        let account = self.get_account(account_no).await?;

        let approved = self.repo.count_approved_loans(account.id).await?;
        if approved >= MAX_APPROVED_LOANS {
            return Err(AppError::LoanLimitExceeded {
                account_no: account.account_no,
                approved,
            });
        }

        let mut loan =
            Transaction::loan_request(account.id, principal_cents, account.balance_cents);
        self.repo.save_loan_request(&mut loan).await?;
        Ok(loan)
    }

    /// Approve a requested loan (administrator action). Only the
    /// Requested -> Approved transition is legal.
    pub async fn approve_loan(&self, loan_id: TransactionId) -> Result<Transaction, AppError> {
        let mut loan = self.get_loan(loan_id).await?;

        let status = Self::loan_status(&loan)?;
        status
            .transition(LoanStatus::Approved)
            .map_err(|e| AppError::InvalidLoanTransition {
                from: e.from,
                to: e.to,
            })?;

        if !self.repo.approve_loan(loan.id).await? {
            // The row left the Requested state after we read it; report
            // the state it is in now.
            let current = self.get_loan(loan_id).await?;
            return Err(AppError::InvalidLoanTransition {
                from: Self::loan_status(&current)?,
                to: LoanStatus::Approved,
            });
        }

        loan.loan_status = Some(LoanStatus::Approved);
        Ok(loan)
    }

    /// Repay an approved loan: debits the principal from the account and
    /// marks the loan paid, atomically. Paid is terminal: the repository
    /// claims the loan row inside the commit, so a concurrent repayment
    /// of the same loan debits the account exactly once.
    pub async fn pay_loan(&self, loan_id: TransactionId) -> Result<RepaymentReceipt, AppError> {
        let loan = self.get_loan(loan_id).await?;

        if Self::loan_status(&loan)? != LoanStatus::Approved {
            return Err(AppError::LoanNotApproved(loan_id.to_string()));
        }

        let account = self
            .repo
            .get_account(loan.account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(loan.account_id.to_string()))?;

        let balance_cents = match self.repo.pay_loan(&loan).await? {
            RepaymentOutcome::Paid(balance_cents) => balance_cents,
            RepaymentOutcome::InsufficientFunds => {
                return Err(AppError::InsufficientFunds {
                    account_no: account.account_no,
                    balance: account.balance_cents,
                    required: loan.amount_cents,
                });
            }
            RepaymentOutcome::NotApproved => {
                return Err(AppError::LoanNotApproved(loan_id.to_string()));
            }
        };

        let mut paid = loan;
        paid.kind = TxKind::LoanPaid;
        paid.loan_status = Some(LoanStatus::Paid);
        paid.balance_after_cents = balance_cents;

        Ok(RepaymentReceipt {
            loan: paid,
            balance_cents,
        })
    }

    /// All loan transactions (outstanding or paid) for an account.
    pub async fn loan_list(&self, account_no: &str) -> Result<Vec<Transaction>, AppError> {
        let account = self.get_account(account_no).await?;
        Ok(self.repo.list_loans(account.id).await?)
    }

    // ========================
    // Query service
    // ========================

    /// Transaction report for an account, most recent first, optionally
    /// restricted to a closed timestamp interval. The report is a single
    /// value: the filtered list and the balance figure together.
    pub async fn report(
        &self,
        account_no: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<TransactionReport, AppError> {
        let account = self.get_account(account_no).await?;

        let (transactions, balance_cents) = match range {
            Some((from, to)) => {
                let transactions = self
                    .repo
                    .list_transactions(account.id, Some(from), Some(to))
                    .await?;
                let total = self.repo.sum_amounts_in_range(from, to).await?;
                (transactions, total)
            }
            None => {
                let transactions = self.repo.list_transactions(account.id, None, None).await?;
                (transactions, account.balance_cents)
            }
        };

        Ok(TransactionReport {
            account,
            transactions,
            balance_cents,
            range,
        })
    }

    // ========================
    // Helpers
    // ========================

    fn require_positive(amount_cents: Cents) -> Result<(), AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    async fn get_loan(&self, loan_id: TransactionId) -> Result<Transaction, AppError> {
        let tx = self
            .repo
            .get_transaction(loan_id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(loan_id.to_string()))?;

        if !tx.kind.is_loan() {
            return Err(AppError::NotALoan(loan_id.to_string()));
        }
        Ok(tx)
    }

    fn loan_status(loan: &Transaction) -> Result<LoanStatus, AppError> {
        loan.loan_status
            .ok_or_else(|| AppError::NotALoan(loan.id.to_string()))
    }
}
