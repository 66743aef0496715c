use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{Account, AccountId, Cents, LoanStatus, Transaction, TransactionId, TxKind};

use super::MIGRATION_001_INITIAL;

/// Outcome of a loan repayment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepaymentOutcome {
    /// Loan marked paid; carries the account's new balance.
    Paid(Cents),
    /// The balance guard failed; nothing committed, the loan stays Approved.
    InsufficientFunds,
    /// The row was not an approved, unpaid loan at commit time.
    NotApproved,
}

/// Repository for accounts and the transaction log.
///
/// Every money movement (deposit, withdrawal, transfer, loan repayment)
/// runs inside a single database transaction: the balance update, the
/// sequence assignment and the log row commit together or not at all.
/// Debits additionally carry a balance guard in the UPDATE itself, so a
/// concurrent debit that would overdraw the account rolls back instead of
/// losing the race.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Save a newly opened account.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, account_no, owner, balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.account_no)
        .bind(&account.owner)
        .bind(account.balance_cents)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_no, owner, balance_cents, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by its account number.
    pub async fn get_account_by_no(&self, account_no: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_no, owner, balance_cents, created_at
            FROM accounts
            WHERE account_no = ?
            "#,
        )
        .bind(account_no)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List all accounts, ordered by account number.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            "SELECT id, account_no, owner, balance_cents, created_at FROM accounts ORDER BY account_no",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            account_no: row.get("account_no"),
            owner: row.get("owner"),
            balance_cents: row.get("balance_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Money movements (atomic)
    // ========================

    /// Credit an account and append the deposit to the log in one commit.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction> {
        let mut dbtx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount_cents)
        .bind(account_id.to_string())
        .fetch_one(&mut *dbtx)
        .await
        .context("Failed to credit account")?;

        let new_balance: Cents = row.get("balance_cents");
        let mut tx = Transaction::deposit(account_id, amount_cents, new_balance)
            .with_timestamp(timestamp);
        tx.sequence = Self::next_sequence(&mut dbtx).await?;
        Self::insert_transaction(&mut dbtx, &tx).await?;

        dbtx.commit().await.context("Failed to commit deposit")?;
        Ok(tx)
    }

    /// Debit an account and append the withdrawal to the log in one commit.
    /// Returns `None` (and commits nothing) when the balance cannot cover
    /// the amount at commit time.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let mut dbtx = self.pool.begin().await.context("Failed to begin transaction")?;

        let Some(new_balance) = Self::guarded_debit(&mut dbtx, account_id, amount_cents).await?
        else {
            dbtx.rollback().await.context("Failed to roll back withdrawal")?;
            return Ok(None);
        };

        let mut tx = Transaction::withdrawal(account_id, amount_cents, new_balance)
            .with_timestamp(timestamp);
        tx.sequence = Self::next_sequence(&mut dbtx).await?;
        Self::insert_transaction(&mut dbtx, &tx).await?;

        dbtx.commit().await.context("Failed to commit withdrawal")?;
        Ok(Some(tx))
    }

    /// Move money between two accounts as one unit: both balance updates
    /// and both log rows commit together, or nothing does. Returns the
    /// (debit, credit) pair, or `None` when the sender's balance guard
    /// failed at commit time.
    pub async fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<(Transaction, Transaction)>> {
        let mut dbtx = self.pool.begin().await.context("Failed to begin transaction")?;

        let Some(sender_balance) = Self::guarded_debit(&mut dbtx, from_id, amount_cents).await?
        else {
            dbtx.rollback().await.context("Failed to roll back transfer")?;
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount_cents)
        .bind(to_id.to_string())
        .fetch_one(&mut *dbtx)
        .await
        .context("Failed to credit recipient")?;
        let recipient_balance: Cents = row.get("balance_cents");

        let mut debit = Transaction::transfer_debit(from_id, amount_cents, sender_balance)
            .with_timestamp(timestamp);
        debit.sequence = Self::next_sequence(&mut dbtx).await?;
        Self::insert_transaction(&mut dbtx, &debit).await?;

        let mut credit = Transaction::transfer_credit(to_id, amount_cents, recipient_balance)
            .with_timestamp(timestamp);
        credit.sequence = Self::next_sequence(&mut dbtx).await?;
        Self::insert_transaction(&mut dbtx, &credit).await?;

        dbtx.commit().await.context("Failed to commit transfer")?;
        Ok(Some((debit, credit)))
    }

    /// Append a loan-request transaction. No balance change.
    pub async fn save_loan_request(&self, tx: &mut Transaction) -> Result<()> {
        let mut dbtx = self.pool.begin().await.context("Failed to begin transaction")?;

        tx.sequence = Self::next_sequence(&mut dbtx).await?;
        Self::insert_transaction(&mut dbtx, tx).await?;

        dbtx.commit().await.context("Failed to commit loan request")?;
        Ok(())
    }

    /// Approve a requested loan. The UPDATE carries its own state guard,
    /// so only a Requested loan row matches: a concurrent repayment or an
    /// earlier approval makes this return `false` instead of flipping a
    /// Paid loan back to Approved.
    pub async fn approve_loan(&self, id: TransactionId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET loan_status = ?
            WHERE id = ? AND kind = ? AND loan_status = ?
            "#,
        )
        .bind(LoanStatus::Approved.as_str())
        .bind(id.to_string())
        .bind(TxKind::Loan.as_str())
        .bind(LoanStatus::Requested.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to approve loan")?;

        Ok(result.rows_affected() == 1)
    }

    /// Repay a loan: claim the loan row, debit the principal from the
    /// account and refresh the loan's balance snapshot, all in one commit.
    ///
    /// The claim UPDATE only matches an approved, unpaid loan row, so of
    /// two concurrent repayments exactly one wins; the loser's claim
    /// matches zero rows and the whole unit rolls back. A failed balance
    /// guard likewise rolls the claim back, leaving the loan Approved.
    pub async fn pay_loan(&self, loan: &Transaction) -> Result<RepaymentOutcome> {
        let principal = loan.amount_cents;
        let mut dbtx = self.pool.begin().await.context("Failed to begin transaction")?;

        let claimed = sqlx::query(
            r#"
            UPDATE transactions
            SET kind = ?, loan_status = ?
            WHERE id = ? AND kind = ? AND loan_status = ?
            "#,
        )
        .bind(TxKind::LoanPaid.as_str())
        .bind(LoanStatus::Paid.as_str())
        .bind(loan.id.to_string())
        .bind(TxKind::Loan.as_str())
        .bind(LoanStatus::Approved.as_str())
        .execute(&mut *dbtx)
        .await
        .context("Failed to claim loan for repayment")?;

        if claimed.rows_affected() != 1 {
            dbtx.rollback().await.context("Failed to roll back repayment")?;
            return Ok(RepaymentOutcome::NotApproved);
        }

        // Strict guard: repayment requires principal < balance.
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents > ?
            RETURNING balance_cents
            "#,
        )
        .bind(principal)
        .bind(loan.account_id.to_string())
        .bind(principal)
        .fetch_optional(&mut *dbtx)
        .await
        .context("Failed to debit loan principal")?;

        let Some(row) = result else {
            dbtx.rollback().await.context("Failed to roll back repayment")?;
            return Ok(RepaymentOutcome::InsufficientFunds);
        };
        let new_balance: Cents = row.get("balance_cents");

        sqlx::query("UPDATE transactions SET balance_after_cents = ? WHERE id = ?")
            .bind(new_balance)
            .bind(loan.id.to_string())
            .execute(&mut *dbtx)
            .await
            .context("Failed to snapshot loan balance")?;

        dbtx.commit().await.context("Failed to commit loan repayment")?;
        Ok(RepaymentOutcome::Paid(new_balance))
    }

    /// Debit an account with a balance guard in the UPDATE itself.
    /// Returns the new balance, or `None` when the guard did not match
    /// (insufficient funds at commit time).
    async fn guarded_debit(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        amount_cents: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents >= ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount_cents)
        .bind(account_id.to_string())
        .bind(amount_cents)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to debit account")?;

        Ok(row.map(|r| r.get("balance_cents")))
    }

    /// Get the next sequence number within the current database transaction.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    async fn insert_transaction(conn: &mut SqliteConnection, tx: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, account_id, amount_cents, balance_after_cents, kind, loan_status, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.id.to_string())
        .bind(tx.sequence)
        .bind(tx.account_id.to_string())
        .bind(tx.amount_cents)
        .bind(tx.balance_after_cents)
        .bind(tx.kind.as_str())
        .bind(tx.loan_status.map(|s| s.as_str()))
        .bind(tx.timestamp.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert transaction")?;
        Ok(())
    }

    // ========================
    // Queries
    // ========================

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, sequence, account_id, amount_cents, balance_after_cents, kind, loan_status, timestamp
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// List an account's transactions, most recent first, optionally
    /// restricted to a closed timestamp interval.
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>> {
        let mut query = String::from(
            "SELECT id, sequence, account_id, amount_cents, balance_after_cents, kind, loan_status, timestamp FROM transactions WHERE account_id = ?",
        );
        let from_str = from.map(|dt| dt.to_rfc3339());
        let to_str = to.map(|dt| dt.to_rfc3339());

        if from_str.is_some() {
            query.push_str(" AND timestamp >= ?");
        }
        if to_str.is_some() {
            query.push_str(" AND timestamp <= ?");
        }
        query.push_str(" ORDER BY sequence DESC");

        let mut sql_query = sqlx::query(&query).bind(account_id.to_string());
        if let Some(ref f) = from_str {
            sql_query = sql_query.bind(f);
        }
        if let Some(ref t) = to_str {
            sql_query = sql_query.bind(t);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Sum transaction amounts across ALL accounts in a timestamp interval.
    /// Deliberately not filtered by account: this reproduces the balance
    /// figure of the system this ledger replaces (see DESIGN.md).
    pub async fn sum_amounts_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) as total
            FROM transactions
            WHERE timestamp >= ? AND timestamp <= ?
            "#,
        )
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum amounts in range")?;

        Ok(row.get("total"))
    }

    /// All loan transactions (outstanding or paid) for an account,
    /// most recent first.
    pub async fn list_loans(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, account_id, amount_cents, balance_after_cents, kind, loan_status, timestamp
            FROM transactions
            WHERE account_id = ? AND kind IN ('loan', 'loan_paid')
            ORDER BY sequence DESC
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list loans")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Count an account's approved-and-unpaid loans.
    pub async fn count_approved_loans(&self, account_id: AccountId) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions
            WHERE account_id = ? AND kind = 'loan' AND loan_status = 'approved'
            "#,
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count approved loans")?;

        Ok(row.get("count"))
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let kind_str: String = row.get("kind");
        let loan_status_str: Option<String> = row.get("loan_status");
        let timestamp_str: String = row.get("timestamp");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            amount_cents: row.get("amount_cents"),
            balance_after_cents: row.get("balance_after_cents"),
            kind: TxKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            loan_status: loan_status_str
                .map(|s| {
                    LoanStatus::from_str(&s)
                        .ok_or_else(|| anyhow::anyhow!("Invalid loan status: {}", s))
                })
                .transpose()?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
        })
    }
}
