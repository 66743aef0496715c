use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{BankService, TransactionReport};
use crate::domain::{format_cents, parse_cents, Cents, Transaction};

/// Bankcore - retail banking ledger
#[derive(Parser)]
#[command(name = "bankcore")]
#[command(about = "A race-safe retail-banking ledger with transfers and loan workflows")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "bankcore.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Deposit money into an account
    Deposit {
        /// Account number
        account: String,

        /// Amount to deposit (e.g., "500.00" or "500")
        amount: String,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account number
        account: String,

        /// Amount to withdraw
        amount: String,
    },

    /// Transfer money between two accounts
    Transfer {
        /// Amount to transfer
        amount: String,

        /// Sender account number
        #[arg(long)]
        from: String,

        /// Recipient account number
        #[arg(long)]
        to: String,
    },

    /// Loan workflow commands
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Show an account's transaction report
    Report {
        /// Account number
        account: String,

        /// Start date (ISO 8601 format: YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (ISO 8601 format: YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account number
        account: String,

        /// Account holder name
        #[arg(long)]
        owner: String,
    },

    /// List all accounts
    List,

    /// Show an account's current balance
    Balance {
        /// Account number
        account: String,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// Request a loan
    Request {
        /// Account number
        account: String,

        /// Loan principal
        amount: String,
    },

    /// Approve a requested loan (administrator action)
    Approve {
        /// Loan transaction id
        loan_id: String,
    },

    /// Repay an approved loan
    Pay {
        /// Loan transaction id
        loan_id: String,
    },

    /// List an account's loans
    List {
        /// Account number
        account: String,

        /// Output the list as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Commands::Init = self.command {
            BankService::init(&self.database).await?;
            println!("Initialized database at {}", self.database);
            return Ok(());
        }

        let service = BankService::connect(&self.database).await?;

        match self.command {
            Commands::Init => unreachable!(),

            Commands::Account(cmd) => run_account_command(&service, cmd).await?,

            Commands::Deposit { account, amount } => {
                let cents = parse_amount(&amount)?;
                let receipt = service.deposit(&account, cents).await?;
                println!(
                    "Deposited {} into account {} (new balance: {})",
                    format_cents(cents),
                    receipt.account_no,
                    format_cents(receipt.balance_cents)
                );
                println!("Transaction: {}", receipt.transaction.id);
            }

            Commands::Withdraw { account, amount } => {
                let cents = parse_amount(&amount)?;
                let receipt = service.withdraw(&account, cents).await?;
                println!(
                    "Withdrew {} from account {} (new balance: {})",
                    format_cents(cents),
                    receipt.account_no,
                    format_cents(receipt.balance_cents)
                );
                println!("Transaction: {}", receipt.transaction.id);
            }

            Commands::Transfer { amount, from, to } => {
                let cents = parse_amount(&amount)?;
                let receipt = service.transfer(&from, &to, cents).await?;
                println!(
                    "Transferred {} from {} to {}",
                    format_cents(cents),
                    receipt.sender_account_no,
                    receipt.recipient_account_no
                );
                println!(
                    "Debit: {} (balance {})",
                    receipt.debit.id,
                    format_cents(receipt.debit.balance_after_cents)
                );
                println!(
                    "Credit: {} (balance {})",
                    receipt.credit.id,
                    format_cents(receipt.credit.balance_after_cents)
                );
            }

            Commands::Loan(cmd) => run_loan_command(&service, cmd).await?,

            Commands::Report {
                account,
                from,
                to,
                json,
            } => {
                let range = parse_range(from.as_deref(), to.as_deref())?;
                let report = service.report(&account, range).await?;
                if json {
                    print_report_json(&report)?;
                } else {
                    print_report(&report);
                }
            }
        }

        Ok(())
    }
}

async fn run_account_command(service: &BankService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open { account, owner } => {
            let account = service.open_account(account, owner).await?;
            println!(
                "Opened account {} for {} (id: {})",
                account.account_no, account.owner, account.id
            );
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts.");
            }
            for account in accounts {
                println!(
                    "{}  {}  {}",
                    account.account_no,
                    format_cents(account.balance_cents),
                    account.owner
                );
            }
        }

        AccountCommands::Balance { account } => {
            let balance = service.balance_of(&account).await?;
            println!("{}", format_cents(balance));
        }
    }
    Ok(())
}

async fn run_loan_command(service: &BankService, cmd: LoanCommands) -> Result<()> {
    match cmd {
        LoanCommands::Request { account, amount } => {
            let cents = parse_amount(&amount)?;
            let loan = service.request_loan(&account, cents).await?;
            println!(
                "Loan request for {} submitted (transaction: {})",
                format_cents(cents),
                loan.id
            );
        }

        LoanCommands::Approve { loan_id } => {
            let id = parse_transaction_id(&loan_id)?;
            let loan = service.approve_loan(id).await?;
            println!("Loan {} approved ({})", loan.id, format_cents(loan.amount_cents));
        }

        LoanCommands::Pay { loan_id } => {
            let id = parse_transaction_id(&loan_id)?;
            let receipt = service.pay_loan(id).await?;
            println!(
                "Loan {} repaid (new balance: {})",
                receipt.loan.id,
                format_cents(receipt.balance_cents)
            );
        }

        LoanCommands::List { account, json } => {
            let loans = service.loan_list(&account).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&loans)?);
            } else if loans.is_empty() {
                println!("No loans.");
            } else {
                for loan in loans {
                    print_transaction(&loan);
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &TransactionReport) {
    println!(
        "Report for account {} ({})",
        report.account.account_no, report.account.owner
    );
    match report.range {
        Some((from, to)) => println!(
            "Range: {} .. {}  total in range: {}",
            from.date_naive(),
            to.date_naive(),
            format_cents(report.balance_cents)
        ),
        None => println!("Balance: {}", format_cents(report.balance_cents)),
    }
    for tx in &report.transactions {
        print_transaction(tx);
    }
}

fn print_report_json(report: &TransactionReport) -> Result<()> {
    let value = serde_json::json!({
        "account_no": report.account.account_no,
        "balance_cents": report.balance_cents,
        "transactions": report.transactions,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    let status = tx
        .loan_status
        .map(|s| format!("  [{}]", s))
        .unwrap_or_default();
    println!(
        "{}  {:>12}  {:>12}  {}  {}{}",
        tx.timestamp.format("%Y-%m-%d %H:%M"),
        format_cents(tx.amount_cents),
        format_cents(tx.balance_after_cents),
        tx.kind,
        tx.id,
        status
    );
}

fn parse_amount(input: &str) -> Result<Cents> {
    parse_cents(input).with_context(|| format!("Invalid amount: {}", input))
}

fn parse_transaction_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("Invalid transaction id: {}", input))
}

/// Parse an optional [from, to] date pair into an inclusive UTC interval
/// covering both whole days. Both bounds are required together, matching
/// the report form this CLI replaces.
fn parse_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    match (from, to) {
        (Some(from), Some(to)) => {
            let start = parse_date(from)?
                .and_hms_opt(0, 0, 0)
                .expect("midnight is valid")
                .and_utc();
            let end = parse_date(to)?
                .and_hms_opt(23, 59, 59)
                .expect("end of day is valid")
                .and_utc();
            Ok(Some((start, end)))
        }
        (None, None) => Ok(None),
        _ => anyhow::bail!("--from and --to must be given together"),
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", input))
}
