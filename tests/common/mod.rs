// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use bankcore::application::BankService;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BankService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Test fixture: standard account setup
pub struct StandardAccounts;

impl StandardAccounts {
    pub const ALICE: &'static str = "1001";
    pub const BOB: &'static str = "2002";

    /// Open two accounts: 1001 (Alice) and 2002 (Bob)
    pub async fn open_pair(service: &BankService) -> Result<()> {
        service
            .open_account(Self::ALICE.into(), "Alice".into())
            .await?;
        service.open_account(Self::BOB.into(), "Bob".into()).await?;
        Ok(())
    }

    /// Open both accounts and fund each with the given amount
    pub async fn open_funded_pair(
        service: &BankService,
        alice_cents: i64,
        bob_cents: i64,
    ) -> Result<()> {
        Self::open_pair(service).await?;
        if alice_cents > 0 {
            service.deposit(Self::ALICE, alice_cents).await?;
        }
        if bob_cents > 0 {
            service.deposit(Self::BOB, bob_cents).await?;
        }
        Ok(())
    }
}
