mod common;

use std::sync::Arc;

use anyhow::Result;
use bankcore::application::AppError;
use bankcore::domain::{replay_balance, LoanStatus, TxKind};
use common::test_service;

#[tokio::test]
async fn test_loan_request_starts_requested_and_leaves_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 50000).await?;

    let loan = service.request_loan("1001", 200000).await?;
    assert_eq!(loan.kind, TxKind::Loan);
    assert_eq!(loan.loan_status, Some(LoanStatus::Requested));
    assert_eq!(loan.amount_cents, 200000);

    // Principal is not disbursed on request.
    assert_eq!(service.balance_of("1001").await?, 50000);

    Ok(())
}

#[tokio::test]
async fn test_loan_limit_three_approved() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;

    // Three approved loans is the cap; the 3rd succeeds.
    for _ in 0..3 {
        let loan = service.request_loan("1001", 100000).await?;
        service.approve_loan(loan.id).await?;
    }

    // The 4th request fails.
    let result = service.request_loan("1001", 100000).await;
    assert!(matches!(
        result,
        Err(AppError::LoanLimitExceeded { approved: 3, .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_requested_but_unapproved_loans_do_not_count() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;

    // Only approved-and-unpaid loans count toward the cap.
    for _ in 0..5 {
        service.request_loan("1001", 50000).await?;
    }

    let loans = service.loan_list("1001").await?;
    assert_eq!(loans.len(), 5);

    Ok(())
}

#[tokio::test]
async fn test_pay_requires_approval() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 100000).await?;

    let loan = service.request_loan("1001", 50000).await?;
    let result = service.pay_loan(loan.id).await;
    assert!(matches!(result, Err(AppError::LoanNotApproved(_))));
    assert_eq!(service.balance_of("1001").await?, 100000);

    Ok(())
}

#[tokio::test]
async fn test_pay_approved_loan_debits_and_terminates() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 100000).await?;

    let loan = service.request_loan("1001", 30000).await?;
    service.approve_loan(loan.id).await?;

    let receipt = service.pay_loan(loan.id).await?;
    assert_eq!(receipt.balance_cents, 70000);
    assert_eq!(receipt.loan.kind, TxKind::LoanPaid);
    assert_eq!(receipt.loan.loan_status, Some(LoanStatus::Paid));
    assert_eq!(service.balance_of("1001").await?, 70000);

    // Paid is terminal: a second repayment attempt fails.
    let again = service.pay_loan(loan.id).await;
    assert!(matches!(again, Err(AppError::LoanNotApproved(_))));
    assert_eq!(service.balance_of("1001").await?, 70000);

    Ok(())
}

#[tokio::test]
async fn test_pay_with_insufficient_balance_keeps_loan_approved() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 20000).await?;

    let loan = service.request_loan("1001", 50000).await?;
    service.approve_loan(loan.id).await?;

    let result = service.pay_loan(loan.id).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));

    // Balance unchanged, loan still approved and payable later.
    assert_eq!(service.balance_of("1001").await?, 20000);
    let loans = service.loan_list("1001").await?;
    assert_eq!(loans[0].loan_status, Some(LoanStatus::Approved));

    service.deposit("1001", 40000).await?;
    let receipt = service.pay_loan(loan.id).await?;
    assert_eq!(receipt.balance_cents, 10000);

    Ok(())
}

#[tokio::test]
async fn test_repayment_requires_principal_strictly_below_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 50000).await?;

    let loan = service.request_loan("1001", 50000).await?;
    service.approve_loan(loan.id).await?;

    // Principal equal to the balance does not clear the strict guard.
    let result = service.pay_loan(loan.id).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));

    Ok(())
}

#[tokio::test]
async fn test_illegal_loan_transitions_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 100000).await?;

    let loan = service.request_loan("1001", 30000).await?;
    service.approve_loan(loan.id).await?;

    // Re-approving an approved loan is illegal.
    let result = service.approve_loan(loan.id).await;
    assert!(matches!(
        result,
        Err(AppError::InvalidLoanTransition {
            from: LoanStatus::Approved,
            to: LoanStatus::Approved
        })
    ));

    // Resurrecting a paid loan is illegal.
    service.pay_loan(loan.id).await?;
    let result = service.approve_loan(loan.id).await;
    assert!(matches!(
        result,
        Err(AppError::InvalidLoanTransition {
            from: LoanStatus::Paid,
            to: LoanStatus::Approved
        })
    ));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_repayment_debits_once() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 100000).await?;

    let loan = service.request_loan("1001", 30000).await?;
    service.approve_loan(loan.id).await?;

    let service = Arc::new(service);
    let a = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.pay_loan(loan.id).await })
    };
    let b = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.pay_loan(loan.id).await })
    };
    let results = [a.await?, b.await?];

    // Exactly one repayment wins; the other finds the loan already paid.
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::LoanNotApproved(_)))));

    // The principal was debited exactly once and the log agrees.
    assert_eq!(service.balance_of("1001").await?, 70000);
    let report = service.report("1001", None).await?;
    assert_eq!(
        replay_balance(&report.transactions),
        report.account.balance_cents
    );

    let loans = service.loan_list("1001").await?;
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].loan_status, Some(LoanStatus::Paid));

    Ok(())
}

#[tokio::test]
async fn test_approve_non_loan_transaction_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    let receipt = service.deposit("1001", 50000).await?;

    let result = service.approve_loan(receipt.transaction.id).await;
    assert!(matches!(result, Err(AppError::NotALoan(_))));

    Ok(())
}

#[tokio::test]
async fn test_loan_list_contains_outstanding_and_paid() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.open_account("1001".into(), "Alice".into()).await?;
    service.deposit("1001", 100000).await?;

    let first = service.request_loan("1001", 20000).await?;
    service.approve_loan(first.id).await?;
    service.pay_loan(first.id).await?;
    service.request_loan("1001", 40000).await?;

    let loans = service.loan_list("1001").await?;
    assert_eq!(loans.len(), 2);
    let kinds: Vec<_> = loans.iter().map(|l| l.kind).collect();
    assert!(kinds.contains(&TxKind::Loan));
    assert!(kinds.contains(&TxKind::LoanPaid));

    // A paid loan frees a slot: only approved loans count.
    for _ in 0..3 {
        let loan = service.request_loan("1001", 10000).await?;
        service.approve_loan(loan.id).await?;
    }
    assert!(matches!(
        service.request_loan("1001", 10000).await,
        Err(AppError::LoanLimitExceeded { .. })
    ));

    Ok(())
}
