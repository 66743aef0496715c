use super::{Cents, Transaction, TxKind};

/// Balance delta a committed transaction contributed to its account.
///
/// Deposits, withdrawals and transfer legs carry their signed amount
/// directly. A loan that is merely requested or approved never moved money,
/// so it contributes nothing; once repaid, the repayment debited the
/// principal, so a LoanPaid entry contributes the negated principal.
pub fn balance_effect(tx: &Transaction) -> Cents {
    match tx.kind {
        TxKind::Deposit | TxKind::Withdrawal | TxKind::Transfer => tx.amount_cents,
        TxKind::Loan => 0,
        TxKind::LoanPaid => -tx.amount_cents,
    }
}

/// Replay an account's transaction log into a balance. With an intact log
/// this equals the stored balance snapshot on the account row.
pub fn replay_balance(transactions: &[Transaction]) -> Cents {
    transactions.iter().map(balance_effect).sum()
}

/// Check that a log is consistent with a stored balance.
pub fn verify_balance(transactions: &[Transaction], stored_balance: Cents) -> bool {
    replay_balance(transactions) == stored_balance
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::LoanStatus;

    #[test]
    fn test_replay_empty_log() {
        assert_eq!(replay_balance(&[]), 0);
    }

    #[test]
    fn test_replay_deposits_and_withdrawals() {
        let account = Uuid::new_v4();
        let log = vec![
            Transaction::deposit(account, 50000, 50000),
            Transaction::withdrawal(account, 20000, 30000),
            Transaction::deposit(account, 5000, 35000),
        ];
        assert_eq!(replay_balance(&log), 35000);
        assert!(verify_balance(&log, 35000));
    }

    #[test]
    fn test_replay_transfer_legs() {
        let sender = Uuid::new_v4();
        let log = vec![
            Transaction::deposit(sender, 100000, 100000),
            Transaction::transfer_debit(sender, 15000, 85000),
        ];
        assert_eq!(replay_balance(&log), 85000);
    }

    #[test]
    fn test_unpaid_loan_has_no_effect() {
        let account = Uuid::new_v4();
        let log = vec![
            Transaction::deposit(account, 50000, 50000),
            Transaction::loan_request(account, 200000, 50000),
        ];
        assert_eq!(replay_balance(&log), 50000);
    }

    #[test]
    fn test_paid_loan_debits_principal() {
        let account = Uuid::new_v4();
        let mut loan = Transaction::loan_request(account, 20000, 50000);
        // What repayment does to the row: kind flips, status advances,
        // snapshot refreshes.
        loan.kind = TxKind::LoanPaid;
        loan.loan_status = Some(LoanStatus::Paid);
        loan.balance_after_cents = 30000;

        let log = vec![Transaction::deposit(account, 50000, 50000), loan];
        assert_eq!(replay_balance(&log), 30000);
    }
}
