use serde::{Deserialize, Serialize};

/// Lifecycle of a loan transaction. The only legal transitions are
/// Requested -> Approved (administrator action) and Approved -> Paid
/// (repayment). Paid is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Requested,
    Approved,
    Paid,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Approved => "approved",
            LoanStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "requested" => Some(LoanStatus::Requested),
            "approved" => Some(LoanStatus::Approved),
            "paid" => Some(LoanStatus::Paid),
            _ => None,
        }
    }

    pub fn can_transition(&self, to: LoanStatus) -> bool {
        matches!(
            (self, to),
            (LoanStatus::Requested, LoanStatus::Approved) | (LoanStatus::Approved, LoanStatus::Paid)
        )
    }

    /// Validate a state change, returning the new state or the illegal pair.
    pub fn transition(self, to: LoanStatus) -> Result<LoanStatus, IllegalLoanTransition> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(IllegalLoanTransition { from: self, to })
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalLoanTransition {
    pub from: LoanStatus,
    pub to: LoanStatus,
}

impl std::fmt::Display for IllegalLoanTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal loan transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalLoanTransition {}
