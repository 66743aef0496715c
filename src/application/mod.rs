// Application layer - workflows over the ledger repository:
// deposits/withdrawals, the two-leg transfer workflow, the loan
// request/approve/repay workflow, and read-only reporting.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
