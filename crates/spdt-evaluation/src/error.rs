//! Evaluation error types.

use spdt_core::Policy;
use thiserror::Error;

/// Errors raised while scoring a policy.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("VM type not in catalog: {0}")]
    UnknownVmType(String),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised while choosing among candidate policies.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no candidate policies to select from")]
    NoCandidates,

    /// Every candidate costs more than the budget. The scored candidates are
    /// handed back for inspection.
    #[error("cheapest policy costs {cheapest:.2}, {shortfall:.2} over the budget of {budget:.2}")]
    BudgetExceeded {
        budget: f64,
        cheapest: f64,
        shortfall: f64,
        candidates: Vec<Policy>,
    },
}

pub type SelectionResult<T> = Result<T, SelectionError>;
