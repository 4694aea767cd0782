use thiserror::Error;

use depot_loans::{LoanError, RequestId};

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// Domain validation failure; nothing was changed.
    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error("request {0} is already catalogued")]
    AlreadyCatalogued(RequestId),

    /// Internal lock poisoning.
    #[error("catalog lock poisoned")]
    Poisoned,

    /// Publication failed after the change was committed (at-least-once;
    /// republishing may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl ControllerError {
    pub fn as_loan(&self) -> Option<&LoanError> {
        match self {
            ControllerError::Loan(e) => Some(e),
            _ => None,
        }
    }
}
