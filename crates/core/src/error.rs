//! Errors shared by every depot crate.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures that are not specific to one lifecycle step.
///
/// `depot-loans` wraps this in its own `LoanError`; the variants here cover
/// malformed input, broken request invariants, unparsable ids and stale
/// versions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input rejected before any state change (blank request number,
    /// return date before the request date, missing rejection reason...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A command addressed the wrong request or would corrupt its state.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The request moved on since the caller last read it, or already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
