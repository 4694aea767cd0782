//! Loan lifecycle error taxonomy.
//!
//! Every variant is a local validation failure carrying enough context to
//! render a message. None is transient, so none is retried; an operation that
//! fails leaves the request exactly as it was.

use thiserror::Error;

use depot_core::DomainError;

use crate::ids::{ItemId, KitId, RequestId, ReturnId};
use crate::status::RequestStatus;

pub type LoanResult<T> = Result<T, LoanError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("quantity {attempted} for item {item_id} of request {request_id} is outside 0..={max}")]
    OutOfRange {
        request_id: RequestId,
        item_id: ItemId,
        attempted: i64,
        max: i64,
    },

    #[error("nothing selected on request {request_id}")]
    EmptySelection { request_id: RequestId },

    #[error("request {request_id}: reduced quantities need a justification note")]
    MissingJustification { request_id: RequestId },

    #[error("request {request_id} cannot move from {from} to {to}")]
    IllegalTransition {
        request_id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("item {item_id} is not part of request {request_id}")]
    UnknownItem {
        request_id: RequestId,
        item_id: ItemId,
    },

    #[error(
        "returning {attempted} of item {item_id} on request {request_id} exceeds the {requested} lent"
    )]
    OverReturn {
        request_id: RequestId,
        item_id: ItemId,
        attempted: i64,
        requested: i64,
    },

    #[error("return {return_id} was already recorded on request {request_id}")]
    DuplicateReturn {
        request_id: RequestId,
        return_id: ReturnId,
    },

    #[error("kit {kit_id} has no items")]
    EmptyKit { kit_id: KitId },

    #[error("kit request {request_id} is packed all-or-nothing")]
    KitPartialSelection { request_id: RequestId },

    #[error("item {item_id} of request {request_id} is consumable and cannot be returned")]
    ConsumableNotReturnable {
        request_id: RequestId,
        item_id: ItemId,
    },

    #[error("return {return_id} on request {request_id} carries no quantities")]
    EmptyReturn {
        request_id: RequestId,
        return_id: ReturnId,
    },

    #[error("request {request_id} not found")]
    UnknownRequest { request_id: RequestId },

    #[error("invalid item on request {request_id}: {reason}")]
    InvalidItem {
        request_id: RequestId,
        reason: String,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl LoanError {
    /// Request the error is about, when it names one.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            LoanError::OutOfRange { request_id, .. }
            | LoanError::EmptySelection { request_id }
            | LoanError::MissingJustification { request_id }
            | LoanError::IllegalTransition { request_id, .. }
            | LoanError::UnknownItem { request_id, .. }
            | LoanError::OverReturn { request_id, .. }
            | LoanError::DuplicateReturn { request_id, .. }
            | LoanError::KitPartialSelection { request_id }
            | LoanError::ConsumableNotReturnable { request_id, .. }
            | LoanError::EmptyReturn { request_id, .. }
            | LoanError::UnknownRequest { request_id }
            | LoanError::InvalidItem { request_id, .. } => Some(*request_id),
            LoanError::EmptyKit { .. } | LoanError::Domain(_) => None,
        }
    }
}
