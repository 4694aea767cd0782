//! Identifiers of the loan domain.

use serde::{Deserialize, Serialize};

use depot_core::{AggregateId, uuid_id};

/// Loan request identifier (aggregate root id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub AggregateId);

impl RequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

uuid_id!(
    /// Line item identifier. Unique within a request; carried unchanged onto
    /// the child request when the line is split off.
    pub struct ItemId,
    "ItemId"
);

uuid_id!(
    /// Partial return record identifier (idempotency key for returns).
    pub struct ReturnId,
    "ReturnId"
);

uuid_id!(
    /// Kit template identifier.
    pub struct KitId,
    "KitId"
);
