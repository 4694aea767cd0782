//! Request and item status vocabularies, plus the legal transition table.

use serde::{Deserialize, Serialize};

/// Loan request lifecycle status.
///
/// Serialized with the outward vocabulary (`pending-approval`, `ready-for-packing`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    PendingApproval,
    Approved,
    ReadyForPacking,
    Packed,
    PendingToReturn,
    Returned,
    Completed,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 9] = [
        RequestStatus::PendingApproval,
        RequestStatus::Approved,
        RequestStatus::ReadyForPacking,
        RequestStatus::Packed,
        RequestStatus::PendingToReturn,
        RequestStatus::Returned,
        RequestStatus::Completed,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::PendingApproval => "pending-approval",
            RequestStatus::Approved => "approved",
            RequestStatus::ReadyForPacking => "ready-for-packing",
            RequestStatus::Packed => "packed",
            RequestStatus::PendingToReturn => "pending-to-return",
            RequestStatus::Returned => "returned",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// The single legal transition table.
    ///
    /// `ReadyForPacking -> Packed` is listed here but only the splitter takes it.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (PendingApproval, Approved | Rejected | Cancelled)
                | (Approved, ReadyForPacking | Rejected | Cancelled)
                | (ReadyForPacking, Packed)
                | (Packed, PendingToReturn)
                | (PendingToReturn, Returned)
                | (Returned, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::Cancelled
        )
    }

    pub fn stage(self) -> Stage {
        match self {
            RequestStatus::PendingApproval => Stage::PendingApproval,
            RequestStatus::Approved | RequestStatus::ReadyForPacking => Stage::ReadyForPacking,
            RequestStatus::Packed => Stage::Packed,
            RequestStatus::PendingToReturn | RequestStatus::Returned => Stage::PendingToReturn,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::Cancelled => {
                Stage::Inactive
            }
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console partition of requests (the tabs an operator works through).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    PendingApproval,
    ReadyForPacking,
    Packed,
    PendingToReturn,
    Inactive,
}

/// Per-line status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Pending,
    Active,
    Returned,
    Partial,
    Lost,
    Damaged,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Active => "active",
            ItemStatus::Returned => "returned",
            ItemStatus::Partial => "partial",
            ItemStatus::Lost => "lost",
            ItemStatus::Damaged => "damaged",
        }
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}
