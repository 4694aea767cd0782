//! Loan-request lifecycle (approval, packing, delivery, partial returns).
//!
//! Pure, deterministic domain logic: no IO, no clocks, no locks. Callers
//! supply identifiers and timestamps, and host the state (see `depot-infra`).
//!
//! ```text
//! manual / kit order ─▶ pending-approval ─▶ approved ─▶ ready-for-packing
//!                                                          │ RequestSplitter
//!                                                          ▼
//!        completed ◀─ returned ◀─ pending-to-return ◀─ packed
//!                 ReturnReconciler        delivery
//! ```

pub mod error;
pub mod ids;
pub mod item;
pub mod kit;
pub mod numbering;
pub mod request;
pub mod returns;
pub mod selection;
pub mod splitter;
pub mod status;

pub use error::{LoanError, LoanResult};
pub use ids::{ItemId, KitId, RequestId, ReturnId};
pub use item::{ArticleKind, ArticleRef, LoanItem};
pub use kit::{Kit, KitItem, KitOrder, KitOrderFactory};
pub use numbering::RequestNumbering;
pub use request::{
    AGGREGATE_TYPE, Approval, Approve, Cancel, Closure, ConfirmDelivery, LoanCommand, LoanEvent,
    LoanRequest, OpenRequest, PackingRecord, Reject, ReleaseForPacking, RequestOrigin,
};
pub use returns::{
    OutstandingLine, PartialReturnRecord, ReturnEntry, ReturnHistory, ReturnReconciler,
};
pub use selection::{ItemSelectionTracker, RequestSelection};
pub use splitter::{RequestSplitter, SplitOutcome};
pub use status::{ItemStatus, Priority, RequestStatus, Stage};
