//! Hosting for loan requests: configuration, the in-memory catalog, and the
//! lifecycle controller that serializes operations per request and publishes
//! their events.

pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;

pub use catalog::{RequestCatalog, RequestSlot};
pub use config::LoanConfig;
pub use error::{ControllerError, ControllerResult};
pub use lifecycle::{LifecycleController, NewLoanLine, NewLoanRequest};
