//! Event-sourced aggregate contract.
//!
//! A loan request changes only by applying its own events: commands are
//! decided against the current state, and the resulting events are applied
//! in order. The version counts applied events and doubles as the stream
//! sequence number when events are published.

use crate::error::{DomainError, DomainResult};

pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far.
    fn version(&self) -> u64;
}

/// Version a caller expects a request to be at before changing it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    #[default]
    Any,
    Exact(u64),
}

impl ExpectedVersion {
    /// `Conflict` when the request is not at the expected version.
    pub fn check(self, actual: u64) -> DomainResult<()> {
        match self {
            ExpectedVersion::Exact(expected) if expected != actual => Err(DomainError::conflict(
                format!("expected version {expected}, request is at {actual}"),
            )),
            _ => Ok(()),
        }
    }
}

/// `handle` never mutates, so a refused command leaves the aggregate as it
/// was. `apply` must bump the version by one per event.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_every_version() {
        assert!(ExpectedVersion::Any.check(0).is_ok());
        assert!(ExpectedVersion::Any.check(42).is_ok());
    }

    #[test]
    fn exact_mismatch_is_a_conflict() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(ExpectedVersion::Exact(4).check(4).is_ok());
    }
}
