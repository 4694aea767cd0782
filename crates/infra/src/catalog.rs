//! In-memory request catalog.
//!
//! Each request lives in its own slot behind a mutex, so mutations are
//! serialized per request id while different requests proceed in parallel.
//! The map lock is only held long enough to clone a slot handle; it is never
//! held while waiting on a slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};

use depot_loans::{LoanError, LoanRequest, RequestId, ReturnHistory, Stage};

use crate::error::{ControllerError, ControllerResult};

/// A request together with its return history.
#[derive(Debug)]
pub struct RequestSlot {
    pub(crate) request: LoanRequest,
    pub(crate) returns: ReturnHistory,
    /// Set when the request was consumed by a split and left the catalog.
    pub(crate) retired: bool,
}

impl RequestSlot {
    pub fn new(request: LoanRequest) -> Self {
        Self {
            request,
            returns: ReturnHistory::new(),
            retired: false,
        }
    }

    pub fn request(&self) -> &LoanRequest {
        &self.request
    }

    pub fn returns(&self) -> &ReturnHistory {
        &self.returns
    }
}

pub type SharedSlot = Arc<Mutex<RequestSlot>>;

#[derive(Debug, Default)]
pub struct RequestCatalog {
    slots: RwLock<HashMap<RequestId, SharedSlot>>,
}

impl RequestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: LoanRequest) -> ControllerResult<()> {
        let id = request.id_typed();
        let mut slots = self.slots.write().map_err(|_| ControllerError::Poisoned)?;
        if slots.contains_key(&id) {
            return Err(ControllerError::AlreadyCatalogued(id));
        }
        slots.insert(id, Arc::new(Mutex::new(RequestSlot::new(request))));
        Ok(())
    }

    /// Handle to the slot of `request_id`.
    pub fn slot(&self, request_id: RequestId) -> ControllerResult<SharedSlot> {
        let slots = self.slots.read().map_err(|_| ControllerError::Poisoned)?;
        slots
            .get(&request_id)
            .cloned()
            .ok_or_else(|| LoanError::UnknownRequest { request_id }.into())
    }

    /// Lock the slot of `request_id`, refusing slots retired meanwhile.
    pub(crate) fn with_slot<T>(
        &self,
        request_id: RequestId,
        f: impl FnOnce(&mut RequestSlot) -> ControllerResult<T>,
    ) -> ControllerResult<T> {
        let slot = self.slot(request_id)?;
        let mut guard: MutexGuard<'_, RequestSlot> =
            slot.lock().map_err(|_| ControllerError::Poisoned)?;
        if guard.retired {
            return Err(LoanError::UnknownRequest { request_id }.into());
        }
        f(&mut *guard)
    }

    pub(crate) fn remove(&self, request_id: RequestId) -> ControllerResult<()> {
        let mut slots = self.slots.write().map_err(|_| ControllerError::Poisoned)?;
        slots.remove(&request_id);
        Ok(())
    }

    /// Snapshot of one request.
    pub fn get(&self, request_id: RequestId) -> Option<LoanRequest> {
        let slot = self.slot(request_id).ok()?;
        let guard = slot.lock().ok()?;
        Some(guard.request.clone())
    }

    /// Snapshot of one request's return history.
    pub fn returns(&self, request_id: RequestId) -> Option<ReturnHistory> {
        let slot = self.slot(request_id).ok()?;
        let guard = slot.lock().ok()?;
        Some(guard.returns.clone())
    }

    pub fn find_by_number(&self, number: &str) -> Option<LoanRequest> {
        self.snapshot().into_iter().find(|r| r.number() == number)
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<LoanRequest> {
        self.snapshot()
            .into_iter()
            .filter(|r| r.status().stage() == stage)
            .collect()
    }

    /// Requests out past their expected-return date. Derived, nothing is mutated.
    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<LoanRequest> {
        self.snapshot()
            .into_iter()
            .filter(|r| r.is_overdue(now))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every request, ordered by request number.
    pub fn snapshot(&self) -> Vec<LoanRequest> {
        let handles: Vec<SharedSlot> = match self.slots.read() {
            Ok(slots) => slots.values().cloned().collect(),
            Err(_) => return vec![],
        };

        let mut requests: Vec<LoanRequest> = handles
            .iter()
            .filter_map(|slot| slot.lock().ok().map(|g| g.request.clone()))
            .collect();
        requests.sort_by(|a, b| a.number().cmp(b.number()));
        requests
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use depot_core::{Actor, UserId};
    use depot_loans::{
        ArticleKind, ArticleRef, ItemId, LoanItem, OpenRequest, Priority, RequestOrigin,
        RequestStatus,
    };

    use super::*;

    fn request(number: &str, expected_return: NaiveDate) -> LoanRequest {
        LoanRequest::open(OpenRequest {
            request_id: RequestId::generate(),
            number: number.to_string(),
            requester: Actor::new(UserId::new(), "Dana"),
            department: "Ops".to_string(),
            project: "Audit".to_string(),
            requested_on: expected_return - Duration::days(3),
            expected_return,
            priority: Priority::High,
            notes: String::new(),
            items: vec![LoanItem::new(
                ItemId::new(),
                ArticleRef {
                    bin_code: "B-1".to_string(),
                    name: "Meter".to_string(),
                    description: String::new(),
                    unit: "pcs".to_string(),
                    kind: ArticleKind::NonConsumable,
                },
                1,
            )],
            origin: RequestOrigin::Manual,
            occurred_at: Utc::now(),
        })
        .unwrap()
        .0
    }

    #[test]
    fn insert_get_and_reject_duplicates() {
        let catalog = RequestCatalog::new();
        let r = request("REQ-000002", Utc::now().date_naive());
        catalog.insert(r.clone()).unwrap();

        assert_eq!(catalog.get(r.id_typed()), Some(r.clone()));
        assert!(matches!(
            catalog.insert(r.clone()),
            Err(ControllerError::AlreadyCatalogued(id)) if id == r.id_typed()
        ));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.returns(r.id_typed()).unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let catalog = RequestCatalog::new();
        let id = RequestId::generate();
        assert!(catalog.get(id).is_none());
        assert!(matches!(
            catalog.slot(id),
            Err(ControllerError::Loan(LoanError::UnknownRequest { request_id })) if request_id == id
        ));
    }

    #[test]
    fn stages_and_numbers() {
        let catalog = RequestCatalog::new();
        let today = Utc::now().date_naive();
        let b = request("REQ-000002", today);
        let a = request("REQ-000001", today);
        catalog.insert(b.clone()).unwrap();
        catalog.insert(a.clone()).unwrap();

        let pending = catalog.by_stage(Stage::PendingApproval);
        let numbers: Vec<&str> = pending.iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec!["REQ-000001", "REQ-000002"]);
        assert!(catalog.by_stage(Stage::Packed).is_empty());
        assert_eq!(catalog.find_by_number("REQ-000002").unwrap().id_typed(), b.id_typed());
    }

    #[test]
    fn retired_slots_refuse_work() {
        let catalog = RequestCatalog::new();
        let r = request("REQ-000003", Utc::now().date_naive());
        let id = r.id_typed();
        catalog.insert(r).unwrap();

        let slot = catalog.slot(id).unwrap();
        slot.lock().unwrap().retired = true;

        let result = catalog.with_slot(id, |s| Ok(s.request().status()));
        assert!(matches!(
            result,
            Err(ControllerError::Loan(LoanError::UnknownRequest { .. }))
        ));

        catalog.remove(id).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn overdue_only_counts_requests_on_loan() {
        let catalog = RequestCatalog::new();
        let long_ago = Utc::now().date_naive() - Duration::days(30);
        let r = request("REQ-000004", long_ago);
        assert_eq!(r.status(), RequestStatus::PendingApproval);
        catalog.insert(r).unwrap();
        assert!(catalog.overdue(Utc::now()).is_empty());
    }
}
