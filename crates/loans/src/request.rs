use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{Actor, Aggregate, AggregateRoot, DomainError};
use depot_events::Event;

use crate::error::{LoanError, LoanResult};
use crate::ids::{ItemId, KitId, RequestId};
use crate::item::LoanItem;
use crate::returns::PartialReturnRecord;
use crate::status::{ItemStatus, Priority, RequestStatus};

/// Stream name used when publishing loan request events.
pub const AGGREGATE_TYPE: &str = "loans.request";

/// How a request came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequestOrigin {
    Manual,
    Kit { kit_id: KitId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver: Actor,
    pub approved_at: DateTime<Utc>,
}

/// Why a request left the lifecycle early (rejection or cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub by: Actor,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingRecord {
    pub packed_by: Actor,
    pub packed_at: DateTime<Utc>,
    /// Mandatory whenever a packed quantity was reduced below the requested one.
    pub justification: Option<String>,
}

/// Aggregate root: LoanRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    id: RequestId,
    number: String,
    requester: Option<Actor>,
    department: String,
    project: String,
    requested_on: Option<NaiveDate>,
    expected_return: Option<NaiveDate>,
    priority: Priority,
    status: RequestStatus,
    notes: String,
    items: Vec<LoanItem>,
    origin: RequestOrigin,
    parent_id: Option<RequestId>,
    approval: Option<Approval>,
    closure: Option<Closure>,
    packing: Option<PackingRecord>,
    delivered_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    splits: u32,
    version: u64,
    created: bool,
}

impl LoanRequest {
    /// Create an empty, not-yet-opened aggregate instance.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            number: String::new(),
            requester: None,
            department: String::new(),
            project: String::new(),
            requested_on: None,
            expected_return: None,
            priority: Priority::Normal,
            status: RequestStatus::PendingApproval,
            notes: String::new(),
            items: Vec::new(),
            origin: RequestOrigin::Manual,
            parent_id: None,
            approval: None,
            closure: None,
            packing: None,
            delivered_at: None,
            completed_at: None,
            splits: 0,
            version: 0,
            created: false,
        }
    }

    /// Open a request in one step (handle + apply on an empty aggregate).
    pub fn open(cmd: OpenRequest) -> LoanResult<(Self, Vec<LoanEvent>)> {
        let mut request = Self::empty(cmd.request_id);
        let events = request.handle(&LoanCommand::Open(cmd))?;
        for event in &events {
            request.apply(event);
        }
        Ok((request, events))
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn requester(&self) -> Option<&Actor> {
        self.requester.as_ref()
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn requested_on(&self) -> Option<NaiveDate> {
        self.requested_on
    }

    pub fn expected_return(&self) -> Option<NaiveDate> {
        self.expected_return
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn items(&self) -> &[LoanItem] {
        &self.items
    }

    pub fn item(&self, item_id: ItemId) -> Option<&LoanItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn origin(&self) -> RequestOrigin {
        self.origin
    }

    pub fn is_kit(&self) -> bool {
        matches!(self.origin, RequestOrigin::Kit { .. })
    }

    pub fn parent_id(&self) -> Option<RequestId> {
        self.parent_id
    }

    pub fn approval(&self) -> Option<&Approval> {
        self.approval.as_ref()
    }

    pub fn closure(&self) -> Option<&Closure> {
        self.closure.as_ref()
    }

    pub fn packing(&self) -> Option<&PackingRecord> {
        self.packing.as_ref()
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Number of children split off so far (drives child numbering).
    pub fn splits(&self) -> u32 {
        self.splits
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Sum of outstanding quantities across all lines.
    pub fn outstanding_total(&self) -> i64 {
        self.items.iter().map(LoanItem::outstanding).sum()
    }

    /// True once every non-consumable line is back (good or defective).
    pub fn is_fully_reconciled(&self) -> bool {
        self.items
            .iter()
            .filter(|i| !i.is_consumable())
            .all(|i| i.outstanding() == 0)
    }

    /// Read-time classification: out on loan past the expected-return date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            RequestStatus::PendingToReturn | RequestStatus::Returned
        ) && self
            .expected_return
            .is_some_and(|due| due < now.date_naive())
    }

    pub(crate) fn ensure_transition(&self, to: RequestStatus) -> LoanResult<()> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(LoanError::IllegalTransition {
                request_id: self.id,
                from: self.status,
                to,
            })
        }
    }

    pub(crate) fn ensure_created(&self) -> LoanResult<()> {
        if self.created {
            Ok(())
        } else {
            Err(LoanError::UnknownRequest {
                request_id: self.id,
            })
        }
    }
}

impl AggregateRoot for LoanRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Open (manual entry or kit order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub request_id: RequestId,
    pub number: String,
    pub requester: Actor,
    pub department: String,
    pub project: String,
    pub requested_on: NaiveDate,
    pub expected_return: NaiveDate,
    pub priority: Priority,
    pub notes: String,
    pub items: Vec<LoanItem>,
    pub origin: RequestOrigin,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub request_id: RequestId,
    pub approver: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub request_id: RequestId,
    pub approver: Actor,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub request_id: RequestId,
    pub actor: Actor,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseForPacking (approved → ready-for-packing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseForPacking {
    pub request_id: RequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmDelivery (packed → pending-to-return).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmDelivery {
    pub request_id: RequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Plain status commands. Packing and returns go through
/// [`RequestSplitter`](crate::RequestSplitter) and
/// [`ReturnReconciler`](crate::ReturnReconciler) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanCommand {
    Open(OpenRequest),
    Approve(Approve),
    Reject(Reject),
    Cancel(Cancel),
    ReleaseForPacking(ReleaseForPacking),
    ConfirmDelivery(ConfirmDelivery),
}

impl LoanCommand {
    pub fn request_id(&self) -> RequestId {
        match self {
            LoanCommand::Open(c) => c.request_id,
            LoanCommand::Approve(c) => c.request_id,
            LoanCommand::Reject(c) => c.request_id,
            LoanCommand::Cancel(c) => c.request_id,
            LoanCommand::ReleaseForPacking(c) => c.request_id,
            LoanCommand::ConfirmDelivery(c) => c.request_id,
        }
    }
}

/// Event: RequestOpened. Carries the full initial state, including for
/// children created by a split (which open directly as `packed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOpened {
    pub request_id: RequestId,
    pub number: String,
    pub requester: Actor,
    pub department: String,
    pub project: String,
    pub requested_on: NaiveDate,
    pub expected_return: NaiveDate,
    pub priority: Priority,
    pub notes: String,
    pub items: Vec<LoanItem>,
    pub origin: RequestOrigin,
    pub status: RequestStatus,
    pub parent_id: Option<RequestId>,
    pub approval: Option<Approval>,
    pub packing: Option<PackingRecord>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestApproved {
    pub request_id: RequestId,
    pub approver: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub request_id: RequestId,
    pub approver: Actor,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCancelled {
    pub request_id: RequestId,
    pub actor: Actor,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedForPacking {
    pub request_id: RequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedLine {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// Event: ItemsSplitOff. Quantities moved onto `child_id`; emitted on the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsSplitOff {
    pub request_id: RequestId,
    pub child_id: RequestId,
    pub child_number: String,
    pub moved: Vec<MovedLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDelivered {
    pub request_id: RequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecorded {
    pub request_id: RequestId,
    pub record: PartialReturnRecord,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestReturned. Every non-consumable line is back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReturned {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCompleted {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEvent {
    RequestOpened(RequestOpened),
    RequestApproved(RequestApproved),
    RequestRejected(RequestRejected),
    RequestCancelled(RequestCancelled),
    ReleasedForPacking(ReleasedForPacking),
    ItemsSplitOff(ItemsSplitOff),
    RequestDelivered(RequestDelivered),
    ReturnRecorded(ReturnRecorded),
    RequestReturned(RequestReturned),
    RequestCompleted(RequestCompleted),
}

impl LoanEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            LoanEvent::RequestOpened(e) => e.request_id,
            LoanEvent::RequestApproved(e) => e.request_id,
            LoanEvent::RequestRejected(e) => e.request_id,
            LoanEvent::RequestCancelled(e) => e.request_id,
            LoanEvent::ReleasedForPacking(e) => e.request_id,
            LoanEvent::ItemsSplitOff(e) => e.request_id,
            LoanEvent::RequestDelivered(e) => e.request_id,
            LoanEvent::ReturnRecorded(e) => e.request_id,
            LoanEvent::RequestReturned(e) => e.request_id,
            LoanEvent::RequestCompleted(e) => e.request_id,
        }
    }
}

impl Event for LoanEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoanEvent::RequestOpened(_) => "loans.request.opened",
            LoanEvent::RequestApproved(_) => "loans.request.approved",
            LoanEvent::RequestRejected(_) => "loans.request.rejected",
            LoanEvent::RequestCancelled(_) => "loans.request.cancelled",
            LoanEvent::ReleasedForPacking(_) => "loans.request.released_for_packing",
            LoanEvent::ItemsSplitOff(_) => "loans.request.items_split_off",
            LoanEvent::RequestDelivered(_) => "loans.request.delivered",
            LoanEvent::ReturnRecorded(_) => "loans.request.return_recorded",
            LoanEvent::RequestReturned(_) => "loans.request.returned",
            LoanEvent::RequestCompleted(_) => "loans.request.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoanEvent::RequestOpened(e) => e.occurred_at,
            LoanEvent::RequestApproved(e) => e.occurred_at,
            LoanEvent::RequestRejected(e) => e.occurred_at,
            LoanEvent::RequestCancelled(e) => e.occurred_at,
            LoanEvent::ReleasedForPacking(e) => e.occurred_at,
            LoanEvent::ItemsSplitOff(e) => e.occurred_at,
            LoanEvent::RequestDelivered(e) => e.occurred_at,
            LoanEvent::ReturnRecorded(e) => e.occurred_at,
            LoanEvent::RequestReturned(e) => e.occurred_at,
            LoanEvent::RequestCompleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LoanRequest {
    type Command = LoanCommand;
    type Event = LoanEvent;
    type Error = LoanError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoanEvent::RequestOpened(e) => {
                self.id = e.request_id;
                self.number = e.number.clone();
                self.requester = Some(e.requester.clone());
                self.department = e.department.clone();
                self.project = e.project.clone();
                self.requested_on = Some(e.requested_on);
                self.expected_return = Some(e.expected_return);
                self.priority = e.priority;
                self.status = e.status;
                self.notes = e.notes.clone();
                self.items = e.items.clone();
                self.origin = e.origin;
                self.parent_id = e.parent_id;
                self.approval = e.approval.clone();
                self.packing = e.packing.clone();
                self.created = true;
            }
            LoanEvent::RequestApproved(e) => {
                self.status = RequestStatus::Approved;
                self.approval = Some(Approval {
                    approver: e.approver.clone(),
                    approved_at: e.occurred_at,
                });
            }
            LoanEvent::RequestRejected(e) => {
                self.status = RequestStatus::Rejected;
                self.closure = Some(Closure {
                    by: e.approver.clone(),
                    reason: e.reason.clone(),
                    at: e.occurred_at,
                });
            }
            LoanEvent::RequestCancelled(e) => {
                self.status = RequestStatus::Cancelled;
                self.closure = Some(Closure {
                    by: e.actor.clone(),
                    reason: e.reason.clone(),
                    at: e.occurred_at,
                });
            }
            LoanEvent::ReleasedForPacking(_) => {
                self.status = RequestStatus::ReadyForPacking;
            }
            LoanEvent::ItemsSplitOff(e) => {
                for line in &e.moved {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == line.item_id) {
                        item.requested_quantity -= line.quantity;
                    }
                }
                self.items.retain(|i| i.requested_quantity > 0);
                self.splits += 1;
            }
            LoanEvent::RequestDelivered(e) => {
                self.status = RequestStatus::PendingToReturn;
                self.delivered_at = Some(e.occurred_at);
                for item in &mut self.items {
                    if item.status == ItemStatus::Pending {
                        item.status = ItemStatus::Active;
                    }
                }
            }
            LoanEvent::ReturnRecorded(e) => {
                for entry in &e.record.entries {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == entry.item_id) {
                        item.returned_good = item.returned_good.saturating_add(entry.quantity_good);
                        item.returned_defective =
                            item.returned_defective.saturating_add(entry.quantity_defective);
                    }
                }
                for item in self.items.iter_mut().filter(|i| !i.is_consumable()) {
                    item.status = item.reconciled_status();
                }
            }
            LoanEvent::RequestReturned(_) => {
                self.status = RequestStatus::Returned;
            }
            LoanEvent::RequestCompleted(e) => {
                self.status = RequestStatus::Completed;
                self.completed_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_request_id(command.request_id())?;
        match command {
            LoanCommand::Open(cmd) => self.handle_open(cmd),
            LoanCommand::Approve(cmd) => self.handle_approve(cmd),
            LoanCommand::Reject(cmd) => self.handle_reject(cmd),
            LoanCommand::Cancel(cmd) => self.handle_cancel(cmd),
            LoanCommand::ReleaseForPacking(cmd) => self.handle_release(cmd),
            LoanCommand::ConfirmDelivery(cmd) => self.handle_delivery(cmd),
        }
    }
}

impl LoanRequest {
    fn ensure_request_id(&self, request_id: RequestId) -> LoanResult<()> {
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch").into());
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenRequest) -> LoanResult<Vec<LoanEvent>> {
        if self.created {
            return Err(DomainError::conflict("loan request already exists").into());
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("request number cannot be empty").into());
        }
        if cmd.expected_return < cmd.requested_on {
            return Err(
                DomainError::validation("expected return date precedes request date").into(),
            );
        }
        validate_items(cmd.request_id, &cmd.items)?;

        // Kit orders arrive pre-approved.
        let status = match cmd.origin {
            RequestOrigin::Manual => RequestStatus::PendingApproval,
            RequestOrigin::Kit { .. } => RequestStatus::Approved,
        };

        Ok(vec![LoanEvent::RequestOpened(RequestOpened {
            request_id: cmd.request_id,
            number: cmd.number.clone(),
            requester: cmd.requester.clone(),
            department: cmd.department.clone(),
            project: cmd.project.clone(),
            requested_on: cmd.requested_on,
            expected_return: cmd.expected_return,
            priority: cmd.priority,
            notes: cmd.notes.clone(),
            items: cmd
                .items
                .iter()
                .cloned()
                .map(|i| LoanItem::new(i.id, i.article, i.requested_quantity))
                .collect(),
            origin: cmd.origin,
            status,
            parent_id: None,
            approval: None,
            packing: None,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> LoanResult<Vec<LoanEvent>> {
        self.ensure_created()?;
        self.ensure_transition(RequestStatus::Approved)?;
        Ok(vec![LoanEvent::RequestApproved(RequestApproved {
            request_id: cmd.request_id,
            approver: cmd.approver.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &Reject) -> LoanResult<Vec<LoanEvent>> {
        self.ensure_created()?;
        self.ensure_transition(RequestStatus::Rejected)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a rejection needs a reason").into());
        }
        Ok(vec![LoanEvent::RequestRejected(RequestRejected {
            request_id: cmd.request_id,
            approver: cmd.approver.clone(),
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> LoanResult<Vec<LoanEvent>> {
        self.ensure_created()?;
        self.ensure_transition(RequestStatus::Cancelled)?;
        Ok(vec![LoanEvent::RequestCancelled(RequestCancelled {
            request_id: cmd.request_id,
            actor: cmd.actor.clone(),
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseForPacking) -> LoanResult<Vec<LoanEvent>> {
        self.ensure_created()?;
        self.ensure_transition(RequestStatus::ReadyForPacking)?;
        Ok(vec![LoanEvent::ReleasedForPacking(ReleasedForPacking {
            request_id: cmd.request_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delivery(&self, cmd: &ConfirmDelivery) -> LoanResult<Vec<LoanEvent>> {
        self.ensure_created()?;
        self.ensure_transition(RequestStatus::PendingToReturn)?;

        let mut events = vec![LoanEvent::RequestDelivered(RequestDelivered {
            request_id: cmd.request_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })];

        // Nothing can come back from an all-consumable delivery.
        if self.items.iter().all(LoanItem::is_consumable) {
            events.push(LoanEvent::RequestReturned(RequestReturned {
                request_id: cmd.request_id,
                occurred_at: cmd.occurred_at,
            }));
            events.push(LoanEvent::RequestCompleted(RequestCompleted {
                request_id: cmd.request_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }
}

fn validate_items(request_id: RequestId, items: &[LoanItem]) -> LoanResult<()> {
    if items.is_empty() {
        return Err(LoanError::InvalidItem {
            request_id,
            reason: "a request needs at least one item".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.requested_quantity <= 0 {
            return Err(LoanError::InvalidItem {
                request_id,
                reason: format!(
                    "item {} requests {} {}",
                    item.id, item.requested_quantity, item.article.unit
                ),
            });
        }
        if !seen.insert(item.id) {
            return Err(LoanError::InvalidItem {
                request_id,
                reason: format!("item {} listed twice", item.id),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Duration;
    use depot_core::UserId;

    use super::*;
    use crate::item::fixtures::tool;

    pub fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    pub fn actor(name: &str) -> Actor {
        Actor::new(UserId::new(), name)
    }

    pub fn open_cmd(items: Vec<LoanItem>) -> OpenRequest {
        let today = Utc::now().date_naive();
        OpenRequest {
            request_id: RequestId::generate(),
            number: "REQ-000001".to_string(),
            requester: actor("Dana Ortiz"),
            department: "Maintenance".to_string(),
            project: "Line 4 retrofit".to_string(),
            requested_on: today,
            expected_return: today + Duration::days(14),
            priority: Priority::Normal,
            notes: String::new(),
            items,
            origin: RequestOrigin::Manual,
            occurred_at: test_time(),
        }
    }

    pub fn opened(items: Vec<LoanItem>) -> LoanRequest {
        LoanRequest::open(open_cmd(items)).unwrap().0
    }

    pub fn two_tools() -> (LoanRequest, ItemId, ItemId) {
        let a = ItemId::new();
        let b = ItemId::new();
        let request = opened(vec![
            LoanItem::new(a, tool("A"), 5),
            LoanItem::new(b, tool("B"), 3),
        ]);
        (request, a, b)
    }

    pub fn run(request: &mut LoanRequest, command: LoanCommand) -> LoanResult<()> {
        let events = request.handle(&command)?;
        for e in &events {
            request.apply(e);
        }
        Ok(())
    }

    pub fn approve(request: &mut LoanRequest) {
        let id = request.id_typed();
        run(
            request,
            LoanCommand::Approve(Approve {
                request_id: id,
                approver: actor("Lee"),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
    }

    pub fn release(request: &mut LoanRequest) {
        let id = request.id_typed();
        run(
            request,
            LoanCommand::ReleaseForPacking(ReleaseForPacking {
                request_id: id,
                actor: actor("Sam"),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
    }

    pub fn deliver(request: &mut LoanRequest) {
        let id = request.id_typed();
        run(
            request,
            LoanCommand::ConfirmDelivery(ConfirmDelivery {
                request_id: id,
                actor: actor("Courier"),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
    }

    /// Approved and released, waiting at the packing bench.
    pub fn ready_for_packing(items: Vec<LoanItem>) -> LoanRequest {
        let mut request = opened(items);
        approve(&mut request);
        release(&mut request);
        request
    }
}
