//! Request lifecycle orchestration.
//!
//! ```text
//! operation
//!   ↓
//! 1. Lock the request's slot (per-id serialization)
//!   ↓
//! 2. Check the expected version, decide events (pure, no mutation)
//!   ↓
//! 3. Apply events, commit the new state to the slot
//!   ↓
//! 4. Publish envelopes to the bus, still in stream order
//! ```
//!
//! A rejected operation changes nothing: the domain decides before anything
//! is written. Publication happens after commit, so a `Publish` error means
//! the change stands but subscribers may have missed it.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{Actor, Aggregate, AggregateRoot, ExpectedVersion};
use depot_events::{EventBus, EventEnvelope};
use depot_loans::{
    AGGREGATE_TYPE, Approve, ArticleRef, Cancel, ConfirmDelivery, ItemId, ItemSelectionTracker,
    Kit, KitOrder, KitOrderFactory, LoanCommand, LoanError, LoanEvent, LoanItem, LoanRequest,
    OpenRequest, OutstandingLine, PartialReturnRecord, Priority, Reject, ReleaseForPacking,
    RequestId, RequestNumbering, RequestOrigin, RequestSplitter, ReturnHistory, ReturnReconciler,
    SplitOutcome, Stage,
};

use crate::catalog::RequestCatalog;
use crate::config::LoanConfig;
use crate::error::{ControllerError, ControllerResult};

/// One line of a manually entered request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoanLine {
    pub article: ArticleRef,
    pub quantity: i64,
}

/// Input for a manual request. Number, id, and dates are assigned on create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoanRequest {
    pub requester: Actor,
    pub department: String,
    pub project: String,
    pub expected_return: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notes: String,
    pub lines: Vec<NewLoanLine>,
}

/// Hosts every request and runs lifecycle operations against them.
///
/// Operations on the same request are serialized; operations on different
/// requests run in parallel.
#[derive(Debug)]
pub struct LifecycleController<B> {
    numbering: RequestNumbering,
    catalog: RequestCatalog,
    bus: B,
    manual_sequence: AtomicU64,
    kit_sequence: AtomicU64,
}

impl<B> LifecycleController<B> {
    pub fn new(config: &LoanConfig, bus: B) -> Self {
        Self {
            numbering: config.numbering(),
            catalog: RequestCatalog::new(),
            bus,
            manual_sequence: AtomicU64::new(0),
            kit_sequence: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &RequestCatalog {
        &self.catalog
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn get(&self, request_id: RequestId) -> Option<LoanRequest> {
        self.catalog.get(request_id)
    }

    pub fn returns(&self, request_id: RequestId) -> Option<ReturnHistory> {
        self.catalog.returns(request_id)
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<LoanRequest> {
        self.catalog.by_stage(stage)
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<LoanRequest> {
        self.catalog.overdue(now)
    }

    /// Per-line requested/returned/outstanding view of one request.
    pub fn outstanding(&self, request_id: RequestId) -> Option<Vec<OutstandingLine>> {
        self.catalog
            .get(request_id)
            .map(|r| ReturnReconciler::outstanding_summary(&r))
    }
}

impl<B> LifecycleController<B>
where
    B: EventBus<EventEnvelope<LoanEvent>>,
{
    /// Create a manual request in `pending-approval`.
    pub fn create_request(&self, new: NewLoanRequest) -> ControllerResult<LoanRequest> {
        let request_id = RequestId::generate();
        let now = Utc::now();
        let sequence = self.manual_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let items = new
            .lines
            .into_iter()
            .map(|line| LoanItem::new(ItemId::new(), line.article, line.quantity))
            .collect();

        let (request, events) = LoanRequest::open(OpenRequest {
            request_id,
            number: self.numbering.manual(sequence),
            requester: new.requester,
            department: new.department,
            project: new.project,
            requested_on: now.date_naive(),
            expected_return: new.expected_return,
            priority: new.priority,
            notes: new.notes,
            items,
            origin: RequestOrigin::Manual,
            occurred_at: now,
        })
        .inspect_err(|e| tracing::warn!(error = %e, "manual request rejected"))?;

        self.catalog.insert(request.clone())?;
        tracing::info!(
            request_id = %request_id,
            number = request.number(),
            items = request.items().len(),
            "loan request created"
        );
        self.publish(request_id, 0, events)?;
        Ok(request)
    }

    /// Turn a kit order into one approved request. All or nothing.
    pub fn create_from_kit(&self, kit: &Kit, order: KitOrder) -> ControllerResult<LoanRequest> {
        let request_id = RequestId::generate();
        let sequence = self.kit_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let (request, events) = KitOrderFactory::from_kit(
            kit,
            order,
            request_id,
            &self.numbering,
            sequence,
            Utc::now(),
        )
        .inspect_err(|e| tracing::warn!(kit_id = %kit.id, error = %e, "kit order rejected"))?;

        self.catalog.insert(request.clone())?;
        tracing::info!(
            request_id = %request_id,
            number = request.number(),
            kit_id = %kit.id,
            "kit request created"
        );
        self.publish(request_id, 0, events)?;
        Ok(request)
    }

    pub fn approve(
        &self,
        request_id: RequestId,
        approver: Actor,
        expected: ExpectedVersion,
    ) -> ControllerResult<LoanRequest> {
        self.execute(
            LoanCommand::Approve(Approve {
                request_id,
                approver,
                occurred_at: Utc::now(),
            }),
            expected,
        )
    }

    pub fn reject(
        &self,
        request_id: RequestId,
        approver: Actor,
        reason: impl Into<String>,
        expected: ExpectedVersion,
    ) -> ControllerResult<LoanRequest> {
        self.execute(
            LoanCommand::Reject(Reject {
                request_id,
                approver,
                reason: reason.into(),
                occurred_at: Utc::now(),
            }),
            expected,
        )
    }

    pub fn cancel(
        &self,
        request_id: RequestId,
        actor: Actor,
        reason: impl Into<String>,
        expected: ExpectedVersion,
    ) -> ControllerResult<LoanRequest> {
        self.execute(
            LoanCommand::Cancel(Cancel {
                request_id,
                actor,
                reason: reason.into(),
                occurred_at: Utc::now(),
            }),
            expected,
        )
    }

    pub fn release_for_packing(
        &self,
        request_id: RequestId,
        actor: Actor,
        expected: ExpectedVersion,
    ) -> ControllerResult<LoanRequest> {
        self.execute(
            LoanCommand::ReleaseForPacking(ReleaseForPacking {
                request_id,
                actor,
                occurred_at: Utc::now(),
            }),
            expected,
        )
    }

    pub fn confirm_delivery(
        &self,
        request_id: RequestId,
        actor: Actor,
        expected: ExpectedVersion,
    ) -> ControllerResult<LoanRequest> {
        self.execute(
            LoanCommand::ConfirmDelivery(ConfirmDelivery {
                request_id,
                actor,
                occurred_at: Utc::now(),
            }),
            expected,
        )
    }

    /// Run a plain status command against a catalogued request.
    pub fn execute(
        &self,
        command: LoanCommand,
        expected: ExpectedVersion,
    ) -> ControllerResult<LoanRequest> {
        let request_id = command.request_id();
        if let LoanCommand::Open(_) = command {
            return Err(LoanError::Domain(depot_core::DomainError::validation(
                "requests are opened through create_request or create_from_kit",
            ))
            .into());
        }

        self.catalog
            .with_slot(request_id, |slot| {
                let version = slot.request.version();
                expected.check(version).map_err(LoanError::from)?;

                let events = slot.request.handle(&command)?;
                let mut updated = slot.request.clone();
                for event in &events {
                    updated.apply(event);
                }
                slot.request = updated.clone();

                tracing::info!(
                    request_id = %request_id,
                    status = %updated.status(),
                    version = updated.version(),
                    "loan request updated"
                );
                self.publish(request_id, version, events)?;
                Ok(updated)
            })
            .inspect_err(|e| tracing::warn!(request_id = %request_id, error = %e, "operation rejected"))
    }

    /// Pack the lines currently selected in `tracker` for `request_id`.
    ///
    /// The selection moves into a new `packed` request; the original keeps
    /// the rest, or leaves the catalog when nothing is left. The tracker's
    /// selection for the request is cleared only on success.
    pub fn pack(
        &self,
        request_id: RequestId,
        tracker: &mut ItemSelectionTracker,
        packer: Actor,
    ) -> ControllerResult<SplitOutcome> {
        let selection = tracker.snapshot(request_id);

        let outcome = self
            .catalog
            .with_slot(request_id, |slot| {
                let version = slot.request.version();
                let outcome = RequestSplitter::split(
                    &slot.request,
                    &selection,
                    RequestId::generate(),
                    &packer,
                    Utc::now(),
                )?;

                let child_id = outcome.moved.id_typed();
                self.catalog.insert(outcome.moved.clone())?;
                match &outcome.remaining {
                    Some(rest) => slot.request = rest.clone(),
                    None => {
                        slot.retired = true;
                        self.catalog.remove(request_id)?;
                    }
                }

                tracing::info!(
                    request_id = %request_id,
                    child_id = %child_id,
                    child_number = outcome.moved.number(),
                    lines = outcome.moved.items().len(),
                    consumed = outcome.remaining.is_none(),
                    "items packed"
                );
                self.publish(request_id, version, outcome.parent_events.clone())?;
                self.publish(child_id, 0, outcome.child_events.clone())?;
                Ok(outcome)
            })
            .inspect_err(|e| tracing::warn!(request_id = %request_id, error = %e, "packing rejected"))?;

        tracker.clear(request_id);
        Ok(outcome)
    }

    /// Record one physical return against a request out on loan.
    pub fn record_return(
        &self,
        request_id: RequestId,
        record: PartialReturnRecord,
    ) -> ControllerResult<LoanRequest> {
        let return_id = record.id;

        self.catalog
            .with_slot(request_id, |slot| {
                let version = slot.request.version();
                let (updated, events) =
                    ReturnReconciler::record_return(&slot.request, &mut slot.returns, record)?;
                slot.request = updated.clone();

                tracing::info!(
                    request_id = %request_id,
                    return_id = %return_id,
                    status = %updated.status(),
                    outstanding = updated.outstanding_total(),
                    "return recorded"
                );
                self.publish(request_id, version, events)?;
                Ok(updated)
            })
            .inspect_err(|e| {
                tracing::warn!(request_id = %request_id, return_id = %return_id, error = %e, "return rejected")
            })
    }

    fn publish(
        &self,
        request_id: RequestId,
        version_before: u64,
        events: Vec<LoanEvent>,
    ) -> ControllerResult<()> {
        for (idx, event) in events.into_iter().enumerate() {
            let envelope = EventEnvelope::wrap(
                request_id.0,
                AGGREGATE_TYPE,
                version_before + idx as u64 + 1,
                event,
            );
            self.bus
                .publish(envelope)
                .map_err(|e| ControllerError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }
}
