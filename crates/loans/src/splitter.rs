//! Packing: splitting the selected part of a request off into a packed child.
//!
//! The parent keeps its identity and status with whatever was not packed;
//! the child gets a fresh identity, a derived number and the `packed`
//! status. For every original line `moved + remaining == requested`.

use chrono::{DateTime, Utc};

use depot_core::{Actor, Aggregate};

use crate::error::{LoanError, LoanResult};
use crate::ids::RequestId;
use crate::item::LoanItem;
use crate::numbering::RequestNumbering;
use crate::request::{
    ItemsSplitOff, LoanEvent, LoanRequest, MovedLine, PackingRecord, RequestOpened,
};
use crate::selection::RequestSelection;
use crate::status::RequestStatus;

/// Result of a successful split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    /// New packed request carrying the selected lines.
    pub moved: LoanRequest,
    /// The shrunk original, or `None` when the selection consumed it entirely.
    pub remaining: Option<LoanRequest>,
    /// Events to publish on the original's stream.
    pub parent_events: Vec<LoanEvent>,
    /// Events to publish on the child's stream.
    pub child_events: Vec<LoanEvent>,
}

pub struct RequestSplitter;

impl RequestSplitter {
    /// Validate `selection` against `request` and decide the split events.
    ///
    /// Never mutates; [`RequestSplitter::split`] applies the result.
    pub fn plan(
        request: &LoanRequest,
        selection: &RequestSelection,
        child_id: RequestId,
        packer: &Actor,
        at: DateTime<Utc>,
    ) -> LoanResult<(ItemsSplitOff, RequestOpened)> {
        let request_id = request.id_typed();
        request.ensure_created()?;
        request.ensure_transition(RequestStatus::Packed)?;

        if selection.request_id() != request_id {
            return Err(LoanError::EmptySelection { request_id });
        }

        for (item_id, _) in selection.lines() {
            if request.item(item_id).is_none() {
                return Err(LoanError::UnknownItem {
                    request_id,
                    item_id,
                });
            }
        }

        let mut moved_items = Vec::new();
        let mut quantity_changed = false;
        for item in request.items() {
            let Some(quantity) = selection.chosen_quantity(item) else {
                continue;
            };
            if quantity < 0 || quantity > item.requested_quantity {
                return Err(LoanError::OutOfRange {
                    request_id,
                    item_id: item.id,
                    attempted: quantity,
                    max: item.requested_quantity,
                });
            }
            if quantity == 0 {
                continue;
            }
            quantity_changed |= quantity != item.requested_quantity;
            moved_items.push(LoanItem::new(item.id, item.article.clone(), quantity));
        }

        if moved_items.is_empty() {
            return Err(LoanError::EmptySelection { request_id });
        }

        // Kits travel as one packing list.
        if request.is_kit() && (quantity_changed || moved_items.len() != request.items().len()) {
            return Err(LoanError::KitPartialSelection { request_id });
        }

        let note = selection.note().map(str::to_string);
        if quantity_changed && note.is_none() {
            return Err(LoanError::MissingJustification { request_id });
        }

        let child_number = RequestNumbering::child(request.number(), request.splits() + 1);
        let split_off = ItemsSplitOff {
            request_id,
            child_id,
            child_number: child_number.clone(),
            moved: moved_items
                .iter()
                .map(|i| MovedLine {
                    item_id: i.id,
                    quantity: i.requested_quantity,
                })
                .collect(),
            occurred_at: at,
        };

        let requester = request
            .requester()
            .cloned()
            .ok_or(LoanError::UnknownRequest { request_id })?;
        let (requested_on, expected_return) = request
            .requested_on()
            .zip(request.expected_return())
            .ok_or(LoanError::UnknownRequest { request_id })?;

        let opened = RequestOpened {
            request_id: child_id,
            number: child_number,
            requester,
            department: request.department().to_string(),
            project: request.project().to_string(),
            requested_on,
            expected_return,
            priority: request.priority(),
            notes: request.notes().to_string(),
            items: moved_items,
            origin: request.origin(),
            status: RequestStatus::Packed,
            parent_id: Some(request_id),
            approval: request.approval().cloned(),
            packing: Some(PackingRecord {
                packed_by: packer.clone(),
                packed_at: at,
                justification: note,
            }),
            occurred_at: at,
        };

        Ok((split_off, opened))
    }

    /// Split `request` according to `selection`.
    pub fn split(
        request: &LoanRequest,
        selection: &RequestSelection,
        child_id: RequestId,
        packer: &Actor,
        at: DateTime<Utc>,
    ) -> LoanResult<SplitOutcome> {
        let (split_off, opened) = Self::plan(request, selection, child_id, packer, at)?;

        let parent_events = vec![LoanEvent::ItemsSplitOff(split_off)];
        let child_events = vec![LoanEvent::RequestOpened(opened)];

        let mut moved = LoanRequest::empty(child_id);
        for event in &child_events {
            moved.apply(event);
        }

        let mut remaining = request.clone();
        for event in &parent_events {
            remaining.apply(event);
        }
        let remaining = (!remaining.items().is_empty()).then_some(remaining);

        Ok(SplitOutcome {
            moved,
            remaining,
            parent_events,
            child_events,
        })
    }
}
