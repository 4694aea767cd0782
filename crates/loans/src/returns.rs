//! Partial returns: recording what came back and deciding completion.
//!
//! A physical return event becomes exactly one [`PartialReturnRecord`].
//! Records are never edited; a correction is another record. Outstanding
//! quantities are plain sums over the history, so the order in which records
//! arrive does not change the result.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{Actor, Aggregate};

use crate::error::{LoanError, LoanResult};
use crate::ids::{ItemId, ReturnId};
use crate::item::LoanItem;
use crate::request::{
    LoanEvent, LoanRequest, RequestCompleted, RequestReturned, ReturnRecorded,
};
use crate::status::{ItemStatus, RequestStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnEntry {
    pub item_id: ItemId,
    pub quantity_good: i64,
    pub quantity_defective: i64,
    pub notes: String,
}

impl ReturnEntry {
    pub fn good(item_id: ItemId, quantity: i64) -> Self {
        Self {
            item_id,
            quantity_good: quantity,
            quantity_defective: 0,
            notes: String::new(),
        }
    }

    pub fn defective(item_id: ItemId, quantity: i64, notes: impl Into<String>) -> Self {
        Self {
            item_id,
            quantity_good: 0,
            quantity_defective: quantity,
            notes: notes.into(),
        }
    }

    /// Good plus defective; `None` when the sum does not fit in an `i64`.
    pub fn total(&self) -> Option<i64> {
        self.quantity_good.checked_add(self.quantity_defective)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialReturnRecord {
    pub id: ReturnId,
    pub returned_at: DateTime<Utc>,
    pub returned_by: Actor,
    pub processed_by: Actor,
    pub entries: Vec<ReturnEntry>,
    pub notes: String,
}

/// Append-only return history of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnHistory {
    records: Vec<PartialReturnRecord>,
}

impl ReturnHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PartialReturnRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, return_id: ReturnId) -> bool {
        self.records.iter().any(|r| r.id == return_id)
    }

    /// Returned (good, defective) per item across all records.
    pub fn totals(&self) -> HashMap<ItemId, (i64, i64)> {
        let mut totals: HashMap<ItemId, (i64, i64)> = HashMap::new();
        for entry in self.records.iter().flat_map(|r| &r.entries) {
            let slot = totals.entry(entry.item_id).or_default();
            slot.0 = slot.0.saturating_add(entry.quantity_good);
            slot.1 = slot.1.saturating_add(entry.quantity_defective);
        }
        totals
    }

    fn append(&mut self, record: PartialReturnRecord) {
        self.records.push(record);
    }
}

/// Outstanding position of one line, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingLine {
    pub item_id: ItemId,
    pub name: String,
    pub requested: i64,
    pub returned_good: i64,
    pub returned_defective: i64,
    pub outstanding: i64,
    pub status: ItemStatus,
}

pub struct ReturnReconciler;

impl ReturnReconciler {
    /// Validate `record` against `request` and its history; decide the events.
    ///
    /// Never mutates.
    pub fn plan(
        request: &LoanRequest,
        history: &ReturnHistory,
        record: &PartialReturnRecord,
    ) -> LoanResult<Vec<LoanEvent>> {
        let request_id = request.id_typed();
        request.ensure_created()?;

        if request.status() != RequestStatus::PendingToReturn {
            return Err(LoanError::IllegalTransition {
                request_id,
                from: request.status(),
                to: RequestStatus::Returned,
            });
        }

        if history.contains(record.id) {
            return Err(LoanError::DuplicateReturn {
                request_id,
                return_id: record.id,
            });
        }

        if record.entries.iter().all(|e| e.total() == Some(0)) {
            return Err(LoanError::EmptyReturn {
                request_id,
                return_id: record.id,
            });
        }

        // Entries naming the same item are summed before the bound check.
        let mut incoming: HashMap<ItemId, i64> = HashMap::new();
        for entry in &record.entries {
            let item = request.item(entry.item_id).ok_or(LoanError::UnknownItem {
                request_id,
                item_id: entry.item_id,
            })?;
            if item.is_consumable() {
                return Err(LoanError::ConsumableNotReturnable {
                    request_id,
                    item_id: item.id,
                });
            }
            for quantity in [entry.quantity_good, entry.quantity_defective] {
                if quantity < 0 {
                    return Err(LoanError::OutOfRange {
                        request_id,
                        item_id: item.id,
                        attempted: quantity,
                        max: item.outstanding(),
                    });
                }
            }
            // Quantities are non-negative here, so overflow always means too many.
            let over = LoanError::OverReturn {
                request_id,
                item_id: item.id,
                attempted: i64::MAX,
                requested: item.requested_quantity,
            };
            let summed = incoming.entry(item.id).or_default();
            let so_far = *summed;
            *summed = entry
                .total()
                .and_then(|total| so_far.checked_add(total))
                .ok_or(over)?;
        }

        for item in request.items() {
            let Some(quantity) = incoming.get(&item.id) else {
                continue;
            };
            let attempted = item.returned_total().saturating_add(*quantity);
            if attempted > item.requested_quantity {
                return Err(LoanError::OverReturn {
                    request_id,
                    item_id: item.id,
                    attempted,
                    requested: item.requested_quantity,
                });
            }
        }

        let mut events = vec![LoanEvent::ReturnRecorded(ReturnRecorded {
            request_id,
            record: record.clone(),
            occurred_at: record.returned_at,
        })];

        let settles = request
            .items()
            .iter()
            .filter(|i| !i.is_consumable())
            .all(|i| i.outstanding() == incoming.get(&i.id).copied().unwrap_or(0));
        if settles {
            events.push(LoanEvent::RequestReturned(RequestReturned {
                request_id,
                occurred_at: record.returned_at,
            }));
            events.push(LoanEvent::RequestCompleted(RequestCompleted {
                request_id,
                occurred_at: record.returned_at,
            }));
        }

        Ok(events)
    }

    /// Record one return: on success `history` gains `record` and the
    /// updated request is returned; on failure neither changes.
    pub fn record_return(
        request: &LoanRequest,
        history: &mut ReturnHistory,
        record: PartialReturnRecord,
    ) -> LoanResult<(LoanRequest, Vec<LoanEvent>)> {
        let events = Self::plan(request, history, &record)?;

        let mut updated = request.clone();
        for event in &events {
            updated.apply(event);
        }
        history.append(record);

        Ok((updated, events))
    }

    pub fn outstanding_summary(request: &LoanRequest) -> Vec<OutstandingLine> {
        request.items().iter().map(outstanding_line).collect()
    }
}

fn outstanding_line(item: &LoanItem) -> OutstandingLine {
    OutstandingLine {
        item_id: item.id,
        name: item.article.name.clone(),
        requested: item.requested_quantity,
        returned_good: item.returned_good,
        returned_defective: item.returned_defective,
        outstanding: item.outstanding(),
        status: item.status,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::RequestSplitter;
    use crate::ids::RequestId;
    use crate::item::fixtures::{supply, tool};
    use crate::request::fixtures::{actor, deliver, ready_for_packing, test_time};
    use crate::selection::RequestSelection;

    fn record(entries: Vec<ReturnEntry>) -> PartialReturnRecord {
        PartialReturnRecord {
            id: ReturnId::new(),
            returned_at: test_time(),
            returned_by: actor("Dana"),
            processed_by: actor("Store clerk"),
            entries,
            notes: String::new(),
        }
    }

    /// Packs every line of `items` and delivers the resulting child.
    fn on_loan(items: Vec<LoanItem>) -> LoanRequest {
        let request = ready_for_packing(items);
        let selection = request
            .items()
            .iter()
            .fold(RequestSelection::new(request.id_typed()), |s, i| s.with_item(i.id));
        let mut packed = RequestSplitter::split(
            &request,
            &selection,
            RequestId::generate(),
            &actor("Packer"),
            test_time(),
        )
        .unwrap()
        .moved;
        deliver(&mut packed);
        packed
    }

    /// R2 from the packing scenario: A x5, B x2 delivered.
    fn r2() -> (LoanRequest, ItemId, ItemId) {
        let a = ItemId::new();
        let b = ItemId::new();
        let request = on_loan(vec![
            LoanItem::new(a, tool("A"), 5),
            LoanItem::new(b, tool("B"), 2),
        ]);
        (request, a, b)
    }

    #[test]
    fn delivery_activates_lines() {
        let (r2, a, _) = r2();
        assert_eq!(r2.status(), RequestStatus::PendingToReturn);
        assert_eq!(r2.item(a).unwrap().status, ItemStatus::Active);
    }

    #[test]
    fn completes_only_after_last_line_returns() {
        let (r2, a, b) = r2();
        let mut history = ReturnHistory::new();

        let (r2, _) =
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(a, 5)]))
                .unwrap();
        assert_eq!(r2.status(), RequestStatus::PendingToReturn);
        assert_eq!(r2.item(a).unwrap().status, ItemStatus::Returned);
        assert_eq!(r2.item(b).unwrap().status, ItemStatus::Active);

        let (r2, events) =
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(b, 2)]))
                .unwrap();
        assert_eq!(r2.status(), RequestStatus::Completed);
        assert_eq!(events.len(), 3);
        assert_eq!(history.len(), 2);
        assert_eq!(r2.outstanding_total(), 0);
    }

    #[test]
    fn partial_then_defective_settles_line() {
        let (r2, a, b) = r2();
        let mut history = ReturnHistory::new();

        let (r2, _) = ReturnReconciler::record_return(
            &r2,
            &mut history,
            record(vec![ReturnEntry::good(a, 3), ReturnEntry::good(b, 2)]),
        )
        .unwrap();
        assert_eq!(r2.item(a).unwrap().status, ItemStatus::Partial);
        assert_eq!(r2.item(a).unwrap().outstanding(), 2);

        let (r2, _) = ReturnReconciler::record_return(
            &r2,
            &mut history,
            record(vec![ReturnEntry::defective(a, 2, "cracked housing")]),
        )
        .unwrap();
        let line = r2.item(a).unwrap();
        assert_eq!((line.returned_good, line.returned_defective), (3, 2));
        assert_eq!(r2.status(), RequestStatus::Completed);
        assert_eq!(history.totals()[&a], (3, 2));
    }

    #[test]
    fn over_return_leaves_state_unchanged() {
        let (r2, a, _) = r2();
        let mut history = ReturnHistory::new();
        let (r2, _) =
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(a, 4)]))
                .unwrap();

        let before = (r2.clone(), history.clone());
        let err = ReturnReconciler::record_return(
            &r2,
            &mut history,
            record(vec![ReturnEntry::good(a, 1), ReturnEntry::defective(a, 1, "bent")]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LoanError::OverReturn {
                request_id: r2.id_typed(),
                item_id: a,
                attempted: 6,
                requested: 5,
            }
        );
        assert_eq!((r2, history), before);
    }

    #[test]
    fn overflowing_quantities_are_over_returns() {
        let (r2, a, _) = r2();
        let mut history = ReturnHistory::new();
        let (r2, _) =
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(a, 1)]))
                .unwrap();
        let before = (r2.clone(), history.clone());

        let huge_entries = [
            vec![ReturnEntry::good(a, i64::MAX)],
            vec![ReturnEntry {
                item_id: a,
                quantity_good: i64::MAX,
                quantity_defective: 1,
                notes: String::new(),
            }],
            vec![ReturnEntry::good(a, i64::MAX), ReturnEntry::defective(a, i64::MAX, "crushed")],
        ];
        for entries in huge_entries {
            let err = ReturnReconciler::record_return(&r2, &mut history, record(entries))
                .unwrap_err();
            assert!(matches!(
                err,
                LoanError::OverReturn { item_id, requested: 5, .. } if item_id == a
            ));
            assert_eq!((r2.clone(), history.clone()), before);
        }
    }

    #[test]
    fn duplicate_record_id_is_refused() {
        let (r2, a, _) = r2();
        let mut history = ReturnHistory::new();
        let first = record(vec![ReturnEntry::good(a, 1)]);
        let (r2, _) = ReturnReconciler::record_return(&r2, &mut history, first.clone()).unwrap();

        let err = ReturnReconciler::record_return(&r2, &mut history, first.clone()).unwrap_err();
        assert_eq!(
            err,
            LoanError::DuplicateReturn {
                request_id: r2.id_typed(),
                return_id: first.id,
            }
        );
        assert_eq!(r2.item(a).unwrap().returned_good, 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn unknown_and_negative_entries_are_refused() {
        let (r2, a, _) = r2();
        let mut history = ReturnHistory::new();

        let stray = ItemId::new();
        assert!(matches!(
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(stray, 1)])),
            Err(LoanError::UnknownItem { item_id, .. }) if item_id == stray
        ));

        let negative = ReturnEntry {
            item_id: a,
            quantity_good: 2,
            quantity_defective: -1,
            notes: String::new(),
        };
        assert!(matches!(
            ReturnReconciler::record_return(&r2, &mut history, record(vec![negative])),
            Err(LoanError::OutOfRange { attempted: -1, .. })
        ));

        assert!(matches!(
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(a, 0)])),
            Err(LoanError::EmptyReturn { .. })
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn consumables_never_enter_returns() {
        let tool_id = ItemId::new();
        let glue_id = ItemId::new();
        let request = on_loan(vec![
            LoanItem::new(tool_id, tool("clamp"), 2),
            LoanItem::new(glue_id, supply("glue"), 3),
        ]);
        assert_eq!(request.item(glue_id).unwrap().outstanding(), 0);

        let mut history = ReturnHistory::new();
        let err = ReturnReconciler::record_return(
            &request,
            &mut history,
            record(vec![ReturnEntry::good(glue_id, 1)]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LoanError::ConsumableNotReturnable {
                request_id: request.id_typed(),
                item_id: glue_id,
            }
        );

        // Returning the tools alone completes the request.
        let (done, _) = ReturnReconciler::record_return(
            &request,
            &mut history,
            record(vec![ReturnEntry::good(tool_id, 2)]),
        )
        .unwrap();
        assert_eq!(done.status(), RequestStatus::Completed);
        assert_eq!(done.item(glue_id).unwrap().status, ItemStatus::Active);
    }

    #[test]
    fn returns_require_delivery() {
        let request = ready_for_packing(vec![LoanItem::new(ItemId::new(), tool("saw"), 1)]);
        let item = request.items()[0].id;
        let err = ReturnReconciler::record_return(
            &request,
            &mut ReturnHistory::new(),
            record(vec![ReturnEntry::good(item, 1)]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoanError::IllegalTransition {
                from: RequestStatus::ReadyForPacking,
                ..
            }
        ));
    }

    #[test]
    fn completed_requests_take_no_more_returns() {
        let (r2, a, b) = r2();
        let mut history = ReturnHistory::new();
        let (done, _) = ReturnReconciler::record_return(
            &r2,
            &mut history,
            record(vec![ReturnEntry::good(a, 5), ReturnEntry::good(b, 2)]),
        )
        .unwrap();
        assert!(matches!(
            ReturnReconciler::record_return(&done, &mut history, record(vec![ReturnEntry::good(a, 1)])),
            Err(LoanError::IllegalTransition { from: RequestStatus::Completed, .. })
        ));
    }

    #[test]
    fn summary_reports_outstanding_per_line() {
        let (r2, a, b) = r2();
        let mut history = ReturnHistory::new();
        let (r2, _) =
            ReturnReconciler::record_return(&r2, &mut history, record(vec![ReturnEntry::good(a, 2)]))
                .unwrap();

        let summary = ReturnReconciler::outstanding_summary(&r2);
        let line_a = summary.iter().find(|l| l.item_id == a).unwrap();
        let line_b = summary.iter().find(|l| l.item_id == b).unwrap();
        assert_eq!((line_a.outstanding, line_a.status), (3, ItemStatus::Partial));
        assert_eq!((line_b.outstanding, line_b.status), (2, ItemStatus::Active));
    }

    fn split_entries(item_ids: &[ItemId], amounts: &[(i64, i64)]) -> Vec<ReturnEntry> {
        item_ids
            .iter()
            .zip(amounts)
            .map(|(id, (good, defective))| ReturnEntry {
                item_id: *id,
                quantity_good: *good,
                quantity_defective: *defective,
                notes: String::new(),
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of returns is attempted, no line ever
        /// holds more returned than requested, and refused returns change nothing.
        #[test]
        fn never_over_returns(
            requested in prop::collection::vec(1i64..10, 1..5),
            attempts in prop::collection::vec(prop::collection::vec((0i64..6, 0i64..6), 5), 1..12)
        ) {
            let items: Vec<LoanItem> = requested
                .iter()
                .enumerate()
                .map(|(n, q)| LoanItem::new(ItemId::new(), tool(&format!("t{n}")), *q))
                .collect();
            let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
            let mut request = on_loan(items);
            let mut history = ReturnHistory::new();

            for amounts in attempts {
                let before = (request.clone(), history.len());
                match ReturnReconciler::record_return(
                    &request,
                    &mut history,
                    record(split_entries(&ids, &amounts)),
                ) {
                    Ok((updated, _)) => request = updated,
                    Err(_) => prop_assert_eq!((request.clone(), history.len()), before),
                }
                for item in request.items() {
                    prop_assert!(item.returned_total() <= item.requested_quantity);
                }
            }
        }

        /// Property: two records applied in either order leave the same
        /// outstanding quantity per line.
        #[test]
        fn returns_commute(
            lines in prop::collection::vec((0i64..4, 0i64..4, 0i64..4, 0i64..4), 1..5)
        ) {
            // Size every line so both records always fit.
            let items: Vec<LoanItem> = lines
                .iter()
                .enumerate()
                .map(|(n, (g1, d1, g2, d2))| {
                    LoanItem::new(ItemId::new(), tool(&format!("t{n}")), g1 + d1 + g2 + d2 + 1)
                })
                .collect();
            let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
            let request = on_loan(items);

            let first: Vec<(i64, i64)> = lines.iter().map(|(g, d, _, _)| (*g, *d)).collect();
            let second: Vec<(i64, i64)> = lines.iter().map(|(_, _, g, d)| (*g, *d)).collect();
            let one = record(split_entries(&ids, &first));
            let two = record(split_entries(&ids, &second));

            let apply_in = |order: [&PartialReturnRecord; 2]| {
                let mut current = request.clone();
                let mut history = ReturnHistory::new();
                for r in order {
                    if let Ok((updated, _)) =
                        ReturnReconciler::record_return(&current, &mut history, r.clone())
                    {
                        current = updated;
                    }
                }
                current
                    .items()
                    .iter()
                    .map(|i| (i.id, i.outstanding()))
                    .collect::<Vec<_>>()
            };

            prop_assert_eq!(apply_in([&one, &two]), apply_in([&two, &one]));
        }

        /// Property: when the two records together cover every line exactly,
        /// either order ends completed with nothing outstanding.
        #[test]
        fn exact_returns_complete_in_either_order(
            lines in prop::collection::vec((1i64..4, 0i64..4, 0i64..4, 0i64..4), 1..5)
        ) {
            let items: Vec<LoanItem> = lines
                .iter()
                .enumerate()
                .map(|(n, (g1, d1, g2, d2))| {
                    LoanItem::new(ItemId::new(), tool(&format!("t{n}")), g1 + d1 + g2 + d2)
                })
                .collect();
            let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
            let request = on_loan(items);

            let first: Vec<(i64, i64)> = lines.iter().map(|(g, d, _, _)| (*g, *d)).collect();
            let second: Vec<(i64, i64)> = lines.iter().map(|(_, _, g, d)| (*g, *d)).collect();
            let one = record(split_entries(&ids, &first));
            let two = record(split_entries(&ids, &second));

            let apply_in = |order: [&PartialReturnRecord; 2]| {
                let mut current = request.clone();
                let mut history = ReturnHistory::new();
                for r in order {
                    // An all-zero second record is refused; the other one settles alone.
                    if let Ok((updated, _)) =
                        ReturnReconciler::record_return(&current, &mut history, r.clone())
                    {
                        current = updated;
                    }
                }
                current
            };

            let forward = apply_in([&one, &two]);
            let backward = apply_in([&two, &one]);
            prop_assert_eq!(forward.status(), RequestStatus::Completed);
            prop_assert_eq!(backward.status(), RequestStatus::Completed);
            prop_assert_eq!(forward.outstanding_total(), 0);
            prop_assert_eq!(
                forward.items().iter().map(|i| (i.id, i.outstanding(), i.status)).collect::<Vec<_>>(),
                backward.items().iter().map(|i| (i.id, i.outstanding(), i.status)).collect::<Vec<_>>()
            );
        }
    }
}
