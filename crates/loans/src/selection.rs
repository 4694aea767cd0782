//! Operator-side selection of lines (and quantities) for the next packing step.
//!
//! Selections are session state: nothing here mutates a [`LoanRequest`].
//! Kit requests are all-or-nothing, so any toggle on one of their lines
//! toggles the whole kit and quantity overrides are refused.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LoanError, LoanResult};
use crate::ids::{ItemId, RequestId};
use crate::item::LoanItem;
use crate::request::LoanRequest;

/// Chosen lines of one request.
///
/// A line mapped to `None` moves its full requested quantity; `Some(q)` is an
/// operator override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSelection {
    request_id: RequestId,
    lines: HashMap<ItemId, Option<i64>>,
    note: Option<String>,
}

impl RequestSelection {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            lines: HashMap::new(),
            note: None,
        }
    }

    /// Select a line at its full quantity.
    pub fn with_item(mut self, item_id: ItemId) -> Self {
        self.lines.insert(item_id, None);
        self
    }

    /// Select a line with an explicit quantity (not validated here).
    pub fn with_quantity(mut self, item_id: ItemId, quantity: i64) -> Self {
        self.lines.insert(item_id, Some(quantity));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.lines.contains_key(&item_id)
    }

    /// Selected item ids with their override, if any.
    pub fn lines(&self) -> impl Iterator<Item = (ItemId, Option<i64>)> + '_ {
        self.lines.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Quantity this selection moves for `item` (`None` when not selected).
    pub fn chosen_quantity(&self, item: &LoanItem) -> Option<i64> {
        self.lines
            .get(&item.id)
            .map(|qty| qty.unwrap_or(item.requested_quantity))
    }

    /// Justification note, trimmed; blank notes count as absent.
    pub fn note(&self) -> Option<&str> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Tracks the current selection for every request an operator is working on.
#[derive(Debug, Clone, Default)]
pub struct ItemSelectionTracker {
    selections: HashMap<RequestId, RequestSelection>,
}

impl ItemSelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, request: &LoanRequest, item_id: ItemId) -> LoanResult<()> {
        ensure_item(request, item_id)?;
        if request.is_kit() {
            self.select_all(request, true);
            return Ok(());
        }
        self.entry(request.id_typed())
            .lines
            .entry(item_id)
            .or_insert(None);
        Ok(())
    }

    pub fn deselect(&mut self, request: &LoanRequest, item_id: ItemId) -> LoanResult<()> {
        ensure_item(request, item_id)?;
        if request.is_kit() {
            self.select_all(request, false);
            return Ok(());
        }
        if let Some(selection) = self.selections.get_mut(&request.id_typed()) {
            selection.lines.remove(&item_id);
        }
        Ok(())
    }

    /// Override the quantity to pack for one line (implies selecting it).
    pub fn set_quantity(
        &mut self,
        request: &LoanRequest,
        item_id: ItemId,
        quantity: i64,
    ) -> LoanResult<()> {
        let request_id = request.id_typed();
        if request.is_kit() {
            return Err(LoanError::KitPartialSelection { request_id });
        }
        let item = ensure_item(request, item_id)?;
        if quantity < 0 || quantity > item.requested_quantity {
            return Err(LoanError::OutOfRange {
                request_id,
                item_id,
                attempted: quantity,
                max: item.requested_quantity,
            });
        }
        self.entry(request_id).lines.insert(item_id, Some(quantity));
        Ok(())
    }

    /// True when any override differs from the line's requested quantity.
    pub fn has_quantity_change(&self, request: &LoanRequest) -> bool {
        let Some(selection) = self.selections.get(&request.id_typed()) else {
            return false;
        };
        request.items().iter().any(|item| {
            matches!(selection.lines.get(&item.id), Some(Some(q)) if *q != item.requested_quantity)
        })
    }

    pub fn select_all(&mut self, request: &LoanRequest, checked: bool) {
        let selection = self.entry(request.id_typed());
        if checked {
            for item in request.items() {
                if request.is_kit() {
                    selection.lines.insert(item.id, None);
                } else {
                    selection.lines.entry(item.id).or_insert(None);
                }
            }
        } else {
            selection.lines.clear();
        }
    }

    pub fn set_note(&mut self, request_id: RequestId, note: impl Into<String>) {
        self.entry(request_id).note = Some(note.into());
    }

    pub fn note(&self, request_id: RequestId) -> Option<&str> {
        self.selections.get(&request_id).and_then(RequestSelection::note)
    }

    pub fn is_selected(&self, request_id: RequestId, item_id: ItemId) -> bool {
        self.selections
            .get(&request_id)
            .is_some_and(|s| s.contains(item_id))
    }

    pub fn selection(&self, request_id: RequestId) -> Option<&RequestSelection> {
        self.selections.get(&request_id)
    }

    /// Copy of the current selection (empty when nothing was touched).
    pub fn snapshot(&self, request_id: RequestId) -> RequestSelection {
        self.selections
            .get(&request_id)
            .cloned()
            .unwrap_or_else(|| RequestSelection::new(request_id))
    }

    /// Discard the selection once it has been consumed.
    pub fn clear(&mut self, request_id: RequestId) {
        self.selections.remove(&request_id);
    }

    fn entry(&mut self, request_id: RequestId) -> &mut RequestSelection {
        self.selections
            .entry(request_id)
            .or_insert_with(|| RequestSelection::new(request_id))
    }
}

fn ensure_item(request: &LoanRequest, item_id: ItemId) -> LoanResult<&LoanItem> {
    request.item(item_id).ok_or(LoanError::UnknownItem {
        request_id: request.id_typed(),
        item_id,
    })
}
