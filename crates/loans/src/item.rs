use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::status::ItemStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticleKind {
    Consumable,
    NonConsumable,
}

/// Catalog article as supplied by the bin service. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub bin_code: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: ArticleKind,
}

impl ArticleRef {
    pub fn is_consumable(&self) -> bool {
        self.kind == ArticleKind::Consumable
    }
}

/// One line of a loan request.
///
/// `returned_good + returned_defective <= requested_quantity` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanItem {
    pub id: ItemId,
    pub article: ArticleRef,
    pub requested_quantity: i64,
    pub status: ItemStatus,
    pub returned_good: i64,
    pub returned_defective: i64,
}

impl LoanItem {
    pub fn new(id: ItemId, article: ArticleRef, requested_quantity: i64) -> Self {
        Self {
            id,
            article,
            requested_quantity,
            status: ItemStatus::Pending,
            returned_good: 0,
            returned_defective: 0,
        }
    }

    pub fn is_consumable(&self) -> bool {
        self.article.is_consumable()
    }

    pub fn returned_total(&self) -> i64 {
        self.returned_good.saturating_add(self.returned_defective)
    }

    /// Quantity still expected back.
    ///
    /// Consumables are settled at delivery and never owe anything afterwards.
    pub fn outstanding(&self) -> i64 {
        if self.is_consumable() && self.status != ItemStatus::Pending {
            return 0;
        }
        self.requested_quantity - self.returned_total()
    }

    /// Status implied by the accumulated return quantities.
    pub(crate) fn reconciled_status(&self) -> ItemStatus {
        if self.outstanding() == 0 {
            ItemStatus::Returned
        } else if self.returned_total() > 0 {
            ItemStatus::Partial
        } else {
            self.status
        }
    }
}
