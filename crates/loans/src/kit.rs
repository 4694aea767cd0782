//! Kit templates and their expansion into loan requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use depot_core::Actor;

use crate::error::{LoanError, LoanResult};
use crate::ids::{ItemId, KitId, RequestId};
use crate::item::{ArticleRef, LoanItem};
use crate::numbering::RequestNumbering;
use crate::request::{LoanEvent, LoanRequest, OpenRequest, RequestOrigin};
use crate::status::Priority;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitItem {
    pub article: ArticleRef,
    pub quantity: i64,
}

/// Kit template. Read-only to the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kit {
    pub id: KitId,
    pub bin_code: String,
    pub name: String,
    pub category: String,
    pub items: Vec<KitItem>,
}

/// Who orders the kit, for what, and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitOrder {
    pub requester: Actor,
    pub department: String,
    pub project: String,
    pub expected_return: NaiveDate,
}

pub struct KitOrderFactory;

impl KitOrderFactory {
    /// Expand `kit` into an approved request, one line per kit item.
    pub fn from_kit(
        kit: &Kit,
        order: KitOrder,
        request_id: RequestId,
        numbering: &RequestNumbering,
        sequence: u64,
        at: DateTime<Utc>,
    ) -> LoanResult<(LoanRequest, Vec<LoanEvent>)> {
        if kit.items.is_empty() {
            return Err(LoanError::EmptyKit { kit_id: kit.id });
        }

        let items = kit
            .items
            .iter()
            .map(|k| LoanItem::new(ItemId::new(), k.article.clone(), k.quantity))
            .collect();

        LoanRequest::open(OpenRequest {
            request_id,
            number: numbering.kit(sequence),
            requester: order.requester,
            department: order.department,
            project: order.project,
            requested_on: at.date_naive(),
            expected_return: order.expected_return,
            priority: Priority::Normal,
            notes: format!("Kit {} ({})", kit.name, kit.bin_code),
            items,
            origin: RequestOrigin::Kit { kit_id: kit.id },
            occurred_at: at,
        })
    }
}
