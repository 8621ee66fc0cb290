//! Query filters, pagination, and the compliance statistics summary.
//!
//! Every query is scoped by a `TenantId` passed alongside these types; the
//! filter itself never carries a tenant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{record::AuditRecord, tenant::TenantId};

/// Inclusive time window over `AuditRecord::timestamp`. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// Optional equality filters. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilter {
    pub actor_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub date_range: Option<DateRange>,
    pub correlation_id: Option<String>,
}

impl QueryFilter {
    /// Return true if `record` satisfies every set filter.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        fn eq(filter: &Option<String>, value: Option<&str>) -> bool {
            filter.as_deref().map_or(true, |f| value == Some(f))
        }

        eq(&self.actor_id, record.actor_id.as_deref())
            && eq(&self.action, Some(&record.action))
            && eq(&self.resource_type, Some(&record.resource_type))
            && eq(&self.resource_id, Some(&record.resource_id))
            && eq(&self.correlation_id, record.correlation_id.as_deref())
            && self
                .date_range
                .map_or(true, |range| range.contains(record.timestamp))
    }
}

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Largest page size the ledger will serve.
    pub const MAX_PER_PAGE: u32 = 500;

    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Page clamped to >= 1, page size clamped to 1..=MAX_PER_PAGE.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        let p = self.normalized();
        (p.page as usize - 1) * p.per_page as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    SequenceNumber,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for Sort {
    /// Newest first, the order compliance screens list events in.
    fn default() -> Self {
        Self {
            field: SortField::Timestamp,
            order: SortOrder::Desc,
        }
    }
}

/// One page of results plus the total count matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as usize)
    }

    pub fn has_next(&self) -> bool {
        (self.page as usize) < self.total_pages()
    }
}

/// Summary of a tenant's ledger activity over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceStats {
    pub tenant_id: TenantId,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Events whose timestamp falls in the window.
    pub total_events: usize,
    pub events_by_action: BTreeMap<String, usize>,
    pub events_by_actor_role: BTreeMap<String, usize>,
    pub unique_actors: usize,
    /// The remaining counters cover the whole tenant chain, not just the window.
    pub anchored: usize,
    pub under_legal_hold: usize,
    pub disposed: usize,
    pub eligible_for_disposal: usize,
    pub last_sequence: u64,
}
