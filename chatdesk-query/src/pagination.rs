//! Pagination windows and the split count/data plan.
//!
//! Two request styles resolve to one `Slice`:
//! - offset mode: `limit` (default 20, max 100) and `offset` (min 0);
//! - range mode: inclusive 0-based `start`/`end`, capped at 100 rows.
//!
//! A list is always executed as two queries. The count runs over the
//! filtered primary table with no join, and the data query adds the
//! enrichment join, order and slice. Both share one predicate list.

use crate::sql::{CountQuery, OrderBy, Predicate, RelatedJoin, SelectQuery};
use crate::schema::QualifiedTable;
use chatdesk_core::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MAX_RANGE_WINDOW};
use serde::{Deserialize, Serialize};

/// Resolved LIMIT/OFFSET pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub limit: i64,
    pub offset: i64,
}

/// Offset-mode request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetWindow {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl OffsetWindow {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn slice(&self) -> Slice {
        let limit = match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_PAGE_LIMIT),
            _ => DEFAULT_PAGE_LIMIT,
        };
        Slice {
            limit,
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

/// Range-mode request. Bounds are inclusive and 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeWindow {
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

impl RangeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// `None` when the window is empty (`end < start`); such a page has no
    /// items and a zero total, and no query is run for it.
    pub fn slice(&self) -> Option<Slice> {
        let start = self.start.unwrap_or(0).max(0);
        let mut end = self.end.unwrap_or(start);
        if end.saturating_sub(start).saturating_add(1) > MAX_RANGE_WINDOW {
            end = start.saturating_add(MAX_RANGE_WINDOW - 1);
        }
        let limit = end.saturating_sub(start).saturating_add(1);
        (limit > 0).then_some(Slice {
            limit,
            offset: start,
        })
    }
}

/// A filtered, ordered list ready to be split into count and data queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    pub from: QualifiedTable,
    pub join: Option<RelatedJoin>,
    pub predicates: Vec<Predicate>,
    pub order: Vec<OrderBy>,
}

impl ListPlan {
    pub fn new(from: QualifiedTable) -> Self {
        Self {
            from,
            join: None,
            predicates: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn join(mut self, join: RelatedJoin) -> Self {
        self.join = Some(join);
        self
    }

    pub fn filter(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    pub fn order(mut self, order: Vec<OrderBy>) -> Self {
        self.order = order;
        self
    }

    /// Exact count of the filtered primary table.
    pub fn count_query(&self) -> CountQuery {
        CountQuery {
            from: self.from.clone(),
            predicates: self.predicates.clone(),
        }
    }

    pub fn select_query(&self, slice: Option<Slice>) -> SelectQuery {
        SelectQuery {
            from: self.from.clone(),
            join: self.join.clone(),
            predicates: self.predicates.clone(),
            order: self.order.clone(),
            limit: slice.map(|s| s.limit),
            offset: slice.map(|s| s.offset).filter(|offset| *offset > 0),
        }
    }
}
