//! # Query Options
//!
//! Composable fragments a caller attaches to a list or count call.
//!
//! ## Option Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  opts = [filter("age > ?", [18]), sort("name", Desc), page(2, 10)]     │
//! │                                                                         │
//! │  list(opts)                         count(opts)                         │
//! │    │                                  │                                 │
//! │    ├── filter.apply ✓                 ├── filter.apply ✓  (eligible)    │
//! │    ├── sort.apply   ✓                 ├── sort         ✗  skipped       │
//! │    └── page.apply   ✓                 └── page         ✗  skipped       │
//! │                                                                         │
//! │  The same option list can be passed to both calls unchanged.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composition Rules
//! - Options apply in the order given.
//! - Sorts accumulate: each adds one ORDER BY term.
//! - Filters and pages replace: the last one supplied wins.

use serde::{Deserialize, Serialize};

use crate::query::{Predicate, SelectQuery};
use crate::types::SortOrder;
use crate::value::Value;

/// One filter, sort or page fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryOption {
    /// WHERE predicate with positional arguments.
    Filter(Predicate),

    /// One ORDER BY term.
    Sort { field: String, order: SortOrder },

    /// OFFSET/LIMIT window.
    Page { offset: u64, limit: u64 },
}

impl QueryOption {
    /// Filter option, e.g. `QueryOption::filter("age > ?", [18])`.
    pub fn filter<I, V>(expr: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        QueryOption::Filter(Predicate::new(expr, args))
    }

    /// Filter option without arguments, e.g. `QueryOption::filter_expr("deleted_at IS NULL")`.
    pub fn filter_expr(expr: impl Into<String>) -> Self {
        QueryOption::Filter(Predicate::new(expr, Vec::<Value>::new()))
    }

    /// Sort option.
    pub fn sort(field: impl Into<String>, order: SortOrder) -> Self {
        QueryOption::Sort {
            field: field.into(),
            order,
        }
    }

    /// Page option from a 1-based page number and a page size.
    ///
    /// ```text
    /// page(1, 20) → offset 0,  limit 20
    /// page(3, 20) → offset 40, limit 20
    /// page(0, 20) → offset 0,  limit 20   (clamped to the first page)
    /// ```
    pub fn page(page_no: u64, page_size: u64) -> Self {
        QueryOption::Page {
            offset: page_no.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
        }
    }

    /// Page option from an explicit offset and limit.
    pub fn window(offset: u64, limit: u64) -> Self {
        QueryOption::Page { offset, limit }
    }

    /// Applies this fragment to a query builder.
    pub fn apply(&self, query: SelectQuery) -> SelectQuery {
        match self {
            QueryOption::Filter(predicate) => query.filter(predicate.clone()),
            QueryOption::Sort { field, order } => query.order_by(field.clone(), *order),
            QueryOption::Page { offset, limit } => query.offset_limit(*offset, *limit),
        }
    }

    /// Whether this fragment takes part in a row count.
    pub fn is_count_eligible(&self) -> bool {
        matches!(self, QueryOption::Filter(_))
    }
}

/// Applies every option in order.
pub fn apply_all(query: SelectQuery, opts: &[QueryOption]) -> SelectQuery {
    opts.iter().fold(query, |q, opt| opt.apply(q))
}

/// Applies only the count-eligible options, in order.
pub fn apply_for_count(query: SelectQuery, opts: &[QueryOption]) -> SelectQuery {
    opts.iter()
        .filter(|opt| opt.is_count_eligible())
        .fold(query, |q, opt| opt.apply(q))
}

// =============================================================================
// Unit Tests
// =============================================================================
