//! The abstract query request accepted by the compiler.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use strata_remote::FilterValue;

/// Filter column that overrides the query's start.
pub const FROM_MARKER: &str = "__from";

/// Filter column that overrides the query's end.
pub const TO_MARKER: &str = "__to";

/// One caller-supplied filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Filtered column, or [`FROM_MARKER`] / [`TO_MARKER`].
    pub col: String,
    /// Operator passed through to the remote, e.g. `in` or `not in`.
    pub op: String,
    /// Values; text values may pack several comma-separated entries.
    #[serde(default)]
    pub val: Vec<FilterValue>,
}

impl FilterClause {
    /// Creates a filter clause.
    pub fn new(col: impl Into<String>, op: impl Into<String>, val: Vec<FilterValue>) -> Self {
        Self {
            col: col.into(),
            op: op.into(),
            val,
        }
    }

    /// First value rendered as text, for the time-marker columns.
    #[must_use]
    pub fn first_text(&self) -> Option<String> {
        match self.val.first()? {
            FilterValue::Text(text) => Some(text.clone()),
            FilterValue::Number(number) => Some(number.to_string()),
        }
    }
}

/// Caller-supplied sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Sorted field.
    pub field: String,
    /// `true` for ascending.
    pub ascending: bool,
}

/// An analytical query against one cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Time bucketing, e.g. `"1 day"`, `"1 hour"` or `"all"`.
    #[serde(default = "default_granularity")]
    pub granularity: String,
    /// Start of the outer time range.
    pub from: NaiveDateTime,
    /// End of the outer time range.
    pub to: NaiveDateTime,
    /// Start of the inner range of a nested query.
    #[serde(default)]
    pub inner_from: Option<NaiveDateTime>,
    /// End of the inner range of a nested query.
    #[serde(default)]
    pub inner_to: Option<NaiveDateTime>,
    /// Group-by fields.
    #[serde(default)]
    pub groupby: Vec<String>,
    /// Metric names.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Filters, in order.
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    /// Whether the result is rendered as a time series.
    #[serde(default = "default_true")]
    pub is_timeseries: bool,
    /// Explicit sort keys; empty means descending on the first metric.
    #[serde(default)]
    pub orderby: Vec<OrderBy>,
    /// Requested row limit, clamped to the service ceiling.
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,
    /// Free-form hints, e.g. `since`.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

fn default_granularity() -> String {
    "all".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_row_limit() -> u32 {
    1000
}

impl QueryRequest {
    /// A request over `[from, to]` with defaults everywhere else.
    #[must_use]
    pub fn new(granularity: impl Into<String>, from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self {
            granularity: granularity.into(),
            from,
            to,
            inner_from: None,
            inner_to: None,
            groupby: Vec::new(),
            metrics: Vec::new(),
            filters: Vec::new(),
            is_timeseries: true,
            orderby: Vec::new(),
            row_limit: default_row_limit(),
            extras: BTreeMap::new(),
        }
    }

    /// The `since` hint, if supplied.
    #[must_use]
    pub fn since(&self) -> Option<&str> {
        self.extras.get("since").map(String::as_str)
    }
}
