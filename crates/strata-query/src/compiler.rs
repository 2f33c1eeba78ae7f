//! Query compilation.
//!
//! Turns a [`QueryRequest`] into the [`QueryDocument`] the remote sync
//! endpoint expects. Compilation is deterministic: the same request, policy
//! and query start always yield the same document, down to field and filter
//! order.

use chrono::{NaiveDateTime, Timelike};

use strata_catalog::Grain;
use strata_core::human_time::parse_human_datetime;
use strata_core::{Config, Error, Result};
use strata_remote::{FilterExpression, Ordering, QueryDocument, SelectField, SortOrder};

use crate::filters::split_filter_values;
use crate::policy::{Limits, PolicyView, resolve_grain};
use crate::request::{FROM_MARKER, FilterClause, QueryRequest, TO_MARKER};

/// Day column.
pub const DAY: &str = "Day";
/// Hour column.
pub const HOUR: &str = "Hour";
/// Minute column.
pub const MINUTE: &str = "Minute";

/// Compiler settings taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerSettings {
    /// Limits used when the cube has no policy value for the grain.
    pub default_limits: Limits,
    /// Upper bound on the requested row count.
    pub row_limit_ceiling: u32,
}

impl CompilerSettings {
    /// Settings from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_limits: Limits::from_config(config),
            row_limit_ceiling: config.row_limit_ceiling,
        }
    }
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A compiled query and the values derived while compiling it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Document to post.
    pub document: QueryDocument,
    /// Resolved grain.
    pub grain: Grain,
    /// Effective start after `__from` adjustment.
    pub from: NaiveDateTime,
    /// Effective end after `__to` adjustment.
    pub to: NaiveDateTime,
}

impl CompiledQuery {
    /// Serialized document text.
    #[must_use]
    pub fn to_json(&self) -> String {
        self.document.to_json()
    }
}

/// Compiles a request for `cube_name` under the cube's `SyncRequest` policy.
///
/// # Errors
///
/// - [`Error::RangeViolation`] if the range breaks the lookback or window
///   limit for the resolved grain
/// - [`Error::InvalidInput`] if a time marker cannot be parsed, or if there
///   is neither a metric nor an explicit ordering
pub fn compile(
    cube_name: &str,
    policy: &PolicyView,
    request: &QueryRequest,
    query_start: NaiveDateTime,
    settings: &CompilerSettings,
) -> Result<CompiledQuery> {
    let mut from = request.from;
    let mut to = request.to;
    let mut filter_expressions = Vec::new();
    let mut time_columns: Vec<&str> = vec![FROM_MARKER, TO_MARKER];

    for clause in &request.filters {
        if let Some(raw) = marker_value(clause, FROM_MARKER) {
            let parsed = parse_human_datetime(&raw, query_start)?;
            from = match request.inner_from {
                Some(inner) => keep_offset(parsed, inner, from, &raw)?,
                None => parsed,
            };
        }
        if let Some(raw) = marker_value(clause, TO_MARKER) {
            let parsed = parse_human_datetime(&raw, query_start)?;
            to = match request.inner_to {
                Some(inner) => keep_offset(parsed, inner, to, &raw)?,
                None => parsed,
            };
        }
        if !time_columns.contains(&clause.col.as_str()) {
            filter_expressions.push(FilterExpression::Values {
                field: clause.col.clone(),
                operator: clause.op.clone(),
                values: split_filter_values(&clause.val),
            });
        }
    }

    let grain = resolve_grain(&request.granularity);
    let limits = policy.limits(grain, settings.default_limits);
    if let Err(e) = limits.check(query_start, from, to) {
        tracing::info!(cube = cube_name, %grain, error = %e, "query rejected by policy");
        return Err(e);
    }

    let date_range = FilterExpression::between(DAY, from.date().to_string(), to.date().to_string());
    let hour_range = || FilterExpression::between(HOUR, hour_of(from), hour_of(to));
    filter_expressions.push(date_range);

    let mut select_fields = Vec::new();
    match grain {
        Grain::DailyGrain => {
            select_fields.push(select(DAY));
            time_columns.push(DAY);
        }
        Grain::HourlyGrain => {
            select_fields.push(select(HOUR));
            time_columns.push(HOUR);
            filter_expressions.push(hour_range());
            if request.is_timeseries {
                select_fields.push(select(DAY));
                time_columns.push(DAY);
            }
        }
        Grain::MinuteGrain => {
            select_fields.push(select(MINUTE));
            time_columns.push(MINUTE);
        }
        Grain::All => {}
    }

    let since_hours = request.since().is_some_and(|since| since.contains("hour"));
    if grain != Grain::HourlyGrain && since_hours && policy.has_grain(Grain::HourlyGrain) {
        filter_expressions.push(hour_range());
    }

    for field in &request.groupby {
        if !time_columns.contains(&field.as_str()) {
            select_fields.push(select(field));
        }
    }
    for metric in &request.metrics {
        select_fields.push(select(metric));
    }

    let ordering = if request.orderby.is_empty() {
        let first = request.metrics.first().ok_or_else(|| {
            Error::InvalidInput("a query needs at least one metric or an explicit ordering".into())
        })?;
        vec![Ordering {
            field: first.clone(),
            order: SortOrder::Desc,
        }]
    } else {
        request
            .orderby
            .iter()
            .map(|o| Ordering {
                field: o.field.clone(),
                order: if o.ascending {
                    SortOrder::Asc
                } else {
                    SortOrder::Desc
                },
            })
            .collect()
    };

    let document = QueryDocument {
        cube: cube_name.to_string(),
        filter_expressions,
        select_fields,
        mr: request.row_limit.min(settings.row_limit_ceiling),
        si: 0,
        ordering,
    };
    tracing::debug!(cube = cube_name, %grain, query = %document.to_json(), "compiled query");

    Ok(CompiledQuery {
        document,
        grain,
        from,
        to,
    })
}

/// Moves `outer` to `parsed` while keeping its distance to `inner`.
fn keep_offset(
    parsed: NaiveDateTime,
    inner: NaiveDateTime,
    outer: NaiveDateTime,
    raw: &str,
) -> Result<NaiveDateTime> {
    parsed
        .checked_sub_signed(inner.signed_duration_since(outer))
        .ok_or_else(|| Error::InvalidInput(format!("time '{raw}' is out of range")))
}

fn marker_value(clause: &FilterClause, marker: &str) -> Option<String> {
    if clause.col != marker {
        return None;
    }
    clause.first_text()
}

fn select(field: &str) -> SelectField {
    SelectField {
        field: field.to_string(),
    }
}

fn hour_of(at: NaiveDateTime) -> String {
    at.hour().to_string()
}
