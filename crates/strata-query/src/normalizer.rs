//! Shaping remote query results.
//!
//! The remote answers with positional rows under a field header. The
//! normalizer turns them into a [`ResultSet`] and, for time series, derives
//! a canonical `__timestamp` column from the grain-specific Day/Hour fields.
//!
//! Hourly cubes encode `Hour` in one of two ways: long form (already date
//! plus hour, e.g. `2017080612`) or short form (hour of day, `0`..`23`). The
//! form is inferred from the length of the first value, so a two-character
//! long-form value would be misread as an hour of day.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;

use strata_catalog::Grain;
use strata_core::{Error, Result};
use strata_remote::QueryResponse;

use crate::compiler::{DAY, HOUR};

/// Name of the derived timestamp column.
pub const TIMESTAMP: &str = "__timestamp";

/// Rows of a query result under named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names.
    pub columns: Vec<String>,
    /// Row values aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether a column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of a column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().filter_map(move |row| row.get(index)))
    }

    /// Owned copy of a column's values.
    #[must_use]
    pub fn column_values(&self, name: &str) -> Option<Vec<Value>> {
        self.column(name).map(|values| values.cloned().collect())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push_column(&mut self, name: &str, values: Vec<Value>) {
        if let Some(index) = self.column_index(name) {
            for (row, value) in self.rows.iter_mut().zip(values) {
                row[index] = value;
            }
            return;
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    fn drop_column(&mut self, name: &str) {
        if let Some(index) = self.column_index(name) {
            self.columns.remove(index);
            for row in &mut self.rows {
                row.remove(index);
            }
        }
    }
}

impl From<QueryResponse> for ResultSet {
    fn from(response: QueryResponse) -> Self {
        Self {
            columns: response.field_names(),
            rows: response.rows,
        }
    }
}

/// What the normalizer needs to know about the query.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Resolved grain of the query.
    pub grain: Grain,
    /// Whether the result is a time series.
    pub is_timeseries: bool,
    /// Requested group-by fields.
    pub groupby: &'a [String],
    /// Whether the cube's `Hour` values are passed through untouched.
    pub hour_passthrough: bool,
    /// Registry the rows came from.
    pub registry: &'a str,
    /// Correlation id of the query.
    pub request_id: &'a str,
}

/// Builds the result set and derives `__timestamp`.
///
/// # Errors
///
/// - [`Error::RemoteDataInvalid`] for null Hour/Day values or values that
///   cannot be combined into a timestamp
/// - [`Error::NoData`] when there are no rows
pub fn normalize(response: QueryResponse, ctx: &NormalizeContext<'_>) -> Result<ResultSet> {
    response
        .check_shape()
        .map_err(|message| Error::remote_data_invalid(ctx.registry, ctx.request_id, message))?;
    let mut result = ResultSet::from(response);

    if ctx.is_timeseries && ctx.grain == Grain::DailyGrain {
        if let Some(days) = result.column_values(DAY) {
            result.push_column(TIMESTAMP, days);
        }
    }

    if ctx.is_timeseries
        && ctx.grain == Grain::HourlyGrain
        && !ctx.hour_passthrough
        && result.has_column(HOUR)
        && !result.is_empty()
    {
        normalize_hours(&mut result, ctx)?;
    }

    if result.is_empty() {
        tracing::warn!(request_id = %ctx.request_id, "No data");
        return Err(Error::NoData {
            request_id: ctx.request_id.to_string(),
        });
    }
    Ok(result)
}

fn normalize_hours(result: &mut ResultSet, ctx: &NormalizeContext<'_>) -> Result<()> {
    let invalid = |message: String| Error::remote_data_invalid(ctx.registry, ctx.request_id, message);

    for column in [HOUR, DAY] {
        let Some(mut values) = result.column(column) else {
            return Err(invalid(format!("{column} column missing from hourly result")));
        };
        if values.any(Value::is_null) {
            return Err(invalid(format!("There is NULL value in {column} column")));
        }
    }

    let hours = result.column_values(HOUR).unwrap_or_default();
    let first_len = hours.first().map_or(0, |v| text_of(v).chars().count());

    if first_len > 2 {
        result.push_column(TIMESTAMP, hours);
        result.drop_column(DAY);
    } else if first_len >= 1 {
        let days = result.column_values(DAY).unwrap_or_default();
        let stamps = hours
            .iter()
            .zip(&days)
            .map(|(hour, day)| combine_day_hour(day, hour).map(Value::String).ok_or_else(|| {
                invalid(format!(
                    "cannot combine Day '{}' and Hour '{}' into a timestamp",
                    text_of(day),
                    text_of(hour)
                ))
            }))
            .collect::<Result<Vec<_>>>()?;
        result.push_column(TIMESTAMP, stamps);
        if !ctx.groupby.iter().any(|g| g == DAY) {
            result.drop_column(DAY);
        }
    }
    Ok(())
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `YYYY-MM-DD HH:00:00` from a Day value (`YYYY-MM-DD` or `YYYYMMDD`) and an
/// hour of day.
fn combine_day_hour(day: &Value, hour: &Value) -> Option<String> {
    let day = text_of(day);
    let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&day, "%Y%m%d"))
        .ok()?;
    let hour: u32 = text_of(hour).trim().parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    Some(date.and_time(time).format("%Y-%m-%d %H:%M:%S").to_string())
}
