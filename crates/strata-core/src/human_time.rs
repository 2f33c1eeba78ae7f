//! Parsing of human-entered durations and datetimes.
//!
//! Granularities arrive as strings such as `"1 day"`, `"5 minutes"`, `"PT1H"`
//! or `"all"`. Time bounds arrive as `"now"`, `"7 days ago"` or plain calendar
//! dates. Both parsers are pure; "now" is always supplied by the caller.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::{Error, Result};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a granularity into a duration.
///
/// Unrecognized input (including `"all"`) yields a zero duration rather than
/// an error; a zero duration means "no time bucketing".
#[must_use]
pub fn parse_granularity(raw: &str) -> TimeDelta {
    let text = raw.trim().to_ascii_lowercase();
    if text.is_empty() || text == "all" {
        return TimeDelta::zero();
    }
    if text.starts_with('p') {
        return parse_iso_duration(&text).unwrap_or_else(TimeDelta::zero);
    }

    let mut tokens = text.split_whitespace();
    let (count, unit) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(unit), None, None) => (1, unit),
        (Some(count), Some(unit), None) => match parse_count(count) {
            Some(count) => (count, unit),
            None => return TimeDelta::zero(),
        },
        _ => return TimeDelta::zero(),
    };
    unit_duration(unit, count).unwrap_or_else(TimeDelta::zero)
}

/// Parses a human datetime relative to `now`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text matches none of the accepted forms.
pub fn parse_human_datetime(raw: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    let text = trimmed.to_ascii_lowercase();
    let midnight = |date: NaiveDate| date.and_time(NaiveTime::MIN);

    match text.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(midnight(now.date())),
        "yesterday" => return shift(midnight(now.date()), -TimeDelta::days(1), trimmed),
        "tomorrow" => return shift(midnight(now.date()), TimeDelta::days(1), trimmed),
        _ => {}
    }

    if let Some(rest) = text.strip_suffix(" ago") {
        let mut tokens = rest.split_whitespace();
        if let (Some(count), Some(unit), None) = (tokens.next(), tokens.next(), tokens.next()) {
            if let Some(delta) = parse_count(count).and_then(|count| unit_duration(unit, count)) {
                return shift(now, -delta, trimmed);
            }
        }
        return Err(Error::InvalidInput(format!(
            "cannot parse relative time '{trimmed}'"
        )));
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    if let Some((date, hour)) = trimmed.split_once(' ') {
        if let (Ok(date), Ok(hour)) = (NaiveDate::parse_from_str(date, "%Y-%m-%d"), hour.parse::<u32>()) {
            if let Some(parsed) = date.and_hms_opt(hour, 0, 0) {
                return Ok(parsed);
            }
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    Err(Error::InvalidInput(format!(
        "cannot parse datetime '{trimmed}'"
    )))
}

/// `at + delta`, or [`Error::InvalidInput`] when the result leaves the
/// representable range.
fn shift(at: NaiveDateTime, delta: TimeDelta, raw: &str) -> Result<NaiveDateTime> {
    at.checked_add_signed(delta)
        .ok_or_else(|| Error::InvalidInput(format!("time '{raw}' is out of range")))
}

fn parse_count(token: &str) -> Option<i64> {
    if let Ok(count) = token.parse::<i64>() {
        return (count >= 0).then_some(count);
    }
    let count = match token {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        _ => return None,
    };
    Some(count)
}

fn unit_duration(unit: &str, count: i64) -> Option<TimeDelta> {
    let unit = unit.strip_suffix('s').unwrap_or(unit);
    let seconds_per_unit: i64 = match unit {
        "second" | "sec" => 1,
        "minute" | "min" => 60,
        "hour" | "hr" => 3_600,
        "day" => 86_400,
        "week" => 7 * 86_400,
        "month" => 30 * 86_400,
        "year" => 365 * 86_400,
        _ => return None,
    };
    count
        .checked_mul(seconds_per_unit)
        .and_then(TimeDelta::try_seconds)
}

/// Parses the subset of ISO-8601 durations used for granularities
/// (`P1D`, `P1W`, `PT1H`, `PT30M`, `PT5S`, and combinations).
fn parse_iso_duration(text: &str) -> Option<TimeDelta> {
    let body = text.strip_prefix('p')?;
    let (date_part, time_part) = match body.split_once('t') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let count: i64 = digits.parse().ok()?;
        digits.clear();
        let part = match c {
            'd' => TimeDelta::try_days(count)?,
            'w' => TimeDelta::try_weeks(count)?,
            'm' => TimeDelta::try_days(count.checked_mul(30)?)?,
            'y' => TimeDelta::try_days(count.checked_mul(365)?)?,
            _ => return None,
        };
        total = total.checked_add(&part)?;
    }
    if !digits.is_empty() {
        return None;
    }
    for c in time_part.unwrap_or_default().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let count: i64 = digits.parse().ok()?;
        digits.clear();
        let part = match c {
            'h' => TimeDelta::try_hours(count)?,
            'm' => TimeDelta::try_minutes(count)?,
            's' => TimeDelta::try_seconds(count)?,
            _ => return None,
        };
        total = total.checked_add(&part)?;
    }
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}
