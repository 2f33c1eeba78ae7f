//! Grain resolution and lookback/window enforcement.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};

use strata_catalog::{CatalogTables, CubeId, Grain, RequestType};
use strata_core::human_time::parse_granularity;
use strata_core::{Config, Error, Result};

/// Maps a granularity string to a grain by exact duration.
///
/// One day, one hour and one minute map to their grains. Anything else,
/// including `"all"` and unparseable text, is [`Grain::All`].
#[must_use]
pub fn resolve_grain(granularity: &str) -> Grain {
    let duration = parse_granularity(granularity);
    if duration == TimeDelta::days(1) {
        Grain::DailyGrain
    } else if duration == TimeDelta::hours(1) {
        Grain::HourlyGrain
    } else if duration == TimeDelta::minutes(1) {
        Grain::MinuteGrain
    } else {
        Grain::All
    }
}

/// Effective limits for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// How many days back a query may start.
    pub lookback_days: u32,
    /// Maximum span of a query, in days.
    pub max_window: u32,
}

/// A cube's `SyncRequest` policy rows keyed by grain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyView {
    rows: BTreeMap<Grain, (Option<u32>, Option<u32>)>,
}

impl PolicyView {
    /// Reads the cube's `SyncRequest` rows.
    #[must_use]
    pub fn for_cube(tables: &CatalogTables, cube_id: CubeId) -> Self {
        let rows = tables
            .lookbacks_for_cube(cube_id)
            .filter(|l| l.request_type == RequestType::SyncRequest)
            .map(|l| (l.grain, (l.lookback_days, l.max_window)))
            .collect();
        Self { rows }
    }

    /// Builds a view from explicit `(grain, lookback_days, max_window)` rows.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = (Grain, Option<u32>, Option<u32>)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(grain, lookback, window)| (grain, (lookback, window)))
                .collect(),
        }
    }

    /// Whether a row exists for the grain.
    #[must_use]
    pub fn has_grain(&self, grain: Grain) -> bool {
        self.rows.contains_key(&grain)
    }

    /// Limits for a grain; values the row lacks fall back to the defaults.
    #[must_use]
    pub fn limits(&self, grain: Grain, defaults: Limits) -> Limits {
        match self.rows.get(&grain) {
            Some((lookback, window)) => Limits {
                lookback_days: lookback.unwrap_or(defaults.lookback_days),
                max_window: window.unwrap_or(defaults.max_window),
            },
            None => defaults,
        }
    }
}

impl Limits {
    /// The configured defaults.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookback_days: config.max_days_lookback_sync,
            max_window: config.max_days_window_sync,
        }
    }

    /// Rejects ranges that start too far back or span too long.
    ///
    /// Neither check fires at its exact boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RangeViolation`] naming the earliest permissible
    /// date or the maximum span.
    pub fn check(
        &self,
        query_start: NaiveDateTime,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<()> {
        let selected_lookback = query_start - from;
        if selected_lookback.num_days() > i64::from(self.lookback_days) {
            let earliest = query_start
                .checked_sub_signed(TimeDelta::days(i64::from(self.lookback_days) - 1))
                .map_or(from.date(), |earliest| earliest.date());
            return Err(Error::lookback_exceeded(
                earliest,
                from.date(),
                to.date(),
            ));
        }

        let time_span = to - from;
        if time_span > TimeDelta::days(i64::from(self.max_window)) {
            return Err(Error::window_exceeded(self.max_window, time_span.num_days()));
        }
        Ok(())
    }
}
