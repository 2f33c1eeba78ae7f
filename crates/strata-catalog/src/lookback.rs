//! Lookback policy rows.
//!
//! A policy row limits, for one cube, request type and grain, how far back a
//! query may start (`lookback_days`) and how wide it may be (`max_window`).
//! Writes to a `DailyGrain` row are mirrored onto the `All` row of the same
//! cube and request type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{CubeId, LookbackId};

/// Policy class the remote service distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestType {
    /// Interactive, synchronous queries.
    SyncRequest,
    /// Batch, asynchronous queries.
    AsyncRequest,
}

/// Time-bucketing granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grain {
    /// No time bucketing.
    #[default]
    All,
    /// One bucket per day.
    DailyGrain,
    /// One bucket per hour.
    HourlyGrain,
    /// One bucket per minute.
    MinuteGrain,
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "All",
            Self::DailyGrain => "DailyGrain",
            Self::HourlyGrain => "HourlyGrain",
            Self::MinuteGrain => "MinuteGrain",
        };
        f.write_str(name)
    }
}

/// One `(requestType, grain, days)` entry of a remote lookback or window array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEntry {
    /// Policy class.
    pub request_type: RequestType,
    /// Grain the limit applies to.
    pub grain: Grain,
    /// Limit in days.
    pub days: u32,
}

/// Stored policy for one `(cube, request_type, grain)`.
///
/// Either limit may be absent when the remote only declared the other one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookback {
    /// Surrogate id.
    pub id: LookbackId,
    /// Owning cube.
    pub cube_id: CubeId,
    /// Policy class.
    pub request_type: RequestType,
    /// Grain the limits apply to.
    pub grain: Grain,
    /// How many days back a query may start.
    pub lookback_days: Option<u32>,
    /// Maximum span of a single query, in days.
    pub max_window: Option<u32>,
}

/// Which limit a policy write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyLimit {
    /// `lookback_days`.
    LookbackDays,
    /// `max_window`.
    MaxWindow,
}

impl Lookback {
    pub(crate) fn set(&mut self, limit: PolicyLimit, days: u32) {
        match limit {
            PolicyLimit::LookbackDays => self.lookback_days = Some(days),
            PolicyLimit::MaxWindow => self.max_window = Some(days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_use_remote_tags() {
        let entry: PolicyEntry =
            serde_json::from_str(r#"{"requestType":"SyncRequest","grain":"HourlyGrain","days":3}"#)
                .unwrap();
        assert_eq!(entry.request_type, RequestType::SyncRequest);
        assert_eq!(entry.grain, Grain::HourlyGrain);
        assert_eq!(entry.days, 3);
    }

    #[test]
    fn unknown_grain_is_rejected() {
        let parsed = serde_json::from_str::<PolicyEntry>(
            r#"{"requestType":"SyncRequest","grain":"WeeklyGrain","days":3}"#,
        );
        assert!(parsed.is_err());
    }
}
