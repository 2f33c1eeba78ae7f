//! Surrogate identifiers for catalog rows.
//!
//! Every table allocates its own monotonically increasing ids. Ids are never
//! reused within a catalog, even after the row is deleted, so a stale id held
//! by a caller can only ever miss, never alias a different row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use strata_core::{Error, Result};

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw id value.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw id value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                s.trim().parse::<u64>().map(Self).map_err(|e| {
                    Error::InvalidInput(format!(concat!("invalid ", $label, " id '{}': {}"), s, e))
                })
            }
        }
    };
}

surrogate_id!(
    /// Identifier of a registry row.
    RegistryId,
    "registry"
);
surrogate_id!(
    /// Identifier of a cube row.
    CubeId,
    "cube"
);
surrogate_id!(
    /// Identifier of a column row.
    ColumnId,
    "column"
);
surrogate_id!(
    /// Identifier of a metric row.
    MetricId,
    "metric"
);
surrogate_id!(
    /// Identifier of a lookback policy row.
    LookbackId,
    "lookback"
);

/// Per-table id allocators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequences {
    registry: u64,
    cube: u64,
    column: u64,
    metric: u64,
    lookback: u64,
}

impl IdSequences {
    /// Allocates the next registry id.
    pub fn next_registry(&mut self) -> RegistryId {
        self.registry += 1;
        RegistryId(self.registry)
    }

    /// Allocates the next cube id.
    pub fn next_cube(&mut self) -> CubeId {
        self.cube += 1;
        CubeId(self.cube)
    }

    /// Allocates the next column id.
    pub fn next_column(&mut self) -> ColumnId {
        self.column += 1;
        ColumnId(self.column)
    }

    /// Allocates the next metric id.
    pub fn next_metric(&mut self) -> MetricId {
        self.metric += 1;
        MetricId(self.metric)
    }

    /// Allocates the next lookback id.
    pub fn next_lookback(&mut self) -> LookbackId {
        self.lookback += 1;
        LookbackId(self.lookback)
    }
}
