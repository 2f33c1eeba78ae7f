//! Column rows and their aggregation-capability flags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{ColumnId, CubeId};

/// Role of a column in its cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Grouping attribute.
    Dimension,
    /// Measured value; doubles as an identity metric.
    Fact,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimension => f.write_str("Dimension"),
            Self::Fact => f.write_str("Fact"),
        }
    }
}

/// Aggregations a column supports.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationFlags {
    /// Usable as a group-by field.
    pub groupby: bool,
    /// Supports `SUM`.
    pub sum: bool,
    /// Supports `MIN`.
    pub min: bool,
    /// Supports `MAX`.
    pub max: bool,
    /// Supports `COUNT(DISTINCT ..)`.
    pub count_distinct: bool,
}

/// One field of a cube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Surrogate id.
    pub id: ColumnId,
    /// Owning cube.
    pub cube_id: CubeId,
    /// Column name, unique within its cube.
    pub name: String,
    /// Dimension or fact.
    pub kind: ColumnKind,
    /// Remote data type, e.g. `Integer` or `Decimal`.
    pub data_type: String,
    /// Whether the remote service accepts filters on this column.
    pub filterable: bool,
    /// Aggregation capabilities.
    pub flags: AggregationFlags,
}

impl Column {
    /// Re-establishes the `Dimension` implies `groupby` rule.
    pub(crate) fn normalize(&mut self) {
        if self.kind == ColumnKind::Dimension {
            self.flags.groupby = true;
        }
    }

    /// Whether the column is a fact.
    #[must_use]
    pub fn is_fact(&self) -> bool {
        self.kind == ColumnKind::Fact
    }
}

/// Remote facts about a column, applied by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnUpdate {
    /// Column name.
    pub name: String,
    /// Dimension or fact.
    pub kind: ColumnKind,
    /// Remote data type.
    pub data_type: String,
    /// Whether filters are accepted.
    pub filterable: bool,
    /// Capabilities the remote declares. Only `true` values are applied;
    /// capabilities enabled earlier are never switched off by an upsert.
    pub declared: AggregationFlags,
}
