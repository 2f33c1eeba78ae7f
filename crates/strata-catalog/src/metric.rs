//! Metric rows and the aggregation descriptors sent to the remote service.

use serde::{Deserialize, Serialize};

use crate::id::{CubeId, MetricId};

/// Kind of aggregation a metric performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// The fact column itself, aggregated remotely by its own rollup.
    Identity,
    /// `SUM(column)`.
    Sum,
    /// `MIN(column)`.
    Min,
    /// `MAX(column)`.
    Max,
    /// `COUNT(DISTINCT column)`.
    CountDistinct,
}

/// Serialized aggregation descriptor consumed by the remote service.
///
/// Variants are tried in declaration order when reading a stored descriptor,
/// so the most specific shape comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationExpression {
    /// `{"type": "cardinality", "name": .., "fieldNames": [..]}`.
    Cardinality {
        /// Always `cardinality`.
        #[serde(rename = "type")]
        kind: String,
        /// Output name.
        name: String,
        /// Counted columns.
        #[serde(rename = "fieldNames")]
        field_names: Vec<String>,
    },
    /// `{"type": "<datatype>Sum", "name": .., "fieldName": ..}` and the min/max forms.
    Typed {
        /// Type tag, e.g. `longSum`.
        #[serde(rename = "type")]
        kind: String,
        /// Output name.
        name: String,
        /// Source column.
        #[serde(rename = "fieldName")]
        field_name: String,
    },
    /// `{"name": .., "fieldName": ..}`.
    Identity {
        /// Output name.
        name: String,
        /// Source column.
        #[serde(rename = "fieldName")]
        field_name: String,
    },
}

impl AggregationExpression {
    /// Serializes the descriptor to its JSON text form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A named aggregation derived from one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Surrogate id.
    pub id: MetricId,
    /// Owning cube.
    pub cube_id: CubeId,
    /// Metric name, unique within its cube.
    pub name: String,
    /// Display name, e.g. `SUM(Spend)`.
    pub verbose_name: Option<String>,
    /// Aggregation kind.
    pub metric_type: MetricType,
    /// Descriptor sent to the remote service.
    pub expression: AggregationExpression,
}

/// A metric candidate before it is given an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetric {
    /// Metric name.
    pub name: String,
    /// Display name.
    pub verbose_name: Option<String>,
    /// Aggregation kind.
    pub metric_type: MetricType,
    /// Descriptor sent to the remote service.
    pub expression: AggregationExpression,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_serialize_in_remote_shape() {
        let sum = AggregationExpression::Typed {
            kind: "longSum".to_string(),
            name: "Clicks".to_string(),
            field_name: "Clicks".to_string(),
        };
        assert_eq!(
            sum.to_json(),
            r#"{"type":"longSum","name":"Clicks","fieldName":"Clicks"}"#
        );

        let identity = AggregationExpression::Identity {
            name: "Clicks".to_string(),
            field_name: "Clicks".to_string(),
        };
        assert_eq!(identity.to_json(), r#"{"name":"Clicks","fieldName":"Clicks"}"#);
    }

    #[test]
    fn stored_descriptors_read_back_as_the_same_shape() {
        let cardinality = AggregationExpression::Cardinality {
            kind: "cardinality".to_string(),
            name: "Advertiser ID".to_string(),
            field_names: vec!["Advertiser ID".to_string()],
        };
        let parsed: AggregationExpression =
            serde_json::from_str(&cardinality.to_json()).unwrap();
        assert_eq!(parsed, cardinality);

        let parsed: AggregationExpression =
            serde_json::from_str(r#"{"name":"Spend","fieldName":"Spend"}"#).unwrap();
        assert!(matches!(parsed, AggregationExpression::Identity { .. }));
    }
}
