//! Typed request and response documents exchanged with the remote service.
//!
//! Every document the service sends is decoded into one of these structs at
//! the boundary. Unknown tags in closed vocabularies (`type`, `requestType`,
//! `grain`) fail decoding instead of being carried inward as strings.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use strata_catalog::{AggregationFlags, ColumnKind, ColumnUpdate, PolicyEntry};

// ----------------------------------------------------------------------
// Cube list
// ----------------------------------------------------------------------

/// `GET {domain_url}` response: cube names grouped by schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainDocument {
    /// Cube names per schema.
    pub schemas: BTreeMap<String, Vec<String>>,
}

impl DomainDocument {
    /// Cube names listed under `schema`.
    #[must_use]
    pub fn cubes(&self, schema: &str) -> Option<&[String]> {
        self.schemas.get(schema).map(Vec::as_slice)
    }
}

// ----------------------------------------------------------------------
// Cube metadata
// ----------------------------------------------------------------------

/// `GET {cube_url}` response: a cube's fields and policy windows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeDocument {
    /// Cube name, when the service echoes it.
    #[serde(default)]
    pub name: Option<String>,
    /// Field descriptors.
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
    /// Keys of the `mainEntityIds` object, in document order.
    #[serde(default, deserialize_with = "object_keys_in_order")]
    pub main_entity_ids: Vec<String>,
    /// `maxDaysLookBack` entries; `None` when the key is absent.
    #[serde(default)]
    pub max_days_look_back: Option<Vec<PolicyEntry>>,
    /// `maxDaysWindow` entries; `None` when the key is absent.
    #[serde(default)]
    pub max_days_window: Option<Vec<PolicyEntry>>,
}

impl CubeDocument {
    /// Names of all fields, in document order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.field.clone()).collect()
    }
}

/// One field of a cube document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDocument {
    /// Field name.
    pub field: String,
    /// `Dimension` or `Fact`.
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    /// Data type descriptor.
    #[serde(default)]
    pub data_type: Option<DataTypeDocument>,
    /// Accepts `true`/`false` or `1`/`0`.
    #[serde(default, deserialize_with = "bool_or_bit")]
    pub filterable: bool,
    /// Rollup declared by the service, usually a string such as `SumRollup`.
    #[serde(default)]
    pub rollup_expression: Option<Value>,
}

/// `dataType` object of a field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataTypeDocument {
    /// Type name, e.g. `Integer`, `Decimal`, `String`.
    #[serde(rename = "type")]
    pub name: String,
}

/// Rollup kinds that map onto column capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollup {
    /// `SumRollup`.
    Sum,
    /// `MaxRollup`.
    Max,
    /// `MinRollup`.
    Min,
    /// Any other rollup; recorded but grants no capability.
    Other(String),
}

impl FieldDocument {
    /// Classifies the declared rollup, if any.
    #[must_use]
    pub fn rollup(&self) -> Option<Rollup> {
        let raw = match self.rollup_expression.as_ref()? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some(match raw.as_str() {
            "SumRollup" => Rollup::Sum,
            "MaxRollup" => Rollup::Max,
            "MinRollup" => Rollup::Min,
            _ => Rollup::Other(raw),
        })
    }

    /// Capabilities the field declares.
    #[must_use]
    pub fn declared_flags(&self) -> AggregationFlags {
        let rollup = self.rollup();
        AggregationFlags {
            groupby: self.kind == ColumnKind::Dimension,
            sum: rollup == Some(Rollup::Sum),
            max: rollup == Some(Rollup::Max),
            min: rollup == Some(Rollup::Min),
            count_distinct: false,
        }
    }

    /// The catalog upsert this field implies.
    #[must_use]
    pub fn to_column_update(&self) -> ColumnUpdate {
        ColumnUpdate {
            name: self.field.clone(),
            kind: self.kind,
            data_type: self
                .data_type
                .as_ref()
                .map(|d| d.name.clone())
                .unwrap_or_default(),
            filterable: self.filterable,
            declared: self.declared_flags(),
        }
    }
}

fn bool_or_bit<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(de::Error::custom(format!(
            "expected a boolean or 0/1, got {other}"
        ))),
    }
}

fn object_keys_in_order<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeysVisitor;

    impl<'de> Visitor<'de> for KeysVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object or null")
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut keys = Vec::new();
            while let Some((key, IgnoredAny)) = map.next_entry::<String, IgnoredAny>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_any(KeysVisitor)
}

// ----------------------------------------------------------------------
// Compiled query
// ----------------------------------------------------------------------

/// A literal filter value. Numbers are kept as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Numeric literal.
    Number(serde_json::Number),
    /// Text literal.
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// One entry of `filterExpressions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpression {
    /// `{"field", "operator", "from", "to"}`.
    Range {
        /// Filtered field.
        field: String,
        /// Always `between`.
        operator: String,
        /// Lower bound, inclusive.
        from: String,
        /// Upper bound, inclusive.
        to: String,
    },
    /// `{"field", "operator", "values"}`.
    Values {
        /// Filtered field.
        field: String,
        /// Operator as supplied by the caller, e.g. `in`, `not in`, `==`.
        operator: String,
        /// Operand values.
        values: Vec<FilterValue>,
    },
}

impl FilterExpression {
    /// A `between` filter.
    #[must_use]
    pub fn between(field: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Range {
            field: field.into(),
            operator: "between".to_string(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// The filtered field.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Range { field, .. } | Self::Values { field, .. } => field,
        }
    }
}

/// One entry of `selectFields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectField {
    /// Selected field name.
    pub field: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending.
    #[serde(rename = "ASC")]
    Asc,
    /// Descending.
    #[serde(rename = "DESC")]
    Desc,
}

/// One entry of `ordering`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    /// Sorted field.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

/// The compiled request document posted to the sync endpoint.
///
/// Field order is part of the contract; consumers compare serialized
/// documents verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDocument {
    /// Cube name.
    pub cube: String,
    /// Filters, in injection order.
    pub filter_expressions: Vec<FilterExpression>,
    /// Selected fields, in injection order.
    pub select_fields: Vec<SelectField>,
    /// Maximum rows.
    pub mr: u32,
    /// Start index.
    pub si: u32,
    /// Sort keys.
    pub ordering: Vec<Ordering>,
}

impl QueryDocument {
    /// Selected field names, in order.
    pub fn select_field_names(&self) -> impl Iterator<Item = &str> {
        self.select_fields.iter().map(|f| f.field.as_str())
    }

    /// Whether `field` is selected.
    #[must_use]
    pub fn selects(&self, field: &str) -> bool {
        self.select_field_names().any(|f| f == field)
    }

    /// Serialized JSON text of the document.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------
// Query result
// ----------------------------------------------------------------------

/// Successful query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Column header.
    pub header: ResponseHeader,
    /// Row values, positionally aligned with `header.fields`.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// `header` object of a query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    /// Returned columns.
    pub fields: Vec<ResponseField>,
}

/// One returned column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseField {
    /// Column name.
    #[serde(rename = "fieldName")]
    pub field_name: String,
}

impl QueryResponse {
    /// Column names, in order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.header
            .fields
            .iter()
            .map(|f| f.field_name.clone())
            .collect()
    }

    /// Checks that every row has one value per column.
    ///
    /// # Errors
    ///
    /// Returns a description of the first misaligned row.
    pub fn check_shape(&self) -> std::result::Result<(), String> {
        let width = self.header.fields.len();
        match self.rows.iter().position(|row| row.len() != width) {
            Some(index) => Err(format!(
                "row {index} has {} values but the header names {width} fields",
                self.rows[index].len()
            )),
            None => Ok(()),
        }
    }
}

/// Body of a failed query response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFailure {
    /// Status tag.
    #[serde(default)]
    pub status: Option<Value>,
    /// Detail accompanying `status`.
    #[serde(default)]
    pub detailed_message: Option<String>,
    /// Alternative error field.
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl RemoteFailure {
    /// Human-readable summary of the failure.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(status) = &self.status {
            let status = match status {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let detail = self.detailed_message.as_deref().unwrap_or("Empty");
            format!("Response status: {status}, Message: {detail}")
        } else if let Some(message) = &self.error_msg {
            format!("Response status: ERROR, Message: {message}")
        } else {
            "Response status: ERROR, Message: Empty".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_catalog::{Grain, RequestType};

    #[test]
    fn cube_document_decodes_remote_shape() {
        let doc: CubeDocument = serde_json::from_value(json!({
            "name": "supply_stats",
            "mainEntityIds": {"advertiser": "Advertiser ID"},
            "maxDaysLookBack": [{"requestType": "SyncRequest", "grain": "DailyGrain", "days": 30}],
            "maxDaysWindow": [{"requestType": "AsyncRequest", "grain": "HourlyGrain", "days": 20}],
            "fields": [
                {"field": "Country", "type": "Dimension", "dataType": {"type": "String", "constraint": "null"},
                 "filterable": 1, "filterOperations": ["IN"]},
                {"field": "Spend", "type": "Fact", "dataType": {"type": "Decimal"},
                 "filterable": false, "rollupExpression": "SumRollup"}
            ]
        }))
        .unwrap();

        assert_eq!(doc.main_entity_ids, vec!["advertiser"]);
        let lookback = doc.max_days_look_back.as_ref().unwrap();
        assert_eq!(lookback[0].grain, Grain::DailyGrain);
        assert_eq!(
            doc.max_days_window.as_ref().unwrap()[0].request_type,
            RequestType::AsyncRequest
        );
        assert!(doc.fields[0].filterable);
        assert!(doc.fields[0].declared_flags().groupby);
        let spend = doc.fields[1].to_column_update();
        assert!(spend.declared.sum);
        assert_eq!(spend.data_type, "Decimal");
    }

    #[test]
    fn entity_keys_keep_wire_order() {
        let doc: CubeDocument = serde_json::from_str(
            r#"{"mainEntityIds": {"publisher": "Publisher ID", "advertiser": "Advertiser ID"}, "fields": []}"#,
        )
        .unwrap();
        assert_eq!(doc.main_entity_ids, vec!["publisher", "advertiser"]);
        assert!(doc.max_days_look_back.is_none());
    }

    #[test]
    fn unknown_field_type_is_rejected() {
        let parsed = serde_json::from_value::<CubeDocument>(json!({
            "fields": [{"field": "Spend", "type": "Measure", "filterable": true}]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn filterable_rejects_other_integers() {
        let parsed = serde_json::from_value::<FieldDocument>(json!({
            "field": "Spend", "type": "Fact", "filterable": 2
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn rollups_map_to_capabilities() {
        let field = |rollup: Value| FieldDocument {
            field: "Spend".to_string(),
            kind: ColumnKind::Fact,
            data_type: None,
            filterable: true,
            rollup_expression: Some(rollup),
        };
        assert!(field(json!("MaxRollup")).declared_flags().max);
        assert!(field(json!("MinRollup")).declared_flags().min);
        let other = field(json!({"custom": "x"}));
        assert!(matches!(other.rollup(), Some(Rollup::Other(_))));
        assert_eq!(other.declared_flags(), AggregationFlags::default());
    }

    #[test]
    fn compiled_document_keeps_field_order() {
        let doc = QueryDocument {
            cube: "keyword_stats".to_string(),
            filter_expressions: vec![
                FilterExpression::Values {
                    field: "Advertiser ID".to_string(),
                    operator: "in".to_string(),
                    values: vec![FilterValue::from(12_i64), FilterValue::from("34")],
                },
                FilterExpression::between("Day", "2017-08-06", "2017-08-07"),
            ],
            select_fields: vec![SelectField {
                field: "Day".to_string(),
            }],
            mr: 200,
            si: 0,
            ordering: vec![Ordering {
                field: "Clicks".to_string(),
                order: SortOrder::Desc,
            }],
        };
        assert_eq!(
            doc.to_json(),
            concat!(
                r#"{"cube":"keyword_stats","filterExpressions":["#,
                r#"{"field":"Advertiser ID","operator":"in","values":[12,"34"]},"#,
                r#"{"field":"Day","operator":"between","from":"2017-08-06","to":"2017-08-07"}],"#,
                r#""selectFields":[{"field":"Day"}],"mr":200,"si":0,"#,
                r#""ordering":[{"field":"Clicks","order":"DESC"}]}"#
            )
        );
    }

    #[test]
    fn response_shape_is_checked() {
        let response: QueryResponse = serde_json::from_value(json!({
            "header": {"cube": "k", "fields": [{"fieldName": "Day", "fieldType": "DIM"}, {"fieldName": "Clicks"}], "maxRows": 200},
            "rows": [["20160708", 3], ["20160709"]]
        }))
        .unwrap();
        assert_eq!(response.field_names(), vec!["Day", "Clicks"]);
        assert!(response.check_shape().unwrap_err().contains("row 1"));
    }

    #[test]
    fn failure_bodies_describe_themselves() {
        let with_status: RemoteFailure =
            serde_json::from_value(json!({"status": "FAILED", "detailedMessage": "bad cube"})).unwrap();
        assert_eq!(with_status.describe(), "Response status: FAILED, Message: bad cube");
        let with_msg: RemoteFailure = serde_json::from_value(json!({"errorMsg": "boom"})).unwrap();
        assert_eq!(with_msg.describe(), "Response status: ERROR, Message: boom");
        assert_eq!(RemoteFailure::default().describe(), "Response status: ERROR, Message: Empty");
    }
}
