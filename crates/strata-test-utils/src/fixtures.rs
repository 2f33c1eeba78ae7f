//! Pre-built catalog and remote fixtures.

use std::sync::Arc;

use serde_json::{Value, json};

use strata_catalog::{Catalog, CubeId, RegistryId, RegistrySpec};
use strata_core::Config;
use strata_remote::{CubeDocument, QueryResponse};

use crate::remote::MockRemote;

/// Registry definition pointing at `host:port` with the standard test paths.
pub fn registry_spec(name: &str, host: &str, port: u16) -> RegistrySpec {
    RegistrySpec {
        name: name.to_string(),
        host: host.to_string(),
        port,
        base_path: "reporting_ws/api/v2".to_string(),
        domain_endpoint: "async/flattenDomain".to_string(),
        sync_request_endpoint: "schemas/reporting/irsync".to_string(),
        exposed_schema: "reporting".to_string(),
        allow_list: None,
        deny_list: None,
        cache_timeout: None,
    }
}

/// Catalog, scripted remote and configuration shared by one test.
pub struct TestContext {
    /// Catalog under test.
    pub catalog: Arc<Catalog>,
    /// Scripted remote.
    pub remote: Arc<MockRemote>,
    /// Configuration.
    pub config: Config,
}

impl TestContext {
    /// Creates an empty catalog and remote with default configuration.
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(Catalog::new()),
            remote: Arc::new(MockRemote::new()),
            config: Config::default(),
        }
    }

    /// Inserts a registry with no cube lists set.
    pub fn add_registry(&self, name: &str) -> RegistryId {
        self.add_registry_spec(registry_spec(name, "remote.test", 4080))
    }

    /// Inserts a registry from a full definition.
    pub fn add_registry_spec(&self, spec: RegistrySpec) -> RegistryId {
        self.catalog
            .transaction(|t| t.insert_registry(spec))
            .expect("insert registry")
    }

    /// Looks up a cube id by registry and name.
    pub fn cube_id(&self, registry: RegistryId, name: &str) -> Option<CubeId> {
        self.catalog
            .read(|t| t.find_cube(registry, name).map(|c| c.id))
            .expect("catalog read")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw JSON of a keyword-level cube with daily and hourly sync policies.
///
/// Sync policies: daily lookback 400 / window 366, hourly lookback 14 /
/// window 7. An async daily policy is present as well.
pub fn keyword_stats_json() -> Value {
    json!({
        "name": "keyword_stats",
        "mainEntityIds": {"advertiser": "Advertiser ID", "keyword": "Keyword ID"},
        "maxDaysLookBack": [
            {"requestType": "SyncRequest", "grain": "DailyGrain", "days": 400},
            {"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 14},
            {"requestType": "AsyncRequest", "grain": "DailyGrain", "days": 400}
        ],
        "maxDaysWindow": [
            {"requestType": "SyncRequest", "grain": "DailyGrain", "days": 366},
            {"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 7},
            {"requestType": "AsyncRequest", "grain": "DailyGrain", "days": 366}
        ],
        "fields": [
            {"field": "Day", "type": "Dimension", "dataType": {"type": "Date", "constraint": "YYYY-MM-dd"},
             "filterable": 1, "filterOperations": ["BETWEEN", "="]},
            {"field": "Hour", "type": "Dimension", "dataType": {"type": "String"}, "filterable": 1},
            {"field": "Advertiser ID", "type": "Dimension", "dataType": {"type": "Integer"}, "filterable": 1},
            {"field": "Keyword ID", "type": "Dimension", "dataType": {"type": "Integer"}, "filterable": 1},
            {"field": "Impressions", "type": "Fact", "dataType": {"type": "Integer"},
             "filterable": 1, "rollupExpression": "SumRollup"},
            {"field": "Clicks", "type": "Fact", "dataType": {"type": "Integer"},
             "filterable": 1, "rollupExpression": "SumRollup"},
            {"field": "Spend", "type": "Fact", "dataType": {"type": "Decimal"},
             "filterable": 1, "rollupExpression": "SumRollup"},
            {"field": "Average CPC", "type": "Fact", "dataType": {"type": "Decimal"},
             "filterable": 0, "rollupExpression": "NoopRollup"}
        ]
    })
}

/// Decoded [`keyword_stats_json`].
pub fn keyword_stats_document() -> CubeDocument {
    serde_json::from_value(keyword_stats_json()).expect("keyword_stats fixture")
}

/// A supply-side cube whose hourly policies declare a window but no lookback.
pub fn supply_stats_document() -> CubeDocument {
    serde_json::from_value(json!({
        "name": "supply_stats",
        "mainEntityIds": {"publisher": "Publisher ID", "publisher_ll": "Publisher ID"},
        "maxDaysLookBack": [
            {"requestType": "SyncRequest", "grain": "DailyGrain", "days": 30},
            {"requestType": "AsyncRequest", "grain": "DailyGrain", "days": 30}
        ],
        "maxDaysWindow": [
            {"requestType": "SyncRequest", "grain": "DailyGrain", "days": 20},
            {"requestType": "AsyncRequest", "grain": "DailyGrain", "days": 20},
            {"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 20},
            {"requestType": "AsyncRequest", "grain": "HourlyGrain", "days": 20}
        ],
        "fields": [
            {"field": "Country ISO Code", "type": "Dimension", "dataType": {"type": "String"}, "filterable": 1},
            {"field": "Day", "type": "Dimension", "dataType": {"type": "Date"}, "filterable": 1},
            {"field": "Ad Requests", "type": "Fact", "dataType": {"type": "Integer"}, "filterable": 1}
        ]
    }))
    .expect("supply_stats fixture")
}

/// A cube document with only the given facts and no policy arrays.
pub fn facts_only_document(name: &str, facts: &[&str]) -> CubeDocument {
    let fields: Vec<Value> = facts
        .iter()
        .map(|f| json!({"field": f, "type": "Fact", "dataType": {"type": "Integer"}, "filterable": 1}))
        .collect();
    serde_json::from_value(json!({"name": name, "mainEntityIds": {}, "fields": fields}))
        .expect("facts-only fixture")
}

/// A query response with the given header and rows.
pub fn query_response(fields: &[&str], rows: Vec<Vec<Value>>) -> QueryResponse {
    let fields: Vec<Value> = fields.iter().map(|f| json!({"fieldName": f})).collect();
    serde_json::from_value(json!({"header": {"fields": fields}, "rows": rows}))
        .expect("query response fixture")
}
