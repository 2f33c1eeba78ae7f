//! Fake remote service over real HTTP.
//!
//! Serves the cube list, cube documents and a fixed query response on a
//! loopback port so the HTTP client can be exercised end to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::{Value, json};

#[derive(Debug, Default)]
struct Served {
    cubes: Vec<String>,
    documents: HashMap<String, Value>,
    response: Option<Value>,
    posted: Vec<Value>,
}

/// Handle to a running fake remote.
#[derive(Debug, Clone)]
pub struct FakeRemoteServer {
    addr: SocketAddr,
    served: Arc<Mutex<Served>>,
}

impl FakeRemoteServer {
    /// Binds to an ephemeral loopback port and starts serving the test
    /// registry paths from [`crate::registry_spec`].
    pub async fn start() -> Self {
        let served = Arc::new(Mutex::new(Served::default()));
        let app = Router::new()
            .route("/reporting_ws/api/v2/async/flattenDomain/", get(domain))
            .route(
                "/reporting_ws/api/v2/async/flattenDomain/cubes/:name/:version",
                get(cube),
            )
            .route("/reporting_ws/api/v2/schemas/reporting/irsync", post(sync))
            .with_state(Arc::clone(&served));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, served }
    }

    /// Host the server listens on.
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Serves a cube document and lists the cube.
    pub fn serve_cube(&self, name: &str, document: Value) {
        let mut served = self.served.lock().expect("served lock");
        if !served.cubes.iter().any(|c| c == name) {
            served.cubes.push(name.to_string());
        }
        served.documents.insert(name.to_string(), document);
    }

    /// Sets the body returned by the sync endpoint.
    pub fn set_response(&self, response: Value) {
        self.served.lock().expect("served lock").response = Some(response);
    }

    /// Documents posted to the sync endpoint, in order.
    pub fn posted(&self) -> Vec<Value> {
        self.served.lock().expect("served lock").posted.clone()
    }
}

async fn domain(State(served): State<Arc<Mutex<Served>>>) -> axum::Json<Value> {
    let cubes = served.lock().expect("served lock").cubes.clone();
    axum::Json(json!({"schemas": {"reporting": cubes}}))
}

async fn cube(
    State(served): State<Arc<Mutex<Served>>>,
    Path((name, _version)): Path<(String, u32)>,
) -> Result<axum::Json<Value>, StatusCode> {
    served
        .lock()
        .expect("served lock")
        .documents
        .get(&name)
        .cloned()
        .map(axum::Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn sync(
    State(served): State<Arc<Mutex<Served>>>,
    axum::Json(body): axum::Json<Value>,
) -> Result<axum::Json<Value>, StatusCode> {
    let mut served = served.lock().expect("served lock");
    served.posted.push(body);
    served
        .response
        .clone()
        .map(axum::Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}
