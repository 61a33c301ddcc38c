//! Scripted HTTP server for exercising REST clients.
//!
//! Responses are queued per `(method, path, filter)`, where `filter` is the
//! request's `filter` query parameter (the granule index CQL). The last queued
//! response for a route keeps being served once the queue drains. Unscripted
//! routes answer 404. Every request is recorded.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::Router;

/// Path prefix the server is mounted under, like a servlet context.
const CONTEXT: &str = "/geoserver";

/// A request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path with the context prefix removed
    pub path: String,
    pub params: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Route = (String, String, Option<String>);

#[derive(Default)]
struct MockState {
    responses: HashMap<Route, VecDeque<(u16, Vec<u8>)>>,
    delays: HashMap<Route, Duration>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let path = uri
        .path()
        .strip_prefix(CONTEXT)
        .unwrap_or(uri.path())
        .to_string();
    let route = (method.to_string(), path.clone(), params.get("filter").cloned());

    let (status, response, delay) = {
        let mut state = lock(&state);
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            path,
            params,
            body: body.to_vec(),
        });
        let delay = state.delays.get(&route).copied();
        let (status, response) = match state.responses.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or((404, Vec::new())),
            Some(queue) => queue.front().cloned().unwrap_or((404, Vec::new())),
            None => (404, Vec::new()),
        };
        (status, response, delay)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response)
}

/// A running mock server bound to an ephemeral local port.
pub struct MockGeoServer {
    addr: SocketAddr,
    state: Shared,
}

impl MockGeoServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self { addr, state }
    }

    /// Base URL including the `/geoserver` context.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, CONTEXT)
    }

    /// Absolute URL for `path` under the context.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url(), path)
    }

    /// Queue a response for `method path` requests without a filter.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.queue((method.to_string(), path.to_string(), None), status, body.into());
    }

    /// Queue a response for `method path` requests carrying `filter`.
    pub fn respond_filtered(
        &self,
        method: &str,
        path: &str,
        filter: &str,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) {
        let route = (method.to_string(), path.to_string(), Some(filter.to_string()));
        self.queue(route, status, body.into());
    }

    fn queue(&self, route: Route, status: u16, body: Vec<u8>) {
        lock(&self.state)
            .responses
            .entry(route)
            .or_default()
            .push_back((status, body));
    }

    /// Hold unfiltered responses to `method path` for `delay`.
    pub fn delay(&self, method: &str, path: &str, delay: Duration) {
        lock(&self.state)
            .delays
            .insert((method.to_string(), path.to_string(), None), delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }
}
