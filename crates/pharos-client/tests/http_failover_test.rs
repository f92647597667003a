//! HTTP Failover Integration Tests
//!
//! Exercises the full client stack (HTTP prober, selector, executor, retry
//! loop) against mock fleet nodes.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use pharos_client::{
    Anonymous, BoxError, ClientConfig, IdentityProvider, LogObserver, NeverRegressed,
    PharosClient, RequestObserver, RequestRecord,
};
use pharos_common::PharosError;

// ============================================================================
// Mock Fleet Node
// ============================================================================

struct NodeState {
    label: String,
    version: String,
    chain_block: AtomicU64,
    /// Block lag reported by the health check.
    probe_lag: AtomicU64,
    /// Block lag reported in data-response envelopes (a node can look fresh
    /// to the prober while serving from a lagging index).
    envelope_lag: AtomicU64,
    not_found: AtomicBool,
    data_hits: AtomicUsize,
    seen_user_ids: Mutex<Vec<Option<String>>>,
    seen_request_ids: Mutex<Vec<Option<String>>>,
}

struct MockFleetNode {
    endpoint: String,
    state: Arc<NodeState>,
    _handle: tokio::task::JoinHandle<()>,
}

async fn handle_health(State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    let chain = state.chain_block.load(Ordering::SeqCst);
    let lag = state.probe_lag.load(Ordering::SeqCst);
    Json(json!({
        "latest_indexed_block": chain.saturating_sub(lag),
        "latest_chain_block": chain,
        "version": state.version,
    }))
}

async fn handle_item(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.data_hits.fetch_add(1, Ordering::SeqCst);
    let header_value =
        |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(|v| v.to_string());
    state.seen_user_ids.lock().unwrap().push(header_value("x-user-id"));
    state.seen_request_ids.lock().unwrap().push(header_value("x-request-id"));

    if state.not_found.load(Ordering::SeqCst) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let chain = state.chain_block.load(Ordering::SeqCst);
    let lag = state.envelope_lag.load(Ordering::SeqCst);
    Json(json!({
        "data": {"node": state.label},
        "latest_indexed_block": chain.saturating_sub(lag),
        "latest_chain_block": chain,
        "signer": "0xsigner",
        "signature": "0xsignature",
    }))
    .into_response()
}

impl MockFleetNode {
    async fn spawn(label: &str, version: &str) -> Self {
        let state = Arc::new(NodeState {
            label: label.to_string(),
            version: version.to_string(),
            chain_block: AtomicU64::new(10_000),
            probe_lag: AtomicU64::new(0),
            envelope_lag: AtomicU64::new(0),
            not_found: AtomicBool::new(false),
            data_hits: AtomicUsize::new(0),
            seen_user_ids: Mutex::new(Vec::new()),
            seen_request_ids: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/health_check/verbose", get(handle_health))
            .route("/v1/item", get(handle_item))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock node");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        // give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            endpoint: format!("http://{}", addr),
            state,
            _handle: handle,
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn set_probe_lag(&self, lag: u64) {
        self.state.probe_lag.store(lag, Ordering::SeqCst);
    }

    fn set_envelope_lag(&self, lag: u64) {
        self.state.envelope_lag.store(lag, Ordering::SeqCst);
    }

    fn set_not_found(&self, not_found: bool) {
        self.state.not_found.store(not_found, Ordering::SeqCst);
    }

    fn data_hits(&self) -> usize {
        self.state.data_hits.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config(endpoints: Vec<String>) -> ClientConfig {
    ClientConfig {
        selection_request_timeout: Duration::from_secs(2),
        selection_request_retries: 1,
        ..ClientConfig::new(endpoints)
    }
}

struct FixedIdentity(&'static str);

impl IdentityProvider for FixedIdentity {
    fn user_id(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

struct CollectingObserver {
    records: Mutex<Vec<RequestRecord>>,
}

impl CollectingObserver {
    fn new() -> Self {
        Self { records: Mutex::new(Vec::new()) }
    }

    fn records(&self) -> Vec<RequestRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RequestObserver for CollectingObserver {
    fn on_request(&self, record: &RequestRecord) -> Result<(), BoxError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct FailingObserver;

impl RequestObserver for FailingObserver {
    fn on_request(&self, _record: &RequestRecord) -> Result<(), BoxError> {
        Err("observer storage is down".into())
    }
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_selects_freshest_node() {
    let fresh = MockFleetNode::spawn("fresh", "1.0.0").await;
    let lagging = MockFleetNode::spawn("lagging", "1.0.0").await;
    lagging.set_probe_lag(1000);
    lagging.set_envelope_lag(1000);
    // nothing listens here
    let down_endpoint = "http://127.0.0.1:1".to_string();

    let client = PharosClient::new(test_config(vec![
        fresh.endpoint(),
        lagging.endpoint(),
        down_endpoint,
    ]));

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, Some(json!({"node": "fresh"})));
    assert_eq!(client.selector().current().await, Some(fresh.endpoint()));
    assert_eq!(lagging.data_hits(), 0);
}

#[tokio::test]
async fn test_all_nodes_down_is_a_terminal_error() {
    let client = PharosClient::new(test_config(vec![
        "http://127.0.0.1:1".to_string(),
        "http://127.0.0.1:2".to_string(),
    ]));

    let result = client.get("v1/item").await;
    assert!(matches!(result, Err(PharosError::AllEndpointsUnhealthy)));
}

// ============================================================================
// Staleness failover
// ============================================================================

#[tokio::test]
async fn test_stale_responses_fail_over_to_fresher_node() {
    // preferred looks fresh to the prober (newer version wins the tie) but
    // serves from a lagging index; backup serves fresh data
    let preferred = MockFleetNode::spawn("preferred", "2.0.0").await;
    preferred.set_envelope_lag(1000);
    let backup = MockFleetNode::spawn("backup", "1.0.0").await;

    let client = PharosClient::new(test_config(vec![
        preferred.endpoint(),
        backup.endpoint(),
    ]));

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, Some(json!({"node": "backup"})));
    // retry budget of 1: two attempts on the preferred node, then abandonment
    assert_eq!(preferred.data_hits(), 2);
    assert_eq!(backup.data_hits(), 1);
}

// ============================================================================
// Not-found handling
// ============================================================================

#[tokio::test]
async fn test_not_found_on_sole_node_resolves_null() {
    let node = MockFleetNode::spawn("only", "1.0.0").await;
    node.set_not_found(true);

    let client = PharosClient::new(test_config(vec![node.endpoint()]));

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, None);
    // one 404, then the forced reselection finds no other node
    assert_eq!(node.data_hits(), 1);
}

#[tokio::test]
async fn test_not_found_recovers_on_another_node() {
    let behind = MockFleetNode::spawn("behind", "2.0.0").await;
    behind.set_not_found(true);
    let caught_up = MockFleetNode::spawn("caught-up", "1.0.0").await;

    let client = PharosClient::new(test_config(vec![
        behind.endpoint(),
        caught_up.endpoint(),
    ]));

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, Some(json!({"node": "caught-up"})));
    assert_eq!(behind.data_hits(), 1);
}

// ============================================================================
// Headers and observability
// ============================================================================

#[tokio::test]
async fn test_identity_and_correlation_headers() {
    let node = MockFleetNode::spawn("node", "1.0.0").await;
    let observer = Arc::new(CollectingObserver::new());

    let client = PharosClient::with_hooks(
        test_config(vec![node.endpoint()]),
        None,
        Arc::new(NeverRegressed),
        Arc::new(FixedIdentity("user-123")),
        observer.clone(),
    );

    client.get_with_query("v1/item", &[("limit", "3")]).await.unwrap();
    client.get_with_query("v1/item", &[("limit", "3")]).await.unwrap();

    let user_ids = node.state.seen_user_ids.lock().unwrap().clone();
    assert_eq!(user_ids.len(), 2);
    assert!(user_ids.iter().all(|id| id.as_deref() == Some("user-123")));

    // correlation ids are present and fresh per request
    let request_ids = node.state.seen_request_ids.lock().unwrap().clone();
    assert_eq!(request_ids.len(), 2);
    assert!(request_ids.iter().all(|id| id.is_some()));
    assert_ne!(request_ids[0], request_ids[1]);

    let records = observer.records();
    assert_eq!(records.len(), 2);
    let record = &records[0];
    assert_eq!(record.endpoint, node.endpoint());
    assert_eq!(record.pathname, "/v1/item");
    assert_eq!(record.query_string, "?limit=3");
    assert_eq!(record.request_method, "GET");
    assert_eq!(record.status, 200);
    assert_eq!(record.signer.as_deref(), Some("0xsigner"));
    assert_eq!(record.signature.as_deref(), Some("0xsignature"));
}

#[tokio::test]
async fn test_observer_failure_never_affects_the_request() {
    let node = MockFleetNode::spawn("node", "1.0.0").await;

    let client = PharosClient::with_hooks(
        test_config(vec![node.endpoint()]),
        None,
        Arc::new(NeverRegressed),
        Arc::new(Anonymous),
        Arc::new(FailingObserver),
    );

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, Some(json!({"node": "node"})));
}

#[tokio::test]
async fn test_observer_sees_not_found_status() {
    let node = MockFleetNode::spawn("node", "1.0.0").await;
    node.set_not_found(true);
    let observer = Arc::new(CollectingObserver::new());

    let client = PharosClient::with_hooks(
        test_config(vec![node.endpoint()]),
        None,
        Arc::new(NeverRegressed),
        Arc::new(Anonymous),
        observer.clone(),
    );

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, None);

    let records = observer.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 404);
}

// ============================================================================
// Default observer
// ============================================================================

#[tokio::test]
async fn test_default_hooks_work_end_to_end() {
    let node = MockFleetNode::spawn("node", "1.0.0").await;

    let client = PharosClient::with_hooks(
        test_config(vec![node.endpoint()]),
        None,
        Arc::new(NeverRegressed),
        Arc::new(Anonymous),
        Arc::new(LogObserver),
    );

    let result = client.get("v1/item").await.unwrap();
    assert_eq!(result, Some(json!({"node": "node"})));
    // anonymous identity attaches no user header
    let user_ids = node.state.seen_user_ids.lock().unwrap().clone();
    assert_eq!(user_ids, vec![None]);
}
