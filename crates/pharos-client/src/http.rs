//! Request execution against a selected endpoint.
//!
//! Builds the concrete HTTP call from a [`RequestDescriptor`], attaches the
//! caller identity and a fresh correlation id, and classifies the outcome
//! into the error taxonomy the failover layer branches on. Every attempt,
//! success or failure, is reported to the configured [`RequestObserver`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::warn;
use url::Url;

use pharos_common::{Method, PharosError, RequestDescriptor, ResponseEnvelope, Result};

use crate::hooks::{IdentityProvider, RequestObserver, RequestRecord};

/// Correlation header attached to every application request.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Caller identity header, attached when the [`IdentityProvider`] supplies one.
pub const USER_ID_HEADER: &str = "X-User-ID";

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a fresh correlation id: millisecond timestamp plus a
/// process-wide counter, so concurrent requests in the same millisecond
/// still get distinct ids.
fn next_correlation_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let counter = CORRELATION_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{:x}-{:08x}", timestamp, counter)
}

/// Joins an endpoint base URL with an endpoint-relative path and query pairs.
pub fn build_url(endpoint: &str, path: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| PharosError::InvalidRequest(format!("invalid endpoint {}: {}", endpoint, e)))?;

    let joined = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Executes one descriptor against one endpoint.
///
/// A trait so the failover layer can be exercised against scripted outcomes;
/// production code uses [`HttpRequestClient`].
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn perform(
        &self,
        descriptor: &RequestDescriptor,
        endpoint: &str,
    ) -> Result<ResponseEnvelope>;
}

/// HTTP executor backed by a hyper client.
pub struct HttpRequestClient {
    client: Client<HttpConnector, Full<Bytes>>,
    default_timeout: Duration,
    identity: Arc<dyn IdentityProvider>,
    observer: Arc<dyn RequestObserver>,
}

impl HttpRequestClient {
    pub fn new(
        default_timeout: Duration,
        identity: Arc<dyn IdentityProvider>,
        observer: Arc<dyn RequestObserver>,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            default_timeout,
            identity,
            observer,
        }
    }

    /// Reports an attempt to the observer. Observer failures are logged and
    /// swallowed: no observability problem may affect a request's outcome.
    fn notify(
        &self,
        descriptor: &RequestDescriptor,
        endpoint: &str,
        url: &Url,
        status: u16,
        started: Instant,
        signer: Option<String>,
        signature: Option<String>,
    ) {
        let record = RequestRecord {
            endpoint: endpoint.to_string(),
            pathname: url.path().to_string(),
            query_string: url
                .query()
                .map(|q| format!("?{}", q))
                .unwrap_or_default(),
            request_method: descriptor.method.as_str().to_string(),
            status,
            response_time_millis: started.elapsed().as_millis() as u64,
            signer,
            signature,
        };
        if let Err(e) = self.observer.on_request(&record) {
            warn!("Request observer failed: {}", e);
        }
    }

    async fn execute(
        &self,
        request: hyper::Request<Full<Bytes>>,
        timeout: Duration,
    ) -> Result<(u16, Bytes)> {
        let response = tokio::time::timeout(timeout, self.client.request(request))
            .await
            .map_err(|_| PharosError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| PharosError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| PharosError::Transport(format!("failed to read response: {}", e)))?
            .to_bytes();
        Ok((status, body))
    }
}

#[async_trait]
impl RequestExecutor for HttpRequestClient {
    async fn perform(
        &self,
        descriptor: &RequestDescriptor,
        endpoint: &str,
    ) -> Result<ResponseEnvelope> {
        descriptor.validate()?;
        let url = build_url(endpoint, &descriptor.path, &descriptor.query)?;

        let method = match descriptor.method {
            Method::Get => hyper::Method::GET,
            Method::Post => hyper::Method::POST,
        };
        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(url.as_str())
            .header(REQUEST_ID_HEADER, next_correlation_id())
            .header(CONTENT_TYPE, "application/json");
        if let Some(user_id) = self.identity.user_id() {
            builder = builder.header(USER_ID_HEADER, user_id);
        }

        let body = match &descriptor.body {
            Some(value) => Bytes::from(serde_json::to_vec(value)?),
            None => Bytes::new(),
        };
        let request = builder
            .body(Full::new(body))
            .map_err(|e| PharosError::InvalidRequest(format!("failed to build request: {}", e)))?;

        let timeout = descriptor.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let (status, body) = match self.execute(request, timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // no HTTP response at all; report status 0
                self.notify(descriptor, endpoint, &url, 0, started, None, None);
                return Err(e);
            }
        };

        if status == 404 {
            self.notify(descriptor, endpoint, &url, status, started, None, None);
            return Err(PharosError::NotFound);
        }
        if !(200..300).contains(&status) {
            self.notify(descriptor, endpoint, &url, status, started, None, None);
            return Err(PharosError::Http {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        // a 2xx with an unparseable body is a misbehaving node, not a caller
        // error: classify as transport so the failover layer retries it
        let envelope: ResponseEnvelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.notify(descriptor, endpoint, &url, status, started, None, None);
                return Err(PharosError::Transport(format!("malformed response body: {}", e)));
            }
        };

        self.notify(
            descriptor,
            endpoint,
            &url,
            status,
            started,
            envelope.signer.clone(),
            envelope.signature.clone(),
        );
        Ok(envelope)
    }
}
