use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use pharos_common::{EndpointHealth, HealthReport, PharosError, Result};

use crate::http::build_url;

/// Path of the verbose health check every fleet node exposes.
pub const HEALTH_CHECK_PATH: &str = "health_check/verbose";

/// Probes one endpoint for its current health.
///
/// Probing is infallible by contract: any network, timeout, or parse failure
/// collapses into an unreachable [`EndpointHealth`], never an error. The
/// selector treats unreachable candidates as lowest-ranked rather than
/// aborting a selection round over one bad node.
#[async_trait]
pub trait HealthProber: Send + Sync {
    async fn probe(&self, endpoint: &str) -> EndpointHealth;
}

/// HTTP prober issuing `GET {endpoint}/health_check/verbose`.
pub struct HttpHealthProber {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpHealthProber {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    async fn fetch_report(&self, endpoint: &str) -> Result<HealthReport> {
        let url = build_url(endpoint, HEALTH_CHECK_PATH, &[])?;

        let request = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(url.as_str())
            .body(Full::new(Bytes::new()))
            .map_err(|e| PharosError::Transport(format!("failed to build probe request: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| PharosError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| PharosError::Transport(format!("probe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PharosError::Http {
                status: status.as_u16(),
                body: "health check failed".to_string(),
            });
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| PharosError::Transport(format!("failed to read probe response: {}", e)))?
            .to_bytes();

        serde_json::from_slice(&body)
            .map_err(|e| PharosError::Transport(format!("malformed health report: {}", e)))
    }
}

#[async_trait]
impl HealthProber for HttpHealthProber {
    async fn probe(&self, endpoint: &str) -> EndpointHealth {
        match self.fetch_report(endpoint).await {
            Ok(report) => EndpointHealth::from_report(endpoint, &report),
            Err(e) => {
                debug!("Probe of {} failed: {}", endpoint, e);
                EndpointHealth::unreachable(endpoint)
            }
        }
    }
}
