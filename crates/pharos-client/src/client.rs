//! The failover client: bounded retry and reselection over the fleet.
//!
//! One logical operation runs an explicit loop of SELECT then REQUEST, with
//! two budgets driving it: a per-endpoint retry budget for transient failures
//! and stale responses, and a separate cross-endpoint budget for not-found
//! responses. The two exist because failures have different likely causes: a
//! network blip warrants retrying the same node, repeated failure or
//! staleness warrants abandoning it, and a 404 is ambiguous between "this
//! node has not indexed the data yet" and "the data never existed" until a
//! few different nodes agree.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use pharos_common::{PharosError, RequestDescriptor, Result};

use crate::config::ClientConfig;
use crate::hooks::{Anonymous, FleetStatus, IdentityProvider, LogObserver, NeverRegressed, RequestObserver};
use crate::http::{HttpRequestClient, RequestExecutor};
use crate::prober::{HealthProber, HttpHealthProber};
use crate::selector::EndpointSelector;

/// Per-call counters. Reset at the start of every logical operation, never
/// shared across operations.
#[derive(Debug, Default)]
struct RetryContext {
    attempted_retries: u32,
    not_found_count: u32,
}

/// Client for a fleet of interchangeable indexing nodes.
///
/// Callers see one of three outcomes from [`perform`](Self::perform):
/// - `Ok(Some(data))`: a fresh response from a healthy node;
/// - `Ok(None)`: the client tried reasonably hard and found no usable data
///   (genuine 404, persistent staleness, or retries exhausted);
/// - `Err(_)`: total infrastructure unavailability (no endpoint reachable
///   at the outset) or a malformed request.
pub struct PharosClient {
    selector: Arc<EndpointSelector>,
    executor: Arc<dyn RequestExecutor>,
    fleet: Arc<dyn FleetStatus>,
    retry_budget: u32,
    max_requests_for_true_404: u32,
}

impl PharosClient {
    /// Creates a client with HTTP prober and executor and default hooks.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_hooks(
            config,
            None,
            Arc::new(NeverRegressed),
            Arc::new(Anonymous),
            Arc::new(LogObserver),
        )
    }

    /// Creates a client with custom collaborators.
    ///
    /// `prober` defaults to the HTTP prober when `None`. The observer and
    /// identity provider are threaded into the HTTP executor; the fleet
    /// status provider is consulted once per successful response to decide
    /// whether staleness may trigger failover.
    pub fn with_hooks(
        config: ClientConfig,
        prober: Option<Arc<dyn HealthProber>>,
        fleet: Arc<dyn FleetStatus>,
        identity: Arc<dyn IdentityProvider>,
        observer: Arc<dyn RequestObserver>,
    ) -> Self {
        let prober = prober
            .unwrap_or_else(|| Arc::new(HttpHealthProber::new(config.selection_request_timeout)));
        let executor = Arc::new(HttpRequestClient::new(
            config.selection_request_timeout,
            identity,
            observer,
        ));
        Self::assemble(config, prober, executor, fleet)
    }

    /// Fully custom assembly, used by tests to script request outcomes.
    pub fn with_executor(
        config: ClientConfig,
        prober: Arc<dyn HealthProber>,
        executor: Arc<dyn RequestExecutor>,
        fleet: Arc<dyn FleetStatus>,
    ) -> Self {
        Self::assemble(config, prober, executor, fleet)
    }

    fn assemble(
        config: ClientConfig,
        prober: Arc<dyn HealthProber>,
        executor: Arc<dyn RequestExecutor>,
        fleet: Arc<dyn FleetStatus>,
    ) -> Self {
        let selector = Arc::new(EndpointSelector::new(&config, prober));
        Self {
            selector,
            executor,
            fleet,
            retry_budget: config.selection_request_retries,
            max_requests_for_true_404: config.max_requests_for_true_404,
        }
    }

    /// The selector, for endpoint administration and fleet inspection.
    pub fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    /// Convenience GET without query parameters.
    pub async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.perform(RequestDescriptor::get(path)).await
    }

    /// Convenience GET with query parameters.
    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut descriptor = RequestDescriptor::get(path);
        for (key, value) in query {
            descriptor = descriptor.with_query(*key, *value);
        }
        self.perform(descriptor).await
    }

    /// Runs one logical request through selection, execution, validation and
    /// bounded retry.
    ///
    /// The loop terminates after at most
    /// `endpoints × (selection_request_retries + 2)` attempts: every time the
    /// per-endpoint budget is exceeded the current endpoint lands in the
    /// unhealthy set and the candidate pool shrinks.
    pub async fn perform(&self, descriptor: RequestDescriptor) -> Result<Option<Value>> {
        descriptor.validate()?;

        let mut ctx = RetryContext::default();
        let mut last_endpoint: Option<String> = None;
        let mut requests_issued: u32 = 0;

        loop {
            // SELECTING
            let endpoint = match self.selector.select(ctx.attempted_retries).await {
                Ok(endpoint) => endpoint,
                Err(PharosError::AllEndpointsUnhealthy) if requests_issued > 0 => {
                    // we already talked to someone; failing over found nobody
                    // better, so resolve to "no usable data" rather than error
                    warn!("No alternative endpoint available, giving up");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            if last_endpoint.as_deref() != Some(endpoint.as_str()) {
                // fresh endpoint, fresh per-endpoint budget
                ctx.attempted_retries = 0;
                last_endpoint = Some(endpoint.clone());
            }

            // REQUESTING
            requests_issued += 1;
            match self.executor.perform(&descriptor, &endpoint).await {
                Ok(envelope) => {
                    let regressed = self.fleet.is_regressed().await;
                    let policy = self.selector.staleness_policy().await;
                    if policy.is_stale(&envelope.health, regressed) {
                        debug!(
                            "Stale response from {} (block lag {:?}, slot lag {:?})",
                            endpoint,
                            envelope.health.block_lag(),
                            envelope.health.slot_lag()
                        );
                        if ctx.attempted_retries <= self.retry_budget {
                            ctx.attempted_retries += 1;
                            continue;
                        }
                        return Ok(None);
                    }
                    return Ok(Some(envelope.data));
                }
                Err(PharosError::NotFound) => {
                    ctx.not_found_count += 1;
                    if ctx.not_found_count > self.max_requests_for_true_404 {
                        debug!(
                            "{} endpoints returned not-found, accepting genuine absence",
                            ctx.not_found_count
                        );
                        ctx.not_found_count = 0;
                        return Ok(None);
                    }
                    // a lagging node may 404 on data it has not indexed yet;
                    // push the counter past the budget to force a different node
                    ctx.attempted_retries = self.retry_budget + 1;
                    continue;
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Request to {} failed (attempt {}): {}",
                        endpoint,
                        ctx.attempted_retries + 1,
                        e
                    );
                    if ctx.attempted_retries <= self.retry_budget {
                        ctx.attempted_retries += 1;
                        continue;
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
