//! Endpoint selection over the candidate fleet.
//!
//! The selector owns the only shared mutable state in the client: the cached
//! endpoint, the unhealthy set, and the staleness thresholds. All mutation
//! funnels through its methods; callers are expected to serialize selections
//! for one logical session (the failover client never issues concurrent
//! `select` calls for the same operation).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use pharos_common::{EndpointHealth, PharosError, Result, StalenessPolicy};

use crate::config::ClientConfig;
use crate::prober::HealthProber;

struct SelectorInner {
    endpoints: Vec<String>,
    whitelist: Option<HashSet<String>>,
    blacklist: Option<HashSet<String>>,
    policy: StalenessPolicy,
    /// Currently cached selection, if any. Never a member of `unhealthy`.
    current: Option<String>,
    selected_at: Option<Instant>,
    /// Endpoints abandoned after exhausting their retry budget. Survives
    /// cache clears; only `reset_unhealthy` empties it.
    unhealthy: HashSet<String>,
    /// Verdicts from the most recent probe round, for display and debugging.
    last_round: Vec<EndpointHealth>,
}

impl SelectorInner {
    fn eligible(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .filter(|e| self.whitelist.as_ref().map_or(true, |w| w.contains(*e)))
            .filter(|e| self.blacklist.as_ref().map_or(true, |b| !b.contains(*e)))
            .filter(|e| !self.unhealthy.contains(*e))
            .cloned()
            .collect()
    }
}

/// Picks and caches the best endpoint of the fleet.
///
/// Selection probes every eligible candidate concurrently and ranks the
/// results with a deterministic comparator: reachable nodes first, then lower
/// block lag (a node that does not report block numbers ranks as worst-case),
/// then lower slot lag when the slot check is enabled, then higher reported
/// version, with the endpoint string as the final tiebreak. The winner is
/// cached until `reselect_timeout` elapses, it is marked unhealthy, or the
/// cache is cleared.
pub struct EndpointSelector {
    prober: Arc<dyn HealthProber>,
    reselect_timeout: Duration,
    retry_budget: u32,
    inner: Mutex<SelectorInner>,
}

impl EndpointSelector {
    pub fn new(config: &ClientConfig, prober: Arc<dyn HealthProber>) -> Self {
        Self {
            prober,
            reselect_timeout: config.reselect_timeout,
            retry_budget: config.selection_request_retries,
            inner: Mutex::new(SelectorInner {
                endpoints: config.endpoints.clone(),
                whitelist: config.whitelist.clone(),
                blacklist: config.blacklist.clone(),
                policy: config.staleness_policy(),
                current: None,
                selected_at: None,
                unhealthy: HashSet::new(),
                last_round: Vec::new(),
            }),
        }
    }

    /// Returns a healthy endpoint, reusing the cached selection while it is
    /// valid.
    ///
    /// `attempted_retries` is the caller's failure count against the current
    /// endpoint. Once it exceeds the retry budget the cached endpoint is
    /// abandoned (marked unhealthy, cache dropped) before selecting, which
    /// forces a fresh probe round. Passing a value past the budget is also
    /// how the failover layer requests a different node after a suspicious
    /// not-found.
    ///
    /// # Errors
    ///
    /// `AllEndpointsUnhealthy` when no candidate is eligible or none of the
    /// probed candidates is reachable. Individual probe failures never error;
    /// they rank the candidate last.
    pub async fn select(&self, attempted_retries: u32) -> Result<String> {
        let candidates = {
            let mut inner = self.inner.lock().await;

            if attempted_retries > self.retry_budget {
                if let Some(current) = inner.current.take() {
                    warn!(
                        "Retry budget exhausted against {}, marking unhealthy",
                        current
                    );
                    inner.unhealthy.insert(current);
                    inner.selected_at = None;
                }
            }

            if let Some(current) = &inner.current {
                let fresh = inner
                    .selected_at
                    .map(|at| at.elapsed() < self.reselect_timeout)
                    .unwrap_or(false);
                if fresh && !inner.unhealthy.contains(current) {
                    return Ok(current.clone());
                }
                inner.current = None;
                inner.selected_at = None;
            }

            inner.eligible()
        };

        if candidates.is_empty() {
            return Err(PharosError::AllEndpointsUnhealthy);
        }

        // probe the whole candidate set concurrently, lock released
        let probes = candidates.iter().map(|e| self.prober.probe(e));
        let round = join_all(probes).await;

        let mut inner = self.inner.lock().await;
        let slot_check = inner.policy.unhealthy_slot_diff_plays.is_some();
        let winner = round
            .iter()
            .filter(|h| h.reachable)
            .min_by_key(|h| h.selection_key(slot_check))
            .map(|h| h.endpoint.clone());
        inner.last_round = round;

        match winner {
            Some(endpoint) => {
                info!(
                    "Selected endpoint {} out of {} candidates",
                    endpoint,
                    candidates.len()
                );
                inner.current = Some(endpoint.clone());
                inner.selected_at = Some(Instant::now());
                Ok(endpoint)
            }
            None => {
                warn!("No reachable endpoint among {} candidates", candidates.len());
                Err(PharosError::AllEndpointsUnhealthy)
            }
        }
    }

    /// Marks an endpoint as unhealthy, removing it from future selection
    /// rounds until [`reset_unhealthy`](Self::reset_unhealthy) is called.
    pub async fn add_unhealthy(&self, endpoint: &str) {
        let mut inner = self.inner.lock().await;
        inner.unhealthy.insert(endpoint.to_string());
        if inner.current.as_deref() == Some(endpoint) {
            inner.current = None;
            inner.selected_at = None;
        }
    }

    /// Drops the cached selection so the next `select` runs a fresh probe
    /// round. The unhealthy set is untouched.
    pub async fn clear_cached(&self) {
        let mut inner = self.inner.lock().await;
        inner.current = None;
        inner.selected_at = None;
    }

    /// Empties the unhealthy set, making abandoned endpoints eligible again.
    pub async fn reset_unhealthy(&self) {
        let mut inner = self.inner.lock().await;
        inner.unhealthy.clear();
    }

    pub async fn set_unhealthy_block_diff(&self, blocks: u64) {
        let mut inner = self.inner.lock().await;
        inner.policy.unhealthy_block_diff = blocks;
    }

    pub async fn set_unhealthy_slot_diff_plays(&self, slots: Option<u64>) {
        let mut inner = self.inner.lock().await;
        inner.policy.unhealthy_slot_diff_plays = slots;
    }

    /// Current thresholds, as used both for selection scoring and for
    /// post-hoc response validation.
    pub async fn staleness_policy(&self) -> StalenessPolicy {
        self.inner.lock().await.policy
    }

    pub async fn current(&self) -> Option<String> {
        self.inner.lock().await.current.clone()
    }

    /// Adds a candidate endpoint. Duplicates are ignored.
    pub async fn add_endpoint(&self, endpoint: String) {
        let mut inner = self.inner.lock().await;
        if !inner.endpoints.contains(&endpoint) {
            inner.endpoints.push(endpoint);
        }
    }

    /// Removes a candidate endpoint, dropping the cached selection if it was
    /// the one removed.
    pub async fn remove_endpoint(&self, endpoint: &str) {
        let mut inner = self.inner.lock().await;
        inner.endpoints.retain(|e| e != endpoint);
        if inner.current.as_deref() == Some(endpoint) {
            inner.current = None;
            inner.selected_at = None;
        }
    }

    pub async fn endpoints(&self) -> Vec<String> {
        self.inner.lock().await.endpoints.clone()
    }

    /// Verdicts from the most recent probe round.
    pub async fn fleet_health(&self) -> Vec<EndpointHealth> {
        self.inner.lock().await.last_round.clone()
    }
}
