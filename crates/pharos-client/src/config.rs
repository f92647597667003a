use std::collections::HashSet;
use std::time::Duration;

use pharos_common::StalenessPolicy;

/// Client configuration.
///
/// One flat structure with named fields and explicit defaults; callers
/// override individual knobs with struct-update syntax:
///
/// ```
/// use pharos_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     selection_request_retries: 2,
///     unhealthy_block_diff: 100,
///     ..ClientConfig::new(vec!["https://node-a.example.com".to_string()])
/// };
/// assert_eq!(config.selection_request_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Candidate endpoints, each the base URL of one fleet node.
    pub endpoints: Vec<String>,
    /// When set, only these endpoints are eligible for selection.
    pub whitelist: Option<HashSet<String>>,
    /// Endpoints never eligible for selection.
    pub blacklist: Option<HashSet<String>>,
    /// How long a selected endpoint stays cached before the next call
    /// re-probes the fleet.
    pub reselect_timeout: Duration,
    /// Timeout for individual probes and the default for application requests.
    pub selection_request_timeout: Duration,
    /// Failed attempts tolerated against one endpoint before it is abandoned
    /// and selection runs a fresh probe round.
    pub selection_request_retries: u32,
    /// Maximum tolerated block lag before a node or response counts as stale.
    pub unhealthy_block_diff: u64,
    /// Maximum tolerated slot lag for the secondary indexing stream.
    /// `None` disables the slot check.
    pub unhealthy_slot_diff_plays: Option<u64>,
    /// Not-found responses tolerated (each against a freshly selected
    /// endpoint) before a 404 is accepted as genuine absence.
    pub max_requests_for_true_404: u32,
}

impl ClientConfig {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy {
            unhealthy_block_diff: self.unhealthy_block_diff,
            unhealthy_slot_diff_plays: self.unhealthy_slot_diff_plays,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            whitelist: None,
            blacklist: None,
            reselect_timeout: Duration::from_secs(600),
            selection_request_timeout: Duration::from_secs(30),
            selection_request_retries: 5,
            unhealthy_block_diff: 15,
            unhealthy_slot_diff_plays: None,
            max_requests_for_true_404: 2,
        }
    }
}
