//! Indexing-freshness types shared by the prober and the response validator.
//!
//! Fleet nodes report how far their index lags the canonical chain through two
//! streams: a block stream and a secondary slot stream ("plays"). The same
//! fields appear in the verbose health-check body and, flattened, in every
//! data response envelope, so one wire type covers both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Freshness metadata as reported on the wire.
///
/// Every field is optional: a node that omits a field simply cannot prove the
/// corresponding freshness, and downstream classification treats that as
/// worst-case rather than rejecting the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub latest_indexed_block: Option<u64>,
    pub latest_chain_block: Option<u64>,
    pub latest_indexed_slot_plays: Option<u64>,
    pub latest_chain_slot_plays: Option<u64>,
    pub version: Option<String>,
}

impl HealthReport {
    /// Blocks the node's index lags the chain, or `None` when either side of
    /// the subtraction is missing.
    pub fn block_lag(&self) -> Option<u64> {
        match (self.latest_chain_block, self.latest_indexed_block) {
            (Some(chain), Some(indexed)) => Some(chain.saturating_sub(indexed)),
            _ => None,
        }
    }

    /// Slot lag of the secondary indexing stream, `None` when unreported.
    pub fn slot_lag(&self) -> Option<u64> {
        match (self.latest_chain_slot_plays, self.latest_indexed_slot_plays) {
            (Some(chain), Some(indexed)) => Some(chain.saturating_sub(indexed)),
            _ => None,
        }
    }
}

/// Staleness thresholds applied both during selection scoring and when
/// validating data responses after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Maximum tolerated block lag.
    pub unhealthy_block_diff: u64,
    /// Maximum tolerated slot lag for the secondary stream. `None` disables
    /// the slot check entirely.
    pub unhealthy_slot_diff_plays: Option<u64>,
}

impl StalenessPolicy {
    /// Classifies a report against the thresholds.
    ///
    /// Missing block metadata counts as maximally stale: a node that cannot
    /// prove freshness is not trusted with it. The slot check follows the same
    /// rule, but only when a slot threshold is configured. When the fleet is
    /// in regressed mode there is nowhere fresher to fail over to, so the
    /// check is suppressed and nothing is stale.
    pub fn is_stale(&self, report: &HealthReport, regressed: bool) -> bool {
        if regressed {
            return false;
        }
        match report.block_lag() {
            None => return true,
            Some(lag) if lag > self.unhealthy_block_diff => return true,
            Some(_) => {}
        }
        if let Some(max_slot_lag) = self.unhealthy_slot_diff_plays {
            match report.slot_lag() {
                None => return true,
                Some(lag) if lag > max_slot_lag => return true,
                Some(_) => {}
            }
        }
        false
    }
}

/// One probe's verdict on one endpoint. Created fresh per probe, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub reachable: bool,
    pub blocks_behind: Option<u64>,
    pub slots_behind: Option<u64>,
    pub version: Option<String>,
}

impl EndpointHealth {
    /// A probe that failed to get any usable answer out of the endpoint.
    pub fn unreachable(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reachable: false,
            blocks_behind: None,
            slots_behind: None,
            version: None,
        }
    }

    pub fn from_report(endpoint: impl Into<String>, report: &HealthReport) -> Self {
        Self {
            endpoint: endpoint.into(),
            reachable: true,
            blocks_behind: report.block_lag(),
            slots_behind: report.slot_lag(),
            version: report.version.clone(),
        }
    }

    /// Sort key for selection: reachable before unreachable, then lower block
    /// lag (missing lag is worst-case), then lower slot lag when the slot
    /// check is active, then higher version, then endpoint for a total order.
    pub fn selection_key(&self, slot_check: bool) -> SelectionKey {
        (
            !self.reachable,
            self.blocks_behind.unwrap_or(u64::MAX),
            if slot_check {
                self.slots_behind.unwrap_or(u64::MAX)
            } else {
                0
            },
            std::cmp::Reverse(parse_version(self.version.as_deref().unwrap_or(""))),
            self.endpoint.clone(),
        )
    }
}

pub type SelectionKey = (bool, u64, u64, std::cmp::Reverse<Vec<u64>>, String);

/// Splits a dotted version string into numeric segments for ordinal
/// comparison. Non-numeric trailers within a segment are ignored, so
/// "1.2.10-beta" compares as [1, 2, 10].
pub fn parse_version(version: &str) -> Vec<u64> {
    version
        .split(['.', '-'])
        .map(|segment| {
            segment
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .collect()
}

/// Body shape of a successful data response: the payload plus flattened
/// freshness metadata and an optional signer attestation.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub data: Value,
    #[serde(flatten)]
    pub health: HealthReport,
    #[serde(default)]
    pub signer: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}
