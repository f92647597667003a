//! Collaborator seams: fleet-wide status, caller identity, and the
//! per-request observability callback. Each trait ships a default
//! implementation so the client works out of the box.

use async_trait::async_trait;
use tracing::debug;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reports whether the whole fleet is in regressed mode: even the
/// best-available node lags the chain, so staleness must not trigger
/// failover (there is nowhere fresher to go).
#[async_trait]
pub trait FleetStatus: Send + Sync {
    async fn is_regressed(&self) -> bool;
}

/// Default fleet status: never regressed.
pub struct NeverRegressed;

#[async_trait]
impl FleetStatus for NeverRegressed {
    async fn is_regressed(&self) -> bool {
        false
    }
}

/// Supplies the optional caller identity attached to every application
/// request as an `X-User-ID` header.
pub trait IdentityProvider: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

/// Default identity: anonymous, no header attached.
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn user_id(&self) -> Option<String> {
        None
    }
}

/// Everything an observer learns about one finished request attempt.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub endpoint: String,
    pub pathname: String,
    pub query_string: String,
    pub request_method: String,
    /// HTTP status of the response, or 0 when no response was received
    /// (timeout, connection failure).
    pub status: u16,
    pub response_time_millis: u64,
    pub signer: Option<String>,
    pub signature: Option<String>,
}

/// Best-effort per-request callback. Invoked once per attempt, success or
/// failure. Errors are logged and swallowed by the caller; an observer can
/// never change a request's outcome.
pub trait RequestObserver: Send + Sync {
    fn on_request(&self, record: &RequestRecord) -> Result<(), BoxError>;
}

/// Default observer: one debug line per attempt.
pub struct LogObserver;

impl RequestObserver for LogObserver {
    fn on_request(&self, record: &RequestRecord) -> Result<(), BoxError> {
        debug!(
            "{} {}{} -> {} in {}ms (endpoint: {})",
            record.request_method,
            record.pathname,
            record.query_string,
            record.status,
            record.response_time_millis,
            record.endpoint
        );
        Ok(())
    }
}
