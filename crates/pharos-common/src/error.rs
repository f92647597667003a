use thiserror::Error;

#[derive(Error, Debug)]
pub enum PharosError {
    /// The endpoint answered with HTTP 404. Kept distinct from [`PharosError::Http`]
    /// because the failover layer budgets not-found responses separately: a 404 may
    /// mean indexing lag on one node rather than genuine absence.
    #[error("resource not found")]
    NotFound,

    /// No endpoint in the fleet could be selected: every candidate is excluded,
    /// unreachable, or already marked unhealthy.
    #[error("no healthy endpoint available")]
    AllEndpointsUnhealthy,

    #[error("request timeout after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl PharosError {
    /// Whether a failed attempt may succeed on retry, on this endpoint or another.
    ///
    /// Timeouts, connection-level failures and server-side HTTP errors are
    /// transient. Not-found carries its own budget and is classified separately;
    /// everything else (malformed descriptors, serialization) is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PharosError::Timeout(_) | PharosError::Transport(_) | PharosError::Http { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PharosError>;
