use std::time::Duration;

use serde_json::Value;

use crate::error::{PharosError, Result};

/// HTTP method of a [`RequestDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// An immutable description of one logical request against a fleet endpoint.
///
/// The path is endpoint-relative; the concrete URL is built only once an
/// endpoint has been selected. Descriptors are consumed per call and never
/// persisted.
///
/// # Example
///
/// ```
/// use pharos_common::{Method, RequestDescriptor};
/// use std::time::Duration;
///
/// let descriptor = RequestDescriptor::get("v1/tracks")
///     .with_query("limit", "10")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(descriptor.method, Method::Get);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Endpoint-relative path, e.g. `v1/tracks`.
    pub path: String,
    pub method: Method,
    /// Query pairs, appended to the URL in order.
    pub query: Vec<(String, String)>,
    /// Optional JSON body (POST only).
    pub body: Option<Value>,
    /// Per-request timeout override. Falls back to the client default when unset.
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: Method::Post,
            query: Vec::new(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rejects descriptors that cannot be turned into a well-formed request.
    ///
    /// This is the only descriptor-related condition that surfaces to callers
    /// as an error rather than being absorbed by the retry machinery.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(PharosError::InvalidRequest("path must not be empty".to_string()));
        }
        if self.path.contains("://") {
            return Err(PharosError::InvalidRequest(format!(
                "path must be endpoint-relative, got absolute URL: {}",
                self.path
            )));
        }
        if self.method == Method::Get && self.body.is_some() {
            return Err(PharosError::InvalidRequest(
                "GET request cannot carry a body".to_string(),
            ));
        }
        Ok(())
    }
}
