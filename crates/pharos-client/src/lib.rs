//! Pharos Client
//!
//! A failover-aware client for fleets of interchangeable indexing nodes.
//! Given a set of redundant endpoints, it probes their health, selects the
//! freshest reachable node, issues requests against it, validates responses
//! for indexing staleness, and reselects transparently with bounded retries.
//!
//! # Components
//!
//! - [`HealthProber`] / [`HttpHealthProber`]: one lightweight status request
//!   per candidate, unreachable on any failure.
//! - [`EndpointSelector`]: concurrent probe fan-out, deterministic scoring,
//!   bounded-lifetime selection cache, unhealthy-set bookkeeping.
//! - [`RequestExecutor`] / [`HttpRequestClient`]: descriptor execution with
//!   identity and correlation headers and a best-effort observer callback.
//! - [`PharosClient`]: the retry/reselection loop tying them together.
//!
//! # Example
//!
//! ```no_run
//! use pharos_client::{ClientConfig, PharosClient};
//!
//! # #[tokio::main]
//! # async fn main() -> pharos_common::Result<()> {
//! let client = PharosClient::new(ClientConfig::new(vec![
//!     "https://node-a.example.com".to_string(),
//!     "https://node-b.example.com".to_string(),
//! ]));
//!
//! match client.get("v1/tracks/trending").await? {
//!     Some(data) => println!("{}", data),
//!     None => println!("no usable data"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod hooks;
pub mod http;
pub mod prober;
pub mod selector;

pub use client::PharosClient;
pub use config::ClientConfig;
pub use hooks::{
    Anonymous, BoxError, FleetStatus, IdentityProvider, LogObserver, NeverRegressed,
    RequestObserver, RequestRecord,
};
pub use http::{HttpRequestClient, RequestExecutor, REQUEST_ID_HEADER, USER_ID_HEADER};
pub use prober::{HealthProber, HttpHealthProber, HEALTH_CHECK_PATH};
pub use selector::EndpointSelector;
