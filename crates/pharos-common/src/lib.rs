//! Pharos Common Types
//!
//! Shared protocol types for the pharos failover client: the error taxonomy,
//! the request descriptor, and the indexing-freshness types used for endpoint
//! scoring and response validation.
//!
//! # Overview
//!
//! Pharos talks to a fleet of interchangeable backend nodes that each index
//! the same upstream data set. Nodes are redundant but not equally fresh: an
//! individual node may lag the canonical chain, return spurious 404s while it
//! catches up, or be down entirely. This crate defines the vocabulary the
//! client uses to reason about that:
//!
//! - [`PharosError`]: distinguishes the conditions the retry machinery
//!   branches on (not-found, transient transport failure, total fleet
//!   unavailability) from plain fatal errors.
//! - [`RequestDescriptor`]: one logical request, endpoint-relative.
//! - [`HealthReport`] / [`EndpointHealth`] / [`StalenessPolicy`]: freshness
//!   metadata as reported on the wire, per-probe verdicts, and the thresholds
//!   that turn lag numbers into a stale/fresh classification.
//! - [`ResponseEnvelope`]: the payload-plus-metadata body shape every data
//!   response carries.

pub mod descriptor;
pub mod error;
pub mod health;

pub use descriptor::{Method, RequestDescriptor};
pub use error::{PharosError, Result};
pub use health::{
    parse_version, EndpointHealth, HealthReport, ResponseEnvelope, StalenessPolicy,
};
