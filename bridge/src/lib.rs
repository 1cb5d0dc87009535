//! Entity Bridge Library
//!
//! Client-only virtual entities and inbound click interception over a
//! Minecraft server's wire protocol, for several host revisions at once.
//!
//! Game logic talks to [`facade::VersionFacade`]; everything below it is
//! selected once from the host's version string.
//!
//! # Features
//!
//! - `metrics_endpoint` - HTTP endpoint serving Prometheus/JSON metrics (enabled by default)

pub mod config;
pub mod entity;
pub mod facade;
pub mod metrics;
pub mod net;
pub mod protocol;

pub use facade::{detect_version, VersionError, VersionFacade};
