//! gantry-cluster — endpoint validation for the Gantry controller.
//!
//! Resolves and health-checks the two cluster service endpoints (the
//! metadata service and the resource manager) before any other operation
//! is permitted. Validation runs once, synchronously from the caller's
//! point of view, at controller construction; everything downstream can
//! assume the endpoints are well-formed and were reachable at startup.
//!
//! Autodetection replaces explicit host/port arguments with values read
//! from the local cluster configuration file.

pub mod config;
pub mod endpoints;

pub use config::ClusterConfig;
pub use endpoints::{EndpointOptions, EndpointPair, validate_endpoints};
