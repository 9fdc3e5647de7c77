//! gantry-rest — thin, retrying HTTP transport for the cluster REST API.
//!
//! The client is the leaf dependency of every component that talks to the
//! resource manager. It holds only transport configuration (endpoint,
//! timeout, retry policy), so one client can be shared freely across
//! controllers and tasks.
//!
//! # Retry semantics
//!
//! GETs are idempotent and retried on transient connection failures with
//! capped exponential backoff. POST/PUT/DELETE are never retried here:
//! a duplicated submit or scale request is worse than a surfaced error,
//! so mutating retries are the caller's decision.

pub mod client;
pub mod retry;

pub use client::RestClient;
pub use retry::RetryPolicy;
