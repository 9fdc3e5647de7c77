//! gantry-state — shared domain types for the Gantry job controller.
//!
//! Holds the launch request model, the normalized application/container
//! status model, and the error taxonomy used by every other Gantry crate.
//!
//! # Architecture
//!
//! All wire-facing types are serde-serializable. Status types are plain
//! snapshots: they are recomputed wholesale from the latest cluster
//! response on every poll and never mutated incrementally, so a holder of
//! an `ApplicationStatus` can never observe a partially updated record.

pub mod error;
pub mod types;

pub use error::{GantryError, GantryResult};
pub use types::*;
