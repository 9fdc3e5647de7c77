//! gantry-control — the Gantry job controller.
//!
//! Launches and supervises a single distributed application on a shared
//! cluster resource manager, without being the scheduler. The cluster owns
//! placement and the container set; this crate owns the client-side
//! lifecycle state machine and a snapshot of the cluster's truth.
//!
//! # Architecture
//!
//! ```text
//! Driver (lifecycle state machine, owns ApplicationId + snapshots)
//!   ├── Submitter  — validate spec, stage payload, POST /apps
//!   │     └── StagingArea — write-once uploads to the metadata service
//!   ├── Poller     — normalize raw status/container payloads
//!   ├── Scaler     — add/remove containers, no local count cache
//!   └── RestClient — retrying transport (gantry-rest)
//! ```
//!
//! Submitter, Poller, and Scaler are stateless; every call re-derives from
//! a fresh cluster response. Only the `Driver` caches state: the
//! application id, the last status snapshot, and the last container set,
//! each replaced wholesale per poll.

pub mod driver;
pub mod poll;
pub mod scale;
pub mod stage;
pub mod submit;

pub use driver::{Driver, DriverOptions};
pub use poll::Poller;
pub use scale::Scaler;
pub use stage::{HttpStaging, StagedPayload, StagingArea};
pub use submit::Submitter;
