//! Domain types for the Gantry job controller.
//!
//! These types model one application submission: the cluster endpoints it
//! talks to, the launch request, and the normalized status/container
//! snapshots derived from raw cluster payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GantryError, GantryResult};

/// Opaque application handle returned by the cluster on submission.
pub type ApplicationId = String;

/// Opaque handle for one allocated container.
pub type ContainerId = String;

// ── Endpoints ─────────────────────────────────────────────────────

/// A validated cluster service endpoint.
///
/// The port is range-constrained by the type; raw (unvalidated) ports
/// enter the system as `u32` and are checked by the endpoint validator.
/// Immutable once the controller is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    pub host: String,
    pub port: u16,
}

impl ClusterEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The `host:port` address string used for socket connects.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ClusterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Launch spec ───────────────────────────────────────────────────

/// Parameterized launch request for one application.
///
/// Deserialization is strict: an integer field given as a numeric string,
/// or `files` given as one joined string instead of an array, fails to
/// decode instead of being coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Command line executed in every container.
    pub command: String,
    /// Number of worker containers to request.
    pub num_containers: u32,
    /// Memory per container in megabytes.
    pub memory_mb: u64,
    /// Virtual cores per container.
    pub virtual_cores: u32,
    /// Local files staged into the distributed filesystem before launch,
    /// one path per entry.
    pub files: Vec<String>,
    /// Optional pre-packaged environment archive staged alongside the
    /// files. Treated as an opaque blob reference.
    pub environment_archive: Option<String>,
}

impl LaunchSpec {
    /// Create a spec with the default resource shape: one container,
    /// 128 MB, one virtual core, no files.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            num_containers: 1,
            memory_mb: 128,
            virtual_cores: 1,
            files: Vec::new(),
            environment_archive: None,
        }
    }

    pub fn with_num_containers(mut self, num_containers: u32) -> Self {
        self.num_containers = num_containers;
        self
    }

    pub fn with_memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_virtual_cores(mut self, virtual_cores: u32) -> Self {
        self.virtual_cores = virtual_cores;
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_environment_archive(mut self, archive: impl Into<String>) -> Self {
        self.environment_archive = Some(archive.into());
        self
    }

    /// Validate the request shape before any network or staging call.
    ///
    /// A `files` entry containing a comma is rejected: a comma-joined
    /// string is a user error, not a file list. Ambiguous input is never
    /// silently split.
    pub fn validate(&self) -> GantryResult<()> {
        if self.command.trim().is_empty() {
            return Err(GantryError::InvalidArgument(
                "command must not be empty".into(),
            ));
        }
        if self.num_containers == 0 {
            return Err(GantryError::InvalidArgument(
                "num_containers must be at least 1".into(),
            ));
        }
        if self.memory_mb == 0 {
            return Err(GantryError::InvalidArgument(
                "memory_mb must be greater than 0".into(),
            ));
        }
        if self.virtual_cores == 0 {
            return Err(GantryError::InvalidArgument(
                "virtual_cores must be at least 1".into(),
            ));
        }
        for file in &self.files {
            if file.is_empty() {
                return Err(GantryError::InvalidArgument(
                    "files entries must not be empty".into(),
                ));
            }
            if file.contains(',') {
                return Err(GantryError::InvalidArgument(format!(
                    "files entry {file:?} looks like a comma-joined list; \
                     pass one path per entry"
                )));
            }
        }
        Ok(())
    }
}

// ── Application status ────────────────────────────────────────────

/// Lifecycle phase of an application as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeState {
    New,
    Submitted,
    Accepted,
    Running,
    Finished,
    Failed,
    Killed,
    /// Sentinel for raw state values this controller does not recognize.
    /// A polling loop must never crash on a momentarily unexpected
    /// payload.
    Unknown,
}

impl RuntimeState {
    /// Total mapping from a raw cluster state string.
    ///
    /// Every input maps to exactly one variant; unrecognized values map
    /// to `Unknown` rather than failing the poll.
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "NEW" => RuntimeState::New,
            "SUBMITTED" => RuntimeState::Submitted,
            "ACCEPTED" => RuntimeState::Accepted,
            "RUNNING" => RuntimeState::Running,
            "FINISHED" => RuntimeState::Finished,
            "FAILED" => RuntimeState::Failed,
            "KILLED" => RuntimeState::Killed,
            _ => RuntimeState::Unknown,
        }
    }

    /// Whether this state ends the application's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RuntimeState::Finished | RuntimeState::Failed | RuntimeState::Killed
        )
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeState::New => "NEW",
            RuntimeState::Submitted => "SUBMITTED",
            RuntimeState::Accepted => "ACCEPTED",
            RuntimeState::Running => "RUNNING",
            RuntimeState::Finished => "FINISHED",
            RuntimeState::Failed => "FAILED",
            RuntimeState::Killed => "KILLED",
            RuntimeState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Normalized point-in-time snapshot of a running application.
///
/// Always replaced wholesale from the latest cluster response; partial
/// field updates would leave stale resource figures next to fresh state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    pub state: RuntimeState,
    /// Total memory currently allocated to the application in megabytes,
    /// including the management overhead container.
    pub allocated_memory_mb: u64,
    /// Total virtual cores currently allocated.
    pub allocated_vcores: u32,
    /// Containers currently in the running state.
    pub running_containers: u32,
}

// ── Containers ────────────────────────────────────────────────────

/// Lifecycle state of one container, mirroring the application states
/// at container scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    New,
    Running,
    Complete,
    Unknown,
}

impl ContainerState {
    /// Total mapping from a raw cluster container state string.
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "NEW" => ContainerState::New,
            "RUNNING" => ContainerState::Running,
            "COMPLETE" => ContainerState::Complete,
            _ => ContainerState::Unknown,
        }
    }
}

/// One allocated container as last observed from the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub host: String,
    pub state: ContainerState,
}
