//! Error taxonomy for Gantry operations.
//!
//! The variants map one-to-one onto how callers must react: configuration
//! and argument errors are raised before any network traffic, transient
//! errors are retried inside the REST client up to its budget, rejections
//! and state errors are surfaced immediately and never retried.

use thiserror::Error;

/// Result type alias for Gantry operations.
pub type GantryResult<T> = Result<T, GantryError>;

/// Errors that can occur while driving an application on the cluster.
#[derive(Debug, Error)]
pub enum GantryError {
    /// Bad or unreachable endpoints, out-of-range ports, unusable
    /// autodetected configuration. Raised at construction, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed launch spec or scale request. Raised before any network
    /// call is made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection failure or timeout while talking to the cluster.
    /// Retried with bounded backoff for reads; surfaced once the retry
    /// budget is exhausted.
    #[error("transient cluster error: {0}")]
    Transient(String),

    /// The cluster answered with a non-2xx status. Application-level
    /// rejections are never retried.
    #[error("cluster rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Operation attempted against a terminal or nonexistent application,
    /// or removal of a container the cluster does not know about.
    #[error("application state error: {0}")]
    ApplicationState(String),

    /// A local file could not be read or an upload to the staging area
    /// failed.
    #[error("staging error: {0}")]
    Staging(String),

    /// The cluster answered 2xx but the payload did not have the expected
    /// shape.
    #[error("unexpected cluster response: {0}")]
    Protocol(String),
}

impl GantryError {
    /// Whether this error may succeed on retry.
    ///
    /// Only connection-level failures qualify; rejections and state errors
    /// reflect a decision the cluster already made.
    pub fn is_transient(&self) -> bool {
        matches!(self, GantryError::Transient(_))
    }
}
