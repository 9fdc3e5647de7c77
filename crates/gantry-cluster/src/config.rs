//! Local cluster configuration used by endpoint autodetection.
//!
//! ```toml
//! [metadata]
//! host = "nn.cluster.local"
//! port = 8020
//!
//! [resource_manager]
//! host = "rm.cluster.local"
//! port = 8088
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use gantry_state::{GantryError, GantryResult};

/// Environment variable pointing at the cluster configuration file.
pub const CONFIG_ENV_VAR: &str = "GANTRY_CLUSTER_CONFIG";

/// Fallback configuration path when neither an explicit path nor the
/// environment variable is set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gantry/cluster.toml";

/// One service endpoint as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

/// The two cluster service endpoints Gantry needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Metadata service (staging filesystem namenode).
    pub metadata: EndpointConfig,
    /// Resource manager status/control API.
    pub resource_manager: EndpointConfig,
}

impl ClusterConfig {
    /// Parse a configuration file.
    pub fn load(path: &Path) -> GantryResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GantryError::Configuration(format!(
                "cannot read cluster config {}: {e}",
                path.display()
            ))
        })?;
        toml::from_str(&text).map_err(|e| {
            GantryError::Configuration(format!(
                "cannot parse cluster config {}: {e}",
                path.display()
            ))
        })
    }

    /// Locate and load the cluster configuration for autodetection.
    ///
    /// Precedence: explicit path, then `GANTRY_CLUSTER_CONFIG`, then
    /// `/etc/gantry/cluster.toml`. Yielding no usable configuration is a
    /// configuration error, not a silent fallback.
    pub fn discover(explicit: Option<&Path>) -> GantryResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load(default);
        }
        Err(GantryError::Configuration(format!(
            "autodetect found no cluster configuration \
             (set {CONFIG_ENV_VAR} or create {DEFAULT_CONFIG_PATH})"
        )))
    }
}
