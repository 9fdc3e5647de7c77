//! Endpoint validation and reachability probing.
//!
//! Ports arrive as raw `u32` values so an out-of-range argument can be
//! rejected with a configuration error instead of wrapping silently.
//! Hostnames must resolve, and each endpoint must accept a TCP connection
//! within the probe timeout. The probe is the only side effect.

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, info};

use gantry_state::{ClusterEndpoint, GantryError, GantryResult};

use crate::config::ClusterConfig;

/// The two validated endpoints the controller operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPair {
    /// Metadata service (staging filesystem namenode).
    pub metadata: ClusterEndpoint,
    /// Resource manager status/control API.
    pub resource_manager: ClusterEndpoint,
}

/// Raw, unvalidated endpoint arguments.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    pub metadata_host: String,
    pub metadata_port: u32,
    pub rm_host: String,
    pub rm_port: u32,
    /// Derive endpoints from local cluster configuration, ignoring the
    /// explicit host/port fields.
    pub autodetect: bool,
    /// Explicit configuration path for autodetection; falls back to the
    /// environment variable and the default path.
    pub config_path: Option<PathBuf>,
    /// Per-endpoint deadline for resolution plus the TCP probe.
    pub probe_timeout: Duration,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            metadata_host: "localhost".to_string(),
            metadata_port: 8020,
            rm_host: "localhost".to_string(),
            rm_port: 8088,
            autodetect: false,
            config_path: None,
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// Validate both endpoints and probe their reachability.
///
/// Every failure mode is a `Configuration` error: out-of-range port,
/// unresolvable hostname, refused connection, or autodetection yielding
/// no usable configuration. Nothing below the validator may run against
/// unvalidated endpoints.
pub async fn validate_endpoints(opts: &EndpointOptions) -> GantryResult<EndpointPair> {
    let pair = if opts.autodetect {
        let config = ClusterConfig::discover(opts.config_path.as_deref())?;
        EndpointPair {
            metadata: ClusterEndpoint::new(
                config.metadata.host,
                check_port("metadata-service", config.metadata.port as u32)?,
            ),
            resource_manager: ClusterEndpoint::new(
                config.resource_manager.host,
                check_port("resource-manager", config.resource_manager.port as u32)?,
            ),
        }
    } else {
        EndpointPair {
            metadata: ClusterEndpoint::new(
                opts.metadata_host.clone(),
                check_port("metadata-service", opts.metadata_port)?,
            ),
            resource_manager: ClusterEndpoint::new(
                opts.rm_host.clone(),
                check_port("resource-manager", opts.rm_port)?,
            ),
        }
    };

    probe(&pair.metadata, opts.probe_timeout).await?;
    probe(&pair.resource_manager, opts.probe_timeout).await?;

    info!(
        metadata = %pair.metadata,
        resource_manager = %pair.resource_manager,
        "cluster endpoints validated"
    );
    Ok(pair)
}

/// Check a raw port value against the valid TCP range.
fn check_port(label: &str, port: u32) -> GantryResult<u16> {
    if port == 0 || port > u16::MAX as u32 {
        return Err(GantryError::Configuration(format!(
            "{label} port {port} is outside [1, 65535]"
        )));
    }
    Ok(port as u16)
}

/// Resolve the endpoint and attempt one TCP connection.
async fn probe(endpoint: &ClusterEndpoint, timeout: Duration) -> GantryResult<()> {
    let address = endpoint.address();

    let result = tokio::time::timeout(timeout, async {
        let mut addrs = lookup_host(&address).await.map_err(|e| {
            GantryError::Configuration(format!("cannot resolve {address}: {e}"))
        })?;
        let addr = addrs.next().ok_or_else(|| {
            GantryError::Configuration(format!("{address} resolved to no addresses"))
        })?;

        TcpStream::connect(addr).await.map_err(|e| {
            GantryError::Configuration(format!("cannot reach {address}: {e}"))
        })?;
        debug!(%address, "endpoint probe succeeded");
        Ok(())
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => Err(GantryError::Configuration(format!(
            "probe of {address} timed out after {timeout:?}"
        ))),
    }
}
