//! Staging of launch payloads into the distributed filesystem.
//!
//! Files and the optional environment archive are uploaded write-once
//! under a token-scoped directory before the launch request is sent, so
//! every container sees them at runtime. The filesystem itself is an
//! external collaborator; Gantry only writes and never reads back.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use gantry_rest::RestClient;
use gantry_state::{GantryError, GantryResult, LaunchSpec};

/// Write-once upload boundary to the cluster's staging filesystem.
#[async_trait]
pub trait StagingArea: Send + Sync {
    /// Upload one blob to a staging path.
    async fn upload(&self, remote_path: &str, data: Bytes) -> GantryResult<()>;
}

/// Staging over the metadata service's HTTP upload API.
pub struct HttpStaging {
    client: RestClient,
}

impl HttpStaging {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StagingArea for HttpStaging {
    async fn upload(&self, remote_path: &str, data: Bytes) -> GantryResult<()> {
        self.client.put_bytes(remote_path, data).await
    }
}

/// Remote paths of a staged launch payload, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPayload {
    pub files: Vec<String>,
    pub environment_archive: Option<String>,
}

/// Derive a unique staging token for one submission.
///
/// The application id only exists after submission, so uploads are scoped
/// by this controller-chosen token and the launch request references the
/// token-scoped paths.
pub fn staging_token(command: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    command.hash(&mut hasher);
    epoch_nanos().hash(&mut hasher);
    format!("app-{:08x}", hasher.finish() as u32)
}

/// Read and upload every file reference in the spec, plus the environment
/// archive if present.
///
/// The spec must already have passed `validate()`; a local read failure
/// here is a staging error, and nothing uploaded before it is rolled back
/// (the staging area is write-once scratch space scoped to the token).
pub async fn stage_payload(
    staging: &dyn StagingArea,
    token: &str,
    spec: &LaunchSpec,
) -> GantryResult<StagedPayload> {
    let mut files = Vec::with_capacity(spec.files.len());
    for local in &spec.files {
        files.push(upload_file(staging, token, local).await?);
    }

    let environment_archive = match &spec.environment_archive {
        Some(local) => Some(upload_file(staging, token, local).await?),
        None => None,
    };

    Ok(StagedPayload {
        files,
        environment_archive,
    })
}

async fn upload_file(
    staging: &dyn StagingArea,
    token: &str,
    local: &str,
) -> GantryResult<String> {
    let name = Path::new(local)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            GantryError::Staging(format!("{local:?} has no usable file name"))
        })?;

    let data = tokio::fs::read(local)
        .await
        .map_err(|e| GantryError::Staging(format!("cannot read {local}: {e}")))?;

    let remote = format!("/staging/{token}/{name}");
    staging.upload(&remote, Bytes::from(data)).await?;
    debug!(local, remote, "staged file");
    Ok(remote)
}

fn epoch_nanos() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
