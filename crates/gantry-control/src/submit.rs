//! Application submission.
//!
//! Validation runs before anything touches the network: a rejected spec
//! performs zero staging and zero cluster calls, leaving no partial
//! application behind.

use serde_json::{Value, json};
use tracing::info;

use gantry_rest::RestClient;
use gantry_state::{ApplicationId, GantryError, GantryResult, LaunchSpec};

use crate::stage::{StagingArea, stage_payload, staging_token};

/// Builds and sends one launch request.
pub struct Submitter {
    rm: RestClient,
    staging: Box<dyn StagingArea>,
}

impl Submitter {
    pub fn new(rm: RestClient, staging: Box<dyn StagingArea>) -> Self {
        Self { rm, staging }
    }

    /// Validate, stage, and submit. On success exactly one new
    /// application exists on the cluster, in NEW or SUBMITTED state.
    pub async fn submit(&self, spec: &LaunchSpec) -> GantryResult<ApplicationId> {
        spec.validate()?;

        let token = staging_token(&spec.command);
        let payload = stage_payload(self.staging.as_ref(), &token, spec).await?;

        let body = json!({
            "command": spec.command,
            "numContainers": spec.num_containers,
            "memoryMb": spec.memory_mb,
            "virtualCores": spec.virtual_cores,
            "files": payload.files,
            "environmentArchive": payload.environment_archive,
        });

        let response = self.rm.post("/apps", &body).await?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GantryError::Protocol(format!(
                    "submission response has no application id: {response}"
                ))
            })?;

        info!(
            app_id = id,
            containers = spec.num_containers,
            memory_mb = spec.memory_mb,
            vcores = spec.virtual_cores,
            staged_files = payload.files.len(),
            "application submitted"
        );
        Ok(id.to_string())
    }
}
