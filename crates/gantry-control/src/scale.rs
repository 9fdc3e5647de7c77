//! Dynamic container scaling against a running application.
//!
//! The scaler never caches a count. The container set is the cluster's
//! ground truth and changes concurrently (failed containers get
//! replaced), so every add/remove is reconciled by the caller with a
//! fresh poll afterward.

use serde_json::json;
use tracing::info;

use gantry_rest::RestClient;
use gantry_state::{ContainerId, ContainerRecord, GantryError, GantryResult};

use crate::poll::parse_containers;

/// Stateless scale-out/scale-in requests.
#[derive(Debug, Clone)]
pub struct Scaler {
    rm: RestClient,
}

impl Scaler {
    pub fn new(rm: RestClient) -> Self {
        Self { rm }
    }

    /// Request `count` additional containers with the application's
    /// original resource shape. Returns the newly requested containers
    /// only; they are not yet scheduled — the caller polls to observe
    /// them transition to RUNNING.
    pub async fn add_containers(
        &self,
        id: &str,
        count: u32,
    ) -> GantryResult<Vec<ContainerRecord>> {
        if count == 0 {
            return Err(GantryError::InvalidArgument(
                "container count must be at least 1".into(),
            ));
        }

        let response = self
            .rm
            .post(&format!("/apps/{id}/containers"), &json!({ "count": count }))
            .await
            .map_err(|e| state_error(id, e))?;

        let added = parse_containers(&response);
        info!(app_id = id, requested = count, returned = added.len(), "containers requested");
        Ok(added)
    }

    /// Remove one specific container. Removing a container the cluster no
    /// longer knows about, or one belonging to a different application,
    /// is a reported error, never a silent success.
    pub async fn remove_container(
        &self,
        id: &str,
        container: &ContainerId,
    ) -> GantryResult<()> {
        self.rm
            .delete(&format!("/apps/{id}/containers/{container}"))
            .await
            .map_err(|e| match e {
                GantryError::Rejected { status: 404, .. } => GantryError::ApplicationState(
                    format!("container {container} is not part of application {id}"),
                ),
                other => state_error(id, other),
            })?;
        info!(app_id = id, container = %container, "container removed");
        Ok(())
    }

    /// Remove several containers, failing on the first error.
    pub async fn remove_containers(
        &self,
        id: &str,
        containers: &[ContainerId],
    ) -> GantryResult<()> {
        for container in containers {
            self.remove_container(id, container).await?;
        }
        Ok(())
    }
}

/// Scale calls against a finished or unknown application come back as
/// 4xx conflicts; surface them as state errors.
fn state_error(id: &str, err: GantryError) -> GantryError {
    match err {
        GantryError::Rejected { status: 404, .. } => {
            GantryError::ApplicationState(format!("unknown application {id}"))
        }
        GantryError::Rejected {
            status: 409,
            message,
        } => GantryError::ApplicationState(format!("application {id}: {message}")),
        other => other,
    }
}
