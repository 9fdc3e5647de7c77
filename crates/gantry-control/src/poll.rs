//! Status polling — the single place raw cluster payloads become the
//! normalized local model.
//!
//! A live cluster occasionally returns partial payloads, so decoding is
//! tolerant: unknown or missing fields default to zero, unrecognized
//! state strings map to `Unknown`, and the status endpoint may wrap its
//! payload in an `{"app": …}` envelope or not. A controller loop polling
//! in a cooperative wait must never crash on a momentarily odd response.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use gantry_rest::RestClient;
use gantry_state::{
    ApplicationStatus, ContainerRecord, ContainerState, GantryError, GantryResult,
    RuntimeState,
};

/// Stateless read-side of the controller. One cluster call per
/// invocation; nothing is cached here.
#[derive(Debug, Clone)]
pub struct Poller {
    rm: RestClient,
}

/// Raw application payload as the resource manager reports it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawApplication {
    state: String,
    #[serde(rename = "allocatedMB")]
    allocated_mb: u64,
    #[serde(rename = "allocatedVCores")]
    allocated_vcores: u32,
    #[serde(rename = "runningContainers")]
    running_containers: u32,
}

/// Raw container entry as the resource manager reports it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContainer {
    id: String,
    host: String,
    state: String,
}

impl Poller {
    pub fn new(rm: RestClient) -> Self {
        Self { rm }
    }

    /// Fetch and normalize the application status.
    pub async fn status(&self, id: &str) -> GantryResult<ApplicationStatus> {
        let value = self
            .rm
            .get(&format!("/apps/{id}"))
            .await
            .map_err(|e| unknown_application(id, e))?;
        let status = normalize_status(&value);
        debug!(app_id = id, state = %status.state, containers = status.running_containers, "polled status");
        Ok(status)
    }

    /// Fetch and normalize the current container set.
    pub async fn containers(&self, id: &str) -> GantryResult<Vec<ContainerRecord>> {
        let value = self
            .rm
            .get(&format!("/apps/{id}/containers"))
            .await
            .map_err(|e| unknown_application(id, e))?;
        Ok(parse_containers(&value))
    }

    /// Fetch whatever aggregated container output the cluster currently
    /// exposes. Partial output is expected while the application runs.
    pub async fn logs(&self, id: &str) -> GantryResult<String> {
        let value = self
            .rm
            .get(&format!("/apps/{id}/logs"))
            .await
            .map_err(|e| unknown_application(id, e))?;
        Ok(match value {
            Value::String(text) => text,
            Value::Object(ref map) => match map.get("logs").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => value.to_string(),
            },
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}

/// Map a 404 rejection onto the state-error taxonomy; other errors pass
/// through untouched.
fn unknown_application(id: &str, err: GantryError) -> GantryError {
    match err {
        GantryError::Rejected { status: 404, .. } => {
            GantryError::ApplicationState(format!("unknown application {id}"))
        }
        other => other,
    }
}

/// Normalize a status payload, wrapped in `{"app": …}` or bare.
pub(crate) fn normalize_status(value: &Value) -> ApplicationStatus {
    let app = value.get("app").unwrap_or(value);
    let raw: RawApplication = serde_json::from_value(app.clone()).unwrap_or_default();
    ApplicationStatus {
        state: RuntimeState::from_raw(&raw.state),
        allocated_memory_mb: raw.allocated_mb,
        allocated_vcores: raw.allocated_vcores,
        running_containers: raw.running_containers,
    }
}

/// Normalize a container list payload, wrapped in `{"containers": …}` or
/// a bare array. Entries that fail to decode are dropped, not fatal.
pub(crate) fn parse_containers(value: &Value) -> Vec<ContainerRecord> {
    let list = value
        .get("containers")
        .unwrap_or(value)
        .as_array()
        .cloned()
        .unwrap_or_default();

    list.into_iter()
        .filter_map(|entry| serde_json::from_value::<RawContainer>(entry).ok())
        .filter(|raw| !raw.id.is_empty())
        .map(|raw| ContainerRecord {
            id: raw.id,
            host: raw.host,
            state: ContainerState::from_raw(&raw.state),
        })
        .collect()
}
