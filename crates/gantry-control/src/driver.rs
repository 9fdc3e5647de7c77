//! Lifecycle driver — the façade coordinating validation, submission,
//! polling, and scaling for exactly one application.
//!
//! The state machine:
//!
//! ```text
//! CREATED ──start()──▶ SUBMITTED ──poll──▶ RUNNING (observed, not forced)
//!                                   │
//!                                   ▼
//!                      FINISHED | FAILED | KILLED   (terminal, latched)
//! ```
//!
//! Scaling does not change the phase. Once a poll observes a terminal
//! state, further start/scale/kill calls fail with an explicit state
//! error instead of silently doing nothing.
//!
//! The driver runs no background tasks: every status observation is
//! triggered by the caller, and the cooperative wait helper is one
//! blocking call with an internal bounded poll loop. Mutating calls take
//! `&mut self`, so one driver cannot race its own scale requests; two
//! controllers mutating the same application concurrently are undefined
//! at the cluster and deliberately not reconciled here.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use gantry_cluster::{EndpointOptions, EndpointPair, validate_endpoints};
use gantry_rest::{RestClient, RetryPolicy};
use gantry_state::{
    ApplicationId, ApplicationStatus, ContainerId, ContainerRecord, GantryError,
    GantryResult, LaunchSpec, RuntimeState,
};

use crate::poll::Poller;
use crate::scale::Scaler;
use crate::stage::HttpStaging;
use crate::submit::Submitter;

/// Tunables for one driver instance.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Cadence of the cooperative wait loop.
    pub poll_interval: Duration,
    /// Per-request transport deadline.
    pub request_timeout: Duration,
    /// Retry budget for idempotent reads.
    pub retry: RetryPolicy,
    /// Management containers the cluster allocates on top of the
    /// requested count. Cluster-configuration-dependent, so a tunable
    /// rather than a literal.
    pub overhead_containers: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            overhead_containers: 1,
        }
    }
}

/// Client-side controller for a single application.
///
/// Owns the `ApplicationId` for the life of the process and the
/// last-observed status/container snapshots. Everything else is
/// stateless and re-derives from fresh cluster calls.
pub struct Driver {
    endpoints: EndpointPair,
    options: DriverOptions,
    submitter: Submitter,
    poller: Poller,
    scaler: Scaler,
    /// Control client for kill requests.
    rm: RestClient,
    app_id: Option<ApplicationId>,
    /// Last status snapshot, replaced wholesale on every poll.
    last_status: Option<ApplicationStatus>,
    /// Last observed container set, keyed by container id, replaced
    /// wholesale on every container poll.
    containers: BTreeMap<ContainerId, ContainerRecord>,
}

impl Driver {
    /// Validate the cluster endpoints and construct a driver in the
    /// CREATED phase. No operation below runs with unvalidated
    /// endpoints.
    pub async fn connect(
        endpoints: EndpointOptions,
        options: DriverOptions,
    ) -> GantryResult<Self> {
        let pair = validate_endpoints(&endpoints).await?;

        let rm = RestClient::new(pair.resource_manager.clone())
            .with_timeout(options.request_timeout)
            .with_retry(options.retry.clone());
        let staging_client = RestClient::new(pair.metadata.clone())
            .with_timeout(options.request_timeout)
            .with_retry(options.retry.clone());

        Ok(Self {
            submitter: Submitter::new(
                rm.clone(),
                Box::new(HttpStaging::new(staging_client)),
            ),
            poller: Poller::new(rm.clone()),
            scaler: Scaler::new(rm.clone()),
            rm,
            endpoints: pair,
            options,
            app_id: None,
            last_status: None,
            containers: BTreeMap::new(),
        })
    }

    /// The validated endpoints this driver operates against.
    pub fn endpoints(&self) -> &EndpointPair {
        &self.endpoints
    }

    /// The application this driver manages, once started.
    pub fn application_id(&self) -> Option<&ApplicationId> {
        self.app_id.as_ref()
    }

    /// Last status snapshot, if any poll has completed.
    pub fn last_status(&self) -> Option<&ApplicationStatus> {
        self.last_status.as_ref()
    }

    /// Last observed container set, keyed by container id.
    pub fn last_containers(&self) -> &BTreeMap<ContainerId, ContainerRecord> {
        &self.containers
    }

    /// Container count expected once `requested` workers are running,
    /// including the management overhead.
    pub fn expected_containers(&self, requested: u32) -> u32 {
        requested + self.options.overhead_containers
    }

    /// Submit the application. One driver manages exactly one
    /// application lifetime; a second start is a state error.
    pub async fn start(&mut self, spec: &LaunchSpec) -> GantryResult<ApplicationId> {
        if let Some(id) = &self.app_id {
            return Err(GantryError::ApplicationState(format!(
                "driver already manages application {id}"
            )));
        }

        let id = self.submitter.submit(spec).await?;
        self.app_id = Some(id.clone());
        Ok(id)
    }

    /// Poll the application status, replacing the local snapshot.
    pub async fn status(&mut self) -> GantryResult<ApplicationStatus> {
        let id = self.current_application()?.clone();
        let status = self.poller.status(&id).await?;
        self.last_status = Some(status.clone());
        Ok(status)
    }

    /// Poll just the runtime state.
    pub async fn runtime_state(&mut self) -> GantryResult<RuntimeState> {
        Ok(self.status().await?.state)
    }

    /// Poll the current container set, replacing the local snapshot.
    /// Membership changes only through submit/scale or cluster-side
    /// replacement observed here.
    pub async fn containers(&mut self) -> GantryResult<Vec<ContainerRecord>> {
        let id = self.current_application()?.clone();
        let records = self.poller.containers(&id).await?;
        self.containers = records
            .iter()
            .map(|record| (record.id.clone(), record.clone()))
            .collect();
        Ok(records)
    }

    /// Request additional containers with the original resource shape.
    /// Returns the new containers only; poll to observe them running.
    pub async fn add_containers(
        &mut self,
        count: u32,
    ) -> GantryResult<Vec<ContainerRecord>> {
        let id = self.active_application()?.clone();
        self.scaler.add_containers(&id, count).await
    }

    /// Remove specific containers. The cluster is the ground truth for
    /// membership; reconcile with a fresh `containers()` poll afterward.
    pub async fn remove_containers(
        &mut self,
        containers: &[ContainerId],
    ) -> GantryResult<()> {
        let id = self.active_application()?.clone();
        self.scaler.remove_containers(&id, containers).await
    }

    /// Request termination. `true` means the cluster accepted the
    /// request — not that the application has reached KILLED yet; poll
    /// for certainty.
    pub async fn kill(&mut self) -> GantryResult<bool> {
        let id = self.active_application()?.clone();
        self.rm
            .put(&format!("/apps/{id}/state"), &json!({ "state": "KILLED" }))
            .await
            .map_err(|e| match e {
                GantryError::Rejected { status, message } if status == 404 || status == 409 => {
                    GantryError::ApplicationState(format!("cannot kill {id}: {message}"))
                }
                other => other,
            })?;
        info!(app_id = %id, "kill request accepted");
        Ok(true)
    }

    /// Cooperatively wait until the application reaches a terminal
    /// state. Returns `false` on timeout without killing the
    /// application — that decision belongs to the caller.
    pub async fn wait_for_completion(&mut self, timeout: Duration) -> GantryResult<bool> {
        let started = tokio::time::Instant::now();
        loop {
            let status = self.status().await?;
            if status.state.is_terminal() {
                info!(state = %status.state, "application completed");
                return Ok(true);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    state = %status.state,
                    waited_ms = elapsed.as_millis() as u64,
                    "wait for completion timed out"
                );
                return Ok(false);
            }
            let remaining = timeout - elapsed;
            tokio::time::sleep(self.options.poll_interval.min(remaining)).await;
        }
    }

    /// Fetch aggregated container output. While the application runs
    /// this returns whatever partial output the cluster exposes; it
    /// never blocks waiting for completion.
    pub async fn logs(&mut self) -> GantryResult<String> {
        let id = self.current_application()?.clone();
        self.poller.logs(&id).await
    }

    /// The managed application, started or not.
    fn current_application(&self) -> GantryResult<&ApplicationId> {
        self.app_id.as_ref().ok_or_else(|| {
            GantryError::ApplicationState("no application has been started".into())
        })
    }

    /// The managed application, additionally checked against the last
    /// observed snapshot: mutating a terminal application is an error.
    /// The cluster enforces the same rule for terminal states this
    /// driver has not observed yet.
    fn active_application(&self) -> GantryResult<&ApplicationId> {
        let id = self.current_application()?;
        if let Some(status) = &self.last_status {
            if status.state.is_terminal() {
                return Err(GantryError::ApplicationState(format!(
                    "application {id} is already terminal ({})",
                    status.state
                )));
            }
        }
        Ok(id)
    }
}
