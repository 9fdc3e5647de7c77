//! In-process mock cluster for integration tests.
//!
//! Serves the resource-manager REST API and the staging upload API on one
//! ephemeral axum server. Application state advances lazily, computed
//! from elapsed time on each read: submitted → accepted → running →
//! finished on a deadline parsed from `sleep N` commands, with kills
//! latching immediately. No background tasks, so tests are
//! deterministic under arbitrary scheduling.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use gantry_cluster::EndpointOptions;
use gantry_control::{Driver, DriverOptions};
use gantry_rest::RetryPolicy;

/// Memory reserved by the management (master) container.
pub const MASTER_MEMORY_MB: u64 = 128;

/// Time from submission to the SUBMITTED → ACCEPTED transition.
const ACCEPT_AFTER: Duration = Duration::from_millis(40);
/// Time from submission to the ACCEPTED → RUNNING transition.
const RUN_AFTER: Duration = Duration::from_millis(140);
/// Time for a requested container to reach RUNNING.
const CONTAINER_SPINUP: Duration = Duration::from_millis(120);
/// Wall-clock length of one `sleep` second.
const TICK: Duration = Duration::from_millis(100);
/// Run duration for commands that are not `sleep N`.
const DEFAULT_RUN: Duration = Duration::from_millis(300);

struct MockContainer {
    id: String,
    host: String,
    requested_at: Instant,
    is_master: bool,
    removed: bool,
}

struct MockApp {
    command: String,
    memory_mb: u64,
    vcores: u32,
    files: Vec<String>,
    environment_archive: Option<String>,
    submitted_at: Instant,
    run_duration: Duration,
    killed: bool,
    containers: Vec<MockContainer>,
}

impl MockApp {
    fn state(&self, now: Instant) -> &'static str {
        if self.killed {
            return "KILLED";
        }
        let elapsed = now.duration_since(self.submitted_at);
        if elapsed < ACCEPT_AFTER {
            "SUBMITTED"
        } else if elapsed < RUN_AFTER {
            "ACCEPTED"
        } else if elapsed >= RUN_AFTER + self.run_duration {
            "FINISHED"
        } else {
            "RUNNING"
        }
    }

    fn is_terminal(&self, now: Instant) -> bool {
        matches!(self.state(now), "FINISHED" | "KILLED")
    }

    fn container_running(&self, container: &MockContainer, now: Instant) -> bool {
        !container.removed
            && self.state(now) == "RUNNING"
            && now.duration_since(container.requested_at) >= CONTAINER_SPINUP
    }

    fn status_payload(&self, now: Instant) -> Value {
        let mut running = 0u32;
        let mut memory = 0u64;
        let mut vcores = 0u32;
        for container in &self.containers {
            if self.container_running(container, now) {
                running += 1;
                if container.is_master {
                    memory += MASTER_MEMORY_MB;
                    vcores += 1;
                } else {
                    memory += self.memory_mb;
                    vcores += self.vcores;
                }
            }
        }
        json!({
            "app": {
                "state": self.state(now),
                "allocatedMB": memory,
                "allocatedVCores": vcores,
                "runningContainers": running,
            }
        })
    }

    fn containers_payload(&self, now: Instant) -> Value {
        let list: Vec<Value> = self
            .containers
            .iter()
            .filter(|c| !c.removed)
            .map(|c| {
                let state = if self.container_running(c, now) {
                    "RUNNING"
                } else if self.is_terminal(now) {
                    "COMPLETE"
                } else {
                    "NEW"
                };
                json!({"id": c.id, "host": c.host, "state": state})
            })
            .collect();
        json!({ "containers": list })
    }
}

#[derive(Default)]
struct ClusterState {
    next_app: u32,
    next_container: u32,
    apps: HashMap<String, MockApp>,
    staged: Vec<String>,
}

impl ClusterState {
    fn new_container(&mut self, now: Instant, is_master: bool) -> MockContainer {
        self.next_container += 1;
        MockContainer {
            id: format!("container_{:06}", self.next_container),
            host: format!("node-{}", self.next_container % 3 + 1),
            requested_at: now,
            is_master,
            removed: false,
        }
    }
}

type Shared = Arc<Mutex<ClusterState>>;

fn parse_run_duration(command: &str) -> Duration {
    match command.strip_prefix("sleep ") {
        Some(rest) => match rest.trim().parse::<u32>() {
            Ok(secs) => TICK * secs,
            Err(_) => DEFAULT_RUN,
        },
        None => DEFAULT_RUN,
    }
}

async fn submit_app(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    let command = match body.get("command").and_then(Value::as_str) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "command is required"})),
            );
        }
    };
    let num_containers = body
        .get("numContainers")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;
    let memory_mb = body.get("memoryMb").and_then(Value::as_u64).unwrap_or(128);
    let vcores = body
        .get("virtualCores")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;
    let files: Vec<String> = body
        .get("files")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let environment_archive = body
        .get("environmentArchive")
        .and_then(Value::as_str)
        .map(str::to_string);

    let now = Instant::now();
    let mut cluster = state.lock().unwrap();
    cluster.next_app += 1;
    let id = format!("application_1700000000_{:04}", cluster.next_app);

    let mut containers = vec![cluster.new_container(now, true)];
    for _ in 0..num_containers {
        containers.push(cluster.new_container(now, false));
    }

    cluster.apps.insert(
        id.clone(),
        MockApp {
            run_duration: parse_run_duration(&command),
            command,
            memory_mb,
            vcores,
            files,
            environment_archive,
            submitted_at: now,
            killed: false,
            containers,
        },
    );
    (StatusCode::OK, Json(json!({ "id": id })))
}

async fn app_status(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let cluster = state.lock().unwrap();
    match cluster.apps.get(&id) {
        Some(app) => (StatusCode::OK, Json(app.status_payload(Instant::now()))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such application"})),
        ),
    }
}

async fn app_containers(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let cluster = state.lock().unwrap();
    match cluster.apps.get(&id) {
        Some(app) => (StatusCode::OK, Json(app.containers_payload(Instant::now()))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such application"})),
        ),
    }
}

async fn add_containers(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let count = body.get("count").and_then(Value::as_u64).unwrap_or(0) as u32;
    if count == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "count must be positive"})),
        );
    }

    let now = Instant::now();
    let mut cluster = state.lock().unwrap();
    let Some(app) = cluster.apps.get(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such application"})),
        );
    };
    if app.is_terminal(now) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "application is terminal"})),
        );
    }

    let mut added = Vec::new();
    for _ in 0..count {
        let container = cluster.new_container(now, false);
        added.push(json!({"id": container.id, "host": container.host, "state": "NEW"}));
        cluster.apps.get_mut(&id).unwrap().containers.push(container);
    }
    (StatusCode::OK, Json(json!({ "containers": added })))
}

async fn remove_container(
    State(state): State<Shared>,
    Path((id, cid)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut cluster = state.lock().unwrap();
    let Some(app) = cluster.apps.get_mut(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such application"})),
        );
    };
    match app
        .containers
        .iter_mut()
        .find(|c| c.id == cid && !c.removed)
    {
        Some(container) => {
            container.removed = true;
            (StatusCode::OK, Json(json!({"removed": cid})))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such container"})),
        ),
    }
}

async fn set_app_state(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let requested = body.get("state").and_then(Value::as_str).unwrap_or("");
    if requested != "KILLED" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "only KILLED is supported"})),
        );
    }

    let now = Instant::now();
    let mut cluster = state.lock().unwrap();
    let Some(app) = cluster.apps.get_mut(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such application"})),
        );
    };
    if app.is_terminal(now) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "application is terminal"})),
        );
    }
    app.killed = true;
    (StatusCode::OK, Json(json!({"state": "KILLED"})))
}

async fn app_logs(State(state): State<Shared>, Path(id): Path<String>) -> impl IntoResponse {
    let cluster = state.lock().unwrap();
    match cluster.apps.get(&id) {
        Some(app) => {
            let logs = match app.state(Instant::now()) {
                "SUBMITTED" | "ACCEPTED" => String::new(),
                _ => format!("stdout: {}\n", app.command),
            };
            (StatusCode::OK, Json(json!({ "logs": logs })))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "no such application"})),
        ),
    }
}

async fn stage_file(
    State(state): State<Shared>,
    Path((token, file)): Path<(String, String)>,
    _body: axum::body::Bytes,
) -> impl IntoResponse {
    state
        .lock()
        .unwrap()
        .staged
        .push(format!("/staging/{token}/{file}"));
    StatusCode::CREATED
}

/// Handle to the running mock cluster.
#[derive(Clone)]
pub struct MockCluster {
    pub addr: SocketAddr,
    state: Shared,
}

/// Install a test subscriber once so `RUST_LOG=debug` surfaces driver
/// logs during test runs.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

impl MockCluster {
    pub async fn spawn() -> Self {
        init_tracing();
        let state: Shared = Arc::new(Mutex::new(ClusterState::default()));
        let router = Router::new()
            .route("/apps", post(submit_app))
            .route("/apps/{id}", get(app_status))
            .route("/apps/{id}/containers", get(app_containers).post(add_containers))
            .route("/apps/{id}/containers/{cid}", delete(remove_container))
            .route("/apps/{id}/state", put(set_app_state))
            .route("/apps/{id}/logs", get(app_logs))
            .route("/staging/{token}/{file}", put(stage_file))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn app_count(&self) -> usize {
        self.state.lock().unwrap().apps.len()
    }

    pub fn staged_paths(&self) -> Vec<String> {
        self.state.lock().unwrap().staged.clone()
    }

    /// Files referenced by the submitted launch request.
    pub fn submitted_files(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .apps
            .get(id)
            .map(|app| app.files.clone())
            .unwrap_or_default()
    }

    pub fn submitted_environment(&self, id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .apps
            .get(id)
            .and_then(|app| app.environment_archive.clone())
    }

    /// Endpoint options pointing both services at this mock.
    pub fn endpoint_options(&self) -> EndpointOptions {
        EndpointOptions {
            metadata_host: self.addr.ip().to_string(),
            metadata_port: self.addr.port() as u32,
            rm_host: self.addr.ip().to_string(),
            rm_port: self.addr.port() as u32,
            ..EndpointOptions::default()
        }
    }
}

/// Driver options tuned for fast test polling.
pub fn test_options() -> DriverOptions {
    DriverOptions {
        poll_interval: Duration::from_millis(25),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        overhead_containers: 1,
    }
}

/// Connect a driver to the mock cluster.
pub async fn connect(mock: &MockCluster) -> Driver {
    Driver::connect(mock.endpoint_options(), test_options())
        .await
        .expect("driver connects to mock cluster")
}
