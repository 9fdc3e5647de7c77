//! HTTP client for the cluster status/control API.
//!
//! One connection per request: connect, handshake, send, collect the
//! body. The cluster APIs Gantry talks to are low-volume control-plane
//! endpoints, so connection reuse buys nothing over the simplicity of a
//! fresh connect per call.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use gantry_state::{ClusterEndpoint, GantryError, GantryResult};

use crate::retry::RetryPolicy;

/// HTTP method selector for a single cluster call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Thin HTTP(S) transport over one cluster service endpoint.
///
/// Holds no per-application state; safe for concurrent use by multiple
/// controllers.
#[derive(Debug, Clone)]
pub struct RestClient {
    endpoint: ClusterEndpoint,
    /// Per-request deadline covering connect, send, and body read.
    timeout: Duration,
    retry: RetryPolicy,
}

impl RestClient {
    /// Create a client for one endpoint with default timeout and retry
    /// policy.
    pub fn new(endpoint: ClusterEndpoint) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    /// Idempotent read. Retried on transient failures per the retry
    /// policy; 4xx/5xx rejections are surfaced immediately.
    pub async fn get(&self, path: &str) -> GantryResult<Value> {
        let mut attempt = 0;
        loop {
            match self.request_once(Method::Get, path, None, "application/json").await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        path,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Mutating call; never retried here. A duplicate submission is worse
    /// than a surfaced transient error.
    pub async fn post(&self, path: &str, body: &Value) -> GantryResult<Value> {
        let bytes = Bytes::from(serde_json::to_vec(body).map_err(|e| {
            GantryError::Protocol(format!("failed to encode request body: {e}"))
        })?);
        self.request_once(Method::Post, path, Some(bytes), "application/json")
            .await
    }

    /// Mutating call; never retried here.
    pub async fn put(&self, path: &str, body: &Value) -> GantryResult<Value> {
        let bytes = Bytes::from(serde_json::to_vec(body).map_err(|e| {
            GantryError::Protocol(format!("failed to encode request body: {e}"))
        })?);
        self.request_once(Method::Put, path, Some(bytes), "application/json")
            .await
    }

    /// Mutating call; never retried here.
    pub async fn delete(&self, path: &str) -> GantryResult<Value> {
        self.request_once(Method::Delete, path, None, "application/json")
            .await
    }

    /// Raw upload used for staging file payloads. Write-once semantics at
    /// the staging area make a retry a duplicate write, so no retries.
    pub async fn put_bytes(&self, path: &str, body: Bytes) -> GantryResult<()> {
        self.request_once(Method::Put, path, Some(body), "application/octet-stream")
            .await
            .map(|_| ())
    }

    /// One request over a fresh connection.
    async fn request_once(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        content_type: &str,
    ) -> GantryResult<Value> {
        let address = self.endpoint.address();
        let uri = format!("http://{address}{path}");

        let result = tokio::time::timeout(self.timeout, async {
            let stream = TcpStream::connect(&address).await.map_err(|e| {
                GantryError::Transient(format!("connect to {address} failed: {e}"))
            })?;

            let io = TokioIo::new(stream);
            let (mut sender, conn) =
                hyper::client::conn::http1::handshake(io).await.map_err(|e| {
                    GantryError::Transient(format!("handshake with {address} failed: {e}"))
                })?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method(method.as_str())
                .uri(&uri)
                .header("host", &address)
                .header("content-type", content_type)
                .header("user-agent", "gantry/0.1")
                .body(Full::new(body.unwrap_or_default()))
                .map_err(|e| GantryError::Protocol(format!("invalid request: {e}")))?;

            debug!(method = method.as_str(), %uri, "cluster call");

            let resp = sender.send_request(req).await.map_err(|e| {
                GantryError::Transient(format!("request to {uri} failed: {e}"))
            })?;

            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| {
                    GantryError::Transient(format!("reading response from {uri} failed: {e}"))
                })?
                .to_bytes();

            if !status.is_success() {
                let message = String::from_utf8_lossy(&bytes).trim().to_string();
                return Err(GantryError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&bytes).map_err(|e| {
                GantryError::Protocol(format!("response from {uri} is not JSON: {e}"))
            })
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(GantryError::Transient(format!(
                "request to {uri} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}
