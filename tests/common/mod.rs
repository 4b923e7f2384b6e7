//! Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use workload_telemetry::collectors::{Snapshot, TelemetryHandle, TelemetrySource};
use workload_telemetry::orchestrator::{
    CreateRequest, CreateResponse, DeleteAllResponse, DeleteRequest, DeleteResponse,
    ListResponse, RunEntry, RunRequest, RunResponse,
};
use workload_telemetry::{
    CollectorError, EndpointError, EndpointHandle, ExecutionService, HttpExecutionClient,
};

// =========================================================================
// Telemetry
// =========================================================================

/// Replays a fixed list of snapshot outcomes, then keeps failing
/// transiently so that no further samples are recorded.
pub struct ScriptedSource {
    script: Vec<Result<(), CollectorError>>,
    calls: Arc<AtomicU64>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<(), CollectorError>>) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.calls)
    }
}

impl TelemetrySource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&self) -> Result<Box<dyn TelemetryHandle>, CollectorError> {
        Ok(Box::new(ScriptedHandle {
            script: self.script.clone().into(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedHandle {
    script: VecDeque<Result<(), CollectorError>>,
    calls: Arc<AtomicU64>,
}

impl TelemetryHandle for ScriptedHandle {
    fn snapshot(&mut self) -> Result<Snapshot, CollectorError> {
        let tick = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(())) => {
                let mut snap = Snapshot::new();
                snap.insert("tick".into(), (tick as f64).into());
                Ok(snap)
            }
            Some(Err(e)) => Err(e),
            None => Err(CollectorError::transient("script exhausted")),
        }
    }
}

/// Succeeds `healthy_ticks` times, then panics inside `snapshot()`.
pub struct PanickingSource {
    healthy_ticks: u64,
}

impl PanickingSource {
    pub fn new(healthy_ticks: u64) -> Self {
        Self { healthy_ticks }
    }
}

impl TelemetrySource for PanickingSource {
    fn name(&self) -> &str {
        "panicking"
    }

    fn open(&self) -> Result<Box<dyn TelemetryHandle>, CollectorError> {
        Ok(Box::new(PanickingHandle {
            healthy_ticks: self.healthy_ticks,
            tick: 0,
        }))
    }
}

struct PanickingHandle {
    healthy_ticks: u64,
    tick: u64,
}

impl TelemetryHandle for PanickingHandle {
    fn snapshot(&mut self) -> Result<Snapshot, CollectorError> {
        self.tick += 1;
        if self.tick > self.healthy_ticks {
            panic!("driver segfault emulation at tick {}", self.tick);
        }
        let mut snap = Snapshot::new();
        snap.insert("tick".into(), (self.tick as f64).into());
        Ok(snap)
    }
}

/// Poll `cond` every millisecond until it holds or `limit` passes.
pub fn wait_until<F: Fn() -> bool>(limit: Duration, cond: F) -> bool {
    let deadline = std::time::Instant::now() + limit;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

// =========================================================================
// Execution service
// =========================================================================

#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed { delay: Duration },
    Fail,
    Hang,
    Panic,
}

/// In-memory execution service keyed by endpoint port.
#[derive(Default)]
pub struct FakeService {
    behaviors: HashMap<u16, Behavior>,
    log: Mutex<Vec<(u16, &'static str)>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, port: u16, behavior: Behavior) -> Self {
        self.behaviors.insert(port, behavior);
        self
    }

    pub fn calls(&self) -> Vec<(u16, &'static str)> {
        self.log.lock().unwrap().clone()
    }

    async fn act(&self, endpoint: &EndpointHandle, op: &'static str) -> Result<(), EndpointError> {
        self.log.lock().unwrap().push((endpoint.port, op));
        let behavior = self
            .behaviors
            .get(&endpoint.port)
            .cloned()
            .unwrap_or(Behavior::Succeed { delay: Duration::ZERO });
        match behavior {
            Behavior::Succeed { delay } => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behavior::Fail => Err(EndpointError::Status {
                code: 500,
                body: format!("{op} failed on {endpoint}"),
            }),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Behavior::Panic => panic!("executor crashed"),
        }
    }
}

#[async_trait]
impl ExecutionService for FakeService {
    async fn create(
        &self,
        endpoint: &EndpointHandle,
        request: &CreateRequest,
    ) -> Result<CreateResponse, EndpointError> {
        self.act(endpoint, "create").await?;
        Ok(CreateResponse {
            status: "created".into(),
            created: Some(request.count),
            total_runtimes: request.count,
            elapsed_ms: Some(1),
        })
    }

    async fn run(
        &self,
        endpoint: &EndpointHandle,
        request: &RunRequest,
    ) -> Result<RunResponse, EndpointError> {
        self.act(endpoint, "run").await?;
        Ok(RunResponse {
            results: request
                .runtime_ids
                .iter()
                .map(|id| RunEntry::Message(format!("Runtime {id} executed on {}", endpoint.port)))
                .collect(),
            missing: Vec::new(),
            total_elapsed_ms: None,
        })
    }

    async fn list(&self, endpoint: &EndpointHandle) -> Result<ListResponse, EndpointError> {
        self.act(endpoint, "list").await?;
        Ok(ListResponse {
            ids: Vec::new(),
            total: 0,
        })
    }

    async fn delete(
        &self,
        endpoint: &EndpointHandle,
        request: &DeleteRequest,
    ) -> Result<DeleteResponse, EndpointError> {
        self.act(endpoint, "delete").await?;
        // Only runtime 0 exists on a fake endpoint.
        let (removed, missing): (Vec<_>, Vec<_>) =
            request.runtime_ids.iter().copied().partition(|id| id.0 == 0);
        Ok(DeleteResponse {
            removed,
            missing,
            total_remaining: 0,
        })
    }

    async fn delete_all(
        &self,
        endpoint: &EndpointHandle,
    ) -> Result<DeleteAllResponse, EndpointError> {
        self.act(endpoint, "delete_all").await?;
        Ok(DeleteAllResponse {
            status: Some("deleted".into()),
            removed: Vec::new(),
            total_remaining: 0,
        })
    }
}

pub fn endpoint(port: u16) -> EndpointHandle {
    EndpointHandle::new("127.0.0.1", port)
}

// =========================================================================
// HTTP
// =========================================================================

/// Client that ignores proxy settings from the environment.
pub fn http_client() -> HttpExecutionClient {
    HttpExecutionClient::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Minimal HTTP/1.1 responder: answers each path with a canned status and
/// JSON body and records what it received.
pub struct MockServer {
    pub endpoint: EndpointHandle,
    pub received: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn start(routes: Vec<(&'static str, u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<HashMap<&'static str, (u16, &'static str)>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path, (status, body)))
                .collect(),
        );
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = Arc::clone(&routes);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut stream).await else {
                        return;
                    };
                    let (status, body) = routes
                        .get(request.path.as_str())
                        .copied()
                        .unwrap_or((404, r#"{"error":"not found"}"#));
                    log.lock().unwrap().push(request);
                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            endpoint: EndpointHandle::new("127.0.0.1", port),
            received,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.received.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(RecordedRequest { method, path, body })
}
