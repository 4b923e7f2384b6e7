//! Endpoint identity and the request/response payloads of the remote
//! execution service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One remote execution service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointHandle {
    pub host: String,
    pub port: u16,
}

impl EndpointHandle {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `host:port`, with or without a leading `http://`.
impl FromStr for EndpointHandle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("http://").trim_end_matches('/');
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got '{s}'"))?;
        if host.is_empty() {
            return Err(format!("missing host in '{s}'"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in '{s}': {e}"))?;
        Ok(Self::new(host, port))
    }
}

/// Identifier of a runtime created on one endpoint. Passed through as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeHandle(pub u64);

impl fmt::Display for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub count: usize,
    #[serde(rename = "wasm_path")]
    pub artifact_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub status: String,
    #[serde(default)]
    pub created: Option<usize>,
    pub total_runtimes: usize,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub runtime_ids: Vec<RuntimeHandle>,
}

/// One runtime's result. Older servers answer with a bare message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunEntry {
    Message(String),
    Detailed {
        #[serde(default)]
        id: Option<RuntimeHandle>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        elapsed_ms: Option<u64>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl RunEntry {
    pub fn message(&self) -> &str {
        match self {
            RunEntry::Message(m) => m,
            RunEntry::Detailed { result: Some(r), .. } => r,
            RunEntry::Detailed { error: Some(e), .. } => e,
            RunEntry::Detailed { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub results: Vec<RunEntry>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub total_elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default, alias = "runtimes")]
    pub ids: Vec<RuntimeHandle>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub removed: Vec<RuntimeHandle>,
    #[serde(default)]
    pub total_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub runtime_ids: Vec<RuntimeHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub removed: Vec<RuntimeHandle>,
    /// Requested ids the endpoint did not know.
    #[serde(default)]
    pub missing: Vec<RuntimeHandle>,
    #[serde(default)]
    pub total_remaining: usize,
}

/// A logical request sent identically to every endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create(CreateRequest),
    Run(RunRequest),
    List,
    Delete(DeleteRequest),
    DeleteAll,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Create(_) => "create",
            Request::Run(_) => "run",
            Request::List => "list",
            Request::Delete(_) => "delete",
            Request::DeleteAll => "delete_all",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Created(CreateResponse),
    Ran(RunResponse),
    Listed(ListResponse),
    Removed(DeleteResponse),
    Deleted(DeleteAllResponse),
}
