use super::endpoint::{
    CreateRequest, CreateResponse, DeleteAllResponse, DeleteRequest, DeleteResponse,
    EndpointHandle, ListResponse, Request, Response, RunRequest, RunResponse,
};
use crate::error::EndpointError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Operations of a remote execution service. Each call takes an unknown,
/// possibly long, amount of wall-clock time.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn create(
        &self,
        endpoint: &EndpointHandle,
        request: &CreateRequest,
    ) -> Result<CreateResponse, EndpointError>;

    async fn run(
        &self,
        endpoint: &EndpointHandle,
        request: &RunRequest,
    ) -> Result<RunResponse, EndpointError>;

    async fn list(&self, endpoint: &EndpointHandle) -> Result<ListResponse, EndpointError>;

    /// Remove the given runtimes. Unknown ids are reported, not rejected.
    async fn delete(
        &self,
        endpoint: &EndpointHandle,
        request: &DeleteRequest,
    ) -> Result<DeleteResponse, EndpointError>;

    async fn delete_all(&self, endpoint: &EndpointHandle)
        -> Result<DeleteAllResponse, EndpointError>;

    async fn execute(
        &self,
        endpoint: &EndpointHandle,
        request: &Request,
    ) -> Result<Response, EndpointError> {
        match request {
            Request::Create(req) => self.create(endpoint, req).await.map(Response::Created),
            Request::Run(req) => self.run(endpoint, req).await.map(Response::Ran),
            Request::List => self.list(endpoint).await.map(Response::Listed),
            Request::Delete(req) => self.delete(endpoint, req).await.map(Response::Removed),
            Request::DeleteAll => self.delete_all(endpoint).await.map(Response::Deleted),
        }
    }
}

/// JSON-over-HTTP client for the executor server (`POST /create`, `/run`,
/// `/list`, `/delete`, `/delete_all`).
#[derive(Debug, Clone)]
pub struct HttpExecutionClient {
    client: reqwest::Client,
}

impl HttpExecutionClient {
    pub fn new() -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("workload-telemetry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post<B, R>(
        &self,
        endpoint: &EndpointHandle,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, EndpointError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(endpoint.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| EndpointError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionClient {
    async fn create(
        &self,
        endpoint: &EndpointHandle,
        request: &CreateRequest,
    ) -> Result<CreateResponse, EndpointError> {
        self.post(endpoint, "create", Some(request)).await
    }

    async fn run(
        &self,
        endpoint: &EndpointHandle,
        request: &RunRequest,
    ) -> Result<RunResponse, EndpointError> {
        self.post(endpoint, "run", Some(request)).await
    }

    async fn list(&self, endpoint: &EndpointHandle) -> Result<ListResponse, EndpointError> {
        self.post::<(), _>(endpoint, "list", None).await
    }

    async fn delete(
        &self,
        endpoint: &EndpointHandle,
        request: &DeleteRequest,
    ) -> Result<DeleteResponse, EndpointError> {
        self.post(endpoint, "delete", Some(request)).await
    }

    async fn delete_all(
        &self,
        endpoint: &EndpointHandle,
    ) -> Result<DeleteAllResponse, EndpointError> {
        self.post::<(), _>(endpoint, "delete_all", None).await
    }
}
