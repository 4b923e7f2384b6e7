//! Concurrent multi-endpoint workloads bracketed by a telemetry session.
//!
//! [`WorkloadOrchestrator::run_concurrent`] sends one logical request to every
//! endpoint at once and waits for all of them; a failing or slow endpoint
//! never cancels its siblings and the result list always has one entry per
//! endpoint, in input order. [`measure`] starts a sampler, runs a phase and
//! stops the sampler, returning the phase window in the sampler's clock.

mod client;
mod endpoint;

pub use client::{ExecutionService, HttpExecutionClient};
pub use endpoint::{
    CreateRequest, CreateResponse, DeleteAllResponse, DeleteRequest, DeleteResponse,
    EndpointHandle, ListResponse, Request, Response, RunEntry, RunRequest, RunResponse,
    RuntimeHandle,
};

use crate::config::OrchestratorConfig;
use crate::error::{EndpointError, SamplerError};
use crate::sampler::Sampler;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one endpoint's request.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointOutcome<T> {
    pub endpoint: EndpointHandle,
    pub result: Result<T, EndpointError>,
}

impl<T> EndpointOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Bounds of a measured phase, in epoch seconds of the sampler's clock.
///
/// Samples just outside the window may exist; the window is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseWindow {
    pub start: f64,
    pub end: f64,
}

impl PhaseWindow {
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn duration_secs(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug)]
pub struct Measured<T> {
    pub value: T,
    pub window: PhaseWindow,
    pub elapsed: Duration,
    /// Set when the sampler could not start; the phase ran unmonitored.
    pub monitor_error: Option<SamplerError>,
}

/// Start `sampler`, run `phase`, stop `sampler`.
///
/// A sampler that fails to start, including one whose session already
/// finished, is logged and reported in the result; the phase runs regardless
/// and the sampler is left as it was. `stop()` blocks the calling thread for
/// at most one in-flight snapshot.
pub async fn measure<F, T>(sampler: &mut Sampler, phase: F) -> Measured<T>
where
    F: Future<Output = T>,
{
    let monitor_error = match sampler.start() {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(session = %sampler.id(), error = %e, "sampler failed to start; running phase unmonitored");
            Some(e)
        }
    };

    let clock = sampler.clock();
    let start = clock.now_secs();
    let started = Instant::now();

    let value = phase.await;

    let elapsed = started.elapsed();
    let end = clock.now_secs();
    if monitor_error.is_none() {
        sampler.stop();
    }

    Measured {
        value,
        window: PhaseWindow { start, end },
        elapsed,
        monitor_error,
    }
}

/// What to create and run on every endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadPlan {
    pub artifact_path: String,
    pub runtimes_per_endpoint: usize,
    pub runtime_ids: Vec<RuntimeHandle>,
}

#[derive(Debug)]
pub struct WorkloadReport {
    pub created: Vec<EndpointOutcome<Response>>,
    pub ran: Vec<EndpointOutcome<Response>>,
    pub deleted: Vec<EndpointOutcome<Response>>,
    /// `None` when there was nothing to run.
    pub window: Option<PhaseWindow>,
    pub elapsed: Duration,
    pub monitor_error: Option<SamplerError>,
}

impl WorkloadReport {
    fn empty() -> Self {
        Self {
            created: Vec::new(),
            ran: Vec::new(),
            deleted: Vec::new(),
            window: None,
            elapsed: Duration::ZERO,
            monitor_error: None,
        }
    }

    /// Endpoint failures across all three phases.
    pub fn failure_count(&self) -> usize {
        self.created
            .iter()
            .chain(&self.ran)
            .chain(&self.deleted)
            .filter(|o| !o.is_ok())
            .count()
    }
}

pub struct WorkloadOrchestrator<S: ?Sized> {
    service: Arc<S>,
    request_timeout: Option<Duration>,
}

impl<S> WorkloadOrchestrator<S>
where
    S: ExecutionService + ?Sized + 'static,
{
    pub fn new(service: Arc<S>, config: &OrchestratorConfig) -> Self {
        Self {
            service,
            request_timeout: config.request_timeout(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Send `request` to every endpoint concurrently.
    pub async fn run_concurrent(
        &self,
        endpoints: &[EndpointHandle],
        request: &Request,
    ) -> Vec<EndpointOutcome<Response>> {
        let service = Arc::clone(&self.service);
        let request = request.clone();
        let kind = request.kind();
        tracing::debug!(request = kind, endpoints = endpoints.len(), "dispatching request");

        self.dispatch_all(endpoints, move |endpoint| {
            let service = Arc::clone(&service);
            let request = request.clone();
            async move { service.execute(&endpoint, &request).await }
        })
        .await
    }

    /// Run `op` once per endpoint, each in its own task, and wait for all.
    ///
    /// Outcomes are returned in input order. The configured timeout applies
    /// to each request separately.
    pub async fn dispatch_all<T, F, Fut>(
        &self,
        endpoints: &[EndpointHandle],
        op: F,
    ) -> Vec<EndpointOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(EndpointHandle) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, EndpointError>> + Send + 'static,
    {
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let op = op.clone();
            let target = endpoint.clone();
            let limit = self.request_timeout;
            let task = tokio::spawn(async move {
                let request = op(target);
                match limit {
                    Some(limit) => tokio::time::timeout(limit, request)
                        .await
                        .unwrap_or(Err(EndpointError::Timeout(limit))),
                    None => request.await,
                }
            });
            tasks.push((endpoint.clone(), task));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (endpoint, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(EndpointError::Aborted(e.to_string())),
            };
            if let Err(e) = &result {
                tracing::warn!(endpoint = %endpoint, error = %e, "endpoint request failed");
            }
            outcomes.push(EndpointOutcome { endpoint, result });
        }
        outcomes
    }

    /// Create runtimes on every endpoint, run them while `sampler` records,
    /// then delete them.
    ///
    /// With no endpoints nothing is sent and the sampler is never started.
    pub async fn run_workload(
        &self,
        endpoints: &[EndpointHandle],
        plan: &WorkloadPlan,
        sampler: &mut Sampler,
    ) -> WorkloadReport {
        if endpoints.is_empty() {
            tracing::info!("no endpoints configured; skipping workload");
            return WorkloadReport::empty();
        }

        let create = Request::Create(CreateRequest {
            count: plan.runtimes_per_endpoint,
            artifact_path: plan.artifact_path.clone(),
        });
        let created = self.run_concurrent(endpoints, &create).await;
        for outcome in &created {
            if let Ok(Response::Created(resp)) = &outcome.result {
                tracing::info!(endpoint = %outcome.endpoint, total = resp.total_runtimes, "runtimes created");
            }
        }

        let run = Request::Run(RunRequest {
            runtime_ids: plan.runtime_ids.clone(),
        });
        let measured = measure(sampler, self.run_concurrent(endpoints, &run)).await;
        tracing::info!(
            elapsed_secs = measured.elapsed.as_secs_f64(),
            endpoints = endpoints.len(),
            "run phase completed"
        );

        let deleted = self.run_concurrent(endpoints, &Request::DeleteAll).await;

        WorkloadReport {
            created,
            ran: measured.value,
            deleted,
            window: Some(measured.window),
            elapsed: measured.elapsed,
            monitor_error: measured.monitor_error,
        }
    }
}
