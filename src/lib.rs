//! Resource telemetry recorded around concurrent multi-endpoint workloads.
//!
//! A [`Sampler`] snapshots a [`TelemetrySource`] on its own thread while a
//! [`WorkloadOrchestrator`] drives the same request against several remote
//! execution services. [`measure`] brackets a phase with a sampling session
//! and [`SampleTable`] turns the result into a flat time-ordered table.

pub mod collectors;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod postprocess;
pub mod publishers;
pub mod sampler;
pub mod table;

pub use collectors::{MetricValue, Snapshot, SyntheticSource, SystemSource, TelemetrySource};
pub use config::AppConfig;
pub use error::{CollectorError, EndpointError, Error, PublishError, Result, SamplerError};
pub use orchestrator::{
    measure, EndpointHandle, EndpointOutcome, ExecutionService, HttpExecutionClient, PhaseWindow,
    Request, Response, RuntimeHandle, WorkloadOrchestrator, WorkloadPlan, WorkloadReport,
};
pub use sampler::{Sample, SampleSeries, Sampler, SamplerData, SessionState, TimestampMode};
pub use table::{Cell, SampleTable};
