//! Application configuration.
//!
//! Loaded with the `config` crate from an optional file layered under
//! `WORKLOAD_TELEMETRY__*` environment variables, e.g.
//! `WORKLOAD_TELEMETRY__SAMPLER__INTERVAL_MS=100`.

use crate::error::ConfigError;
use crate::logging::LogConfig;
use crate::orchestrator::{EndpointHandle, RuntimeHandle, WorkloadPlan};
use crate::postprocess::PostProcessConfig;
use crate::sampler::TimestampMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "WORKLOAD_TELEMETRY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub timestamp_mode: TimestampMode,
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timestamp_mode: TimestampMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    System,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Process to report `proc_*` metrics for.
    #[serde(default)]
    pub pid: Option<u32>,

    #[serde(default = "default_true")]
    pub include_temperatures: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            pid: None,
            include_temperatures: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub endpoints: Vec<EndpointHandle>,

    /// Per-request limit. Unset means wait indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,

    #[serde(default = "default_runtimes_per_endpoint")]
    pub runtimes_per_endpoint: usize,

    #[serde(default = "default_runtime_ids")]
    pub runtime_ids: Vec<u64>,
}

impl WorkloadConfig {
    pub fn plan(&self) -> WorkloadPlan {
        WorkloadPlan {
            artifact_path: self.artifact_path.clone(),
            runtimes_per_endpoint: self.runtimes_per_endpoint,
            runtime_ids: self.runtime_ids.iter().copied().map(RuntimeHandle).collect(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            runtimes_per_endpoint: default_runtimes_per_endpoint(),
            runtime_ids: default_runtime_ids(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: Option<PathBuf>,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_redis_key")]
    pub redis_key: String,

    /// Clean the table before publishing it.
    #[serde(default = "default_true")]
    pub postprocess: bool,

    #[serde(default)]
    pub post: PostProcessConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            redis_url: None,
            redis_key: default_redis_key(),
            postprocess: true,
            post: PostProcessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// Load from `path` (format picked by extension) and the environment.
    ///
    /// Not validated here: command-line overrides are applied on top first,
    /// then the caller runs [`AppConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.interval_ms == 0 {
            return Err(ConfigError::invalid("sampler.interval_ms must be greater than zero"));
        }
        if self.orchestrator.request_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "orchestrator.request_timeout_ms must be greater than zero when set",
            ));
        }
        if self.workload.runtimes_per_endpoint == 0 {
            return Err(ConfigError::invalid(
                "workload.runtimes_per_endpoint must be greater than zero",
            ));
        }
        if self.output.redis_key.is_empty() {
            return Err(ConfigError::invalid("output.redis_key must not be empty"));
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_interval_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

fn default_artifact_path() -> String {
    "./target/wasm32-wasip1/release/llm.wasm".to_string()
}

fn default_runtimes_per_endpoint() -> usize {
    1
}

fn default_runtime_ids() -> Vec<u64> {
    vec![0]
}

fn default_csv_path() -> Option<PathBuf> {
    Some(PathBuf::from("metrics.csv"))
}

fn default_redis_key() -> String {
    "workload-telemetry:samples".to_string()
}
