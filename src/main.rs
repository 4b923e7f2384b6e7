use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use workload_telemetry::config::{AppConfig, SourceKind};
use workload_telemetry::logging::init_logging;
use workload_telemetry::postprocess::preprocess;
use workload_telemetry::publishers::{CsvPublisher, Publisher, RedisPublisher};
use workload_telemetry::{
    EndpointHandle, HttpExecutionClient, Response, SampleTable, Sampler, SyntheticSource,
    SystemSource, TelemetrySource, WorkloadOrchestrator,
};

/// Run a workload on several executor servers and record resource usage
/// while it runs.
#[derive(Debug, Parser)]
#[command(name = "workload-telemetry", version)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "WORKLOAD_TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    /// Executor endpoint as HOST:PORT; repeat for several servers
    #[arg(short, long = "endpoint", value_name = "HOST:PORT")]
    endpoints: Vec<EndpointHandle>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Also report CPU and RSS of this process
    #[arg(long)]
    pid: Option<u32>,

    /// CSV output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use the synthetic telemetry source instead of the local machine
    #[arg(long)]
    synthetic: bool,

    /// Publish the raw table without cleaning it
    #[arg(long)]
    raw: bool,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if !self.endpoints.is_empty() {
            config.orchestrator.endpoints = self.endpoints;
        }
        if let Some(ms) = self.interval_ms {
            config.sampler.interval_ms = ms;
        }
        if self.timeout_ms.is_some() {
            config.orchestrator.request_timeout_ms = self.timeout_ms;
        }
        if self.pid.is_some() {
            config.source.pid = self.pid;
        }
        if self.output.is_some() {
            config.output.csv_path = self.output;
        }
        if self.synthetic {
            config.source.kind = SourceKind::Synthetic;
        }
        if self.raw {
            config.output.postprocess = false;
        }
    }
}

fn build_source(config: &AppConfig) -> Arc<dyn TelemetrySource> {
    match config.source.kind {
        SourceKind::System => {
            let mut source =
                SystemSource::new().with_temperatures(config.source.include_temperatures);
            if let Some(pid) = config.source.pid {
                source = source.with_process(pid);
            }
            Arc::new(source)
        }
        SourceKind::Synthetic => Arc::new(SyntheticSource::default()),
    }
}

fn build_publishers(config: &AppConfig) -> Result<Vec<Box<dyn Publisher>>> {
    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
    if let Some(path) = &config.output.csv_path {
        publishers.push(Box::new(CsvPublisher::new(path)));
    }
    if let Some(url) = &config.output.redis_url {
        let redis = RedisPublisher::new(url, config.output.redis_key.clone())
            .with_context(|| format!("invalid redis url '{url}'"))?;
        publishers.push(Box::new(redis));
    }
    Ok(publishers)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut config);
    config.validate().context("validating configuration")?;
    init_logging(&config.logging).context("initializing logging")?;

    let source = build_source(&config);
    let mut sampler = Sampler::new(source, &config.sampler);
    let client = Arc::new(HttpExecutionClient::new().context("building HTTP client")?);
    let orchestrator = WorkloadOrchestrator::new(client, &config.orchestrator);
    let publishers = build_publishers(&config)?;

    let endpoints = config.orchestrator.endpoints.clone();
    tracing::info!(endpoints = endpoints.len(), session = %sampler.id(), "starting workload");
    let report = orchestrator
        .run_workload(&endpoints, &config.workload.plan(), &mut sampler)
        .await;

    for outcome in &report.ran {
        match &outcome.result {
            Ok(Response::Ran(run)) => {
                let messages: Vec<&str> = run.results.iter().map(|r| r.message()).collect();
                tracing::info!(endpoint = %outcome.endpoint, results = ?messages, missing = ?run.missing, "run response");
            }
            Ok(other) => tracing::warn!(endpoint = %outcome.endpoint, response = ?other, "unexpected run response"),
            Err(e) => tracing::error!(endpoint = %outcome.endpoint, error = %e, "run failed"),
        }
    }
    if let Some(window) = report.window {
        tracing::info!(
            elapsed_secs = report.elapsed.as_secs_f64(),
            start = window.start,
            end = window.end,
            failures = report.failure_count(),
            "run completed"
        );
    }

    if let Some(e) = &report.monitor_error {
        tracing::warn!(error = %e, "run phase was not monitored");
    }

    let data = sampler.data();
    if let Some(reason) = &data.fatal {
        tracing::warn!(session = %data.session_id, reason = %reason, "telemetry session ended early");
    }

    let mut table = SampleTable::from_series(&data.series);
    if config.output.postprocess {
        table = preprocess(&table, &config.output.post);
    }

    for publisher in &publishers {
        if let Err(e) = publisher.publish(data.session_id, &table).await {
            tracing::error!(publisher = publisher.name(), error = %e, "failed to publish metrics");
        }
    }

    Ok(())
}
