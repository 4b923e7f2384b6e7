//! Background telemetry sampler.
//!
//! A [`Sampler`] owns one telemetry handle per session and a dedicated thread
//! that snapshots it at a fixed cadence into an in-memory [`SampleSeries`].
//! A session goes `Idle -> Running -> Stopped` exactly once; a new session
//! needs a new sampler.
//!
//! `start()` returns once the sampling thread is confirmed alive and `stop()`
//! returns once it has exited and released the handle. Between those two
//! points the sampler and its caller never wait on each other. Provider
//! failures are reported through [`SamplerData`] rather than raised into the
//! caller, so a monitoring failure cannot abort the monitored workload.

mod series;

pub use series::{Sample, SampleSeries, SessionClock};

use crate::collectors::{TelemetryHandle, TelemetrySource};
use crate::config::SamplerConfig;
use crate::error::{CollectorError, SamplerError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Which side of the snapshot call a sample's timestamp is taken on.
///
/// `AfterSnapshot` attributes a slow read to the moment it finished, which
/// skews timestamps late under load. It is the default and kept on purpose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    BeforeSnapshot,
    #[default]
    AfterSnapshot,
}

/// The series collected so far together with the session status.
#[derive(Debug, Clone, Serialize)]
pub struct SamplerData {
    pub session_id: Uuid,
    pub state: SessionState,
    pub series: SampleSeries,
    /// Set when the provider failed permanently and the session ended early.
    pub fatal: Option<String>,
    /// Ticks dropped because of transient snapshot failures.
    pub skipped_ticks: u64,
}

impl SamplerData {
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }
}

#[derive(Debug)]
struct Status {
    state: SessionState,
    fatal: Option<String>,
    skipped_ticks: u64,
}

#[derive(Debug)]
struct Shared {
    buffer: RwLock<SampleSeries>,
    status: Mutex<Status>,
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Sampler {
    id: Uuid,
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    timestamp_mode: TimestampMode,
    clock: SessionClock,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl Sampler {
    pub fn new(source: Arc<dyn TelemetrySource>, config: &SamplerConfig) -> Self {
        Self::with_interval(source, config.interval())
            .with_timestamp_mode(config.timestamp_mode)
    }

    pub fn with_interval(source: Arc<dyn TelemetrySource>, interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            interval,
            timestamp_mode: TimestampMode::default(),
            clock: SessionClock::new(),
            shared: Arc::new(Shared {
                buffer: RwLock::new(SampleSeries::new()),
                status: Mutex::new(Status {
                    state: SessionState::Idle,
                    fatal: None,
                    skipped_ticks: 0,
                }),
            }),
            worker: None,
        }
    }

    pub fn with_timestamp_mode(mut self, mode: TimestampMode) -> Self {
        self.timestamp_mode = mode;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The clock sample timestamps are read from. Use it to stamp phase
    /// boundaries that must be comparable with the series.
    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    pub fn state(&self) -> SessionState {
        self.shared.status.lock().state
    }

    /// Open the provider and start sampling.
    ///
    /// Returns only after the sampling thread has begun running. Calling it
    /// while running logs a warning and changes nothing. Calling it after the
    /// session finished also changes nothing but returns
    /// [`SamplerError::SessionFinished`], since no new samples will follow.
    pub fn start(&mut self) -> Result<(), SamplerError> {
        match self.state() {
            SessionState::Running => {
                tracing::warn!(session = %self.id, "sampler already running; ignoring start");
                return Ok(());
            }
            SessionState::Stopped => {
                tracing::warn!(
                    session = %self.id,
                    "sampler session already finished; a new session needs a new sampler"
                );
                return Err(SamplerError::SessionFinished);
            }
            SessionState::Idle => {}
        }

        let handle = self
            .source
            .open()
            .map_err(|e| SamplerError::ProviderUnavailable {
                source_name: self.source.name().to_string(),
                reason: e.to_string(),
            })?;

        self.shared.buffer.write().clear();
        {
            let mut status = self.shared.status.lock();
            status.state = SessionState::Running;
            status.fatal = None;
            status.skipped_ticks = 0;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let sampling = SamplingLoop {
            session: self.id,
            interval: self.interval,
            timestamp_mode: self.timestamp_mode,
            clock: self.clock,
            shared: Arc::clone(&self.shared),
        };

        let spawned = thread::Builder::new()
            .name(format!("sampler-{}", &self.id.simple().to_string()[..8]))
            .spawn(move || sampling.run(handle, stop_rx, ready_tx));

        let join = match spawned {
            Ok(join) => join,
            Err(e) => {
                self.shared.status.lock().state = SessionState::Idle;
                return Err(SamplerError::Spawn(e));
            }
        };

        if ready_rx.recv().is_err() {
            let _ = join.join();
            let mut status = self.shared.status.lock();
            status.state = SessionState::Stopped;
            status.fatal = Some("sampling thread exited during startup".into());
            return Err(SamplerError::StartupAborted);
        }

        self.worker = Some(Worker {
            stop_tx,
            handle: join,
        });
        tracing::info!(
            session = %self.id,
            source = self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            "resource sampler started"
        );
        Ok(())
    }

    /// Stop sampling and freeze the series.
    ///
    /// Blocks until the sampling thread has exited, which takes at most one
    /// in-flight snapshot. Calling it before `start()` logs and does nothing.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            match self.state() {
                SessionState::Idle => {
                    tracing::warn!(session = %self.id, "sampler was never started; ignoring stop");
                }
                _ => {
                    tracing::debug!(session = %self.id, "sampler already stopped");
                }
            }
            return;
        };

        // The loop may already be gone after a fatal provider error.
        let _ = worker.stop_tx.send(());
        let panicked = worker.handle.join().is_err();

        let mut status = self.shared.status.lock();
        if panicked {
            tracing::error!(session = %self.id, "sampling thread panicked");
            status.fatal.get_or_insert_with(|| "sampling thread panicked".into());
        }
        status.state = SessionState::Stopped;
        let samples = self.shared.buffer.read().len();
        tracing::info!(
            session = %self.id,
            samples,
            skipped = status.skipped_ticks,
            fatal = status.fatal.is_some(),
            "resource sampler stopped"
        );
    }

    /// Samples collected so far plus the session status.
    ///
    /// While running this is a consistent prefix of the final series.
    pub fn data(&self) -> SamplerData {
        let (state, fatal, skipped_ticks) = {
            let status = self.shared.status.lock();
            (status.state, status.fatal.clone(), status.skipped_ticks)
        };
        SamplerData {
            session_id: self.id,
            state,
            series: self.shared.buffer.read().clone(),
            fatal,
            skipped_ticks,
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("id", &self.id)
            .field("source", &self.source.name())
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

struct SamplingLoop {
    session: Uuid,
    interval: Duration,
    timestamp_mode: TimestampMode,
    clock: SessionClock,
    shared: Arc<Shared>,
}

impl SamplingLoop {
    fn run(
        self,
        mut handle: Box<dyn TelemetryHandle>,
        stop_rx: mpsc::Receiver<()>,
        ready_tx: mpsc::SyncSender<()>,
    ) {
        let _ = ready_tx.send(());
        tracing::debug!(session = %self.session, "sampling loop running");

        let mut tick: u64 = 0;
        let mut fatal = None;

        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            let tick_started = Instant::now();
            let before = self.clock.now_secs();
            let result = panic::catch_unwind(AssertUnwindSafe(|| handle.snapshot()))
                .unwrap_or_else(|payload| {
                    Err(CollectorError::fatal(format!(
                        "provider panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
            let after = self.clock.now_secs();

            match result {
                Ok(metrics) => {
                    let timestamp = match self.timestamp_mode {
                        TimestampMode::BeforeSnapshot => before,
                        TimestampMode::AfterSnapshot => after,
                    };
                    self.shared.buffer.write().push(Sample::new(timestamp, metrics));
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(session = %self.session, tick, error = %e, "telemetry provider failed; ending session");
                    fatal = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    tracing::warn!(session = %self.session, tick, error = %e, "skipping telemetry tick");
                    self.shared.status.lock().skipped_ticks += 1;
                }
            }
            tick += 1;

            let wait = self.interval.saturating_sub(tick_started.elapsed());
            match stop_rx.recv_timeout(wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        // A handle that panicked may panic again on close.
        if panic::catch_unwind(AssertUnwindSafe(|| handle.close())).is_err() {
            tracing::warn!(session = %self.session, "telemetry handle panicked while closing");
        }

        if let Some(reason) = fatal {
            let mut status = self.shared.status.lock();
            status.fatal = Some(reason);
            status.state = SessionState::Stopped;
        }
        tracing::debug!(session = %self.session, ticks = tick, "sampling loop exited");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
