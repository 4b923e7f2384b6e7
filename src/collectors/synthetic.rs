//! Deterministic source for dry runs and tests.
//!
//! Produces smooth per-core CPU curves and a slowly growing memory figure, and
//! can be told to fail on chosen ticks so that the sampler's recovery paths
//! can be driven without real hardware.

use super::traits::{LeaseGuard, Snapshot, SourceLease, TelemetryHandle, TelemetrySource};
use crate::error::CollectorError;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Key emitted only on ticks where `tick % period == 0`.
pub const INTERMITTENT_KEY: &str = "Fan pwmfan0";

#[derive(Debug, Clone, Default)]
struct FailurePlan {
    transient_ticks: BTreeSet<u64>,
    fatal_from: Option<u64>,
    unavailable: bool,
    snapshot_delay: Option<Duration>,
    intermittent_period: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    cores: usize,
    plan: FailurePlan,
    calls: Arc<AtomicU64>,
    lease: SourceLease,
}

impl SyntheticSource {
    pub fn new(cores: usize) -> Self {
        Self {
            cores: cores.max(1),
            plan: FailurePlan::default(),
            calls: Arc::new(AtomicU64::new(0)),
            lease: SourceLease::new(),
        }
    }

    /// Fail the snapshot at this zero-based tick with a transient error.
    pub fn with_transient_failure_at(mut self, tick: u64) -> Self {
        self.plan.transient_ticks.insert(tick);
        self
    }

    /// Every snapshot from this zero-based tick on fails fatally.
    pub fn with_fatal_from(mut self, tick: u64) -> Self {
        self.plan.fatal_from = Some(tick);
        self
    }

    /// `open()` always fails.
    pub fn unavailable(mut self) -> Self {
        self.plan.unavailable = true;
        self
    }

    pub fn with_snapshot_delay(mut self, delay: Duration) -> Self {
        self.plan.snapshot_delay = Some(delay);
        self
    }

    pub fn with_intermittent_key(mut self, period: u64) -> Self {
        self.plan.intermittent_period = Some(period.max(1));
        self
    }

    /// Number of snapshot calls made across every handle of this source.
    pub fn snapshot_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.lease.is_held()
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TelemetrySource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self) -> Result<Box<dyn TelemetryHandle>, CollectorError> {
        if self.plan.unavailable {
            return Err(CollectorError::unavailable("synthetic provider is offline"));
        }
        let lease = self
            .lease
            .try_acquire()
            .ok_or_else(|| CollectorError::unavailable("synthetic source already has an open handle"))?;

        Ok(Box::new(SyntheticHandle {
            cores: self.cores,
            plan: self.plan.clone(),
            calls: Arc::clone(&self.calls),
            tick: 0,
            _lease: lease,
        }))
    }
}

struct SyntheticHandle {
    cores: usize,
    plan: FailurePlan,
    calls: Arc<AtomicU64>,
    tick: u64,
    _lease: LeaseGuard,
}

impl SyntheticHandle {
    fn readings(&self, tick: u64) -> Snapshot {
        let mut metrics = Snapshot::new();
        let t = tick as f64;
        for core in 0..self.cores {
            let phase = core as f64 * 0.7;
            let usage = 50.0 + 40.0 * (t * 0.3 + phase).sin();
            metrics.insert(format!("CPU{}", core + 1), usage.into());
        }
        metrics.insert("RAM".into(), (0.35 + (t * 0.001).min(0.5)).into());
        metrics.insert("ram_used(total)".into(), (2.8 + t * 0.002).into());
        metrics.insert("GPU".into(), (t * 7.0 % 100.0).into());
        metrics.insert("nvp model".into(), "MAXN".into());
        if let Some(period) = self.plan.intermittent_period {
            if tick % period == 0 {
                metrics.insert(INTERMITTENT_KEY.into(), 30.0_f64.into());
            }
        }
        metrics
    }
}

impl TelemetryHandle for SyntheticHandle {
    fn snapshot(&mut self) -> Result<Snapshot, CollectorError> {
        let tick = self.tick;
        self.tick += 1;
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.plan.snapshot_delay {
            thread::sleep(delay);
        }
        if self.plan.fatal_from.is_some_and(|from| tick >= from) {
            return Err(CollectorError::fatal(format!("synthetic provider crashed at tick {tick}")));
        }
        if self.plan.transient_ticks.contains(&tick) {
            return Err(CollectorError::transient(format!("synthetic read failed at tick {tick}")));
        }
        Ok(self.readings(tick))
    }
}
