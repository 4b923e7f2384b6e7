//! Core trait definitions for telemetry sources.

use crate::error::CollectorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One point-in-time read of every metric a source tracks.
///
/// Keys may differ between snapshots of the same session.
pub type Snapshot = BTreeMap<String, MetricValue>;

/// A metric reading: numeric, or categorical (e.g. a power model name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Number(_) => None,
            MetricValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Number(f64::from(v))
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Number(v as f64)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// A telemetry provider for one monitored machine or process.
///
/// Opening is expensive, so a sampler opens one handle per session and keeps
/// it for the whole session.
pub trait TelemetrySource: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn TelemetryHandle>, CollectorError>;
}

/// An open connection to a telemetry provider, owned by one sampling loop.
pub trait TelemetryHandle: Send {
    /// Read every tracked metric. Safe to call repeatedly.
    fn snapshot(&mut self) -> Result<Snapshot, CollectorError>;

    /// Release the handle. Dropping it has the same effect.
    fn close(self: Box<Self>) {}
}

/// Grants at most one open handle per source at a time.
#[derive(Debug, Clone, Default)]
pub struct SourceLease {
    held: Arc<AtomicBool>,
}

impl SourceLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<LeaseGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LeaseGuard {
                held: Arc::clone(&self.held),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the lease on drop.
#[derive(Debug)]
pub struct LeaseGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
