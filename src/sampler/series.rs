use crate::collectors::{MetricValue, Snapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

/// Wall-clock seconds since the Unix epoch that never run backwards.
///
/// The epoch offset is read once; later readings add monotonic elapsed time
/// to it, so a wall-clock step during a session cannot reorder samples.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    epoch_secs: f64,
    origin: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            epoch_secs: now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9,
            origin: Instant::now(),
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.epoch_secs + self.origin.elapsed().as_secs_f64()
    }

    /// Epoch seconds at which this clock was created.
    pub fn anchor_secs(&self) -> f64 {
        self.epoch_secs
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub metrics: Snapshot,
}

impl Sample {
    pub fn new(timestamp: f64, metrics: Snapshot) -> Self {
        Self { timestamp, metrics }
    }

    pub fn get(&self, metric: &str) -> Option<&MetricValue> {
        self.metrics.get(metric)
    }
}

/// Samples in collection order, which is also timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        debug_assert!(
            self.samples
                .last()
                .map_or(true, |last| last.timestamp <= sample.timestamp),
            "samples must be appended in time order"
        );
        self.samples.push(sample);
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Samples whose timestamp lies in `[start, end]`.
    pub fn within(&self, start: f64, end: f64) -> impl Iterator<Item = &Sample> {
        self.samples
            .iter()
            .filter(move |s| s.timestamp >= start && s.timestamp <= end)
    }

    /// Every metric name seen in any sample.
    pub fn metric_names(&self) -> BTreeSet<&str> {
        self.samples
            .iter()
            .flat_map(|s| s.metrics.keys().map(String::as_str))
            .collect()
    }

    pub fn is_time_ordered(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }
}

impl<'a> IntoIterator for &'a SampleSeries {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl FromIterator<Sample> for SampleSeries {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut samples: Vec<Sample> = iter.into_iter().collect();
        samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { samples }
    }
}
