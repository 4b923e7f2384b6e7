//! Telemetry collectors module
//!
//! This module contains the trait a sampler polls for metrics and the
//! sources that implement it:
//! - traits.rs: `TelemetrySource` / `TelemetryHandle` and the snapshot types
//! - system.rs: host and process metrics via `sysinfo`
//! - synthetic.rs: deterministic source with scripted failures

pub mod synthetic;
pub mod system;
pub mod traits;

pub use synthetic::SyntheticSource;
pub use system::SystemSource;
pub use traits::*;
