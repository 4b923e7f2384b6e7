//! Telemetry publishers module
//!
//! This module contains the trait and implementations for publishing a
//! session's sample table to various destinations:
//! - traits.rs: core publisher trait definition
//! - csv.rs: CSV file publisher
//! - redis.rs: Redis list publisher

pub mod csv;
pub mod redis;
pub mod traits;

pub use self::csv::CsvPublisher;
pub use self::redis::RedisPublisher;
pub use traits::*;
