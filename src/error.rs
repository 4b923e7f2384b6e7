use std::time::Duration;
use thiserror::Error;

/// Failures reported by a telemetry source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    #[error("telemetry provider unavailable: {0}")]
    Unavailable(String),

    #[error("transient snapshot failure: {0}")]
    Transient(String),

    #[error("telemetry provider failed: {0}")]
    Fatal(String),
}

impl CollectorError {
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        CollectorError::Unavailable(msg.into())
    }

    pub fn transient<S: Into<String>>(msg: S) -> Self {
        CollectorError::Transient(msg.into())
    }

    pub fn fatal<S: Into<String>>(msg: S) -> Self {
        CollectorError::Fatal(msg.into())
    }

    /// Whether the handle that produced this error can still be used.
    ///
    /// A provider that becomes unavailable mid-session is treated the same as
    /// one that crashed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CollectorError::Transient(_))
    }
}

/// Errors returned by `Sampler::start`.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("telemetry source '{source_name}' could not be opened: {reason}")]
    ProviderUnavailable { source_name: String, reason: String },

    #[error("failed to spawn sampling thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("sampling thread exited before confirming start")]
    StartupAborted,

    #[error("sampler session already finished; a new session needs a new sampler")]
    SessionFinished,
}

/// Per-endpoint request failure. Stored as data, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request task aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for EndpointError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EndpointError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            EndpointError::Status {
                code: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            EndpointError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Crate-level error for callers that do not care which component failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] crate::logging::LogError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_recoverable() {
        assert!(!CollectorError::transient("busy").is_fatal());
        assert!(CollectorError::fatal("gone").is_fatal());
        assert!(CollectorError::unavailable("closed").is_fatal());
    }

    #[test]
    fn timeout_message_names_the_limit() {
        let err = EndpointError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "request timed out after 250ms");
    }
}
