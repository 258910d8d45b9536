//! Error taxonomy for the generation-and-delivery pipeline.
//!
//! Configuration problems surface synchronously as [`ValidationError`].
//! Delivery problems never escape the broadcaster: they are folded into a
//! failed [`DeliveryResult`](crate::reading::DeliveryResult). Sink problems are
//! caught by the engine and logged.

use std::time::Duration;
use thiserror::Error;

/// Invalid configuration input. Never silently clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("interval must be at least {min} seconds (got {got})")]
    IntervalTooShort { got: u64, min: u64 },

    #[error("minimum value must be less than maximum value (got {min} >= {max})")]
    InvertedRange { min: f64, max: f64 },

    #[error("range bounds must be finite numbers")]
    NonFiniteRange,

    #[error("unknown vital type '{0}'")]
    UnknownVitalType(String),

    #[error("unknown simulation mode '{0}'")]
    UnknownMode(String),

    #[error("unknown destination '{0}'")]
    UnknownDestination(String),

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Failure of a single send attempt below the HTTP status level.
///
/// Every variant is retryable; the retry budget decides whether another
/// attempt is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timeout after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Connection error to {0}")]
    Connect(String),

    #[error("Request error: {0}")]
    Request(String),
}

/// Error reported by a registered sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink '{sink}' failed: {reason}")]
    Failed { sink: String, reason: String },

    #[error("sink '{0}' is disconnected")]
    Disconnected(String),

    #[error("sink '{0}' is full, reading dropped")]
    Full(String),

    #[error("sink '{sink}' panicked: {message}")]
    Panicked { sink: String, message: String },
}

impl SinkError {
    pub fn failed(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
