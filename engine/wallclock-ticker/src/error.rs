//! Error types for the wall clock ticker

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while configuring or constructing a [`crate::Ticker`]
#[derive(Error, Debug)]
pub enum TickerError {
    #[error("accuracy must be greater than zero")]
    InvalidAccuracy,

    #[error("accuracy {accuracy:?} is not less than period {period:?}")]
    InvalidPeriod { period: Duration, accuracy: Duration },

    #[error("duration {0:?} cannot be represented as wall clock offset")]
    DurationOutOfRange(Duration),

    #[error("ticker must be created from within a tokio runtime")]
    NoRuntime,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl TickerError {
    /// Whether the error stems from an invalid period/accuracy pair
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self,
            TickerError::InvalidAccuracy
                | TickerError::InvalidPeriod { .. }
                | TickerError::DurationOutOfRange(_)
        )
    }
}
