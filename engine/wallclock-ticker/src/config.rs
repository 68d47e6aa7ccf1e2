//! Configuration for the wall clock ticker

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::BoundaryDetector;
use crate::error::TickerError;
use crate::{DEFAULT_ACCURACY_MS, DEFAULT_PERIOD_MS};

/// Configuration for a [`crate::Ticker`]
///
/// The only recognised constraint is `0 < accuracy < period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerConfig {
    /// Tick period in milliseconds (default: 60000 = every minute)
    pub period_ms: u64,

    /// Sampling granularity and tolerated lateness in milliseconds (default: 1000)
    pub accuracy_ms: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self { period_ms: DEFAULT_PERIOD_MS, accuracy_ms: DEFAULT_ACCURACY_MS }
    }
}

impl TickerConfig {
    /// Create a configuration from durations, truncated to whole milliseconds.
    /// Values beyond `u64::MAX` milliseconds saturate.
    pub fn new(period: Duration, accuracy: Duration) -> Self {
        Self { period_ms: saturating_millis(period), accuracy_ms: saturating_millis(accuracy) }
    }

    /// Get period as Duration
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Get accuracy as Duration
    pub fn accuracy(&self) -> Duration {
        Duration::from_millis(self.accuracy_ms)
    }

    /// Check that the period/accuracy pair can drive a ticker
    pub fn validate(&self) -> Result<(), TickerError> {
        BoundaryDetector::new(self.period(), self.accuracy()).map(|_| ())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TickerError> {
        let content = std::fs::read_to_string(path)?;
        let config: TickerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), TickerError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
