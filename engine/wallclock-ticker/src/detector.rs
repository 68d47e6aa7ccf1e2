//! Boundary detection over raw wall clock samples
//!
//! The detector is a plain state machine so it can be driven synchronously in
//! tests; [`crate::Ticker`] feeds it from the raw source inside its loop.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TickerError;

/// Round `t` down to a multiple of `step` counted from the Unix epoch.
///
/// Returns `None` when `t` or `step` does not fit in an `i64` nanosecond count.
pub fn truncate(t: DateTime<Utc>, step: TimeDelta) -> Option<DateTime<Utc>> {
    let nanos = t.timestamp_nanos_opt()?;
    let step = step.num_nanoseconds()?;
    if step <= 0 {
        return Some(t);
    }
    let base = nanos.checked_sub(nanos.rem_euclid(step))?;
    Some(DateTime::from_timestamp_nanos(base))
}

/// Why a boundary was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// The sample landed on the boundary itself
    Exact,
    /// The on-boundary sample was missed; this sample is one accuracy unit late
    CatchUp,
}

/// A boundary accepted by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emission {
    /// Sample time truncated to the accuracy; this is what consumers receive
    pub at: DateTime<Utc>,
    /// The period boundary the emission belongs to
    pub boundary: DateTime<Utc>,
    pub kind: MatchKind,
}

/// Outcome of feeding one raw sample to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Emit(Emission),
    Skip,
    /// Sample lies outside the representable nanosecond range
    Unrepresentable,
}

/// Decides, per raw sample, whether a period boundary has been reached.
#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    period: TimeDelta,
    accuracy: TimeDelta,
    last_emitted: Option<DateTime<Utc>>,
}

impl BoundaryDetector {
    /// Create a detector for `period`, sampling at `accuracy`.
    ///
    /// # Errors
    ///
    /// Fails unless `0 < accuracy < period` and both durations fit in an `i64`
    /// nanosecond count.
    pub fn new(period: Duration, accuracy: Duration) -> Result<Self, TickerError> {
        if accuracy.is_zero() {
            return Err(TickerError::InvalidAccuracy);
        }
        if period <= accuracy {
            return Err(TickerError::InvalidPeriod { period, accuracy });
        }

        Ok(Self {
            period: to_delta(period)?,
            accuracy: to_delta(accuracy)?,
            last_emitted: None,
        })
    }

    pub fn period(&self) -> TimeDelta {
        self.period
    }

    pub fn accuracy(&self) -> TimeDelta {
        self.accuracy
    }

    /// Boundary of the most recent emission, if any
    pub fn last_emitted(&self) -> Option<DateTime<Utc>> {
        self.last_emitted
    }

    /// Feed one raw sample.
    ///
    /// Emits when the sample, truncated to the accuracy, equals its period
    /// boundary, or sits exactly one accuracy unit past a boundary that has not
    /// been emitted yet.
    pub fn observe(&mut self, sample: DateTime<Utc>) -> Observation {
        let Some(now) = truncate(sample, self.accuracy) else {
            return Observation::Unrepresentable;
        };
        let Some(boundary) = truncate(now, self.period) else {
            return Observation::Unrepresentable;
        };

        let kind = if now == boundary {
            MatchKind::Exact
        } else if self.last_emitted != Some(boundary) && now - self.accuracy == boundary {
            MatchKind::CatchUp
        } else {
            return Observation::Skip;
        };

        self.last_emitted = Some(boundary);
        Observation::Emit(Emission { at: now, boundary, kind })
    }
}

fn to_delta(d: Duration) -> Result<TimeDelta, TickerError> {
    TimeDelta::from_std(d)
        .ok()
        .filter(|delta| delta.num_nanoseconds().is_some())
        .ok_or(TickerError::DurationOutOfRange(d))
}
