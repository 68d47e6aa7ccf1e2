//! Metrics collection for the ticker

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detector::{Emission, MatchKind};

const NO_BOUNDARY: i64 = i64::MIN;

/// Point-in-time view of a ticker's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMetrics {
    /// Raw samples consumed by the detector
    pub samples_observed: u64,

    /// Boundaries emitted because a sample landed on them
    pub exact_matches: u64,

    /// Boundaries emitted one accuracy unit late
    pub catch_up_matches: u64,

    /// Emissions that reached the output slot
    pub ticks_delivered: u64,

    /// Emissions dropped because the consumer had not read the previous tick
    pub ticks_dropped: u64,

    /// Samples outside the representable time range
    pub samples_discarded: u64,

    /// Boundary of the most recent emission
    pub last_boundary: Option<DateTime<Utc>>,

    /// Seconds since the ticker was created
    pub uptime_seconds: u64,
}

impl TickerMetrics {
    /// Total boundaries accepted by the detector, delivered or not
    pub fn ticks_emitted(&self) -> u64 {
        self.exact_matches + self.catch_up_matches
    }
}

/// Metrics collector shared between the ticker loop and its handles
pub struct MetricsCollector {
    samples_observed: AtomicU64,
    exact_matches: AtomicU64,
    catch_up_matches: AtomicU64,
    ticks_delivered: AtomicU64,
    ticks_dropped: AtomicU64,
    samples_discarded: AtomicU64,
    last_boundary_ns: AtomicI64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            samples_observed: AtomicU64::new(0),
            exact_matches: AtomicU64::new(0),
            catch_up_matches: AtomicU64::new(0),
            ticks_delivered: AtomicU64::new(0),
            ticks_dropped: AtomicU64::new(0),
            samples_discarded: AtomicU64::new(0),
            last_boundary_ns: AtomicI64::new(NO_BOUNDARY),
            start_time: Instant::now(),
        }
    }

    pub fn record_sample(&self) {
        self.samples_observed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.samples_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted boundary and whether it fit in the output slot
    pub fn record_emission(&self, emission: &Emission, delivered: bool) {
        match emission.kind {
            MatchKind::Exact => self.exact_matches.fetch_add(1, Ordering::Relaxed),
            MatchKind::CatchUp => self.catch_up_matches.fetch_add(1, Ordering::Relaxed),
        };

        if delivered {
            self.ticks_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
        }

        // Detector only emits representable instants
        if let Some(ns) = emission.boundary.timestamp_nanos_opt() {
            self.last_boundary_ns.store(ns, Ordering::Relaxed);
        }
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> TickerMetrics {
        let last_boundary = match self.last_boundary_ns.load(Ordering::Relaxed) {
            NO_BOUNDARY => None,
            ns => Some(DateTime::from_timestamp_nanos(ns)),
        };

        TickerMetrics {
            samples_observed: self.samples_observed.load(Ordering::Relaxed),
            exact_matches: self.exact_matches.load(Ordering::Relaxed),
            catch_up_matches: self.catch_up_matches.load(Ordering::Relaxed),
            ticks_delivered: self.ticks_delivered.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            samples_discarded: self.samples_discarded.load(Ordering::Relaxed),
            last_boundary,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.samples_observed.store(0, Ordering::Relaxed);
        self.exact_matches.store(0, Ordering::Relaxed);
        self.catch_up_matches.store(0, Ordering::Relaxed);
        self.ticks_delivered.store(0, Ordering::Relaxed);
        self.ticks_dropped.store(0, Ordering::Relaxed);
        self.samples_discarded.store(0, Ordering::Relaxed);
        self.last_boundary_ns.store(NO_BOUNDARY, Ordering::Relaxed);
    }
}
