//! # Wallclock Ticker
//!
//! A ticker that fires on wall clock boundaries ("every minute, on the minute")
//! instead of after elapsed monotonic time.
//!
//! Unlike `tokio::time::interval`, the ticker samples the wall clock at a fixed
//! accuracy and emits whenever the sampled time reaches a multiple of the
//! configured period. It therefore stays on the boundary when the system clock
//! drifts, and fires early when the clock is adjusted backwards.
//!
//! ```no_run
//! use std::time::Duration;
//! use wallclock_ticker::Ticker;
//!
//! # async fn run() -> Result<(), wallclock_ticker::TickerError> {
//! let mut ticker = Ticker::new(Duration::from_secs(60), Duration::from_secs(1))?;
//! while let Some(tick) = ticker.recv().await {
//!     println!("tick: {tick}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod source;
pub mod ticker;



pub use config::TickerConfig;
pub use detector::{truncate, BoundaryDetector, Emission, MatchKind, Observation};
pub use error::TickerError;
pub use metrics::{MetricsCollector, TickerMetrics};
pub use source::{
    RawFeed, RawSource, Sample, ScriptedSource, ScriptedSourceFactory, SourceFactory,
    SystemSource, SystemSourceFactory,
};
pub use ticker::{Ticker, TickerHandle, TickerState};

/// Current version of the ticker crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default period (one tick per minute)
pub const DEFAULT_PERIOD_MS: u64 = 60_000;

/// Default accuracy (sample the wall clock once per second)
pub const DEFAULT_ACCURACY_MS: u64 = 1_000;

/// Real-time delay between replayed samples of a [`ScriptedSource`]
pub const DEFAULT_REPLAY_CADENCE_MS: u64 = 1;
