//! Ticker lifecycle: grid synchronization, the detector loop and stopping

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::config::TickerConfig;
use crate::detector::{truncate, BoundaryDetector, Observation};
use crate::error::TickerError;
use crate::metrics::{MetricsCollector, TickerMetrics};
use crate::source::{RawSource, Sample, SourceFactory, SystemSourceFactory};

/// Lifecycle of a [`Ticker`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickerState {
    Constructing,
    /// Waiting for the first accuracy boundary before attaching a source
    Synchronizing,
    Running,
    Stopped,
}

/// State guarded by the lifecycle lock
struct Attachment {
    state: TickerState,
    source: Option<Box<dyn RawSource>>,
    /// Keeps the tick stream open after the detector exits; taken by `stop_close`
    output: Option<mpsc::Sender<Sample>>,
}

struct Shared {
    attachment: Mutex<Attachment>,
    done: watch::Sender<bool>,
    metrics: MetricsCollector,
}

/// Cloneable control handle for a [`Ticker`]
///
/// Lets another task stop the ticker while the owner is blocked in
/// [`Ticker::recv`].
#[derive(Clone)]
pub struct TickerHandle {
    shared: Arc<Shared>,
}

impl TickerHandle {
    /// Stop the ticker. No ticks are emitted afterwards.
    ///
    /// The tick stream is left open so a pending read never observes a tick
    /// that was not emitted; callers must stop reading after calling this.
    /// A tick already sitting in the slot when `stop` returns stays readable.
    /// Stopping twice is a no-op.
    pub fn stop(&self) {
        self.shutdown(false);
    }

    /// Stop the ticker and close the tick stream, ending any consumer that
    /// reads until the stream is closed.
    pub fn stop_close(&self) {
        self.shutdown(true);
    }

    pub fn state(&self) -> TickerState {
        self.shared.attachment.lock().state
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == TickerState::Stopped
    }

    pub fn metrics(&self) -> TickerMetrics {
        self.shared.metrics.get_metrics()
    }

    fn shutdown(&self, close: bool) {
        let mut attachment = self.shared.attachment.lock();
        if close && attachment.output.take().is_some() {
            tracing::debug!("Closing tick stream");
        }

        if attachment.state == TickerState::Stopped {
            tracing::debug!("Ticker already stopped");
            return;
        }

        attachment.state = TickerState::Stopped;
        self.shared.done.send_replace(true);
        if let Some(mut source) = attachment.source.take() {
            source.stop();
        }

        tracing::info!("Ticker stopped");
    }
}

/// Delivers ticks on wall clock boundaries.
///
/// A tick is sent at every multiple of `period` since the Unix epoch, at most
/// `accuracy` late. Only one tick is buffered: if the consumer has not read
/// the previous tick, new ticks are dropped until it catches up. If the clock
/// is adjusted backwards the ticker fires again as soon as the clock reaches
/// the next boundary.
///
/// Dropping the ticker stops it.
pub struct Ticker {
    ticks: mpsc::Receiver<Sample>,
    handle: TickerHandle,
    period: Duration,
    accuracy: Duration,
}

impl Ticker {
    /// Create a ticker sampling the system clock.
    ///
    /// # Errors
    ///
    /// Fails unless `0 < accuracy < period`, or when called outside a tokio
    /// runtime.
    pub fn new(period: Duration, accuracy: Duration) -> Result<Self, TickerError> {
        Self::with_source(period, accuracy, SystemSourceFactory)
    }

    /// Create a ticker from a validated configuration
    pub fn from_config(config: &TickerConfig) -> Result<Self, TickerError> {
        config.validate()?;
        Self::new(config.period(), config.accuracy())
    }

    /// Create a ticker whose raw samples come from `factory`
    pub fn with_source<F>(
        period: Duration,
        accuracy: Duration,
        factory: F,
    ) -> Result<Self, TickerError>
    where
        F: SourceFactory + 'static,
    {
        let detector = BoundaryDetector::new(period, accuracy)?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TickerError::NoRuntime)?;

        // Single slot: a slow consumer loses ticks rather than stalling the detector
        let (output, ticks) = mpsc::channel(1);
        let (done, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            attachment: Mutex::new(Attachment {
                state: TickerState::Constructing,
                source: None,
                output: Some(output),
            }),
            done,
            metrics: MetricsCollector::new(),
        });

        tracing::info!("Creating Ticker with period {:?} and accuracy {:?}", period, accuracy);
        if period.as_nanos() % accuracy.as_nanos() != 0 {
            tracing::warn!(
                "Period {:?} is not a multiple of accuracy {:?}, boundaries off the accuracy grid will be missed",
                period,
                accuracy
            );
        }

        let stopped = shared.done.subscribe();
        shared.attachment.lock().state = TickerState::Synchronizing;
        runtime.spawn(synchronize(Arc::clone(&shared), factory, detector, accuracy, stopped));

        Ok(Self { ticks, handle: TickerHandle { shared }, period, accuracy })
    }

    /// Wait for the next tick. Returns `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<Sample> {
        self.ticks.recv().await
    }

    /// Take the pending tick without waiting
    pub fn try_recv(&mut self) -> Result<Sample, mpsc::error::TryRecvError> {
        self.ticks.try_recv()
    }

    /// Consume the ticker as a stream of ticks ending when the stream closes.
    pub fn into_stream(self) -> impl Stream<Item = Sample> {
        futures::stream::unfold(self, |mut ticker| async move {
            let tick = ticker.recv().await?;
            Some((tick, ticker))
        })
    }

    pub fn handle(&self) -> TickerHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn stop_close(&self) {
        self.handle.stop_close();
    }

    pub fn state(&self) -> TickerState {
        self.handle.state()
    }

    pub fn metrics(&self) -> TickerMetrics {
        self.handle.metrics()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn accuracy(&self) -> Duration {
        self.accuracy
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

/// Sleep until the next accuracy boundary, then attach a source and start
/// the detector unless the ticker was stopped meanwhile.
async fn synchronize<F: SourceFactory>(
    shared: Arc<Shared>,
    factory: F,
    detector: BoundaryDetector,
    interval: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    let accuracy = detector.accuracy();
    let now = Utc::now();
    let delay = truncate(now, accuracy)
        .and_then(|start| (start + accuracy - now).to_std().ok())
        .unwrap_or_default();

    tracing::debug!("Synchronizing ticker to accuracy grid in {:?}", delay);

    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = stopped.changed() => {}
    }

    let (samples, output) = {
        let mut attachment = shared.attachment.lock();
        if attachment.state == TickerState::Stopped {
            tracing::debug!("Ticker stopped before synchronization completed");
            return;
        }
        let Some(output) = attachment.output.clone() else {
            return;
        };

        let feed = factory.start(interval);
        attachment.source = Some(feed.source);
        attachment.state = TickerState::Running;
        (feed.samples, output)
    };

    tracing::debug!("Raw source attached, starting boundary detector");
    tokio::spawn(detect(shared, detector, samples, output, stopped));
}

/// Run the boundary detector until the ticker stops or the raw source ends.
async fn detect(
    shared: Arc<Shared>,
    mut detector: BoundaryDetector,
    mut samples: mpsc::Receiver<Sample>,
    output: mpsc::Sender<Sample>,
    mut done: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = done.changed() => break,
            sample = samples.recv() => {
                let Some(sample) = sample else {
                    tracing::debug!("Raw source ended");
                    break;
                };
                shared.metrics.record_sample();

                match detector.observe(sample) {
                    Observation::Emit(emission) => {
                        // No tick is sent once stop has taken the lock
                        let delivered = {
                            let attachment = shared.attachment.lock();
                            if attachment.state == TickerState::Stopped {
                                break;
                            }
                            match output.try_send(emission.at) {
                                Ok(()) => true,
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    tracing::trace!("Consumer behind, dropping tick {}", emission.at);
                                    false
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => break,
                            }
                        };
                        tracing::trace!("Tick {} ({:?})", emission.at, emission.kind);
                        shared.metrics.record_emission(&emission, delivered);
                    }
                    Observation::Skip => {}
                    Observation::Unrepresentable => {
                        tracing::warn!("Discarding unrepresentable sample {}", sample);
                        shared.metrics.record_discarded();
                    }
                }
            }
        }
    }

    tracing::debug!("Boundary detector stopped");
}
