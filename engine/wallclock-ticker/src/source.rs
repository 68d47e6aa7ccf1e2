//! Raw periodic sources of wall clock samples
//!
//! A source produces timestamps at roughly the ticker's accuracy. The ticker
//! obtains one through a [`SourceFactory`] so tests can replay synthetic
//! timestamps instead of waiting on the real clock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::DEFAULT_REPLAY_CADENCE_MS;

/// A raw wall clock sample
pub type Sample = DateTime<Utc>;

/// Number of samples a scripted replay may run ahead of the detector
const SCRIPTED_BUFFER: usize = 4;

/// Handle to a running source
pub trait RawSource: Send {
    /// Stop producing samples. The sample stream ends once the source stops.
    fn stop(&mut self);
}

/// A started source together with the stream of samples it produces
pub struct RawFeed {
    pub source: Box<dyn RawSource>,
    pub samples: mpsc::Receiver<Sample>,
}

/// Creates raw sources for a ticker
pub trait SourceFactory: Send + Sync {
    /// Start a source producing samples every `interval`
    fn start(&self, interval: Duration) -> RawFeed;
}

/// Samples `Utc::now()` on a tokio interval.
///
/// Like a platform ticker, it keeps a single pending sample and drops the rest
/// when the reader falls behind.
pub struct SystemSource {
    task: JoinHandle<()>,
}

impl SystemSource {
    /// Spawn the sampling task on the current runtime
    pub fn spawn(interval: Duration) -> RawFeed {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                match tx.try_send(Utc::now()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });

        RawFeed { source: Box::new(SystemSource { task }), samples: rx }
    }
}

impl RawSource for SystemSource {
    fn stop(&mut self) {
        self.task.abort();
    }
}

/// Production factory backed by the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSourceFactory;

impl SourceFactory for SystemSourceFactory {
    fn start(&self, interval: Duration) -> RawFeed {
        SystemSource::spawn(interval)
    }
}

/// Replays a fixed list of samples at a short real-time cadence.
///
/// Every scripted sample is delivered; the replay waits when the reader is
/// behind. The stream closes after the last sample.
pub struct ScriptedSource {
    task: JoinHandle<()>,
}

impl ScriptedSource {
    /// Spawn the replay task on the current runtime
    pub fn spawn(samples: Vec<Sample>, cadence: Duration) -> RawFeed {
        let (tx, rx) = mpsc::channel(SCRIPTED_BUFFER);
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + cadence, cadence);
            for sample in samples {
                ticks.tick().await;
                if tx.send(sample).await.is_err() {
                    return;
                }
            }
            tracing::debug!("Scripted source replay finished");
        });

        RawFeed { source: Box::new(ScriptedSource { task }), samples: rx }
    }
}

impl RawSource for ScriptedSource {
    fn stop(&mut self) {
        self.task.abort();
    }
}

/// Factory handing out [`ScriptedSource`] replays, ignoring the requested interval
#[derive(Debug, Clone)]
pub struct ScriptedSourceFactory {
    samples: Vec<Sample>,
    cadence: Duration,
}

impl ScriptedSourceFactory {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples, cadence: Duration::from_millis(DEFAULT_REPLAY_CADENCE_MS) }
    }

    /// Override the real-time delay between replayed samples
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SourceFactory for ScriptedSourceFactory {
    fn start(&self, _interval: Duration) -> RawFeed {
        ScriptedSource::spawn(self.samples.clone(), self.cadence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_scripted_source_replays_in_order() {
        let base = Utc::now();
        let samples: Vec<Sample> = (0..10).map(|i| base + TimeDelta::seconds(i)).collect();
        let factory = ScriptedSourceFactory::new(samples.clone());
        assert_eq!(factory.len(), 10);

        let mut feed = factory.start(Duration::from_secs(1));
        let mut replayed = Vec::new();
        while let Some(sample) = feed.samples.recv().await {
            replayed.push(sample);
        }

        assert_eq!(replayed, samples);
    }

    #[tokio::test]
    async fn test_scripted_source_stop_ends_stream() {
        let base = Utc::now();
        let samples: Vec<Sample> = (0..10_000).map(|i| base + TimeDelta::seconds(i)).collect();
        let mut feed = ScriptedSourceFactory::new(samples).start(Duration::from_secs(1));

        assert!(feed.samples.recv().await.is_some());
        feed.source.stop();

        let drained = tokio::time::timeout(Duration::from_secs(1), async {
            let mut count = 0;
            while feed.samples.recv().await.is_some() {
                count += 1;
            }
            count
        })
        .await
        .expect("stream should end after stop");
        assert!(drained <= SCRIPTED_BUFFER + 1);
    }

    #[tokio::test]
    async fn test_system_source_samples_wall_clock() {
        let mut feed = SystemSourceFactory.start(Duration::from_millis(5));
        let before = Utc::now();

        let sample = tokio::time::timeout(Duration::from_secs(1), feed.samples.recv())
            .await
            .expect("sample within timeout")
            .expect("stream open");
        assert!(sample >= before);

        feed.source.stop();
    }
}
