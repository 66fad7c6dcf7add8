//! Periodic frame throughput reporting

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::pipeline::FrameStore;

/// Frames seen in total and during the last period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    pub total: u64,
    pub per_period: u64,
}

/// Read-only observer of the store's sequence counter.
pub struct ActivityReporter {
    store: Arc<FrameStore>,
    period: Duration,
    last_count: u64,
}

impl ActivityReporter {
    pub fn new(store: Arc<FrameStore>, period: Duration) -> Self {
        Self {
            store,
            period,
            last_count: 0,
        }
    }

    /// Take one sample and move the baseline forward.
    pub fn sample(&mut self) -> ThroughputSample {
        let total = self.store.sequence_count();
        let per_period = total.saturating_sub(self.last_count);
        self.last_count = total;
        ThroughputSample { total, per_period }
    }

    /// Report once per period, forever.
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let sample = self.sample();
            metrics::gauge!("frames_per_period").set(sample.per_period as f64);
            info!(target: "framestamp::activity", "Frames: {} | FPS: {}", sample.total, sample.per_period);
        }
    }
}
