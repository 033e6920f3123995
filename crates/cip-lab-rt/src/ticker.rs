//! ---
//! cip_section: "01-core-functionality"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Tick sources driving lab sessions."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Source of simulation ticks. `None` means the source is exhausted and the
/// session should wind down.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self) -> Option<Instant>;

    /// Nominal spacing between ticks, used for jitter accounting.
    fn period(&self) -> Option<Duration> {
        None
    }
}

/// Fixed-rate ticker; late ticks are delayed rather than bunched up.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: tokio::time::Interval,
    period: Duration,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// Like [`IntervalTicker::new`] but the first tick fires one period from now.
    pub fn delayed(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Option<Instant> {
        Some(self.interval.tick().await)
    }

    fn period(&self) -> Option<Duration> {
        Some(self.period)
    }
}

/// Ticker that only fires when its paired [`ManualClock`] is advanced.
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Handle used to step a [`ManualTicker`]. Dropping every clock ends the ticker.
#[derive(Debug, Clone)]
pub struct ManualClock {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn channel() -> (Self, ManualClock) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualClock { tx })
    }
}

impl ManualClock {
    /// Queue `ticks` ticks; returns false once the ticker is gone.
    pub fn advance(&self, ticks: usize) -> bool {
        for _ in 0..ticks {
            if self.tx.send(()).is_err() {
                debug!("manual ticker dropped");
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Option<Instant> {
        self.rx.recv().await.map(|()| Instant::now())
    }
}
