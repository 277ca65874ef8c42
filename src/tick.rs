//! Tick sources that drive the machine's loop.
//!
//! The machine never decides when ticks happen. It consumes a [`TickSource`]
//! and does one tick of work for each value it yields:
//! - [`IntervalTicks`] fires on a fixed period using `tokio::time::interval`
//! - [`manual_ticks`] lets a host loop (for example a per-frame callback) push
//!   ticks through a [`TickDriver`]

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::{ConfigError, MissedTicks};

/// One advance signal from a tick source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// When the source produced the tick.
    pub at: Instant,
}

/// A repeating, cancellable sequence of ticks.
///
/// The loop drops a pending `next_tick` future when it is stopped, so
/// implementations must be cancel safe.
#[async_trait]
pub trait TickSource: Send {
    /// Waits for the next tick. `None` means the source is exhausted and the
    /// loop should end.
    async fn next_tick(&mut self) -> Option<Tick>;
}

#[async_trait]
impl<T: TickSource + ?Sized> TickSource for Box<T> {
    async fn next_tick(&mut self) -> Option<Tick> {
        (**self).next_tick().await
    }
}

/// Fixed-period ticks.
#[derive(Debug)]
pub struct IntervalTicks {
    interval: Interval,
}

impl IntervalTicks {
    /// Ticks every `period`, starting immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(period: Duration, missed: MissedTicks) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::from(missed));
        Ok(Self { interval })
    }

    /// Time between ticks.
    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        Some(Tick {
            at: self.interval.tick().await,
        })
    }
}

/// Creates a host-driven tick source.
///
/// Every [`TickDriver::tick`] call queues one tick; none are coalesced, so a
/// host that ticks faster than the machine can keep up only delays later
/// ticks. The source is exhausted once every driver is dropped and the queued
/// ticks are consumed.
///
/// The queue is unbounded: a host that keeps ticking faster than the machine
/// can finish ticks grows it without limit. Use [`manual_ticks_bounded`] to
/// cap it.
pub fn manual_ticks() -> (TickDriver, ManualTicks) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TickDriver {
            tx: DriverTx::Unbounded(tx),
        },
        ManualTicks {
            rx: SourceRx::Unbounded(rx),
        },
    )
}

/// Creates a host-driven tick source that queues at most `capacity` ticks.
///
/// Ticks sent while the queue is full are dropped and
/// [`TickDriver::tick`] reports [`TickSent::Dropped`]. A `capacity` of zero is
/// treated as one.
pub fn manual_ticks_bounded(capacity: usize) -> (TickDriver, ManualTicks) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TickDriver {
            tx: DriverTx::Bounded(tx),
        },
        ManualTicks {
            rx: SourceRx::Bounded(rx),
        },
    )
}

/// Result of [`TickDriver::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSent {
    Queued,
    /// A bounded queue was full; the tick was not queued.
    Dropped,
    /// The tick source is gone.
    Closed,
}

impl TickSent {
    /// Whether the tick source is still there to receive ticks.
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }
}

#[derive(Debug, Clone)]
enum DriverTx {
    Unbounded(mpsc::UnboundedSender<Instant>),
    Bounded(mpsc::Sender<Instant>),
}

/// Sending half of [`manual_ticks`] and [`manual_ticks_bounded`].
#[derive(Debug, Clone)]
pub struct TickDriver {
    tx: DriverTx,
}

impl TickDriver {
    /// Queues one tick.
    pub fn tick(&self) -> TickSent {
        match &self.tx {
            DriverTx::Unbounded(tx) => match tx.send(Instant::now()) {
                Ok(()) => TickSent::Queued,
                Err(_) => TickSent::Closed,
            },
            DriverTx::Bounded(tx) => match tx.try_send(Instant::now()) {
                Ok(()) => TickSent::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => TickSent::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => TickSent::Closed,
            },
        }
    }
}

#[derive(Debug)]
enum SourceRx {
    Unbounded(mpsc::UnboundedReceiver<Instant>),
    Bounded(mpsc::Receiver<Instant>),
}

/// Receiving half of [`manual_ticks`] and [`manual_ticks_bounded`].
#[derive(Debug)]
pub struct ManualTicks {
    rx: SourceRx,
}

#[async_trait]
impl TickSource for ManualTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        let at = match &mut self.rx {
            SourceRx::Unbounded(rx) => rx.recv().await,
            SourceRx::Bounded(rx) => rx.recv().await,
        };
        at.map(|at| Tick { at })
    }
}

/// A tick source that ends after a fixed number of ticks.
#[derive(Debug)]
pub struct Take<T> {
    inner: T,
    remaining: u64,
}

#[async_trait]
impl<T: TickSource> TickSource for Take<T> {
    async fn next_tick(&mut self) -> Option<Tick> {
        if self.remaining == 0 {
            return None;
        }
        let tick = self.inner.next_tick().await?;
        self.remaining -= 1;
        Some(tick)
    }
}

/// Adapters for tick sources.
pub trait TickSourceExt: TickSource + Sized {
    /// Yields at most `n` ticks from this source.
    fn take(self, n: u64) -> Take<Self> {
        Take {
            inner: self,
            remaining: n,
        }
    }
}

impl<T: TickSource> TickSourceExt for T {}
