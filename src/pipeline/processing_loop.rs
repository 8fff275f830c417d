//! Periodic sampling loop shared by every session.
//!
//! The loop only owns timing and cancellation. What a tick does lives behind
//! [`TickDriver`], which the session implements.

use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// ============================================================================
// Tick Driver
// ============================================================================

/// Work performed on every loop tick.
#[async_trait]
pub trait TickDriver: Send + Sync + 'static {
    /// False once the owner wants the loop gone (session or loop stopped).
    fn is_running(&self) -> bool;

    /// Current tick period; re-read after every tick so config reloads apply.
    fn tick_interval(&self) -> Duration;

    /// One iteration. Failures, panics included, are the driver's to contain.
    async fn tick(&self);

    /// Human-readable name for logging.
    fn driver_name(&self) -> &str;
}

// ============================================================================
// Sampling Loop
// ============================================================================

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
}

/// Why the loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    Stopped,
    DriverDropped,
}

/// Cancellable periodic task driving a [`TickDriver`].
///
/// Holds only a weak reference so a dropped session also ends its loop.
pub struct SamplingLoop<D: TickDriver> {
    driver: Weak<D>,
    cancel_token: CancellationToken,
}

impl<D: TickDriver> SamplingLoop<D> {
    pub fn new(driver: Weak<D>, cancel_token: CancellationToken) -> Self {
        Self { driver, cancel_token }
    }

    /// Run until cancelled, stopped by the driver, or the driver is dropped.
    pub async fn run(self) -> (LoopExit, LoopStats) {
        let mut stats = LoopStats::default();

        let Some(period) = self.driver.upgrade().map(|d| d.tick_interval()) else {
            return (LoopExit::DriverDropped, stats);
        };
        let mut ticker = new_ticker(period);

        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break LoopExit::Cancelled,
                _ = ticker.tick() => {}
            }

            let Some(driver) = self.driver.upgrade() else {
                break LoopExit::DriverDropped;
            };
            if self.cancel_token.is_cancelled() {
                break LoopExit::Cancelled;
            }
            if !driver.is_running() {
                break LoopExit::Stopped;
            }

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break LoopExit::Cancelled,
                _ = driver.tick() => {}
            }
            stats.ticks += 1;

            let period = driver.tick_interval();
            if period != ticker.period() {
                debug!(period_ms = period.as_millis() as u64, "Tick interval changed");
                ticker = new_ticker(period);
            }
        };

        match self.driver.upgrade() {
            Some(driver) => info!(
                driver = driver.driver_name(),
                ticks = stats.ticks,
                exit = ?exit,
                "Sampling loop stopped"
            ),
            None => info!(ticks = stats.ticks, exit = ?exit, "Sampling loop stopped"),
        }
        (exit, stats)
    }
}

fn new_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
