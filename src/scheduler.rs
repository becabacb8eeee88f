//! Periodic update loop driving the provider chain and the display.
//!
//! The timer is single-shot: each arming spawns one task that sleeps for the
//! interval and then runs exactly one cycle. The next arming happens only
//! once that cycle has finished, so slow fetches delay the next cycle but
//! never overlap it.
//!
//! Every arming and every teardown bumps a generation counter. A cycle may
//! publish its text and re-arm only while its generation is current and the
//! scheduler is alive, which keeps a single pending timer at all times and
//! discards results that arrive after [`UpdateScheduler::stop`].

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::core::config::Intervals;
use crate::core::display::Display;
use crate::core::error::CycleError;
use crate::core::rate::{FAILURE_TEXT, RateReading, format_display_text};
use crate::providers::chain::ProviderChain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer armed.
    Idle,
    /// Timer armed, waiting to fire.
    Scheduled,
    /// Fetch in flight.
    Running,
}

/// Result of one update cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Success(RateReading),
    Failure(CycleError),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success(_))
    }

    pub fn display_text(&self) -> String {
        match self {
            CycleOutcome::Success(reading) => format_display_text(reading.rate),
            CycleOutcome::Failure(_) => FAILURE_TEXT.to_string(),
        }
    }

    pub fn next_interval(&self, intervals: &Intervals) -> Duration {
        match self {
            CycleOutcome::Success(_) => intervals.healthy_interval(),
            CycleOutcome::Failure(_) => intervals.degraded_interval(),
        }
    }
}

struct TimerSlot {
    handle: Option<JoinHandle<()>>,
    generation: u64,
    state: SchedulerState,
    interval: Option<Duration>,
}

struct Inner {
    chain: ProviderChain,
    display: Arc<dyn Display>,
    intervals: Intervals,
    alive: AtomicBool,
    slot: Mutex<TimerSlot>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, TimerSlot> {
        // A poisoned slot still holds a consistent handle and counter.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the pending timer with a new one firing after `delay`.
    /// Returns the previous handle; the caller decides whether to abort it.
    fn arm_locked(
        self: &Arc<Self>,
        slot: &mut TimerSlot,
        delay: Duration,
    ) -> Option<JoinHandle<()>> {
        slot.generation += 1;
        let generation = slot.generation;
        let previous = slot.handle.take();

        let inner = Arc::clone(self);
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation).await;
        }));
        slot.state = SchedulerState::Scheduled;
        slot.interval = Some(delay);
        debug!(generation, delay_secs = delay.as_secs_f64(), "Timer armed");
        previous
    }

    fn arm(self: &Arc<Self>, delay: Duration) {
        let mut slot = self.slot();
        if let Some(previous) = self.arm_locked(&mut slot, delay) {
            previous.abort();
        }
    }

    fn is_current(&self, slot: &TimerSlot, generation: u64) -> bool {
        self.alive.load(Ordering::SeqCst) && slot.generation == generation
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        {
            let mut slot = self.slot();
            if !self.is_current(&slot, generation) {
                debug!(generation, "Stale timer fired, ignoring");
                return;
            }
            slot.state = SchedulerState::Running;
        }

        let outcome = self.run_cycle().await;

        let mut slot = self.slot();
        if !self.is_current(&slot, generation) {
            debug!(generation, "Scheduler changed while fetching, discarding result");
            return;
        }

        let text = outcome.display_text();
        let published =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.display.set_text(&text)));

        let next_interval = match published {
            Ok(()) => {
                let next_interval = outcome.next_interval(&self.intervals);
                info!(
                    %text,
                    success = outcome.is_success(),
                    next_interval_secs = next_interval.as_secs(),
                    "Update cycle complete"
                );
                next_interval
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let next_interval = self.intervals.degraded_interval();
                error!(
                    %message,
                    next_interval_secs = next_interval.as_secs(),
                    "Unexpected failure while publishing rate text"
                );
                next_interval
            }
        };
        // The previous handle belongs to this very task, so it is dropped
        // rather than aborted.
        drop(self.arm_locked(&mut slot, next_interval));
    }

    async fn run_cycle(&self) -> CycleOutcome {
        match AssertUnwindSafe(self.chain.fetch_rate()).catch_unwind().await {
            Ok(Ok(reading)) => CycleOutcome::Success(reading),
            Ok(Err(e)) => CycleOutcome::Failure(e),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "Unexpected failure during update cycle");
                CycleOutcome::Failure(CycleError::Unexpected(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owns the repeating update timer.
///
/// Must be started from within a tokio runtime. Dropping the scheduler stops
/// it.
pub struct UpdateScheduler {
    inner: Arc<Inner>,
}

impl UpdateScheduler {
    pub fn new(chain: ProviderChain, display: Arc<dyn Display>, intervals: Intervals) -> Self {
        UpdateScheduler {
            inner: Arc::new(Inner {
                chain,
                display,
                intervals,
                alive: AtomicBool::new(false),
                slot: Mutex::new(TimerSlot {
                    handle: None,
                    generation: 0,
                    state: SchedulerState::Idle,
                    interval: None,
                }),
            }),
        }
    }

    /// Starts updating with an immediate first cycle. Calling it on a running
    /// scheduler behaves like [`reconfigure`](Self::reconfigure).
    pub fn start(&self) {
        info!(providers = ?self.inner.chain.provider_names(), "Starting rate updates");
        self.inner.alive.store(true, Ordering::SeqCst);
        self.inner.arm(Duration::ZERO);
    }

    /// Cancels the pending timer and runs a new cycle immediately. A cycle
    /// already in flight is abandoned, so cycles never overlap.
    pub fn reconfigure(&self) {
        if !self.inner.alive.load(Ordering::SeqCst) {
            debug!("Reconfigure requested on a stopped scheduler, ignoring");
            return;
        }
        info!("Reconfigured, refreshing rate now");
        self.inner.arm(Duration::ZERO);
    }

    /// Tears the scheduler down. No cycle starts and nothing is displayed
    /// after this returns, even if a fetch was in flight.
    pub fn stop(&self) {
        let was_alive = self.inner.alive.swap(false, Ordering::SeqCst);
        let mut slot = self.inner.slot();
        slot.generation += 1;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.state = SchedulerState::Idle;
        slot.interval = None;
        if was_alive {
            info!("Stopped rate updates");
        }
    }

    /// Runs one cycle without touching the display or the timer.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.inner.run_cycle().await
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.slot().state
    }

    /// Delay the pending timer was armed with, if any.
    pub fn current_interval(&self) -> Option<Duration> {
        self.inner.slot().interval
    }

    /// Whether a timer is pending. False while a cycle is in flight, since
    /// the next timer is only armed once that cycle completes.
    pub fn is_armed(&self) -> bool {
        let slot = self.inner.slot();
        slot.state == SchedulerState::Scheduled
            && slot
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    pub fn intervals(&self) -> Intervals {
        self.inner.intervals
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
