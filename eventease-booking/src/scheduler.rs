//! Periodic pool reset.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::engine::{BookingEngine, BookingError, ReleaseReport};

/// Result of a single scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Released(ReleaseReport),
    /// Another reset (e.g. an admin-triggered one) was still running.
    Skipped,
    Failed(BookingError),
}

type TickObserver = Arc<dyn Fn(&TickOutcome) + Send + Sync>;

/// Timer that returns the whole pool to AVAILABLE every `period`.
///
/// The timer is free-running: the first tick fires one period after start.
/// Ticks never overlap; a tick that comes due while a reset is still running
/// is dropped rather than queued.
pub struct ResetScheduler {
    engine: Arc<BookingEngine>,
    period: Duration,
    observer: Option<TickObserver>,
}

impl ResetScheduler {
    pub fn new(engine: Arc<BookingEngine>, period: Duration) -> Self {
        Self {
            engine,
            period,
            observer: None,
        }
    }

    /// Called after every tick, e.g. to feed metrics.
    pub fn with_observer(mut self, observer: impl Fn(&TickOutcome) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Run one reset. Never fails: errors are logged and reported.
    pub async fn run_once(&self) -> TickOutcome {
        let outcome = match self.engine.release_all().await {
            Ok(report) => TickOutcome::Released(report),
            Err(BookingError::ResetInProgress) => {
                warn!("Scheduled reset skipped: previous reset still running");
                TickOutcome::Skipped
            }
            Err(e) => {
                error!("Error during scheduled flash sale reset: {}", e);
                TickOutcome::Failed(e)
            }
        };

        if let Some(observer) = &self.observer {
            observer(&outcome);
        }
        outcome
    }

    /// Tick until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Reset scheduler started, period={}s", self.period.as_secs_f64());

        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reset scheduler received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        info!("Reset scheduler stopped");
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        SchedulerHandle { shutdown: tx, task }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop and wait for an in-flight reset to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Reset scheduler task failed: {}", e);
        }
    }
}
