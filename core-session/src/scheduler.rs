//! Lifecycle Scheduler
//!
//! Periodically re-checks the stored credential and renews it before it
//! expires. The check interval is coarse (hourly by default) but always at
//! most half the renewal window, so a window is never skipped even if the
//! process was suspended for a while.

use crate::renewal::{RenewalCoordinator, RenewalOutcome};
use crate::types::Freshness;
use core_runtime::events::SignOutReason;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default interval between freshness checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Starts periodic freshness checks.
#[derive(Clone)]
pub struct LifecycleScheduler {
    coordinator: RenewalCoordinator,
    interval: Duration,
}

impl LifecycleScheduler {
    pub fn new(coordinator: RenewalCoordinator) -> Self {
        let interval = clamp_interval(DEFAULT_CHECK_INTERVAL, &coordinator);
        Self {
            coordinator,
            interval,
        }
    }

    /// Overrides the check interval. Still capped at half the renewal
    /// window; a zero interval keeps the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        let requested = if interval.is_zero() {
            DEFAULT_CHECK_INTERVAL
        } else {
            interval
        };
        self.interval = clamp_interval(requested, &self.coordinator);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Checks immediately, then every [`interval`](Self::interval) until the
    /// returned handle is stopped or dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let coordinator = self.coordinator.clone();
        let interval = self.interval;
        let task_token = token.clone();

        info!(interval_secs = interval.as_secs(), "Starting lifecycle scheduler");
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => check(&coordinator, &task_token).await,
                }
            }
            debug!("Lifecycle scheduler stopped");
        });

        SchedulerHandle {
            token,
            task: Some(task),
        }
    }
}

fn clamp_interval(requested: Duration, coordinator: &RenewalCoordinator) -> Duration {
    let ceiling = coordinator.policy().renewal_window() / 2;
    if ceiling.is_zero() {
        return requested;
    }
    requested.min(ceiling)
}

#[instrument(skip_all)]
async fn check(coordinator: &RenewalCoordinator, token: &CancellationToken) {
    let freshness = match coordinator.current_freshness().await {
        None => {
            debug!("No stored credential, skipping check");
            return;
        }
        Some(Freshness::Valid) => return,
        Some(freshness) => freshness,
    };

    debug!(%freshness, "Credential due for renewal");
    let outcome = tokio::select! {
        // The renewal itself keeps running; only this wait is abandoned.
        _ = token.cancelled() => return,
        outcome = coordinator.renew_if_needed() => outcome,
    };

    match outcome {
        RenewalOutcome::Fresh => {}
        RenewalOutcome::Failed => {
            warn!("Scheduled renewal failed");
            coordinator
                .sign_out_signal()
                .fire(SignOutReason::RenewalFailed);
        }
        RenewalOutcome::NoCredential | RenewalOutcome::Superseded => {
            debug!(?outcome, "Session changed during scheduled renewal");
        }
    }
}

/// Handle to a running scheduler.
///
/// Stopping is idempotent and also happens when the handle is dropped.
#[derive(Debug)]
pub struct SchedulerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Cancels the recurring check. Safe to call any number of times.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            info!("Stopping lifecycle scheduler");
            self.token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops the scheduler and waits for its task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Lifecycle scheduler task failed");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
