//! Background pruning of expired sessions
//!
//! The task holds only a weak reference to the store: dropping the last store
//! handle ends it, as does `stop_interval` or `shutdown`.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use super::persistent::{Inner, PersistentStore};
use crate::backend::SessionBackend;
use crate::error::SessionError;

/// Receives errors from scheduled prunes
pub type ErrorHandler = Arc<dyn Fn(SessionError) + Send + Sync>;

impl<B: SessionBackend> PersistentStore<B> {
    /// Start pruning every configured check period
    ///
    /// Does nothing if pruning is already running. Scheduled failures go to
    /// `on_error` when given, otherwise they are logged; either way the next
    /// tick still runs. Returns whether a new task was started.
    pub fn start_interval(&self, on_error: Option<ErrorHandler>) -> bool {
        let mut pruner = self.inner.pruner.lock();
        if pruner.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.inner
                    .logger
                    .error(&format!("cannot start session pruning outside a tokio runtime: {}", e));
                return false;
            }
        };

        let period = self.inner.config.check_period_or_default();
        let weak = Arc::downgrade(&self.inner);
        *pruner = Some(runtime.spawn(run_prune_loop(weak, period, on_error)));
        self.inner.logger.log(&format!(
            "session pruning started, every {}s",
            period.as_secs_f64()
        ));
        true
    }

    /// Stop scheduled pruning; no-op when none is running
    pub fn stop_interval(&self) {
        if let Some(handle) = self.inner.pruner.lock().take() {
            handle.abort();
            self.inner.logger.log("session pruning stopped");
        }
    }

    pub fn is_pruning(&self) -> bool {
        self.inner
            .pruner
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

async fn run_prune_loop<B: SessionBackend>(
    weak: Weak<Inner<B>>,
    period: Duration,
    on_error: Option<ErrorHandler>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(inner) = weak.upgrade() else {
            tracing::debug!("session store dropped; pruning task exiting");
            return;
        };
        let store = PersistentStore { inner };

        match store.prune().await {
            Ok(count) => {
                tracing::debug!(pruned = count, "scheduled session prune completed");
            }
            Err(e) => {
                let err = SessionError::PruningTaskFailed(Box::new(e));
                match &on_error {
                    Some(handler) => handler(err),
                    None => store.inner.logger.error(&err.to_string()),
                }
            }
        }
    }
}
