//! Backend reachability guard
//!
//! The guard probes the backend once with a cheap count query. A failed probe
//! disables the store for good: every later operation resolves empty without
//! touching the backend.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

use crate::backend::{RowFilter, SessionBackend};
use crate::logger::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No probe has completed yet
    Unverified,
    Connected,
    /// Terminal
    Disabled,
}

#[derive(Debug, Default)]
pub struct ConnectionGuard {
    probe: OnceCell<()>,
    connected: AtomicBool,
    disabled: AtomicBool,
}

impl ConnectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        if self.disabled.load(Ordering::SeqCst) {
            ConnectionState::Disabled
        } else if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Unverified
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// Disable the store permanently
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Run the probe if it has not run yet. Concurrent callers share one probe.
    pub(crate) async fn connect<B>(&self, backend: &B, model: &str, logger: &LevelFilter)
    where
        B: SessionBackend + ?Sized,
    {
        self.probe
            .get_or_init(|| async {
                if self.is_disabled() {
                    return;
                }
                match backend.count(model, RowFilter::All).await {
                    Ok(count) => {
                        self.connected.store(true, Ordering::SeqCst);
                        logger.log(&format!(
                            "connected to session model `{}` ({} rows)",
                            model, count
                        ));
                    }
                    Err(e) => {
                        self.disable();
                        logger.error(&format!(
                            "could not connect to session model `{}`: {}. Likely cause: {}. \
                             The session store is disabled and will behave as empty",
                            model,
                            e,
                            e.likely_cause()
                        ));
                    }
                }
            })
            .await;
    }

    /// Gate for every store operation; false means resolve empty
    pub(crate) async fn validate<B>(&self, backend: &B, model: &str, logger: &LevelFilter) -> bool
    where
        B: SessionBackend + ?Sized,
    {
        if !self.is_disabled() {
            self.connect(backend, model, logger).await;
        }
        if self.is_disabled() {
            logger.warn("session store is disabled; skipping backend call");
            return false;
        }
        true
    }
}
