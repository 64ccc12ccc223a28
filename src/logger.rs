//! Injectable logger
//!
//! The store never writes to a log transport directly. Everything goes through
//! a [`SessionLogger`], which defaults to forwarding to `tracing`.

use std::collections::HashSet;
use std::sync::Arc;

/// Log levels the store emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 3] = [LogLevel::Log, LogLevel::Warn, LogLevel::Error];
}

/// Sink for store diagnostics
pub trait SessionLogger: Send + Sync + 'static {
    fn log(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Logger that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SessionLogger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::debug!(target: "orm_session_store", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "orm_session_store", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "orm_session_store", "{}", message);
    }
}

/// Logger wrapper that drops disabled levels
#[derive(Clone)]
pub(crate) struct LevelFilter {
    inner: Arc<dyn SessionLogger>,
    levels: HashSet<LogLevel>,
}

impl LevelFilter {
    pub(crate) fn new(inner: Arc<dyn SessionLogger>, levels: &[LogLevel]) -> Self {
        Self {
            inner,
            levels: levels.iter().copied().collect(),
        }
    }

    pub(crate) fn log(&self, message: &str) {
        if self.levels.contains(&LogLevel::Log) {
            self.inner.log(message);
        }
    }

    pub(crate) fn warn(&self, message: &str) {
        if self.levels.contains(&LogLevel::Warn) {
            self.inner.warn(message);
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if self.levels.contains(&LogLevel::Error) {
            self.inner.error(message);
        }
    }
}
