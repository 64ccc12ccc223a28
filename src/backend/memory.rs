//! In-memory session backend
//!
//! This is primarily for development and testing.
//! For production, implement [`SessionBackend`] over your ORM client.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{RowFilter, SessionBackend, SessionRow};
use crate::config::DEFAULT_MODEL_NAME;
use crate::error::BackendError;

type Table = HashMap<String, SessionRow>;

#[derive(Default)]
struct Shared {
    models: RwLock<HashMap<String, Table>>,
    calls: AtomicUsize,
    unreachable: AtomicBool,
    fail_next: RwLock<Option<BackendError>>,
    disconnected: AtomicBool,
}

/// In-memory backend keyed by model name, then session id
///
/// Warning: This backend is not suitable for production use because:
/// - Rows are lost on restart
/// - Rows are not shared across processes
///
/// Cloning shares the underlying tables.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// Create a backend with the default `session` model
    pub fn new() -> Self {
        Self::with_models([DEFAULT_MODEL_NAME])
    }

    /// Create a backend with the given models; any other model name is
    /// reported as missing
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shared = Shared::default();
        {
            let mut tables = shared.models.write();
            for model in models {
                tables.insert(model.into(), Table::new());
            }
        }
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Number of backend calls made so far
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as unreachable
    pub fn set_unreachable(&self, unreachable: bool) {
        self.shared.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: BackendError) {
        *self.shared.fail_next.write() = Some(error);
    }

    pub fn is_disconnected(&self) -> bool {
        self.shared.disconnected.load(Ordering::SeqCst)
    }

    /// Raw row access, bypassing call accounting
    pub fn row(&self, model: &str, sid: &str) -> Option<SessionRow> {
        self.shared
            .models
            .read()
            .get(model)
            .and_then(|t| t.get(sid).cloned())
    }

    /// Insert a row directly, bypassing call accounting
    pub fn insert_row(&self, model: &str, row: SessionRow) {
        self.shared
            .models
            .write()
            .entry(model.to_string())
            .or_default()
            .insert(row.sid.clone(), row);
    }

    fn enter(&self) -> Result<(), BackendError> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.shared.fail_next.write().take() {
            return Err(err);
        }
        if self.shared.unreachable.load(Ordering::SeqCst)
            || self.shared.disconnected.load(Ordering::SeqCst)
        {
            return Err(BackendError::unreachable("memory backend is unreachable"));
        }
        Ok(())
    }

    fn read<T>(&self, model: &str, f: impl FnOnce(&Table) -> T) -> Result<T, BackendError> {
        self.enter()?;
        let models = self.shared.models.read();
        let table = models
            .get(model)
            .ok_or_else(|| BackendError::missing_model(model))?;
        Ok(f(table))
    }

    fn write<T>(&self, model: &str, f: impl FnOnce(&mut Table) -> T) -> Result<T, BackendError> {
        self.enter()?;
        let mut models = self.shared.models.write();
        let table = models
            .get_mut(model)
            .ok_or_else(|| BackendError::missing_model(model))?;
        Ok(f(table))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn find_unique(&self, model: &str, sid: &str) -> Result<Option<SessionRow>, BackendError> {
        self.read(model, |t| t.get(sid).cloned())
    }

    async fn find_many(&self, model: &str) -> Result<Vec<SessionRow>, BackendError> {
        self.read(model, |t| t.values().cloned().collect())
    }

    async fn upsert(&self, model: &str, row: SessionRow) -> Result<(), BackendError> {
        self.write(model, |t| match t.get_mut(&row.sid) {
            Some(existing) => {
                existing.data = row.data;
                existing.expires_at = row.expires_at;
            }
            None => {
                t.insert(row.sid.clone(), row);
            }
        })
    }

    async fn update(&self, model: &str, row: SessionRow) -> Result<bool, BackendError> {
        self.write(model, |t| match t.get_mut(&row.sid) {
            Some(existing) => {
                existing.data = row.data;
                existing.expires_at = row.expires_at;
                true
            }
            None => false,
        })
    }

    async fn delete_many(&self, model: &str, filter: RowFilter) -> Result<u64, BackendError> {
        self.write(model, |t| {
            let before = t.len();
            t.retain(|_, row| !filter.matches(row));
            (before - t.len()) as u64
        })
    }

    async fn count(&self, model: &str, filter: RowFilter) -> Result<u64, BackendError> {
        self.read(model, |t| t.values().filter(|row| filter.matches(row)).count() as u64)
    }

    async fn disconnect(&self) -> Result<(), BackendError> {
        self.shared.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
