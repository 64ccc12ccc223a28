//! Session store over an ORM backend
//!
//! Every operation follows the same path: ask the connection guard whether the
//! backend is usable, call the backend, then map rows through the record
//! mapper. A disabled store resolves every operation empty instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::in_flight::{InFlight, Operation};
use super::SessionStore;
use crate::backend::{RowFilter, SessionBackend, SessionRow};
use crate::config::{SetMode, StoreConfig, ONE_DAY};
use crate::error::SessionError;
use crate::expiration::compute_expiration;
use crate::guard::{ConnectionGuard, ConnectionState};
use crate::logger::LevelFilter;
use crate::record::RecordMapper;
use crate::session::SessionData;

pub(crate) struct Inner<B> {
    pub(crate) backend: B,
    pub(crate) config: StoreConfig,
    pub(crate) guard: ConnectionGuard,
    pub(crate) mapper: RecordMapper,
    pub(crate) logger: LevelFilter,
    pub(crate) in_flight: InFlight,
    pub(crate) pruner: Mutex<Option<JoinHandle<()>>>,
}

impl<B> Drop for Inner<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.pruner.get_mut().take() {
            handle.abort();
        }
    }
}

/// Session store persisting to a [`SessionBackend`]
///
/// # Example
///
/// ```rust,ignore
/// use orm_session_store::{MemoryBackend, PersistentStore, StoreConfig};
/// use std::time::Duration;
///
/// let config = StoreConfig::new()
///     .with_ttl(Duration::from_secs(3600))
///     .with_check_period(Duration::from_secs(120));
/// let store = PersistentStore::connect(MemoryBackend::new(), config).await;
/// ```
pub struct PersistentStore<B: SessionBackend> {
    pub(crate) inner: Arc<Inner<B>>,
}

impl<B: SessionBackend> Clone for PersistentStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: SessionBackend> PersistentStore<B> {
    /// Create a store without contacting the backend
    ///
    /// The connection probe runs on the first operation.
    pub fn new(backend: B, config: StoreConfig) -> Self {
        let mapper = RecordMapper::new(config.record_id.clone(), Arc::clone(&config.serializer));
        let logger = LevelFilter::new(Arc::clone(&config.logger), &config.log_levels);
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                guard: ConnectionGuard::new(),
                mapper,
                logger,
                in_flight: InFlight::default(),
                pruner: Mutex::new(None),
            }),
        }
    }

    /// Create a store, probe the backend, and start pruning when a check
    /// period is configured
    ///
    /// Never fails: an unusable backend leaves the store disabled.
    pub async fn connect(backend: B, config: StoreConfig) -> Self {
        let store = Self::new(backend, config);
        let inner = &store.inner;
        inner
            .guard
            .connect(&inner.backend, &inner.config.model_name, &inner.logger)
            .await;
        if inner.config.check_period.is_some() && !inner.guard.is_disabled() {
            store.start_interval(None);
        }
        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.guard.state()
    }

    /// Probe the backend if needed and report whether it is usable
    pub async fn check_connection(&self) -> Result<(), SessionError> {
        if self.validate().await {
            Ok(())
        } else {
            Err(SessionError::ConnectionUnavailable)
        }
    }

    pub(crate) async fn validate(&self) -> bool {
        let inner = &self.inner;
        inner
            .guard
            .validate(&inner.backend, &inner.config.model_name, &inner.logger)
            .await
    }

    fn model(&self) -> &str {
        &self.inner.config.model_name
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.config.clock.now()
    }

    /// TTL in milliseconds: config, then the cookie's remaining max age, then one day
    fn ttl_ms(&self, session: &SessionData, now: DateTime<Utc>) -> i64 {
        if let Some(ttl) = self.inner.config.ttl {
            return i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        }
        session
            .cookie
            .max_age(now)
            .unwrap_or(ONE_DAY.as_millis() as i64)
    }

    fn expiration_for(&self, session: &SessionData, now: DateTime<Utc>) -> DateTime<Utc> {
        compute_expiration(now, self.ttl_ms(session, now), self.inner.config.rounding)
    }

    fn decode(&self, row: &SessionRow) -> Result<SessionData, SessionError> {
        let stored = self.inner.mapper.row_to_session(row)?;
        serde_json::from_value(stored.data).map_err(|e| SessionError::MalformedPayload(e.to_string()))
    }

    /// Decode a row, logging and discarding malformed payloads
    fn decode_or_log(&self, row: &SessionRow) -> Option<SessionData> {
        match self.decode(row) {
            Ok(data) => Some(data),
            Err(e) => {
                self.inner
                    .logger
                    .error(&format!("session:{} has an unreadable payload: {}", row.sid, e));
                None
            }
        }
    }

    /// Live (unexpired, readable) stored session and its expiration
    async fn load_live(
        &self,
        sid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(SessionData, DateTime<Utc>)>, SessionError> {
        let row = match self.inner.backend.find_unique(self.model(), sid).await? {
            Some(row) if row.expires_at > now => row,
            _ => return Ok(None),
        };
        Ok(self.decode_or_log(&row).map(|data| (data, row.expires_at)))
    }

    pub async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError> {
        if !self.validate().await {
            return Ok(None);
        }
        let now = self.now();
        Ok(self.load_live(sid, now).await?.map(|(data, _)| data))
    }

    pub async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        if !self.validate().await {
            return Ok(());
        }
        let inner = &self.inner;
        let Some(_marker) = inner
            .in_flight
            .begin(Operation::Set, sid, inner.config.concurrent_set)
        else {
            inner
                .logger
                .log(&format!("session:{} set already in flight; skipping", sid));
            return Ok(());
        };

        let now = self.now();
        let existing = if inner.config.set_mode == SetMode::Merge || !inner.config.rolling {
            self.load_live(sid, now).await?
        } else {
            None
        };

        let mut payload = session.clone();
        let mut kept_expiration = None;
        if let Some((mut stored, expires_at)) = existing {
            if inner.config.set_mode == SetMode::Merge {
                stored.merge(session);
                payload = stored;
            }
            if !inner.config.rolling {
                kept_expiration = Some(expires_at);
            }
        }
        let expires_at = kept_expiration.unwrap_or_else(|| self.expiration_for(session, now));

        let value = serde_json::to_value(&payload)
            .map_err(|e| SessionError::SerializationError(e.to_string()))?;
        let row = inner.mapper.session_to_row(sid, &value, expires_at)?;
        inner.backend.upsert(self.model(), row).await?;
        inner
            .logger
            .log(&format!("session:{} saved, expires at {}", sid, expires_at));
        Ok(())
    }

    pub async fn touch(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        if !self.validate().await {
            return Ok(());
        }
        let inner = &self.inner;
        if !inner.config.concurrent_touch && inner.in_flight.is_setting(sid) {
            // The pending set writes a fresh expiration
            return Ok(());
        }
        let Some(_marker) = inner
            .in_flight
            .begin(Operation::Touch, sid, inner.config.concurrent_touch)
        else {
            return Ok(());
        };

        let now = self.now();
        let row = match inner.backend.find_unique(self.model(), sid).await? {
            Some(row) if row.expires_at > now => row,
            _ => return Ok(()),
        };
        let mut stored = match self.decode(&row) {
            Ok(stored) => stored,
            Err(e) => {
                inner
                    .logger
                    .error(&format!("session:{} not touched: {}", sid, e));
                return Ok(());
            }
        };
        stored.cookie = session.cookie.clone();

        let value = serde_json::to_value(&stored)
            .map_err(|e| SessionError::SerializationError(e.to_string()))?;
        let expires_at = self.expiration_for(session, now);
        let touched = SessionRow {
            id: row.id,
            sid: row.sid,
            data: inner.config.serializer.serialize(&value)?,
            expires_at,
        };
        // Update only: a row destroyed since the read stays destroyed
        if !inner.backend.update(self.model(), touched).await? {
            inner
                .logger
                .log(&format!("session:{} vanished before touch; skipping", sid));
        }
        Ok(())
    }

    pub async fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        if !self.validate().await {
            return Ok(());
        }
        self.inner
            .backend
            .delete_many(self.model(), RowFilter::Sid(sid.to_string()))
            .await?;
        Ok(())
    }

    pub async fn destroy_many(&self, sids: &[String]) -> Result<(), SessionError> {
        if !self.validate().await {
            return Ok(());
        }
        for sid in sids {
            self.inner
                .backend
                .delete_many(self.model(), RowFilter::Sid(sid.clone()))
                .await?;
        }
        Ok(())
    }

    /// Every unexpired session keyed by session id
    pub async fn all(&self) -> Result<HashMap<String, SessionData>, SessionError> {
        if !self.validate().await {
            return Ok(HashMap::new());
        }
        let now = self.now();
        let rows = self.inner.backend.find_many(self.model()).await?;
        Ok(rows
            .iter()
            .filter(|row| row.expires_at > now)
            .filter_map(|row| self.decode_or_log(row).map(|data| (row.sid.clone(), data)))
            .collect())
    }

    /// Every stored session id, expired or not
    pub async fn ids(&self) -> Result<Vec<String>, SessionError> {
        if !self.validate().await {
            return Ok(Vec::new());
        }
        let rows = self.inner.backend.find_many(self.model()).await?;
        Ok(rows.into_iter().map(|row| row.sid).collect())
    }

    /// Number of stored rows, expired or not
    pub async fn length(&self) -> Result<usize, SessionError> {
        if !self.validate().await {
            return Ok(0);
        }
        let count = self
            .inner
            .backend
            .count(self.model(), RowFilter::All)
            .await?;
        Ok(count as usize)
    }

    pub async fn clear(&self) -> Result<(), SessionError> {
        if !self.validate().await {
            return Ok(());
        }
        self.inner
            .backend
            .delete_many(self.model(), RowFilter::All)
            .await?;
        Ok(())
    }

    /// Delete every expired row, returning how many were removed
    pub async fn prune(&self) -> Result<u64, SessionError> {
        if !self.validate().await {
            return Ok(0);
        }
        let now = self.now();
        let deleted = self
            .inner
            .backend
            .delete_many(self.model(), RowFilter::ExpiredAt(now))
            .await?;
        self.inner
            .logger
            .log(&format!("pruned {} expired sessions", deleted));
        Ok(deleted)
    }

    /// Stop pruning, release the backend, and disable the store
    ///
    /// The store should be discarded afterwards.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.stop_interval();
        self.inner.guard.disable();
        self.inner.backend.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl<B: SessionBackend> SessionStore for PersistentStore<B> {
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError> {
        PersistentStore::get(self, sid).await
    }

    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        PersistentStore::set(self, sid, session).await
    }

    async fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        PersistentStore::destroy(self, sid).await
    }

    async fn destroy_many(&self, sids: &[String]) -> Result<(), SessionError> {
        PersistentStore::destroy_many(self, sids).await
    }

    async fn touch(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        PersistentStore::touch(self, sid, session).await
    }

    async fn clear(&self) -> Result<(), SessionError> {
        PersistentStore::clear(self).await
    }

    async fn length(&self) -> Result<usize, SessionError> {
        PersistentStore::length(self).await
    }

    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        PersistentStore::ids(self).await
    }

    async fn all(&self) -> Result<HashMap<String, SessionData>, SessionError> {
        PersistentStore::all(self).await
    }
}
