//! Backend record identifiers and row mapping

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::SessionRow;
use crate::error::SessionError;
use crate::serializer::Serializer;

type HmacSha256 = Hmac<Sha256>;

/// How the primary key of a new backend row is derived from its session id
///
/// Chosen once at construction.
#[derive(Clone, Default)]
pub enum RecordIdStrategy {
    /// Use the session id itself
    SessionId,
    /// Apply a deterministic function to the session id
    Derived(Arc<dyn Fn(&str) -> String + Send + Sync>),
    /// Generate a random token for every new row
    #[default]
    Random,
}

impl RecordIdStrategy {
    pub fn session_id() -> Self {
        RecordIdStrategy::SessionId
    }

    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        RecordIdStrategy::Derived(Arc::new(f))
    }

    /// Keyed HMAC-SHA256 of the session id, URL-safe base64 without padding
    pub fn hmac_sha256<S: Into<String>>(secret: S) -> Self {
        let secret = secret.into();
        Self::derived(move |sid| {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(sid.as_bytes());
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        })
    }

    pub fn random() -> Self {
        RecordIdStrategy::Random
    }
}

impl fmt::Debug for RecordIdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordIdStrategy::SessionId => f.write_str("SessionId"),
            RecordIdStrategy::Derived(_) => f.write_str("Derived(..)"),
            RecordIdStrategy::Random => f.write_str("Random"),
        }
    }
}

/// Payload and expiration read back from a row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub data: Value,
    pub expires_at: DateTime<Utc>,
}

/// Maps session ids to backend keys and rows to session payloads
#[derive(Clone)]
pub struct RecordMapper {
    strategy: RecordIdStrategy,
    serializer: Arc<dyn Serializer>,
}

impl RecordMapper {
    pub fn new(strategy: RecordIdStrategy, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            strategy,
            serializer,
        }
    }

    /// Backend primary key for a row created for `sid`
    pub fn id_to_backend_key(&self, sid: &str) -> String {
        match &self.strategy {
            RecordIdStrategy::SessionId => sid.to_string(),
            RecordIdStrategy::Derived(f) => f(sid),
            RecordIdStrategy::Random => Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn row_to_session(&self, row: &SessionRow) -> Result<StoredSession, SessionError> {
        Ok(StoredSession {
            data: self.serializer.deserialize(&row.data)?,
            expires_at: row.expires_at,
        })
    }

    pub fn session_to_row(
        &self,
        sid: &str,
        data: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRow, SessionError> {
        Ok(SessionRow {
            id: self.id_to_backend_key(sid),
            sid: sid.to_string(),
            data: self.serializer.serialize(data)?,
            expires_at,
        })
    }
}
