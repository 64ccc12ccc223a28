//! Session store trait

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::SessionError;
use crate::session::SessionData;

/// Store interface consumed by session middleware
///
/// Mirrors the express-session store contract. Expiration is the store's
/// business: `set` and `touch` compute it, `get` and `all` never return an
/// expired session.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get a session by ID
    ///
    /// Returns None if the session doesn't exist or has expired
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError>;

    /// Set/update a session
    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError>;

    /// Destroy/delete a session; a missing session is not an error
    async fn destroy(&self, sid: &str) -> Result<(), SessionError>;

    /// Destroy several sessions
    async fn destroy_many(&self, sids: &[String]) -> Result<(), SessionError> {
        for sid in sids {
            self.destroy(sid).await?;
        }
        Ok(())
    }

    /// Touch a session - refresh its expiration without modifying data
    ///
    /// This is called when the session is accessed but not modified
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<(), SessionError>;

    /// Clear all sessions (optional)
    async fn clear(&self) -> Result<(), SessionError> {
        Err(SessionError::StoreError("clear not implemented".to_string()))
    }

    /// Get the count of all sessions (optional)
    async fn length(&self) -> Result<usize, SessionError> {
        Err(SessionError::StoreError("length not implemented".to_string()))
    }

    /// Get all session IDs (optional)
    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        Err(SessionError::StoreError("ids not implemented".to_string()))
    }

    /// Get all live sessions keyed by session ID (optional)
    async fn all(&self) -> Result<HashMap<String, SessionData>, SessionError> {
        Err(SessionError::StoreError("all not implemented".to_string()))
    }
}
