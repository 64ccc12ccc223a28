//! Backend trait and row types

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BackendError;

/// A row of the sessions model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    /// Primary key, produced by the record mapper on creation
    pub id: String,
    /// Session id, unique across the model
    pub sid: String,
    /// Serialized payload
    pub data: String,
    pub expires_at: DateTime<Utc>,
}

/// Row selection for bulk operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Every row
    All,
    /// The row with this session id
    Sid(String),
    /// Rows with `expires_at <= at`
    ExpiredAt(DateTime<Utc>),
}

impl RowFilter {
    pub fn matches(&self, row: &SessionRow) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Sid(sid) => row.sid == *sid,
            RowFilter::ExpiredAt(at) => row.expires_at <= *at,
        }
    }
}

/// ORM client surface used by the store
///
/// Every call names the model (table) it targets. Implementations own all
/// durability and per-row atomicity guarantees.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Look up a row by its unique session id
    async fn find_unique(&self, model: &str, sid: &str) -> Result<Option<SessionRow>, BackendError>;

    /// Every row of the model
    async fn find_many(&self, model: &str) -> Result<Vec<SessionRow>, BackendError>;

    /// Insert or update the row keyed by `row.sid`
    ///
    /// `row.id` is only written when the row is created. Since this can
    /// create, it is only used by `set`.
    async fn upsert(&self, model: &str, row: SessionRow) -> Result<(), BackendError>;

    /// Update the data and expiration of the existing row keyed by `row.sid`
    ///
    /// Never creates a row. Returns whether a row was updated. `touch` relies
    /// on this so a concurrent `destroy` is not undone.
    async fn update(&self, model: &str, row: SessionRow) -> Result<bool, BackendError>;

    /// Delete matching rows, returning how many were removed
    async fn delete_many(&self, model: &str, filter: RowFilter) -> Result<u64, BackendError>;

    /// Count matching rows
    async fn count(&self, model: &str, filter: RowFilter) -> Result<u64, BackendError>;

    /// Release the underlying client
    async fn disconnect(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
