//! Session store error types

use std::fmt;

/// Result alias used throughout the store
pub type Result<T> = std::result::Result<T, SessionError>;

/// Broad classification of a backend failure
///
/// The connection guard uses this to explain why the store was disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The database could not be reached
    Unreachable,
    /// The sessions model/table does not exist (missing migration)
    MissingModel,
    /// The backend rejected the credentials
    Unauthorized,
    /// Any other rejected query
    Query,
}

/// Error reported by a [`SessionBackend`](crate::backend::SessionBackend)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new<S: Into<String>>(kind: BackendErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unreachable<S: Into<String>>(message: S) -> Self {
        Self::new(BackendErrorKind::Unreachable, message)
    }

    pub fn missing_model<S: Into<String>>(model: S) -> Self {
        Self::new(
            BackendErrorKind::MissingModel,
            format!("model `{}` does not exist", model.into()),
        )
    }

    pub fn query<S: Into<String>>(message: S) -> Self {
        Self::new(BackendErrorKind::Query, message)
    }

    /// Human readable hint about the likely root cause
    pub fn likely_cause(&self) -> &'static str {
        match self.kind {
            BackendErrorKind::Unreachable => {
                "the database is unreachable; check the connection string and that the server is running"
            }
            BackendErrorKind::MissingModel => {
                "the sessions table is missing; run your migrations or check the configured model name"
            }
            BackendErrorKind::Unauthorized => {
                "the database rejected the credentials; check the user and password"
            }
            BackendErrorKind::Query => "the backend rejected the probe query",
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BackendError {}

/// Errors that can occur during session store operations
#[derive(Debug)]
pub enum SessionError {
    /// Error from the session store itself
    StoreError(String),
    /// The connection guard has disabled the store
    ConnectionUnavailable,
    /// A stored payload could not be deserialized
    MalformedPayload(String),
    /// A payload could not be serialized
    SerializationError(String),
    /// The backend call itself failed
    BackendOperationFailed(BackendError),
    /// A scheduled prune failed
    PruningTaskFailed(Box<SessionError>),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::StoreError(msg) => write!(f, "Session store error: {}", msg),
            SessionError::ConnectionUnavailable => write!(f, "Session store is disabled"),
            SessionError::MalformedPayload(msg) => write!(f, "Malformed session payload: {}", msg),
            SessionError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SessionError::BackendOperationFailed(e) => write!(f, "Backend operation failed: {}", e),
            SessionError::PruningTaskFailed(e) => write!(f, "Scheduled prune failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::BackendOperationFailed(e) => Some(e),
            SessionError::PruningTaskFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        SessionError::BackendOperationFailed(err)
    }
}
