//! # orm-session-store
//!
//! Server-side session persistence over an ORM-backed relational table.
//!
//! This crate implements the express-session store contract (`get`, `set`,
//! `touch`, `destroy`, `all`, `ids`, `length`, `clear`) on top of any client
//! that can implement [`SessionBackend`]: `find_unique`, `find_many`,
//! `upsert`, `delete_many` and `count` over a sessions model.
//!
//! ## Features
//!
//! - **Expiration**: every write stamps a fresh `expires_at`; expired sessions
//!   read as absent until they are pruned
//! - **Fail-soft connection guard**: a backend that fails the startup probe
//!   disables the store, which then behaves as an always-empty store
//! - **Background pruning**: a cancelable interval deletes expired rows
//! - **Pluggable pieces**: record id strategy, serializer, logger and clock
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orm_session_store::{MemoryBackend, PersistentStore, SessionData, StoreConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = StoreConfig::new()
//!         .with_ttl(Duration::from_secs(86400))
//!         .with_check_period(Duration::from_secs(120));
//!     let store = PersistentStore::connect(MemoryBackend::new(), config).await;
//!
//!     let mut session = SessionData::default();
//!     session.set("user", "alice");
//!     store.set("sid", &session).await.unwrap();
//!
//!     let loaded = store.get("sid").await.unwrap();
//!     assert!(loaded.is_some());
//!
//!     store.shutdown().await.unwrap();
//! }
//! ```

pub mod backend;
pub mod callback;
pub mod config;
pub mod error;
pub mod expiration;
pub mod guard;
pub mod logger;
pub mod record;
pub mod serializer;
pub mod session;
pub mod store;

pub use backend::{MemoryBackend, RowFilter, SessionBackend, SessionRow};
pub use callback::with_callback;
pub use config::{SetMode, StoreConfig};
pub use error::{BackendError, BackendErrorKind, Result, SessionError};
pub use expiration::{compute_expiration, Clock, Rounding, SystemClock};
pub use guard::ConnectionState;
pub use logger::{LogLevel, SessionLogger, TracingLogger};
pub use record::{RecordIdStrategy, RecordMapper};
pub use serializer::{JsonSerializer, Serializer};
pub use session::{SessionCookie, SessionData};
pub use store::{ErrorHandler, PersistentStore, SessionStore};
