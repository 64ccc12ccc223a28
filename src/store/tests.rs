use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::in_flight::Operation;
use super::*;
use crate::backend::{MemoryBackend, RowFilter, SessionBackend, SessionRow};
use crate::callback::with_callback;
use crate::config::{SetMode, StoreConfig};
use crate::error::{BackendError, SessionError};
use crate::expiration::testing::ManualClock;
use crate::expiration::Rounding;
use crate::guard::ConnectionState;
use crate::logger::testing::CapturingLogger;
use crate::logger::LogLevel;
use crate::record::RecordIdStrategy;
use crate::session::{SessionCookie, SessionData};

const MODEL: &str = "session";

fn session(user: &str) -> SessionData {
    let mut data = SessionData::default();
    data.set("user", user);
    data
}

fn row_at(sid: &str, data: &str, expires_ms: i64) -> SessionRow {
    SessionRow {
        id: format!("row-{}", sid),
        sid: sid.to_string(),
        data: data.to_string(),
        expires_at: Utc.timestamp_millis_opt(expires_ms).unwrap(),
    }
}

fn expires_ms(backend: &MemoryBackend, sid: &str) -> i64 {
    backend.row(MODEL, sid).unwrap().expires_at.timestamp_millis()
}

/// Store on a manual clock starting at t=0 with a one minute TTL
fn clocked(config: StoreConfig) -> (MemoryBackend, Arc<ManualClock>, PersistentStore<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let clock = Arc::new(ManualClock::at_millis(0));
    let config = config
        .with_ttl(Duration::from_millis(60_000))
        .with_rounding(Rounding::Thousand)
        .with_clock(clock.clone());
    let store = PersistentStore::new(backend.clone(), config);
    (backend, clock, store)
}

#[tokio::test]
async fn test_set_then_get_returns_same_data() {
    let backend = MemoryBackend::new();
    let store = PersistentStore::new(backend, StoreConfig::default());

    let mut data = session("alice");
    data.set("cart", vec![1, 2, 3]);
    store.set("sid-1", &data).await.unwrap();

    let retrieved = store.get("sid-1").await.unwrap().unwrap();
    assert_eq!(retrieved, data);
    assert_eq!(retrieved.get::<Vec<i32>>("cart"), Some(vec![1, 2, 3]));
    assert_eq!(store.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_expiration_scenario() {
    let (backend, clock, store) = clocked(StoreConfig::new());

    store.set("abc", &session("alice")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 60_000);

    clock.set_millis(59_999);
    let found = store.get("abc").await.unwrap().unwrap();
    assert_eq!(found.get::<String>("user"), Some("alice".to_string()));

    clock.set_millis(60_001);
    assert!(store.get("abc").await.unwrap().is_none());
    // Expired rows stay until pruned
    assert!(backend.row(MODEL, "abc").is_some());
    assert_eq!(store.length().await.unwrap(), 1);

    assert_eq!(store.prune().await.unwrap(), 1);
    assert!(backend.row(MODEL, "abc").is_none());
}

#[tokio::test]
async fn test_prune_removes_only_expired_rows() {
    let (backend, clock, store) = clocked(StoreConfig::new());
    backend.insert_row(MODEL, row_at("gone", "{}", 1_000));
    backend.insert_row(MODEL, row_at("edge", "{}", 5_000));
    backend.insert_row(MODEL, row_at("alive", "{}", 9_000));
    clock.set_millis(5_000);

    assert_eq!(store.prune().await.unwrap(), 2);
    assert_eq!(store.prune().await.unwrap(), 0);
    assert_eq!(store.ids().await.unwrap(), vec!["alive".to_string()]);
}

#[tokio::test]
async fn test_destroy() {
    let store = PersistentStore::new(MemoryBackend::new(), StoreConfig::default());
    store.set("a", &session("alice")).await.unwrap();
    store.set("b", &session("bob")).await.unwrap();
    store.set("c", &session("carol")).await.unwrap();

    store.destroy("missing").await.unwrap();
    store.destroy("a").await.unwrap();
    assert!(store.get("a").await.unwrap().is_none());

    store
        .destroy_many(&["b".to_string(), "nope".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(store.length().await.unwrap(), 0);
}

#[tokio::test]
async fn test_all_ids_length_clear() {
    let (backend, clock, store) = clocked(StoreConfig::new());
    store.set("a", &session("alice")).await.unwrap();
    store.set("b", &session("bob")).await.unwrap();
    backend.insert_row(MODEL, row_at("stale", r#"{"user":"old"}"#, 1_000));
    backend.insert_row(MODEL, row_at("broken", "not json", 90_000));
    clock.set_millis(2_000);

    let all = store.all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["a"].get::<String>("user"), Some("alice".to_string()));
    assert_eq!(all["b"].get::<String>("user"), Some("bob".to_string()));

    let mut ids = store.ids().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "broken", "stale"]);
    assert_eq!(store.length().await.unwrap(), 4);

    store.clear().await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);
    assert!(store.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_reads_as_absent() {
    let capture = Arc::new(CapturingLogger::default());
    let backend = MemoryBackend::new();
    let far = Utc::now().timestamp_millis() + 3_600_000;
    backend.insert_row(MODEL, row_at("bad", "not json", far));
    backend.insert_row(MODEL, row_at("scalar", "42", far));
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::new().with_shared_logger(capture.clone()),
    );

    assert!(store.get("bad").await.unwrap().is_none());
    assert!(store.get("scalar").await.unwrap().is_none());
    store.touch("bad", &session("alice")).await.unwrap();
    assert_eq!(backend.row(MODEL, "bad").unwrap().data, "not json");
    assert_eq!(capture.messages(LogLevel::Error).len(), 3);
}

#[tokio::test]
async fn test_backend_errors_surface() {
    let backend = MemoryBackend::new();
    let store = PersistentStore::new(backend.clone(), StoreConfig::default());
    store.check_connection().await.unwrap();

    backend.fail_next(BackendError::query("deadlock detected"));
    let err = store.get("a").await.unwrap_err();
    assert!(matches!(err, SessionError::BackendOperationFailed(_)));

    backend.fail_next(BackendError::query("deadlock detected"));
    assert!(store.set("a", &session("alice")).await.is_err());

    // Genuine failures do not disable the store
    assert_eq!(store.connection_state(), ConnectionState::Connected);
    store.set("a", &session("alice")).await.unwrap();
}

#[tokio::test]
async fn test_disabled_store_is_empty_and_silent() {
    let capture = Arc::new(CapturingLogger::default());
    let backend = MemoryBackend::with_models(["sessions"]);
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::new().with_shared_logger(capture.clone()),
    );

    assert!(store.get("a").await.unwrap().is_none());
    store.set("a", &session("alice")).await.unwrap();
    store.touch("a", &session("alice")).await.unwrap();
    store.destroy("a").await.unwrap();
    assert!(store.all().await.unwrap().is_empty());
    assert!(store.ids().await.unwrap().is_empty());
    assert_eq!(store.length().await.unwrap(), 0);
    store.clear().await.unwrap();
    assert_eq!(store.prune().await.unwrap(), 0);
    assert!(matches!(
        store.check_connection().await,
        Err(SessionError::ConnectionUnavailable)
    ));

    // Only the probe reached the backend
    assert_eq!(backend.calls(), 1);
    assert_eq!(store.connection_state(), ConnectionState::Disabled);
    assert_eq!(capture.messages(LogLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_touch_refreshes_expiration_only() {
    let (backend, clock, store) = clocked(StoreConfig::new());
    store.set("abc", &session("alice")).await.unwrap();

    clock.set_millis(30_000);
    let now = Utc.timestamp_millis_opt(30_000).unwrap();
    let mut caller = session("mallory");
    caller.cookie = SessionCookie::new(60_000, now);
    store.touch("abc", &caller).await.unwrap();

    assert_eq!(expires_ms(&backend, "abc"), 90_000);
    let stored = store.get("abc").await.unwrap().unwrap();
    assert_eq!(stored.get::<String>("user"), Some("alice".to_string()));
    assert_eq!(stored.cookie, caller.cookie);
}

/// Deletes each row right after it is read, like a logout racing a touch
struct DestroyAfterRead(MemoryBackend);

#[async_trait]
impl SessionBackend for DestroyAfterRead {
    async fn find_unique(&self, model: &str, sid: &str) -> Result<Option<SessionRow>, BackendError> {
        let row = self.0.find_unique(model, sid).await?;
        self.0
            .delete_many(model, RowFilter::Sid(sid.to_string()))
            .await?;
        Ok(row)
    }

    async fn find_many(&self, model: &str) -> Result<Vec<SessionRow>, BackendError> {
        self.0.find_many(model).await
    }

    async fn upsert(&self, model: &str, row: SessionRow) -> Result<(), BackendError> {
        self.0.upsert(model, row).await
    }

    async fn update(&self, model: &str, row: SessionRow) -> Result<bool, BackendError> {
        self.0.update(model, row).await
    }

    async fn delete_many(&self, model: &str, filter: RowFilter) -> Result<u64, BackendError> {
        self.0.delete_many(model, filter).await
    }

    async fn count(&self, model: &str, filter: RowFilter) -> Result<u64, BackendError> {
        self.0.count(model, filter).await
    }
}

#[tokio::test]
async fn test_touch_does_not_revive_destroyed_row() {
    let backend = MemoryBackend::new();
    let far = Utc::now().timestamp_millis() + 3_600_000;
    backend.insert_row(MODEL, row_at("abc", r#"{"user":"alice"}"#, far));
    let store = PersistentStore::new(DestroyAfterRead(backend.clone()), StoreConfig::default());

    store.touch("abc", &session("alice")).await.unwrap();
    assert!(backend.row(MODEL, "abc").is_none());
}

#[tokio::test]
async fn test_huge_ttl_does_not_panic_or_expire() {
    let store = PersistentStore::new(
        MemoryBackend::new(),
        StoreConfig::new()
            .with_ttl(Duration::from_secs(10_000_000_000_000))
            .with_rounding(Rounding::Thousand),
    );
    store.set("abc", &session("alice")).await.unwrap();
    assert!(store.get("abc").await.unwrap().is_some());
    store.touch("abc", &session("alice")).await.unwrap();
    assert!(store.get("abc").await.unwrap().is_some());
}

#[tokio::test]
async fn test_max_ttl_never_expires() {
    let backend = MemoryBackend::new();
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::new().with_ttl(Duration::MAX),
    );
    store.set("abc", &session("alice")).await.unwrap();

    assert_eq!(
        expires_ms(&backend, "abc"),
        DateTime::<Utc>::MAX_UTC.timestamp_millis()
    );
    assert!(store.get("abc").await.unwrap().is_some());
    assert_eq!(store.prune().await.unwrap(), 0);
}

#[tokio::test]
async fn test_touch_missing_or_expired_is_noop() {
    let (backend, clock, store) = clocked(StoreConfig::new());
    store.touch("ghost", &session("alice")).await.unwrap();
    assert!(backend.row(MODEL, "ghost").is_none());

    store.set("abc", &session("alice")).await.unwrap();
    clock.set_millis(70_000);
    store.touch("abc", &session("alice")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 60_000);
}

#[tokio::test]
async fn test_replace_and_merge_modes() {
    let mut first = session("alice");
    first.set("theme", "dark");
    let mut update = SessionData::default();
    update.set("theme", "light");

    let replace = PersistentStore::new(MemoryBackend::new(), StoreConfig::default());
    replace.set("a", &first).await.unwrap();
    replace.set("a", &update).await.unwrap();
    let stored = replace.get("a").await.unwrap().unwrap();
    assert!(!stored.contains("user"));

    let merge = PersistentStore::new(
        MemoryBackend::new(),
        StoreConfig::new().with_set_mode(SetMode::Merge),
    );
    merge.set("a", &first).await.unwrap();
    merge.set("a", &update).await.unwrap();
    let stored = merge.get("a").await.unwrap().unwrap();
    assert_eq!(stored.get::<String>("user"), Some("alice".to_string()));
    assert_eq!(stored.get::<String>("theme"), Some("light".to_string()));
}

#[tokio::test]
async fn test_rolling_controls_set_expiration() {
    let (backend, clock, store) = clocked(StoreConfig::new());
    store.set("abc", &session("alice")).await.unwrap();
    clock.set_millis(30_000);
    store.set("abc", &session("alice")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 90_000);

    let (backend, clock, store) = clocked(StoreConfig::new().with_rolling(false));
    store.set("abc", &session("alice")).await.unwrap();
    clock.set_millis(30_000);
    store.set("abc", &session("bob")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 60_000);
    let stored = store.get("abc").await.unwrap().unwrap();
    assert_eq!(stored.get::<String>("user"), Some("bob".to_string()));

    // Once expired, the next set starts a fresh lifetime
    clock.set_millis(61_000);
    store.set("abc", &session("bob")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 121_000);
}

#[tokio::test]
async fn test_ttl_from_cookie_then_one_day() {
    let backend = MemoryBackend::new();
    let clock = Arc::new(ManualClock::at_millis(1_000));
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::new().with_clock(clock.clone()),
    );

    let mut data = session("alice");
    data.cookie = SessionCookie::new(5_000, Utc.timestamp_millis_opt(1_000).unwrap());
    store.set("cookie", &data).await.unwrap();
    assert_eq!(expires_ms(&backend, "cookie"), 6_000);

    store.set("default", &session("bob")).await.unwrap();
    assert_eq!(expires_ms(&backend, "default"), 1_000 + 86_400_000);
}

#[tokio::test]
async fn test_record_id_strategies() {
    let random = PersistentStore::new(MemoryBackend::new(), StoreConfig::default());
    random.set("abc", &session("alice")).await.unwrap();
    let id = random.backend().row(MODEL, "abc").unwrap().id;
    assert_ne!(id, "abc");
    // Updates keep the primary key
    random.set("abc", &session("bob")).await.unwrap();
    assert_eq!(random.backend().row(MODEL, "abc").unwrap().id, id);

    let raw = PersistentStore::new(
        MemoryBackend::new(),
        StoreConfig::new().with_session_id_as_record_id(),
    );
    raw.set("abc", &session("alice")).await.unwrap();
    assert_eq!(raw.backend().row(MODEL, "abc").unwrap().id, "abc");

    let derived = PersistentStore::new(
        MemoryBackend::new(),
        StoreConfig::new().with_record_id(RecordIdStrategy::derived(|sid| format!("s_{}", sid))),
    );
    derived.set("abc", &session("alice")).await.unwrap();
    assert_eq!(derived.backend().row(MODEL, "abc").unwrap().id, "s_abc");
}

#[tokio::test]
async fn test_in_flight_set_skips_overlapping_writes() {
    let (backend, clock, store) = clocked(StoreConfig::new());
    store.set("abc", &session("alice")).await.unwrap();
    clock.set_millis(30_000);

    let marker = store.inner.in_flight.begin(Operation::Set, "abc", false);
    store.touch("abc", &session("alice")).await.unwrap();
    store.set("abc", &session("bob")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 60_000);
    drop(marker);

    store.touch("abc", &session("alice")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 90_000);
    let stored = store.get("abc").await.unwrap().unwrap();
    assert_eq!(stored.get::<String>("user"), Some("alice".to_string()));
}

#[tokio::test]
async fn test_concurrent_flags_allow_overlap() {
    let (backend, clock, store) = clocked(
        StoreConfig::new()
            .with_concurrent_set(true)
            .with_concurrent_touch(true),
    );
    store.set("abc", &session("alice")).await.unwrap();
    clock.set_millis(30_000);

    let _set = store.inner.in_flight.begin(Operation::Set, "abc", false);
    let _touch = store.inner.in_flight.begin(Operation::Touch, "abc", false);
    store.touch("abc", &session("alice")).await.unwrap();
    assert_eq!(expires_ms(&backend, "abc"), 90_000);
    store.set("abc", &session("bob")).await.unwrap();
    let stored = store.get("abc").await.unwrap().unwrap();
    assert_eq!(stored.get::<String>("user"), Some("bob".to_string()));
}

#[tokio::test]
async fn test_connect_probes_and_starts_pruning() {
    let backend = MemoryBackend::new();
    let store = PersistentStore::connect(
        backend.clone(),
        StoreConfig::new().with_check_period(Duration::from_secs(60)),
    )
    .await;
    assert_eq!(store.connection_state(), ConnectionState::Connected);
    assert!(store.is_pruning());
    assert_eq!(backend.calls(), 1);

    store.shutdown().await.unwrap();
    assert!(!store.is_pruning());
    assert!(backend.is_disconnected());
    assert!(store.get("a").await.unwrap().is_none());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_connect_to_bad_backend_stays_disabled() {
    let backend = MemoryBackend::new();
    backend.set_unreachable(true);
    let store = PersistentStore::connect(
        backend.clone(),
        StoreConfig::new().with_check_period(Duration::from_secs(60)),
    )
    .await;

    assert_eq!(store.connection_state(), ConnectionState::Disabled);
    assert!(!store.is_pruning());

    backend.set_unreachable(false);
    assert!(store.get("a").await.unwrap().is_none());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_callback_convention() {
    let store = PersistentStore::new(MemoryBackend::new(), StoreConfig::default());
    store.set("abc", &session("alice")).await.unwrap();

    let mut seen = None;
    let result = with_callback(
        store.get("abc"),
        Some(|r: &Result<Option<SessionData>, SessionError>| {
            seen = r.as_ref().ok().cloned().flatten();
        }),
    )
    .await
    .unwrap();
    assert_eq!(seen, result);
}

#[tokio::test]
async fn test_usable_as_trait_object() {
    let store: Arc<dyn SessionStore> =
        Arc::new(PersistentStore::new(MemoryBackend::new(), StoreConfig::default()));
    store.set("abc", &session("alice")).await.unwrap();
    assert_eq!(store.length().await.unwrap(), 1);
    assert_eq!(store.all().await.unwrap().len(), 1);
    store.destroy_many(&["abc".to_string()]).await.unwrap();
    assert!(store.get("abc").await.unwrap().is_none());
}
