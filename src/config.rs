//! Store configuration

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::expiration::{Clock, Rounding, SystemClock};
use crate::logger::{LogLevel, SessionLogger, TracingLogger};
use crate::record::RecordIdStrategy;
use crate::serializer::{JsonSerializer, Serializer};

/// Default sessions model (table) name
pub const DEFAULT_MODEL_NAME: &str = "session";

/// Default period between scheduled prunes
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(2 * 60);

/// TTL used when neither the config nor the session cookie provides one
pub const ONE_DAY: Duration = Duration::from_secs(86_400);

/// How `set` combines the incoming payload with what is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// The incoming payload replaces the stored one
    #[default]
    Replace,
    /// Incoming fields are overlaid on the stored payload
    Merge,
}

/// Configuration for [`PersistentStore`](crate::store::PersistentStore)
#[derive(Clone)]
pub struct StoreConfig {
    /// Sessions model (table) name (default: "session")
    pub model_name: String,

    /// Fixed session TTL. When None, the TTL comes from the session cookie,
    /// falling back to one day.
    pub ttl: Option<Duration>,

    /// Pruning period. When set, `connect` starts the pruning interval.
    pub check_period: Option<Duration>,

    /// Floor expirations to this granularity
    pub rounding: Option<Rounding>,

    /// How new rows get their primary key (default: random)
    pub record_id: RecordIdStrategy,

    /// Replace or merge on `set` (default: replace)
    pub set_mode: SetMode,

    /// Whether `set` refreshes the expiration of an unexpired record (default: true)
    pub rolling: bool,

    /// Allow overlapping `set` calls for the same session id (default: false)
    pub concurrent_set: bool,

    /// Allow overlapping `touch` calls for the same session id (default: false)
    pub concurrent_touch: bool,

    pub logger: Arc<dyn SessionLogger>,

    /// Levels forwarded to the logger (default: all)
    pub log_levels: Vec<LogLevel>,

    pub serializer: Arc<dyn Serializer>,

    pub clock: Arc<dyn Clock>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            ttl: None,
            check_period: None,
            rounding: None,
            record_id: RecordIdStrategy::default(),
            set_mode: SetMode::default(),
            rolling: true,
            concurrent_set: false,
            concurrent_touch: false,
            logger: Arc::new(TracingLogger),
            log_levels: LogLevel::ALL.to_vec(),
            serializer: Arc::new(JsonSerializer),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("model_name", &self.model_name)
            .field("ttl", &self.ttl)
            .field("check_period", &self.check_period)
            .field("rounding", &self.rounding)
            .field("record_id", &self.record_id)
            .field("set_mode", &self.set_mode)
            .field("rolling", &self.rolling)
            .field("concurrent_set", &self.concurrent_set)
            .field("concurrent_touch", &self.concurrent_touch)
            .field("log_levels", &self.log_levels)
            .finish_non_exhaustive()
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sessions model name (default: "session")
    pub fn with_model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Prune every `period`, starting when the store connects
    pub fn with_check_period(mut self, period: Duration) -> Self {
        self.check_period = Some(period);
        self
    }

    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = Some(rounding);
        self
    }

    pub fn with_record_id(mut self, strategy: RecordIdStrategy) -> Self {
        self.record_id = strategy;
        self
    }

    /// Use the session id as the row primary key
    pub fn with_session_id_as_record_id(self) -> Self {
        self.with_record_id(RecordIdStrategy::SessionId)
    }

    pub fn with_set_mode(mut self, mode: SetMode) -> Self {
        self.set_mode = mode;
        self
    }

    pub fn with_rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    pub fn with_concurrent_set(mut self, enabled: bool) -> Self {
        self.concurrent_set = enabled;
        self
    }

    pub fn with_concurrent_touch(mut self, enabled: bool) -> Self {
        self.concurrent_touch = enabled;
        self
    }

    pub fn with_logger<L: SessionLogger>(mut self, logger: L) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn with_shared_logger(mut self, logger: Arc<dyn SessionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_log_levels(mut self, levels: &[LogLevel]) -> Self {
        self.log_levels = levels.to_vec();
        self
    }

    pub fn with_serializer<S: Serializer>(mut self, serializer: S) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Period used by `start_interval`
    pub fn check_period_or_default(&self) -> Duration {
        self.check_period.unwrap_or(DEFAULT_CHECK_PERIOD)
    }
}
