//! Expiration timestamps

use chrono::{DateTime, TimeZone, Utc};

/// Granularity that expiration timestamps are floored to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// 10 milliseconds
    Ten,
    /// 100 milliseconds
    Hundred,
    /// 1 second
    Thousand,
}

impl Rounding {
    /// Granularity in milliseconds
    pub fn as_millis(self) -> i64 {
        match self {
            Rounding::Ten => 10,
            Rounding::Hundred => 100,
            Rounding::Thousand => 1000,
        }
    }

    /// Parse a granularity given in milliseconds
    pub fn from_millis(ms: i64) -> Option<Self> {
        match ms {
            10 => Some(Rounding::Ten),
            100 => Some(Rounding::Hundred),
            1000 => Some(Rounding::Thousand),
            _ => None,
        }
    }
}

/// Source of the current time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Compute `now + ttl_ms`, floored to `rounding` when given.
///
/// A negative TTL yields a timestamp in the past, so the record reads as
/// already expired. Results are clamped to the representable range.
pub fn compute_expiration(
    now: DateTime<Utc>,
    ttl_ms: i64,
    rounding: Option<Rounding>,
) -> DateTime<Utc> {
    let mut millis = now.timestamp_millis().saturating_add(ttl_ms).clamp(
        DateTime::<Utc>::MIN_UTC.timestamp_millis(),
        DateTime::<Utc>::MAX_UTC.timestamp_millis(),
    );
    if let Some(r) = rounding {
        let step = r.as_millis();
        millis = millis.div_euclid(step) * step;
    }
    match Utc.timestamp_millis_opt(millis).single() {
        Some(expires_at) => expires_at,
        // Flooring the minimum can step below it
        None if ttl_ms < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}
