//! Session payload compatible with express-session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Cookie metadata stored alongside the session fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    /// Original max age in milliseconds (as set initially)
    pub original_max_age: Option<i64>,

    /// Expiration time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,

    #[serde(default)]
    pub secure: bool,

    #[serde(default = "default_http_only")]
    pub http_only: bool,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_http_only() -> bool {
    true
}

fn default_path() -> String {
    "/".to_string()
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            original_max_age: None,
            expires: None,
            secure: false,
            http_only: true,
            path: "/".to_string(),
            domain: None,
            same_site: None,
        }
    }
}

impl SessionCookie {
    /// Create a cookie expiring `max_age_ms` milliseconds from `now`
    pub fn new(max_age_ms: i64, now: DateTime<Utc>) -> Self {
        Self {
            original_max_age: Some(max_age_ms),
            expires: Some(now + chrono::Duration::milliseconds(max_age_ms)),
            ..Default::default()
        }
    }

    /// Remaining lifetime in milliseconds relative to `now`
    ///
    /// Falls back to the original max age when no expiry is recorded.
    pub fn max_age(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.expires {
            Some(exp) => Some((exp - now).num_milliseconds()),
            None => self.original_max_age,
        }
    }
}

/// Session payload: cookie metadata plus arbitrary JSON fields
///
/// Fields are flattened next to `cookie`, matching the connect-store layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub cookie: SessionCookie,

    #[serde(flatten)]
    pub data: HashMap<String, Value>,
}

impl SessionData {
    pub fn new(cookie: SessionCookie) -> Self {
        Self {
            cookie,
            data: HashMap::new(),
        }
    }

    /// Get a value from session data
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in session data
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.to_string(), v);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Check if session data is empty (no user data)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overlay `update` on top of this payload
    ///
    /// Fields present in `update` win; the cookie is taken from `update`.
    pub fn merge(&mut self, update: &SessionData) {
        self.cookie = update.cookie.clone();
        for (key, value) in &update.data {
            self.data.insert(key.clone(), value.clone());
        }
    }
}
