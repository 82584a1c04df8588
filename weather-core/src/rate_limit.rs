use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tracing::debug;

/// Source of "now" for window arithmetic.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitConfigError {
    #[error("max_requests must be at least 1")]
    ZeroMaxRequests,
    #[error("window_ms must be greater than 0")]
    ZeroWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_ms: u64) -> Result<Self, RateLimitConfigError> {
        let cfg = Self {
            max_requests,
            window_ms,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RateLimitConfigError> {
        if self.max_requests == 0 {
            return Err(RateLimitConfigError::ZeroMaxRequests);
        }
        if self.window_ms == 0 {
            return Err(RateLimitConfigError::ZeroWindow);
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_ms: 60_000,
        }
    }
}

/// Snapshot of a key's budget. Computing it never touches the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    /// Whether the next `admit` would succeed.
    pub allowed: bool,
    pub remaining: u32,
    pub ms_until_reset: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    window_start: DateTime<Utc>,
    count: u32,
}

impl RateLimitRecord {
    fn open(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 1,
        }
    }

    fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        // A clock stepping backwards counts as no time elapsed.
        (now - self.window_start).num_milliseconds().max(0) as u64
    }

    fn is_expired(&self, now: DateTime<Utc>, config: &RateLimitConfig) -> bool {
        self.elapsed_ms(now) >= config.window_ms
    }
}

/// Fixed-window counter per key. A window opens on the first admitted call
/// and a fresh one opens once `window_ms` has elapsed.
#[derive(Debug)]
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        // The map holds plain counters, so state behind a poisoned lock is still usable.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to consume one slot for `key`. Returns `false` when the window is full.
    pub fn admit(&self, key: &str, config: &RateLimitConfig) -> bool {
        self.try_admit(key, config).is_ok()
    }

    /// Like [`RateLimiter::admit`], but a denial carries the key's status taken
    /// under the same lock.
    pub fn try_admit(&self, key: &str, config: &RateLimitConfig) -> Result<(), RateLimitStatus> {
        let now = self.clock.now();
        let mut records = self.records();

        match records.get_mut(key) {
            Some(record) if !record.is_expired(now, config) => {
                if record.count < config.max_requests {
                    record.count += 1;
                    Ok(())
                } else {
                    debug!(key, count = record.count, "rate limit window exhausted");
                    Err(RateLimitStatus {
                        allowed: false,
                        remaining: 0,
                        ms_until_reset: config.window_ms - record.elapsed_ms(now),
                    })
                }
            }
            _ => {
                records.insert(key.to_string(), RateLimitRecord::open(now));
                Ok(())
            }
        }
    }

    pub fn status(&self, key: &str, config: &RateLimitConfig) -> RateLimitStatus {
        let now = self.clock.now();
        let records = self.records();

        match records.get(key) {
            Some(record) if !record.is_expired(now, config) => {
                let remaining = config.max_requests.saturating_sub(record.count);
                RateLimitStatus {
                    allowed: remaining > 0,
                    remaining,
                    ms_until_reset: config.window_ms - record.elapsed_ms(now),
                }
            }
            _ => RateLimitStatus {
                allowed: true,
                remaining: config.max_requests,
                ms_until_reset: 0,
            },
        }
    }

    pub fn clear(&self, key: &str) {
        self.records().remove(key);
    }

    pub fn clear_all(&self) {
        self.records().clear();
    }

    /// Drop every record whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self, config: &RateLimitConfig) -> usize {
        let now = self.clock.now();
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now, config));
        before - records.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.records().len()
    }
}
