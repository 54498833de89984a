//! Fixed-window throttling of enquiry submissions per identifier.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::{ConfigError, LeadConfig};

/// Counter state for a single identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max: u32,
    pub window: Duration,
}

/// Backing store for rate-limit windows. `hit` must increment-or-reset atomically per key.
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, now: DateTime<Utc>, policy: RateLimitPolicy) -> RateLimitDecision;

    /// Drop windows that have expired. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>, window: Duration) -> usize;
}

/// Single-instance store; the per-key entry lock makes concurrent hits for one email serialise.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, RateLimitWindow>,
}

impl InMemoryRateLimitStore {
    pub fn window(&self, key: &str) -> Option<RateLimitWindow> {
        self.windows.get(key).map(|entry| *entry)
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn hit(&self, key: &str, now: DateTime<Utc>, policy: RateLimitPolicy) -> RateLimitDecision {
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(RateLimitWindow {
                count: 0,
                window_start: now,
            });
        let window = entry.value_mut();

        if now >= window.window_start + policy.window {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= policy.max {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: policy.max - window.count,
        }
    }

    fn purge_expired(&self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now < state.window_start + window);
        before - self.windows.len()
    }
}

impl TryFrom<&LeadConfig> for RateLimitPolicy {
    type Error = ConfigError;

    fn try_from(config: &LeadConfig) -> Result<Self, Self::Error> {
        let window = Duration::from_std(config.rate_limit_window).map_err(|_| {
            ConfigError::InvalidValue {
                name: "LEADS_RATE_LIMIT_WINDOW_HOURS",
                value: format!("{}s", config.rate_limit_window.as_secs()),
            }
        })?;
        Ok(Self {
            max: config.rate_limit_max,
            window,
        })
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::default()), clock, policy)
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn allow(&self, identifier: &str) -> RateLimitDecision {
        let key = identifier.trim().to_lowercase();
        let decision = self.store.hit(&key, self.clock.now(), self.policy);
        if !decision.allowed {
            tracing::info!(identifier = %key, "enquiry submission throttled");
        }
        decision
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(self.clock.now(), self.policy.window)
    }
}
