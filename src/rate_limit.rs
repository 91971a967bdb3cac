//! Multi-window rate limiting keyed by identity and endpoint category.
//!
//! Each endpoint category carries a fixed set of windows (for example
//! 20/hour, 3/minute and 1/2 seconds for login). A request increments the
//! counter of every window for its `(category, identity)` pair and is
//! denied when any counter goes over its maximum.
//!
//! Counters live behind the [`CounterStore`] trait. [`InMemoryCounterStore`]
//! keeps them in a `DashMap`; each increment runs under the shard lock of
//! its key so concurrent requests never read a stale count.

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Windows and categories
// ============================================================================

/// One fixed window: at most `max_requests` per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Window length.
    pub period: Duration,
    /// Requests allowed per window.
    pub max_requests: u32,
}

impl Window {
    /// `max_requests` per hour.
    #[must_use]
    pub const fn per_hour(max_requests: u32) -> Self {
        Self::per_seconds(3600, max_requests)
    }

    /// `max_requests` per minute.
    #[must_use]
    pub const fn per_minute(max_requests: u32) -> Self {
        Self::per_seconds(60, max_requests)
    }

    /// `max_requests` per `seconds`.
    #[must_use]
    pub const fn per_seconds(seconds: u64, max_requests: u32) -> Self {
        Self {
            period: Duration::from_secs(seconds),
            max_requests,
        }
    }
}

const LOGIN_WINDOWS: [Window; 3] = [
    Window::per_hour(20),
    Window::per_minute(3),
    Window::per_seconds(2, 1),
];
const AUTH_WINDOWS: [Window; 3] = [
    Window::per_hour(50),
    Window::per_minute(5),
    Window::per_seconds(1, 1),
];
const UPLOAD_WINDOWS: [Window; 3] = [
    Window::per_hour(200),
    Window::per_minute(20),
    Window::per_seconds(1, 2),
];
const EXPORT_WINDOWS: [Window; 3] = [
    Window::per_hour(100),
    Window::per_minute(10),
    Window::per_seconds(1, 1),
];
const QUERY_WINDOWS: [Window; 3] = [
    Window::per_hour(2000),
    Window::per_minute(200),
    Window::per_seconds(1, 20),
];
const ADMIN_WINDOWS: [Window; 3] = [
    Window::per_hour(500),
    Window::per_minute(50),
    Window::per_seconds(1, 5),
];
const DEFAULT_WINDOWS: [Window; 3] = [
    Window::per_hour(1000),
    Window::per_minute(100),
    Window::per_seconds(1, 10),
];

/// Endpoint category, bound to a route group when the router is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// Password login.
    Login,
    /// Session endpoints (logout, profile).
    Auth,
    /// File uploads.
    Upload,
    /// Bulk exports.
    Export,
    /// List and search queries.
    Query,
    /// Administrative writes.
    Admin,
    /// Everything else.
    Default,
}

impl EndpointCategory {
    /// Windows enforced for this category.
    #[must_use]
    pub const fn windows(self) -> &'static [Window] {
        match self {
            Self::Login => &LOGIN_WINDOWS,
            Self::Auth => &AUTH_WINDOWS,
            Self::Upload => &UPLOAD_WINDOWS,
            Self::Export => &EXPORT_WINDOWS,
            Self::Query => &QUERY_WINDOWS,
            Self::Admin => &ADMIN_WINDOWS,
            Self::Default => &DEFAULT_WINDOWS,
        }
    }

    /// Name used in counter keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Auth => "auth",
            Self::Upload => "upload",
            Self::Export => "export",
            Self::Query => "query",
            Self::Admin => "admin",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Authenticated user id.
    User(i64),
    /// Client address for anonymous requests.
    Address(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{}", id),
            Identity::Address(addr) => write!(f, "ip:{}", addr),
        }
    }
}

fn counter_key(category: EndpointCategory, identity: &Identity, window: &Window) -> String {
    format!(
        "rl:{}:{}:{}",
        category,
        identity,
        window.period.as_secs()
    )
}

// ============================================================================
// Counter store
// ============================================================================

/// Counter state after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests counted in the current window, including this one.
    pub count: u32,
    /// Unix time in milliseconds at which the window resets.
    pub resets_at_ms: u64,
}

/// Counter store errors.
#[derive(Debug, Error)]
pub enum CounterStoreError {
    /// The backing store cannot be reached.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for fixed-window counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter for `key` and returns its new state.
    ///
    /// A counter whose window has elapsed restarts at one with a fresh window
    /// of `period` starting at `now_ms`.
    async fn increment(
        &self,
        key: &str,
        period: Duration,
        now_ms: u64,
    ) -> Result<WindowCount, CounterStoreError>;

    /// Removes counters whose window ended before `now_ms`.
    async fn purge_expired(&self, now_ms: u64) -> Result<usize, CounterStoreError>;
}

/// Process-local counter store.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, WindowCount>,
}

impl InMemoryCounterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked counters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no counters are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        period: Duration,
        now_ms: u64,
    ) -> Result<WindowCount, CounterStoreError> {
        let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCount {
                count: 0,
                resets_at_ms: now_ms.saturating_add(period_ms),
            });

        if now_ms >= entry.resets_at_ms {
            entry.count = 0;
            entry.resets_at_ms = now_ms.saturating_add(period_ms);
        }
        entry.count = entry.count.saturating_add(1);

        Ok(*entry)
    }

    async fn purge_expired(&self, now_ms: u64) -> Result<usize, CounterStoreError> {
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.resets_at_ms > now_ms);
        Ok(before.saturating_sub(self.counters.len()))
    }
}

// ============================================================================
// Rate limiter
// ============================================================================

/// Quota reported in `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Window maximum.
    pub limit: u32,
    /// Requests left in the window.
    pub remaining: u32,
    /// Unix time in seconds at which the window resets.
    pub reset: u64,
    /// Seconds until the window resets, at least one.
    pub retry_after: u64,
}

impl Quota {
    fn new(window: &Window, count: WindowCount, now_ms: u64) -> Self {
        let until_reset_ms = count.resets_at_ms.saturating_sub(now_ms);
        Self {
            limit: window.max_requests,
            remaining: window.max_requests.saturating_sub(count.count),
            reset: count.resets_at_ms.div_ceil(1000),
            retry_after: until_reset_ms.div_ceil(1000).max(1),
        }
    }
}

/// Multi-window rate limiter.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    enabled: bool,
    swallow_errors: bool,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.enabled)
            .field("swallow_errors", &self.swallow_errors)
            .finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl RateLimiter {
    /// Creates a limiter over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            enabled: config.enabled,
            swallow_errors: config.swallow_errors,
        }
    }

    /// Creates a limiter over a fresh [`InMemoryCounterStore`].
    #[must_use]
    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()), config)
    }

    /// Whether limits are enforced.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Counts a request and decides whether it may proceed.
    ///
    /// Returns the quota of the tightest window when allowed, `None` when
    /// limiting is disabled or the counter store failed open.
    ///
    /// # Errors
    /// [`ApiError::RateLimitExceeded`] when any window is exceeded, or
    /// [`ApiError::Internal`] when the counter store fails and errors are
    /// not swallowed.
    pub async fn check(
        &self,
        identity: &Identity,
        category: EndpointCategory,
    ) -> Result<Option<Quota>, ApiError> {
        self.check_at(identity, category, now_millis()).await
    }

    /// [`check`](Self::check) at an explicit time.
    ///
    /// Windows are counted in the category's declared order, longest first.
    /// Counting stops at the first window that is exceeded: that window
    /// decides the 429 and the windows after it are not incremented, so a
    /// denied request only consumes budget up to the window that refused it.
    ///
    /// # Errors
    /// Same as [`check`](Self::check).
    pub async fn check_at(
        &self,
        identity: &Identity,
        category: EndpointCategory,
        now_ms: u64,
    ) -> Result<Option<Quota>, ApiError> {
        if !self.enabled {
            return Ok(None);
        }

        let mut tightest: Option<Quota> = None;

        for window in category.windows() {
            let key = counter_key(category, identity, window);
            let count = match self.store.increment(&key, window.period, now_ms).await {
                Ok(count) => count,
                Err(e) if self.swallow_errors => {
                    warn!(%category, %identity, error = %e, "Rate limit store failed, allowing request");
                    return Ok(None);
                }
                Err(e) => return Err(ApiError::Internal(e.to_string())),
            };

            let quota = Quota::new(window, count, now_ms);
            if count.count > window.max_requests {
                warn!(
                    %category,
                    %identity,
                    limit = quota.limit,
                    retry_after = quota.retry_after,
                    "Rate limit exceeded"
                );
                return Err(ApiError::RateLimitExceeded {
                    limit: quota.limit,
                    remaining: 0,
                    reset: quota.reset,
                    retry_after: quota.retry_after,
                });
            }
            if tightest.is_none_or(|t| {
                (quota.remaining, quota.retry_after) < (t.remaining, t.retry_after)
            }) {
                tightest = Some(quota);
            }
        }

        Ok(tightest)
    }

    /// Removes expired counters.
    pub async fn purge_expired(&self) -> usize {
        match self.store.purge_expired(now_millis()).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(error = %e, "Rate limit counter purge failed");
                0
            }
        }
    }
}

/// Spawns a background task that periodically purges expired counters.
///
/// # Arguments
///
/// * `limiter` - The limiter whose store is purged
/// * `interval` - How often to run the purge
///
/// # Returns
///
/// A join handle for the spawned task
pub fn spawn_cleanup_task(
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            let purged = limiter.purge_expired().await;
            debug!(purged, "Rate limiter periodic cleanup completed");
        }
    })
}
