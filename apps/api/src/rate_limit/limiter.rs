//! Fixed-window rate limiter — one counter per client identity.
//!
//! A window starts with the first request a client makes and is replaced by
//! whichever request first arrives after it has expired. There is no
//! alignment to a clock grid and no sliding behaviour: the decision for any
//! request depends only on `(count, window_start)` for that client.
//!
//! Each endpoint owns its own `RateLimiter`; instances never share counts.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject,
}

impl Decision {
    pub fn is_admitted(self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Per-client bookkeeping for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindowState {
    pub count: u32,
    /// Milliseconds on the limiter's clock.
    pub window_start: u64,
}

/// Static configuration of one limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_per_window: u32,
}

impl RateLimitConfig {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            window,
            max_per_window,
        }
    }

    fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Cloneable handle; all clones see the same counters.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    name: &'static str,
    config: RateLimitConfig,
    clients: DashMap<String, ClientWindowState>,
    epoch: Instant,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                config,
                clients: DashMap::new(),
                epoch: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.inner.config
    }

    /// Milliseconds elapsed on this limiter's monotonic clock.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.inner.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Checks and records a request from `client_id` at the current time.
    pub fn check(&self, client_id: &str) -> Decision {
        self.check_and_record(client_id, self.now_ms())
    }

    /// Decides whether a request from `client_id` at `now` is admitted and
    /// records it either way.
    ///
    /// The entry's shard lock is held for the whole read-decide-write, so
    /// concurrent callers for the same client are serialized.
    pub fn check_and_record(&self, client_id: &str, now: u64) -> Decision {
        let config = &self.inner.config;

        let mut state = match self.inner.clients.entry(client_id.to_string()) {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => {
                vacant.insert(ClientWindowState {
                    count: 1,
                    window_start: now,
                });
                return Decision::Admit;
            }
        };

        // Strict `>`: a request landing exactly on the boundary still belongs
        // to the old window.
        if now.saturating_sub(state.window_start) > config.window_ms() {
            state.count = 1;
            state.window_start = now;
            return Decision::Admit;
        }

        state.count = state.count.saturating_add(1);
        if state.count > config.max_per_window {
            debug!(
                limiter = self.inner.name,
                client = client_id,
                count = state.count,
                "rate limit exceeded"
            );
            Decision::Reject
        } else {
            Decision::Admit
        }
    }

    /// Current state for `client_id`, if any.
    #[cfg(test)]
    pub fn snapshot(&self, client_id: &str) -> Option<ClientWindowState> {
        self.inner.clients.get(client_id).map(|s| *s)
    }

    #[cfg(test)]
    pub fn tracked_clients(&self) -> usize {
        self.inner.clients.len()
    }

    /// Removes every entry whose window has expired as of `now`.
    ///
    /// An expired entry is reset by the next request exactly as a missing
    /// one would be created, so sweeping never changes a decision.
    pub fn sweep(&self, now: u64) -> usize {
        let window_ms = self.inner.config.window_ms();
        let before = self.inner.clients.len();
        self.inner
            .clients
            .retain(|_, state| now.saturating_sub(state.window_start) <= window_ms);
        let removed = before.saturating_sub(self.inner.clients.len());
        if removed > 0 {
            debug!(
                limiter = self.inner.name,
                removed,
                remaining = self.inner.clients.len(),
                "rate limiter sweep completed"
            );
        }
        removed
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }
}

/// Spawns a background task that sweeps `limiter` once per window.
///
/// The task holds only a weak reference and exits on its own once every
/// handle to the limiter is gone; callers may also abort it at shutdown.
pub fn spawn_sweeper(limiter: &RateLimiter) -> JoinHandle<()> {
    let weak = limiter.downgrade();
    let period = limiter.config().window.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let limiter = RateLimiter::from_inner(inner);
            limiter.sweep(limiter.now_ms());
        }
    })
}
