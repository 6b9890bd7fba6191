use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::metrics::TRACKED_IDENTITIES;

pub const MAX_REQUESTS: u32 = 10;
pub const WINDOW_MS: u64 = 60_000;

/// Outcome of a single admission check. Produced fresh on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Milliseconds until the caller should expect a free slot.
    pub reset_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            max_requests: MAX_REQUESTS,
            window_ms: WINDOW_MS,
        }
    }
}

/// Backing storage for per-identity request timestamps.
///
/// `update` must hold an exclusive lock on the identity for the whole closure,
/// so a check and the append that follows it are observed as one step by
/// every other caller. Implementations also have to support expiry through
/// `evict_idle`, otherwise one entry per distinct identity lives forever.
pub trait WindowStore: Send + Sync {
    fn update<R>(&self, identity: &str, f: impl FnOnce(&mut VecDeque<u64>) -> R) -> R;

    /// Drop identities whose newest timestamp is `window_ms` or more behind `now_ms`.
    /// Returns how many were removed.
    fn evict_idle(&self, now_ms: u64, window_ms: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// In-process store, lost on restart
#[derive(Default)]
pub struct MemoryStore {
    windows: DashMap<String, VecDeque<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for MemoryStore {
    fn update<R>(&self, identity: &str, f: impl FnOnce(&mut VecDeque<u64>) -> R) -> R {
        // entry() keeps the shard write-locked until the guard drops
        let mut window = self.windows.entry(identity.to_string()).or_default();
        f(&mut window)
    }

    fn evict_idle(&self, now_ms: u64, window_ms: u64) -> usize {
        let mut evicted = 0;
        self.windows.retain(|_, window| {
            let active = window
                .back()
                .is_some_and(|&newest| now_ms.saturating_sub(newest) < window_ms);
            if !active {
                evicted += 1;
            }
            active
        });
        evicted
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Sliding-window limiter: at most `max_requests` admissions per identity
/// within any trailing `window_ms`.
pub struct RateLimiter<S = MemoryStore> {
    policy: WindowPolicy,
    store: S,
}

impl RateLimiter<MemoryStore> {
    pub fn in_memory(policy: WindowPolicy) -> Self {
        Self::new(policy, MemoryStore::new())
    }
}

impl<S: WindowStore> RateLimiter<S> {
    pub fn new(policy: WindowPolicy, store: S) -> Self {
        Self { policy, store }
    }

    pub fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, epoch_millis())
    }

    pub fn check_at(&self, identity: &str, now_ms: u64) -> RateLimitDecision {
        let WindowPolicy {
            max_requests,
            window_ms,
        } = self.policy;
        let in_window = move |t: &u64| now_ms.saturating_sub(*t) < window_ms;

        self.store.update(identity, |window| {
            let retained = window.iter().filter(|t| in_window(*t)).count() as u32;

            if retained >= max_requests {
                // rejected attempts never count against the window
                let oldest = window.iter().copied().find(in_window).unwrap_or(now_ms);
                return RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_ms: window_ms.saturating_sub(now_ms.saturating_sub(oldest)),
                };
            }

            window.retain(in_window);
            window.push_back(now_ms);

            RateLimitDecision {
                allowed: true,
                remaining: max_requests.saturating_sub(window.len() as u32),
                reset_ms: window_ms,
            }
        })
    }

    pub fn evict_idle(&self, now_ms: u64) -> usize {
        self.store.evict_idle(now_ms, self.policy.window_ms)
    }

    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }
}

pub fn epoch_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

// Background sweep of identities that stopped sending requests
pub async fn sweep_idle_identities<S: WindowStore>(limiter: Arc<RateLimiter<S>>, every: Duration) {
    let mut ticker = interval(every);

    tracing::info!(interval = ?every, "idle identity sweeper started");

    loop {
        ticker.tick().await;

        let evicted = limiter.evict_idle(epoch_millis());
        let tracked = limiter.tracked_identities();
        TRACKED_IDENTITIES.set(tracked as f64);

        if evicted > 0 {
            tracing::debug!(evicted, tracked, "evicted idle identities");
        }
    }
}
