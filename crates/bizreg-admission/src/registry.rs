//! Client limiter registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bizreg_core::LimiterConfig;
use parking_lot::Mutex;

use crate::bucket::TokenBucket;
use crate::clock::Clock;
use crate::sweeper::Sweeper;

/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep timing. Entries idle for longer than `stale_after` are evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// How often the sweeper runs.
    pub interval: Duration,
    /// Idle time after which an entry is evicted.
    pub stale_after: Duration,
}

impl SweepConfig {
    /// Sweep every `interval`; evict after three intervals of silence.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            stale_after: interval * 3,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::every(DEFAULT_SWEEP_INTERVAL)
    }
}

#[derive(Debug)]
struct ClientState {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// One token bucket per client identifier, created lazily and evicted when
/// idle.
#[derive(Debug)]
pub struct AdmissionRegistry {
    config: LimiterConfig,
    stale_after: Duration,
    clock: Arc<dyn Clock>,
    clients: Mutex<HashMap<String, ClientState>>,
    rejected: AtomicU64,
}

impl AdmissionRegistry {
    /// Build a registry without a sweeper. Call [`sweep`](Self::sweep)
    /// yourself, or use [`start`](Self::start).
    pub fn new(config: LimiterConfig, stale_after: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            stale_after,
            clock,
            clients: Mutex::new(HashMap::new()),
            rejected: AtomicU64::new(0),
        }
    }

    /// Build a registry and spawn its sweeper on the current tokio runtime.
    ///
    /// No sweeper is spawned when the limiter is disabled, since the map
    /// then stays empty.
    pub fn start(config: LimiterConfig, sweep: SweepConfig, clock: Arc<dyn Clock>) -> AdmissionControl {
        let enabled = config.enabled;
        let registry = Arc::new(Self::new(config, sweep.stale_after, clock));
        let sweeper = enabled.then(|| Sweeper::spawn(Arc::clone(&registry), sweep.interval));
        tracing::info!(
            enabled,
            interval_secs = sweep.interval.as_secs_f64(),
            stale_after_secs = sweep.stale_after.as_secs_f64(),
            "admission control started"
        );
        AdmissionControl { registry, sweeper }
    }

    /// Whether a request from `client_id` may proceed.
    ///
    /// Creates the client's bucket on first sight and refreshes its
    /// last-seen time on every call, admitted or not. Always true when the
    /// limiter is disabled.
    pub fn allow(&self, client_id: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = self.clock.now();
        let mut clients = self.clients.lock();
        let state = clients
            .entry(client_id.to_owned())
            .or_insert_with(|| ClientState {
                bucket: TokenBucket::new(self.config.requests_per_second, self.config.burst, now),
                last_seen: now,
            });
        state.last_seen = now;
        let admitted = state.bucket.try_acquire(now);
        drop(clients);

        if !admitted {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(client_id, "request rejected by rate limiter");
        }
        admitted
    }

    /// Evict every entry idle for longer than the staleness window.
    /// Returns the number evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let stale_after = self.stale_after;
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, state| now.saturating_duration_since(state.last_seen) <= stale_after);
        before - clients.len()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// True when no client is tracked.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Whether `client_id` currently has an entry.
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.lock().contains_key(client_id)
    }

    /// Total requests rejected since construction.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Whether the limiter is active.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// A registry together with the sweeper task it owns.
#[derive(Debug)]
pub struct AdmissionControl {
    registry: Arc<AdmissionRegistry>,
    sweeper: Option<Sweeper>,
}

impl AdmissionControl {
    /// Shared handle to the registry, for the request path.
    pub fn registry(&self) -> Arc<AdmissionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Shorthand for `registry().allow(client_id)`.
    pub fn allow(&self, client_id: &str) -> bool {
        self.registry.allow(client_id)
    }

    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn limiter(rps: f64, burst: u32) -> LimiterConfig {
        LimiterConfig {
            enabled: true,
            requests_per_second: rps,
            burst,
        }
    }

    fn registry(config: LimiterConfig) -> (AdmissionRegistry, MockClock) {
        let clock = MockClock::default();
        let registry =
            AdmissionRegistry::new(config, SweepConfig::default().stale_after, Arc::new(clock.clone()));
        (registry, clock)
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let (registry, _) = registry(LimiterConfig {
            enabled: false,
            requests_per_second: 1.0,
            burst: 1,
        });
        assert!((0..10_000).all(|_| registry.allow("10.0.0.5")));
        assert!(registry.is_empty());
        assert_eq!(registry.rejected(), 0);
    }

    #[test]
    fn three_back_to_back_requests_with_burst_two() {
        let (registry, _) = registry(limiter(2.0, 2));
        let results: Vec<bool> = (0..3).map(|_| registry.allow("10.0.0.5")).collect();
        assert_eq!(results, vec![true, true, false]);
        assert_eq!(registry.rejected(), 1);
    }

    #[test]
    fn refills_after_one_second() {
        let (registry, clock) = registry(limiter(1.0, 1));
        assert!(registry.allow("a"));
        assert!(!registry.allow("a"));
        clock.advance(Duration::from_secs(1));
        assert!(registry.allow("a"));
    }

    #[test]
    fn clients_have_independent_buckets() {
        let (registry, _) = registry(limiter(1.0, 1));
        assert!(registry.allow("a"));
        assert!(registry.allow("b"));
        assert!(!registry.allow("a"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn sweep_evicts_only_stale_clients() {
        let (registry, clock) = registry(limiter(1.0, 1));
        registry.allow("idle");
        clock.advance(Duration::from_secs(150));
        registry.allow("recent");
        clock.advance(Duration::from_secs(31));

        assert_eq!(registry.sweep(), 1);
        assert!(!registry.contains("idle"));
        assert!(registry.contains("recent"));
    }

    #[test]
    fn rejected_calls_still_refresh_last_seen() {
        let (registry, clock) = registry(limiter(0.001, 1));
        registry.allow("busy");
        clock.advance(Duration::from_secs(170));
        assert!(!registry.allow("busy"));
        clock.advance(Duration::from_secs(170));
        assert_eq!(registry.sweep(), 0);
        assert!(registry.contains("busy"));
    }

    #[test]
    fn evicted_client_starts_with_a_full_bucket() {
        let (registry, clock) = registry(limiter(0.001, 1));
        assert!(registry.allow("a"));
        assert!(!registry.allow("a"));
        clock.advance(Duration::from_secs(181));
        registry.sweep();
        assert!(registry.allow("a"));
    }
}
