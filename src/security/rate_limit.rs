//! Fixed-window rate limiting with a burst and a sustained window.
//!
//! # Responsibilities
//! - Count every request against a short burst window and a longer sustained window
//! - Substitute per-endpoint sustained limits when configured
//! - Compute how long a rejected client should wait
//!
//! # Design Decisions
//! - Fixed windows: O(1) memory and update per key. Bursts at window edges are
//!   possible; the separate burst window bounds them
//! - Both counters are incremented before the decision, so a client hovering
//!   at the limit keeps paying for rejected attempts
//! - Endpoint overrides get their own counter keyed by client and endpoint
//! - Expired counters are purged every `SWEEP_INTERVAL` checks, no timer

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::{EndpointLimit, RateLimitConfig};
use crate::security::client_key::ClientKey;
use crate::security::store::{CounterStore, WindowCounter};
use crate::security::whitelist::Whitelist;

const SWEEP_INTERVAL: u64 = 4096;

/// Which window a counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Burst,
    Sustained,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Burst => "burst",
            WindowKind::Sustained => "sustained",
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Reject {
        retry_after: Duration,
        window: WindowKind,
    },
}

/// A (calls, period) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub calls: u64,
    pub period: Duration,
}

impl From<EndpointLimit> for Limit {
    fn from(limit: EndpointLimit) -> Self {
        Self {
            calls: limit.calls,
            period: Duration::from_secs(limit.period_secs),
        }
    }
}

/// Endpoint → sustained limit, with a default.
#[derive(Debug, Clone)]
pub struct EndpointLimitTable {
    default: Limit,
    exact: BTreeMap<String, Limit>,
    /// Sorted longest prefix first.
    prefixes: Vec<(String, Limit)>,
}

impl EndpointLimitTable {
    pub fn new(default: Limit, entries: &BTreeMap<String, EndpointLimit>) -> Self {
        let mut exact = BTreeMap::new();
        let mut prefixes = Vec::new();
        for (endpoint, limit) in entries {
            match endpoint.strip_suffix('*') {
                Some(prefix) => prefixes.push((prefix.to_string(), Limit::from(*limit))),
                None => {
                    exact.insert(endpoint.clone(), Limit::from(*limit));
                }
            }
        }
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            default,
            exact,
            prefixes,
        }
    }

    /// The override entry matching `endpoint`, if any, with its table key.
    pub fn lookup(&self, endpoint: &str) -> Option<(&str, Limit)> {
        if let Some((key, limit)) = self.exact.get_key_value(endpoint) {
            return Some((key.as_str(), *limit));
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| endpoint.starts_with(prefix.as_str()))
            .map(|(prefix, limit)| (prefix.as_str(), *limit))
    }

    /// Limit applying to `endpoint`, falling back to the default.
    pub fn limit_for(&self, endpoint: &str) -> Limit {
        self.lookup(endpoint)
            .map(|(_, limit)| limit)
            .unwrap_or(self.default)
    }
}

/// Per-client burst and sustained limiter.
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    whitelist: Arc<Whitelist>,
    burst: Limit,
    table: EndpointLimitTable,
    enabled: bool,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(
        config: &RateLimitConfig,
        whitelist: Arc<Whitelist>,
        counters: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let default = Limit {
            calls: config.default_calls,
            period: Duration::from_secs(config.default_period_secs),
        };
        Self {
            counters,
            clock,
            whitelist,
            burst: Limit {
                calls: config.burst_calls,
                period: Duration::from_secs(config.burst_period_secs),
            },
            table: EndpointLimitTable::new(default, &config.endpoint_limits),
            enabled: config.enabled,
            checks: AtomicU64::new(0),
        }
    }

    /// Count a request from `client` to `endpoint` and decide.
    pub fn check(&self, client: &ClientKey, endpoint: &str) -> RateDecision {
        if !self.enabled || self.whitelist.contains(client.ip()) {
            return RateDecision::Allow;
        }

        let now = self.clock.now();
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired(now);
        }

        let sustained_key = self.sustained_key(client, endpoint);
        let sustained_limit = self.table.limit_for(endpoint);

        let burst = self
            .counters
            .increment(&client.counter_key(WindowKind::Burst.as_str()), self.burst.period, now);
        let sustained = self
            .counters
            .increment(&sustained_key, sustained_limit.period, now);

        let exceeded = [
            exceeded(WindowKind::Burst, &burst, self.burst, now),
            exceeded(WindowKind::Sustained, &sustained, sustained_limit, now),
        ]
        .into_iter()
        .flatten()
        .max_by_key(|(retry_after, _)| *retry_after);

        match exceeded {
            Some((retry_after, window)) => {
                tracing::debug!(
                    client = %client,
                    endpoint,
                    window = window.as_str(),
                    burst_count = burst.count,
                    sustained_count = sustained.count,
                    "Rate limit exceeded"
                );
                RateDecision::Reject {
                    retry_after,
                    window,
                }
            }
            None => RateDecision::Allow,
        }
    }

    /// Current counter of one window, for inspection.
    pub fn counter(&self, client: &ClientKey, endpoint: &str, kind: WindowKind) -> Option<WindowCounter> {
        match kind {
            WindowKind::Burst => self.counters.get(&client.counter_key(kind.as_str())),
            WindowKind::Sustained => self.counters.get(&self.sustained_key(client, endpoint)),
        }
    }

    /// Drop counters whose windows ended. Returns the number removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let longest_sustained = self
            .table
            .prefixes
            .iter()
            .map(|(_, l)| l.period)
            .chain(self.table.exact.values().map(|l| l.period))
            .fold(self.table.default.period, Duration::max);

        self.counters
            .purge_expired(WindowKind::Burst.as_str(), self.burst.period, now)
            + self.counters.purge_expired(
                WindowKind::Sustained.as_str(),
                longest_sustained,
                now,
            )
    }

    /// Number of tracked counters.
    pub fn tracked_counters(&self) -> usize {
        self.counters.len()
    }

    fn sustained_key(&self, client: &ClientKey, endpoint: &str) -> String {
        let kind = WindowKind::Sustained.as_str();
        match self.table.lookup(endpoint) {
            Some((entry, _)) => client.endpoint_counter_key(kind, entry),
            None => client.counter_key(kind),
        }
    }
}

fn exceeded(
    kind: WindowKind,
    counter: &WindowCounter,
    limit: Limit,
    now: Instant,
) -> Option<(Duration, WindowKind)> {
    (counter.count > limit.calls).then(|| (counter.remaining(limit.period, now), kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::security::store::MemoryCounterStore;

    fn limiter(config: RateLimitConfig, whitelist: &[&str]) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new(
            &config,
            Arc::new(Whitelist::parse(whitelist).unwrap()),
            Arc::new(MemoryCounterStore::new()),
            clock.clone(),
        );
        (limiter, clock)
    }

    fn key(s: &str) -> ClientKey {
        ClientKey::new(s.parse().unwrap())
    }

    #[test]
    fn test_twenty_first_request_in_a_second_is_rejected() {
        let (limiter, clock) = limiter(RateLimitConfig::default(), &[]);
        let client = key("203.0.113.1");

        for i in 0..20 {
            assert_eq!(limiter.check(&client, "/api/plans"), RateDecision::Allow, "request {}", i + 1);
            clock.advance(Duration::from_millis(10));
        }
        match limiter.check(&client, "/api/plans") {
            RateDecision::Reject { retry_after, window } => {
                assert_eq!(window, WindowKind::Burst);
                assert!(retry_after > Duration::ZERO);
                assert_eq!(retry_after, Duration::from_millis(800));
            }
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn test_sustained_window_resets_to_one() {
        let config = RateLimitConfig {
            default_calls: 3,
            default_period_secs: 60,
            burst_calls: 100,
            ..Default::default()
        };
        let (limiter, clock) = limiter(config, &[]);
        let client = key("203.0.113.2");

        for _ in 0..3 {
            assert_eq!(limiter.check(&client, "/"), RateDecision::Allow);
        }
        assert!(matches!(
            limiter.check(&client, "/"),
            RateDecision::Reject { window: WindowKind::Sustained, .. }
        ));

        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.check(&client, "/"), RateDecision::Allow);
        let counter = limiter.counter(&client, "/", WindowKind::Sustained).unwrap();
        assert_eq!(counter.count, 1);
    }

    #[test]
    fn test_rejected_requests_still_count() {
        let config = RateLimitConfig {
            default_calls: 2,
            default_period_secs: 10,
            burst_calls: 100,
            ..Default::default()
        };
        let (limiter, clock) = limiter(config, &[]);
        let client = key("203.0.113.3");

        for _ in 0..5 {
            limiter.check(&client, "/");
        }
        assert_eq!(
            limiter.counter(&client, "/", WindowKind::Sustained).map(|c| c.count),
            Some(5)
        );

        clock.advance(Duration::from_secs(4));
        assert_eq!(
            limiter.check(&client, "/"),
            RateDecision::Reject {
                retry_after: Duration::from_secs(6),
                window: WindowKind::Sustained
            }
        );
    }

    #[test]
    fn test_endpoint_override_has_its_own_counter() {
        let mut config = RateLimitConfig {
            burst_calls: 100,
            ..Default::default()
        };
        config
            .endpoint_limits
            .insert("/api/sms/send".into(), EndpointLimit { calls: 2, period_secs: 300 });
        config
            .endpoint_limits
            .insert("/api/orders/*".into(), EndpointLimit { calls: 1, period_secs: 60 });
        let (limiter, _) = limiter(config, &[]);
        let client = key("203.0.113.4");

        assert_eq!(limiter.check(&client, "/api/sms/send"), RateDecision::Allow);
        assert_eq!(limiter.check(&client, "/api/sms/send"), RateDecision::Allow);
        match limiter.check(&client, "/api/sms/send") {
            RateDecision::Reject { retry_after, window } => {
                assert_eq!(window, WindowKind::Sustained);
                assert_eq!(retry_after, Duration::from_secs(300));
            }
            other => panic!("expected reject, got {other:?}"),
        }

        // Default bucket untouched by the override
        assert_eq!(limiter.check(&client, "/api/plans"), RateDecision::Allow);

        // Prefix entries share one counter across matching paths
        assert_eq!(limiter.check(&client, "/api/orders/1"), RateDecision::Allow);
        assert!(matches!(
            limiter.check(&client, "/api/orders/2"),
            RateDecision::Reject { .. }
        ));
    }

    #[test]
    fn test_clients_do_not_share_counters() {
        let config = RateLimitConfig {
            burst_calls: 1,
            ..Default::default()
        };
        let (limiter, _) = limiter(config, &[]);
        assert_eq!(limiter.check(&key("203.0.113.5"), "/"), RateDecision::Allow);
        assert_eq!(limiter.check(&key("203.0.113.6"), "/"), RateDecision::Allow);
        assert!(matches!(
            limiter.check(&key("203.0.113.5"), "/"),
            RateDecision::Reject { .. }
        ));
    }

    #[test]
    fn test_whitelisted_client_is_never_rejected() {
        let config = RateLimitConfig {
            burst_calls: 1,
            default_calls: 1,
            ..Default::default()
        };
        let (limiter, _) = limiter(config, &["203.0.113.0/24"]);
        let client = key("203.0.113.7");
        for _ in 0..1000 {
            assert_eq!(limiter.check(&client, "/"), RateDecision::Allow);
        }
        assert_eq!(limiter.tracked_counters(), 0);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut entries = BTreeMap::new();
        entries.insert("/api/*".to_string(), EndpointLimit { calls: 50, period_secs: 60 });
        entries.insert("/api/admin/*".to_string(), EndpointLimit { calls: 5, period_secs: 60 });
        let table = EndpointLimitTable::new(
            Limit { calls: 100, period: Duration::from_secs(60) },
            &entries,
        );

        assert_eq!(table.limit_for("/api/admin/users").calls, 5);
        assert_eq!(table.limit_for("/api/plans").calls, 50);
        assert_eq!(table.limit_for("/health").calls, 100);
    }

    #[test]
    fn test_purge_expired_counters() {
        let (limiter, clock) = limiter(RateLimitConfig::default(), &[]);
        limiter.check(&key("203.0.113.8"), "/");
        assert_eq!(limiter.tracked_counters(), 2);

        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.purge_expired(clock.now()), 2);
        assert_eq!(limiter.tracked_counters(), 0);
    }

    #[test]
    fn test_concurrent_checks_admit_exactly_the_burst() {
        let (limiter, _clock) = limiter(RateLimitConfig::default(), &[]);
        let limiter = Arc::new(limiter);
        let client = key("203.0.113.50");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.check(&client, "/api/plans") == RateDecision::Allow)
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(allowed, RateLimitConfig::default().burst_calls as usize);
    }
}
