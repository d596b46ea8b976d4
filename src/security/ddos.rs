//! Suspicion scoring and timed client blocks.
//!
//! # Data Flow
//! ```text
//! evaluate(client, suspicious)
//!     → whitelisted?              allow, nothing recorded
//!     → blocked_until in future?  block(remaining)
//!     → suspicious or flooding?   score += 1
//!     → score >= threshold?       block for block_duration
//! ```
//!
//! # Design Decisions
//! - Fixed block duration per violation; a served block resets the score
//! - Records expire lazily: a stale record is dropped when its client shows up
//!   again, and a sweep runs every `SWEEP_INTERVAL` evaluations
//! - Flooding is detected with a one-second counter in the shared
//!   [`CounterStore`]

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::DdosConfig;
use crate::security::client_key::ClientKey;
use crate::security::store::CounterStore;
use crate::security::whitelist::Whitelist;

const FLOOD_WINDOW: Duration = Duration::from_secs(1);
const FLOOD_PREFIX: &str = "ddos";
const SWEEP_INTERVAL: u64 = 1024;

/// Accumulated suspicion for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspicionRecord {
    pub score: u32,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub blocked_until: Option<Instant>,
}

impl SuspicionRecord {
    fn new(now: Instant) -> Self {
        Self {
            score: 0,
            first_seen: now,
            last_seen: now,
            blocked_until: None,
        }
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    fn is_stale(&self, ttl: Duration, now: Instant) -> bool {
        match self.blocked_until {
            Some(until) => until <= now && now.saturating_duration_since(until) >= ttl,
            None => now.saturating_duration_since(self.last_seen) >= ttl,
        }
    }
}

/// Outcome of a DDoS evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdosDecision {
    Allow,
    Block { remaining: Duration },
}

/// Snapshot of a blocked client, for the admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedClient {
    pub ip: IpAddr,
    pub score: u32,
    pub remaining: Duration,
}

/// Per-client suspicion tracker.
pub struct DdosGuard {
    records: DashMap<IpAddr, SuspicionRecord>,
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    whitelist: Arc<Whitelist>,
    config: DdosConfig,
    evaluations: AtomicU64,
}

impl DdosGuard {
    pub fn new(
        config: DdosConfig,
        whitelist: Arc<Whitelist>,
        counters: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records: DashMap::new(),
            counters,
            clock,
            whitelist,
            config,
            evaluations: AtomicU64::new(0),
        }
    }

    fn block_duration(&self) -> Duration {
        Duration::from_secs(self.config.block_duration_secs)
    }

    fn score_ttl(&self) -> Duration {
        Duration::from_secs(self.config.score_ttl_secs)
    }

    /// Decide whether a request from `client` may proceed.
    ///
    /// `suspicious` carries the detector verdict; raw flooding above
    /// `requests_per_second` also counts as suspicious.
    pub fn evaluate(&self, client: &ClientKey, suspicious: bool) -> DdosDecision {
        if !self.config.enabled || self.whitelist.contains(client.ip()) {
            return DdosDecision::Allow;
        }

        let now = self.clock.now();
        self.maybe_sweep(now);

        let per_second = self
            .counters
            .increment(&client.counter_key(FLOOD_PREFIX), FLOOD_WINDOW, now);
        let flooding = per_second.count > self.config.requests_per_second;
        let suspicious = suspicious || flooding;

        match self.records.entry(client.ip()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if let Some(until) = record.blocked_until {
                    if until > now {
                        return DdosDecision::Block {
                            remaining: until - now,
                        };
                    }
                    tracing::info!(client = %client, "Block expired");
                    *record = SuspicionRecord::new(now);
                } else if record.is_stale(self.score_ttl(), now) {
                    *record = SuspicionRecord::new(now);
                }

                if !suspicious {
                    if record.score == 0 {
                        entry.remove();
                    }
                    return DdosDecision::Allow;
                }
                self.escalate(client, record, flooding, now)
            }
            Entry::Vacant(entry) => {
                if !suspicious {
                    return DdosDecision::Allow;
                }
                let mut record = SuspicionRecord::new(now);
                let decision = self.escalate(client, &mut record, flooding, now);
                entry.insert(record);
                decision
            }
        }
    }

    fn escalate(
        &self,
        client: &ClientKey,
        record: &mut SuspicionRecord,
        flooding: bool,
        now: Instant,
    ) -> DdosDecision {
        record.score = record.score.saturating_add(1);
        record.last_seen = now;

        if record.score >= self.config.suspicious_threshold {
            let duration = self.block_duration();
            record.blocked_until = Some(now + duration);
            tracing::warn!(
                client = %client,
                score = record.score,
                block_secs = duration.as_secs(),
                flooding,
                "Client blocked"
            );
            return DdosDecision::Block {
                remaining: duration,
            };
        }

        tracing::debug!(client = %client, score = record.score, flooding, "Suspicion recorded");
        DdosDecision::Allow
    }

    fn maybe_sweep(&self, now: Instant) {
        let n = self.evaluations.fetch_add(1, Ordering::Relaxed) + 1;
        if n % SWEEP_INTERVAL == 0 {
            self.purge_stale(now);
        }
    }

    /// Drop expired records and flood counters. Returns removed record count.
    pub fn purge_stale(&self, now: Instant) -> usize {
        let ttl = self.score_ttl();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_stale(ttl, now));
        self.counters.purge_expired(FLOOD_PREFIX, FLOOD_WINDOW, now);
        before.saturating_sub(self.records.len())
    }

    /// Current suspicion record for an address.
    pub fn record(&self, ip: IpAddr) -> Option<SuspicionRecord> {
        self.records.get(&ip.to_canonical()).map(|r| *r)
    }

    /// Clients currently blocked.
    pub fn blocked_clients(&self) -> Vec<BlockedClient> {
        let now = self.clock.now();
        let mut blocked: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.is_blocked(now))
            .filter_map(|r| {
                r.blocked_until.map(|until| BlockedClient {
                    ip: *r.key(),
                    score: r.score,
                    remaining: until - now,
                })
            })
            .collect();
        blocked.sort_by_key(|b| b.ip);
        blocked
    }

    /// Lift a block and forget the client's score.
    /// Returns true if a record existed.
    pub fn unblock(&self, ip: IpAddr) -> bool {
        let removed = self.records.remove(&ip.to_canonical()).is_some();
        if removed {
            tracing::info!(client = %ip, "Client unblocked manually");
        }
        removed
    }

    /// Number of clients with a suspicion record.
    pub fn tracked_clients(&self) -> usize {
        self.records.len()
    }
}
