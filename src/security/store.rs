//! Fixed-window counter storage.
//!
//! # Responsibilities
//! - Map a key (client IP, optionally scoped to an endpoint) to a window counter
//! - Reset-and-increment atomically per key
//! - Drop counters whose window ended long ago
//!
//! # Design Decisions
//! - Stores sit behind the [`CounterStore`] trait so limiters never depend on
//!   where counters live
//! - The in-memory store is a sharded `DashMap`; each read-modify-write holds
//!   only the shard lock of its key

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Request count inside one fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    pub count: u64,
    pub window_start: Instant,
}

impl WindowCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Whether `window` has fully elapsed since this counter's window opened.
    pub fn is_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// Time left until this window closes.
    pub fn remaining(&self, window: Duration, now: Instant) -> Duration {
        window.saturating_sub(now.saturating_duration_since(self.window_start))
    }
}

/// Keyed storage of window counters.
pub trait CounterStore: Send + Sync {
    /// Current counter for `key`, if any.
    fn get(&self, key: &str) -> Option<WindowCounter>;

    /// Count one hit against `key`.
    ///
    /// Opens a fresh window first when the stored one has elapsed. Returns the
    /// counter after the increment. The whole operation is atomic per key.
    fn increment(&self, key: &str, window: Duration, now: Instant) -> WindowCounter;

    /// Forget the counter for `key`.
    fn reset(&self, key: &str);

    /// Remove counters under `prefix` whose window opened more than
    /// `max_window` ago. Returns how many were removed.
    fn purge_expired(&self, prefix: &str, max_window: Duration, now: Instant) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter store.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, WindowCounter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn get(&self, key: &str) -> Option<WindowCounter> {
        self.counters.get(key).map(|c| *c)
    }

    fn increment(&self, key: &str, window: Duration, now: Instant) -> WindowCounter {
        let mut counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| WindowCounter::new(now));

        if counter.is_expired(window, now) {
            *counter = WindowCounter::new(now);
        }
        counter.count += 1;
        *counter
    }

    fn reset(&self, key: &str) {
        self.counters.remove(key);
    }

    fn purge_expired(&self, prefix: &str, max_window: Duration, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|key, counter| {
            !key.starts_with(prefix) || !counter.is_expired(max_window, now)
        });
        before.saturating_sub(self.counters.len())
    }

    fn len(&self) -> usize {
        self.counters.len()
    }
}
