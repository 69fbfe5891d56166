// Lock options
// Caller-facing settings and their one-time normalization at construction

use std::time::Duration;

use redlatch_common::{
    DEFAULT_BLOCK_WAITING_MS, DEFAULT_LOCK_EXPIRE_MS, DEFAULT_NODE_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WATCHDOG_INTERVAL_MS, DEFAULT_WATCHDOG_MARGIN_MS,
};
use serde::{Deserialize, Serialize};

/// Options for a single-node lock
///
/// Zero values mean "not set" and are repaired by [`LockOptions::normalize`].
/// Leaving `expire_ms` unset is the signal that the lease should be kept
/// alive by the watchdog instead of expiring on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// Poll until acquired instead of failing fast on contention
    pub blocking: bool,

    /// Blocking wait budget in milliseconds (default: 5000ms when blocking)
    pub block_waiting_ms: u64,

    /// Lease TTL in milliseconds (0 = default TTL with watchdog renewal)
    pub expire_ms: u64,

    /// Watchdog renewal period in milliseconds (default: 3000ms)
    pub watchdog_interval_ms: u64,

    /// Extra lease added on each renewal to absorb latency (default: 3000ms,
    /// never less than half the renewal period)
    pub watchdog_margin_ms: u64,

    /// Interval between attempts while blocking (default: 50ms)
    pub poll_interval_ms: u64,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            blocking: false,
            block_waiting_ms: 0,
            expire_ms: 0,
            watchdog_interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            watchdog_margin_ms: DEFAULT_WATCHDOG_MARGIN_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn with_block_waiting(mut self, waiting: Duration) -> Self {
        self.block_waiting_ms = waiting.as_millis() as u64;
        self
    }

    pub fn with_expire(mut self, expire: Duration) -> Self {
        self.expire_ms = expire.as_millis() as u64;
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_watchdog_margin(mut self, margin: Duration) -> Self {
        self.watchdog_margin_ms = margin.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Fill in defaults and derive watchdog mode. Runs once per lock.
    ///
    /// In watchdog mode the first lease is stretched to cover a full renewal
    /// period plus margin, so a long interval cannot let the key lapse before
    /// the first renewal.
    pub fn normalize(&self) -> LockPolicy {
        let block_waiting_ms = if self.blocking && self.block_waiting_ms == 0 {
            DEFAULT_BLOCK_WAITING_MS
        } else {
            self.block_waiting_ms
        };

        let interval_ms = non_zero_or(self.watchdog_interval_ms, DEFAULT_WATCHDOG_INTERVAL_MS);
        // each renewal must outlive the next tick by a real margin
        let margin_ms = self.watchdog_margin_ms.max(interval_ms / 2);

        let (expire_ms, watchdog) = if self.expire_ms > 0 {
            (self.expire_ms, false)
        } else {
            // the first lease must survive until the first renewal
            (DEFAULT_LOCK_EXPIRE_MS.max(interval_ms + margin_ms), true)
        };

        LockPolicy {
            blocking: self.blocking,
            block_waiting: Duration::from_millis(block_waiting_ms),
            expire: Duration::from_millis(expire_ms),
            watchdog,
            watchdog_interval: Duration::from_millis(interval_ms),
            watchdog_margin: Duration::from_millis(margin_ms),
            poll_interval: Duration::from_millis(non_zero_or(
                self.poll_interval_ms,
                DEFAULT_POLL_INTERVAL_MS,
            )),
        }
    }
}

/// Normalized single-node lock settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockPolicy {
    pub blocking: bool,
    pub block_waiting: Duration,
    pub expire: Duration,
    pub watchdog: bool,
    pub watchdog_interval: Duration,
    pub watchdog_margin: Duration,
    pub poll_interval: Duration,
}

impl LockPolicy {
    /// TTL requested by each watchdog renewal
    pub fn renewal_ttl(&self) -> Duration {
        self.watchdog_interval + self.watchdog_margin
    }
}

/// Options for a quorum lock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedLockOptions {
    /// Per-node acquisition budget in milliseconds (default: 50ms)
    pub node_timeout_ms: u64,

    /// Lease TTL shared by every member in milliseconds
    /// (0 = members renew through their watchdogs)
    pub expire_ms: u64,
}

impl Default for RedLockOptions {
    fn default() -> Self {
        Self {
            node_timeout_ms: DEFAULT_NODE_TIMEOUT_MS,
            expire_ms: 0,
        }
    }
}

impl RedLockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_expire(mut self, expire: Duration) -> Self {
        self.expire_ms = expire.as_millis() as u64;
        self
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.node_timeout_ms, DEFAULT_NODE_TIMEOUT_MS))
    }

    /// Lease the members actually hold, including the watchdog default
    pub fn effective_expire(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.expire_ms, DEFAULT_LOCK_EXPIRE_MS))
    }

    /// Options every member lock is built with: non-blocking, shared TTL
    pub fn member_options(&self) -> LockOptions {
        LockOptions {
            expire_ms: self.expire_ms,
            ..LockOptions::default()
        }
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}
