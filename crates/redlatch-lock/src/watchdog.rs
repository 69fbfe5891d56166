//! Lease renewal task
//!
//! A watchdog belongs to exactly one [`NodeLock`](crate::NodeLock). It keeps
//! the lease alive while the lock is held by periodically extending the TTL
//! through the owner-checked expire script. Renewal failures are logged and the
//! loop continues; only [`Watchdog::stop`] (called by unlock, or on drop) ends
//! the task. The task has its own cancellation token, so cancelling the call
//! that acquired the lock never stops renewal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lock::Lease;
use crate::metrics;

#[derive(Default)]
pub(crate) struct Watchdog {
    running: AtomicBool,
    stop_token: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
}

impl Watchdog {
    /// Spawn the renewal task unless one is already running.
    ///
    /// Claiming the flag and storing the stop token happen under one lock, so
    /// concurrent callers spawn at most one task and `stop` never misses it.
    /// Returns whether a task was spawned.
    pub(crate) fn start(&self, lease: Arc<Lease>, interval: Duration, ttl: Duration) -> bool {
        let mut stop_token = self.stop_token.lock();
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            key = %lease.key,
            generation,
            interval_ms = interval.as_millis() as u64,
            "Starting lock watchdog"
        );
        tokio::spawn(run(lease, token.clone(), interval, ttl, generation));
        *stop_token = Some(token);
        true
    }

    /// Signal the renewal task to exit. Safe to call when none is running.
    pub(crate) fn stop(&self) {
        let mut stop_token = self.stop_token.lock();
        if let Some(token) = stop_token.take() {
            token.cancel();
        }
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of renewal tasks spawned over this watchdog's lifetime
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn stop_token_for_test(&self) -> Option<CancellationToken> {
        self.stop_token.lock().clone()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    lease: Arc<Lease>,
    cancel: CancellationToken,
    interval: Duration,
    ttl: Duration,
    generation: u64,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = lease.expire(ttl) => result,
        };

        match result {
            Ok(()) => {
                metrics::record_renewal(true);
                debug!(key = %lease.key, generation, "Lock lease renewed");
            }
            Err(e) => {
                metrics::record_renewal(false);
                warn!(key = %lease.key, generation, error = %e, "Lock lease renewal failed");
            }
        }
    }

    debug!(key = %lease.key, generation, "Lock watchdog stopped");
}
