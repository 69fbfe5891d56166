//! Single-node lock
//!
//! Acquires, renews and releases one named lock against one store. Ownership
//! is decided solely by the holder token written as the key's value: the store
//! record equals the token if and only if this instance holds the lock.
//!
//! The lock is not reentrant. Calling [`NodeLock::lock`] again on an instance
//! that already holds the lock reports contention against itself.

use std::sync::Arc;
use std::time::Duration;

use redlatch_common::{Contention, LOCK_KEY_PREFIX, LockError, LockResult, new_token};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics;
use crate::options::{LockOptions, LockPolicy};
use crate::store::{LockScript, LockStore, ttl_millis};
use crate::watchdog::Watchdog;

/// Store key and holder token, shared with the watchdog task
pub(crate) struct Lease {
    store: Arc<dyn LockStore>,
    pub(crate) key: String,
    pub(crate) token: String,
}

impl Lease {
    async fn try_acquire(&self, ttl: Duration) -> LockResult<()> {
        match self
            .store
            .acquire_if_absent(&self.key, &self.token, ttl)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                metrics::record_contended();
                debug!(key = %self.key, "Lock held by another owner");
                Err(Contention.into())
            }
            Err(e) => Err(LockError::Store(e)),
        }
    }

    /// Reset the TTL if this lease still owns the key
    pub(crate) async fn expire(&self, ttl: Duration) -> LockResult<()> {
        let reply = self
            .store
            .eval(
                LockScript::ExpireIfOwner,
                std::slice::from_ref(&self.key),
                &[self.token.clone(), ttl_millis(ttl).to_string()],
            )
            .await
            .map_err(LockError::Store)?;

        if reply != 1 {
            return Err(LockError::NotOwner { op: "renew" });
        }
        Ok(())
    }

    async fn release(&self) -> LockResult<()> {
        let reply = self
            .store
            .eval(
                LockScript::DeleteIfOwner,
                std::slice::from_ref(&self.key),
                std::slice::from_ref(&self.token),
            )
            .await
            .map_err(LockError::Store)?;

        if reply != 1 {
            return Err(LockError::NotOwner { op: "unlock" });
        }
        Ok(())
    }
}

/// A lock on one key in one store
pub struct NodeLock {
    lease: Arc<Lease>,
    policy: LockPolicy,
    watchdog: Watchdog,
}

impl NodeLock {
    /// Create a lock for `key`. Options are normalized here, once, and a fresh
    /// holder token is generated for this instance.
    pub fn new(key: impl AsRef<str>, store: Arc<dyn LockStore>, options: LockOptions) -> Self {
        Self {
            lease: Arc::new(Lease {
                store,
                key: format!("{}{}", LOCK_KEY_PREFIX, key.as_ref()),
                token: new_token(),
            }),
            policy: options.normalize(),
            watchdog: Watchdog::default(),
        }
    }

    /// Acquire the lock.
    ///
    /// Makes one atomic attempt. In blocking mode, contention is retried on
    /// the poll interval until the lock is acquired, `cancel` fires, or the
    /// wait budget runs out. Any other error ends the call immediately. On
    /// success in watchdog mode the renewal task is started.
    pub async fn lock(&self, cancel: &CancellationToken) -> LockResult<()> {
        let started = Instant::now();
        let result = self.acquire(cancel).await;

        match &result {
            Ok(()) => {
                metrics::record_acquired(started.elapsed());
                info!(key = %self.lease.key, token = %self.lease.token, "Lock acquired");
                if self.policy.watchdog {
                    self.watchdog.start(
                        self.lease.clone(),
                        self.policy.watchdog_interval,
                        self.policy.renewal_ttl(),
                    );
                }
            }
            Err(e) => {
                metrics::record_failed(e.kind());
                debug!(key = %self.lease.key, error = %e, "Lock not acquired");
            }
        }
        result
    }

    async fn acquire(&self, cancel: &CancellationToken) -> LockResult<()> {
        let err = match self.try_lock(cancel).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !self.policy.blocking || !err.is_retryable() {
            return Err(err);
        }

        self.blocking_lock(cancel).await
    }

    async fn try_lock(&self, cancel: &CancellationToken) -> LockResult<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LockError::Cancelled),
            result = self.lease.try_acquire(self.policy.expire) => result,
        }
    }

    async fn blocking_lock(&self, cancel: &CancellationToken) -> LockResult<()> {
        let waiting = self.policy.block_waiting;
        let deadline = tokio::time::sleep(waiting);
        tokio::pin!(deadline);

        let poll = self.policy.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                _ = &mut deadline => {
                    return Err(LockError::WaitTimeout {
                        waited: waiting,
                        source: Contention,
                    });
                }
                _ = ticker.tick() => {}
            }

            match self.try_lock(cancel).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Release the lock.
    ///
    /// Stops the watchdog first, whether or not the release succeeds. Fails
    /// with [`LockError::NotOwner`] when this instance's token does not hold
    /// the key, including on a second unlock.
    pub async fn unlock(&self, cancel: &CancellationToken) -> LockResult<()> {
        self.watchdog.stop();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LockError::Cancelled),
            result = self.lease.release() => result,
        };

        match &result {
            Ok(()) => {
                metrics::record_released();
                info!(key = %self.lease.key, token = %self.lease.token, "Lock released");
            }
            Err(e) => {
                metrics::record_failed(e.kind());
                debug!(key = %self.lease.key, error = %e, "Lock release failed");
            }
        }
        result
    }

    /// Extend the lease to `ttl` if this instance still owns it
    pub async fn renew(&self, ttl: Duration) -> LockResult<()> {
        self.lease.expire(ttl).await
    }

    /// Store key, including the namespace prefix
    pub fn key(&self) -> &str {
        &self.lease.key
    }

    pub fn token(&self) -> &str {
        &self.lease.token
    }

    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    pub fn is_watchdog_mode(&self) -> bool {
        self.policy.watchdog
    }

    pub fn is_watchdog_running(&self) -> bool {
        self.watchdog.is_running()
    }
}

impl std::fmt::Debug for NodeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeLock")
            .field("key", &self.lease.key)
            .field("token", &self.lease.token)
            .field("policy", &self.policy)
            .field("watchdog_running", &self.watchdog.is_running())
            .finish()
    }
}
