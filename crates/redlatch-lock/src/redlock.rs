//! Quorum lock (RedLock)
//!
//! Composes N >= 3 single-node locks over independent stores. The lock is held
//! once a majority of members acquire within the per-node timeout. Members are
//! contacted one after another, so the whole fan-out must stay within a tenth
//! of the lease; this is checked at construction.

use std::sync::Arc;

use redlatch_common::{LockError, LockResult, MIN_QUORUM_NODES};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lock::NodeLock;
use crate::metrics;
use crate::options::RedLockOptions;
use crate::store::LockStore;

/// Distributed lock over several independent stores
#[derive(Debug)]
pub struct RedLock {
    locks: Vec<NodeLock>,
    node_timeout: Duration,
    expire: Duration,
}

impl RedLock {
    /// Build a quorum lock over `stores`. Performs no store I/O.
    ///
    /// Fails with [`LockError::Config`] when fewer than three stores are given
    /// or when `stores × node_timeout × 10` exceeds the lease.
    pub fn new(
        key: impl AsRef<str>,
        stores: Vec<Arc<dyn LockStore>>,
        options: RedLockOptions,
    ) -> LockResult<Self> {
        if stores.len() < MIN_QUORUM_NODES {
            return Err(LockError::Config(format!(
                "can not use redlock with less than {} nodes, got {}",
                MIN_QUORUM_NODES,
                stores.len()
            )));
        }

        let node_timeout = options.node_timeout();
        let expire = options.effective_expire();
        let cumulative = node_timeout
            .checked_mul(stores.len() as u32 * 10)
            .unwrap_or(Duration::MAX);
        if cumulative > expire {
            return Err(LockError::Config(format!(
                "node timeout too long: {} nodes x {:?} x 10 exceeds lease {:?}",
                stores.len(),
                node_timeout,
                expire
            )));
        }

        let member = options.member_options();
        let locks = stores
            .into_iter()
            .map(|store| NodeLock::new(key.as_ref(), store, member.clone()))
            .collect();

        Ok(Self {
            locks,
            node_timeout,
            expire,
        })
    }

    /// Build a quorum lock over Redis nodes
    #[cfg(feature = "redis")]
    pub fn from_redis(
        key: impl AsRef<str>,
        nodes: &[crate::redis_store::RedisNodeConfig],
        options: RedLockOptions,
    ) -> LockResult<Self> {
        let stores = nodes
            .iter()
            .map(|node| {
                crate::redis_store::RedisStore::open(node).map(|s| Arc::new(s) as Arc<dyn LockStore>)
            })
            .collect::<LockResult<Vec<_>>>()?;
        Self::new(key, stores, options)
    }

    /// Acquire the lock on a majority of members.
    ///
    /// A member counts only if it succeeded within the per-node timeout. When
    /// the majority is missed every member is unlocked before returning, so no
    /// partial acquisition is left behind.
    pub async fn lock(&self, cancel: &CancellationToken) -> LockResult<()> {
        let started = Instant::now();
        let total = self.locks.len();
        let required = self.quorum();
        let mut acquired = 0;

        for (node, lock) in self.locks.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let attempt = Instant::now();
            let outcome = tokio::time::timeout(self.node_timeout, lock.lock(cancel)).await;
            let elapsed = attempt.elapsed();

            match outcome {
                Ok(Ok(())) if elapsed <= self.node_timeout => acquired += 1,
                Ok(Ok(())) => {
                    warn!(
                        key = %lock.key(),
                        node,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Node acquired past its timeout, not counted"
                    );
                }
                Ok(Err(e)) => debug!(key = %lock.key(), node, error = %e, "Node lock failed"),
                Err(_) => debug!(key = %lock.key(), node, "Node lock timed out"),
            }
        }

        if acquired < required {
            warn!(acquired, required, total, "Quorum not met, rolling back");
            metrics::record_quorum_failure(acquired, total);
            self.rollback().await;

            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            return Err(LockError::QuorumNotMet {
                acquired,
                required,
                total,
            });
        }

        info!(
            acquired,
            total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Quorum lock acquired"
        );
        Ok(())
    }

    /// Unlock every member after a missed quorum.
    ///
    /// Runs under its own token so cleanup still happens when the caller's
    /// cancellation is what ended the acquisition.
    async fn rollback(&self) {
        let cleanup = CancellationToken::new();
        for (node, lock) in self.locks.iter().enumerate() {
            if let Err(e) = lock.unlock(&cleanup).await {
                debug!(key = %lock.key(), node, error = %e, "Rollback unlock skipped");
            }
        }
    }

    /// Release every member.
    ///
    /// Never stops early: each member is attempted and the last error seen is
    /// returned.
    pub async fn unlock(&self, cancel: &CancellationToken) -> LockResult<()> {
        let mut last_err = None;
        for (node, lock) in self.locks.iter().enumerate() {
            if let Err(e) = lock.unlock(cancel).await {
                debug!(key = %lock.key(), node, error = %e, "Node unlock failed");
                last_err = Some(e);
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Members that must agree: `N / 2 + 1`
    pub fn quorum(&self) -> usize {
        self.locks.len() / 2 + 1
    }

    pub fn node_count(&self) -> usize {
        self.locks.len()
    }

    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    /// Lease held on each member
    pub fn expire(&self) -> Duration {
        self.expire
    }

    pub fn locks(&self) -> &[NodeLock] {
        &self.locks
    }
}
