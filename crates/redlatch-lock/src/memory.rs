// In-memory lock store
// DashMap-backed implementation of the store contract with TTL expiry

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

use crate::store::{LockScript, LockStore};

/// A stored value and its expiry deadline
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory store for single-process coordination and tests.
///
/// Expiry is measured on the tokio clock, so tests running with paused time
/// can step past leases without sleeping. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoreEntry>>,
    unavailable: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while unavailable every operation fails.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every operation by `latency` before it touches the data.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Current unexpired value of `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Remaining TTL of `key`, if it is present and unexpired
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Number of unexpired keys
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn before_op(&self) -> anyhow::Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("memory store unavailable");
        }
        Ok(())
    }

    /// Drop every expired record so keys that are never reused do not pile up
    fn evict_expired(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }

    fn expire_if_owner(&self, key: &str, token: &str, ttl: Duration) -> i64 {
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() && entry.value == token => {
                entry.expires_at = Instant::now() + ttl;
                1
            }
            _ => 0,
        }
    }

    fn delete_if_owner(&self, key: &str, token: &str) -> i64 {
        let removed = self
            .entries
            .remove_if(key, |_, entry| !entry.is_expired() && entry.value == token);
        i64::from(removed.is_some())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn acquire_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        self.before_op().await?;
        self.evict_expired();

        let acquired = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(StoreEntry::new(value, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry::new(value, ttl));
                true
            }
        };

        debug!(key = %key, acquired, "memory store set-if-absent");
        Ok(acquired)
    }

    async fn eval(
        &self,
        script: LockScript,
        keys: &[String],
        args: &[String],
    ) -> anyhow::Result<i64> {
        self.before_op().await?;

        let key = keys
            .first()
            .ok_or_else(|| anyhow::anyhow!("{} requires one key", script))?;
        let token = args
            .first()
            .ok_or_else(|| anyhow::anyhow!("{} requires a token argument", script))?;

        let reply = match script {
            LockScript::ExpireIfOwner => {
                let ttl_ms: u64 = args
                    .get(1)
                    .ok_or_else(|| anyhow::anyhow!("{} requires a ttl argument", script))?
                    .parse()?;
                self.expire_if_owner(key, token, Duration::from_millis(ttl_ms))
            }
            LockScript::DeleteIfOwner => self.delete_if_owner(key, token),
        };

        debug!(key = %key, script = %script, reply, "memory store eval");
        Ok(reply)
    }
}
