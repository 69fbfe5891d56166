//! Lock selection and the acquire/hold/release cycle
//!
//! One node gives a single-node lock; three or more give a quorum lock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use redlatch_lock::{
    CancellationToken, LockResult, LockStore, NodeLock, RedLock, RedisNodeConfig, RedisStore,
    Settings,
};
use tracing::info;

enum Kind {
    Single(NodeLock),
    Quorum(RedLock),
}

/// A lock built from settings, either single-node or quorum
pub struct Latch {
    key: String,
    kind: Kind,
}

impl Latch {
    /// Build a lock over already opened stores
    pub fn build(
        key: &str,
        mut stores: Vec<Arc<dyn LockStore>>,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        let kind = match stores.len() {
            0 => bail!("no store nodes configured, pass --node or set nodes in the settings file"),
            1 => Kind::Single(NodeLock::new(
                key,
                stores.remove(0),
                settings.lock.clone(),
            )),
            _ => Kind::Quorum(RedLock::new(key, stores, settings.redlock.clone())?),
        };

        Ok(Self {
            key: key.to_string(),
            kind,
        })
    }

    /// Open a Redis store per configured node and build the lock
    pub fn from_settings(key: &str, settings: &Settings) -> anyhow::Result<Self> {
        let stores = settings
            .nodes
            .iter()
            .map(|node| {
                RedisStore::open(&RedisNodeConfig::from(node))
                    .map(|store| Arc::new(store) as Arc<dyn LockStore>)
                    .with_context(|| format!("invalid node {}", node.url))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::build(key, stores, settings)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_quorum(&self) -> bool {
        matches!(self.kind, Kind::Quorum(_))
    }

    pub async fn lock(&self, cancel: &CancellationToken) -> LockResult<()> {
        match &self.kind {
            Kind::Single(lock) => lock.lock(cancel).await,
            Kind::Quorum(lock) => lock.lock(cancel).await,
        }
    }

    pub async fn unlock(&self, cancel: &CancellationToken) -> LockResult<()> {
        match &self.kind {
            Kind::Single(lock) => lock.unlock(cancel).await,
            Kind::Quorum(lock) => lock.unlock(cancel).await,
        }
    }
}

/// Acquire, hold for `hold` (or until `cancel` fires), then release.
///
/// The release runs under its own token so an interrupt still frees the lock.
pub async fn run(
    latch: &Latch,
    cancel: &CancellationToken,
    hold: Option<Duration>,
) -> anyhow::Result<()> {
    latch
        .lock(cancel)
        .await
        .with_context(|| format!("failed to acquire lock {}", latch.key()))?;
    info!(key = %latch.key(), quorum = latch.is_quorum(), "Lock held");

    match hold {
        Some(hold) => {
            tokio::select! {
                _ = tokio::time::sleep(hold) => {}
                _ = cancel.cancelled() => info!(key = %latch.key(), "Interrupted, releasing"),
            }
        }
        None => cancel.cancelled().await,
    }

    latch
        .unlock(&CancellationToken::new())
        .await
        .with_context(|| format!("failed to release lock {}", latch.key()))?;
    info!(key = %latch.key(), "Lock released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use redlatch_lock::{LockError, MemoryStore};

    use super::*;

    fn stores(nodes: &[MemoryStore]) -> Vec<Arc<dyn LockStore>> {
        nodes
            .iter()
            .map(|node| Arc::new(node.clone()) as Arc<dyn LockStore>)
            .collect()
    }

    #[test]
    fn test_build_selects_lock_kind() {
        let settings = Settings::default();

        assert!(Latch::build("k", Vec::new(), &settings).is_err());

        let single = Latch::build("k", stores(&[MemoryStore::new()]), &settings).unwrap();
        assert!(!single.is_quorum());

        let nodes: Vec<_> = (0..3).map(|_| MemoryStore::new()).collect();
        let quorum = Latch::build("k", stores(&nodes), &settings).unwrap();
        assert!(quorum.is_quorum());
        assert_eq!(quorum.key(), "k");
    }

    #[test]
    fn test_build_rejects_two_nodes() {
        let nodes: Vec<_> = (0..2).map(|_| MemoryStore::new()).collect();
        let err = Latch::build("k", stores(&nodes), &Settings::default())
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<LockError>(),
            Some(LockError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_holds_then_releases() {
        let node = MemoryStore::new();
        let latch = Latch::build("held", stores(&[node.clone()]), &Settings::default()).unwrap();
        let cancel = CancellationToken::new();

        let observer = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            node.len()
        };
        let (result, held) = tokio::join!(
            run(&latch, &cancel, Some(Duration::from_secs(2))),
            observer
        );

        result.unwrap();
        assert_eq!(held, 1);
        assert!(node.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_releases_on_interrupt() {
        let nodes: Vec<_> = (0..3).map(|_| MemoryStore::new()).collect();
        let latch = Latch::build("interrupted", stores(&nodes), &Settings::default()).unwrap();
        let cancel = CancellationToken::new();

        let interrupt = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(run(&latch, &cancel, None), interrupt);

        result.unwrap();
        assert!(nodes.iter().all(MemoryStore::is_empty));
    }

    #[tokio::test]
    async fn test_run_fails_when_held_elsewhere() {
        let node = MemoryStore::new();
        let settings = Settings::default();
        let holder = Latch::build("busy", stores(&[node.clone()]), &settings).unwrap();
        let cancel = CancellationToken::new();
        holder.lock(&cancel).await.unwrap();

        let latch = Latch::build("busy", stores(&[node.clone()]), &settings).unwrap();
        let err = run(&latch, &cancel, Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LockError>(),
            Some(LockError::Contended(_))
        ));

        holder.unlock(&cancel).await.unwrap();
    }
}
