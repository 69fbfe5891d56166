//! Redlatch Lock - mutual exclusion coordinated through a key-value store
//!
//! This crate provides:
//! - Store adapter contract and an in-memory store
//! - Redis store adapter (`redis` feature)
//! - Single-node lock with fail-fast or blocking acquisition
//! - Watchdog lease renewal for locks without an explicit TTL
//! - Quorum lock (RedLock) over independent stores
//! - Settings loading and lock metrics

pub mod lock;
pub mod memory;
pub mod metrics;
pub mod options;
pub mod redlock;
pub mod settings;
pub mod store;
mod watchdog;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use lock::NodeLock;
pub use memory::MemoryStore;
pub use options::{LockOptions, LockPolicy, RedLockOptions};
pub use redlock::RedLock;
pub use settings::{NodeSettings, Settings};
pub use store::{LockScript, LockStore};

#[cfg(feature = "redis")]
pub use redis_store::{RedisNodeConfig, RedisStore};

pub use redlatch_common::{Contention, LockError, LockResult, is_retryable};
pub use tokio_util::sync::CancellationToken;
