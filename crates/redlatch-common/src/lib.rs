//! Redlatch Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all redlatch components:
//! - Lock error taxonomy and retry classification
//! - Holder token generation
//! - Common constants

pub mod error;
pub mod token;

// Re-exports for convenience
pub use error::{Contention, LockError, LockResult, is_retryable};
pub use token::new_token;

/// Prefix prepended to every lock key written to the store
pub const LOCK_KEY_PREFIX: &str = "REDLATCH_LOCK_PREFIX_";

/// Default lease TTL in milliseconds when the caller gives none (watchdog mode)
pub const DEFAULT_LOCK_EXPIRE_MS: u64 = 10_000;

/// Default wait budget in milliseconds for blocking acquisition
pub const DEFAULT_BLOCK_WAITING_MS: u64 = 5_000;

/// Interval between acquisition attempts while blocking
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Watchdog renewal period
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 3_000;

/// Extra lease time added on each renewal to absorb network latency
pub const DEFAULT_WATCHDOG_MARGIN_MS: u64 = 3_000;

/// Per-node acquisition budget for a quorum lock
pub const DEFAULT_NODE_TIMEOUT_MS: u64 = 50;

/// Minimum number of independent nodes a quorum lock accepts
pub const MIN_QUORUM_NODES: usize = 3;
