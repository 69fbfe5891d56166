//! Error types for redlatch
//!
//! This module defines:
//! - `Contention`: the retryable "held by someone else" condition
//! - `LockError`: every failure a lock operation can surface
//! - `is_retryable`: classification used by the blocking acquire loop

use std::time::Duration;

/// Another holder currently owns the key.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("lock is acquired by others")]
pub struct Contention;

/// Lock operation errors
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error(transparent)]
    Contended(#[from] Contention),

    #[error("block waiting timed out after {waited:?}")]
    WaitTimeout {
        waited: Duration,
        #[source]
        source: Contention,
    },

    #[error("lock acquisition cancelled")]
    Cancelled,

    #[error("can not {op} without ownership of lock")]
    NotOwner { op: &'static str },

    #[error("lock failed, acquired {acquired} of {total} nodes, {required} required")]
    QuorumNotMet {
        acquired: usize,
        required: usize,
        total: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl LockError {
    /// Whether the failure means the key is held by another instance.
    ///
    /// A wait timeout still wraps contention, so it is classified as retryable
    /// even though it ends the call that produced it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contended(_) | Self::WaitTimeout { .. })
    }

    pub fn is_not_owner(&self) -> bool {
        matches!(self, Self::NotOwner { .. })
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Contended(_) => "contended",
            Self::WaitTimeout { .. } => "wait_timeout",
            Self::Cancelled => "cancelled",
            Self::NotOwner { .. } => "not_owner",
            Self::QuorumNotMet { .. } => "quorum_not_met",
            Self::Config(_) => "config",
            Self::Store(_) => "store",
        }
    }
}

/// Free-function form of [`LockError::is_retryable`]
pub fn is_retryable(err: &LockError) -> bool {
    err.is_retryable()
}

pub type LockResult<T> = Result<T, LockError>;
