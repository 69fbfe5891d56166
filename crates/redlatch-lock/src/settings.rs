//! Settings loading
//!
//! Settings are layered like the rest of the stack: an optional file first,
//! then `REDLATCH__*` environment variables (`__` separates nesting, e.g.
//! `REDLATCH__LOCK__EXPIRE_MS=2000`).

use std::path::Path;

use config::{Config, Environment, File};
use redlatch_common::{LockError, LockResult, MIN_QUORUM_NODES};
use serde::{Deserialize, Serialize};

use crate::options::{LockOptions, RedLockOptions};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "REDLATCH";

/// Connection settings for one store node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub url: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[cfg(feature = "redis")]
impl From<&NodeSettings> for crate::redis_store::RedisNodeConfig {
    fn from(node: &NodeSettings) -> Self {
        Self {
            url: node.url.clone(),
            password: node.password.clone(),
        }
    }
}

/// Everything needed to build locks from configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Options for single-node locks
    pub lock: LockOptions,
    /// Options for quorum locks
    pub redlock: RedLockOptions,
    /// Store nodes; one means a single-node lock, three or more a quorum lock
    pub nodes: Vec<NodeSettings>,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lock: LockOptions::default(),
            redlock: RedLockOptions::default(),
            nodes: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus environment overrides.
    ///
    /// A missing `path` is not an error; defaults apply.
    pub fn load(path: Option<&Path>) -> LockResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| LockError::Config(e.to_string()))
    }

    /// Whether the configured nodes call for a quorum lock (three or more)
    pub fn is_quorum(&self) -> bool {
        self.nodes.len() >= MIN_QUORUM_NODES
    }
}
