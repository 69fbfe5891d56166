//! Command line arguments

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use redlatch_lock::{NodeSettings, Settings};

/// Acquire a distributed lock, hold it, then release it
#[derive(Debug, Parser)]
#[command(name = "redlatch", version)]
pub struct Cli {
    /// Lock key; stored under the redlatch key prefix
    pub key: String,

    /// Settings file (TOML, YAML or JSON)
    #[arg(short = 'c', long = "config", env = "REDLATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store endpoint, e.g. redis://127.0.0.1:6379; repeat for a quorum lock
    #[arg(short = 'n', long = "node")]
    pub nodes: Vec<String>,

    /// Password applied to every endpoint given with --node
    #[arg(long = "password", env = "REDLATCH_PASSWORD")]
    pub password: Option<String>,

    /// Wait for the lock instead of failing fast (single-node only)
    #[arg(short = 'b', long = "block")]
    pub block: bool,

    /// Blocking wait budget in milliseconds
    #[arg(long = "wait-ms")]
    pub wait_ms: Option<u64>,

    /// Lease in milliseconds; 0 lets the watchdog keep the lease alive
    #[arg(long = "expire-ms")]
    pub expire_ms: Option<u64>,

    /// Per-node timeout of a quorum lock in milliseconds
    #[arg(long = "node-timeout-ms")]
    pub node_timeout_ms: Option<u64>,

    /// Hold the lock for this many milliseconds; held until Ctrl-C otherwise
    #[arg(long = "hold-ms")]
    pub hold_ms: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Layer the arguments over settings loaded from file and environment
    pub fn apply(&self, settings: &mut Settings) {
        if !self.nodes.is_empty() {
            settings.nodes = self
                .nodes
                .iter()
                .map(|url| NodeSettings {
                    url: url.clone(),
                    password: self.password.clone(),
                })
                .collect();
        }
        if self.block {
            settings.lock.blocking = true;
        }
        if let Some(ms) = self.wait_ms {
            settings.lock.block_waiting_ms = ms;
        }
        if let Some(ms) = self.expire_ms {
            settings.lock.expire_ms = ms;
            settings.redlock.expire_ms = ms;
        }
        if let Some(ms) = self.node_timeout_ms {
            settings.redlock.node_timeout_ms = ms;
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }

    pub fn hold(&self) -> Option<Duration> {
        self.hold_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["redlatch", "orders"]).unwrap();
        assert_eq!(cli.key, "orders");
        assert!(cli.nodes.is_empty());
        assert!(!cli.block);
        assert_eq!(cli.hold(), None);
    }

    #[test]
    fn test_key_is_required() {
        assert!(Cli::try_parse_from(["redlatch"]).is_err());
    }

    #[test]
    fn test_apply_overrides_settings() {
        let cli = Cli::try_parse_from([
            "redlatch",
            "orders",
            "-n",
            "redis://10.0.0.1:6379",
            "-n",
            "redis://10.0.0.2:6379",
            "-n",
            "redis://10.0.0.3:6379",
            "--password",
            "secret",
            "--block",
            "--wait-ms",
            "2000",
            "--expire-ms",
            "3000",
            "--node-timeout-ms",
            "20",
            "--hold-ms",
            "1500",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let mut settings = Settings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.nodes.len(), 3);
        assert!(
            settings
                .nodes
                .iter()
                .all(|node| node.password.as_deref() == Some("secret"))
        );
        assert!(settings.lock.blocking);
        assert_eq!(settings.lock.block_waiting_ms, 2000);
        assert_eq!(settings.lock.expire_ms, 3000);
        assert_eq!(settings.redlock.expire_ms, 3000);
        assert_eq!(settings.redlock.node_timeout_ms, 20);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(cli.hold(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_apply_keeps_file_values_when_unset() {
        let cli = Cli::try_parse_from(["redlatch", "orders"]).unwrap();
        let mut settings = Settings::default();
        settings.nodes.push(NodeSettings {
            url: "redis://127.0.0.1:6379".to_string(),
            password: None,
        });
        settings.lock.expire_ms = 4000;

        cli.apply(&mut settings);
        assert_eq!(settings.nodes.len(), 1);
        assert_eq!(settings.lock.expire_ms, 4000);
        assert_eq!(settings.log_level, "info");
    }
}
