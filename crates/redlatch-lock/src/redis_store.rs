// Redis store adapter
// Implements the store contract with SET NX PX and EVAL of the owner-checked scripts

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, IntoConnectionInfo, Script};
use redlatch_common::{LockError, LockResult};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::store::{LockScript, LockStore, ttl_millis};

/// Connection settings for one Redis node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisNodeConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,

    /// Password, overriding any password in the URL
    #[serde(default)]
    pub password: Option<String>,
}

impl RedisNodeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Redis-backed lock store.
///
/// The client is built without network I/O; one multiplexed connection is
/// opened on first use and shared by every operation afterwards.
pub struct RedisStore {
    client: Client,
    conn: OnceCell<MultiplexedConnection>,
    expire_script: Script,
    delete_script: Script,
}

impl RedisStore {
    pub fn open(node: &RedisNodeConfig) -> LockResult<Self> {
        let mut info = node
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| LockError::Config(format!("invalid redis url {}: {}", node.url, e)))?;
        if let Some(password) = &node.password {
            info.redis.password = Some(password.clone());
        }

        let client = Client::open(info)
            .map_err(|e| LockError::Config(format!("invalid redis node {}: {}", node.url, e)))?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            expire_script: Script::new(LockScript::ExpireIfOwner.source()),
            delete_script: Script::new(LockScript::DeleteIfOwner.source()),
        })
    }

    async fn connection(&self) -> anyhow::Result<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl LockStore for RedisStore {
    async fn acquire_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, reply = ?reply, "redis SET NX");
        Ok(reply.is_some())
    }

    async fn eval(
        &self,
        script: LockScript,
        keys: &[String],
        args: &[String],
    ) -> anyhow::Result<i64> {
        let source = match script {
            LockScript::ExpireIfOwner => &self.expire_script,
            LockScript::DeleteIfOwner => &self.delete_script,
        };

        let mut invocation = source.prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }

        let mut conn = self.connection().await?;
        let reply: i64 = invocation.invoke_async(&mut conn).await?;

        debug!(script = %script, reply, "redis EVAL");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_does_not_connect() {
        let node = RedisNodeConfig::new("redis://127.0.0.1:1/0").with_password("secret");
        assert!(RedisStore::open(&node).is_ok());
    }

    #[test]
    fn test_open_rejects_bad_url() {
        let node = RedisNodeConfig::new("not a url");
        let err = RedisStore::open(&node).err().unwrap();
        assert!(matches!(err, LockError::Config(_)));
    }
}
