//! Store adapter contract
//!
//! The lock core reaches the backing key-value store only through the two
//! atomic operations of [`LockStore`]. Every ownership check runs inside the
//! store; the client never splits a read-then-write across two round trips.

use std::time::Duration;

use async_trait::async_trait;

/// Deletes the key only when it still holds the caller's token.
///
/// KEYS[1]: lock key, ARGV[1]: holder token
pub const DELETE_IF_OWNER_LUA: &str = r#"
local token = redis.call('get', KEYS[1])
if (not token or token ~= ARGV[1]) then
    return 0
else
    return redis.call('del', KEYS[1])
end
"#;

/// Resets the key's expiry only when it still holds the caller's token.
///
/// KEYS[1]: lock key, ARGV[1]: holder token, ARGV[2]: new TTL in milliseconds
pub const EXPIRE_IF_OWNER_LUA: &str = r#"
local token = redis.call('get', KEYS[1])
if (not token or token ~= ARGV[1]) then
    return 0
else
    return redis.call('pexpire', KEYS[1], ARGV[2])
end
"#;

/// Server-side scripts the lock core needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScript {
    /// Extend the TTL if the current value equals the token
    ExpireIfOwner,
    /// Delete the key if the current value equals the token
    DeleteIfOwner,
}

impl LockScript {
    /// Lua body for Redis-compatible stores
    pub fn source(self) -> &'static str {
        match self {
            LockScript::ExpireIfOwner => EXPIRE_IF_OWNER_LUA,
            LockScript::DeleteIfOwner => DELETE_IF_OWNER_LUA,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LockScript::ExpireIfOwner => "expire_if_owner",
            LockScript::DeleteIfOwner => "delete_if_owner",
        }
    }
}

impl std::fmt::Display for LockScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Atomic operations a backing store must provide
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key = value` with the given TTL only if `key` does not exist.
    ///
    /// Returns `Ok(false)` when the key is already present, so callers can
    /// tell contention apart from transport failures.
    async fn acquire_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> anyhow::Result<bool>;

    /// Run an atomic server-side script and return its integer reply.
    ///
    /// Both scripts reply 1 when the caller owns the key and 0 otherwise.
    async fn eval(&self, script: LockScript, keys: &[String], args: &[String])
    -> anyhow::Result<i64>;
}

/// TTL as the millisecond argument sent to the store, never below 1ms
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sources_check_ownership() {
        for script in [LockScript::ExpireIfOwner, LockScript::DeleteIfOwner] {
            let src = script.source();
            assert!(src.contains("redis.call('get', KEYS[1])"));
            assert!(src.contains("token ~= ARGV[1]"));
            assert!(src.contains("return 0"));
        }
        assert!(LockScript::ExpireIfOwner.source().contains("pexpire"));
        assert!(LockScript::DeleteIfOwner.source().contains("'del'"));
    }

    #[test]
    fn test_ttl_millis_floor() {
        assert_eq!(ttl_millis(Duration::from_secs(6)), 6000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
    }

    #[test]
    fn test_script_display() {
        assert_eq!(LockScript::ExpireIfOwner.to_string(), "expire_if_owner");
        assert_eq!(LockScript::DeleteIfOwner.to_string(), "delete_if_owner");
    }
}
