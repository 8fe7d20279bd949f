use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::KvError;

/// Expiry state of a key, mirroring Redis `TTL` (-2 / -1 / seconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtlState {
    Missing,
    Persistent,
    Expires(i64),
}

impl TtlState {
    pub fn from_redis(raw: i64) -> Self {
        match raw {
            -2 => TtlState::Missing,
            -1 => TtlState::Persistent,
            secs => TtlState::Expires(secs),
        }
    }

    pub fn needs_expiry(&self) -> bool {
        !matches!(self, TtlState::Expires(_))
    }
}

/// Primitive operations of the shared ledger. Every call is a single atomic
/// command on the remote side; callers compose them without transactions.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Overwrites the value and clears any expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        self.incr_by(key, 1).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError>;

    /// Returns `false` when the key does not exist.
    async fn expire_at(&self, key: &str, unix_seconds: i64) -> Result<bool, KvError>;

    async fn ttl(&self, key: &str) -> Result<TtlState, KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    async fn del(&self, key: &str) -> Result<bool, KvError>;

    /// Appends in order and returns the new list length.
    async fn rpush(&self, key: &str, values: &[String]) -> Result<i64, KvError>;

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError>;

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError>;
}

pub type SharedKv = Arc<dyn KvStore>;

/// Resolves Redis-style inclusive, possibly negative, bounds against a list length.
pub fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tail_relative_bounds() {
        assert_eq!(resolve_range(10, -3, -1), Some((7, 9)));
        assert_eq!(resolve_range(2, -40, -1), Some((0, 1)));
        assert_eq!(resolve_range(5, 0, 99), Some((0, 4)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(5, 7, 9), None);
    }

    #[test]
    fn ttl_state_from_redis_codes() {
        assert_eq!(TtlState::from_redis(-2), TtlState::Missing);
        assert_eq!(TtlState::from_redis(-1), TtlState::Persistent);
        assert_eq!(TtlState::from_redis(30), TtlState::Expires(30));
        assert!(TtlState::Missing.needs_expiry());
        assert!(TtlState::Persistent.needs_expiry());
        assert!(!TtlState::Expires(1).needs_expiry());
    }
}
