use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::errors::KvError;
use crate::store::{resolve_range, KvStore, TtlState};

#[derive(Clone, Debug)]
enum Slot {
    Text(String),
    List(Vec<String>),
}

#[derive(Clone, Debug)]
struct Entry {
    slot: Slot,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// Process-local store with Redis command semantics. Expiry is evaluated
/// lazily on access against the wall clock.
#[derive(Clone, Default)]
pub struct MemoryKv {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    stats: CommandStats,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CommandStats {
        &self.stats
    }

    fn with_live<R>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> R {
        let now = Utc::now().timestamp();
        let mut guard = self.inner.lock();
        if guard.get(key).map(|e| !e.is_live(now)).unwrap_or(false) {
            guard.remove(key);
        }
        f(&mut guard)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.stats.record(Command::Get);
        self.with_live(key, |map| match map.get(key) {
            None => Ok(None),
            Some(Entry {
                slot: Slot::Text(v),
                ..
            }) => Ok(Some(v.clone())),
            Some(_) => Err(KvError::wrong_type(key, "GET against a list")),
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.stats.record(Command::Set);
        self.with_live(key, |map| {
            map.insert(
                key.to_string(),
                Entry {
                    slot: Slot::Text(value.to_string()),
                    expires_at: None,
                },
            );
        });
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        self.stats.record(Command::IncrBy);
        self.with_live(key, |map| {
            let entry = map.entry(key.to_string()).or_insert(Entry {
                slot: Slot::Text("0".into()),
                expires_at: None,
            });
            let current = match &entry.slot {
                Slot::Text(v) => v
                    .parse::<i64>()
                    .map_err(|_| KvError::wrong_type(key, "value is not an integer"))?,
                Slot::List(_) => return Err(KvError::wrong_type(key, "INCRBY against a list")),
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| KvError::wrong_type(key, "increment would overflow"))?;
            entry.slot = Slot::Text(next.to_string());
            Ok(next)
        })
    }

    async fn expire_at(&self, key: &str, unix_seconds: i64) -> Result<bool, KvError> {
        self.stats.record(Command::ExpireAt);
        let now = Utc::now().timestamp();
        self.with_live(key, |map| {
            let Some(entry) = map.get_mut(key) else {
                return Ok(false);
            };
            if unix_seconds <= now {
                map.remove(key);
            } else {
                entry.expires_at = Some(unix_seconds);
            }
            Ok(true)
        })
    }

    async fn ttl(&self, key: &str) -> Result<TtlState, KvError> {
        self.stats.record(Command::Ttl);
        let now = Utc::now().timestamp();
        self.with_live(key, |map| {
            Ok(match map.get(key) {
                None => TtlState::Missing,
                Some(Entry {
                    expires_at: None, ..
                }) => TtlState::Persistent,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => TtlState::Expires(at - now),
            })
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.stats.record(Command::Exists);
        self.with_live(key, |map| Ok(map.contains_key(key)))
    }

    async fn del(&self, key: &str) -> Result<bool, KvError> {
        self.stats.record(Command::Del);
        self.with_live(key, |map| Ok(map.remove(key).is_some()))
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<i64, KvError> {
        self.stats.record(Command::RPush);
        self.with_live(key, |map| {
            let entry = map.entry(key.to_string()).or_insert(Entry {
                slot: Slot::List(Vec::new()),
                expires_at: None,
            });
            match &mut entry.slot {
                Slot::List(items) => {
                    items.extend(values.iter().cloned());
                    Ok(items.len() as i64)
                }
                Slot::Text(_) => Err(KvError::wrong_type(key, "RPUSH against a string")),
            }
        })
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.stats.record(Command::LTrim);
        self.with_live(key, |map| {
            let emptied = match map.get_mut(key) {
                None => return Ok(()),
                Some(Entry {
                    slot: Slot::List(items),
                    ..
                }) => match resolve_range(items.len(), start, stop) {
                    Some((from, to)) => {
                        *items = items[from..=to].to_vec();
                        false
                    }
                    None => true,
                },
                Some(_) => return Err(KvError::wrong_type(key, "LTRIM against a string")),
            };
            if emptied {
                map.remove(key);
            }
            Ok(())
        })
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        self.stats.record(Command::LRange);
        self.with_live(key, |map| match map.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                slot: Slot::List(items),
                ..
            }) => Ok(resolve_range(items.len(), start, stop)
                .map(|(from, to)| items[from..=to].to_vec())
                .unwrap_or_default()),
            Some(_) => Err(KvError::wrong_type(key, "LRANGE against a string")),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Get,
    Set,
    IncrBy,
    ExpireAt,
    Ttl,
    Exists,
    Del,
    RPush,
    LTrim,
    LRange,
}

const COMMANDS: usize = 10;

/// Per-command call counters, used to assert how many round trips an
/// operation costs.
#[derive(Clone, Default)]
pub struct CommandStats {
    inner: Arc<[AtomicU64; COMMANDS]>,
}

impl CommandStats {
    fn record(&self, command: Command) {
        self.inner[command as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, command: Command) -> u64 {
        self.inner[command as usize].load(Ordering::Relaxed)
    }
}
