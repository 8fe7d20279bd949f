use classgate_kv::prelude::*;
use classgate_types::prelude::UserId;

use crate::decode::{decode_entry, DecodeOutcome};
use crate::entry::HistoryEntry;
use crate::errors::HistoryError;

pub const DEFAULT_PREFIX: &str = "history";
pub const DEFAULT_MAX_ENTRIES: usize = 40;

/// Per-user list under `<prefix>:<user>`, bounded to the newest
/// `max_entries` elements.
#[derive(Clone)]
pub struct HistoryLog {
    store: SharedKv,
    prefix: String,
    max_entries: usize,
}

impl HistoryLog {
    pub fn new(store: SharedKv) -> Self {
        Self {
            store,
            prefix: DEFAULT_PREFIX.into(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn key(&self, user: &UserId) -> String {
        format!("{}:{}", self.prefix, user)
    }

    /// Appends in order, then trims with tail-relative bounds so a racing
    /// append never loses the newest elements.
    pub async fn append(
        &self,
        user: &UserId,
        entries: &[HistoryEntry],
    ) -> Result<(), HistoryError> {
        if entries.is_empty() {
            return Ok(());
        }
        let encoded = entries
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| HistoryError::encode(&err.to_string()))?;
        let key = self.key(user);
        let len = self.store.rpush(&key, &encoded).await?;
        self.store.ltrim(&key, -(self.max_entries as i64), -1).await?;
        tracing::debug!(
            target = "classgate::history",
            user = %user,
            appended = entries.len(),
            len,
            "history appended"
        );
        Ok(())
    }

    /// Entries in ascending timestamp order, optionally filtered by kind,
    /// keeping the newest `limit`. Undecodable elements are skipped.
    pub async fn read(
        &self,
        user: &UserId,
        limit: Option<usize>,
        kind: Option<&str>,
    ) -> Result<Vec<HistoryEntry>, HistoryError> {
        let raw = self.store.lrange(&self.key(user), 0, -1).await?;
        let mut dropped = 0usize;
        let mut entries: Vec<HistoryEntry> = raw
            .iter()
            .filter_map(|item| match decode_entry(item) {
                DecodeOutcome::Unrecoverable(reason) => {
                    dropped += 1;
                    tracing::trace!(target = "classgate::history", reason, "entry dropped");
                    None
                }
                outcome => outcome.into_entry(),
            })
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .collect();
        if dropped > 0 {
            tracing::debug!(
                target = "classgate::history",
                user = %user,
                dropped,
                "undecodable history entries skipped"
            );
        }
        entries.sort_by_key(|entry| entry.ts);
        if let Some(limit) = limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }

    pub async fn clear(&self, user: &UserId) -> Result<bool, HistoryError> {
        Ok(self.store.del(&self.key(user)).await?)
    }
}
