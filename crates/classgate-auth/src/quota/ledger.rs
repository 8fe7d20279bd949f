use chrono::{DateTime, Utc};
use classgate_kv::prelude::*;
use classgate_types::prelude::{Period, UserId};
use serde::Serialize;

use super::{QuotaKind, QuotaPolicy};
use crate::errors::{self, AuthError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaCheck {
    pub used: i64,
    pub limit: i64,
    pub blocked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreditReceipt {
    pub key: String,
    pub was: i64,
    pub now: i64,
    pub credited: i64,
}

/// Monthly counters per user and quota kind, keyed
/// `<prefix>:<YYYY-MM>:<user>` and expiring at the next UTC month.
///
/// Each mutation is one atomic store command plus, on the first write of
/// a period, one `EXPIREAT`. There is no transaction around the pair: a
/// crash in between leaves a counter without TTL.
#[derive(Clone)]
pub struct QuotaLedger {
    store: SharedKv,
    messages: QuotaPolicy,
    speaking: QuotaPolicy,
}

impl QuotaLedger {
    pub fn new(store: SharedKv) -> Self {
        Self {
            store,
            messages: QuotaPolicy::messages_default(),
            speaking: QuotaPolicy::speaking_default(),
        }
    }

    pub fn with_policy(mut self, kind: QuotaKind, policy: QuotaPolicy) -> Self {
        match kind {
            QuotaKind::Messages => self.messages = policy,
            QuotaKind::Speaking => self.speaking = policy,
        }
        self
    }

    pub fn policy(&self, kind: QuotaKind) -> &QuotaPolicy {
        match kind {
            QuotaKind::Messages => &self.messages,
            QuotaKind::Speaking => &self.speaking,
        }
    }

    pub fn key(&self, kind: QuotaKind, user: &UserId, period: Period) -> String {
        format!("{}:{}:{}", self.policy(kind).prefix, period.label(), user)
    }

    pub async fn check_and_increment(
        &self,
        kind: QuotaKind,
        user: &UserId,
        amount: i64,
    ) -> Result<QuotaCheck, AuthError> {
        self.check_and_increment_at(kind, user, amount, Utc::now()).await
    }

    pub async fn check_and_increment_at(
        &self,
        kind: QuotaKind,
        user: &UserId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<QuotaCheck, AuthError> {
        if amount <= 0 {
            return Err(errors::malformed(
                "Usage amount must be positive.",
                &format!("non-positive quota amount {amount}"),
            ));
        }
        let period = Period::containing(now);
        let key = self.key(kind, user, period);
        let used = self.store.incr_by(&key, amount).await?;
        if used == amount {
            // First write of the period. A failed EXPIREAT must not turn an
            // already counted request into an error.
            if let Err(err) = self.store.expire_at(&key, period.rollover_unix()).await {
                tracing::warn!(target = "classgate::quota", key = %key, "expiry not set: {err}");
            }
        }
        let limit = self.policy(kind).limit;
        let blocked = used > limit;
        if blocked {
            tracing::info!(
                target = "classgate::quota",
                kind = kind.as_str(),
                user = %user,
                used,
                limit,
                "quota exceeded"
            );
        }
        Ok(QuotaCheck {
            used,
            limit,
            blocked,
        })
    }

    pub async fn usage(&self, kind: QuotaKind, user: &UserId) -> Result<QuotaUsage, AuthError> {
        self.usage_at(kind, user, Utc::now()).await
    }

    pub async fn usage_at(
        &self,
        kind: QuotaKind,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<QuotaUsage, AuthError> {
        let key = self.key(kind, user, Period::containing(now));
        let used = self
            .store
            .get(&key)
            .await?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .max(0);
        let limit = self.policy(kind).limit;
        Ok(QuotaUsage {
            used,
            limit,
            remaining: (limit - used).max(0),
        })
    }

    pub async fn credit(
        &self,
        kind: QuotaKind,
        user: &UserId,
        amount: i64,
    ) -> Result<CreditReceipt, AuthError> {
        self.credit_at(kind, user, amount, Utc::now()).await
    }

    /// Lowers this month's usage by `amount`, floored at zero, and makes
    /// sure the counter carries the month-end expiry.
    ///
    /// The floor is a separate `SET 0` after the `INCRBY`; an increment
    /// landing between the two is overwritten.
    pub async fn credit_at(
        &self,
        kind: QuotaKind,
        user: &UserId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<CreditReceipt, AuthError> {
        if amount <= 0 {
            return Err(errors::malformed(
                "amount must be a number greater than zero.",
                &format!("non-positive credit amount {amount}"),
            ));
        }
        let period = Period::containing(now);
        let key = self.key(kind, user, period);
        let after = self.store.incr_by(&key, -amount).await?;
        if after < 0 {
            self.store.set(&key, "0").await?;
        }
        if self.store.ttl(&key).await?.needs_expiry() {
            self.store.expire_at(&key, period.rollover_unix()).await?;
        }
        let receipt = CreditReceipt {
            key,
            was: after + amount,
            now: after.max(0),
            credited: amount,
        };
        tracing::info!(
            target = "classgate::quota",
            kind = kind.as_str(),
            user = %user,
            was = receipt.was,
            now = receipt.now,
            "usage credited"
        );
        Ok(receipt)
    }
}

/// Seconds charged for one speaking submission: the reported duration
/// rounded, at least one; otherwise estimated from the payload size.
pub fn speaking_amount(
    duration_secs: Option<f64>,
    audio_bytes: usize,
    bytes_per_second: u64,
) -> i64 {
    match duration_secs.filter(|d| d.is_finite() && *d > 0.0) {
        Some(duration) => (duration.round() as i64).max(1),
        None => {
            let rate = bytes_per_second.max(1);
            ((audio_bytes as u64).div_ceil(rate) as i64).max(1)
        }
    }
}
