use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use classgate_auth::prelude::*;
use classgate_kv::memory::Command;
use classgate_kv::prelude::*;
use classgate_types::prelude::UserId;
use parking_lot::Mutex;

fn ledger(kv: &MemoryKv, limit: i64) -> QuotaLedger {
    QuotaLedger::new(Arc::new(kv.clone())).with_policy(
        QuotaKind::Messages,
        QuotaPolicy {
            prefix: "quota".into(),
            limit,
        },
    )
}

#[tokio::test]
async fn sequential_increments_count_exactly_and_set_expiry_once() {
    let kv = MemoryKv::new();
    let ledger = ledger(&kv, 400);
    let user = UserId::new("abc");
    let mut last = None;
    for _ in 0..25 {
        last = Some(
            ledger
                .check_and_increment(QuotaKind::Messages, &user, 1)
                .await
                .unwrap(),
        );
    }
    assert_eq!(last.unwrap().used, 25);
    assert_eq!(kv.stats().count(Command::IncrBy), 25);
    assert_eq!(kv.stats().count(Command::ExpireAt), 1);
}

#[tokio::test]
async fn limit_boundary_blocks_only_above_limit() {
    let kv = MemoryKv::new();
    let ledger = ledger(&kv, 400);
    let user = UserId::new("abc");
    let key = ledger.key(QuotaKind::Messages, &user, classgate_types::prelude::Period::current());
    kv.set(&key, "399").await.unwrap();

    let at_limit = ledger
        .check_and_increment(QuotaKind::Messages, &user, 1)
        .await
        .unwrap();
    assert_eq!(at_limit, QuotaCheck { used: 400, limit: 400, blocked: false });

    let over = ledger
        .check_and_increment(QuotaKind::Messages, &user, 1)
        .await
        .unwrap();
    assert_eq!(over, QuotaCheck { used: 401, limit: 400, blocked: true });
}

/// Passes through to memory but remembers every EXPIREAT argument.
#[derive(Default)]
struct RecordingKv {
    inner: MemoryKv,
    expiries: Mutex<Vec<(String, i64)>>,
}

#[async_trait]
impl KvStore for RecordingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.inner.set(key, value).await
    }
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        self.inner.incr_by(key, delta).await
    }
    async fn expire_at(&self, key: &str, unix_seconds: i64) -> Result<bool, KvError> {
        self.expiries.lock().push((key.to_string(), unix_seconds));
        Ok(self.inner.exists(key).await?)
    }
    async fn ttl(&self, key: &str) -> Result<TtlState, KvError> {
        self.inner.ttl(key).await
    }
    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.inner.exists(key).await
    }
    async fn del(&self, key: &str) -> Result<bool, KvError> {
        self.inner.del(key).await
    }
    async fn rpush(&self, key: &str, values: &[String]) -> Result<i64, KvError> {
        self.inner.rpush(key, values).await
    }
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.inner.ltrim(key, start, stop).await
    }
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        self.inner.lrange(key, start, stop).await
    }
}

#[tokio::test]
async fn first_increment_expires_at_next_month_start() {
    let kv = Arc::new(RecordingKv::default());
    let ledger = QuotaLedger::new(kv.clone());
    let user = UserId::new("abc");
    let march = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
    for _ in 0..3 {
        ledger
            .check_and_increment_at(QuotaKind::Messages, &user, 1, march)
            .await
            .unwrap();
    }

    let april = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap().timestamp();
    assert_eq!(
        *kv.expiries.lock(),
        vec![("quota:2024-03:abc".to_string(), april)]
    );
}

#[tokio::test]
async fn first_increment_of_the_current_month_carries_rollover_ttl() {
    let kv = MemoryKv::new();
    let ledger = ledger(&kv, 400);
    let user = UserId::new("abc");
    let now = Utc::now();
    ledger
        .check_and_increment_at(QuotaKind::Speaking, &user, 30, now)
        .await
        .unwrap();

    let period = classgate_types::prelude::Period::containing(now);
    let key = format!("speaking:{}:abc", period.label());
    match kv.ttl(&key).await.unwrap() {
        TtlState::Expires(secs) => {
            let expected = period.rollover_unix() - now.timestamp();
            assert!((secs - expected).abs() <= 1, "{secs} vs {expected}");
        }
        other => panic!("expected a ttl, got {other:?}"),
    }
    assert_eq!(
        ledger.usage(QuotaKind::Speaking, &user).await.unwrap(),
        QuotaUsage { used: 30, limit: 1_200, remaining: 1_170 }
    );
}

#[tokio::test]
async fn credit_reduces_usage_and_reports_receipt() {
    let kv = MemoryKv::new();
    let ledger = ledger(&kv, 400);
    let user = UserId::new("abc");
    ledger
        .check_and_increment(QuotaKind::Messages, &user, 120)
        .await
        .unwrap();

    let receipt = ledger.credit(QuotaKind::Messages, &user, 50).await.unwrap();
    assert_eq!((receipt.was, receipt.now, receipt.credited), (120, 70, 50));
    assert_eq!(ledger.usage(QuotaKind::Messages, &user).await.unwrap().used, 70);
    assert!(matches!(kv.ttl(&receipt.key).await.unwrap(), TtlState::Expires(_)));
}

#[tokio::test]
async fn credit_floors_at_zero_and_restores_expiry() {
    let kv = MemoryKv::new();
    let ledger = ledger(&kv, 400);
    let user = UserId::new("fresh");

    let receipt = ledger.credit(QuotaKind::Messages, &user, 50).await.unwrap();
    assert_eq!((receipt.was, receipt.now), (0, 0));
    assert_eq!(kv.get(&receipt.key).await.unwrap().as_deref(), Some("0"));
    assert!(matches!(kv.ttl(&receipt.key).await.unwrap(), TtlState::Expires(_)));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let kv = MemoryKv::new();
    let ledger = ledger(&kv, 400);
    let user = UserId::new("abc");
    assert!(ledger.credit(QuotaKind::Messages, &user, 0).await.is_err());
    assert!(ledger
        .check_and_increment(QuotaKind::Messages, &user, -3)
        .await
        .is_err());
}
