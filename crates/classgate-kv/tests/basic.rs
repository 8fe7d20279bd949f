use std::sync::Arc;

use classgate_kv::prelude::*;

#[tokio::test]
async fn capped_list_keeps_newest_entries() {
    let kv: SharedKv = Arc::new(MemoryKv::new());
    for i in 0..45 {
        kv.rpush("history:u1", &[format!("entry-{i}")]).await.unwrap();
        kv.ltrim("history:u1", -40, -1).await.unwrap();
    }

    let all = kv.lrange("history:u1", 0, -1).await.unwrap();
    assert_eq!(all.len(), 40);
    assert_eq!(all.first().map(String::as_str), Some("entry-5"));
    assert_eq!(all.last().map(String::as_str), Some("entry-44"));

    let head = kv.lrange("history:u1", 0, 1).await.unwrap();
    assert_eq!(head, vec!["entry-5", "entry-6"]);
}

#[tokio::test]
async fn del_and_exists_follow_key_lifecycle() {
    let kv = MemoryKv::new();
    assert!(!kv.exists("k").await.unwrap());
    kv.rpush("k", &["a".into(), "b".into()]).await.unwrap();
    assert!(kv.exists("k").await.unwrap());
    assert!(kv.del("k").await.unwrap());
    assert!(!kv.del("k").await.unwrap());
    assert!(kv.lrange("k", 0, -1).await.unwrap().is_empty());
}

#[tokio::test]
async fn negative_increment_can_go_below_zero() {
    let kv = MemoryKv::new();
    kv.incr_by("c", 10).await.unwrap();
    assert_eq!(kv.incr_by("c", -25).await.unwrap(), -15);
    assert_eq!(kv.get("c").await.unwrap().as_deref(), Some("-15"));
}

#[tokio::test]
async fn trimming_to_nothing_removes_the_list() {
    let kv = MemoryKv::new();
    kv.rpush("l", &["x".into()]).await.unwrap();
    kv.ltrim("l", 5, 10).await.unwrap();
    assert!(!kv.exists("l").await.unwrap());
}
