//! End-to-end scenarios from spec.md §8, run against the real local
//! topology (actual `FileStorageEngine`s on disk, not fakes).

use peacedb_core::{Document, Value};
use peacedb_service::{ReplicatedDocumentService, ReplicationConfig, ShardingConfig, Topology};
use std::collections::BTreeMap;

fn doc(id: &str, n: i64) -> Document {
    let mut data = BTreeMap::new();
    data.insert("n".to_string(), Value::Int(n));
    Document { id: id.to_string(), rev: None, deleted: false, data, tags: vec![], content: None }
}

fn service(dir: &std::path::Path, shard_count: u32) -> ReplicatedDocumentService {
    let sharding = ShardingConfig { shard_count, ..ShardingConfig::default() };
    let replication = ReplicationConfig::default();
    let topology = Topology::build_local(dir, &sharding, &replication).unwrap();
    ReplicatedDocumentService::new(topology.router, topology.coordinator, 1)
}

/// Scenario 1: revisioned update conflict.
#[tokio::test]
async fn revisioned_update_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path(), 1);
    svc.create_db("app").await.unwrap();

    let created = svc.post("app", doc("x", 1)).await.unwrap();
    let r1 = created.rev.clone().unwrap();

    let mut stale = doc("x", 2);
    stale.id = "x".to_string();
    stale.rev = Some("1-bogus".to_string());
    assert!(svc.put("app", stale).await.is_err());

    let still_there = svc.get("app", "x", None).await.unwrap().unwrap();
    assert_eq!(still_there.rev, Some(r1.clone()));
    assert_eq!(still_there.data.get("n"), Some(&Value::Int(1)));

    let mut update = doc("x", 2);
    update.rev = Some(r1.clone());
    let updated = svc.put("app", update).await.unwrap();
    assert_ne!(updated.rev, Some(r1));
    let fetched = svc.get("app", "x", None).await.unwrap().unwrap();
    assert_eq!(fetched.data.get("n"), Some(&Value::Int(2)));
}

/// Scenario 2 (adapted): mutations survive a process restart against the
/// same data directory (WAL replay on reopen).
#[tokio::test]
async fn mutations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let svc = service(dir.path(), 1);
        svc.create_db("t").await.unwrap();
        svc.post("t", doc("a", 1)).await.unwrap();
        let b = svc.post("t", doc("b", 2)).await.unwrap();
        svc.delete("t", "b", b.rev.as_deref().unwrap()).await.unwrap();
    }
    {
        let svc = service(dir.path(), 1);
        let alive = svc.all_docs("t", 0, 10, false).await.unwrap();
        assert_eq!(alive.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
        assert!(svc.seq("t").await.unwrap() >= 3);
    }
}

/// Scenario 5: scatter-gather pagination stability across real shards.
#[tokio::test]
async fn scatter_gather_pagination_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path(), 3);
    svc.create_db("app").await.unwrap();
    for i in 0..30 {
        svc.post("app", doc(&format!("k{i:02}"), i)).await.unwrap();
    }
    let page = svc.all_docs("app", 10, 10, false).await.unwrap();
    let ids: Vec<String> = page.iter().map(|d| d.id.clone()).collect();
    let expected: Vec<String> = (10..20).map(|i| format!("k{i:02}")).collect();
    assert_eq!(ids, expected);
}

/// Scenario 6: full-text AND semantics.
#[tokio::test]
async fn full_text_search_uses_and_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path(), 1);
    svc.create_db("app").await.unwrap();

    let mut d1 = doc("d1", 0);
    d1.content = Some("engines store documents. Full-text indexing helps finding words quickly.".to_string());
    svc.post("app", d1).await.unwrap();

    assert!(svc.full_text_search("app", "full text indexing databases", 0, 10).await.unwrap().is_empty());
    let hits = svc.full_text_search("app", "full text indexing", 0, 10).await.unwrap();
    assert_eq!(hits.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["d1"]);
    assert!(svc.full_text_search("app", "databases", 0, 10).await.unwrap().is_empty());
}
