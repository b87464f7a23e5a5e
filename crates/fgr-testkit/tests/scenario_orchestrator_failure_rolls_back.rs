use fgr_alloc::MemoryAllocator;
use fgr_reconcile::{EdgeRow, GroupRow};
use fgr_runtime::{run_reconciliation, ApplyMismatch, ApplyTarget, ReconcileOptions};
use fgr_testkit::{FailPoint, MemoryStore, Tables};
use std::time::Duration;

fn fixture() -> Tables {
    Tables::new()
        .group(GroupRow::new(1, "A", "我的好友", true))
        .edge(EdgeRow::new(1, "A", "B"))
        .edge(EdgeRow::new(2, "A", "C"))
        .edge(EdgeRow::new(3, "D", "A"))
}

#[tokio::test]
async fn failure_during_apply_discards_group_provisioning_too() {
    let store = MemoryStore::new(fixture());
    store.fail_at(Some(FailPoint::ApplyEdges));
    let alloc = MemoryAllocator::new();
    let before = store.tables();

    let err = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("phase=apply"));
    assert_eq!(store.tables(), before);
    assert_eq!(store.commits(), 0);
    assert_eq!(store.rollbacks(), 1);
    // Reserved versions are burned, never handed out again.
    assert_eq!(alloc.value("seq:friend"), 3);
}

#[tokio::test]
async fn failure_at_commit_leaves_committed_state_alone() {
    let store = MemoryStore::new(fixture());
    store.fail_at(Some(FailPoint::Commit));
    let alloc = MemoryAllocator::new();
    let before = store.tables();

    let err = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("phase=commit"));
    assert_eq!(store.tables(), before);
    assert_eq!(store.commits(), 0);
}

#[tokio::test]
async fn failure_while_loading_edges_reserves_no_edge_versions() {
    let store = MemoryStore::new(fixture());
    store.fail_at(Some(FailPoint::LoadEdges));
    let alloc = MemoryAllocator::new();

    let err = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("phase=snapshot_build"));
    assert_eq!(alloc.value("seq:friend"), 0);
    assert_eq!(store.rollbacks(), 1);
}

#[tokio::test]
async fn allocator_outage_fails_the_run() {
    let store = MemoryStore::new(fixture());
    let alloc = MemoryAllocator::new();
    alloc.set_unreachable(true);
    let before = store.tables();

    let err = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("memory allocator unreachable"));
    assert_eq!(store.tables(), before);
    assert_eq!(store.rollbacks(), 1);
    assert!(alloc.calls().is_empty());
}

#[tokio::test]
async fn concurrent_edge_change_is_an_apply_mismatch() {
    let store = MemoryStore::new(fixture());
    store.interfere_with(Some(2));
    let alloc = MemoryAllocator::new();
    let before = store.tables();

    let err = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap_err();

    let mismatch = err
        .chain()
        .find_map(|c| c.downcast_ref::<ApplyMismatch>())
        .expect("apply mismatch in chain");
    assert_eq!(mismatch.target, ApplyTarget::EdgeUpdate);
    assert_eq!((mismatch.reserved, mismatch.affected), (3, 2));
    assert_eq!(store.tables(), before);
}

#[tokio::test]
async fn failure_to_begin_touches_nothing() {
    let store = MemoryStore::new(fixture());
    store.fail_at(Some(FailPoint::Begin));
    let alloc = MemoryAllocator::new();

    let err = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("phase=begin"));
    assert_eq!(store.rollbacks(), 0);
    assert!(alloc.calls().is_empty());
}

#[tokio::test]
async fn lock_wait_is_passed_to_the_unit_of_work() {
    let store = MemoryStore::new(fixture());
    let alloc = MemoryAllocator::new();
    let opts = ReconcileOptions {
        lock_wait: Some(Duration::from_secs(60)),
        ..ReconcileOptions::default()
    };

    run_reconciliation(&store, &alloc, &opts).await.unwrap();
    assert_eq!(store.lock_waits(), vec![Some(Duration::from_secs(60))]);
}
