use fgr_alloc::MemoryAllocator;
use fgr_reconcile::{EdgeFilter, EdgeRow, EdgeScope, GroupRow, MembershipRow};
use fgr_runtime::{run_reconciliation, Provisioning, ReconcileOptions};
use fgr_testkit::{MemoryStore, Tables};

const NAME: &str = "我的好友";

fn opts() -> ReconcileOptions {
    ReconcileOptions {
        provisioning: Provisioning::Skip,
        edge_filter: EdgeFilter::new(EdgeScope::All).excluding(["u_10000", "fileHelper"]),
        ..ReconcileOptions::default()
    }
}

#[tokio::test]
async fn membership_beats_default_and_deleted_groups_are_ignored() {
    // U1 default G1; U2 in G10 (active) and G11 (soft-deleted).
    let store = MemoryStore::new(
        Tables::new()
            .group(GroupRow::new(1, "U1", NAME, true))
            .group(GroupRow::new(10, "U1", "work", false))
            .group(GroupRow::new(11, "U1", "old", false).deleted())
            .member(MembershipRow::new(11, "U1", "U2"))
            .member(MembershipRow::new(10, "U1", "U2"))
            .edge(EdgeRow::new(100, "U1", "U2"))
            .edge(EdgeRow::new(101, "U1", "U4").in_group(0))
            .edge(EdgeRow::new(102, "U1", "u_10000")),
    );
    let alloc = MemoryAllocator::new().with_value("seq:friend", 497);

    let report = run_reconciliation(&store, &alloc, &opts()).await.unwrap();

    assert!(report.committed);
    assert_eq!(report.to_update, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(report.edges_filtered_out, 1);

    let t = store.tables();
    let e100 = t.edge_by_id(100).unwrap();
    let e101 = t.edge_by_id(101).unwrap();
    assert_eq!((e100.friend_group_id, e100.version), (Some(10), Some(498)));
    assert_eq!((e101.friend_group_id, e101.version), (Some(1), Some(499)));

    // System counterpart untouched.
    assert_eq!(t.edge_by_id(102).unwrap(), &EdgeRow::new(102, "U1", "u_10000"));

    assert_eq!(alloc.calls(), vec![("seq:friend".to_string(), 2)]);
}

#[tokio::test]
async fn lowest_active_membership_group_wins() {
    let store = MemoryStore::new(
        Tables::new()
            .group(GroupRow::new(1, "U1", NAME, true))
            .group(GroupRow::new(30, "U1", "c", false))
            .group(GroupRow::new(20, "U1", "b", false))
            .member(MembershipRow::new(30, "U1", "U2"))
            .member(MembershipRow::new(20, "U1", "U2"))
            .edge(EdgeRow::new(1, "U1", "U2").in_group(30)),
    );
    let alloc = MemoryAllocator::new();

    run_reconciliation(&store, &alloc, &opts()).await.unwrap();
    assert_eq!(store.tables().edge_by_id(1).unwrap().friend_group_id, Some(20));
}

#[tokio::test]
async fn owner_without_default_or_membership_is_left_alone() {
    let store = MemoryStore::new(
        Tables::new()
            .group(GroupRow::new(1, "U1", NAME, true))
            .edge(EdgeRow::new(1, "U1", "U2"))
            .edge(EdgeRow::new(2, "U9", "U2").in_group(77)),
    );
    let alloc = MemoryAllocator::new();

    let report = run_reconciliation(&store, &alloc, &opts()).await.unwrap();

    assert_eq!(report.unresolved, 1);
    assert_eq!(report.updated, 1);
    let e2 = store.tables().edge_by_id(2).unwrap().clone();
    assert_eq!((e2.friend_group_id, e2.version), (Some(77), None));
}

#[tokio::test]
async fn deleted_membership_falls_back_to_default() {
    let store = MemoryStore::new(
        Tables::new()
            .group(GroupRow::new(1, "U1", NAME, true))
            .group(GroupRow::new(10, "U1", "work", false))
            .member(MembershipRow::new(10, "U1", "U2").deleted())
            .edge(EdgeRow::new(1, "U1", "U2").in_group(10)),
    );
    let alloc = MemoryAllocator::new();

    run_reconciliation(&store, &alloc, &opts()).await.unwrap();
    assert_eq!(store.tables().edge_by_id(1).unwrap().friend_group_id, Some(1));
}

#[tokio::test]
async fn edge_scope_narrows_the_change_set() {
    let tables = Tables::new()
        .group(GroupRow::new(1, "U1", NAME, true))
        .edge(EdgeRow::new(1, "U1", "U2"))
        .edge(EdgeRow::new(2, "U1", "U3").deleted());

    let store = MemoryStore::new(tables.clone());
    let alloc = MemoryAllocator::new();
    let only_deleted = ReconcileOptions {
        edge_filter: EdgeFilter::new(EdgeScope::DeletedOnly),
        ..opts()
    };
    let report = run_reconciliation(&store, &alloc, &only_deleted).await.unwrap();
    assert_eq!(report.updated, 1);
    let t = store.tables();
    assert_eq!(t.edge_by_id(1).unwrap().friend_group_id, None);
    assert_eq!(t.edge_by_id(2).unwrap().friend_group_id, Some(1));

    let store = MemoryStore::new(tables);
    let active_only = ReconcileOptions {
        edge_filter: EdgeFilter::new(EdgeScope::ActiveOnly),
        ..opts()
    };
    run_reconciliation(&store, &alloc, &active_only).await.unwrap();
    let t = store.tables();
    assert_eq!(t.edge_by_id(1).unwrap().friend_group_id, Some(1));
    assert_eq!(t.edge_by_id(2).unwrap().friend_group_id, None);
}
