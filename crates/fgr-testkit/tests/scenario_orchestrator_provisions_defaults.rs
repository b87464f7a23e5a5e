use fgr_alloc::MemoryAllocator;
use fgr_reconcile::{EdgeRow, GroupRow, SeedStrategy};
use fgr_runtime::{run_reconciliation, Provisioning, ReconcileOptions};
use fgr_testkit::{MemoryStore, Tables};

const NAME: &str = "我的好友";

#[tokio::test]
async fn owner_without_default_gets_one_and_its_edges_use_it() {
    // U3 has no groups at all.
    let store = MemoryStore::new(
        Tables::new()
            .group(GroupRow::new(4, "U1", NAME, true))
            .edge(EdgeRow::new(10, "U3", "U1"))
            .edge(EdgeRow::new(11, "U3", "U2")),
    );
    let alloc = MemoryAllocator::new()
        .with_value("seq:friendGroup", 41)
        .with_value("seq:friend", 7);

    let report = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(report.groups_inserted, 1);

    let t = store.tables();
    let g = t.group_named("U3", NAME).expect("default provisioned").clone();
    assert!(g.is_default);
    assert_eq!(g.is_deleted, Some(false));
    assert_eq!(g.version, Some(42));
    assert_eq!(g.id, 5);

    let e10 = t.edge_by_id(10).unwrap();
    let e11 = t.edge_by_id(11).unwrap();
    assert_eq!((e10.friend_group_id, e10.version), (Some(g.id), Some(8)));
    assert_eq!((e11.friend_group_id, e11.version), (Some(g.id), Some(9)));
}

#[tokio::test]
async fn group_versions_follow_uid_then_id_order() {
    let store = MemoryStore::new(
        Tables::new()
            .group(GroupRow::new(9, "A", NAME, true))
            .group(GroupRow::new(5, "B", NAME, true))
            // Soft-deleted default: resurrected on its (uid, name) key, not duplicated.
            .group({
                let mut g = GroupRow::new(7, "U5", NAME, false).deleted();
                g.version = Some(3);
                g
            })
            .edge(EdgeRow::new(1, "A", "x"))
            .edge(EdgeRow::new(2, "B", "x"))
            .edge(EdgeRow::new(3, "U5", "x"))
            .edge(EdgeRow::new(4, "U3", "x")),
    );
    let alloc = MemoryAllocator::new().with_value("seq:friendGroup", 41);

    let report = run_reconciliation(&store, &alloc, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(report.groups_missing, 2);
    assert_eq!(report.groups_existing, 2);

    let t = store.tables();
    // Inserts first, by uid: U3 then U5.
    assert_eq!(t.group_named("U3", NAME).unwrap().version, Some(42));
    let resurrected = t.group_named("U5", NAME).unwrap();
    assert_eq!(resurrected.id, 7);
    assert!(resurrected.is_default);
    assert_eq!(resurrected.is_deleted, Some(false));
    assert_eq!(resurrected.version, Some(43));
    assert_eq!(t.groups.iter().filter(|g| g.uid == "U5").count(), 1);

    // Refreshes next, by id: 5 then 9.
    assert_eq!(t.group_by_id(5).unwrap().version, Some(44));
    assert_eq!(t.group_by_id(9).unwrap().version, Some(45));

    assert_eq!(t.edge_by_id(3).unwrap().friend_group_id, Some(7));

    assert_eq!(
        alloc.calls(),
        vec![
            ("seq:friendGroup".to_string(), 2),
            ("seq:friendGroup".to_string(), 2),
            ("seq:friend".to_string(), 4),
        ]
    );
}

#[tokio::test]
async fn registry_seeding_covers_users_without_edges() {
    let tables = Tables::new()
        .user("R1")
        .user("R2")
        .edge(EdgeRow::new(1, "E1", "R1"));

    let store = MemoryStore::new(tables.clone());
    let alloc = MemoryAllocator::new();
    let opts = ReconcileOptions {
        provisioning: Provisioning::Seed(SeedStrategy::Registry),
        ..ReconcileOptions::default()
    };
    let report = run_reconciliation(&store, &alloc, &opts).await.unwrap();
    assert_eq!(report.groups_inserted, 2);
    assert_eq!(report.unresolved, 1, "E1 is not registered and was not seeded");
    let t = store.tables();
    assert!(t.group_named("R1", NAME).is_some());
    assert!(t.group_named("E1", NAME).is_none());

    let store = MemoryStore::new(tables);
    let opts = ReconcileOptions {
        provisioning: Provisioning::Seed(SeedStrategy::Union),
        ..ReconcileOptions::default()
    };
    let report = run_reconciliation(&store, &alloc, &opts).await.unwrap();
    assert_eq!(report.groups_inserted, 3);
    assert_eq!(report.unresolved, 0);
}

#[tokio::test]
async fn skipping_provisioning_leaves_owners_unresolved() {
    let store = MemoryStore::new(Tables::new().edge(EdgeRow::new(1, "U3", "U1")));
    let alloc = MemoryAllocator::new();
    let opts = ReconcileOptions {
        provisioning: Provisioning::Skip,
        ..ReconcileOptions::default()
    };

    let report = run_reconciliation(&store, &alloc, &opts).await.unwrap();

    assert!(report.provisioning_skipped);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.to_update, 0);
    assert!(store.tables().groups.is_empty());
    assert!(alloc.calls().is_empty());
}

#[tokio::test]
async fn custom_default_name_is_used_for_new_groups() {
    let store = MemoryStore::new(Tables::new().edge(EdgeRow::new(1, "U3", "U1")));
    let alloc = MemoryAllocator::new();
    let opts = ReconcileOptions {
        default_group_name: "Friends".to_string(),
        ..ReconcileOptions::default()
    };

    run_reconciliation(&store, &alloc, &opts).await.unwrap();
    let t = store.tables();
    assert!(t.group_named("U3", "Friends").is_some());
    assert!(t.group_named("U3", NAME).is_none());
}
