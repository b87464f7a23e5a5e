use fgr_reconcile::*;
use std::collections::BTreeSet;

fn uids(v: &[&str]) -> Vec<Uid> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn seed_strategies_select_their_sources() {
    let edges = uids(&["U2", "U1", "U2"]);
    let registry = uids(&["U3", "U1"]);

    let e = seed_candidates(SeedStrategy::Edges, edges.clone(), registry.clone());
    assert_eq!(e.into_iter().collect::<Vec<_>>(), uids(&["U1", "U2"]));

    let r = seed_candidates(SeedStrategy::Registry, edges.clone(), registry.clone());
    assert_eq!(r.into_iter().collect::<Vec<_>>(), uids(&["U1", "U3"]));

    let u = seed_candidates(SeedStrategy::Union, edges, registry);
    assert_eq!(u.into_iter().collect::<Vec<_>>(), uids(&["U1", "U2", "U3"]));
}

#[test]
fn plan_splits_missing_and_existing_disjointly() {
    let candidates: BTreeSet<Uid> = uids(&["U1", "U2", "U3", "U4"]).into_iter().collect();
    let groups = vec![
        GroupRow::new(5, "U1", "我的好友", true),
        GroupRow::new(3, "U1", "dup", true),
        GroupRow::new(6, "U2", "我的好友", true).deleted(),
        GroupRow::new(7, "U3", "work", false),
        // not a candidate: never touched
        GroupRow::new(8, "U9", "我的好友", true),
    ];

    let plan = plan_provisioning(&candidates, &groups);
    assert_eq!(plan.missing_owners, uids(&["U2", "U3", "U4"]));
    assert_eq!(plan.existing_groups, vec![3, 5]);

    let existing_owners: BTreeSet<&str> = groups
        .iter()
        .filter(|g| plan.existing_groups.contains(&g.id))
        .map(|g| g.uid.as_str())
        .collect();
    for m in &plan.missing_owners {
        assert!(!existing_owners.contains(m.as_str()));
    }
}

#[test]
fn group_versions_follow_uid_and_id_order() {
    let candidates: BTreeSet<Uid> = uids(&["U3", "U1", "U2"]).into_iter().collect();
    let groups = vec![GroupRow::new(40, "U2", "我的好友", true)];
    let plan = plan_provisioning(&candidates, &groups);

    let ins_block = VersionBlock::from_end(11, 2).unwrap();
    let inserts = group_inserts(&plan, &ins_block).unwrap();
    assert_eq!(
        inserts,
        vec![
            GroupInsert { uid: "U1".into(), version: 10 },
            GroupInsert { uid: "U3".into(), version: 11 },
        ]
    );

    let ref_block = VersionBlock::from_end(12, 1).unwrap();
    let refreshes = group_refreshes(&plan, &ref_block).unwrap();
    assert_eq!(refreshes, vec![GroupRefresh { group_id: 40, version: 12 }]);
}

#[test]
fn preview_revives_a_row_already_named_like_the_default() {
    let candidates: BTreeSet<Uid> = uids(&["U5", "U6", "U7"]).into_iter().collect();
    let groups = vec![
        GroupRow::new(7, "U5", "我的好友", true).deleted(),
        GroupRow::new(8, "U6", "我的好友", false),
        GroupRow::new(9, "U7", "work", false),
    ];

    let plan = plan_provisioning(&candidates, &groups);
    assert_eq!(plan.missing_owners, uids(&["U5", "U6", "U7"]));

    let (preview, brand_new) = preview_provisioning(&groups, "我的好友", &plan);
    assert_eq!(brand_new, uids(&["U7"]));

    let defaults = DefaultGroupIndex::build(&preview);
    assert_eq!(defaults.get("U5"), Some(7));
    assert_eq!(defaults.get("U6"), Some(8));
    assert_eq!(defaults.get("U7"), None);
    // the input is left as loaded
    assert!(!groups[0].is_active());
}
