//! Behavioral properties of the membership engine.

use cohort_core::validate::validate_slug;
use cohort_core::{Clock, CoreError, ErrorKind, MembershipPatch, Operation, RolloutOracle, UserId, YearMonth};
use cohort_testkit::prelude::*;
use proptest::prelude::*;

fn history_ops(store: &TestStore, user: i64) -> Vec<(String, Operation)> {
    store
        .db()
        .begin_read()
        .history_of(UserId::new(user), YearMonth::parse("2023-08").unwrap())
        .into_iter()
        .map(|entry| (entry.slug.into_string(), entry.operation))
        .collect()
}

#[test]
fn failed_delete_leaves_no_partial_add() {
    let store = TestStore::memory();

    let err = store
        .patch_membership(MembershipPatch::new(UserId::new(1)).add("a").delete("missing"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(
        err,
        CoreError::Step {
            operation: "delete",
            ref slug,
            ..
        } if slug == "missing"
    ));
    assert!(!store.get_user_segments(UserId::new(1)).contains(&"a".to_string()));
    assert!(history_ops(&store, 1).is_empty());
}

#[test]
fn first_failing_add_stops_the_batch() {
    let store = TestStore::memory();
    store
        .patch_membership(MembershipPatch::new(UserId::new(1)).add("b"))
        .unwrap();

    let err = store
        .patch_membership(MembershipPatch::new(UserId::new(1)).add("a").add("b").add("c"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("segment to add 'b'"), "{err}");
    assert_eq!(store.get_user_segments(UserId::new(1)), vec!["b"]);
}

#[test]
fn rollout_segments_join_only_for_bucketed_users() {
    let oracle = RolloutOracle::new();
    let user = (1..10_000)
        .map(UserId::new)
        .find(|user| !oracle.decide("c", *user, 50))
        .unwrap();
    let lucky = (1..10_000)
        .map(UserId::new)
        .find(|user| oracle.decide("c", *user, 50))
        .unwrap();

    let store = TestStore::memory();
    store.create_segment("c", Some(50)).unwrap();
    for u in [user, lucky] {
        store
            .patch_membership(MembershipPatch::new(u).add("b").add("a"))
            .unwrap();
    }

    // Explicit links come back in store order.
    assert_eq!(store.get_assembled_segments(user).unwrap(), vec!["a", "b"]);
    assert_eq!(store.get_assembled_segments(lucky).unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn segment_delete_cascades_one_remove_per_user() {
    let store = scenarios::populated_store(&["x"], 2);
    let before = store.db().stats().unwrap().history_entries;

    assert_eq!(store.delete_segment("x").unwrap(), "x");

    let stats = store.db().stats().unwrap();
    assert_eq!(stats.history_entries, before + 2);
    assert_eq!(stats.segments, 0);
    for user in [1, 2] {
        assert_eq!(
            history_ops(&store, user),
            vec![("x".to_string(), Operation::Add), ("x".to_string(), Operation::Remove)]
        );
    }
    // Links outlive the segment row.
    assert_eq!(store.get_segment_users("x").unwrap().len(), 2);
}

#[test]
fn deleting_unknown_segment_changes_nothing() {
    let store = scenarios::populated_store(&["x"], 2);
    let before = store.db().stats().unwrap();

    let err = store.delete_segment("y").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.db().stats().unwrap(), before);
}

#[test]
fn sweeper_runs_once_then_idles() {
    let store = TestStore::memory();
    let soon = store.clock.now() + chrono::Duration::minutes(5);
    store
        .patch_membership(
            MembershipPatch::new(UserId::new(1))
                .add("trial")
                .expires_at(Some(soon)),
        )
        .unwrap();

    assert_eq!(store.sweep_expired().unwrap(), 0);
    store.clock.set(soon);
    assert_eq!(store.sweep_expired().unwrap(), 1);
    assert_eq!(store.sweep_expired().unwrap(), 0);
    assert_eq!(
        history_ops(&store, 1),
        vec![("trial".to_string(), Operation::Add), ("trial".to_string(), Operation::Remove)]
    );
}

#[test]
fn history_report_lists_month_only() {
    let store = TestStore::memory();
    store
        .patch_membership(MembershipPatch::new(UserId::new(3)).add("a"))
        .unwrap();
    store.clock.advance(chrono::Duration::days(5));
    store
        .patch_membership(MembershipPatch::new(UserId::new(3)).delete("a"))
        .unwrap();

    let august = store.get_user_history(UserId::new(3), "2023-08").unwrap();
    let september = store.get_user_history(UserId::new(3), "2023-09").unwrap();
    assert_eq!(august.entries.len(), 1);
    assert_eq!(september.entries.len(), 1);
    assert!(august.path.starts_with(store.report_dir()));
    let text = std::fs::read_to_string(&september.path).unwrap();
    assert_eq!(text, "3,a,remove,2023-09-04 12:00:00\n");
}

proptest! {
    #[test]
    fn valid_slugs_accepted(slug in slug_strategy()) {
        prop_assert!(validate_slug(&slug).is_ok());
    }

    #[test]
    fn invalid_slugs_rejected(slug in invalid_slug_strategy()) {
        prop_assert!(validate_slug(&slug).is_err(), "accepted {:?}", slug);
    }

    #[test]
    fn invalid_slug_never_touches_store(slug in invalid_slug_strategy(), user in user_id_strategy()) {
        let store = TestStore::memory();
        let err = store.patch_membership(MembershipPatch::new(user).add(slug)).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Validation);
        prop_assert_eq!(store.db().stats().unwrap().journal_bytes, 0);
    }

    #[test]
    fn oracle_is_pure(slug in slug_strategy(), user in user_id_strategy(), pct in percentage_strategy()) {
        let oracle = RolloutOracle::new();
        prop_assert_eq!(oracle.decide(&slug, user, pct), oracle.decide(&slug, user, pct));
        prop_assert!(!oracle.decide(&slug, user, 0));
        prop_assert!(oracle.decide(&slug, user, 100));
    }

    #[test]
    fn patch_then_list_matches(slugs in distinct_slugs_strategy(6), user in user_id_strategy()) {
        let store = TestStore::memory();
        store.patch_membership(MembershipPatch::new(user).add_all(slugs.clone())).unwrap();

        let mut expected = slugs.clone();
        expected.sort();
        prop_assert_eq!(store.get_user_segments(user), expected);
        prop_assert_eq!(store.db().stats().unwrap().history_entries, slugs.len());
    }
}
