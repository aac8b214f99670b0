//! Concurrent writers.

use cohort_core::{ErrorKind, MembershipPatch, UserId};
use cohort_testkit::prelude::*;
use std::sync::Barrier;
use std::thread;

#[test]
fn racing_duplicate_adds_yield_one_winner() {
    let store = TestStore::memory();
    store.create_segment("beta", None).unwrap();
    let barrier = Barrier::new(8);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    store.patch_membership(MembershipPatch::new(UserId::new(1)).add("beta"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
    assert_eq!(store.db().stats().unwrap().history_entries, 1);
}

#[test]
fn independent_writers_all_commit() {
    let store = TestStore::memory();

    thread::scope(|s| {
        for user in 0..16 {
            let store = &store;
            s.spawn(move || {
                store
                    .patch_membership(MembershipPatch::new(UserId::new(user)).add("shared"))
                    .unwrap();
            });
        }
    });

    assert_eq!(store.get_segment_users("shared").unwrap().len(), 16);
    assert_eq!(store.db().committed_seq().as_u64(), 16);
}

#[test]
fn readers_see_whole_commits() {
    let store = TestStore::memory();

    thread::scope(|s| {
        s.spawn(|| {
            for user in 0..50 {
                store
                    .patch_membership(MembershipPatch::new(UserId::new(user)).add("a").add("b"))
                    .unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..200 {
                let snapshot = store.db().begin_read();
                let a = snapshot.users_in("a");
                let b = snapshot.users_in("b");
                assert_eq!(a, b);
                assert_eq!(snapshot.history_len(), a.len() * 2);
            }
        });
    });
}
