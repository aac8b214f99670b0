//! Benchmark utilities.

#![warn(missing_docs)]

use cohort_core::{Database, MembershipPatch, SegmentService, UserId};
use std::sync::Arc;

/// Slugs `seg-0` .. `seg-{count-1}`.
pub fn slugs(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("seg-{i}")).collect()
}

/// An in-memory service with `segment_count` segments, every `rollout_every`th
/// carrying a 50% rollout, and `user_count` users linked to the first
/// `links_per_user` segments.
pub fn seeded_service(
    segment_count: usize,
    rollout_every: usize,
    user_count: i64,
    links_per_user: usize,
) -> SegmentService {
    let db = Database::open_in_memory().expect("in-memory store");
    let service = SegmentService::new(Arc::new(db));
    let all = slugs(segment_count);

    for (i, slug) in all.iter().enumerate() {
        let rollout = (rollout_every > 0 && i % rollout_every == 0).then_some(50);
        service.create_segment(slug, rollout).expect("create segment");
    }
    for user in 0..user_count {
        let patch = MembershipPatch::new(UserId::new(user)).add_all(all.iter().take(links_per_user).cloned());
        service.patch_membership(patch).expect("seed links");
    }
    service
}
