//! Merged membership view.

use crate::error::CoreResult;
use crate::model::{Percentage, Slug};
use crate::rollout::RolloutOracle;
use crate::types::UserId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Supplies a user's explicit segments.
pub trait MembershipSource: Send + Sync {
    /// Explicitly linked slugs, in store order.
    fn explicit_segments(&self, user_id: UserId) -> CoreResult<Vec<Slug>>;
}

/// Supplies the segments that carry a rollout percentage.
pub trait RolloutSource: Send + Sync {
    /// Slug → percentage for every rollout segment.
    fn rollout_segments(&self) -> CoreResult<BTreeMap<Slug, Percentage>>;
}

/// Combines explicit links with rollout decisions.
#[derive(Clone)]
pub struct MembershipAssembler {
    membership: Arc<dyn MembershipSource>,
    rollouts: Arc<dyn RolloutSource>,
    oracle: RolloutOracle,
}

impl MembershipAssembler {
    /// Creates an assembler over the given sources.
    pub fn new(membership: Arc<dyn MembershipSource>, rollouts: Arc<dyn RolloutSource>) -> Self {
        Self {
            membership,
            rollouts,
            oracle: RolloutOracle::new(),
        }
    }

    /// Every segment `user_id` belongs to, explicit or by rollout.
    pub fn segments_for(&self, user_id: UserId) -> CoreResult<Vec<Slug>> {
        let explicit = self.membership.explicit_segments(user_id)?;
        let rollouts = self.rollouts.rollout_segments()?;
        Ok(self.assemble(user_id, explicit, &rollouts))
    }

    /// Merges `explicit` with the rollout segments the oracle grants.
    ///
    /// When the oracle grants at least one segment not already explicit,
    /// the result is the sorted union. Otherwise `explicit` comes back
    /// untouched, order included.
    #[must_use]
    pub fn assemble(
        &self,
        user_id: UserId,
        explicit: Vec<Slug>,
        rollouts: &BTreeMap<Slug, Percentage>,
    ) -> Vec<Slug> {
        let granted: Vec<Slug> = {
            let seen: BTreeSet<&Slug> = explicit.iter().collect();
            rollouts
                .iter()
                .filter(|(slug, _)| !seen.contains(slug))
                .filter(|(slug, percentage)| {
                    self.oracle
                        .decide(slug.as_str(), user_id, i64::from(percentage.value()))
                })
                .map(|(slug, _)| slug.clone())
                .collect()
        };

        if granted.is_empty() {
            return explicit;
        }
        let merged: BTreeSet<Slug> = explicit.into_iter().chain(granted).collect();
        merged.into_iter().collect()
    }
}

impl std::fmt::Debug for MembershipAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipAssembler").finish_non_exhaustive()
    }
}
