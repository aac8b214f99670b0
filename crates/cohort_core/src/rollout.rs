//! Deterministic rollout bucketing.
//!
//! A user's bucket for a segment is the first byte of
//! `SHA-512(slug ++ decimal(user_id))`. The user is in the rollout when the
//! bucket is below `(512 * percentage) / 200`. The arithmetic is fixed:
//! changing it would reshuffle every existing assignment.

use crate::types::UserId;
use sha2::{Digest, Sha512};

/// Pure rollout decision function.
#[derive(Debug, Default, Clone, Copy)]
pub struct RolloutOracle;

impl RolloutOracle {
    /// Creates an oracle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decides whether `user_id` falls inside a `percentage` rollout of `slug`.
    ///
    /// `percentage <= 0` is always false and `percentage >= 100` is always
    /// true; neither hashes.
    ///
    /// ```rust
    /// use cohort_core::{RolloutOracle, UserId};
    ///
    /// let oracle = RolloutOracle::new();
    /// assert!(!oracle.decide("beta", UserId::new(1), 0));
    /// assert!(oracle.decide("beta", UserId::new(1), 100));
    /// ```
    #[must_use]
    pub fn decide(&self, slug: &str, user_id: UserId, percentage: i64) -> bool {
        if percentage <= 0 {
            return false;
        }
        if percentage >= 100 {
            return true;
        }
        i64::from(Self::bucket(slug, user_id)) < Self::threshold(percentage)
    }

    /// Returns the user's bucket in `0..=255` for `slug`.
    #[must_use]
    pub fn bucket(slug: &str, user_id: UserId) -> u8 {
        let mut hasher = Sha512::new();
        hasher.update(slug.as_bytes());
        hasher.update(user_id.to_string().as_bytes());
        hasher.finalize()[0]
    }

    /// Bucket bound for `percentage`, using integer division.
    #[must_use]
    pub const fn threshold(percentage: i64) -> i64 {
        (512 * percentage) / 200
    }
}
