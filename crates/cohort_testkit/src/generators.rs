//! Property-based test generators using proptest.

use cohort_core::UserId;
use proptest::prelude::*;

/// Strategy for slugs accepted by the validator.
pub fn slug_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,8}([-_][a-z0-9]{1,8}){0,3}").expect("Invalid regex")
}

/// Strategy for strings the validator must reject.
pub fn invalid_slug_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        slug_strategy().prop_map(|s| format!("-{s}")),
        slug_strategy().prop_map(|s| format!("{s}_")),
        (slug_strategy(), slug_strategy()).prop_map(|(a, b)| format!("{a}--{b}")),
        (slug_strategy(), slug_strategy()).prop_map(|(a, b)| format!("{a}-_{b}")),
        (slug_strategy(), "[A-Z]").prop_map(|(s, upper)| format!("{s}{upper}")),
        (slug_strategy(), "[ .!/:@]").prop_map(|(s, bad)| format!("{s}{bad}x")),
    ]
}

/// Strategy for user IDs across the whole range.
pub fn user_id_strategy() -> impl Strategy<Value = UserId> {
    any::<i64>().prop_map(UserId::new)
}

/// Strategy for valid rollout percentages.
pub fn percentage_strategy() -> impl Strategy<Value = i64> {
    0i64..=100
}

/// Strategy for a list of distinct slugs.
pub fn distinct_slugs_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(slug_strategy(), 1..=max).prop_map(|set| set.into_iter().collect())
}
