//! Property-based tests for the profile equivalence relation.
//!
//! Uses proptest to verify invariants across generated profiles:
//! - Every profile is a duplicate of itself
//! - The relation is symmetric when ids and keys are unique
//! - Permuting `enabledValues` never changes the verdict
//! - Permuting capabilities after the top one never changes the verdict
//! - Changing the top capability always breaks the match

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use driverci::profiles::{
    Capability, CapabilityConfig, Component, ConfigValue, Extra, Profile, is_duplicate,
};
use proptest::prelude::*;
use proptest::sample::subsequence;
use serde_yaml_ng::Value;

const CAPABILITIES: [&str; 5] = ["switch", "refresh", "button", "battery", "switchLevel"];
const ENABLED: [&str; 4] = ["on", "off", "auto", "pushed"];

fn version(v: u8) -> Extra {
    let mut extra = Extra::new();
    extra.insert("version".to_string(), Value::from(u64::from(v)));
    extra
}

fn enabled_values() -> impl Strategy<Value = Vec<Value>> {
    subsequence(ENABLED.to_vec(), 1..=ENABLED.len())
        .prop_shuffle()
        .prop_map(|values| values.into_iter().map(Value::from).collect())
}

fn config() -> impl Strategy<Value = Option<CapabilityConfig>> {
    proptest::option::of(enabled_values().prop_map(|enabled| CapabilityConfig {
        values: vec![ConfigValue {
            key: "value".to_string(),
            enabled_values: Some(enabled),
            extra: Extra::new(),
        }],
        extra: Extra::new(),
    }))
}

fn capabilities() -> impl Strategy<Value = Vec<Capability>> {
    subsequence(CAPABILITIES.to_vec(), 1..=3)
        .prop_shuffle()
        .prop_flat_map(|ids| {
            let count = ids.len();
            (
                Just(ids),
                proptest::collection::vec((1u8..=2, config()), count),
            )
        })
        .prop_map(|(ids, attributes)| {
            ids.into_iter()
                .zip(attributes)
                .map(|(id, (v, config))| Capability {
                    id: id.to_string(),
                    config,
                    extra: version(v),
                })
                .collect()
        })
}

fn component() -> impl Strategy<Value = Component> {
    (
        capabilities(),
        proptest::option::of(Just(vec![Value::from("Switch")])),
    )
        .prop_map(|(capabilities, categories)| Component {
            id: Some("main".to_string()),
            label: None,
            categories,
            capabilities,
        })
}

fn profile() -> impl Strategy<Value = Profile> {
    proptest::collection::vec(component(), 1..=2).prop_map(|components| Profile {
        name: Some("generated".to_string()),
        metadata: None,
        preferences: None,
        components,
    })
}

fn shuffle_enabled(profile: &Profile, rotate_by: usize) -> Profile {
    let mut shuffled = profile.clone();
    for component in &mut shuffled.components {
        for capability in &mut component.capabilities {
            let Some(config) = capability.config.as_mut() else {
                continue;
            };
            for value in &mut config.values {
                if let Some(enabled) = value.enabled_values.as_mut() {
                    let len = enabled.len();
                    enabled.rotate_left(rotate_by % len);
                }
            }
        }
    }
    shuffled
}

proptest! {
    /// Property: every profile duplicates itself.
    #[test]
    fn prop_reflexive(profile in profile()) {
        prop_assert!(is_duplicate(&profile, &profile));
    }

    /// Property: the verdict does not depend on argument order.
    #[test]
    fn prop_symmetric(a in profile(), b in profile()) {
        prop_assert_eq!(is_duplicate(&a, &b), is_duplicate(&b, &a));
    }

    /// Property: reordering `enabledValues` keeps a duplicate.
    #[test]
    fn prop_enabled_values_permutation(profile in profile(), rotate_by in 0usize..4) {
        let shuffled = shuffle_enabled(&profile, rotate_by);
        prop_assert!(is_duplicate(&profile, &shuffled));
        prop_assert!(is_duplicate(&shuffled, &profile));
    }

    /// Property: reordering capabilities after the top one keeps a duplicate.
    #[test]
    fn prop_trailing_capability_permutation(profile in profile()) {
        let mut reversed = profile.clone();
        for component in &mut reversed.components {
            component.capabilities[1..].reverse();
        }
        prop_assert!(is_duplicate(&profile, &reversed));
    }

    /// Property: a different top capability is never a duplicate.
    #[test]
    fn prop_top_capability_anchor(profile in profile()) {
        let mut renamed = profile.clone();
        renamed.components[0].capabilities[0].id = "renamedTop".to_string();
        prop_assert!(!is_duplicate(&profile, &renamed));
    }
}
