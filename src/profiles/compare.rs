//! Order-tolerant profile comparison.
//!
//! All functions here are pure predicates over already validated profiles.
//!
//! # Matching policy
//!
//! Capabilities and config values are matched by scanning for the FIRST
//! entry with the same `id` / `key`. Only that candidate is examined; there is
//! no backtracking to later entries sharing the same id. This assumes ids are
//! unique within a component and keys unique within a config. Documents that
//! repeat an id can therefore be reported as "not duplicate" even when some
//! other pairing would match.

use super::model::{Capability, CapabilityConfig, Component, ConfigValue, Profile};
use serde_yaml_ng::Value;
use std::collections::{BTreeSet, HashSet};

/// Returns `true` if the two profiles are duplicates of each other.
#[must_use]
pub fn is_duplicate(new: &Profile, current: &Profile) -> bool {
    compare_metadata(new, current)
        && compare_preferences(new, current)
        && compare_components(new, current)
}

/// Compares `new` against every candidate and returns the matching pairs.
///
/// Each pair is `(new_id, candidate_id)`. Candidates carrying the same id as
/// `new` are skipped.
pub fn detect<'a, K>(
    new_id: &K,
    new: &Profile,
    candidates: impl IntoIterator<Item = (&'a K, &'a Profile)>,
) -> BTreeSet<(K, K)>
where
    K: Ord + Clone + 'a,
{
    candidates
        .into_iter()
        .filter(|(candidate_id, _)| *candidate_id != new_id)
        .filter(|(_, candidate)| is_duplicate(new, candidate))
        .map(|(candidate_id, _)| (new_id.clone(), candidate_id.clone()))
        .collect()
}

/// Both metadata absent, or both present and equal.
#[must_use]
pub fn compare_metadata(new: &Profile, current: &Profile) -> bool {
    new.metadata == current.metadata
}

/// Both preferences absent, or both present and equal.
#[must_use]
pub fn compare_preferences(new: &Profile, current: &Profile) -> bool {
    new.preferences == current.preferences
}

/// Same component count and every positional pair matches.
#[must_use]
pub fn compare_components(new: &Profile, current: &Profile) -> bool {
    new.components.len() == current.components.len()
        && new
            .components
            .iter()
            .zip(&current.components)
            .all(|(new_component, current_component)| {
                compare_component(new_component, current_component)
            })
}

/// Compares two components at the same position.
#[must_use]
pub fn compare_component(new: &Component, current: &Component) -> bool {
    if new.categories != current.categories || new.label != current.label {
        return false;
    }

    if !top_capability_matches(new, current) {
        return false;
    }

    new.capabilities == current.capabilities
        || compare_component_capabilities_unordered(&new.capabilities, &current.capabilities)
}

/// Same capability count and the same capability id at index 0.
fn top_capability_matches(new: &Component, current: &Component) -> bool {
    new.capabilities.len() == current.capabilities.len()
        && match (new.top_capability(), current.top_capability()) {
            (Some(new_top), Some(current_top)) => new_top.id == current_top.id,
            _ => false,
        }
}

/// Matches every capability of `new` against the first capability of
/// `current` with the same id.
///
/// A match holds if the two are equal, or if both carry a config and the
/// configs are equivalent under [`compare_embedded_configs`]. Capability
/// counts are not checked here.
#[must_use]
pub fn compare_component_capabilities_unordered(
    new: &[Capability],
    current: &[Capability],
) -> bool {
    new.iter().all(|cap1| {
        current
            .iter()
            .find(|cap2| cap2.id == cap1.id)
            .is_some_and(|cap2| capabilities_match(cap1, cap2))
    })
}

fn capabilities_match(cap1: &Capability, cap2: &Capability) -> bool {
    if cap1 == cap2 {
        return true;
    }
    match (&cap1.config, &cap2.config) {
        (Some(config1), Some(config2)) => compare_embedded_configs(config1, config2),
        _ => false,
    }
}

/// Matches every value of `config1` against the first value of `config2`
/// with the same key.
///
/// A pair matches if equal, or if both carry `enabledValues` and those are
/// equal as sets. Both configs must hold the same number of values.
#[must_use]
pub fn compare_embedded_configs(config1: &CapabilityConfig, config2: &CapabilityConfig) -> bool {
    tracing::trace!(
        values = config1.values.len(),
        "comparing embedded configs"
    );
    config1.values.len() == config2.values.len()
        && config1.values.iter().all(|value1| {
            config2
                .values
                .iter()
                .find(|value2| value2.key == value1.key)
                .is_some_and(|value2| config_values_match(value1, value2))
        })
}

fn config_values_match(value1: &ConfigValue, value2: &ConfigValue) -> bool {
    if value1 == value2 {
        return true;
    }
    match (&value1.enabled_values, &value2.enabled_values) {
        (Some(enabled1), Some(enabled2)) => same_set(enabled1, enabled2),
        _ => false,
    }
}

fn same_set(left: &[Value], right: &[Value]) -> bool {
    left.iter().collect::<HashSet<_>>() == right.iter().collect::<HashSet<_>>()
}
