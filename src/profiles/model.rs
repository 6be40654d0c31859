//! Typed profile schema.
//!
//! Only the fields that take part in duplicate detection are typed. Fields
//! the schema does not name are kept in [`Extra`] maps wherever they matter
//! for deep equality, so the derived `PartialEq` of a node is exactly the
//! equality of the YAML node it was loaded from.

use serde_yaml_ng::Value;
use std::collections::BTreeMap;

/// Untyped fields of a node, keyed by field name.
pub type Extra = BTreeMap<String, Value>;

/// A device profile document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name. Not part of the equivalence relation.
    pub name: Option<String>,
    /// Optional metadata node, compared strictly.
    pub metadata: Option<Value>,
    /// Optional preferences node, compared strictly.
    pub preferences: Option<Value>,
    /// Components in document order.
    pub components: Vec<Component>,
}

/// A component of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component id (for example `main`). Not part of the equivalence relation.
    pub id: Option<String>,
    /// Optional display label.
    pub label: Option<String>,
    /// Optional categories, order significant.
    ///
    /// Entries are kept as raw nodes so both `- Switch` and `- name: Switch`
    /// forms load.
    pub categories: Option<Vec<Value>>,
    /// Capabilities; index 0 is the top capability. Never empty.
    pub capabilities: Vec<Capability>,
}

impl Component {
    /// Returns the top capability.
    #[must_use]
    pub fn top_capability(&self) -> Option<&Capability> {
        self.capabilities.first()
    }
}

/// A capability attached to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Capability id.
    pub id: String,
    /// Optional embedded configuration.
    pub config: Option<CapabilityConfig>,
    /// Remaining fields such as `version`.
    pub extra: Extra,
}

/// Embedded capability configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityConfig {
    /// Config values, unordered and keyed by [`ConfigValue::key`].
    pub values: Vec<ConfigValue>,
    /// Remaining fields of the config node.
    pub extra: Extra,
}

/// A single keyed value inside a capability config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    /// Attribute key, for example `switch.value`.
    pub key: String,
    /// Optional `enabledValues` list. Compared as a set when the values
    /// otherwise differ.
    pub enabled_values: Option<Vec<Value>>,
    /// Remaining fields such as `range` or `step`.
    pub extra: Extra,
}
