//! Profile loading and schema validation.
//!
//! Documents are parsed into a [`serde_yaml_ng::Value`] tree first and then
//! walked into the typed model, so every shape problem is reported with the
//! path of the offending field instead of surfacing later as a comparison
//! failure.

use super::model::{Capability, CapabilityConfig, Component, ConfigValue, Extra, Profile};
use crate::{Error, Result};
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

/// Field path used when the document itself cannot be parsed.
const DOCUMENT: &str = "<document>";

/// Loads and validates a profile from disk.
///
/// # Errors
///
/// Returns [`Error::MalformedProfile`] if the file cannot be read, is not
/// valid YAML, or misses a required field.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::MalformedProfile {
        path: path.to_path_buf(),
        field: DOCUMENT.to_string(),
        reason: format!("cannot read file: {e}"),
    })?;
    parse_profile(&contents, path)
}

/// Parses and validates a profile from YAML text.
///
/// `path` is only used to label errors.
///
/// # Errors
///
/// Returns [`Error::MalformedProfile`] on invalid YAML or schema violations.
pub fn parse_profile(contents: &str, path: &Path) -> Result<Profile> {
    let root: Value = serde_yaml_ng::from_str(contents).map_err(|e| Error::MalformedProfile {
        path: path.to_path_buf(),
        field: DOCUMENT.to_string(),
        reason: format!("invalid YAML: {e}"),
    })?;

    ProfileWalker { path }.profile(&root)
}

/// Walks a YAML tree into the typed model, labelling errors with `path`.
struct ProfileWalker<'a> {
    path: &'a Path,
}

impl ProfileWalker<'_> {
    fn malformed(&self, field: &str, reason: impl Into<String>) -> Error {
        Error::MalformedProfile {
            path: self.path.to_path_buf(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn mapping<'v>(&self, value: &'v Value, field: &str) -> Result<&'v Mapping> {
        value
            .as_mapping()
            .ok_or_else(|| self.malformed(field, "expected a mapping"))
    }

    fn sequence<'v>(&self, value: &'v Value, field: &str) -> Result<&'v [Value]> {
        value
            .as_sequence()
            .map(Vec::as_slice)
            .ok_or_else(|| self.malformed(field, "expected a sequence"))
    }

    fn required<'v>(&self, map: &'v Mapping, key: &str, field: &str) -> Result<&'v Value> {
        match map.get(key) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(self.malformed(field, "missing required field")),
        }
    }

    fn string(&self, value: &Value, field: &str) -> Result<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.malformed(field, "expected a string"))
    }

    /// Returns an optional typed field. An explicit `null` counts as absent.
    fn optional<'v>(map: &'v Mapping, key: &str) -> Option<&'v Value> {
        map.get(key).filter(|value| !value.is_null())
    }

    /// Collects every field not listed in `known`.
    fn extra(&self, map: &Mapping, known: &[&str], field: &str) -> Result<Extra> {
        let mut extra = Extra::new();
        for (key, value) in map {
            let name = key
                .as_str()
                .ok_or_else(|| self.malformed(field, "expected string keys"))?;
            if !known.contains(&name) {
                extra.insert(name.to_string(), value.clone());
            }
        }
        Ok(extra)
    }

    fn profile(&self, root: &Value) -> Result<Profile> {
        let map = self.mapping(root, DOCUMENT)?;

        let name = Self::optional(map, "name")
            .map(|value| self.string(value, "name"))
            .transpose()?;
        let components = self
            .sequence(self.required(map, "components", "components")?, "components")?
            .iter()
            .enumerate()
            .map(|(index, value)| self.component(value, &format!("components[{index}]")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Profile {
            name,
            metadata: Self::optional(map, "metadata").cloned(),
            preferences: Self::optional(map, "preferences").cloned(),
            components,
        })
    }

    fn component(&self, value: &Value, field: &str) -> Result<Component> {
        let map = self.mapping(value, field)?;

        let id = Self::optional(map, "id")
            .map(|value| self.string(value, &format!("{field}.id")))
            .transpose()?;
        let label = Self::optional(map, "label")
            .map(|value| self.string(value, &format!("{field}.label")))
            .transpose()?;
        let categories = Self::optional(map, "categories")
            .map(|value| {
                self.sequence(value, &format!("{field}.categories"))
                    .map(<[Value]>::to_vec)
            })
            .transpose()?;

        let capabilities_field = format!("{field}.capabilities");
        let capabilities = self
            .sequence(
                self.required(map, "capabilities", &capabilities_field)?,
                &capabilities_field,
            )?
            .iter()
            .enumerate()
            .map(|(index, value)| self.capability(value, &format!("{capabilities_field}[{index}]")))
            .collect::<Result<Vec<_>>>()?;
        if capabilities.is_empty() {
            return Err(self.malformed(&capabilities_field, "must list at least one capability"));
        }

        Ok(Component {
            id,
            label,
            categories,
            capabilities,
        })
    }

    fn capability(&self, value: &Value, field: &str) -> Result<Capability> {
        let map = self.mapping(value, field)?;
        let id_field = format!("{field}.id");
        let id = self.string(self.required(map, "id", &id_field)?, &id_field)?;
        let config = Self::optional(map, "config")
            .map(|value| self.config(value, &format!("{field}.config")))
            .transpose()?;

        Ok(Capability {
            id,
            config,
            extra: self.extra(map, &["id", "config"], field)?,
        })
    }

    fn config(&self, value: &Value, field: &str) -> Result<CapabilityConfig> {
        let map = self.mapping(value, field)?;
        let values_field = format!("{field}.values");
        let values = self
            .sequence(self.required(map, "values", &values_field)?, &values_field)?
            .iter()
            .enumerate()
            .map(|(index, value)| self.config_value(value, &format!("{values_field}[{index}]")))
            .collect::<Result<Vec<_>>>()?;

        Ok(CapabilityConfig {
            values,
            extra: self.extra(map, &["values"], field)?,
        })
    }

    fn config_value(&self, value: &Value, field: &str) -> Result<ConfigValue> {
        let map = self.mapping(value, field)?;
        let key_field = format!("{field}.key");
        let key = self.string(self.required(map, "key", &key_field)?, &key_field)?;
        let enabled_values = Self::optional(map, "enabledValues")
            .map(|value| {
                self.sequence(value, &format!("{field}.enabledValues"))
                    .map(<[Value]>::to_vec)
            })
            .transpose()?;

        Ok(ConfigValue {
            key,
            enabled_values,
            extra: self.extra(map, &["key", "enabledValues"], field)?,
        })
    }
}
