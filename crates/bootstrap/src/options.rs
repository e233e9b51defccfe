//! Plugin option records.
//!
//! Options are RON value maps: defaults are authored in code (any
//! serializable struct), caller overrides are merged over them recursively,
//! and later `set` calls report a recursive diff of what actually changed.
//! Typed views go through serde both ways.

use ron::value::{Map as RonMap, Value as RonValue};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::ConfigError;

/// Convert any serializable value to `ron::Value`.
pub fn to_ron_value<T: Serialize>(value: &T) -> Result<RonValue, ConfigError> {
    let s = ron::to_string(value)?;
    let v: RonValue = ron::from_str(&s)?;
    Ok(v)
}

/// Merge base + delta recursively (maps only; delta wins on leaves).
fn merge_maps(base: &RonMap, delta: &RonMap) -> RonMap {
    let mut merged = base.clone();
    for (k, v_delta) in delta.iter() {
        if let Some(v_base) = merged.get(k) {
            match (v_base, v_delta) {
                (RonValue::Map(base_m), RonValue::Map(delta_m)) => {
                    let rec = merge_maps(base_m, delta_m);
                    merged.insert(k.clone(), RonValue::Map(rec));
                }
                _ => {
                    merged.insert(k.clone(), v_delta.clone());
                }
            }
        } else {
            merged.insert(k.clone(), v_delta.clone());
        }
    }
    merged
}

/// Compute recursive diff (new vs old). Returns None if identical.
fn diff_value(new_v: &RonValue, old_v: &RonValue) -> Option<RonValue> {
    match (new_v, old_v) {
        (RonValue::Map(new_m), RonValue::Map(old_m)) => {
            let diff_m = diff_map(new_m, old_m);
            if diff_m.is_empty() {
                None
            } else {
                Some(RonValue::Map(diff_m))
            }
        }
        _ => {
            if new_v == old_v {
                None
            } else {
                Some(new_v.clone())
            }
        }
    }
}

fn diff_map(new_m: &RonMap, old_m: &RonMap) -> RonMap {
    let mut out = RonMap::new();
    for (k, new_v) in new_m.iter() {
        match old_m.get(k) {
            Some(old_v) => {
                if let Some(d) = diff_value(new_v, old_v) {
                    out.insert(k.clone(), d);
                }
            }
            None => {
                out.insert(k.clone(), new_v.clone());
            }
        }
    }
    out
}

/// An options record: a RON map with merge, diff and typed access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    map: RonMap,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: RonMap) -> Self {
        Self { map }
    }

    /// Build a record from any serializable struct. Fails unless the value
    /// serializes to a map.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self, ConfigError> {
        match to_ron_value(value)? {
            RonValue::Map(map) => Ok(Self { map }),
            _ => Err(ConfigError::NotAMap),
        }
    }

    /// Caller overrides merged over declared defaults (recursive, overrides
    /// win on leaves).
    pub fn merged(defaults: &Options, overrides: &Options) -> Options {
        Options {
            map: merge_maps(&defaults.map, &overrides.map),
        }
    }

    pub fn map(&self) -> &RonMap {
        &self.map
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Raw lookup of a single entry.
    pub fn get(&self, key: &str) -> Option<&RonValue> {
        self.map.get(&RonValue::String(key.to_string()))
    }

    /// Typed lookup of a single entry; `None` when absent or undecodable.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        let s = ron::to_string(value).ok()?;
        ron::from_str(&s).ok()
    }

    /// Typed lookup of a mandatory entry.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.get_as(key).ok_or_else(|| ConfigError::MissingOption {
            option: key.to_string(),
        })
    }

    /// View the whole record as a typed struct.
    pub fn to_struct<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let s = ron::to_string(&RonValue::Map(self.map.clone()))?;
        Ok(ron::from_str(&s)?)
    }

    /// Apply a partial update and return the recursive diff of entries that
    /// actually changed (possibly empty).
    pub fn set(&mut self, changes: &RonMap) -> RonMap {
        let diff = diff_map(changes, &self.map);
        self.map = merge_maps(&self.map, changes);
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        x: u32,
        label: String,
        nested: Nested,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Nested {
        enabled: bool,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                x: 1,
                label: "default".into(),
                nested: Nested { enabled: false },
            }
        }
    }

    impl Default for Nested {
        fn default() -> Self {
            Self { enabled: false }
        }
    }

    fn options_of<T: Serialize>(value: &T) -> Options {
        Options::from_value(value).expect("serialize test options")
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let defaults = options_of(&Sample::default());
        #[derive(Serialize)]
        struct Partial {
            x: u32,
        }
        let overrides = options_of(&Partial { x: 2 });

        let merged = Options::merged(&defaults, &overrides);
        let sample: Sample = merged.to_struct().unwrap();
        assert_eq!(sample.x, 2);
        assert_eq!(sample.label, "default");
    }

    #[test]
    fn merge_recurses_into_nested_maps() {
        let defaults = options_of(&Sample::default());
        #[derive(Serialize)]
        struct Partial {
            nested: Nested,
        }
        let overrides = options_of(&Partial {
            nested: Nested { enabled: true },
        });

        let merged = Options::merged(&defaults, &overrides);
        let sample: Sample = merged.to_struct().unwrap();
        assert!(sample.nested.enabled);
        assert_eq!(sample.x, 1);
    }

    #[test]
    fn set_reports_only_actual_changes() {
        let mut options = options_of(&Sample::default());

        #[derive(Serialize)]
        struct Partial {
            x: u32,
            label: String,
        }
        // `label` is already "default": only `x` should show up in the diff.
        let changes = options_of(&Partial {
            x: 5,
            label: "default".into(),
        });
        let diff = options.set(changes.map());

        assert_eq!(diff.len(), 1);
        assert!(diff.get(&RonValue::String("x".into())).is_some());
        assert_eq!(options.get_as::<u32>("x"), Some(5));
    }

    #[test]
    fn set_with_no_changes_yields_empty_diff() {
        let mut options = options_of(&Sample::default());
        let same = options.clone();
        let diff = options.set(same.map());
        assert!(diff.is_empty());
    }

    #[test]
    fn require_reports_missing_option() {
        let options = Options::new();
        let err = options.require::<u32>("rate").unwrap_err();
        assert!(matches!(err, ConfigError::MissingOption { .. }));
    }
}
