//! Alias expansion for plugin lists.
//!
//! A requested plugin list may contain alias names (expanding to further
//! lists) and inline overrides of the form `name:value`, which remap `name`
//! to `[value]` for this resolution only and drop out of the literal list.
//! Expansion is depth-first and order-preserving; duplicates are kept (the
//! install step tolerates them).

use std::collections::HashMap;

use crate::errors::ConfigError;

/// Expansion depth bound guarding against cyclic alias definitions.
const MAX_DEPTH: usize = 256;

/// Expand `names` against `aliases` into an ordered, alias-free list.
///
/// Consulted fresh on every call: aliases registered or removed between
/// calls take effect immediately. Inline overrides mutate a working copy
/// only, never the table passed in.
pub fn resolve(
    names: &[String],
    aliases: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, ConfigError> {
    let mut working = aliases.clone();
    let mut out = Vec::new();
    expand(names, &mut working, 0, &mut out)?;
    Ok(out)
}

fn expand(
    list: &[String],
    aliases: &mut HashMap<String, Vec<String>>,
    depth: usize,
    out: &mut Vec<String>,
) -> Result<(), ConfigError> {
    if depth >= MAX_DEPTH {
        return Err(ConfigError::AliasRecursion);
    }
    let literal = strip_inline_overrides(list, aliases);
    for name in literal {
        match aliases.get(&name).cloned() {
            None => out.push(name),
            Some(expansion) => expand(&expansion, aliases, depth + 1, out)?,
        }
    }
    Ok(())
}

/// Register `name:value` entries as one-shot aliases and return the list
/// without them. A bare trailing colon (`name:`) is not an override and
/// stays in the list untouched.
fn strip_inline_overrides(
    list: &[String],
    aliases: &mut HashMap<String, Vec<String>>,
) -> Vec<String> {
    list.iter()
        .filter_map(|name| {
            let mut parts = name.split(':');
            let head = parts.next().unwrap_or_default();
            match parts.next() {
                Some(value) if !value.is_empty() => {
                    aliases.insert(head.to_string(), vec![value.to_string()]);
                    None
                }
                _ => Some(name.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn aliases(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), names(v)))
            .collect()
    }

    #[test]
    fn plain_names_pass_through() {
        let table = aliases(&[]);
        let out = resolve(&names(&["a", "b"]), &table).unwrap();
        assert_eq!(out, names(&["a", "b"]));
    }

    #[test]
    fn aliases_expand_in_order() {
        let table = aliases(&[("g", &["a", "b"])]);
        assert_eq!(resolve(&names(&["g"]), &table).unwrap(), names(&["a", "b"]));

        let table = aliases(&[("g", &["a", "b"]), ("h", &["g", "c"])]);
        assert_eq!(
            resolve(&names(&["h"]), &table).unwrap(),
            names(&["a", "b", "c"])
        );
    }

    #[test]
    fn expansion_reaches_a_fixed_point() {
        let table = aliases(&[("g", &["a", "b"]), ("h", &["g", "c"])]);
        let out = resolve(&names(&["h", "g", "x"]), &table).unwrap();
        for name in &out {
            assert!(!table.contains_key(name), "alias `{name}` left unexpanded");
        }
    }

    #[test]
    fn duplicates_are_preserved() {
        let table = aliases(&[("g", &["a"])]);
        let out = resolve(&names(&["g", "a"]), &table).unwrap();
        assert_eq!(out, names(&["a", "a"]));
    }

    #[test]
    fn direct_cycle_errors() {
        let table = aliases(&[("a", &["a"])]);
        let err = resolve(&names(&["a"]), &table).unwrap_err();
        assert!(matches!(err, ConfigError::AliasRecursion));
    }

    #[test]
    fn long_cycle_errors() {
        let table = aliases(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        let err = resolve(&names(&["a"]), &table).unwrap_err();
        assert!(matches!(err, ConfigError::AliasRecursion));
    }

    #[test]
    fn inline_override_remaps_and_drops_out() {
        let table = aliases(&[("render", &["forward"])]);
        let out = resolve(&names(&["render:vr", "render"]), &table).unwrap();
        assert_eq!(out, names(&["vr"]));
    }

    #[test]
    fn inline_override_applies_inside_expansions() {
        let table = aliases(&[("core", &["render", "loop"])]);
        let out = resolve(&names(&["render:vr", "core"]), &table).unwrap();
        assert_eq!(out, names(&["vr", "loop"]));
    }

    #[test]
    fn override_does_not_leak_into_the_callers_table() {
        let table = aliases(&[]);
        let _ = resolve(&names(&["render:vr"]), &table).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn trailing_colon_is_not_an_override() {
        let table = aliases(&[]);
        let out = resolve(&names(&["name:"]), &table).unwrap();
        assert_eq!(out, names(&["name:"]));
    }
}
