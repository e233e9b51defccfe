//! Plugin registry and alias groups.
//!
//! A [`Registry`] is an explicit object so tests stay hermetic; the
//! process-wide default registry (pre-seeded with the built-in plugins and
//! alias groups) is snapshotted into each bootstrap instance at
//! construction, so later global mutation does not disturb live instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::options::Options;
use crate::plugin::{Plugin, PluginCore};

/// Constructs a plugin instance from its prepared core (name, merged
/// options, per-plugin hub).
pub type PluginCtor = Arc<dyn Fn(PluginCore) -> Box<dyn Plugin + Send> + Send + Sync>;

/// Registered plugin: declared defaults plus constructor.
#[derive(Clone)]
pub struct PluginDef {
    pub defaults: Options,
    pub ctor: PluginCtor,
}

impl PluginDef {
    pub fn new<F>(defaults: Options, ctor: F) -> Self
    where
        F: Fn(PluginCore) -> Box<dyn Plugin + Send> + Send + Sync + 'static,
    {
        Self {
            defaults,
            ctor: Arc::new(ctor),
        }
    }
}

/// Mapping from plugin name to definition, plus named alias groups.
///
/// No uniqueness enforcement beyond last-write-wins.
#[derive(Clone, Default)]
pub struct Registry {
    plugins: HashMap<String, PluginDef>,
    aliases: HashMap<String, Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, defaults: Options, ctor: F)
    where
        F: Fn(PluginCore) -> Box<dyn Plugin + Send> + Send + Sync + 'static,
    {
        self.register_def(name, PluginDef::new(defaults, ctor));
    }

    pub fn register_def(&mut self, name: impl Into<String>, def: PluginDef) {
        self.plugins.insert(name.into(), def);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.plugins.remove(name).is_some()
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginDef> {
        self.plugins.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Register an alias group. A single name registers a one-element
    /// group, so scalar aliases normalize at registration time.
    pub fn register_alias<I, S>(&mut self, name: impl Into<String>, plugins: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .insert(name.into(), plugins.into_iter().map(Into::into).collect());
    }

    pub fn unregister_alias(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    pub fn aliases(&self) -> &HashMap<String, Vec<String>> {
        &self.aliases
    }

    /// Overlay `other` on top of this registry (last write wins).
    pub fn merge(&mut self, other: Registry) {
        self.plugins.extend(other.plugins);
        self.aliases.extend(other.aliases);
    }
}

static GLOBAL: OnceLock<Mutex<Registry>> = OnceLock::new();

fn global() -> &'static Mutex<Registry> {
    GLOBAL.get_or_init(|| Mutex::new(crate::plugins::builtin_registry()))
}

/// Register a plugin in the process-wide registry.
pub fn register_plugin<F>(name: impl Into<String>, defaults: Options, ctor: F)
where
    F: Fn(PluginCore) -> Box<dyn Plugin + Send> + Send + Sync + 'static,
{
    global().lock().unwrap().register(name, defaults, ctor);
}

pub fn unregister_plugin(name: &str) -> bool {
    global().lock().unwrap().unregister(name)
}

/// Register an alias group in the process-wide registry.
pub fn register_alias<I, S>(name: impl Into<String>, plugins: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    global().lock().unwrap().register_alias(name, plugins);
}

pub fn unregister_alias(name: &str) -> bool {
    global().lock().unwrap().unregister_alias(name)
}

/// Clone the current process-wide registry state.
pub fn global_snapshot() -> Registry {
    global().lock().unwrap().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::SimplePlugin;

    #[test]
    fn register_and_look_up() {
        let mut registry = Registry::new();
        registry.register("probe", Options::new(), |core| {
            Box::new(SimplePlugin::new(core))
        });

        assert!(registry.is_registered("probe"));
        assert!(!registry.is_registered("other"));
        assert!(registry.unregister("probe"));
        assert!(!registry.unregister("probe"));
    }

    #[test]
    fn alias_registration_normalizes_scalars() {
        let mut registry = Registry::new();
        registry.register_alias("solo", ["only"]);
        assert_eq!(registry.aliases()["solo"], vec!["only".to_string()]);
    }

    #[test]
    fn global_defaults_include_builtins() {
        let snapshot = global_snapshot();
        assert!(snapshot.is_registered("bind"));
        assert!(snapshot.is_registered("loop"));
        assert!(snapshot.is_registered("time"));
        assert!(snapshot.is_registered("fallback"));
        assert!(snapshot.aliases().contains_key("empty"));
        assert!(snapshot.aliases().contains_key("core"));
    }
}
