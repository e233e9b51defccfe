//! Install/uninstall lifecycle over the shared stage.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use events::Event;
use serde::Serialize;
use tracing::{debug, warn};

use crate::binder::BindTarget;
use crate::clock::{Clock, SystemClock};
use crate::errors::ConfigError;
use crate::options::Options;
use crate::plugin::{InstallFlow, Plugin, PluginCore, PluginHandle};
use crate::registry::{self, PluginDef, Registry};
use crate::resolve::resolve;
use crate::scheduler::{FrameScheduler, StepScheduler};
use crate::stage::Stage;

/// Lifecycle owner: resolves plugin lists, installs and uninstalls them
/// against the shared [`Stage`], and fires lifecycle events.
///
/// States run `uninitialized → initialized → destroyed`; `initialized` is
/// entered once (repeat `init` calls are no-ops) and `destroyed` is
/// terminal and idempotent.
pub struct Bootstrap {
    stage: Stage,
    registry: Registry,
    overrides: HashMap<String, Options>,
    requested: Vec<String>,
    inited: bool,
    destroyed: bool,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("installed", &self.stage.installed_names())
            .field("requested", &self.requested)
            .field("inited", &self.inited)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Bootstrap {
    pub fn builder() -> BootstrapBuilder {
        BootstrapBuilder::new()
    }

    /// Install the configured plugin list. Idempotent; `build()` calls
    /// this already unless the builder deferred it.
    pub fn init(&mut self) -> Result<(), ConfigError> {
        if self.inited {
            return Ok(());
        }
        self.inited = true;
        let requested = self.requested.clone();
        self.install(&requested)
    }

    /// Resolve and install a plugin list in order, then fire readiness.
    ///
    /// An unregistered name is fatal to this call; a name already
    /// installed warns and skips. Readiness fires at most once per
    /// instance; `ready` listeners bound by later install calls are
    /// replayed immediately instead.
    pub fn install<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ConfigError> {
        let names: Vec<String> = names.iter().map(|s| s.as_ref().to_string()).collect();
        let resolved = resolve(&names, self.registry.aliases())?;
        for name in &resolved {
            self.install_one(name)?;
        }
        self.stage.trigger(&Event::Ready);
        Ok(())
    }

    fn install_one(&mut self, name: &str) -> Result<(), ConfigError> {
        let Some(def) = self.registry.plugin(name).cloned() else {
            return Err(ConfigError::NotRegistered(name.to_string()));
        };
        if self.stage.plugins.contains_key(name) {
            warn!(plugin = name, "already installed, skipping");
            return Ok(());
        }

        let overrides = self.overrides.get(name).cloned().unwrap_or_default();
        let options = Options::merged(&def.defaults, &overrides);
        let plugin = (def.ctor)(PluginCore::new(name, options));
        let handle = PluginHandle::new(plugin);

        // Registered by name before the hook runs, appended to the install
        // order after it: a hook can look itself up, and the installed list
        // never contains a plugin whose hook has not finished.
        self.stage
            .plugins
            .insert(name.to_string(), handle.clone());
        let flow = { handle.lock().install(&mut self.stage) };
        self.stage.installed.push(handle.clone());
        if flow == InstallFlow::Abort {
            debug!(plugin = name, "install hook aborted");
        }

        self.stage.trigger(&Event::Install {
            plugin: name.to_string(),
        });
        Ok(())
    }

    /// Uninstall every installed plugin, in reverse install order.
    pub fn uninstall_all(&mut self) {
        let names: Vec<String> = self
            .stage
            .installed
            .iter()
            .rev()
            .map(|handle| handle.name().to_string())
            .collect();
        for name in names {
            self.uninstall_one(&name);
        }
    }

    /// Resolve and uninstall the named plugins, walking the installed list
    /// in reverse and skipping everything not named. A resolved name that
    /// is not installed warns and no-ops.
    pub fn uninstall<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ConfigError> {
        let names: Vec<String> = names.iter().map(|s| s.as_ref().to_string()).collect();
        let resolved = resolve(&names, self.registry.aliases())?;

        let requested: HashSet<&String> = resolved.iter().collect();
        for name in &resolved {
            if !self.stage.plugins.contains_key(name) {
                warn!(plugin = %name, "not installed");
            }
        }

        let targets: Vec<String> = self
            .stage
            .installed
            .iter()
            .rev()
            .map(|handle| handle.name().to_string())
            .filter(|name| requested.contains(name))
            .collect();
        for name in targets {
            self.uninstall_one(&name);
        }
        Ok(())
    }

    fn uninstall_one(&mut self, name: &str) {
        let Some(handle) = self.stage.plugins.get(name).cloned() else {
            warn!(plugin = name, "not installed");
            return;
        };
        {
            handle.lock().uninstall(&mut self.stage);
        }
        self.stage.installed.retain(|h| h.name() != name);
        self.stage.plugins.shift_remove(name);
        self.stage.trigger(&Event::Uninstall {
            plugin: name.to_string(),
        });
    }

    /// Notify listeners of imminent destruction, then uninstall everything
    /// in reverse order. Terminal and idempotent.
    pub fn destroy(&mut self) {
        if !self.inited || self.destroyed {
            return;
        }
        self.destroyed = true;
        self.stage.trigger(&Event::Destroy);
        self.uninstall_all();
    }

    pub fn is_inited(&self) -> bool {
        self.inited
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    /// Dispatch an event through the stage.
    pub fn trigger(&mut self, event: &Event) {
        self.stage.trigger(event);
    }
}

/// Builder for [`Bootstrap`] instances.
///
/// By default the process-wide registry is snapshotted, the plugin list is
/// `["core"]`, scheduling is a [`StepScheduler`] the host pumps manually,
/// and `build()` installs the list immediately.
pub struct BootstrapBuilder {
    plugins: Vec<String>,
    overrides: HashMap<String, Options>,
    registry: Option<Registry>,
    extra_plugins: Vec<(String, PluginDef)>,
    extra_aliases: Vec<(String, Vec<String>)>,
    sources: Vec<(String, Arc<dyn BindTarget>)>,
    scheduler: Option<Arc<Mutex<dyn FrameScheduler>>>,
    clock: Option<Arc<dyn Clock>>,
    auto_init: bool,
    deferred_error: Option<ConfigError>,
}

impl BootstrapBuilder {
    pub fn new() -> Self {
        Self {
            plugins: vec!["core".to_string()],
            overrides: HashMap::new(),
            registry: None,
            extra_plugins: Vec::new(),
            extra_aliases: Vec::new(),
            sources: Vec::new(),
            scheduler: None,
            clock: None,
            auto_init: true,
            deferred_error: None,
        }
    }

    /// Replace the plugin list (default `["core"]`).
    pub fn with_plugins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plugins = names.into_iter().map(Into::into).collect();
        self
    }

    /// Per-plugin option overrides, merged over the plugin's declared
    /// defaults at install time.
    pub fn with_plugin_options<T: Serialize>(mut self, plugin: impl Into<String>, options: &T) -> Self {
        match Options::from_value(options) {
            Ok(options) => {
                self.overrides.insert(plugin.into(), options);
            }
            Err(err) => {
                self.deferred_error.get_or_insert(err);
            }
        }
        self
    }

    /// Use an explicit registry instead of the process-wide snapshot.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an instance-local plugin on top of the registry.
    pub fn with_plugin<F>(mut self, name: impl Into<String>, defaults: Options, ctor: F) -> Self
    where
        F: Fn(PluginCore) -> Box<dyn Plugin + Send> + Send + Sync + 'static,
    {
        self.extra_plugins
            .push((name.into(), PluginDef::new(defaults, ctor)));
        self
    }

    /// Register an instance-local alias on top of the registry.
    pub fn with_alias<I, S>(mut self, name: impl Into<String>, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_aliases
            .push((name.into(), plugins.into_iter().map(Into::into).collect()));
        self
    }

    /// Register a named external event source (the window analogue).
    pub fn with_source(mut self, name: impl Into<String>, source: Arc<dyn BindTarget>) -> Self {
        self.sources.push((name.into(), source));
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl FrameScheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(Mutex::new(scheduler)));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build without installing; the caller runs `init()` later.
    pub fn defer_init(mut self) -> Self {
        self.auto_init = false;
        self
    }

    pub fn build(mut self) -> Result<Bootstrap, ConfigError> {
        if let Some(err) = self.deferred_error.take() {
            return Err(err);
        }

        let mut reg = self
            .registry
            .take()
            .unwrap_or_else(registry::global_snapshot);
        for (name, def) in self.extra_plugins {
            reg.register_def(name, def);
        }
        for (name, list) in self.extra_aliases {
            reg.register_alias(name, list);
        }

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(Mutex::new(StepScheduler::new())));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        let mut stage = Stage::new(scheduler, clock);
        for (name, source) in self.sources {
            stage.add_source(name, source);
        }

        let mut bootstrap = Bootstrap {
            stage,
            registry: reg,
            overrides: self.overrides,
            requested: self.plugins,
            inited: false,
            destroyed: false,
        };
        if self.auto_init {
            bootstrap.init()?;
        }
        Ok(bootstrap)
    }
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
