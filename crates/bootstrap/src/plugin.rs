//! Plugin trait and instance handles.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use events::{Event, EventHub};
use ron::value::Map as RonMap;

use crate::options::Options;
use crate::stage::Stage;

/// State every plugin instance carries: its installed name, its merged
/// options record, and its own event hub (the target of `this.*` bind
/// keys, e.g. `this.change`).
pub struct PluginCore {
    name: Arc<str>,
    options: Options,
    hub: EventHub<Stage>,
}

impl PluginCore {
    pub fn new(name: impl Into<Arc<str>>, options: Options) -> Self {
        Self {
            name: name.into(),
            options,
            hub: EventHub::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn hub(&self) -> &EventHub<Stage> {
        &self.hub
    }
}

/// Outcome of an install hook.
///
/// `Abort` lets a plugin short-circuit later plugins' assumptions (e.g.
/// an environment-capability fallback); the plugin is still recorded as
/// installed and is responsible for whatever state it leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallFlow {
    Continue,
    Abort,
}

/// A named, independently installable unit with lifecycle hooks and event
/// handlers against the shared stage.
pub trait Plugin: Send {
    fn core(&self) -> &PluginCore;
    fn core_mut(&mut self) -> &mut PluginCore;

    /// Event keys the `bind` plugin wires up at install time.
    fn listen(&self) -> &[&'static str] {
        &[]
    }

    fn install(&mut self, _stage: &mut Stage) -> InstallFlow {
        InstallFlow::Continue
    }

    fn uninstall(&mut self, _stage: &mut Stage) {}

    /// Dispatch a bound event to a named handler.
    ///
    /// Plugins match only the handlers they care about; an unmatched
    /// handler is deliberately a no-op, so a `listen` list may name more
    /// events than the plugin implements.
    fn handle(&mut self, _handler: &str, _event: &Event, _stage: &mut Stage) {}
}

/// A plugin with no behavior beyond its core.
///
/// Useful for hosts registering placeholder names (a scene or renderer
/// slot filled in elsewhere) and in tests.
pub struct SimplePlugin {
    core: PluginCore,
}

impl SimplePlugin {
    pub fn new(core: PluginCore) -> Self {
        Self { core }
    }
}

impl Plugin for SimplePlugin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }
}

/// Shared handle to an installed plugin instance.
///
/// The name is cached outside the lock so lists and maps can be inspected
/// without touching the instance.
#[derive(Clone)]
pub struct PluginHandle {
    name: Arc<str>,
    pub(crate) inner: Arc<Mutex<Box<dyn Plugin + Send>>>,
}

impl PluginHandle {
    pub(crate) fn new(plugin: Box<dyn Plugin + Send>) -> Self {
        let name = plugin.core().name_arc();
        Self {
            name,
            inner: Arc::new(Mutex::new(plugin)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Lock the instance. Handlers already run under this lock, so a
    /// handler must go through `&mut self`, never back through its own
    /// handle.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Plugin + Send>> {
        self.inner.lock().unwrap()
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<Box<dyn Plugin + Send>>> {
        Arc::downgrade(&self.inner)
    }

    /// Snapshot of the instance's options record.
    pub fn options(&self) -> Options {
        self.lock().core().options().clone()
    }

    /// The plugin's own event hub.
    pub fn hub(&self) -> EventHub<Stage> {
        self.lock().core().hub().clone()
    }

    /// Apply a partial options update and notify `this.change` listeners
    /// with the full record and the diff of actual changes.
    ///
    /// The instance lock is released before dispatch so change handlers
    /// can re-enter the plugin.
    pub fn set_options(&self, changes: &RonMap, stage: &mut Stage) {
        let (options, diff, hub) = {
            let mut guard = self.lock();
            let core = guard.core_mut();
            let diff = core.options_mut().set(changes);
            (core.options().map().clone(), diff, core.hub().clone())
        };
        hub.trigger(
            &Event::Change {
                options,
                changes: diff,
            },
            stage,
        );
    }
}
