//! The `bind` plugin: declarative wiring of plugin `listen` lists.
//!
//! Subscribes to the `install`/`uninstall` lifecycle events; every plugin
//! installed afterwards gets its declared bind keys wired through the
//! stage binder, and unbound again when it is uninstalled. Wiring is not
//! retroactive: plugins installed before `bind` keep their listen lists
//! unbound.

use events::Event;
use tracing::error;

use crate::options::Options;
use crate::plugin::{InstallFlow, Plugin, PluginCore};
use crate::registry::Registry;
use crate::stage::Stage;

pub(crate) fn register(registry: &mut Registry) {
    registry.register("bind", Options::new(), |core| Box::new(BindPlugin { core }));
}

pub struct BindPlugin {
    core: PluginCore,
}

impl Plugin for BindPlugin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    fn install(&mut self, stage: &mut Stage) -> InstallFlow {
        // Wire ourselves directly: our own listen list cannot be bound by
        // us since we are not watching installs yet.
        let Some(me) = stage.plugin(self.core.name()) else {
            return InstallFlow::Continue;
        };
        for key in ["install:bind", "uninstall:unbind"] {
            if let Err(err) = stage.bind(key, &me) {
                error!(key, %err, "bind plugin failed to wire itself");
            }
        }
        InstallFlow::Continue
    }

    fn uninstall(&mut self, stage: &mut Stage) {
        stage.unbind(self.core.name());
    }

    fn handle(&mut self, handler: &str, event: &Event, stage: &mut Stage) {
        match handler {
            "bind" => {
                let Event::Install { plugin } = event else {
                    return;
                };
                // Our own install event arrives through the binding made
                // above; there is nothing to wire for it.
                if plugin == self.core.name() {
                    return;
                }
                let Some(handle) = stage.plugin(plugin) else {
                    return;
                };
                let keys = { handle.lock().listen().to_vec() };
                for key in keys {
                    if let Err(err) = stage.bind(key, &handle) {
                        error!(plugin = %plugin, key, %err, "cannot bind declared listen key");
                    }
                }
            }
            "unbind" => {
                if let Event::Uninstall { plugin } = event {
                    stage.unbind(plugin);
                }
            }
            _ => {}
        }
    }
}
