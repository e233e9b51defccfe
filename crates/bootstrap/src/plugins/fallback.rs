//! The `fallback` plugin: environment capability probing.
//!
//! First in the default install order. It consults a host-registered
//! [`CapabilityProbe`] (a missing probe counts as capable) and publishes a
//! [`Fallback`] marker either way; when the environment fails the probe,
//! or the `force` option demands it, the install hook aborts so later
//! plugins can degrade.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::options::Options;
use crate::plugin::{InstallFlow, Plugin, PluginCore};
use crate::registry::Registry;
use crate::stage::Stage;

pub(crate) fn register(registry: &mut Registry) {
    registry.register(
        "fallback",
        Options::from_value(&FallbackOptions::default()).expect("serialize fallback defaults"),
        |core| Box::new(FallbackPlugin { core }),
    );
}

/// Host-registered capability check, placed in the stage value store
/// before install (the WebGL-availability analogue).
pub struct CapabilityProbe(Box<dyn Fn() -> bool + Send>);

impl CapabilityProbe {
    pub fn new<F>(probe: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        Self(Box::new(probe))
    }

    pub fn probe(&self) -> bool {
        (self.0)()
    }
}

/// Marker published by the plugin: `Fallback(true)` means the environment
/// failed the probe and the install was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback(pub bool);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FallbackOptions {
    /// Treat the environment as incapable regardless of the probe.
    pub force: bool,
}

pub struct FallbackPlugin {
    core: PluginCore,
}

impl Plugin for FallbackPlugin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    fn install(&mut self, stage: &mut Stage) -> InstallFlow {
        let options: FallbackOptions = self.core.options().to_struct().unwrap_or_default();
        let capable = stage
            .value::<CapabilityProbe>()
            .map(CapabilityProbe::probe)
            .unwrap_or(true);

        if capable && !options.force {
            stage.insert_value(Fallback(false));
            InstallFlow::Continue
        } else {
            warn!("environment failed capability probe, entering fallback");
            stage.insert_value(Fallback(true));
            InstallFlow::Abort
        }
    }

    fn uninstall(&mut self, stage: &mut Stage) {
        stage.remove_value::<Fallback>();
    }
}
