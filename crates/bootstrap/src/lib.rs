//! Plugin bootstrap kernel for a rendering stack.
//!
//! The crate composes a running context out of named plugins: a process or
//! instance-local [`Registry`] maps plugin names (and alias groups) to
//! constructors, [`resolve`] expands a requested list into concrete names,
//! and a [`Bootstrap`] installs them in order against a shared [`Stage`]
//! every plugin reads and writes. Installed plugins declare the events
//! they want as bind keys (`"pre:tick"`, `"window.resize:reset"`,
//! `"this.change"`), wired up by the built-in `bind` plugin; the built-in
//! `loop` plugin drives the per-frame `pre/update/render/post` sequence
//! off the host's frame scheduler.
//!
//! The wrapped rendering library stays out of scope: hosts integrate it by
//! registering their own plugins for the graphics slots in the default
//! alias chain and by implementing the [`FrameScheduler`], [`Clock`] and
//! [`BindTarget`] seams.
//!
//! # Example
//!
//! ```ignore
//! use bootstrap::Bootstrap;
//!
//! let mut boot = Bootstrap::builder()
//!     .with_plugins(["empty"])
//!     .build()?;
//!
//! // The host pumps the frame scheduler; each pump is one tick.
//! for _ in 0..60 {
//!     boot.stage_mut().pump();
//! }
//! boot.destroy();
//! ```

pub mod binder;
pub mod bootstrap;
pub mod clock;
pub mod errors;
pub mod options;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod resolve;
pub mod scheduler;
pub mod stage;

// Re-export main types
pub use events::{Event, EventHub, EventKind, Listener, ListenerId, OnceLatch, listener};

pub use binder::{BindKey, BindTarget, Binder, ExternalSource, StageListener};
pub use bootstrap::{Bootstrap, BootstrapBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{BindError, ConfigError};
pub use options::Options;
pub use plugin::{InstallFlow, Plugin, PluginCore, PluginHandle, SimplePlugin};
pub use plugins::{
    BindPlugin, CapabilityProbe, Fallback, FallbackOptions, FallbackPlugin, LoopApi, LoopOptions,
    LoopPlugin, TimeApi, TimeData, TimeOptions, TimePlugin, register_builtins,
};
pub use registry::{
    PluginCtor, PluginDef, Registry, global_snapshot, register_alias, register_plugin,
    unregister_alias, unregister_plugin,
};
pub use resolve::resolve;
pub use scheduler::{FrameCallback, FrameScheduler, RequestId, StepScheduler};
pub use stage::{FrameHookId, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_workflow() {
        // A fresh registry with just the built-ins keeps the test hermetic.
        let mut registry = Registry::new();
        register_builtins(&mut registry);

        let mut boot = Bootstrap::builder()
            .with_registry(registry)
            .with_plugins(["fallback", "bind", "loop", "time"])
            .with_clock(ManualClock::new())
            .build()
            .expect("build bootstrap");

        assert!(boot.is_inited());
        assert_eq!(
            boot.stage().installed_names(),
            vec!["fallback", "bind", "loop", "time"]
        );

        // Readiness autostarted the loop; one pump is one tick.
        assert!(boot.stage().value::<LoopApi>().unwrap().running());
        assert!(boot.stage_mut().pump());

        boot.destroy();
        assert!(boot.is_destroyed());
        assert!(boot.stage().installed_names().is_empty());
    }
}
