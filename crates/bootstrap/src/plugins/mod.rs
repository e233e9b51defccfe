//! Built-in plugins and the default alias chain.

mod bind;
mod fallback;
mod frame_loop;
mod time;

pub use bind::BindPlugin;
pub use fallback::{CapabilityProbe, Fallback, FallbackOptions, FallbackPlugin};
pub use frame_loop::{LoopApi, LoopOptions, LoopPlugin};
pub use time::{TimeApi, TimeData, TimeOptions, TimePlugin};

use crate::registry::Registry;

pub(crate) fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    register_builtins(&mut registry);
    registry
}

/// Register the built-in plugins and default alias groups.
///
/// The graphics-side names in the groups (`renderer`, `size`, `fill`,
/// `scene`, `camera`, `render`, `warmup`) are slots the host fills by
/// registering its own plugins against the wrapped rendering library;
/// resolving them always succeeds, installing them unregistered is a
/// configuration error.
pub fn register_builtins(registry: &mut Registry) {
    bind::register(registry);
    fallback::register(registry);
    frame_loop::register(registry);
    time::register(registry);

    registry.register_alias(
        "empty",
        ["fallback", "bind", "renderer", "size", "fill", "loop", "time"],
    );
    registry.register_alias("core", ["empty", "scene", "camera", "render", "warmup"]);
}
