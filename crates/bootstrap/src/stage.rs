//! The shared mutable context all installed plugins read and write.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use events::{Event, EventHub, EventKind, ListenerId, OnceLatch};
use indexmap::IndexMap;
use tracing::debug;

use crate::binder::{BindKey, BindRecord, BindTarget, Binder, BoundTarget, StageListener};
use crate::clock::Clock;
use crate::errors::BindError;
use crate::plugin::PluginHandle;
use crate::scheduler::{FrameCallback, FrameScheduler, RequestId};

/// Handle to a registered frame hook, needed for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHookId(u64);

type FrameHook = Box<dyn FnMut(&mut Stage) + Send>;

#[derive(Default)]
struct FrameHooks {
    next_id: u64,
    hooks: Vec<(FrameHookId, FrameHook)>,
    // Hooks removed while a frame is running are tombstoned and dropped
    // when the hook list is restored.
    dead: HashSet<FrameHookId>,
}

/// Shared context: one per bootstrap instance, exclusively owned by it for
/// its lifetime.
///
/// Carries the installed plugin tables, the event hub (plus the one-shot
/// ready latch), the binder records, named external event sources, a typed
/// value store for plugin-published state (a renderer handle, a time API),
/// the per-frame hook list, and the host scheduler/clock seams.
///
/// Everything runs single-threaded and cooperatively: handlers execute
/// synchronously to completion inside the trigger that reaches them. A
/// handler runs under its plugin's lock, so it must not trigger an event
/// kind that dispatches back into the same plugin.
pub struct Stage {
    hub: EventHub<Stage>,
    ready: OnceLatch<Stage>,
    binder: Binder,
    pub(crate) plugins: IndexMap<String, PluginHandle>,
    pub(crate) installed: Vec<PluginHandle>,
    sources: HashMap<String, Arc<dyn BindTarget>>,
    values: HashMap<TypeId, Box<dyn Any + Send>>,
    frame_hooks: Arc<Mutex<FrameHooks>>,
    scheduler: Arc<Mutex<dyn FrameScheduler>>,
    clock: Arc<dyn Clock>,
}

impl Stage {
    pub(crate) fn new(scheduler: Arc<Mutex<dyn FrameScheduler>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            hub: EventHub::new(),
            ready: OnceLatch::new(),
            binder: Binder::default(),
            plugins: IndexMap::new(),
            installed: Vec::new(),
            sources: HashMap::new(),
            values: HashMap::new(),
            frame_hooks: Arc::new(Mutex::new(FrameHooks::default())),
            scheduler,
            clock,
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Dispatch an event to everything listening on the stage. `ready`
    /// routes through the one-shot latch and fires at most once.
    pub fn trigger(&mut self, event: &Event) {
        if event.kind() == EventKind::Ready {
            let latch = self.ready.clone();
            latch.fire(event, self);
        } else {
            let hub = self.hub.clone();
            hub.trigger(event, self);
        }
    }

    /// Register a listener on the stage. A `ready` listener registered
    /// after readiness is replayed immediately.
    pub fn on(&mut self, kind: EventKind, listener: StageListener) -> ListenerId {
        if kind == EventKind::Ready {
            let latch = self.ready.clone();
            latch.listen(listener, self)
        } else {
            self.hub.on(kind, listener)
        }
    }

    pub fn off(&mut self, kind: &EventKind, id: ListenerId) {
        if *kind == EventKind::Ready {
            self.ready.remove(id);
        } else {
            self.hub.off(kind, id);
        }
    }

    pub fn ready_fired(&self) -> bool {
        self.ready.fired()
    }

    /// Listeners currently registered on the stage for a kind (pending
    /// latch listeners for `ready`).
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        if *kind == EventKind::Ready {
            self.ready.pending_count()
        } else {
            self.hub.listener_count(kind)
        }
    }

    // ------------------------------------------------------------------
    // Plugins
    // ------------------------------------------------------------------

    pub fn plugin(&self, name: &str) -> Option<PluginHandle> {
        self.plugins.get(name).cloned()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Installed plugin names in install order.
    pub fn installed_names(&self) -> Vec<String> {
        self.installed
            .iter()
            .map(|handle| handle.name().to_string())
            .collect()
    }

    // ------------------------------------------------------------------
    // Typed value store
    // ------------------------------------------------------------------

    /// Publish a value, returning the previous one of the same type.
    pub fn insert_value<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn value<T: Any + Send>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    pub fn value_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    pub fn remove_value<T: Any + Send>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn has_value<T: Any + Send>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    // ------------------------------------------------------------------
    // External sources
    // ------------------------------------------------------------------

    pub fn add_source(&mut self, name: impl Into<String>, source: Arc<dyn BindTarget>) {
        self.sources.insert(name.into(), source);
    }

    pub fn remove_source(&mut self, name: &str) -> Option<Arc<dyn BindTarget>> {
        self.sources.remove(name)
    }

    pub fn source(&self, name: &str) -> Option<Arc<dyn BindTarget>> {
        self.sources.get(name).cloned()
    }

    // ------------------------------------------------------------------
    // Frame hooks
    // ------------------------------------------------------------------

    /// Register a per-frame hook (the per-object render callback slot,
    /// gated by the loop's `rate` option rather than its `each` option).
    pub fn add_frame_hook<F>(&mut self, hook: F) -> FrameHookId
    where
        F: FnMut(&mut Stage) + Send + 'static,
    {
        let mut hooks = self.frame_hooks.lock().unwrap();
        let id = FrameHookId(hooks.next_id);
        hooks.next_id += 1;
        hooks.hooks.push((id, Box::new(hook)));
        id
    }

    pub fn remove_frame_hook(&mut self, id: FrameHookId) {
        let mut hooks = self.frame_hooks.lock().unwrap();
        let before = hooks.hooks.len();
        hooks.hooks.retain(|(hid, _)| *hid != id);
        if hooks.hooks.len() == before {
            // Mid-frame removal: the list is currently taken out.
            hooks.dead.insert(id);
        }
    }

    /// Invoke the registered frame hooks in registration order.
    pub fn frame(&mut self) {
        let handle = Arc::clone(&self.frame_hooks);
        let mut taken = {
            let mut hooks = handle.lock().unwrap();
            std::mem::take(&mut hooks.hooks)
        };
        for (id, hook) in taken.iter_mut() {
            let skip = handle.lock().unwrap().dead.contains(id);
            if !skip {
                hook(self);
            }
        }
        let mut hooks = handle.lock().unwrap();
        let added = std::mem::take(&mut hooks.hooks);
        hooks.hooks = taken;
        hooks.hooks.extend(added);
        let dead = std::mem::take(&mut hooks.dead);
        if !dead.is_empty() {
            hooks.hooks.retain(|(id, _)| !dead.contains(id));
        }
    }

    // ------------------------------------------------------------------
    // Host seams
    // ------------------------------------------------------------------

    pub fn request_frame(&mut self, callback: FrameCallback) -> RequestId {
        self.scheduler.lock().unwrap().request(callback)
    }

    pub fn cancel_frame(&mut self, id: RequestId) -> bool {
        self.scheduler.lock().unwrap().cancel(id)
    }

    /// Run the next due scheduled callback, if any. One call is one tick.
    pub fn pump(&mut self) -> bool {
        let due = self.scheduler.lock().unwrap().take_due();
        match due {
            Some(callback) => {
                callback(self);
                true
            }
            None => false,
        }
    }

    pub fn scheduler(&self) -> Arc<Mutex<dyn FrameScheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    // ------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------

    /// Wire one bind key for a subscriber plugin.
    ///
    /// Scope resolution: `this` selects the subscriber's own hub; a name
    /// with a registered external source selects that source; any other
    /// (or absent) scope falls back to the stage itself. Remaining path
    /// segments traverse [`BindTarget::child`] and fail the bind when they
    /// dangle.
    ///
    /// Binding `ready` after readiness replays the event immediately, so
    /// the caller must not hold the subscriber's lock.
    pub fn bind(&mut self, key: &str, subscriber: &PluginHandle) -> Result<(), BindError> {
        let parsed = BindKey::parse(key)?;

        let mut segments = parsed.scope_path.iter();
        let target = match segments.next().map(String::as_str) {
            None => BoundTarget::Hub,
            Some("this") => BoundTarget::Own(subscriber.hub()),
            Some(scope) => match self.sources.get(scope) {
                Some(source) => BoundTarget::Source(Arc::clone(source)),
                // Unknown scopes fall back to the stage itself, so keys
                // like `window.resize` still work without a registered
                // window source.
                None => BoundTarget::Hub,
            },
        };

        let target = match target {
            BoundTarget::Source(mut source) => {
                for segment in segments {
                    source = source.child(segment).ok_or_else(|| BindError::Unresolved {
                        key: key.to_string(),
                        segment: segment.clone(),
                    })?;
                }
                BoundTarget::Source(source)
            }
            other => {
                if let Some(segment) = segments.next() {
                    return Err(BindError::Unresolved {
                        key: key.to_string(),
                        segment: segment.clone(),
                    });
                }
                other
            }
        };

        let weak = subscriber.downgrade();
        let handler = parsed.handler.clone();
        let listener: StageListener = events::listener(move |event, stage: &mut Stage| {
            if let Some(plugin) = weak.upgrade() {
                plugin.lock().unwrap().handle(&handler, event, stage);
            }
        });

        let id = match &target {
            BoundTarget::Hub => self.on(parsed.event.clone(), listener),
            BoundTarget::Own(hub) => hub.on(parsed.event.clone(), listener),
            BoundTarget::Source(source) => source.attach(&parsed.event, listener),
        };

        debug!(
            subscriber = subscriber.name(),
            key,
            handler = %parsed.handler,
            "bound"
        );
        self.binder.record(
            subscriber.name(),
            BindRecord {
                target,
                kind: parsed.event,
                id,
            },
        );
        Ok(())
    }

    /// Release every binding recorded for a subscriber. Idempotent.
    pub fn unbind(&mut self, subscriber: &str) {
        for record in self.binder.take(subscriber) {
            match record.target {
                BoundTarget::Hub => self.off(&record.kind, record.id),
                BoundTarget::Own(hub) => {
                    hub.off(&record.kind, record.id);
                }
                BoundTarget::Source(source) => source.detach(&record.kind, record.id),
            }
        }
    }

    /// Live bindings recorded for a subscriber.
    pub fn bound_count(&self, subscriber: &str) -> usize {
        self.binder.bound_count(subscriber)
    }
}
