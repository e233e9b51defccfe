//! Event layer for the plugin bootstrap.
//!
//! The crate is deliberately small and generic: it defines the tagged
//! [`Event`] type shared by the whole stack, the [`EventKind`] names events
//! are keyed by, a synchronous publish/subscribe [`EventHub`], and the
//! [`OnceLatch`] one-shot trigger used for readiness notification. The hub is
//! generic over the context type handed to listeners, so this crate carries
//! no knowledge of the bootstrap kernel built on top of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ron::value::{Map as RonMap, Value as RonValue};
use strum_macros::{Display, EnumString};

/// Name of an event, used to key listener registration.
///
/// Built-in kinds round-trip through their lowercase string form; any other
/// name parses into the [`EventKind::Other`] catch-all, so host-defined
/// events need no registration step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Pre,
    Update,
    Render,
    Post,
    Ready,
    Install,
    Uninstall,
    Destroy,
    Start,
    Stop,
    Dirty,
    Change,
    Resize,
    #[strum(default)]
    Other(String),
}

/// An event dispatched through the hub.
///
/// The per-frame sequence is `Pre`, `Update`, `Render`, `Post`, in that
/// order. Lifecycle and loop events carry the minimum payload listeners
/// need; `Custom` is the escape hatch for host-defined events with a RON
/// payload.
#[derive(Debug, Clone)]
pub enum Event {
    Pre,
    Update,
    Render,
    Post,

    Ready,
    Install { plugin: String },
    Uninstall { plugin: String },
    Destroy,

    Start,
    Stop,
    Dirty,

    /// Options record changed: the full record and the diffed changes.
    Change { options: RonMap, changes: RonMap },
    /// Host-driven size notification.
    Resize { view_width: u32, view_height: u32 },

    Custom { name: String, data: RonValue },
}

impl Event {
    /// The kind this event dispatches under.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Pre => EventKind::Pre,
            Event::Update => EventKind::Update,
            Event::Render => EventKind::Render,
            Event::Post => EventKind::Post,
            Event::Ready => EventKind::Ready,
            Event::Install { .. } => EventKind::Install,
            Event::Uninstall { .. } => EventKind::Uninstall,
            Event::Destroy => EventKind::Destroy,
            Event::Start => EventKind::Start,
            Event::Stop => EventKind::Stop,
            Event::Dirty => EventKind::Dirty,
            Event::Change { .. } => EventKind::Change,
            Event::Resize { .. } => EventKind::Resize,
            // `parse` is infallible thanks to the `Other` default variant.
            Event::Custom { name, .. } => name
                .parse()
                .unwrap_or_else(|_| EventKind::Other(name.clone())),
        }
    }
}

/// Identifier returned by listener registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered listener.
///
/// Listeners are shared mutable closures: the hub snapshots the listener
/// list before dispatch, so a listener may add or remove listeners (itself
/// included) while being invoked.
pub type Listener<C> = Arc<Mutex<dyn FnMut(&Event, &mut C) + Send>>;

/// Wrap a closure into the [`Listener`] handle type.
pub fn listener<C, F>(f: F) -> Listener<C>
where
    F: FnMut(&Event, &mut C) + Send + 'static,
{
    Arc::new(Mutex::new(f))
}

struct HubState<C> {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener<C>)>>,
}

/// Synchronous publish/subscribe dispatcher.
///
/// The handle is cheap to clone (shared state behind a mutex); a context
/// object can own a hub and still be passed mutably into listeners by
/// cloning the handle before dispatch. Listeners run synchronously to
/// completion, in registration order.
pub struct EventHub<C> {
    state: Arc<Mutex<HubState<C>>>,
}

impl<C> Clone for EventHub<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C> Default for EventHub<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventHub<C> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Register a listener for an event kind.
    pub fn on(&self, kind: EventKind, listener: Listener<C>) -> ListenerId {
        let mut state = self.state.lock().unwrap();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.entry(kind).or_default().push((id, listener));
        id
    }

    /// Remove a previously registered listener. Returns `false` if the
    /// listener was not (or no longer) registered.
    pub fn off(&self, kind: &EventKind, id: ListenerId) -> bool {
        let mut state = self.state.lock().unwrap();
        if let Some(list) = state.listeners.get_mut(kind) {
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            return list.len() != before;
        }
        false
    }

    /// Dispatch an event to all listeners registered for its kind.
    ///
    /// The listener list is snapshotted first: listeners registered or
    /// removed during dispatch take effect from the next trigger on.
    pub fn trigger(&self, event: &Event, ctx: &mut C) {
        let snapshot = {
            let state = self.state.lock().unwrap();
            match state.listeners.get(&event.kind()) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for (_, listener) in snapshot {
            (listener.lock().unwrap())(event, ctx);
        }
    }

    /// Dispatch an event, then detach every listener of that kind.
    ///
    /// Each currently registered listener observes the event exactly once;
    /// listeners registered afterwards hear nothing until the kind is
    /// triggered again.
    pub fn trigger_once(&self, event: &Event, ctx: &mut C) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            match state.listeners.remove(&event.kind()) {
                Some(list) => list,
                None => return,
            }
        };
        for (_, listener) in snapshot {
            (listener.lock().unwrap())(event, ctx);
        }
    }

    /// Number of listeners currently registered for a kind.
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        let state = self.state.lock().unwrap();
        state.listeners.get(kind).map_or(0, Vec::len)
    }
}

struct LatchState<C> {
    next_id: u64,
    fired: Option<Event>,
    pending: Vec<(ListenerId, Listener<C>)>,
}

/// One-shot trigger: fires its pending listeners exactly once, then
/// discards them.
///
/// Listeners added after the latch fired are invoked immediately with the
/// stored event, so late subscribers still observe the (past) firing.
/// Repeat fires are no-ops.
pub struct OnceLatch<C> {
    state: Arc<Mutex<LatchState<C>>>,
}

impl<C> Clone for OnceLatch<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C> Default for OnceLatch<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> OnceLatch<C> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LatchState {
                next_id: 0,
                fired: None,
                pending: Vec::new(),
            })),
        }
    }

    /// Register a listener. If the latch already fired, the listener is
    /// invoked immediately with the stored event.
    pub fn listen(&self, listener: Listener<C>, ctx: &mut C) -> ListenerId {
        let (id, replay) = {
            let mut state = self.state.lock().unwrap();
            let id = ListenerId(state.next_id);
            state.next_id += 1;
            match &state.fired {
                Some(event) => (id, Some(event.clone())),
                None => {
                    state.pending.push((id, listener.clone()));
                    (id, None)
                }
            }
        };
        if let Some(event) = replay {
            (listener.lock().unwrap())(&event, ctx);
        }
        id
    }

    /// Remove a pending listener. A no-op after the latch fired.
    pub fn remove(&self, id: ListenerId) {
        let mut state = self.state.lock().unwrap();
        state.pending.retain(|(lid, _)| *lid != id);
    }

    /// Fire the latch: invoke and discard all pending listeners. Returns
    /// `false` (and does nothing) if the latch already fired.
    pub fn fire(&self, event: &Event, ctx: &mut C) -> bool {
        let pending = {
            let mut state = self.state.lock().unwrap();
            if state.fired.is_some() {
                return false;
            }
            state.fired = Some(event.clone());
            std::mem::take(&mut state.pending)
        };
        for (_, listener) in pending {
            (listener.lock().unwrap())(event, ctx);
        }
        true
    }

    pub fn fired(&self) -> bool {
        self.state.lock().unwrap().fired.is_some()
    }

    /// Pending listener count (zero once fired).
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        assert_eq!("pre".parse::<EventKind>().unwrap(), EventKind::Pre);
        assert_eq!(EventKind::Post.to_string(), "post");
        assert_eq!(
            "resize".parse::<EventKind>().unwrap(),
            EventKind::Resize
        );
        assert_eq!(
            "tick".parse::<EventKind>().unwrap(),
            EventKind::Other("tick".into())
        );
    }

    #[test]
    fn custom_event_kind_falls_back_to_name() {
        let event = Event::Custom {
            name: "orientation".into(),
            data: RonValue::Bool(true),
        };
        assert_eq!(event.kind(), EventKind::Other("orientation".into()));
    }

    #[test]
    fn trigger_reaches_listeners_in_order() {
        let hub: EventHub<Vec<&'static str>> = EventHub::new();
        hub.on(EventKind::Pre, listener(|_, log: &mut Vec<_>| log.push("a")));
        hub.on(EventKind::Pre, listener(|_, log: &mut Vec<_>| log.push("b")));
        hub.on(EventKind::Post, listener(|_, log: &mut Vec<_>| log.push("x")));

        let mut log = Vec::new();
        hub.trigger(&Event::Pre, &mut log);
        assert_eq!(log, vec!["a", "b"]);
    }

    #[test]
    fn off_removes_exactly_one_listener() {
        let hub: EventHub<u32> = EventHub::new();
        let id = hub.on(EventKind::Update, listener(|_, n: &mut u32| *n += 1));
        hub.on(EventKind::Update, listener(|_, n: &mut u32| *n += 10));

        assert!(hub.off(&EventKind::Update, id));
        assert!(!hub.off(&EventKind::Update, id));

        let mut n = 0;
        hub.trigger(&Event::Update, &mut n);
        assert_eq!(n, 10);
    }

    #[test]
    fn trigger_once_detaches_listeners() {
        let hub: EventHub<u32> = EventHub::new();
        hub.on(EventKind::Ready, listener(|_, n: &mut u32| *n += 1));

        let mut n = 0;
        hub.trigger_once(&Event::Ready, &mut n);
        hub.trigger_once(&Event::Ready, &mut n);
        assert_eq!(n, 1);
        assert_eq!(hub.listener_count(&EventKind::Ready), 0);
    }

    #[test]
    fn latch_fires_pending_once_and_replays_late_listeners() {
        let latch: OnceLatch<Vec<&'static str>> = OnceLatch::new();
        let mut log = Vec::new();

        latch.listen(listener(|_, log: &mut Vec<_>| log.push("early")), &mut log);
        assert!(latch.fire(&Event::Ready, &mut log));
        assert!(!latch.fire(&Event::Ready, &mut log));

        latch.listen(listener(|_, log: &mut Vec<_>| log.push("late")), &mut log);
        assert_eq!(log, vec!["early", "late"]);
        assert_eq!(latch.pending_count(), 0);
    }

    #[test]
    fn latch_remove_drops_pending_listener() {
        let latch: OnceLatch<u32> = OnceLatch::new();
        let mut n = 0;
        let id = latch.listen(listener(|_, n: &mut u32| *n += 1), &mut n);
        latch.remove(id);
        latch.fire(&Event::Ready, &mut n);
        assert_eq!(n, 0);
    }
}
