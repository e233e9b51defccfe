//! Declarative event wiring.
//!
//! Plugins declare the events they want as key expressions of the form
//! `[scope[.path]*][:handler]`:
//!
//! - `"pre"`: the `pre` event on the stage itself, handler `pre`.
//! - `"pre:tick"`: same event, dispatched to the `tick` handler.
//! - `"window.resize:reset"`: the `resize` event on the external source
//!   named `window` (falling back to the stage when no such source is
//!   registered), handler `reset`.
//! - `"this.change"`: the `change` event on the subscriber's own hub.
//!
//! Targets implement the explicit [`BindTarget`] capability rather than
//! being duck-probed for listener methods; the stage records every binding
//! per subscriber so teardown is a single bulk [`Stage::unbind`] call.
//!
//! [`Stage::unbind`]: crate::stage::Stage::unbind

use std::collections::HashMap;
use std::sync::Arc;

use events::{Event, EventHub, EventKind, Listener, ListenerId};

use crate::errors::BindError;
use crate::stage::Stage;

/// Listener closure over the shared stage.
pub type StageListener = Listener<Stage>;

/// Explicit event-registration capability a bind target must implement.
pub trait BindTarget: Send + Sync {
    fn attach(&self, kind: &EventKind, listener: StageListener) -> ListenerId;
    fn detach(&self, kind: &EventKind, id: ListenerId);

    /// Traverse one path segment below this target. The default has no
    /// children, so multi-segment keys fail on targets without structure.
    fn child(&self, _name: &str) -> Option<Arc<dyn BindTarget>> {
        None
    }
}

/// Named host-side event source (the window analogue).
///
/// Hosts keep a handle and push events in with [`ExternalSource::emit`];
/// plugins reach it by name through their `listen` keys.
pub struct ExternalSource {
    name: String,
    hub: EventHub<Stage>,
}

impl ExternalSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hub: EventHub::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch an event to everything bound to this source.
    pub fn emit(&self, event: &Event, stage: &mut Stage) {
        self.hub.trigger(event, stage);
    }

    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.hub.listener_count(kind)
    }
}

impl BindTarget for ExternalSource {
    fn attach(&self, kind: &EventKind, listener: StageListener) -> ListenerId {
        self.hub.on(kind.clone(), listener)
    }

    fn detach(&self, kind: &EventKind, id: ListenerId) {
        self.hub.off(kind, id);
    }
}

/// Parsed bind key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindKey {
    /// Leading scope segments (everything before the event name).
    pub scope_path: Vec<String>,
    /// The event to listen for (last path segment).
    pub event: EventKind,
    /// Subscriber handler to dispatch to (colon suffix, defaulting to the
    /// event name).
    pub handler: String,
}

impl BindKey {
    pub fn parse(input: &str) -> Result<Self, BindError> {
        let (path_part, handler_part) = match input.split_once(':') {
            Some((path, handler)) => (path, Some(handler)),
            None => (input, None),
        };

        let mut segments: Vec<&str> = path_part.split('.').collect();
        let event_name = match segments.pop() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(BindError::MalformedKey(input.to_string())),
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(BindError::MalformedKey(input.to_string()));
        }

        let event = event_name
            .parse()
            .unwrap_or_else(|_| EventKind::Other(event_name.to_string()));
        let handler = match handler_part {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => event_name.to_string(),
        };

        Ok(Self {
            scope_path: segments.into_iter().map(str::to_string).collect(),
            event,
            handler,
        })
    }
}

/// Where a binding was attached, kept for detach.
pub(crate) enum BoundTarget {
    /// The stage's own hub (the ready latch for `ready` bindings).
    Hub,
    /// An external source, possibly reached through `child` traversal.
    Source(Arc<dyn BindTarget>),
    /// The subscriber's own hub (`this.*` keys).
    Own(EventHub<Stage>),
}

pub(crate) struct BindRecord {
    pub(crate) target: BoundTarget,
    pub(crate) kind: EventKind,
    pub(crate) id: ListenerId,
}

/// Binding records per subscriber, for bulk teardown.
#[derive(Default)]
pub struct Binder {
    binds: HashMap<String, Vec<BindRecord>>,
}

impl Binder {
    pub(crate) fn record(&mut self, subscriber: &str, record: BindRecord) {
        self.binds
            .entry(subscriber.to_string())
            .or_default()
            .push(record);
    }

    pub(crate) fn take(&mut self, subscriber: &str) -> Vec<BindRecord> {
        self.binds.remove(subscriber).unwrap_or_default()
    }

    /// Number of live bindings recorded for a subscriber.
    pub fn bound_count(&self, subscriber: &str) -> usize {
        self.binds.get(subscriber).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_event_name() {
        let key = BindKey::parse("pre").unwrap();
        assert!(key.scope_path.is_empty());
        assert_eq!(key.event, EventKind::Pre);
        assert_eq!(key.handler, "pre");
    }

    #[test]
    fn handler_suffix_overrides_name() {
        let key = BindKey::parse("pre:tick").unwrap();
        assert_eq!(key.event, EventKind::Pre);
        assert_eq!(key.handler, "tick");
    }

    #[test]
    fn scoped_key_with_handler() {
        let key = BindKey::parse("window.resize:reset").unwrap();
        assert_eq!(key.scope_path, vec!["window".to_string()]);
        assert_eq!(key.event, EventKind::Resize);
        assert_eq!(key.handler, "reset");
    }

    #[test]
    fn this_scope_parses() {
        let key = BindKey::parse("this.change").unwrap();
        assert_eq!(key.scope_path, vec!["this".to_string()]);
        assert_eq!(key.event, EventKind::Change);
        assert_eq!(key.handler, "change");
    }

    #[test]
    fn empty_handler_suffix_falls_back_to_event_name() {
        let key = BindKey::parse("dirty:").unwrap();
        assert_eq!(key.handler, "dirty");
    }

    #[test]
    fn unknown_event_names_are_custom_kinds() {
        let key = BindKey::parse("window.orientation").unwrap();
        assert_eq!(key.event, EventKind::Other("orientation".into()));
    }

    #[test]
    fn malformed_keys_error() {
        assert!(BindKey::parse("").is_err());
        assert!(BindKey::parse(":handler").is_err());
        assert!(BindKey::parse("window.").is_err());
        assert!(BindKey::parse("a..b").is_err());
    }
}
