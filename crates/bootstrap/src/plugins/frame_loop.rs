//! The `loop` plugin: the per-frame scheduler.
//!
//! Drives a single self-sustaining tick chain off the host frame
//! scheduler. Each tick reschedules itself first, then advances a
//! sub-counter modulo the `each` option; only when it wraps does the full
//! `pre/update/render/post` event sequence fire. Independently, the `rate`
//! option gates how often the stage frame hooks run. The frame counter
//! advances every tick regardless of either gate.

use std::sync::{Arc, Mutex};

use events::Event;
use serde::{Deserialize, Serialize};

use crate::options::Options;
use crate::plugin::{InstallFlow, Plugin, PluginCore};
use crate::registry::Registry;
use crate::scheduler::FrameCallback;
use crate::stage::Stage;

pub(crate) fn register(registry: &mut Registry) {
    registry.register(
        "loop",
        Options::from_value(&LoopOptions::default()).expect("serialize loop defaults"),
        |core| {
            Box::new(LoopPlugin {
                core,
                state: Arc::new(Mutex::new(LoopState::default())),
            })
        },
    );
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopOptions {
    /// Autostart when readiness fires.
    pub start: bool,
    /// Allow `dirty` events to force-start a stopped loop.
    pub force: bool,
    /// Run the frame hooks every `rate`-th tick.
    pub rate: u32,
    /// Fire the event sequence every `each`-th tick.
    pub each: u32,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            start: true,
            force: true,
            rate: 1,
            each: 1,
        }
    }
}

#[derive(Debug, Default)]
struct LoopState {
    running: bool,
    pending: bool,
    frame: u64,
    sub: u32,
    last_request: Option<crate::scheduler::RequestId>,
}

/// Loop control published into the stage value store.
#[derive(Clone)]
pub struct LoopApi {
    name: Arc<str>,
    state: Arc<Mutex<LoopState>>,
}

impl LoopApi {
    pub fn running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Ticks elapsed since the last counter reset.
    pub fn frame(&self) -> u64 {
        self.state.lock().unwrap().frame
    }

    pub fn start(&self, stage: &mut Stage) {
        start(&self.name, &self.state, stage);
    }

    pub fn stop(&self, stage: &mut Stage) {
        stop(&self.state, stage);
    }
}

pub struct LoopPlugin {
    core: PluginCore,
    state: Arc<Mutex<LoopState>>,
}

impl LoopPlugin {
    fn options(&self) -> LoopOptions {
        self.core
            .options()
            .to_struct()
            .unwrap_or_default()
    }
}

impl Plugin for LoopPlugin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    fn listen(&self) -> &[&'static str] {
        &["ready", "window.resize:reset", "dirty", "post"]
    }

    fn install(&mut self, stage: &mut Stage) -> InstallFlow {
        *self.state.lock().unwrap() = LoopState::default();
        stage.insert_value(LoopApi {
            name: self.core.name_arc(),
            state: Arc::clone(&self.state),
        });
        InstallFlow::Continue
    }

    fn uninstall(&mut self, stage: &mut Stage) {
        stop(&self.state, stage);
        stage.remove_value::<LoopApi>();
    }

    fn handle(&mut self, handler: &str, _event: &Event, stage: &mut Stage) {
        match handler {
            "ready" => {
                if self.options().start {
                    start(&self.core.name_arc(), &self.state, stage);
                }
            }
            "reset" => {
                self.state.lock().unwrap().frame = 0;
            }
            "dirty" => {
                let force = self.options().force;
                let restart = {
                    let mut state = self.state.lock().unwrap();
                    if !state.running && force && !state.pending {
                        state.frame = 0;
                        state.pending = true;
                        true
                    } else {
                        false
                    }
                };
                if restart {
                    start(&self.core.name_arc(), &self.state, stage);
                }
            }
            "post" => {
                self.state.lock().unwrap().pending = false;
            }
            _ => {}
        }
    }
}

fn start(name: &Arc<str>, state: &Arc<Mutex<LoopState>>, stage: &mut Stage) {
    {
        let mut s = state.lock().unwrap();
        if s.running {
            return;
        }
        s.running = true;
        s.sub = 0;
    }
    let request = stage.request_frame(make_tick(Arc::clone(name), Arc::clone(state)));
    state.lock().unwrap().last_request = Some(request);
    stage.trigger(&Event::Start);
}

fn stop(state: &Arc<Mutex<LoopState>>, stage: &mut Stage) {
    let request = {
        let mut s = state.lock().unwrap();
        if !s.running {
            return;
        }
        s.running = false;
        s.last_request.take()
    };
    if let Some(id) = request {
        stage.cancel_frame(id);
    }
    stage.trigger(&Event::Stop);
}

fn make_tick(name: Arc<str>, state: Arc<Mutex<LoopState>>) -> FrameCallback {
    Box::new(move |stage: &mut Stage| tick(&name, &state, stage))
}

fn tick(name: &Arc<str>, state: &Arc<Mutex<LoopState>>, stage: &mut Stage) {
    // Cooperative cancellation: a tick already queued when the loop
    // stopped must exit without side effects.
    if !state.lock().unwrap().running {
        return;
    }

    // Reschedule immediately so the chain self-sustains.
    let next = stage.request_frame(make_tick(Arc::clone(name), Arc::clone(state)));
    state.lock().unwrap().last_request = Some(next);

    // Divisors are read live so option changes apply mid-run.
    let options: LoopOptions = stage
        .plugin(name)
        .map(|handle| handle.options().to_struct().unwrap_or_default())
        .unwrap_or_default();

    let fire_events = {
        let mut s = state.lock().unwrap();
        s.sub = (s.sub + 1) % options.each.max(1);
        s.sub == 0
    };
    if fire_events {
        for event in [Event::Pre, Event::Update, Event::Render, Event::Post] {
            stage.trigger(&event);
        }
    }

    let run_hooks = {
        let s = state.lock().unwrap();
        options.rate <= 1 || s.frame % u64::from(options.rate) == 0
    };
    if run_hooks {
        stage.frame();
    }

    state.lock().unwrap().frame += 1;
}
