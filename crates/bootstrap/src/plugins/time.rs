//! The `time` plugin: frame timing and an adjustable clock.
//!
//! On every `pre` event it samples the host clock and publishes wall time,
//! per-frame delta, an adjustable clock scaled by `speed`, an exponential
//! moving average of the frame time and the derived FPS. Deltas larger
//! than `timeout` are treated as a pause and contribute nothing; the first
//! `warmup` frames hold the adjustable clock at zero.

use std::sync::{Arc, Mutex};

use events::Event;
use serde::{Deserialize, Serialize};

use crate::options::Options;
use crate::plugin::{InstallFlow, Plugin, PluginCore};
use crate::registry::Registry;
use crate::stage::Stage;

pub(crate) fn register(registry: &mut Registry) {
    registry.register(
        "time",
        Options::from_value(&TimeOptions::default()).expect("serialize time defaults"),
        |core| {
            Box::new(TimePlugin {
                core,
                data: Arc::new(Mutex::new(TimeData::default())),
                last: None,
                time: 0.0,
                clock: 0.0,
                wait: 0,
                clock_start: 0.0,
                time_start: 0.0,
            })
        },
    );
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOptions {
    /// Adjustable clock speed multiplier.
    pub speed: f64,
    /// Frames to wait before the adjustable clock starts counting.
    pub warmup: u32,
    /// Seconds without a tick after which the clock pauses instead of
    /// jumping.
    pub timeout: f64,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            warmup: 0,
            timeout: 1.0,
        }
    }
}

/// Published timing snapshot.
#[derive(Debug, Clone)]
pub struct TimeData {
    /// Host clock reading at the last tick, in seconds.
    pub now: f64,
    /// Adjustable clock counting up from zero.
    pub clock: f64,
    /// Adjustable clock step this frame.
    pub step: f64,
    /// Ticks observed.
    pub frames: u64,
    /// Real time since the clock started.
    pub time: f64,
    /// Real frame step in seconds.
    pub delta: f64,
    /// Exponential moving average of the frame time.
    pub average: f64,
    /// Frames per second derived from the average.
    pub fps: f64,
}

impl Default for TimeData {
    fn default() -> Self {
        Self {
            now: 0.0,
            clock: 0.0,
            step: 1.0 / 60.0,
            frames: 0,
            time: 0.0,
            delta: 1.0 / 60.0,
            average: 0.0,
            fps: 0.0,
        }
    }
}

/// Timing access published into the stage value store.
#[derive(Clone)]
pub struct TimeApi {
    data: Arc<Mutex<TimeData>>,
}

impl TimeApi {
    pub fn snapshot(&self) -> TimeData {
        self.data.lock().unwrap().clone()
    }
}

pub struct TimePlugin {
    core: PluginCore,
    data: Arc<Mutex<TimeData>>,
    last: Option<f64>,
    time: f64,
    clock: f64,
    wait: u32,
    clock_start: f64,
    time_start: f64,
}

impl Plugin for TimePlugin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    // `change` has no matching handler on purpose: re-reading the options
    // record on the next tick is enough.
    fn listen(&self) -> &[&'static str] {
        &["pre:tick", "this.change"]
    }

    fn install(&mut self, stage: &mut Stage) -> InstallFlow {
        let options: TimeOptions = self.core.options().to_struct().unwrap_or_default();
        *self.data.lock().unwrap() = TimeData {
            now: stage.clock().now(),
            ..TimeData::default()
        };
        self.last = None;
        self.time = 0.0;
        self.clock = 0.0;
        self.wait = options.warmup;
        self.clock_start = 0.0;
        self.time_start = 0.0;

        stage.insert_value(TimeApi {
            data: Arc::clone(&self.data),
        });
        InstallFlow::Continue
    }

    fn uninstall(&mut self, stage: &mut Stage) {
        stage.remove_value::<TimeApi>();
    }

    fn handle(&mut self, handler: &str, _event: &Event, stage: &mut Stage) {
        if handler != "tick" {
            return;
        }
        let options: TimeOptions = self.core.options().to_struct().unwrap_or_default();
        let now = stage.clock().now();
        let mut data = self.data.lock().unwrap();
        data.now = now;

        if let Some(last) = self.last {
            let full_delta = now - last;
            data.delta = full_delta;

            // Average seeds from the first delta; a timed-out delta still
            // seeds it but contributes no clock movement.
            let average = if data.average == 0.0 {
                full_delta
            } else {
                data.average
            };
            let delta = if full_delta > options.timeout {
                0.0
            } else {
                full_delta
            };
            let step = delta * options.speed;

            self.time += delta;
            self.clock += step;

            if data.frames > 0 {
                data.average = average + (delta - average) * 0.1;
                data.fps = 1.0 / average;
            }

            data.step = step;
            data.clock = self.clock - self.clock_start;
            data.time = self.time - self.time_start;
            data.frames += 1;

            if self.wait > 0 {
                self.wait -= 1;
                self.clock_start = self.clock;
                self.time_start = self.time;
                data.clock = 0.0;
                data.step = 1e-100;
            }
        }

        self.last = Some(now);
    }
}
