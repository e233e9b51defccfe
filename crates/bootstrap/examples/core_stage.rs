//! Boots the default `core` plugin group with stand-in graphics plugins.
//!
//! The kernel ships lifecycle, binding, loop and time plugins; the graphics
//! slots in the default alias chain (`renderer`, `size`, `fill`, `scene`,
//! `camera`, `render`, `warmup`) belong to the host integration. This
//! example fills them with minimal stand-ins, pumps the frame loop for two
//! simulated seconds and prints the timing stats.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use bootstrap::{
    Bootstrap, Event, InstallFlow, LoopApi, ManualClock, Options, Plugin, PluginCore,
    SimplePlugin, Stage, TimeApi,
};

/// Stand-in for the host's render plugin: counts draws instead of drawing.
struct RenderStandin {
    core: PluginCore,
    drawn: Arc<AtomicUsize>,
}

impl Plugin for RenderStandin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PluginCore {
        &mut self.core
    }

    fn listen(&self) -> &[&'static str] {
        &["render"]
    }

    fn install(&mut self, _stage: &mut Stage) -> InstallFlow {
        println!("   render stand-in installed");
        InstallFlow::Continue
    }

    fn handle(&mut self, handler: &str, _event: &Event, _stage: &mut Stage) {
        if handler == "render" {
            self.drawn.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("=== Core Stage Example ===\n");

    let drawn = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&drawn);
    let clock = ManualClock::new();

    let mut builder = Bootstrap::builder().with_clock(clock.clone());
    // Fill the graphics slots of the `core` group with stand-ins.
    for slot in ["renderer", "size", "fill", "scene", "camera", "warmup"] {
        builder = builder.with_plugin(slot, Options::new(), |core| {
            Box::new(SimplePlugin::new(core))
        });
    }
    builder = builder.with_plugin("render", Options::new(), move |core| {
        Box::new(RenderStandin {
            core,
            drawn: Arc::clone(&counter),
        })
    });

    println!("📦 Installing the default `core` group:");
    let mut boot = builder.build()?;
    for name in boot.stage().installed_names() {
        println!("   - {name}");
    }
    println!();

    // The host owns the clock and the scheduler: advance one 60 Hz frame
    // per pump, two simulated seconds in total.
    for _ in 0..120 {
        clock.advance(1.0 / 60.0);
        boot.stage_mut().pump();
    }

    let loop_api = boot.stage().value::<LoopApi>().expect("loop api");
    let time = boot.stage().value::<TimeApi>().expect("time api").snapshot();

    println!("⏱  After 120 pumped frames:");
    println!("   loop running: {}", loop_api.running());
    println!("   frames:       {}", time.frames);
    println!("   clock:        {:.3}s", time.clock);
    println!("   delta:        {:.4}s", time.delta);
    println!("   fps:          {:.1}", time.fps);
    println!("   draws:        {}", drawn.load(Ordering::SeqCst));
    println!();

    boot.destroy();
    println!("🧹 Destroyed: {} plugins left", boot.stage().installed_names().len());

    Ok(())
}
