//! Example: scene flow for a small game, driven by a fixed-rate tick.
//!
//! Run with `RUST_LOG=debug cargo run --example scenes` to see the machine's
//! own logging.

use std::time::Duration;

use tokio_tick_fsm::{
    LoopStatus, MachineConfig, MachineHandle, Options, OptionsSlot, State, StateMachine,
    TickSourceExt, async_trait,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Scene {
    Loading,
    Level,
    Results,
}

#[derive(Debug)]
struct LevelOptions {
    number: u32,
}

#[derive(Debug)]
struct Score {
    points: u64,
}

struct Loading {
    machine: Option<MachineHandle<Scene>>,
}

#[async_trait]
impl State<Scene> for Loading {
    fn id(&self) -> Scene {
        Scene::Loading
    }

    fn on_register(&mut self, machine: MachineHandle<Scene>) {
        self.machine = Some(machine);
    }

    async fn on_enter(&mut self) {
        // Simulate asset loading
        tokio::time::sleep(Duration::from_millis(30)).await;
        if let Some(machine) = &self.machine {
            let _ = machine.request_transition_with(Scene::Level, LevelOptions { number: 1 });
        }
    }
}

#[derive(Default)]
struct Level {
    options: OptionsSlot<LevelOptions>,
    machine: Option<MachineHandle<Scene>>,
    frames: u64,
}

#[async_trait]
impl State<Scene> for Level {
    fn id(&self) -> Scene {
        Scene::Level
    }

    fn on_register(&mut self, machine: MachineHandle<Scene>) {
        self.machine = Some(machine);
    }

    fn set_options(&mut self, options: Options) -> bool {
        self.options.accept(options)
    }

    async fn on_enter(&mut self) {
        self.frames = 0;
        if let Some(level) = self.options.get() {
            tracing::info!(level = level.number, "level started");
        }
    }

    fn on_update(&mut self) {
        self.frames += 1;
        if self.frames == 20 {
            if let Some(machine) = &self.machine {
                let _ = machine.request_transition_with(
                    Scene::Results,
                    Score {
                        points: self.frames * 10,
                    },
                );
            }
        }
    }
}

#[derive(Default)]
struct Results {
    score: OptionsSlot<Score>,
}

#[async_trait]
impl State<Scene> for Results {
    fn id(&self) -> Scene {
        Scene::Results
    }

    fn set_options(&mut self, options: Options) -> bool {
        self.score.accept(options)
    }

    async fn on_enter(&mut self) {
        if let Some(score) = self.score.get() {
            tracing::info!(points = score.points, "level complete");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = MachineConfig::default().with_tick_period("16ms")?;
    let mut machine = StateMachine::with_config(&config)?;
    machine.register_state(Loading { machine: None })?;
    machine.register_state(Level::default())?;
    machine.register_state(Results::default())?;

    let handle = machine.handle();
    machine.request_transition(Scene::Loading)?;
    machine.run(config.interval_ticks()?.take(40))?;

    handle.wait_for_state(&Scene::Results).await?;
    handle.wait_for_status(LoopStatus::Stopped).await?;
    machine.stop().await?;

    tracing::info!(previous = ?machine.previous_state(), current = ?machine.current_state(), "done");
    Ok(())
}
