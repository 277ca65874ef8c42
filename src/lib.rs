//! # tokio-tick-fsm
//!
//! Tick-driven Tokio finite state machines. States have async `on_enter` and
//! `on_exit` hooks; transitions are requested from anywhere, queued, and
//! applied in order on the next tick, followed by the current state's
//! `on_update`.
//!
//! ## Example
//!
//! ```rust
//! use tokio_tick_fsm::{
//!     MachineHandle, Options, OptionsSlot, State, StateMachine, async_trait, manual_ticks,
//! };
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Scene {
//!     Menu,
//!     Game,
//! }
//!
//! struct Menu {
//!     machine: Option<MachineHandle<Scene>>,
//! }
//!
//! #[async_trait]
//! impl State<Scene> for Menu {
//!     fn id(&self) -> Scene {
//!         Scene::Menu
//!     }
//!
//!     fn on_register(&mut self, machine: MachineHandle<Scene>) {
//!         self.machine = Some(machine);
//!     }
//!
//!     async fn on_enter(&mut self) {
//!         if let Some(machine) = &self.machine {
//!             let _ = machine.request_transition_with(Scene::Game, 3_u32);
//!         }
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Game {
//!     level: OptionsSlot<u32>,
//! }
//!
//! #[async_trait]
//! impl State<Scene> for Game {
//!     fn id(&self) -> Scene {
//!         Scene::Game
//!     }
//!
//!     fn set_options(&mut self, options: Options) -> bool {
//!         self.level.accept(options)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut machine = StateMachine::new();
//! machine.register_state(Menu { machine: None }).unwrap();
//! machine.register_state(Game::default()).unwrap();
//! machine.request_transition(Scene::Menu).unwrap();
//!
//! let (driver, ticks) = manual_ticks();
//! let handle = machine.handle();
//! machine.run(ticks).unwrap();
//!
//! driver.tick();
//! handle.wait_for_state(&Scene::Game).await.unwrap();
//! machine.stop().await.unwrap();
//! # }
//! ```

mod config;
mod handle;
mod machine;
mod state;
mod tick;

pub use async_trait::async_trait;

pub use crate::config::{
    ConfigError, DEFAULT_ERROR_CAPACITY, DEFAULT_TICK_PERIOD, MachineConfig, MissedTicks,
};
pub use crate::handle::MachineHandle;
pub use crate::machine::{StateMachine, TickReport};
pub use crate::state::State;
pub use crate::tick::{
    IntervalTicks, ManualTicks, Take, Tick, TickDriver, TickSent, TickSource, TickSourceExt,
    manual_ticks, manual_ticks_bounded,
};
#[doc(inline)]
pub use tokio_tick_fsm_core::*;
