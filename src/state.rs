//! The state-authoring API.

use async_trait::async_trait;
use tokio_tick_fsm_core::{Options, StateId};

use crate::handle::MachineHandle;

/// A unit of behaviour the machine can be in.
///
/// Every hook has a default, so a state overrides only the ones it needs. The
/// machine calls them in a fixed order for each transition:
/// `on_exit` of the outgoing state, then `set_options` (if the request carries
/// a payload) and `on_enter` of the incoming one. `on_update` runs once per tick
/// while the state is current, after that tick's transitions are applied.
///
/// # Example
///
/// ```rust
/// use tokio_tick_fsm::{MachineHandle, Options, OptionsSlot, State, async_trait};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Scene { Title, Level }
///
/// struct LevelOptions { number: u32 }
///
/// struct Level {
///     options: OptionsSlot<LevelOptions>,
///     machine: Option<MachineHandle<Scene>>,
/// }
///
/// #[async_trait]
/// impl State<Scene> for Level {
///     fn id(&self) -> Scene {
///         Scene::Level
///     }
///
///     fn on_register(&mut self, machine: MachineHandle<Scene>) {
///         self.machine = Some(machine);
///     }
///
///     fn set_options(&mut self, options: Options) -> bool {
///         self.options.accept(options)
///     }
///
///     async fn on_enter(&mut self) {
///         if self.options.get().is_none() {
///             if let Some(machine) = &self.machine {
///                 let _ = machine.request_transition(Scene::Title);
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait State<K: StateId>: Send {
    /// Identity this state is registered under.
    fn id(&self) -> K;

    /// Called once at registration with a handle to the owning machine.
    fn on_register(&mut self, _machine: MachineHandle<K>) {}

    /// Offers a transition payload to the state.
    ///
    /// Keep it if it is the expected type, ignore it otherwise. Returns whether
    /// it was kept. A mismatch is not an error.
    fn set_options(&mut self, _options: Options) -> bool {
        false
    }

    /// Runs on every transition into this state.
    async fn on_enter(&mut self) {
        tokio::task::yield_now().await;
    }

    /// Runs on every transition away from this state, and completes before the
    /// next state's `on_enter` starts.
    async fn on_exit(&mut self) {
        tokio::task::yield_now().await;
    }

    /// Runs once per tick while this state is current.
    fn on_update(&mut self) {}
}

