//! Core runtime types for tokio-tick-fsm.

use std::fmt::Debug;
use std::hash::Hash;

mod options;

pub use options::{Options, OptionsSlot};

/// Identity under which a state is registered.
///
/// Any stable, comparable key works: an enum, a `&'static str`, an integer
/// handle. Identity assignment is left to the application.
pub trait StateId: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> StateId for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// A queued request to move the machine into `target`.
///
/// Requests are immutable once created. The optional payload is owned by the
/// request until the transition is applied and handed to the target state.
#[derive(Debug)]
pub struct TransitionRequest<K> {
    target: K,
    options: Option<Options>,
}

impl<K> TransitionRequest<K> {
    /// A request without options.
    pub fn new(target: K) -> Self {
        Self {
            target,
            options: None,
        }
    }

    /// A request carrying `options` for the target state.
    pub fn with_options(target: K, options: Options) -> Self {
        Self {
            target,
            options: Some(options),
        }
    }

    /// Identity of the state to move into.
    pub fn target(&self) -> &K {
        &self.target
    }

    /// Payload for the target state, if any.
    pub fn options(&self) -> Option<&Options> {
        self.options.as_ref()
    }

    /// Splits the request into its target and payload.
    ///
    /// The machine calls this when it applies the request.
    pub fn into_parts(self) -> (K, Option<Options>) {
        (self.target, self.options)
    }
}

/// How `stop` treats a tick that is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Graceful stop: the tick in progress, including any awaited
    /// `on_enter`/`on_exit` hook, runs to completion before the loop exits.
    Graceful,
    /// Immediate stop: the tick in progress is abandoned at its current
    /// suspension point. The request being applied is lost.
    Immediate,
}

/// Lifecycle of the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopStatus {
    /// `run` has never been called.
    #[default]
    Idle,
    Running,
    /// A stop was requested and the loop has not exited yet.
    Stopping,
    /// The loop exited, either through `stop` or because the tick source ran
    /// out.
    Stopped,
}

impl LoopStatus {
    /// `Running` or `Stopping`: a loop task is still live.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }
}

/// Current and previous state identities as last published by the machine.
///
/// `previous` is diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot<K> {
    pub current: Option<K>,
    pub previous: Option<K>,
}

impl<K> Default for StateSnapshot<K> {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }
}

/// Error applying a queued transition.
///
/// Returned from a manual tick, broadcast to error subscribers and logged. The
/// loop keeps running after it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError<K> {
    /// The target identity has no registered state. The machine is left
    /// without a current state.
    #[error("state {0:?} is not registered")]
    UnknownTargetState(K),
}

/// Error returned by the state machine's caller-facing operations.
///
/// # Type Parameters
///
/// * `K`: the state identity type of the machine.
#[derive(Debug, thiserror::Error)]
pub enum MachineError<K> {
    /// A state with this identity is already registered.
    #[error("state {0:?} is already registered")]
    DuplicateRegistration(K),
    /// The tick loop is running; the operation needs it stopped.
    #[error("state machine loop is already running")]
    AlreadyRunning,
    /// The machine was dropped, so the request has nowhere to go.
    #[error("state machine has been dropped")]
    Closed,
    /// The loop task panicked (usually inside a state hook) or was cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
