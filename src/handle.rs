//! Cloneable handle onto a running or idle state machine.

use std::any::Any;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_tick_fsm_core::{
    LoopStatus, MachineError, Options, StateId, StateSnapshot, TransitionError, TransitionRequest,
};

/// Requests transitions on a machine and observes it.
///
/// States receive one in [`State::on_register`](crate::State::on_register);
/// callers get one from [`StateMachine::handle`](crate::StateMachine::handle).
/// Handles can be sent to other tasks and threads.
#[derive(Debug, Clone)]
pub struct MachineHandle<K: StateId> {
    pub(crate) requests: mpsc::UnboundedSender<TransitionRequest<K>>,
    pub(crate) snapshot_rx: watch::Receiver<StateSnapshot<K>>,
    pub(crate) status_rx: watch::Receiver<LoopStatus>,
    pub(crate) errors: broadcast::Sender<TransitionError<K>>,
}

impl<K: StateId> MachineHandle<K> {
    /// Queues a transition to `target`. It is applied on the next tick.
    pub fn request_transition(&self, target: K) -> Result<(), MachineError<K>> {
        self.enqueue(TransitionRequest::new(target))
    }

    /// Queues a transition to `target`, delivering `options` to it before its
    /// `on_enter` runs.
    pub fn request_transition_with<O: Any + Send>(
        &self,
        target: K,
        options: O,
    ) -> Result<(), MachineError<K>> {
        self.enqueue(TransitionRequest::with_options(target, Options::new(options)))
    }

    fn enqueue(&self, request: TransitionRequest<K>) -> Result<(), MachineError<K>> {
        tracing::trace!(target_state = ?request.target(), "transition requested");
        self.requests.send(request).map_err(|_| MachineError::Closed)
    }

    /// Returns the state that last finished entering, if any.
    pub fn current_state(&self) -> Option<K> {
        self.snapshot_rx.borrow().current.clone()
    }

    /// Returns the state that was current before the last exit.
    pub fn previous_state(&self) -> Option<K> {
        self.snapshot_rx.borrow().previous.clone()
    }

    /// Current and previous state as last published.
    pub fn snapshot(&self) -> StateSnapshot<K> {
        self.snapshot_rx.borrow().clone()
    }

    /// Waits until `target` is the current state.
    pub async fn wait_for_state(&self, target: &K) -> Result<(), watch::error::RecvError> {
        let mut rx = self.snapshot_rx.clone();
        while rx.borrow_and_update().current.as_ref() != Some(target) {
            rx.changed().await?;
        }
        Ok(())
    }

    /// Lifecycle of the machine's tick loop.
    pub fn status(&self) -> LoopStatus {
        *self.status_rx.borrow()
    }

    /// Waits until the tick loop reports `target`.
    pub async fn wait_for_status(&self, target: LoopStatus) -> Result<(), watch::error::RecvError> {
        let mut rx = self.status_rx.clone();
        while *rx.borrow_and_update() != target {
            rx.changed().await?;
        }
        Ok(())
    }

    /// Subscribes to failed transitions applied after this call.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<TransitionError<K>> {
        self.errors.subscribe()
    }
}
