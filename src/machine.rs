//! The state machine and its tick loop.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tick_fsm_core::{
    LoopStatus, MachineError, StateId, StateSnapshot, StopMode, TransitionError,
    TransitionRequest,
};

use crate::config::{ConfigError, MachineConfig};
use crate::handle::MachineHandle;
use crate::state::State;
use crate::tick::TickSource;

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport<K> {
    /// Sequence number of the tick, starting at 1 and kept across stop/run.
    pub tick: u64,
    /// Transitions applied successfully.
    pub applied: usize,
    /// Transitions that failed, in the order they were dequeued.
    pub failed: Vec<TransitionError<K>>,
    /// Whether a state was current after the drain and got its `on_update`.
    pub updated: bool,
}

/// Hook a transition is currently suspended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Exiting,
    Entering,
}

/// Everything the loop touches. Locked for the whole of a tick.
struct Core<K: StateId> {
    states: HashMap<K, Box<dyn State<K>>>,
    requests: mpsc::UnboundedReceiver<TransitionRequest<K>>,
    current: Option<K>,
    previous: Option<K>,
    ticks: u64,
    in_flight: Option<InFlight>,
    snapshot_tx: watch::Sender<StateSnapshot<K>>,
    errors: broadcast::Sender<TransitionError<K>>,
}

impl<K: StateId> Core<K> {
    /// Drains every queued request, then updates the current state.
    async fn tick(&mut self) -> TickReport<K> {
        // A caller dropped the previous tick mid-hook.
        self.abandon();
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            applied: 0,
            failed: Vec::new(),
            updated: false,
        };

        // Requests made by hooks during the drain land in the same queue and
        // are applied in this tick.
        while let Ok(request) = self.requests.try_recv() {
            match self.change_to(request).await {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    tracing::error!(tick = self.ticks, %error, "transition failed");
                    let _ = self.errors.send(error.clone());
                    report.failed.push(error);
                }
            }
        }

        if let Some(id) = &self.current {
            if let Some(state) = self.states.get_mut(id) {
                state.on_update();
                report.updated = true;
            }
        }

        tracing::trace!(
            tick = report.tick,
            applied = report.applied,
            failed = report.failed.len(),
            "tick complete"
        );
        report
    }

    /// Applies one request: exit the current state, then enter the target.
    async fn change_to(&mut self, request: TransitionRequest<K>) -> Result<(), TransitionError<K>> {
        let (target, options) = request.into_parts();

        if let Some(outgoing) = self.current.clone() {
            tracing::debug!(state = ?outgoing, "exiting state");
            if let Some(state) = self.states.get_mut(&outgoing) {
                self.in_flight = Some(InFlight::Exiting);
                state.on_exit().await;
                self.in_flight = None;
            }
            self.previous = Some(outgoing);
            self.current = None;
            self.publish();
        }

        let Some(state) = self.states.get_mut(&target) else {
            return Err(TransitionError::UnknownTargetState(target));
        };

        if let Some(options) = options {
            let type_name = options.type_name();
            if !state.set_options(options) {
                tracing::debug!(state = ?target, options = type_name, "state ignored options");
            }
        }

        self.current = Some(target.clone());
        tracing::debug!(state = ?target, "entering state");
        self.in_flight = Some(InFlight::Entering);
        state.on_enter().await;
        self.in_flight = None;
        self.publish();
        Ok(())
    }

    /// Settles a transition whose hook was dropped mid-flight.
    ///
    /// A state whose `on_exit` was cut short counts as exited; a state whose
    /// `on_enter` was cut short never became current.
    fn abandon(&mut self) {
        match self.in_flight.take() {
            Some(InFlight::Exiting) => {
                self.previous = self.current.take();
            }
            Some(InFlight::Entering) => {
                self.current = None;
            }
            None => return,
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(StateSnapshot {
            current: self.current.clone(),
            previous: self.previous.clone(),
        });
    }
}

struct LoopTask {
    shutdown_tx: watch::Sender<Option<StopMode>>,
    join: JoinHandle<()>,
}

/// A finite state machine whose transitions are queued and applied on ticks.
///
/// Register states, request a transition, then either call
/// [`run`](Self::run) with a [`TickSource`] to drive it from a background task
/// or call [`tick`](Self::tick) from a host loop.
///
/// # Example
///
/// ```rust
/// use tokio_tick_fsm::{State, StateMachine, async_trait};
///
/// struct Idle;
///
/// #[async_trait]
/// impl State<&'static str> for Idle {
///     fn id(&self) -> &'static str {
///         "idle"
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut machine = StateMachine::new();
/// machine.register_state(Idle).unwrap();
/// machine.request_transition("idle").unwrap();
///
/// let report = machine.tick().await.unwrap();
/// assert_eq!(report.applied, 1);
/// assert_eq!(machine.current_state(), Some("idle"));
/// # }
/// ```
pub struct StateMachine<K: StateId> {
    core: Arc<Mutex<Core<K>>>,
    handle: MachineHandle<K>,
    status_tx: Arc<watch::Sender<LoopStatus>>,
    task: Option<LoopTask>,
}

impl<K: StateId> Default for StateMachine<K> {
    fn default() -> Self {
        Self::build(&MachineConfig::default())
    }
}

impl<K: StateId> StateMachine<K> {
    /// Creates an empty machine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty machine after validating `config`.
    pub fn with_config(config: &MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &MachineConfig) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(StateSnapshot::default());
        let (status_tx, status_rx) = watch::channel(LoopStatus::Idle);
        let (errors, _) = broadcast::channel(config.error_capacity);

        let core = Core {
            states: HashMap::new(),
            requests: requests_rx,
            current: None,
            previous: None,
            ticks: 0,
            in_flight: None,
            snapshot_tx,
            errors: errors.clone(),
        };

        Self {
            core: Arc::new(Mutex::new(core)),
            handle: MachineHandle {
                requests: requests_tx,
                snapshot_rx,
                status_rx,
                errors,
            },
            status_tx: Arc::new(status_tx),
            task: None,
        }
    }

    /// Returns a handle for requesting transitions and observing the machine.
    pub fn handle(&self) -> MachineHandle<K> {
        self.handle.clone()
    }

    /// Registers `state` under its identity and hands it a handle to this
    /// machine.
    ///
    /// States must be registered while the loop is not running.
    pub fn register_state<S: State<K> + 'static>(&mut self, state: S) -> Result<(), MachineError<K>> {
        self.register_boxed(Box::new(state))
    }

    /// Registers an already boxed state.
    pub fn register_boxed(&mut self, mut state: Box<dyn State<K>>) -> Result<(), MachineError<K>> {
        self.reap();
        if self.task.is_some() {
            return Err(MachineError::AlreadyRunning);
        }
        let Ok(mut core) = self.core.try_lock() else {
            return Err(MachineError::AlreadyRunning);
        };

        let id = state.id();
        if core.states.contains_key(&id) {
            return Err(MachineError::DuplicateRegistration(id));
        }
        state.on_register(self.handle.clone());
        tracing::debug!(state = ?id, "state registered");
        core.states.insert(id, state);
        Ok(())
    }

    /// Queues a transition to `target`.
    pub fn request_transition(&self, target: K) -> Result<(), MachineError<K>> {
        self.handle.request_transition(target)
    }

    /// Queues a transition to `target` carrying `options`.
    pub fn request_transition_with<O: Any + Send>(
        &self,
        target: K,
        options: O,
    ) -> Result<(), MachineError<K>> {
        self.handle.request_transition_with(target, options)
    }

    /// Runs a single tick from the calling task.
    ///
    /// For hosts that drive the machine themselves instead of handing it a
    /// tick source. Fails while the background loop is running.
    pub async fn tick(&mut self) -> Result<TickReport<K>, MachineError<K>> {
        self.reap();
        if self.task.is_some() {
            return Err(MachineError::AlreadyRunning);
        }
        let mut core = self.core.lock().await;
        Ok(core.tick().await)
    }

    /// Starts consuming `ticks` on a background task.
    ///
    /// The pending queue and current state carry over from before any earlier
    /// stop. Must be called from within a Tokio runtime.
    pub fn run<T: TickSource + 'static>(&mut self, ticks: T) -> Result<(), MachineError<K>> {
        self.reap();
        if self.task.is_some() {
            return Err(MachineError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        self.status_tx.send_replace(LoopStatus::Running);

        let join = tokio::spawn(run_loop(
            Arc::clone(&self.core),
            ticks,
            shutdown_rx,
            Arc::clone(&self.status_tx),
        ));
        self.task = Some(LoopTask { shutdown_tx, join });
        tracing::info!("state machine loop started");
        Ok(())
    }

    /// Stops the loop after the tick in progress completes.
    ///
    /// Does nothing if the loop is not running.
    pub async fn stop(&mut self) -> Result<(), MachineError<K>> {
        self.stop_with(StopMode::Graceful).await
    }

    /// Stops the loop using `mode` and waits for the loop task to exit.
    ///
    /// Returns [`MachineError::Join`] if the loop task panicked.
    pub async fn stop_with(&mut self, mode: StopMode) -> Result<(), MachineError<K>> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        self.status_tx.send_replace(LoopStatus::Stopping);
        let _ = task.shutdown_tx.send(Some(mode));
        let joined = task.join.await;
        self.status_tx.send_replace(LoopStatus::Stopped);
        tracing::info!(?mode, "state machine loop stopped");
        joined.map_err(MachineError::from)
    }

    /// Lifecycle of the tick loop.
    pub fn status(&self) -> LoopStatus {
        self.handle.status()
    }

    /// Whether the loop is running or still stopping.
    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// The state that last finished entering, if any.
    pub fn current_state(&self) -> Option<K> {
        self.handle.current_state()
    }

    /// The state that was current before the last exit.
    pub fn previous_state(&self) -> Option<K> {
        self.handle.previous_state()
    }

    /// Forgets a loop task that already ended because its tick source ran out.
    ///
    /// The loop publishes `Stopped` only after releasing the core, so that is
    /// as good as the task having finished.
    fn reap(&mut self) {
        let stopped = *self.status_tx.borrow() == LoopStatus::Stopped;
        if self
            .task
            .as_ref()
            .is_some_and(|task| stopped || task.join.is_finished())
        {
            self.task = None;
            tracing::debug!("reaped finished state machine loop");
        }
    }
}

async fn run_loop<K: StateId, T: TickSource>(
    core: Arc<Mutex<Core<K>>>,
    mut ticks: T,
    mut shutdown: watch::Receiver<Option<StopMode>>,
    status: Arc<watch::Sender<LoopStatus>>,
) {
    loop {
        // A stop seen while a tick was in flight has already been consumed.
        if shutdown.borrow().is_some() {
            break;
        }

        let tick = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // Sender dropped means the machine itself was dropped.
                if changed.is_err() || shutdown.borrow().is_some() {
                    break;
                }
                continue;
            }
            tick = ticks.next_tick() => tick,
        };

        let Some(tick) = tick else {
            tracing::info!("tick source exhausted");
            break;
        };

        let mut locked = core.lock().await;
        tokio::select! {
            biased;
            () = immediate_stop(&mut shutdown) => {
                tracing::warn!(tick = locked.ticks, hook = ?locked.in_flight, "abandoned in-flight tick");
                locked.abandon();
                break;
            }
            report = locked.tick() => {
                if !report.failed.is_empty() {
                    tracing::debug!(tick = report.tick, lag = ?tick.at.elapsed(), "tick finished with failures");
                }
            }
        }
    }

    status.send_replace(LoopStatus::Stopped);
}

/// Resolves once an immediate stop is requested; graceful requests are left
/// for the loop to see between ticks.
async fn immediate_stop(shutdown: &mut watch::Receiver<Option<StopMode>>) {
    loop {
        if *shutdown.borrow_and_update() == Some(StopMode::Immediate) {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
