#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio_tick_fsm::{MachineHandle, Options, OptionsSlot, State, async_trait};

pub type Id = &'static str;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub text: String,
}

pub fn greeting(text: &str) -> Greeting {
    Greeting {
        text: text.to_string(),
    }
}

/// Shared, ordered record of hook calls.
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// A state that records every hook it sees.
///
/// `on_enter` logs `enter:<id>` or `enter:<id>(<greeting>)` when it holds a
/// greeting.
pub struct Recorder {
    id: Id,
    log: Log,
    greeting: OptionsSlot<Greeting>,
    machine: Option<MachineHandle<Id>>,
    follow_up: Option<(Id, Option<Greeting>)>,
    started: Option<Arc<Notify>>,
    gate: Option<Arc<Notify>>,
    exit_gate: Option<(Arc<Notify>, Arc<Notify>)>,
    slow_exit: bool,
}

impl Recorder {
    pub fn new(id: Id, log: &Log) -> Self {
        Self {
            id,
            log: log.clone(),
            greeting: OptionsSlot::new(),
            machine: None,
            follow_up: None,
            started: None,
            gate: None,
            exit_gate: None,
            slow_exit: false,
        }
    }

    /// Requests a transition to `target` from the first `on_enter`.
    pub fn follow_up(mut self, target: Id, greeting: Option<Greeting>) -> Self {
        self.follow_up = Some((target, greeting));
        self
    }

    /// Makes `on_enter` signal `started` and then wait on `gate`.
    pub fn gated(mut self, started: Arc<Notify>, gate: Arc<Notify>) -> Self {
        self.started = Some(started);
        self.gate = Some(gate);
        self
    }

    /// Makes `on_exit` signal `started` and then wait on `gate`.
    pub fn gated_exit(mut self, started: Arc<Notify>, gate: Arc<Notify>) -> Self {
        self.exit_gate = Some((started, gate));
        self
    }

    /// Makes `on_exit` suspend several times before finishing.
    pub fn slow_exit(mut self) -> Self {
        self.slow_exit = true;
        self
    }
}

#[async_trait]
impl State<Id> for Recorder {
    fn id(&self) -> Id {
        self.id
    }

    fn on_register(&mut self, machine: MachineHandle<Id>) {
        self.machine = Some(machine);
    }

    fn set_options(&mut self, options: Options) -> bool {
        self.greeting.accept(options)
    }

    async fn on_enter(&mut self) {
        if let (Some(started), Some(gate)) = (&self.started, &self.gate) {
            self.log.push(format!("enter-start:{}", self.id));
            started.notify_one();
            gate.notified().await;
        }

        match self.greeting.get() {
            Some(greeting) => self.log.push(format!("enter:{}({})", self.id, greeting.text)),
            None => self.log.push(format!("enter:{}", self.id)),
        }

        if let (Some((target, greeting)), Some(machine)) = (self.follow_up.take(), &self.machine) {
            match greeting {
                Some(greeting) => machine.request_transition_with(target, greeting).unwrap(),
                None => machine.request_transition(target).unwrap(),
            }
        }
    }

    async fn on_exit(&mut self) {
        if let Some((started, gate)) = &self.exit_gate {
            self.log.push(format!("exit-start:{}", self.id));
            started.notify_one();
            gate.notified().await;
        }
        if self.slow_exit {
            self.log.push(format!("exit-start:{}", self.id));
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        }
        self.log.push(format!("exit:{}", self.id));
    }

    fn on_update(&mut self) {
        self.log.push(format!("update:{}", self.id));
    }
}

/// A state that overrides nothing but its identity.
pub struct Plain(pub Id);

#[async_trait]
impl State<Id> for Plain {
    fn id(&self) -> Id {
        self.0
    }
}
