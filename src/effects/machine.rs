//! State machine engine: the state table and the tick/run loop.

use crate::builder::{BuildError, MachineBuilder};
use crate::core::{Challenge, State, StateHistory, StateTransition, TransitionKind};
use crate::effects::context::{MachineContext, MachineHandle};
use crate::effects::events::{EventKind, MachineEvent};
use crate::effects::transition::{resolve_candidates, TransitionError, TransitionSpec};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use stillwater::effect::{BoxedEffect, Effect};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Handler run when the machine enters a state.
///
/// It is called once per tick with the machine context and returns a fresh
/// effect; the engine runs that effect with the caller's environment and
/// applies the `TransitionSpec` it yields.
pub type StateHandler<S, Env> = Arc<
    dyn Fn(&MachineContext<S>) -> BoxedEffect<TransitionSpec<S>, TransitionError, Env>
        + Send
        + Sync,
>;

/// Mapping from state to handler.
pub struct StateTable<S: State, Env> {
    handlers: HashMap<S, StateHandler<S, Env>>,
}

impl<S: State, Env> Default for StateTable<S, Env> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, Env> StateTable<S, Env> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `state`, replacing any previous one.
    pub fn insert<F>(&mut self, state: S, handler: F)
    where
        F: Fn(&MachineContext<S>) -> BoxedEffect<TransitionSpec<S>, TransitionError, Env>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(state, Arc::new(handler));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<F>(mut self, state: S, handler: F) -> Self
    where
        F: Fn(&MachineContext<S>) -> BoxedEffect<TransitionSpec<S>, TransitionError, Env>
            + Send
            + Sync
            + 'static,
    {
        self.insert(state, handler);
        self
    }

    /// Register an already shared handler, such as those from [`crate::builder::goto`].
    pub fn insert_handler(&mut self, state: S, handler: StateHandler<S, Env>) {
        self.handlers.insert(state, handler);
    }

    pub fn with_handler(mut self, state: S, handler: StateHandler<S, Env>) -> Self {
        self.insert_handler(state, handler);
        self
    }

    pub fn get(&self, state: &S) -> Option<&StateHandler<S, Env>> {
        self.handlers.get(state)
    }

    pub fn contains(&self, state: &S) -> bool {
        self.handlers.contains_key(state)
    }

    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Outcome of one run, returned once the `End` event has been emitted.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary<S: State> {
    pub final_state: S,
    pub error: Option<TransitionError>,
    /// Handler invocations performed.
    pub ticks: usize,
}

impl<S: State> RunSummary<S> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Probabilistic state machine.
///
/// Build one with [`Machine::new`] or [`MachineBuilder`], register observers
/// through [`handle`](Self::handle), then drive it with [`start`](Self::start).
pub struct Machine<S: State + 'static, Env: Clone + Send + Sync + 'static> {
    states: StateTable<S, Env>,
    initial: S,
    context: MachineContext<S>,
    history: StateHistory<S>,
}

impl<S: State + 'static, Env: Clone + Send + Sync + 'static> Machine<S, Env> {
    /// Create a machine from a state table and the state to start in.
    pub fn new(states: StateTable<S, Env>, initial: S) -> Result<Self, BuildError> {
        MachineBuilder::new().states(states).initial(initial).build()
    }

    pub(crate) fn from_parts(
        states: StateTable<S, Env>,
        initial: S,
        challenge: Challenge,
    ) -> Self {
        let handle = MachineHandle::new(challenge);
        Self {
            states,
            context: MachineContext::new(initial.clone(), handle),
            initial,
            history: StateHistory::new(),
        }
    }

    pub fn current_state(&self) -> &S {
        self.context.state()
    }

    pub fn previous_state(&self) -> Option<&S> {
        self.context.previous_state()
    }

    pub fn initial_state(&self) -> &S {
        &self.initial
    }

    pub fn is_alive(&self) -> bool {
        self.context.is_alive()
    }

    /// Transitions applied during the latest run.
    pub fn history(&self) -> &StateHistory<S> {
        &self.history
    }

    pub fn states(&self) -> &StateTable<S, Env> {
        &self.states
    }

    /// Shared handle for stopping, observing, or re-challenging this machine.
    ///
    /// A run borrows the machine mutably, so stopping it from outside goes
    /// through a handle taken before `start`.
    pub fn handle(&self) -> MachineHandle<S> {
        self.context.handle().clone()
    }

    pub fn transition_challenge(&self) -> Challenge {
        self.context.handle().transition_challenge()
    }

    pub fn set_transition_challenge(&self, challenge: Challenge) {
        self.context.handle().set_transition_challenge(challenge);
    }

    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&MachineEvent<S>) + Send + Sync + 'static,
    {
        self.context.handle().on(kind, callback);
    }

    pub fn subscribe(&self) -> UnboundedReceiver<MachineEvent<S>> {
        self.context.handle().subscribe()
    }

    /// Start a run from the initial state.
    ///
    /// The machine is marked alive and rewound immediately, but no tick runs
    /// until the returned future is polled, so observers registered through a
    /// handle in between still see every event.
    ///
    /// Dropping the future before it completes, polled or not, marks the
    /// machine as no longer alive. No `End` event is emitted in that case.
    pub fn start<'a>(&'a mut self, env: &'a Env) -> impl Future<Output = RunSummary<S>> + 'a {
        self.context.handle().set_alive(true);
        self.context.state = self.initial.clone();
        self.context.previous = None;
        self.history.clear();
        info!(initial = %self.initial.name(), "machine started");

        let guard = RunGuard {
            handle: self.context.handle().clone(),
        };
        async move {
            let _guard = guard;
            self.run(env).await
        }
    }

    async fn run(&mut self, env: &Env) -> RunSummary<S> {
        let mut ticks = 0;
        let mut error = None;

        while self.context.is_alive() {
            let Some(handler) = self.states.get(&self.context.state).cloned() else {
                error = Some(TransitionError::UnknownState {
                    state: self.context.state.name().to_string(),
                });
                break;
            };
            ticks += 1;
            if let Err(err) = self.tick(handler, env).await {
                error = Some(err);
                break;
            }
        }

        let handle = self.context.handle().clone();
        handle.set_alive(false);
        let final_state = self.context.state.clone();

        if let Some(err) = &error {
            warn!(state = %final_state.name(), error = %err, "machine stopped on error");
            handle.emit(MachineEvent::Error {
                error: err.clone(),
                current_state: final_state.clone(),
            });
        }
        info!(final_state = %final_state.name(), ticks, "machine ended");
        handle.emit(MachineEvent::End {
            final_state: final_state.clone(),
        });

        RunSummary {
            final_state,
            error,
            ticks,
        }
    }

    async fn tick(
        &mut self,
        handler: StateHandler<S, Env>,
        env: &Env,
    ) -> Result<(), TransitionError> {
        self.context.handle().emit(MachineEvent::Transition {
            previous_state: self.context.previous.clone(),
            next_state: self.context.state.clone(),
        });
        debug!(state = %self.context.state.name(), "running state handler");

        let spec = handler(&self.context).run(env).await?;

        // A stop requested during the tick drops whatever the handler chose.
        if !self.context.is_alive() {
            debug!(state = %self.context.state.name(), "stop requested; transition suppressed");
            return Ok(());
        }

        match spec {
            TransitionSpec::Halt => {
                debug!(state = %self.context.state.name(), "halt");
                self.context.handle().set_alive(false);
            }
            TransitionSpec::Goto(next) => self.advance(next, TransitionKind::Deterministic),
            TransitionSpec::Weighted {
                candidates,
                fallback,
            } => {
                let challenge = self.context.handle().transition_challenge();
                let (next, kind) =
                    resolve_candidates(&candidates, fallback.as_ref(), &self.context, &challenge)?;
                self.advance(next, kind);
            }
        }
        Ok(())
    }

    fn advance(&mut self, next: S, kind: TransitionKind) {
        debug!(from = %self.context.state.name(), to = %next.name(), ?kind, "transition");
        let from = std::mem::replace(&mut self.context.state, next.clone());
        self.history.record(StateTransition {
            from: from.clone(),
            to: next,
            kind,
            timestamp: Utc::now(),
        });
        self.context.previous = Some(from);
    }
}

/// Clears the alive flag when a run future goes away.
struct RunGuard<S: State> {
    handle: MachineHandle<S>,
}

impl<S: State> Drop for RunGuard<S> {
    fn drop(&mut self) {
        self.handle.set_alive(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{goto, halt};
    use crate::core::{Dice, DifficultyClass};
    use crate::effects::transition::{CandidateSet, Difficulty};
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;
    use std::time::Duration;
    use stillwater::prelude::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum Door {
        Open,
        Broken,
        Close,
    }

    impl State for Door {
        fn name(&self) -> &str {
            match self {
                Self::Open => "Open",
                Self::Broken => "Broken",
                Self::Close => "Close",
            }
        }
    }

    fn door_table(difficulty: Difficulty<Door>) -> StateTable<Door, ()> {
        StateTable::new()
            .with(Door::Open, move |_ctx: &MachineContext<Door>| {
                let candidates = CandidateSet::new().with(Door::Broken, difficulty.clone());
                pure(TransitionSpec::weighted(candidates, Door::Close)).boxed()
            })
            .with_handler(Door::Broken, goto(Door::Close))
            .with_handler(Door::Close, halt())
    }

    fn record(machine: &Machine<Door, ()>) -> Arc<Mutex<Vec<Door>>> {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&visited);
        machine.on(EventKind::Transition, move |event| {
            if let MachineEvent::Transition { next_state, .. } = event {
                sink.lock().unwrap().push(next_state.clone());
            }
        });
        visited
    }

    #[test]
    fn new_rejects_empty_table() {
        let result = Machine::<Door, ()>::new(StateTable::new(), Door::Open);
        assert!(matches!(result, Err(BuildError::MissingStates)));
    }

    #[test]
    fn new_machine_is_idle() {
        let machine = Machine::new(door_table(10.into()), Door::Open).unwrap();

        assert!(!machine.is_alive());
        assert_eq!(machine.current_state(), &Door::Open);
        assert!(machine.previous_state().is_none());
        assert!(machine.history().is_empty());
        assert_eq!(machine.states().len(), 3);
    }

    #[tokio::test]
    async fn passed_throw_enters_candidate() {
        let mut machine = Machine::new(door_table(10.into()), Door::Open).unwrap();
        machine.set_transition_challenge(Challenge::saving_throw(Dice::fixed(11)));
        let visited = record(&machine);

        let summary = machine.start(&()).await;

        assert!(summary.is_success());
        assert_eq!(summary.final_state, Door::Close);
        assert_eq!(summary.ticks, 3);
        assert_eq!(
            *visited.lock().unwrap(),
            vec![Door::Open, Door::Broken, Door::Close]
        );
        assert_eq!(machine.history().count(TransitionKind::Challenged), 1);
    }

    #[tokio::test]
    async fn failed_throw_takes_default() {
        let mut machine = Machine::new(door_table(10.into()), Door::Open).unwrap();
        machine.set_transition_challenge(Challenge::saving_throw(Dice::fixed(9)));
        let visited = record(&machine);

        let summary = machine.start(&()).await;

        assert_eq!(summary.final_state, Door::Close);
        assert_eq!(*visited.lock().unwrap(), vec![Door::Open, Door::Close]);
        assert_eq!(machine.history().count(TransitionKind::Fallback), 1);
        assert_eq!(machine.previous_state(), Some(&Door::Open));
    }

    #[tokio::test]
    async fn computed_difficulty_zero_always_passes() {
        let difficulty = Difficulty::computed(|ctx: &MachineContext<Door>| {
            assert_eq!(ctx.state(), &Door::Open);
            DifficultyClass::Score(0)
        });
        let mut machine = Machine::new(door_table(difficulty), Door::Open).unwrap();
        let visited = record(&machine);

        machine.start(&()).await;

        assert_eq!(
            *visited.lock().unwrap(),
            vec![Door::Open, Door::Broken, Door::Close]
        );
    }

    #[tokio::test]
    async fn computed_difficulty_above_die_never_passes() {
        let difficulty =
            Difficulty::computed(|_: &MachineContext<Door>| DifficultyClass::Score(21));
        let mut machine = Machine::new(door_table(difficulty), Door::Open).unwrap();
        let visited = record(&machine);

        machine.start(&()).await;

        assert_eq!(*visited.lock().unwrap(), vec![Door::Open, Door::Close]);
    }

    #[tokio::test]
    async fn handler_error_is_reported_then_end() {
        let table: StateTable<Door, ()> =
            StateTable::new().with(Door::Open, |_ctx: &MachineContext<Door>| {
                fail(TransitionError::action_failed("Something went wrong")).boxed()
            });
        let mut machine = Machine::new(table, Door::Open).unwrap();
        let mut rx = machine.subscribe();

        let summary = machine.start(&()).await;

        assert_eq!(
            summary.error,
            Some(TransitionError::action_failed("Something went wrong"))
        );
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::Transition);
        assert_eq!(
            rx.try_recv().unwrap(),
            MachineEvent::Error {
                error: TransitionError::action_failed("Something went wrong"),
                current_state: Door::Open,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            MachineEvent::End {
                final_state: Door::Open
            }
        );
        assert!(!machine.is_alive());
    }

    #[tokio::test]
    async fn handler_can_read_environment() {
        #[derive(Clone)]
        struct Env {
            next: Door,
        }

        let table: StateTable<Door, Env> = StateTable::new()
            .with(Door::Open, |_ctx: &MachineContext<Door>| {
                from_fn(|env: &Env| Ok(TransitionSpec::Goto(env.next.clone()))).boxed()
            })
            .with_handler(Door::Broken, halt())
            .with_handler(Door::Close, halt());
        let mut machine = Machine::new(table, Door::Open).unwrap();

        let summary = machine
            .start(&Env {
                next: Door::Broken,
            })
            .await;

        assert_eq!(summary.final_state, Door::Broken);
    }

    #[tokio::test]
    async fn restart_rewinds_to_initial_state() {
        let mut machine = Machine::new(door_table(10.into()), Door::Open).unwrap();
        machine.set_transition_challenge(Challenge::never());

        let first = machine.start(&()).await;
        let second = machine.start(&()).await;

        assert_eq!(first, second);
        assert_eq!(machine.history().transitions().len(), 1);
    }

    #[test]
    fn dropping_an_unpolled_run_clears_alive() {
        let mut machine = Machine::new(door_table(10.into()), Door::Open).unwrap();
        let mut rx = machine.subscribe();

        let run = machine.start(&());
        drop(run);

        assert!(!machine.is_alive());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_a_suspended_run_clears_alive_without_end() {
        let table: StateTable<Door, ()> = StateTable::new()
            .with(Door::Open, |_ctx: &MachineContext<Door>| {
                from_async(|_: &()| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(TransitionSpec::Goto(Door::Close))
                })
                .boxed()
            })
            .with_handler(Door::Close, halt());
        let mut machine = Machine::new(table, Door::Open).unwrap();
        let mut rx = machine.subscribe();

        let outcome = tokio::time::timeout(Duration::from_millis(20), machine.start(&())).await;

        assert!(outcome.is_err());
        assert!(!machine.is_alive());
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::Transition);
        assert!(rx.try_recv().is_err());
    }
}
