//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::core::{Challenge, State};
use crate::effects::{
    Machine, MachineContext, StateHandler, StateTable, TransitionError, TransitionSpec,
};
use stillwater::effect::BoxedEffect;

type InitHook<S, Env> = Box<dyn FnOnce(&mut MachineBuilder<S, Env>)>;

/// Builder for constructing state machines with a fluent API.
///
/// The `init` hook runs synchronously inside [`build`](Self::build), before
/// validation, so it can pick the initial state programmatically.
pub struct MachineBuilder<S: State + 'static, Env: Clone + Send + Sync + 'static> {
    states: StateTable<S, Env>,
    initial: Option<S>,
    challenge: Option<Challenge>,
    init: Option<InitHook<S, Env>>,
}

impl<S: State + 'static, Env: Clone + Send + Sync + 'static> MachineBuilder<S, Env> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            states: StateTable::new(),
            initial: None,
            challenge: None,
            init: None,
        }
    }

    /// Replace the whole state table.
    pub fn states(mut self, states: StateTable<S, Env>) -> Self {
        self.states = states;
        self
    }

    /// Register a handler for one state.
    pub fn state<F>(mut self, state: S, handler: F) -> Self
    where
        F: Fn(&MachineContext<S>) -> BoxedEffect<TransitionSpec<S>, TransitionError, Env>
            + Send
            + Sync
            + 'static,
    {
        self.states.insert(state, handler);
        self
    }

    /// Register a shared handler for one state.
    pub fn handler(mut self, state: S, handler: StateHandler<S, Env>) -> Self {
        self.states.insert_handler(state, handler);
        self
    }

    /// Set the initial state.
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Set the initial state from inside an `init` hook.
    pub fn set_initial(&mut self, state: S) {
        self.initial = Some(state);
    }

    pub fn initial_state(&self) -> Option<&S> {
        self.initial.as_ref()
    }

    pub fn state_table(&self) -> &StateTable<S, Env> {
        &self.states
    }

    /// Challenge used for weighted transitions. Defaults to a fair d20.
    pub fn challenge(mut self, challenge: Challenge) -> Self {
        self.challenge = Some(challenge);
        self
    }

    /// Hook run at the start of `build()`.
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: FnOnce(&mut MachineBuilder<S, Env>) + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }

    /// Build the state machine.
    /// Returns an error if the table is empty or no initial state was given.
    pub fn build(mut self) -> Result<Machine<S, Env>, BuildError> {
        if let Some(init) = self.init.take() {
            init(&mut self);
        }

        if self.states.is_empty() {
            return Err(BuildError::MissingStates);
        }
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        Ok(Machine::from_parts(
            self.states,
            initial,
            self.challenge.unwrap_or_default(),
        ))
    }
}

impl<S: State + 'static, Env: Clone + Send + Sync + 'static> Default for MachineBuilder<S, Env> {
    fn default() -> Self {
        Self::new()
    }
}
