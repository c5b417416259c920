//! What handlers and outside callers may see and touch while a machine runs.

use crate::core::{Challenge, State};
use crate::effects::events::{EventKind, MachineEvent, Observers};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::UnboundedReceiver;

struct Shared<S: State> {
    alive: AtomicBool,
    challenge: RwLock<Challenge>,
    observers: Observers<S>,
}

/// Cloneable handle onto a machine's shared runtime surface.
///
/// A handle stays usable while the machine itself is borrowed by its run
/// future, so it is how callers stop a run, swap the challenge, or register
/// observers from outside the loop.
pub struct MachineHandle<S: State> {
    shared: Arc<Shared<S>>,
}

impl<S: State> Clone for MachineHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: State> MachineHandle<S> {
    pub(crate) fn new(challenge: Challenge) -> Self {
        Self {
            shared: Arc::new(Shared {
                alive: AtomicBool::new(false),
                challenge: RwLock::new(challenge),
                observers: Observers::new(),
            }),
        }
    }

    /// Request a stop. Takes effect once the in-flight tick resolves.
    pub fn stop(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.shared.alive.store(alive, Ordering::SeqCst);
    }

    pub fn transition_challenge(&self) -> Challenge {
        self.shared
            .challenge
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the challenge. Resolutions already under way keep the old one.
    pub fn set_transition_challenge(&self, challenge: Challenge) {
        *self
            .shared
            .challenge
            .write()
            .unwrap_or_else(PoisonError::into_inner) = challenge;
    }

    /// Register a callback on one channel.
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&MachineEvent<S>) + Send + Sync + 'static,
    {
        self.shared.observers.on(Some(kind), Arc::new(callback));
    }

    /// Register a callback on every channel.
    pub fn on_any<F>(&self, callback: F)
    where
        F: Fn(&MachineEvent<S>) + Send + Sync + 'static,
    {
        self.shared.observers.on(None, Arc::new(callback));
    }

    /// Receive every event from now on through a channel.
    pub fn subscribe(&self) -> UnboundedReceiver<MachineEvent<S>> {
        self.shared.observers.subscribe()
    }

    pub(crate) fn emit(&self, event: MachineEvent<S>) {
        self.shared.observers.emit(event);
    }
}

impl<S: State> fmt::Debug for MachineHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandle")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

/// View of the machine handed to state handlers and computed difficulties.
///
/// Exposes the current and previous state, the stop request and the shared
/// handle. Cloning gives an owned snapshot of the two states that an async
/// handler body can carry across suspension points; `stop` on the clone
/// still reaches the running machine.
#[derive(Clone, Debug)]
pub struct MachineContext<S: State> {
    pub(crate) state: S,
    pub(crate) previous: Option<S>,
    handle: MachineHandle<S>,
}

impl<S: State> MachineContext<S> {
    pub(crate) fn new(state: S, handle: MachineHandle<S>) -> Self {
        Self {
            state,
            previous: None,
            handle,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn previous_state(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    /// Make the current tick the last one.
    ///
    /// The transition the handler returns afterwards is not applied.
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    pub fn handle(&self) -> &MachineHandle<S> {
        &self.handle
    }
}
