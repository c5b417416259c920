//! Lifecycle events and the observers that receive them.

use crate::core::State;
use crate::effects::transition::TransitionError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Named channel an event is published on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    Transition,
    Error,
    End,
}

/// Event emitted by a running machine.
///
/// Every run emits one `Transition` per handler invocation, at most one
/// `Error`, and exactly one `End`, always in that temporal order.
#[derive(Clone, Debug, PartialEq)]
pub enum MachineEvent<S: State> {
    /// Emitted immediately before the handler of `next_state` runs.
    Transition {
        previous_state: Option<S>,
        next_state: S,
    },
    Error {
        error: TransitionError,
        current_state: S,
    },
    End {
        final_state: S,
    },
}

impl<S: State> MachineEvent<S> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Transition { .. } => EventKind::Transition,
            Self::Error { .. } => EventKind::Error,
            Self::End { .. } => EventKind::End,
        }
    }
}

type Callback<S> = Arc<dyn Fn(&MachineEvent<S>) + Send + Sync>;

/// Registered callbacks and channel subscribers.
pub(crate) struct Observers<S: State> {
    callbacks: Mutex<Vec<(Option<EventKind>, Callback<S>)>>,
    subscribers: Mutex<Vec<UnboundedSender<MachineEvent<S>>>>,
}

impl<S: State> Observers<S> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn on(&self, kind: Option<EventKind>, callback: Callback<S>) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, callback));
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<MachineEvent<S>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: MachineEvent<S>) {
        let kind = event.kind();
        // Snapshot so callbacks may register further observers.
        let callbacks: Vec<Callback<S>> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(filter, _)| filter.map_or(true, |k| k == kind))
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(&event);
        }

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
