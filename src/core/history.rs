//! State transition history tracking.
//!
//! Every transition the engine applies is recorded with how it was decided
//! (a deterministic hop, a passed challenge, or the fallback default).

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the next state of a transition was chosen.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TransitionKind {
    /// The handler named the next state directly.
    Deterministic,
    /// A weighted candidate passed its challenge.
    Challenged,
    /// No candidate passed; the default state was taken.
    Fallback,
}

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use gambit::core::{StateName, StateTransition, TransitionKind};
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: StateName::from("getProfile"),
///     to: StateName::from("shop"),
///     kind: TransitionKind::Fallback,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to.as_str(), "shop");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// How `to` was chosen
    pub kind: TransitionKind,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of state transitions.
///
/// # Example
///
/// ```rust
/// use gambit::core::{StateHistory, StateName, StateTransition, TransitionKind};
/// use chrono::Utc;
///
/// let mut history = StateHistory::new();
/// history.record(StateTransition {
///     from: StateName::from("register"),
///     to: StateName::from("getProfile"),
///     kind: TransitionKind::Deterministic,
///     timestamp: Utc::now(),
/// });
/// history.record(StateTransition {
///     from: StateName::from("getProfile"),
///     to: StateName::from("browse"),
///     kind: TransitionKind::Challenged,
///     timestamp: Utc::now(),
/// });
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3); // register -> getProfile -> browse
/// assert_eq!(history.count(TransitionKind::Challenged), 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Append a transition.
    pub fn record(&mut self, transition: StateTransition<S>) {
        self.transitions.push(transition);
    }

    pub(crate) fn clear(&mut self) {
        self.transitions.clear();
    }

    /// States visited, in order: where the first transition started, then
    /// every state entered.
    pub fn get_path(&self) -> Vec<&S> {
        self.transitions
            .first()
            .map(|first| &first.from)
            .into_iter()
            .chain(self.transitions.iter().map(|t| &t.to))
            .collect()
    }

    /// Wall time from the first to the last recorded transition.
    pub fn duration(&self) -> Option<Duration> {
        let first = self.transitions.first()?;
        let last = self.transitions.last()?;
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Number of transitions decided a given way.
    pub fn count(&self, kind: TransitionKind) -> usize {
        self.transitions.iter().filter(|t| t.kind == kind).count()
    }

    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
