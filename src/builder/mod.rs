//! Builder API for ergonomic state machine construction.
//!
//! This module provides the fluent [`MachineBuilder`], the `state_enum!`
//! macro, and helpers for handlers that need no work of their own.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::MachineBuilder;

use crate::core::State;
use crate::effects::{CandidateSet, MachineContext, StateHandler, TransitionSpec};
use std::sync::Arc;
use stillwater::prelude::*;

/// Handler that always moves to `next`.
///
/// # Example
///
/// ```
/// use gambit::builder::{goto, halt};
/// use gambit::core::StateName;
/// use gambit::effects::StateTable;
///
/// let table: StateTable<StateName, ()> = StateTable::new()
///     .with_handler(StateName::from("register"), goto(StateName::from("logout")))
///     .with_handler(StateName::from("logout"), halt());
/// assert_eq!(table.len(), 2);
/// ```
pub fn goto<S, Env>(next: S) -> StateHandler<S, Env>
where
    S: State + 'static,
    Env: Clone + Send + Sync + 'static,
{
    Arc::new(move |_: &MachineContext<S>| pure(TransitionSpec::Goto(next.clone())).boxed())
}

/// Handler that ends the run.
pub fn halt<S, Env>() -> StateHandler<S, Env>
where
    S: State + 'static,
    Env: Clone + Send + Sync + 'static,
{
    Arc::new(|_: &MachineContext<S>| pure(TransitionSpec::Halt).boxed())
}

/// Handler that challenges `candidates` and falls back to `fallback`.
pub fn weighted<S, Env>(candidates: CandidateSet<S>, fallback: S) -> StateHandler<S, Env>
where
    S: State + 'static,
    Env: Clone + Send + Sync + 'static,
{
    Arc::new(move |_: &MachineContext<S>| {
        pure(TransitionSpec::weighted(candidates.clone(), fallback.clone())).boxed()
    })
}
