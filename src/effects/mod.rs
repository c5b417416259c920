//! The effectful shell: running a machine over its state table.
//!
//! Each state handler returns a Stillwater `BoxedEffect` that eventually
//! yields a [`TransitionSpec`]. The engine runs that effect against the
//! caller's environment, applies the transition it asks for, and moves on to the next tick.
//!
//! # Key Concepts
//!
//! - **Machine**: owns the state table and the run loop
//! - **Transition specs**: halt, go to a state, or challenge weighted candidates
//! - **Context and handle**: the only ways handlers and callers touch a running machine
//! - **Events**: `Transition`, `Error` and `End`, emitted in tick order

mod context;
mod events;
mod machine;
mod transition;

pub use context::{MachineContext, MachineHandle};
pub use events::{EventKind, MachineEvent};
pub use machine::{Machine, RunSummary, StateHandler, StateTable};
pub use transition::{
    resolve_candidates, CandidateSet, Difficulty, DifficultyFn, TransitionError, TransitionSpec,
};
