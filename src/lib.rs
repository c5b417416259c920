//! Gambit: a probabilistic state machine runner
//!
//! A machine walks a table of named states. At each state a handler decides
//! what happens next: go to a named state, halt, or offer a set of weighted
//! candidates. Each candidate must pass a challenge (a d20 saving throw by
//! default) to be taken; if none passes, the machine falls back to a default.
//!
//! # Core Concepts
//!
//! - **State**: Type-safe state identifiers via the `State` trait
//! - **Challenge**: Pluggable predicate deciding weighted transitions
//! - **Machine**: Runs handler effects tick by tick and emits lifecycle events
//! - **History**: Record of every transition applied during a run
//!
//! # Example
//!
//! ```rust
//! use gambit::builder::{goto, halt, weighted};
//! use gambit::core::{Challenge, Dice};
//! use gambit::effects::{CandidateSet, EventKind, Machine, MachineEvent, StateTable};
//! use gambit::state_enum;
//!
//! state_enum! {
//!     enum Door {
//!         Open,
//!         Broken,
//!         Close,
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let table: StateTable<Door, ()> = StateTable::new()
//!     .with_handler(
//!         Door::Open,
//!         weighted(CandidateSet::new().with(Door::Broken, 10), Door::Close),
//!     )
//!     .with_handler(Door::Broken, goto(Door::Close))
//!     .with_handler(Door::Close, halt());
//!
//! let mut machine = Machine::new(table, Door::Open).unwrap();
//! // A die that always rolls 9 fails difficulty 10.
//! machine.set_transition_challenge(Challenge::saving_throw(Dice::fixed(9)));
//! machine.on(EventKind::Transition, |event| {
//!     if let MachineEvent::Transition { next_state, .. } = event {
//!         println!("entering {next_state:?}");
//!     }
//! });
//!
//! let summary = machine.start(&()).await;
//! assert_eq!(summary.final_state, Door::Close);
//! assert_eq!(summary.ticks, 2);
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod effects;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder};
pub use core::{Challenge, Dice, DifficultyClass, State, StateHistory, StateName};
pub use effects::{
    CandidateSet, Difficulty, EventKind, Machine, MachineContext, MachineEvent, MachineHandle,
    RunSummary, StateTable, TransitionError, TransitionSpec,
};
