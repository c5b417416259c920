//! Core state machine types and logic.
//!
//! This module contains the pure pieces of the engine:
//! - State definitions via the `State` trait
//! - Challenge predicates and the dice they roll
//! - Transition history tracking
//!
//! Nothing here drives a machine; see [`crate::effects`] for the run loop.

mod challenge;
mod history;
mod state;

pub use challenge::{Challenge, Dice, DifficultyClass, D20_FACES};
pub use history::{StateHistory, StateTransition, TransitionKind};
pub use state::{State, StateName};
