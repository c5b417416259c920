//! Configuration errors raised while building a machine.

use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("No states defined. Add at least one state handler before .build()")]
    MissingStates,

    #[error("Initial state not specified. Call .initial(state) or set it from .init()")]
    MissingInitialState,
}
