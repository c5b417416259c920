//! Core State trait for state machine states.
//!
//! A state is the key under which a handler is registered in the state
//! table. Closed state sets are usually enums (see [`state_enum!`](crate::state_enum));
//! open sets can use [`StateName`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::hash::Hash;

/// Trait for state machine states.
///
/// # Required Traits
///
/// - `Clone`: states are copied into history records and events
/// - `Eq` + `Hash`: states key the state table
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: history and events can be exported
///
/// # Example
///
/// ```rust
/// use gambit::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Door {
///     Open,
///     Broken,
///     Closed,
/// }
///
/// impl State for Door {
///     fn name(&self) -> &str {
///         match self {
///             Self::Open => "Open",
///             Self::Broken => "Broken",
///             Self::Closed => "Closed",
///         }
///     }
/// }
///
/// assert_eq!(Door::Broken.name(), "Broken");
/// ```
pub trait State:
    Clone + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;
}

/// Open-ended state identifier backed by a string.
///
/// Use this when the set of states is only known at runtime.
///
/// ```rust
/// use gambit::core::{State, StateName};
///
/// let state = StateName::from("register");
/// assert_eq!(state.name(), "register");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(String);

impl StateName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl State for StateName {
    fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StateName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for StateName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
