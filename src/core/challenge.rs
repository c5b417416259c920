//! Challenge predicates for weighted transitions.
//!
//! A challenge decides whether a candidate transition is taken given the
//! candidate's resolved difficulty. The default challenge is a d20 saving
//! throw; the die itself is a [`Dice`] capability so tests can fix its
//! outcome.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Number of faces on the default die.
pub const D20_FACES: u32 = 20;

/// Resolved difficulty fed into a challenge.
///
/// Numeric scores are what the default saving throw understands. Labels
/// exist for custom challenges that decide on something other than a roll.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DifficultyClass {
    Score(i64),
    Label(String),
}

impl DifficultyClass {
    pub fn as_score(&self) -> Option<i64> {
        match self {
            Self::Score(score) => Some(*score),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Score(_) => None,
            Self::Label(label) => Some(label),
        }
    }
}

impl From<i64> for DifficultyClass {
    fn from(score: i64) -> Self {
        Self::Score(score)
    }
}

impl From<i32> for DifficultyClass {
    fn from(score: i32) -> Self {
        Self::Score(i64::from(score))
    }
}

impl From<u32> for DifficultyClass {
    fn from(score: u32) -> Self {
        Self::Score(i64::from(score))
    }
}

impl From<&str> for DifficultyClass {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

impl From<String> for DifficultyClass {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}

impl fmt::Display for DifficultyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Score(score) => write!(f, "{score}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// Source of die rolls.
///
/// Each call returns one roll. The default die is a uniform d20 backed by
/// the thread-local RNG.
#[derive(Clone)]
pub struct Dice {
    roll: Arc<dyn Fn() -> u32 + Send + Sync>,
}

impl Dice {
    pub fn new<F>(roll: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        Self {
            roll: Arc::new(roll),
        }
    }

    /// Uniform die with `faces` sides, rolling 1..=faces.
    pub fn uniform(faces: u32) -> Self {
        let faces = faces.max(1);
        Self::new(move || rand::rng().random_range(1..=faces))
    }

    pub fn d20() -> Self {
        Self::uniform(D20_FACES)
    }

    /// Die that always lands on `value`.
    pub fn fixed(value: u32) -> Self {
        Self::new(move || value)
    }

    pub fn roll(&self) -> u32 {
        (self.roll)()
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self::d20()
    }
}

impl fmt::Debug for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dice").finish_non_exhaustive()
    }
}

/// Predicate that decides whether a weighted candidate is taken.
///
/// # Example
///
/// ```rust
/// use gambit::core::{Challenge, Dice, DifficultyClass};
///
/// // A die that always rolls 11 passes anything up to difficulty 11.
/// let challenge = Challenge::saving_throw(Dice::fixed(11));
/// assert!(challenge.check(&DifficultyClass::Score(10)));
/// assert!(challenge.check(&DifficultyClass::Score(11)));
/// assert!(!challenge.check(&DifficultyClass::Score(12)));
///
/// let custom = Challenge::new(|d: &DifficultyClass| d.as_label() == Some("pass"));
/// assert!(custom.check(&"pass".into()));
/// assert!(!custom.check(&"not passed".into()));
/// ```
#[derive(Clone)]
pub struct Challenge {
    predicate: Arc<dyn Fn(&DifficultyClass) -> bool + Send + Sync>,
}

impl Challenge {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&DifficultyClass) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Saving throw: roll the die and pass when `roll >= difficulty`.
    ///
    /// Labels cannot be compared against a roll and always fail.
    pub fn saving_throw(dice: Dice) -> Self {
        Self::new(move |difficulty| {
            let Some(threshold) = difficulty.as_score() else {
                return false;
            };
            let roll = dice.roll();
            let passed = i64::from(roll) >= threshold;
            debug!(roll, threshold, passed, "saving throw");
            passed
        })
    }

    /// Saving throw with a fair d20.
    pub fn d20() -> Self {
        Self::saving_throw(Dice::d20())
    }

    /// Challenge that passes every candidate.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Challenge that fails every candidate.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    pub fn check(&self, difficulty: &DifficultyClass) -> bool {
        (self.predicate)(difficulty)
    }
}

impl Default for Challenge {
    fn default() -> Self {
        Self::d20()
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge").finish_non_exhaustive()
    }
}
