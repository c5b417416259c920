//! Transition specs and weighted candidate resolution.

use crate::core::{Challenge, DifficultyClass, State, TransitionKind};
use crate::effects::context::MachineContext;
use std::fmt;
use std::sync::Arc;

/// Errors that end a run.
///
/// Handler failures travel through the handler's effect; unknown states and
/// missing defaults are raised by the engine while resolving a tick.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("transition action failed: {0}")]
    ActionFailed(String),

    #[error("unknown state '{state}'")]
    UnknownState { state: String },

    #[error("there is no default next state (from '{from}')")]
    NoDefaultState { from: String },
}

impl TransitionError {
    pub fn action_failed(message: impl Into<String>) -> Self {
        Self::ActionFailed(message.into())
    }
}

/// Function computing a difficulty from the machine context at resolution time.
pub type DifficultyFn<S> = Arc<dyn Fn(&MachineContext<S>) -> DifficultyClass + Send + Sync>;

/// Difficulty attached to a weighted candidate.
#[derive(Clone)]
pub enum Difficulty<S: State> {
    Fixed(DifficultyClass),
    /// Evaluated lazily, once per tick, only if the candidate is reached.
    Computed(DifficultyFn<S>),
}

impl<S: State> Difficulty<S> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&MachineContext<S>) -> DifficultyClass + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    pub fn resolve(&self, context: &MachineContext<S>) -> DifficultyClass {
        match self {
            Self::Fixed(class) => class.clone(),
            Self::Computed(f) => f(context),
        }
    }
}

impl<S: State> fmt::Debug for Difficulty<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(class) => f.debug_tuple("Fixed").field(class).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<S: State> From<DifficultyClass> for Difficulty<S> {
    fn from(class: DifficultyClass) -> Self {
        Self::Fixed(class)
    }
}

impl<S: State> From<i64> for Difficulty<S> {
    fn from(score: i64) -> Self {
        Self::Fixed(score.into())
    }
}

impl<S: State> From<i32> for Difficulty<S> {
    fn from(score: i32) -> Self {
        Self::Fixed(score.into())
    }
}

impl<S: State> From<u32> for Difficulty<S> {
    fn from(score: u32) -> Self {
        Self::Fixed(score.into())
    }
}

impl<S: State> From<&str> for Difficulty<S> {
    fn from(label: &str) -> Self {
        Self::Fixed(label.into())
    }
}

impl<S: State> From<String> for Difficulty<S> {
    fn from(label: String) -> Self {
        Self::Fixed(label.into())
    }
}

/// Ordered set of candidate next states, each with a difficulty.
///
/// Candidates are evaluated in insertion order. Inserting a state that is
/// already present replaces its difficulty in place.
#[derive(Clone, Debug)]
pub struct CandidateSet<S: State> {
    candidates: Vec<(S, Difficulty<S>)>,
}

impl<S: State> Default for CandidateSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> CandidateSet<S> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Add a candidate, builder style.
    pub fn with(mut self, state: S, difficulty: impl Into<Difficulty<S>>) -> Self {
        self.insert(state, difficulty);
        self
    }

    pub fn insert(&mut self, state: S, difficulty: impl Into<Difficulty<S>>) {
        let difficulty = difficulty.into();
        match self.candidates.iter_mut().find(|(s, _)| *s == state) {
            Some(slot) => slot.1 = difficulty,
            None => self.candidates.push((state, difficulty)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &Difficulty<S>)> {
        self.candidates.iter().map(|(s, d)| (s, d))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl<S: State, D: Into<Difficulty<S>>> FromIterator<(S, D)> for CandidateSet<S> {
    fn from_iter<I: IntoIterator<Item = (S, D)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (state, difficulty) in iter {
            set.insert(state, difficulty);
        }
        set
    }
}

/// What a state handler asks the engine to do next.
#[derive(Clone, Debug)]
pub enum TransitionSpec<S: State> {
    /// Stop the machine; no further ticks.
    Halt,
    /// Move to the named state.
    Goto(S),
    /// Challenge each candidate in order; fall back to `fallback` if none pass.
    ///
    /// A missing fallback, or one with an empty name, is reported as
    /// [`TransitionError::NoDefaultState`].
    Weighted {
        candidates: CandidateSet<S>,
        fallback: Option<S>,
    },
}

impl<S: State> TransitionSpec<S> {
    pub fn halt() -> Self {
        Self::Halt
    }

    pub fn goto(state: S) -> Self {
        Self::Goto(state)
    }

    pub fn weighted(candidates: CandidateSet<S>, fallback: S) -> Self {
        Self::Weighted {
            candidates,
            fallback: Some(fallback),
        }
    }
}

/// Pick the next state for a weighted transition.
///
/// The first candidate whose difficulty passes `challenge` wins and later
/// candidates are not evaluated. When none pass, `fallback` is taken.
/// A fallback with an empty name counts as missing.
pub fn resolve_candidates<S: State>(
    candidates: &CandidateSet<S>,
    fallback: Option<&S>,
    context: &MachineContext<S>,
    challenge: &Challenge,
) -> Result<(S, TransitionKind), TransitionError> {
    let fallback = fallback
        .filter(|state| !state.name().is_empty())
        .ok_or_else(|| TransitionError::NoDefaultState {
            from: context.state().name().to_string(),
        })?;

    for (candidate, difficulty) in candidates.iter() {
        let resolved = difficulty.resolve(context);
        if challenge.check(&resolved) {
            return Ok((candidate.clone(), TransitionKind::Challenged));
        }
    }

    Ok((fallback.clone(), TransitionKind::Fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dice, StateName};
    use crate::effects::context::MachineHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context_at(state: &str) -> MachineContext<StateName> {
        MachineContext::new(StateName::from(state), MachineHandle::new(Challenge::never()))
    }

    fn name(s: &str) -> StateName {
        StateName::from(s)
    }

    #[test]
    fn missing_fallback_is_an_error() {
        let candidates = CandidateSet::new().with(name("browse"), 20);
        let context = context_at("getProfile");

        let result = resolve_candidates(&candidates, None, &context, &Challenge::always());

        assert_eq!(
            result,
            Err(TransitionError::NoDefaultState {
                from: "getProfile".to_string()
            })
        );
    }

    #[test]
    fn empty_fallback_name_counts_as_missing() {
        let candidates = CandidateSet::new().with(name("browse"), 20);

        let result = resolve_candidates(
            &candidates,
            Some(&name("")),
            &context_at("getProfile"),
            &Challenge::never(),
        );

        assert_eq!(
            result,
            Err(TransitionError::NoDefaultState {
                from: "getProfile".to_string()
            })
        );
    }

    #[test]
    fn missing_fallback_fails_before_any_challenge() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let challenge = Challenge::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let candidates = CandidateSet::new().with(name("browse"), 1);

        let result = resolve_candidates(&candidates, None, &context_at("a"), &challenge);

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn first_passing_candidate_wins() {
        let candidates = CandidateSet::new()
            .with(name("first"), 1)
            .with(name("second"), 1)
            .with(name("third"), 1);
        let fallback = name("default");

        for _ in 0..5 {
            let (next, kind) = resolve_candidates(
                &candidates,
                Some(&fallback),
                &context_at("start"),
                &Challenge::always(),
            )
            .unwrap();
            assert_eq!(next, name("first"));
            assert_eq!(kind, TransitionKind::Challenged);
        }
    }

    #[test]
    fn evaluation_stops_at_first_pass() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluated);
        let candidates = CandidateSet::new()
            .with(name("easy"), 5)
            .with(
                name("lazy"),
                Difficulty::computed(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    DifficultyClass::Score(1)
                }),
            );
        let challenge = Challenge::saving_throw(Dice::fixed(10));

        let (next, _) =
            resolve_candidates(&candidates, Some(&name("d")), &context_at("s"), &challenge)
                .unwrap();

        assert_eq!(next, name("easy"));
        assert_eq!(evaluated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn later_candidate_wins_when_earlier_fail() {
        let candidates = CandidateSet::new()
            .with(name("hard"), 15)
            .with(name("easy"), 5);
        let challenge = Challenge::saving_throw(Dice::fixed(10));

        let (next, kind) =
            resolve_candidates(&candidates, Some(&name("d")), &context_at("s"), &challenge)
                .unwrap();

        assert_eq!(next, name("easy"));
        assert_eq!(kind, TransitionKind::Challenged);
    }

    #[test]
    fn all_failing_candidates_fall_back() {
        let candidates = CandidateSet::new()
            .with(name("browse"), 4)
            .with(name("wishlist"), 8);

        let (next, kind) = resolve_candidates(
            &candidates,
            Some(&name("shop")),
            &context_at("getProfile"),
            &Challenge::never(),
        )
        .unwrap();

        assert_eq!(next, name("shop"));
        assert_eq!(kind, TransitionKind::Fallback);
    }

    #[test]
    fn empty_candidate_set_takes_fallback() {
        let (next, kind) = resolve_candidates(
            &CandidateSet::new(),
            Some(&name("close")),
            &context_at("open"),
            &Challenge::always(),
        )
        .unwrap();

        assert_eq!(next, name("close"));
        assert_eq!(kind, TransitionKind::Fallback);
    }

    #[test]
    fn computed_difficulty_sees_current_state() {
        let difficulty: Difficulty<StateName> = Difficulty::computed(|ctx: &MachineContext<StateName>| {
            if ctx.state().as_str() == "open" {
                DifficultyClass::Score(0)
            } else {
                DifficultyClass::Score(21)
            }
        });

        assert_eq!(
            difficulty.resolve(&context_at("open")),
            DifficultyClass::Score(0)
        );
        assert_eq!(
            difficulty.resolve(&context_at("closed")),
            DifficultyClass::Score(21)
        );
    }

    #[test]
    fn insert_replaces_existing_candidate_in_place() {
        let mut set: CandidateSet<StateName> = vec![(name("a"), 1), (name("b"), 2)]
            .into_iter()
            .collect();
        set.insert(name("a"), 9);

        let order: Vec<_> = set.iter().map(|(s, _)| s.as_str().to_string()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(set.len(), 2);

        let (_, difficulty) = set.iter().next().unwrap();
        assert_eq!(
            difficulty.resolve(&context_at("x")),
            DifficultyClass::Score(9)
        );
    }

    #[test]
    fn error_messages_name_the_problem() {
        let unknown = TransitionError::UnknownState {
            state: "somethingUnknown".to_string(),
        };
        let no_default = TransitionError::NoDefaultState {
            from: "getProfile".to_string(),
        };

        assert_eq!(unknown.to_string(), "unknown state 'somethingUnknown'");
        assert!(no_default.to_string().contains("no default next state"));
        assert_eq!(
            TransitionError::action_failed("Something went wrong").to_string(),
            "transition action failed: Something went wrong"
        );
    }
}
