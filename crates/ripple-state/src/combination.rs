//! AND/OR combinations of states.
//!
//! # Design
//!
//! A [`Combination`] holds its members in order, each paired with the
//! internal consumer it registered (weakly) on that member. When a member
//! changes `old -> new`, the combination evaluates its conjunction twice,
//! once with `old` substituted for that member and once with `new`, and
//! notifies only if the two results differ. Reading the member's live value
//! instead of the substituted one would miss or invent transitions when
//! several members change in a row.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `set` on a combination | value is derived | `Err(StateError::Unsupported)` |
//! | Duplicate member | same state added twice | `add_state` returns `false` |
//! | Self membership | combination, or its reversed view, added to itself | `add_state` returns `false` |
//! | Unknown conjunction name | `"xor".parse()` | `Err(StateError::UnknownConjunction)` |
//!
//! Deeper cycles (A in B, B in A) are not detected and deadlock on `get`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Weak};

use ripple_core::sync::lock;
use ripple_core::{Consumer, Observer, consumer};
use tracing::trace;

use crate::change::ValueChange;
use crate::error::StateError;
use crate::state::{Source, StateChange, StateCore, StateObserver};

/// How a [`Combination`] folds its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conjunction {
    /// `true` when every member is `true`; an empty combination is `true`.
    And,
    /// `true` when any member is `true`; an empty combination is `false`.
    Or,
}

impl Conjunction {
    /// Fold `values`, short-circuiting on the first deciding value.
    pub fn evaluate(self, values: impl IntoIterator<Item = bool>) -> bool {
        let mut values = values.into_iter();
        match self {
            Self::And => values.all(|value| value),
            Self::Or => values.any(|value| value),
        }
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "&&",
            Self::Or => "||",
        })
    }
}

impl FromStr for Conjunction {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" | "&&" => Ok(Self::And),
            "or" | "||" => Ok(Self::Or),
            _ => Err(StateError::UnknownConjunction(s.to_string())),
        }
    }
}

struct Member {
    state: Arc<StateCore>,
    forward: Consumer<StateChange>,
}

impl Member {
    fn id(&self) -> usize {
        StateCore::id(&self.state)
    }
}

pub(crate) struct CombinationCore {
    conjunction: Conjunction,
    members: Mutex<Vec<Member>>,
}

impl CombinationCore {
    fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            members: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get(&self) -> bool {
        Self::evaluate(self.conjunction, &lock(&self.members))
    }

    fn evaluate(conjunction: Conjunction, members: &[Member]) -> bool {
        conjunction.evaluate(members.iter().map(|member| member.state.get()))
    }

    /// The conjunction with `member` pinned to `value`.
    fn evaluate_with(&self, members: &[Member], member: usize, value: bool) -> bool {
        self.conjunction.evaluate(members.iter().map(|m| {
            if m.id() == member {
                value
            } else {
                m.state.get()
            }
        }))
    }

    fn member_changed(&self, member: usize, change: &StateChange) -> Option<StateChange> {
        let members = lock(&self.members);
        if !members.iter().any(|m| m.id() == member) {
            return None;
        }
        let previous = self.evaluate_with(&members, member, change.previous);
        let current = self.evaluate_with(&members, member, change.current);
        let change = ValueChange::new(previous, current);
        change.is_change().then_some(change)
    }
}

/// The consumer a combination registers on one member.
fn forwarder(combination: Weak<StateCore>, member: usize) -> Consumer<StateChange> {
    consumer(move |change: &StateChange| {
        let Some(combination) = combination.upgrade() else {
            return;
        };
        let Source::Combination(core) = &combination.source else {
            return;
        };
        if let Some(change) = core.member_changed(member, change) {
            trace!(?change, conjunction = %core.conjunction, "combination changed");
            combination.changed.accept(&change);
        }
    })
}

/// A read-only boolean derived from other states by AND or OR.
///
/// Members can be plain states, reversed views or other combinations. The
/// combination notifies only when its own value changes.
///
/// # Example
///
/// ```
/// use ripple_state::State;
///
/// let selected = State::new(true);
/// let busy = State::new(false);
/// let can_delete = State::and([selected.observer(), busy.reversed()]);
/// assert!(can_delete.get());
///
/// busy.set(true);
/// assert!(!can_delete.get());
/// ```
#[derive(Clone)]
pub struct Combination {
    pub(crate) core: Arc<StateCore>,
}

impl fmt::Debug for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combination")
            .field("conjunction", &self.conjunction())
            .field("members", &self.len())
            .field("value", &self.get())
            .finish()
    }
}

impl Combination {
    /// A combination of `states` folded by `conjunction`.
    pub fn new<S: Into<StateObserver>>(
        conjunction: Conjunction,
        states: impl IntoIterator<Item = S>,
    ) -> Self {
        let combination = Self {
            core: StateCore::new(Source::Combination(CombinationCore::new(conjunction))),
        };
        for state in states {
            combination.add_state(state);
        }
        combination
    }

    fn combination(&self) -> &CombinationCore {
        match &self.core.source {
            Source::Combination(core) => core,
            _ => unreachable!("combination handle over a non-combination state"),
        }
    }

    #[must_use]
    pub fn conjunction(&self) -> Conjunction {
        self.combination().conjunction
    }

    /// Number of member states.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.combination().members).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Always fails: a combination's value is derived from its members.
    pub fn set(&self, _value: bool) -> Result<(), StateError> {
        Err(StateError::Unsupported { operation: "set" })
    }

    /// Add a member. Notifies if this changes the combination's value.
    ///
    /// Returns `false` if `state` is already a member, or is this combination
    /// or its reversed view.
    pub fn add_state(&self, state: impl Into<StateObserver>) -> bool {
        let state = state.into().core;
        let id = StateCore::id(&state);
        if id == StateCore::id(&self.core) || state.is_reversed_of(&self.core) {
            return false;
        }
        let combination = self.combination();
        let change = {
            let mut members = lock(&combination.members);
            if members.iter().any(|m| m.id() == id) {
                return false;
            }
            let previous = CombinationCore::evaluate(combination.conjunction, &members);
            let forward = forwarder(Arc::downgrade(&self.core), id);
            state.changed.add_weak_consumer(&forward);
            members.push(Member { state, forward });
            let current = CombinationCore::evaluate(combination.conjunction, &members);
            ValueChange::new(previous, current)
        };
        if change.is_change() {
            self.core.changed.accept(&change);
        }
        true
    }

    /// Remove a member. Notifies if this changes the combination's value.
    ///
    /// Returns `false` if `state` is not a member.
    pub fn remove_state(&self, state: impl Into<StateObserver>) -> bool {
        let id = StateCore::id(&state.into().core);
        let combination = self.combination();
        let (removed, change) = {
            let mut members = lock(&combination.members);
            let Some(index) = members.iter().position(|m| m.id() == id) else {
                return false;
            };
            let previous = CombinationCore::evaluate(combination.conjunction, &members);
            let removed = members.remove(index);
            let current = CombinationCore::evaluate(combination.conjunction, &members);
            (removed, ValueChange::new(previous, current))
        };
        removed.state.changed.remove_weak_consumer(&removed.forward);
        if change.is_change() {
            self.core.changed.accept(&change);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;
    use pretty_assertions::assert_eq;

    fn recorder(
        combination: &Combination,
    ) -> (Arc<Mutex<Vec<StateChange>>>, Consumer<StateChange>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let c = consumer(move |change: &StateChange| l.lock().unwrap().push(*change));
        combination.add_consumer(&c);
        (log, c)
    }

    #[test]
    fn empty_combinations() {
        assert!(State::and(Vec::<StateObserver>::new()).get());
        assert!(!State::or(Vec::<StateObserver>::new()).get());
    }

    #[test]
    fn and_notifies_once_when_all_become_true() {
        let a = State::new(false);
        let b = State::new(false);
        let c = State::new(false);
        let and = State::and([&a, &b, &c]);
        let (log, _c) = recorder(&and);
        assert!(!and.get());

        a.set(true);
        b.set(true);
        assert!(log.lock().unwrap().is_empty());
        assert!(!and.get());

        c.set(true);
        assert!(and.get());
        assert_eq!(*log.lock().unwrap(), vec![ValueChange::new(false, true)]);
    }

    #[test]
    fn or_remove_state_notifies() {
        let a = State::new(false);
        let b = State::new(true);
        let or = State::or([&a, &b]);
        let (log, _c) = recorder(&or);
        assert!(or.get());

        assert!(or.remove_state(&b));
        assert!(!or.get());
        assert_eq!(*log.lock().unwrap(), vec![ValueChange::new(true, false)]);
        assert!(!or.remove_state(&b));

        // No longer a member.
        b.set(false);
        b.set(true);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn add_state_notifies_on_value_change() {
        let a = State::new(true);
        let b = State::new(false);
        let and = State::and([&a]);
        let (log, _c) = recorder(&and);

        assert!(and.add_state(&b));
        assert!(!and.add_state(&b));
        assert_eq!(*log.lock().unwrap(), vec![ValueChange::new(true, false)]);
        assert_eq!(and.len(), 2);
    }

    #[test]
    fn set_is_unsupported() {
        let and = State::and([State::new(true).observer()]);
        assert_eq!(
            and.set(false),
            Err(StateError::Unsupported { operation: "set" })
        );
        assert!(and.get());
    }

    #[test]
    fn cannot_contain_itself() {
        let or = State::or(Vec::<StateObserver>::new());
        assert!(!or.add_state(&or));
        assert!(or.is_empty());
    }

    #[test]
    fn cannot_contain_its_reversed_view() {
        let a = State::new(true);
        let and = State::and([&a]);
        assert!(!and.add_state(and.reversed()));
        assert!(!and.add_state(and.reversed().reversed()));
        assert_eq!(and.len(), 1);
        assert!(and.get());

        let core = Arc::downgrade(&and.core);
        drop(and);
        assert!(core.upgrade().is_none());
    }

    #[test]
    fn or_flips_only_on_boundaries() {
        let a = State::new(false);
        let b = State::new(false);
        let or = State::or([&a, &b]);
        let (log, _c) = recorder(&or);

        a.set(true);
        b.set(true);
        a.set(false);
        b.set(false);
        assert_eq!(
            *log.lock().unwrap(),
            vec![ValueChange::new(false, true), ValueChange::new(true, false)]
        );
    }

    #[test]
    fn reversed_members_and_nested_combinations() {
        let selected = State::new(false);
        let busy = State::new(false);
        let editable = State::new(true);
        let can_act = State::and([selected.observer(), busy.reversed()]);
        let any = State::or([can_act.observer(), editable.observer()]);
        let (log, _c) = recorder(&any);
        assert!(any.get());

        editable.set(false);
        selected.set(true);
        assert!(any.get());
        busy.set(true);
        assert!(!any.get());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ValueChange::new(true, false),
                ValueChange::new(false, true),
                ValueChange::new(true, false),
            ]
        );
    }

    #[test]
    fn reversed_combination() {
        let a = State::new(true);
        let and = State::and([&a]);
        let not = and.reversed();
        assert!(!not.get());
        a.set(false);
        assert!(not.get());
        assert!(not.reversed().ptr_eq(&and));
    }

    #[test]
    fn dropped_combination_unhooks_from_members() {
        let a = State::new(false);
        let and = State::and([&a]);
        assert_eq!(a.core.changed.listener_count(), 1);

        drop(and);
        a.set(true);
        assert_eq!(a.core.changed.listener_count(), 0);
    }

    #[test]
    fn conjunction_display_and_parse() {
        assert_eq!(Conjunction::And.to_string(), "&&");
        assert_eq!(Conjunction::Or.to_string(), "||");
        assert_eq!("AND".parse::<Conjunction>(), Ok(Conjunction::And));
        assert_eq!(" || ".parse::<Conjunction>(), Ok(Conjunction::Or));
        assert_eq!(
            "xor".parse::<Conjunction>(),
            Err(StateError::UnknownConjunction("xor".into()))
        );
    }

    #[test]
    fn conjunction_short_circuits() {
        let mut seen = 0;
        let values = [false, true, true].into_iter().inspect(|_| seen += 1);
        assert!(!Conjunction::And.evaluate(values));
        assert_eq!(seen, 1);
    }
}
