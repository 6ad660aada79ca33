//! Boolean states with change notification.
//!
//! # Design
//!
//! Every state handle ([`State`], [`StateObserver`], [`Combination`]) wraps an
//! `Arc<StateCore>`. A core owns its change [`Event`] and one of three value
//! sources:
//!
//! - a stored boolean (a plain [`State`]),
//! - another core, read and notified negated (a reversed view),
//! - a list of member cores folded by a [`Conjunction`] (a [`Combination`]).
//!
//! The reversed view of a core is created on first request and cached
//! weakly on the original, so repeated requests return the same instance
//! while it is alive. The reversed view of a reversed view is the original.
//!
//! # Invariants
//!
//! 1. `set(v)` with `v == get()` is a no-op: no notification.
//! 2. Every notification carries `(previous, current)` with
//!    `previous != current`.
//! 3. `s.reversed().get() == !s.get()`, always.
//! 4. `s.reversed().reversed()` is `s` (same instance).
//!
//! [`Conjunction`]: crate::Conjunction

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use ripple_core::sync::lock;
use ripple_core::{Consumer, Event, EventObserver, Observer, consumer};
use tracing::debug;

use crate::change::ValueChange;
use crate::combination::{Combination, CombinationCore, Conjunction};
use crate::group::Group;

/// The notification payload of every boolean state.
pub type StateChange = ValueChange<bool>;

pub(crate) enum Source {
    Value(Mutex<bool>),
    Reversed {
        original: Arc<StateCore>,
        /// Owned here, registered weakly on `original`.
        _forward: Consumer<StateChange>,
    },
    Combination(CombinationCore),
}

pub(crate) struct StateCore {
    pub(crate) source: Source,
    pub(crate) changed: Event<StateChange>,
    reversed: Mutex<Weak<StateCore>>,
}

impl StateCore {
    pub(crate) fn new(source: Source) -> Arc<Self> {
        Self::with_event(source, Event::new())
    }

    fn with_event(source: Source, changed: Event<StateChange>) -> Arc<Self> {
        Arc::new(Self {
            source,
            changed,
            reversed: Mutex::new(Weak::new()),
        })
    }

    /// Identity of a core, stable for its lifetime.
    pub(crate) fn id(core: &Arc<Self>) -> usize {
        Arc::as_ptr(core).addr()
    }

    pub(crate) fn get(&self) -> bool {
        match &self.source {
            Source::Value(value) => *lock(value),
            Source::Reversed { original, .. } => !original.get(),
            Source::Combination(combination) => combination.get(),
        }
    }

    /// Replace a stored value and notify if it changed. Derived cores have
    /// no stored value; their handles never reach this.
    fn update(&self, f: impl FnOnce(bool) -> bool) {
        let Source::Value(value) = &self.source else {
            debug_assert!(false, "update on a derived state");
            return;
        };
        let change = {
            let mut value = lock(value);
            let next = f(*value);
            if next == *value {
                return;
            }
            let change = ValueChange::new(*value, next);
            *value = next;
            change
        };
        debug!(previous = change.previous, current = change.current, "state changed");
        self.changed.accept(&change);
    }

    pub(crate) fn set(&self, value: bool) {
        self.update(|_| value);
    }

    pub(crate) fn reversed_of(core: &Arc<Self>) -> Arc<Self> {
        if let Source::Reversed { original, .. } = &core.source {
            return Arc::clone(original);
        }
        let mut cached = lock(&core.reversed);
        if let Some(reversed) = cached.upgrade() {
            return reversed;
        }
        let changed = Event::new();
        let forward = {
            let changed = changed.clone();
            consumer(move |change: &StateChange| changed.accept(&change.inverted()))
        };
        core.changed.add_weak_consumer(&forward);
        let reversed = Self::with_event(
            Source::Reversed {
                original: Arc::clone(core),
                _forward: forward,
            },
            changed,
        );
        *cached = Arc::downgrade(&reversed);
        reversed
    }

    fn is_reversed(&self) -> bool {
        matches!(self.source, Source::Reversed { .. })
    }

    /// Whether this core is the reversed view of `core`.
    pub(crate) fn is_reversed_of(&self, core: &Arc<Self>) -> bool {
        matches!(&self.source, Source::Reversed { original, .. } if Arc::ptr_eq(original, core))
    }
}

/// A mutable boolean with change notification.
///
/// Cloning a `State` creates a new handle to the **same** state. Listeners
/// receive a [`ValueChange`] with the previous and the new value.
///
/// # Example
///
/// ```
/// use ripple_state::{Observer, State, ValueChange, consumer};
///
/// let enabled = State::new(false);
/// let on_change = consumer(|change: &ValueChange<bool>| {
///     println!("{} -> {}", change.previous, change.current);
/// });
/// enabled.add_consumer(&on_change);
///
/// enabled.set(true);
/// assert!(enabled.get());
/// assert!(!enabled.reversed().get());
/// ```
#[derive(Clone)]
pub struct State {
    pub(crate) core: Arc<StateCore>,
}

impl Default for State {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State").field("value", &self.get()).finish()
    }
}

impl State {
    #[must_use]
    pub fn new(value: bool) -> Self {
        Self {
            core: StateCore::new(Source::Value(Mutex::new(value))),
        }
    }

    /// Set the value. Notifies `(previous, value)` if it changed.
    ///
    /// # Panics
    ///
    /// Re-raises any panic from a listener.
    pub fn set(&self, value: bool) {
        self.core.set(value);
    }

    /// Flip the value and notify.
    pub fn toggle(&self) {
        self.core.update(|value| !value);
    }

    /// A combination that is `true` when every state is `true`.
    pub fn and<S: Into<StateObserver>>(states: impl IntoIterator<Item = S>) -> Combination {
        Combination::new(Conjunction::And, states)
    }

    /// A combination that is `true` when any state is `true`.
    pub fn or<S: Into<StateObserver>>(states: impl IntoIterator<Item = S>) -> Combination {
        Combination::new(Conjunction::Or, states)
    }

    /// A group keeping at most one of `states` active.
    pub fn group<'a>(states: impl IntoIterator<Item = &'a State>) -> Group {
        let group = Group::new();
        for state in states {
            group.add_state(state);
        }
        group
    }
}

/// A read-only view of a state.
///
/// Obtained from `observer()` or `reversed()` on any state handle.
#[derive(Clone)]
pub struct StateObserver {
    pub(crate) core: Arc<StateCore>,
}

impl fmt::Debug for StateObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObserver")
            .field("value", &self.get())
            .field("reversed", &self.core.is_reversed())
            .finish()
    }
}

macro_rules! state_handle {
    ($($handle:ident),+ $(,)?) => {$(
        impl $handle {
            /// The current value.
            #[must_use]
            pub fn get(&self) -> bool {
                self.core.get()
            }

            /// A read-only view sharing this state's value and listeners.
            #[must_use]
            pub fn observer(&self) -> StateObserver {
                StateObserver {
                    core: Arc::clone(&self.core),
                }
            }

            /// The logical negation of this state.
            ///
            /// Notifications are the complement of this state's. Reversing a
            /// reversed view returns the original state.
            #[must_use]
            pub fn reversed(&self) -> StateObserver {
                StateObserver {
                    core: StateCore::reversed_of(&self.core),
                }
            }

            /// Whether `other` refers to the same state instance.
            #[must_use]
            pub fn ptr_eq(&self, other: impl Into<StateObserver>) -> bool {
                Arc::ptr_eq(&self.core, &other.into().core)
            }
        }

        impl Observer<StateChange> for $handle {
            fn event_observer(&self) -> &EventObserver<StateChange> {
                self.core.changed.event_observer()
            }
        }

        impl From<&$handle> for StateObserver {
            fn from(handle: &$handle) -> Self {
                handle.observer()
            }
        }
    )+};
}

state_handle!(State, StateObserver, Combination);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::{Listener, listener};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<StateChange>>>, Consumer<StateChange>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let c = consumer(move |change: &StateChange| l.lock().unwrap().push(*change));
        (log, c)
    }

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (
            count,
            listener(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn default_is_false() {
        assert!(!State::default().get());
        assert!(State::new(true).get());
    }

    #[test]
    fn set_same_value_is_silent() {
        let state = State::new(true);
        let (log, c) = recorder();
        state.add_consumer(&c);

        state.set(true);
        assert!(log.lock().unwrap().is_empty());

        state.set(false);
        assert_eq!(*log.lock().unwrap(), vec![ValueChange::new(true, false)]);
    }

    #[test]
    fn toggle_notifies() {
        let state = State::new(false);
        let (count, l) = counter();
        state.add_listener(&l);

        state.toggle();
        state.toggle();
        assert!(!state.get());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clone_shares_value_and_listeners() {
        let a = State::new(false);
        let b = a.clone();
        let (count, l) = counter();
        a.add_listener(&l);

        b.set(true);
        assert!(a.get());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn reversed_reads_negation() {
        let state = State::new(false);
        let reversed = state.reversed();
        assert!(reversed.get());

        state.set(true);
        assert!(!reversed.get());
        assert_ne!(state.get(), reversed.get());
    }

    #[test]
    fn reversed_round_trip_is_identity() {
        let state = State::new(true);
        let reversed = state.reversed();
        assert!(reversed.reversed().ptr_eq(&state));
        assert!(state.reversed().ptr_eq(&reversed));
        assert!(!reversed.ptr_eq(&state));
    }

    #[test]
    fn reversed_notifies_complement() {
        let state = State::new(false);
        let reversed = state.reversed();
        let (log, c) = recorder();
        reversed.add_consumer(&c);

        state.set(true);
        state.set(true);
        state.set(false);
        assert_eq!(
            *log.lock().unwrap(),
            vec![ValueChange::new(true, false), ValueChange::new(false, true)]
        );
    }

    #[test]
    fn dropped_reversed_view_unhooks_itself() {
        let state = State::new(false);
        let reversed = state.reversed();
        assert_eq!(state.core.changed.listener_count(), 1);

        drop(reversed);
        state.set(true);
        assert_eq!(state.core.changed.listener_count(), 0);

        // A fresh view is created on demand.
        assert!(!state.reversed().get());
    }

    #[test]
    fn reversed_view_keeps_original_alive() {
        let reversed = State::new(true).reversed();
        assert!(!reversed.get());
        assert!(reversed.reversed().get());
    }

    #[test]
    fn observer_shares_listeners() {
        let state = State::new(false);
        let observer = state.observer();
        let (count, l) = counter();
        assert!(observer.add_listener(&l));
        assert!(!state.add_listener(&l));

        state.set(true);
        assert!(observer.get());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_set_other_state() {
        let source = State::new(false);
        let target = State::new(false);
        let t = target.clone();
        let follow = consumer(move |change: &StateChange| t.set(change.current));
        source.add_consumer(&follow);

        source.set(true);
        assert!(target.get());
    }

    #[test]
    fn debug_format() {
        let state = State::new(true);
        assert!(format!("{state:?}").contains("true"));
        let reversed = format!("{:?}", state.reversed());
        assert!(reversed.contains("StateObserver"));
        assert!(reversed.contains("reversed: true"));
    }
}
