//! Property-based invariant tests for states, combinations and groups.
//!
//! 1. An AND/OR combination always equals `all`/`any` over its members.
//! 2. A combination notifies exactly once per flip of its derived value,
//!    with a `(previous, current)` pair describing the flip.
//! 3. A reversed view always holds the opposite of its original.
//! 4. A group never has more than one member `true`.
//! 5. Setting a state to its current value never notifies.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use ripple_state::{
    Combination, Conjunction, Observer, State, StateChange, StateObserver, consumer,
};

const MEMBERS: usize = 5;

fn conjunction_strategy() -> impl Strategy<Value = Conjunction> {
    prop_oneof![Just(Conjunction::And), Just(Conjunction::Or)]
}

fn writes_strategy() -> impl Strategy<Value = Vec<(usize, bool)>> {
    proptest::collection::vec((0..MEMBERS, any::<bool>()), 0..64)
}

fn recorder() -> (
    Arc<Mutex<Vec<StateChange>>>,
    ripple_state::Consumer<StateChange>,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let l = Arc::clone(&log);
    let record = consumer(move |change: &StateChange| l.lock().unwrap().push(*change));
    (log, record)
}

proptest! {
    #[test]
    fn combination_tracks_members(
        conjunction in conjunction_strategy(),
        initial in proptest::collection::vec(any::<bool>(), MEMBERS),
        writes in writes_strategy(),
    ) {
        let states: Vec<State> = initial.iter().map(|v| State::new(*v)).collect();
        let combination = Combination::new(conjunction, &states);
        let (log, record) = recorder();
        combination.add_consumer(&record);

        let expected = |states: &[State]| conjunction.evaluate(states.iter().map(State::get));
        let mut previous = expected(&states);
        prop_assert_eq!(combination.get(), previous);

        let mut flips = Vec::new();
        for (index, value) in writes {
            states[index].set(value);
            let current = expected(&states);
            prop_assert_eq!(combination.get(), current);
            if current != previous {
                flips.push(StateChange::new(previous, current));
            }
            previous = current;
        }
        prop_assert_eq!(&*log.lock().unwrap(), &flips);
    }

    #[test]
    fn reversed_is_always_opposite(
        initial in any::<bool>(),
        writes in proptest::collection::vec(any::<bool>(), 0..32),
    ) {
        let state = State::new(initial);
        let reversed = state.reversed();
        let (log, record) = recorder();
        reversed.add_consumer(&record);

        let mut notifications = 0;
        for value in writes {
            let changed = state.get() != value;
            state.set(value);
            prop_assert_eq!(reversed.get(), !state.get());
            if changed {
                notifications += 1;
            }
        }
        prop_assert_eq!(log.lock().unwrap().len(), notifications);
        prop_assert!(reversed.reversed().ptr_eq(&state));
    }

    #[test]
    fn group_keeps_at_most_one_active(
        initial in proptest::collection::vec(any::<bool>(), MEMBERS),
        writes in writes_strategy(),
    ) {
        let states: Vec<State> = initial.iter().map(|v| State::new(*v)).collect();
        let _group = State::group(&states);
        let active = |states: &[State]| states.iter().filter(|s| s.get()).count();
        prop_assert!(active(&states) <= 1);

        for (index, value) in writes {
            states[index].set(value);
            prop_assert!(active(&states) <= 1);
            if value {
                prop_assert!(states[index].get());
            }
        }
    }

    #[test]
    fn equal_writes_are_silent(
        initial in any::<bool>(),
        repeats in 1usize..8,
    ) {
        let state = State::new(initial);
        let observer: StateObserver = state.observer();
        let (log, record) = recorder();
        observer.add_consumer(&record);

        for _ in 0..repeats {
            state.set(initial);
        }
        prop_assert!(log.lock().unwrap().is_empty());
        state.toggle();
        prop_assert_eq!(log.lock().unwrap().len(), 1);
    }
}
