#![forbid(unsafe_code)]

//! Observable states and values for ripple.
//!
//! Everything here is built on [`ripple_core::Event`]:
//!
//! - [`State`]: a mutable boolean that notifies `(previous, current)` on change.
//! - [`StateObserver`]: a read-only view, including the lazily created
//!   reversed view of any state.
//! - [`Combination`]: an AND/OR aggregate over other states, derived only.
//! - [`Group`]: keeps at most one member state active.
//! - [`Value`]: a nullable or non-null value with validators, a lock state
//!   and two-way or read-only links to other values.
//!
//! # Ownership
//!
//! Handles are cheap clones of an `Arc`. Internal listeners that derived
//! states register on their sources (reversed views, combinations, groups)
//! are weak registrations owned by the derived state, so a derived state
//! never keeps itself alive through its sources and is unhooked once dropped.

pub mod change;
pub mod combination;
pub mod error;
pub mod group;
pub mod state;
pub mod value;

pub use change::ValueChange;
pub use combination::{Combination, Conjunction};
pub use error::{StateError, ValueError};
pub use group::Group;
pub use state::{State, StateChange, StateObserver};
pub use value::{Notify, Validator, Value, ValueBuilder, ValueObserver, validator};

pub use ripple_core::{Consumer, Event, EventObserver, Listener, Observer, consumer, listener};
