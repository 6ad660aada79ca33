#![forbid(unsafe_code)]

//! Core: listener registration and synchronous change notification.
//!
//! # Role in ripple
//! `ripple-core` owns the one primitive every other ripple type is built on:
//! an ordered, thread-safe list of callbacks that is triggered synchronously.
//! `ripple-state` composes it into boolean states, combinations, groups and
//! generic values.
//!
//! # Primary responsibilities
//! - **Event**: a triggerable listener list ([`Event::accept`], [`Event::run`]).
//! - **Observer**: the registration surface shared by events and every
//!   derived observable ([`Observer`]).
//! - **Weak registrations**: callbacks held through [`std::sync::Weak`] that
//!   never extend the lifetime of their owner and vanish once it is dropped.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. A callback (by identity) is registered at most once per event, whether
//!    strongly or weakly.
//! 3. Both trigger forms invoke actions *and* consumers.
//! 4. The listener lock is never held while a callback runs, so callbacks may
//!    register or remove listeners (including themselves) mid-dispatch.
//! 5. Dead weak entries are pruned opportunistically on add, remove and
//!    dispatch; there is no background cleanup.

pub mod entry;
pub mod event;
pub mod observer;
pub mod sync;

pub use entry::{Consumer, Listener, consumer, listener};
pub use event::{Event, EventObserver};
pub use observer::Observer;
