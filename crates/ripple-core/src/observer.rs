//! The registration surface shared by all observables.

use crate::entry::{CallbackId, Consumer, Entry, Kind, Listener};
use crate::event::EventObserver;

/// Listener registration for anything backed by an [`EventObserver`].
///
/// Implementors only provide [`Observer::event_observer`]; every
/// registration method is derived from it. Adding returns `false` when the
/// callback (by identity) is already registered, strongly or weakly.
/// Removing returns `false` when no matching registration exists.
///
/// Weak registrations hold a [`std::sync::Weak`] to the callback: they do not
/// keep it alive, and are silently dropped from the list once the last
/// strong handle is gone.
pub trait Observer<T: 'static> {
    /// The listener list backing this observer.
    fn event_observer(&self) -> &EventObserver<T>;

    /// Register a no-payload callback.
    fn add_listener(&self, listener: &Listener) -> bool {
        self.event_observer()
            .listeners
            .add(Entry::strong_action(listener))
    }

    /// Remove a callback registered with [`Observer::add_listener`].
    fn remove_listener(&self, listener: &Listener) -> bool {
        self.event_observer()
            .listeners
            .remove(Kind::StrongAction, CallbackId::of_listener(listener))
    }

    /// Register a payload callback.
    fn add_consumer(&self, consumer: &Consumer<T>) -> bool {
        self.event_observer()
            .listeners
            .add(Entry::strong_consumer(consumer))
    }

    /// Remove a callback registered with [`Observer::add_consumer`].
    fn remove_consumer(&self, consumer: &Consumer<T>) -> bool {
        self.event_observer()
            .listeners
            .remove(Kind::StrongConsumer, CallbackId::of_consumer(consumer))
    }

    /// Register a no-payload callback without keeping it alive.
    fn add_weak_listener(&self, listener: &Listener) -> bool {
        self.event_observer()
            .listeners
            .add(Entry::weak_action(listener))
    }

    /// Remove a callback registered with [`Observer::add_weak_listener`].
    fn remove_weak_listener(&self, listener: &Listener) -> bool {
        self.event_observer()
            .listeners
            .remove(Kind::WeakAction, CallbackId::of_listener(listener))
    }

    /// Register a payload callback without keeping it alive.
    fn add_weak_consumer(&self, consumer: &Consumer<T>) -> bool {
        self.event_observer()
            .listeners
            .add(Entry::weak_consumer(consumer))
    }

    /// Remove a callback registered with [`Observer::add_weak_consumer`].
    fn remove_weak_consumer(&self, consumer: &Consumer<T>) -> bool {
        self.event_observer()
            .listeners
            .remove(Kind::WeakConsumer, CallbackId::of_consumer(consumer))
    }
}
