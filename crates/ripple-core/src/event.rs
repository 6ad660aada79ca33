//! Triggerable listener lists.
//!
//! # Design
//!
//! [`Event<T>`] owns a shared listener list behind a single [`Mutex`]. The
//! list itself (`Vec<Entry<T>>`) is allocated on the first registration and
//! released again when the last entry is removed.
//!
//! A trigger takes a point-in-time snapshot of the live callbacks under the
//! lock, releases it, then invokes the snapshot in registration order.
//! Callbacks therefore never run while the lock is held, and a callback that
//! adds or removes listeners affects only later passes.
//!
//! # Failure Modes
//!
//! - **Panicking callback**: the panic propagates out of [`Event::accept`] /
//!   [`Event::run`]; callbacks later in the same pass are skipped. The event
//!   stays usable.
//! - **Concurrent triggers**: registration is thread-safe, triggering is not
//!   ordered. Callers that trigger from several threads must serialize the
//!   triggers themselves.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::entry::{CallbackId, Consumer, Entry, Kind, Listener, Resolved};
use crate::observer::Observer;
use crate::sync::lock;

/// Shared interior of [`Event`] and [`EventObserver`].
pub(crate) struct Listeners<T> {
    /// `None` until the first registration, and again once emptied.
    entries: Mutex<Option<Vec<Entry<T>>>>,
}

impl<T> Listeners<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(None),
        }
    }

    pub(crate) fn add(&self, entry: Entry<T>) -> bool {
        let id = entry.id();
        let mut guard = lock(&self.entries);
        let entries = guard.get_or_insert_with(Vec::new);
        entries.retain(Entry::is_alive);
        if entries.iter().any(|existing| existing.id() == id) {
            trace!(kind = ?entry.kind(), "duplicate registration rejected");
            return false;
        }
        entries.push(entry);
        true
    }

    pub(crate) fn remove(&self, kind: Kind, id: CallbackId) -> bool {
        // Dropped after the guard so a callback's destructor never runs
        // under the lock.
        let removed = {
            let mut guard = lock(&self.entries);
            let Some(entries) = guard.as_mut() else {
                return false;
            };
            entries.retain(Entry::is_alive);
            let removed = entries
                .iter()
                .position(|entry| entry.kind() == kind && entry.id() == id)
                .map(|index| entries.remove(index));
            if entries.is_empty() {
                *guard = None;
            }
            removed
        };
        trace!(?kind, removed = removed.is_some(), "listener removal");
        removed.is_some()
    }

    /// Live callbacks in registration order. Prunes dead weak entries.
    fn snapshot(&self) -> Vec<Resolved<T>> {
        let mut guard = lock(&self.entries);
        let Some(entries) = guard.as_mut() else {
            return Vec::new();
        };
        entries.retain(Entry::is_alive);
        let live = entries.iter().filter_map(Entry::resolve).collect();
        if entries.is_empty() {
            *guard = None;
        }
        live
    }

    fn dispatch(&self, value: &T) {
        let live = self.snapshot();
        trace!(listeners = live.len(), "dispatching event");
        for callback in &live {
            callback.invoke(value);
        }
    }

    fn len(&self) -> usize {
        lock(&self.entries).as_ref().map_or(0, Vec::len)
    }

    fn is_allocated(&self) -> bool {
        lock(&self.entries).is_some()
    }
}

/// A read-only handle to an event's listener list.
///
/// Registers and removes listeners but cannot trigger. Obtained from
/// [`Event::observer`]; every clone shares the same list.
pub struct EventObserver<T> {
    pub(crate) listeners: Arc<Listeners<T>>,
}

impl<T> Clone for EventObserver<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> fmt::Debug for EventObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObserver")
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

impl<T> EventObserver<T> {
    /// Number of registered entries, including dead weak entries that have
    /// not been pruned yet.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether this observer and `other` share a listener list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.listeners, &other.listeners)
    }
}

impl<T: 'static> Observer<T> for EventObserver<T> {
    fn event_observer(&self) -> &EventObserver<T> {
        self
    }
}

/// A synchronous, multi-listener event.
///
/// Cloning an `Event` creates a new handle to the **same** listener list.
///
/// # Example
///
/// ```
/// use ripple_core::{Event, Observer, consumer, listener};
///
/// let event = Event::<u32>::new();
/// let on_value = consumer(|value: &u32| println!("got {value}"));
/// let on_any = listener(|| println!("something happened"));
///
/// assert!(event.add_consumer(&on_value));
/// assert!(event.add_listener(&on_any));
/// assert!(!event.add_listener(&on_any));
///
/// event.accept(&7);
/// event.run(); // consumers receive u32::default()
/// ```
pub struct Event<T> {
    observer: EventObserver<T>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listener_count", &self.observer.listener_count())
            .finish()
    }
}

impl<T> Event<T> {
    /// Create an event with no listeners. The listener list itself is not
    /// allocated until the first registration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observer: EventObserver {
                listeners: Arc::new(Listeners::new()),
            },
        }
    }

    /// Trigger the event with a payload.
    ///
    /// Every live listener is invoked in registration order: actions without
    /// an argument, consumers with `value`.
    ///
    /// # Panics
    ///
    /// Re-raises any panic from a listener; the remaining listeners of this
    /// pass are not invoked.
    pub fn accept(&self, value: &T) {
        self.observer.listeners.dispatch(value);
    }

    /// A read-only handle that shares this event's listener list.
    #[must_use]
    pub fn observer(&self) -> EventObserver<T> {
        self.observer.clone()
    }

    /// Number of registered entries, including dead weak entries that have
    /// not been pruned yet.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.observer.listener_count()
    }

    /// Whether no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.observer.listeners.is_allocated()
    }
}

impl<T: Default> Event<T> {
    /// Trigger the event without data.
    ///
    /// Actions and consumers both fire; consumers receive `T::default()` as
    /// the "no data" value.
    ///
    /// # Panics
    ///
    /// Re-raises any panic from a listener, see [`Event::accept`].
    pub fn run(&self) {
        self.accept(&T::default());
    }
}

impl<T: 'static> Observer<T> for Event<T> {
    fn event_observer(&self) -> &EventObserver<T> {
        &self.observer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
