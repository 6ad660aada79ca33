//! Listener registration entries.
//!
//! # Design
//!
//! A registration is one of four kinds: a no-payload action or a payload
//! consumer, each held either strongly ([`Arc`]) or weakly ([`Weak`]). All
//! four expose the same two operations: an identity used for duplicate
//! detection and removal, and [`Entry::resolve`], which yields an invocable
//! callback or nothing if a weak referent has been dropped.
//!
//! Identity is the address of the shared closure allocation. A [`Weak`] keeps
//! that allocation alive, so a dead weak entry can never alias a newly
//! created callback.

use std::sync::{Arc, Weak};

/// A shared no-payload callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// A shared callback receiving the event payload.
pub type Consumer<T> = Arc<dyn Fn(&T) + Send + Sync>;

type WeakListener = Weak<dyn Fn() + Send + Sync>;
type WeakConsumer<T> = Weak<dyn Fn(&T) + Send + Sync>;

/// Wrap a closure as a shareable [`Listener`].
///
/// Keep the returned handle to remove the listener later, or to keep a weak
/// registration alive.
pub fn listener(f: impl Fn() + Send + Sync + 'static) -> Listener {
    Arc::new(f)
}

/// Wrap a closure as a shareable [`Consumer`].
pub fn consumer<T>(f: impl Fn(&T) + Send + Sync + 'static) -> Consumer<T> {
    Arc::new(f)
}

/// Address of a callback allocation, independent of strength and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CallbackId(usize);

impl CallbackId {
    pub(crate) fn of_listener(listener: &Listener) -> Self {
        Self(Arc::as_ptr(listener).cast::<()>().addr())
    }

    pub(crate) fn of_consumer<T>(consumer: &Consumer<T>) -> Self {
        Self(Arc::as_ptr(consumer).cast::<()>().addr())
    }
}

/// Which registration list an add or remove call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    StrongAction,
    StrongConsumer,
    WeakAction,
    WeakConsumer,
}

pub(crate) enum Entry<T> {
    StrongAction(Listener),
    StrongConsumer(Consumer<T>),
    WeakAction(WeakListener),
    WeakConsumer(WeakConsumer<T>),
}

/// A live callback taken from an [`Entry`], ready to invoke.
pub(crate) enum Resolved<T> {
    Action(Listener),
    Consumer(Consumer<T>),
}

impl<T> Entry<T> {
    pub(crate) fn strong_action(listener: &Listener) -> Self {
        Self::StrongAction(Arc::clone(listener))
    }

    pub(crate) fn strong_consumer(consumer: &Consumer<T>) -> Self {
        Self::StrongConsumer(Arc::clone(consumer))
    }

    pub(crate) fn weak_action(listener: &Listener) -> Self {
        Self::WeakAction(Arc::downgrade(listener))
    }

    pub(crate) fn weak_consumer(consumer: &Consumer<T>) -> Self {
        Self::WeakConsumer(Arc::downgrade(consumer))
    }

    pub(crate) fn kind(&self) -> Kind {
        match self {
            Self::StrongAction(_) => Kind::StrongAction,
            Self::StrongConsumer(_) => Kind::StrongConsumer,
            Self::WeakAction(_) => Kind::WeakAction,
            Self::WeakConsumer(_) => Kind::WeakConsumer,
        }
    }

    pub(crate) fn id(&self) -> CallbackId {
        let ptr = match self {
            Self::StrongAction(l) => Arc::as_ptr(l).cast::<()>(),
            Self::StrongConsumer(c) => Arc::as_ptr(c).cast::<()>(),
            Self::WeakAction(l) => Weak::as_ptr(l).cast::<()>(),
            Self::WeakConsumer(c) => Weak::as_ptr(c).cast::<()>(),
        };
        CallbackId(ptr.addr())
    }

    /// Strong entries are always alive; weak ones until their referent drops.
    pub(crate) fn is_alive(&self) -> bool {
        match self {
            Self::StrongAction(_) | Self::StrongConsumer(_) => true,
            Self::WeakAction(l) => l.strong_count() > 0,
            Self::WeakConsumer(c) => c.strong_count() > 0,
        }
    }

    pub(crate) fn resolve(&self) -> Option<Resolved<T>> {
        match self {
            Self::StrongAction(l) => Some(Resolved::Action(Arc::clone(l))),
            Self::StrongConsumer(c) => Some(Resolved::Consumer(Arc::clone(c))),
            Self::WeakAction(l) => l.upgrade().map(Resolved::Action),
            Self::WeakConsumer(c) => c.upgrade().map(Resolved::Consumer),
        }
    }
}

impl<T> Resolved<T> {
    pub(crate) fn invoke(&self, value: &T) {
        match self {
            Self::Action(listener) => listener(),
            Self::Consumer(consumer) => consumer(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_shared_between_strengths() {
        let l = listener(|| {});
        let strong: Entry<()> = Entry::strong_action(&l);
        let weak: Entry<()> = Entry::weak_action(&l);
        assert_eq!(strong.id(), weak.id());
        assert_eq!(strong.id(), CallbackId::of_listener(&l));
        assert_ne!(strong.kind(), weak.kind());
    }

    #[test]
    fn distinct_closures_have_distinct_ids() {
        let a = listener(|| {});
        let b = listener(|| {});
        assert_ne!(CallbackId::of_listener(&a), CallbackId::of_listener(&b));
    }

    #[test]
    fn weak_entry_dies_with_referent() {
        let c = consumer(|_: &i32| {});
        let entry = Entry::weak_consumer(&c);
        assert!(entry.is_alive());
        assert!(entry.resolve().is_some());

        drop(c);
        assert!(!entry.is_alive());
        assert!(entry.resolve().is_none());
    }

    #[test]
    fn strong_entry_keeps_referent() {
        let c = consumer(|_: &i32| {});
        let id = CallbackId::of_consumer(&c);
        let entry = Entry::strong_consumer(&c);
        drop(c);
        assert!(entry.is_alive());
        assert_eq!(entry.id(), id);
    }

    #[test]
    fn resolved_action_ignores_payload() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let l = listener(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let entry: Entry<String> = Entry::strong_action(&l);
        entry.resolve().unwrap().invoke(&"ignored".to_string());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
