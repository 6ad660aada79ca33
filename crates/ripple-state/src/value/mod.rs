//! Observable values with validation, locking and linking.
//!
//! # Design
//!
//! [`Value<T>`] stores an `Option<T>` in shared storage. A *non-null* value
//! carries a null substitute: setting it to `None` stores the substitute
//! instead, so `get()` never returns `None`.
//!
//! Every `set` runs the registered validators first; a rejected value leaves
//! the stored value untouched and returns the validator's error. Listeners
//! receive a [`ValueChange`] of the previous and the new value.
//!
//! A value can be *linked* to an original value: it takes the original's
//! value, follows every change of it and, unless the link is read-only,
//! pushes its own changes back. A `set` on any value in a linked chain is
//! checked against the validators and lock states of every value it would
//! reach, so it either passes everywhere or changes nothing.
//!
//! # Invariants
//!
//! 1. A non-null value never holds `None`.
//! 2. With [`Notify::Changed`] (the default) setting an equal value stores
//!    it without notifying. With [`Notify::Set`] every successful `set`
//!    notifies.
//! 3. The stored value always satisfies every registered validator.
//!    Validation and storage happen under the value's validator lock, so
//!    this holds across threads; a validator must not add or remove
//!    validators on the value it guards.
//! 4. A locked value rejects any `set` that would change it.
//! 5. Links never form a cycle.

mod builder;

pub use builder::ValueBuilder;

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use ripple_core::sync::lock;
use ripple_core::{Consumer, Event, EventObserver, Observer, consumer};
use tracing::debug;

use crate::change::ValueChange;
use crate::error::ValueError;
use crate::state::State;

/// Checks a candidate value, returning `Err` to reject it.
pub type Validator<T> = Arc<dyn Fn(Option<&T>) -> Result<(), ValueError> + Send + Sync>;

/// Wrap a closure as a shareable [`Validator`].
pub fn validator<T>(
    f: impl Fn(Option<&T>) -> Result<(), ValueError> + Send + Sync + 'static,
) -> Validator<T> {
    Arc::new(f)
}

/// When a [`Value`] notifies its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Notify {
    /// Only when the value changes.
    #[default]
    Changed,
    /// On every `set`, even with an equal value.
    Set,
}

fn same_validator<T>(a: &Validator<T>, b: &Validator<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// A link from a value to its original, owned by the linked value.
struct Link<T> {
    original: Arc<ValueInner<T>>,
    read_only: bool,
    /// Registered weakly on the original.
    to_linked: Consumer<ValueChange<Option<T>>>,
    /// Registered weakly on the linked value; `None` for read-only links.
    to_original: Option<Consumer<ValueChange<Option<T>>>>,
}

struct ValueInner<T> {
    value: Mutex<Option<T>>,
    /// Substituted for `None` in non-null values.
    null_value: Option<T>,
    notify: Notify,
    locked: State,
    /// Held across validation and storage in `set`.
    validators: Mutex<Vec<Validator<T>>>,
    links: Mutex<Vec<Link<T>>>,
    /// Values linked to this one.
    dependents: Mutex<Vec<Weak<ValueInner<T>>>>,
    changed: Event<ValueChange<Option<T>>>,
}

impl<T: Clone + PartialEq + 'static> ValueInner<T> {
    fn new(value: Option<T>, null_value: Option<T>, notify: Notify, locked: bool) -> Self {
        Self {
            value: Mutex::new(value.or_else(|| null_value.clone())),
            null_value,
            notify,
            locked: State::new(locked),
            validators: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            dependents: Mutex::new(Vec::new()),
            changed: Event::new(),
        }
    }

    fn id(&self) -> usize {
        std::ptr::from_ref(self).addr()
    }

    fn get(&self) -> Option<T> {
        lock(&self.value).clone()
    }

    fn is(&self, value: Option<&T>) -> bool {
        lock(&self.value).as_ref() == value
    }

    fn is_nullable(&self) -> bool {
        self.null_value.is_none()
    }

    fn substitute(&self, value: Option<T>) -> Option<T> {
        value.or_else(|| self.null_value.clone())
    }

    fn check_lock(&self, value: Option<&T>) -> Result<(), ValueError> {
        if self.locked.get() && !self.is(value) {
            return Err(ValueError::Locked);
        }
        Ok(())
    }

    fn run_validators(validators: &[Validator<T>], value: Option<&T>) -> Result<(), ValueError> {
        validators.iter().try_for_each(|validator| validator(value))
    }

    /// Lock and validator check of this value alone, as a link target.
    fn admit(&self, value: Option<T>) -> Result<(), ValueError> {
        let value = self.substitute(value);
        self.check_lock(value.as_ref())?;
        let validators = lock(&self.validators).clone();
        Self::run_validators(&validators, value.as_ref())
    }

    /// Values a `set` on this one propagates to: its dependents, and the
    /// originals of its two-way links, transitively. Excludes `self`.
    fn linked_values(&self) -> Vec<Arc<Self>> {
        let mut seen = vec![self.id()];
        let mut found: Vec<Arc<Self>> = Vec::new();
        let mut frontier = self.neighbours();
        while let Some(next) = frontier.pop() {
            if seen.contains(&next.id()) {
                continue;
            }
            seen.push(next.id());
            frontier.extend(next.neighbours());
            found.push(next);
        }
        found
    }

    fn neighbours(&self) -> Vec<Arc<Self>> {
        let mut next: Vec<Arc<Self>> = {
            let mut dependents = lock(&self.dependents);
            dependents.retain(|dependent| dependent.strong_count() > 0);
            dependents.iter().filter_map(Weak::upgrade).collect()
        };
        next.extend(
            lock(&self.links)
                .iter()
                .filter(|link| !link.read_only)
                .map(|link| Arc::clone(&link.original)),
        );
        next
    }

    /// Whether following links from `self` to originals reaches `target`.
    fn reaches(self: &Arc<Self>, target: usize) -> bool {
        let mut seen = Vec::new();
        let mut pending = vec![Arc::clone(self)];
        while let Some(current) = pending.pop() {
            if current.id() == target {
                return true;
            }
            if seen.contains(&current.id()) {
                continue;
            }
            seen.push(current.id());
            pending.extend(
                lock(&current.links)
                    .iter()
                    .map(|link| Arc::clone(&link.original)),
            );
        }
        false
    }

    fn validate(&self, value: Option<&T>) -> Result<(), ValueError> {
        for linked in self.linked_values() {
            linked.admit(value.cloned())?;
        }
        // Validators run outside the lock.
        let validators = lock(&self.validators).clone();
        Self::run_validators(&validators, value)
    }

    fn set(&self, value: Option<T>) -> Result<(), ValueError> {
        let value = self.substitute(value);
        let admitted = self
            .linked_values()
            .iter()
            .try_for_each(|linked| linked.admit(value.clone()));
        let previous = {
            let validators = lock(&self.validators);
            let checked = admitted
                .and_then(|()| self.check_lock(value.as_ref()))
                .and_then(|()| Self::run_validators(&validators, value.as_ref()));
            if let Err(err) = checked {
                debug!(%err, "value rejected");
                return Err(err);
            }
            let mut current = lock(&self.value);
            let notify = *current != value || self.notify == Notify::Set;
            let previous = std::mem::replace(&mut *current, value.clone());
            notify.then_some(previous)
        };
        if let Some(previous) = previous {
            self.changed.accept(&ValueChange::new(previous, value));
        }
        Ok(())
    }

    fn add_validator(&self, validator: &Validator<T>) -> Result<bool, ValueError> {
        let mut validators = lock(&self.validators);
        if validators.iter().any(|v| same_validator(v, validator)) {
            return Ok(false);
        }
        validator(self.get().as_ref())?;
        validators.push(Arc::clone(validator));
        Ok(true)
    }
}

/// The consumer that carries a change from one linked value to another.
fn link_forwarder<T>(target: Weak<ValueInner<T>>) -> Consumer<ValueChange<Option<T>>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    consumer(move |change: &ValueChange<Option<T>>| {
        let Some(target) = target.upgrade() else {
            return;
        };
        if target.is(change.current.as_ref()) {
            return;
        }
        if let Err(err) = target.set(change.current.clone()) {
            debug!(%err, "linked value rejected update");
        }
    })
}

/// A shared value with validation and change notification.
///
/// Cloning a `Value` creates a new handle to the **same** value.
///
/// # Example
///
/// ```
/// use ripple_state::{Value, ValueError, validator};
///
/// let port = Value::non_null(8080u16);
/// port.add_validator(&validator(|port: Option<&u16>| match port {
///     Some(0) => Err(ValueError::Invalid("port 0".into())),
///     _ => Ok(()),
/// }))?;
///
/// port.set(9090u16)?;
/// assert!(port.set(0u16).is_err());
/// port.clear()?;
/// assert_eq!(port.get(), Some(8080));
/// # Ok::<(), ValueError>(())
/// ```
pub struct Value<T> {
    inner: Arc<ValueInner<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("value", &*lock(&self.inner.value))
            .field("nullable", &self.inner.null_value.is_none())
            .field("links", &lock(&self.inner.links).len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Value<T> {
    /// A value that may hold `None`.
    #[must_use]
    pub fn nullable(value: Option<T>) -> Self {
        Self::from_inner(ValueInner::new(value, None, Notify::Changed, false))
    }

    /// A value that substitutes `null_value` for `None`, initially holding it.
    #[must_use]
    pub fn non_null(null_value: T) -> Self {
        Self::from_inner(ValueInner::new(
            None,
            Some(null_value),
            Notify::Changed,
            false,
        ))
    }

    /// Start building a value (nullable unless configured otherwise).
    #[must_use]
    pub fn builder() -> ValueBuilder<T> {
        ValueBuilder::new()
    }

    fn from_inner(inner: ValueInner<T>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.get()
    }

    /// The current value, or [`ValueError::Missing`] if it is null.
    pub fn get_or_err(&self) -> Result<T, ValueError> {
        self.get().ok_or(ValueError::Missing)
    }

    /// Set the value, `None` meaning null (or the null substitute).
    ///
    /// # Errors
    ///
    /// Returns the first validator error, or [`ValueError::Locked`] if this
    /// or a linked value is locked; no value is changed.
    ///
    /// # Panics
    ///
    /// Re-raises any panic from a listener.
    pub fn set(&self, value: impl Into<Option<T>>) -> Result<(), ValueError> {
        self.inner.set(value.into())
    }

    /// Set the value to null, or to the null substitute for non-null values.
    pub fn clear(&self) -> Result<(), ValueError> {
        self.inner.set(None)
    }

    /// Replace the value with `f(current)`.
    pub fn map(&self, f: impl FnOnce(Option<T>) -> Option<T>) -> Result<(), ValueError> {
        self.inner.set(f(self.get()))
    }

    /// Whether the current value equals `value`.
    #[must_use]
    pub fn is(&self, value: Option<&T>) -> bool {
        self.inner.is(value)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is(None)
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.inner.is_nullable()
    }

    /// The lock state: while `true`, any `set` that would change the value
    /// fails with [`ValueError::Locked`].
    #[must_use]
    pub fn locked(&self) -> State {
        self.inner.locked.clone()
    }

    /// Run the validators, including those of linked values, against
    /// `value` without setting it.
    pub fn validate(&self, value: Option<&T>) -> Result<(), ValueError> {
        self.inner.validate(value)
    }

    /// Register a validator.
    ///
    /// # Errors
    ///
    /// Fails, without registering, if the current value does not pass it.
    /// Returns `Ok(false)` if the validator is already registered.
    pub fn add_validator(&self, validator: &Validator<T>) -> Result<bool, ValueError> {
        self.inner.add_validator(validator)
    }

    pub fn remove_validator(&self, validator: &Validator<T>) -> bool {
        let mut validators = lock(&self.inner.validators);
        let before = validators.len();
        validators.retain(|v| !same_validator(v, validator));
        validators.len() != before
    }

    /// A read-only view sharing this value and its listeners.
    #[must_use]
    pub fn observer(&self) -> ValueObserver<T> {
        ValueObserver {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Value<T> {
    /// Link this value to `original`, both ways.
    ///
    /// This value first takes the original's value; from then on a change to
    /// either is applied to the other. The link keeps `original` alive.
    ///
    /// # Errors
    ///
    /// [`ValueError::SelfLink`], [`ValueError::AlreadyLinked`] or
    /// [`ValueError::LinkCycle`] for an invalid link, or the error from
    /// taking over the original's value. Nothing is linked on error.
    pub fn link(&self, original: &Value<T>) -> Result<(), ValueError> {
        self.link_to(&original.inner, false)
    }

    /// Link this value to a read-only `original`: changes flow from the
    /// original only.
    ///
    /// # Errors
    ///
    /// As for [`Value::link`].
    pub fn link_observer(&self, original: &ValueObserver<T>) -> Result<(), ValueError> {
        self.link_to(&original.inner, true)
    }

    /// Remove a link created by [`Value::link`].
    ///
    /// # Errors
    ///
    /// [`ValueError::NotLinked`] if no such link exists.
    pub fn unlink(&self, original: &Value<T>) -> Result<(), ValueError> {
        self.unlink_from(&original.inner, false)
    }

    /// Remove a link created by [`Value::link_observer`].
    ///
    /// # Errors
    ///
    /// [`ValueError::NotLinked`] if no such link exists.
    pub fn unlink_observer(&self, original: &ValueObserver<T>) -> Result<(), ValueError> {
        self.unlink_from(&original.inner, true)
    }

    fn link_to(&self, original: &Arc<ValueInner<T>>, read_only: bool) -> Result<(), ValueError> {
        let linked = &self.inner;
        if Arc::ptr_eq(linked, original) {
            return Err(ValueError::SelfLink);
        }
        if lock(&linked.links)
            .iter()
            .any(|link| Arc::ptr_eq(&link.original, original))
        {
            return Err(ValueError::AlreadyLinked);
        }
        if original.reaches(linked.id()) {
            return Err(ValueError::LinkCycle);
        }
        linked.set(original.get())?;

        let to_linked = link_forwarder(Arc::downgrade(linked));
        original.changed.add_weak_consumer(&to_linked);
        let to_original = (!read_only).then(|| {
            let to_original = link_forwarder(Arc::downgrade(original));
            linked.changed.add_weak_consumer(&to_original);
            to_original
        });
        lock(&original.dependents).push(Arc::downgrade(linked));
        lock(&linked.links).push(Link {
            original: Arc::clone(original),
            read_only,
            to_linked,
            to_original,
        });
        debug!(read_only, "values linked");
        Ok(())
    }

    fn unlink_from(
        &self,
        original: &Arc<ValueInner<T>>,
        read_only: bool,
    ) -> Result<(), ValueError> {
        let linked = &self.inner;
        let link = {
            let mut links = lock(&linked.links);
            let index = links
                .iter()
                .position(|link| {
                    Arc::ptr_eq(&link.original, original) && link.read_only == read_only
                })
                .ok_or(ValueError::NotLinked)?;
            links.remove(index)
        };
        original.changed.remove_weak_consumer(&link.to_linked);
        if let Some(to_original) = &link.to_original {
            linked.changed.remove_weak_consumer(to_original);
        }
        lock(&original.dependents).retain(|dependent| {
            dependent.strong_count() > 0 && dependent.as_ptr().addr() != linked.id()
        });
        debug!(read_only, "values unlinked");
        Ok(())
    }
}

impl<T: Clone + PartialEq + 'static> Observer<ValueChange<Option<T>>> for Value<T> {
    fn event_observer(&self) -> &EventObserver<ValueChange<Option<T>>> {
        self.inner.changed.event_observer()
    }
}

/// A read-only view of a [`Value`].
pub struct ValueObserver<T> {
    inner: Arc<ValueInner<T>>,
}

impl<T> Clone for ValueObserver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueObserver")
            .field("value", &*lock(&self.inner.value))
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ValueObserver<T> {
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.get()
    }

    pub fn get_or_err(&self) -> Result<T, ValueError> {
        self.get().ok_or(ValueError::Missing)
    }

    #[must_use]
    pub fn is(&self, value: Option<&T>) -> bool {
        self.inner.is(value)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is(None)
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.inner.is_nullable()
    }
}

impl<T: Clone + PartialEq + 'static> Observer<ValueChange<Option<T>>> for ValueObserver<T> {
    fn event_observer(&self) -> &EventObserver<ValueChange<Option<T>>> {
        self.inner.changed.event_observer()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
