//! Builder for [`Value`].

use std::sync::Arc;

use ripple_core::{Consumer, Listener, Observer, consumer};

use super::{Notify, Validator, Value, ValueInner, same_validator};
use crate::change::ValueChange;
use crate::error::ValueError;

enum Registration<T> {
    Listener(Listener),
    Consumer(Consumer<ValueChange<Option<T>>>),
    WeakListener(Listener),
    WeakConsumer(Consumer<ValueChange<Option<T>>>),
}

/// Configures a [`Value`] before it is created.
///
/// Listeners declared on the builder are registered in declaration order,
/// regardless of their kind.
///
/// # Example
///
/// ```
/// use ripple_state::{Notify, Value, listener};
///
/// let on_set = listener(|| println!("set"));
/// let value = Value::builder()
///     .non_null(0)
///     .value(42)
///     .notify(Notify::Set)
///     .listener(&on_set)
///     .build()
///     .unwrap();
/// assert_eq!(value.get(), Some(42));
/// ```
pub struct ValueBuilder<T> {
    value: Option<T>,
    null_value: Option<T>,
    notify: Notify,
    locked: bool,
    validators: Vec<Validator<T>>,
    registrations: Vec<Registration<T>>,
}

impl<T: Clone + PartialEq + 'static> ValueBuilder<T> {
    pub(super) fn new() -> Self {
        Self {
            value: None,
            null_value: None,
            notify: Notify::default(),
            locked: false,
            validators: Vec::new(),
            registrations: Vec::new(),
        }
    }

    /// Make the value non-null, substituting `null_value` for `None`.
    #[must_use]
    pub fn non_null(mut self, null_value: T) -> Self {
        self.null_value = Some(null_value);
        self
    }

    /// The initial value. Defaults to null, or the null substitute.
    #[must_use]
    pub fn value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: Notify) -> Self {
        self.notify = notify;
        self
    }

    /// Start locked; see [`Value::locked`].
    #[must_use]
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: Validator<T>) -> Self {
        if !self.validators.iter().any(|v| same_validator(v, &validator)) {
            self.validators.push(validator);
        }
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: &Listener) -> Self {
        self.registrations
            .push(Registration::Listener(Arc::clone(listener)));
        self
    }

    #[must_use]
    pub fn consumer(mut self, consumer: &Consumer<ValueChange<Option<T>>>) -> Self {
        self.registrations
            .push(Registration::Consumer(Arc::clone(consumer)));
        self
    }

    /// Register `listener` weakly; the caller keeps it alive.
    #[must_use]
    pub fn weak_listener(mut self, listener: &Listener) -> Self {
        self.registrations
            .push(Registration::WeakListener(Arc::clone(listener)));
        self
    }

    /// Register `consumer` weakly; the caller keeps it alive.
    #[must_use]
    pub fn weak_consumer(mut self, consumer: &Consumer<ValueChange<Option<T>>>) -> Self {
        self.registrations
            .push(Registration::WeakConsumer(Arc::clone(consumer)));
        self
    }

    /// Create the value.
    ///
    /// # Errors
    ///
    /// Fails if the initial value is rejected by a validator.
    pub fn build(self) -> Result<Value<T>, ValueError> {
        let inner = ValueInner::new(self.value, self.null_value, self.notify, self.locked);
        let initial = inner.get();
        for validator in &self.validators {
            validator(initial.as_ref())?;
        }
        *ripple_core::sync::lock(&inner.validators) = self.validators;

        let value = Value::from_inner(inner);
        for registration in &self.registrations {
            match registration {
                Registration::Listener(l) => value.add_listener(l),
                Registration::Consumer(c) => value.add_consumer(c),
                Registration::WeakListener(l) => value.add_weak_listener(l),
                Registration::WeakConsumer(c) => value.add_weak_consumer(c),
            };
        }
        Ok(value)
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ValueBuilder<T> {
    /// Run `listener` whenever the value is set to `value`.
    #[must_use]
    pub fn when(self, value: T, listener: &Listener) -> Self {
        let listener = Arc::clone(listener);
        self.consumer(&consumer(move |change: &ValueChange<Option<T>>| {
            if change.current.as_ref() == Some(&value) {
                listener();
            }
        }))
    }

    /// Pass `value` to `consumer` whenever the value is set to it.
    #[must_use]
    pub fn when_consumer(self, value: T, consumer_of: &Consumer<T>) -> Self {
        let consumer_of = Arc::clone(consumer_of);
        self.consumer(&consumer(move |change: &ValueChange<Option<T>>| {
            if change.current.as_ref() == Some(&value) {
                consumer_of(&value);
            }
        }))
    }
}
