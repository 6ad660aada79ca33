//! Change notifications.

/// The payload of a state or value change: the value before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueChange<T> {
    pub previous: T,
    pub current: T,
}

impl<T> ValueChange<T> {
    #[must_use]
    pub fn new(previous: T, current: T) -> Self {
        Self { previous, current }
    }
}

impl<T: PartialEq> ValueChange<T> {
    /// Whether the value actually changed.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }
}

impl ValueChange<bool> {
    /// The same transition as seen by the logical negation.
    #[must_use]
    pub fn inverted(self) -> Self {
        Self::new(!self.previous, !self.current)
    }
}
