//! Errors from state and value operations.

use std::fmt;

/// Errors from [`State`](crate::State) family operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The operation is not available on this kind of state, e.g. setting a
    /// [`Combination`](crate::Combination), whose value is derived.
    Unsupported { operation: &'static str },
    /// A conjunction name that is neither AND nor OR.
    UnknownConjunction(String),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { operation } => {
                write!(f, "unsupported operation: {operation}")
            }
            Self::UnknownConjunction(name) => write!(f, "unknown conjunction: {name:?}"),
        }
    }
}

impl std::error::Error for StateError {}

/// Errors from [`Value`](crate::Value) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A validator rejected the value.
    Invalid(String),
    /// A value was required but the value is null.
    Missing,
    /// The value, or a value linked to it, is locked against changes.
    Locked,
    /// A value cannot be linked to itself.
    SelfLink,
    /// The value is already linked to that original.
    AlreadyLinked,
    /// The link would close a cycle of linked values.
    LinkCycle,
    /// No such link exists.
    NotLinked,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(reason) => write!(f, "invalid value: {reason}"),
            Self::Missing => write!(f, "no value present"),
            Self::Locked => write!(f, "value is locked"),
            Self::SelfLink => write!(f, "a value cannot be linked to itself"),
            Self::AlreadyLinked => write!(f, "values are already linked"),
            Self::LinkCycle => write!(f, "link would create a cycle"),
            Self::NotLinked => write!(f, "values are not linked"),
        }
    }
}

impl std::error::Error for ValueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = StateError::Unsupported { operation: "set" };
        assert_eq!(err.to_string(), "unsupported operation: set");
        let err = StateError::UnknownConjunction("xor".into());
        assert_eq!(err.to_string(), "unknown conjunction: \"xor\"");
        assert_eq!(
            ValueError::Invalid("too large".into()).to_string(),
            "invalid value: too large"
        );
        assert_eq!(ValueError::Missing.to_string(), "no value present");
        assert_eq!(ValueError::Locked.to_string(), "value is locked");
        assert_eq!(ValueError::LinkCycle.to_string(), "link would create a cycle");
    }
}
