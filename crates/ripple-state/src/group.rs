//! Mutually exclusive groups of states.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use ripple_core::sync::lock;
use ripple_core::{Consumer, Observer, consumer};
use tracing::debug;

use crate::state::{State, StateChange, StateCore};

struct GroupMember {
    state: Weak<StateCore>,
    /// Owned here, registered weakly on `state`.
    _activated: Consumer<StateChange>,
}

impl GroupMember {
    fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }

    fn is(&self, core: &Arc<StateCore>) -> bool {
        self.state.as_ptr().addr() == StateCore::id(core)
    }
}

struct GroupInner {
    members: Mutex<Vec<GroupMember>>,
}

impl GroupInner {
    /// Set every live member other than `active` to `false`, pruning dead
    /// members on the way.
    fn deactivate_others(&self, active: &Arc<StateCore>) {
        let others: Vec<Arc<StateCore>> = {
            let mut members = lock(&self.members);
            members.retain(GroupMember::is_alive);
            members
                .iter()
                .filter(|member| !member.is(active))
                .filter_map(|member| member.state.upgrade())
                .collect()
        };
        debug!(others = others.len(), "group member activated");
        for other in others {
            other.set(false);
        }
    }
}

/// Keeps at most one member state `true`.
///
/// Members are held weakly: the group never keeps a state alive, and a
/// dropped state silently leaves the group. The group itself must be kept
/// alive for as long as it should enforce exclusion.
///
/// # Example
///
/// ```
/// use ripple_state::{Group, State};
///
/// let first = State::new(true);
/// let second = State::new(false);
/// let group = State::group([&first, &second]);
///
/// second.set(true);
/// assert!(!first.get());
/// assert_eq!(group.len(), 2);
/// ```
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group").field("members", &self.len()).finish()
    }
}

impl Group {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GroupInner {
                members: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Add `state` to the group.
    ///
    /// If `state` is `true` every other member is set to `false`; the same
    /// happens whenever `state` later becomes `true`. Returns `false` if the
    /// state already is a member.
    pub fn add_state(&self, state: &State) -> bool {
        let core = &state.core;
        {
            let mut members = lock(&self.inner.members);
            members.retain(GroupMember::is_alive);
            if members.iter().any(|member| member.is(core)) {
                return false;
            }
            let activated = {
                let group = Arc::downgrade(&self.inner);
                let member = Arc::downgrade(core);
                consumer(move |change: &StateChange| {
                    if !change.current {
                        return;
                    }
                    if let (Some(group), Some(member)) = (group.upgrade(), member.upgrade()) {
                        group.deactivate_others(&member);
                    }
                })
            };
            core.changed.add_weak_consumer(&activated);
            members.push(GroupMember {
                state: Arc::downgrade(core),
                _activated: activated,
            });
        }
        if core.get() {
            self.inner.deactivate_others(core);
        }
        true
    }

    /// Number of live members.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner.members)
            .iter()
            .filter(|member| member.is_alive())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
