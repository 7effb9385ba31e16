//! Node lifecycle states.
//!
//! A node moves through four states over its life:
//!
//! ```text
//!            first observer            value()
//!  Inactive ----------------> Dirty ------------> Clean
//!      ^                        ^                   |
//!      |    last observer       |      notify       |
//!      +------------------------+-------------------+
//!
//!  any state -- destroy() --> Destroyed (terminal)
//! ```
//!
//! `Inactive` nodes hold no upstream subscriptions and never cache: reading
//! one recomputes every time, so an unobserved node costs exactly what a
//! plain function call costs. `Clean` and `Dirty` are the two active states;
//! only the transition from `Dirty` back to `Clean` runs the computation,
//! and it happens inside `value()`, never inside a notification.
//! `Destroyed` is terminal: no transition leaves it.

/// Lifecycle state of a [`Node`](super::Node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No observers; no upstream subscriptions held; nothing cached.
    Inactive,

    /// Active and the cache holds the current value.
    Clean,

    /// Active but the cache is stale. The next `value()` call recomputes.
    Dirty,

    /// Torn down. Terminal; every subsequent operation is a no-op.
    Destroyed,
}

impl NodeState {
    /// Whether the node currently holds upstream subscriptions.
    ///
    /// Active means `Clean` or `Dirty`; `Inactive` and `Destroyed` nodes
    /// hold no subscriptions.
    pub fn is_active(self) -> bool {
        matches!(self, NodeState::Clean | NodeState::Dirty)
    }

    /// Whether the node has been destroyed.
    pub fn is_destroyed(self) -> bool {
        self == NodeState::Destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(!NodeState::Inactive.is_active());
        assert!(NodeState::Clean.is_active());
        assert!(NodeState::Dirty.is_active());
        assert!(!NodeState::Destroyed.is_active());
    }

    #[test]
    fn destroyed_is_not_active() {
        assert!(NodeState::Destroyed.is_destroyed());
        assert!(!NodeState::Destroyed.is_active());
        assert!(!NodeState::Clean.is_destroyed());
    }
}
