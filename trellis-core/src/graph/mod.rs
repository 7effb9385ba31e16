//! Reactive Dependency Graph
//!
//! This module implements the node primitive and the bookkeeping around it:
//! observer fan-out, upstream links, lifecycle state, and teardown.
//!
//! # Overview
//!
//! Three record types cooperate:
//!
//! - [`Node`] holds a cached value, a lifecycle state, the observer list,
//!   and the link list. Everything else hangs off it.
//! - An observer (registered through [`Node::subscribe`], identified by an
//!   [`ObserverId`]) is one interested party receiving change notifications.
//! - A link (registered through [`Node::add_dependency`], handled through
//!   [`LinkHandle`]) is a node's own subscription to one upstream node,
//!   live only while the node itself is active.
//!
//! Change propagation is push for invalidation and pull for recomputation:
//! `notify` marks a clean node dirty and fans out once; the next `value`
//! read recomputes. Nodes nobody observes do no bookkeeping at all.
//!
//! # Design Decisions
//!
//! 1. Observer and link lists are plain vectors behind locks rather than
//!    intrusive linked lists. Removal goes by [`ObserverId`] instead of
//!    pointer surgery, and fan-out iterates a snapshot, which is what makes
//!    re-entrant subscribe/unsubscribe during a notification safe.
//!
//! 2. Nodes are reference-counted handles. Cloning shares state, children
//!    hold their parents weakly through callbacks, and explicit
//!    [`Node::destroy`] remains the authoritative cleanup path.
//!
//! 3. Node behavior is a trait object ([`NodeKind`]), so a kind that
//!    forgets `compute` is a compile error, not a runtime throw. Child
//!    construction is likewise an injected capability ([`ChildFactory`])
//!    instead of a hardwired concrete type.

mod link;
mod node;
mod observer;
mod state;

pub use link::LinkHandle;
pub use node::{ChildFactory, Node, NodeKind, Subscription, WeakNode};
pub use observer::{ObserverCallback, ObserverId};
pub use state::NodeState;
