//! Trellis Core
//!
//! This crate provides the reactive dependency graph at the heart of the
//! Trellis framework. It implements:
//!
//! - Lazy push/pull reactive nodes (push invalidation, pull recomputation)
//! - Observer subscription and synchronous notification fan-out
//! - Cross-node dependency links, toggled at the activation boundary
//! - Memoized key-path children (`store.get("user.name")`)
//! - Idempotent, cascading teardown with opportunistic pruning
//!
//! Nodes do no work while nobody observes them: an unobserved node is a
//! plain function that runs on every read. The first subscriber activates
//! it, at which point it caches, watches its upstream nodes, and recomputes
//! at most once per actual change however many invalidations arrive in
//! between.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: the node primitive, observers, links, lifecycle, teardown
//! - `kinds`: stock node kinds (writable sources, key projections)
//! - `value`: the [`KeyAccess`] substrate trait and reactive-or-plain [`Input`]
//! - `path`: key-path segmentation with a global split cache
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use trellis_core::Node;
//!
//! let store = Node::keyed_source(json!({ "user": { "name": "dale" } }), "store");
//! let name = store.get("user.name");
//!
//! // Subscribing activates the whole chain up to the store.
//! let sub = name.subscribe(|node| {
//!     println!("name is now {}", node.value());
//! });
//!
//! // Writes land in the store and invalidate every projection of it.
//! name.set_value(json!("audrey"))?;
//! assert_eq!(name.value(), json!("audrey"));
//!
//! sub.unsubscribe();
//! ```

pub mod graph;
pub mod kinds;
pub mod path;
pub mod value;

mod error;

pub use error::Error;
pub use graph::{
    ChildFactory, LinkHandle, Node, NodeKind, NodeState, ObserverCallback, ObserverId,
    Subscription, WeakNode,
};
pub use kinds::{KeyChildren, KeyKind, SourceKind};
pub use value::{Input, KeyAccess};
