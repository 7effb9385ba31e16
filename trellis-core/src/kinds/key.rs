//! Key projections: children derived by key from another node's value.
//!
//! # How Projections Work
//!
//! A projection node reads its source node's value and picks one key out of
//! it with [`KeyAccess::key`]. [`KeyChildren`] installs projections as the
//! `get` children of a node, and installs itself on every child it builds,
//! so arbitrarily deep paths work: `store.get("user.name")` is a projection
//! of a projection of the store.
//!
//! Each child depends on its parent through an ordinary link. While
//! somebody observes the leaf of a path, the whole chain up to the source
//! is active; once the last observer leaves, the chain deactivates link by
//! link.
//!
//! Writes go the other way. Setting a projection rewrites the key inside
//! its parent's value and pushes the whole value up, level by level, until
//! it lands in a node that stores it. The landing node notifies, and the
//! invalidation travels back down the active links, so every projection of
//! the changed value (the writer included) is marked stale exactly once.
//!
//! Projections hold their source weakly. The parent owns its children, not
//! the reverse; a projection that outlives its source keeps working and
//! reads the default value.

use std::sync::Arc;

use crate::error::Error;
use crate::graph::{ChildFactory, Node, NodeKind, WeakNode};
use crate::value::KeyAccess;

use super::source::SourceKind;

/// Derived kind projecting one key out of a source node's value.
pub struct KeyKind<T>
where
    T: KeyAccess + Default + Clone + Send + Sync + 'static,
{
    source: WeakNode<T>,
    key: String,
}

impl<T> KeyKind<T>
where
    T: KeyAccess + Default + Clone + Send + Sync + 'static,
{
    pub fn new(source: &Node<T>, key: impl Into<String>) -> Self {
        Self {
            source: source.downgrade(),
            key: key.into(),
        }
    }
}

impl<T> NodeKind<T> for KeyKind<T>
where
    T: KeyAccess + Default + Clone + Send + Sync + 'static,
{
    fn compute(&self) -> T {
        match self.source.upgrade() {
            Some(source) => source.value().key(&self.key).unwrap_or_default(),
            None => T::default(),
        }
    }

    fn set_value(&self, node: &Node<T>, value: T) -> Result<(), Error> {
        let source = match self.source.upgrade() {
            Some(source) => source,
            None => return Ok(()),
        };

        let mut base = source.value();
        if !base.set_key(&self.key, value) {
            return Err(Error::AssignFailed {
                label: node.label().to_owned(),
                key: self.key.clone(),
            });
        }
        source.set_value(base)
    }
}

/// Child factory wiring [`KeyKind`] projections into `get`.
///
/// Besides building the projection, the factory links it to its parent and
/// registers the teardown that detaches it again: a destroyed child removes
/// itself from the parent's children and, when destroyed with prune, gives
/// the parent the chance to go too if nobody observes it anymore.
pub struct KeyChildren;

impl<T> ChildFactory<T> for KeyChildren
where
    T: KeyAccess + Default + Clone + Send + Sync + 'static,
{
    fn make_child(&self, parent: &Node<T>, key: &str) -> Node<T> {
        let child = Node::with_factory(
            KeyKind::new(parent, key),
            Arc::new(KeyChildren),
            format!("({}).{}", parent.label(), key),
        );
        child.add_dependency(parent);

        let weak_parent = parent.downgrade();
        let key = key.to_owned();
        child.on_destroy(move |prune| {
            if let Some(parent) = weak_parent.upgrade() {
                parent.remove_child(&key);
                if prune {
                    parent.prune();
                }
            }
        });

        child
    }
}

impl<T> Node<T>
where
    T: KeyAccess + Default + Clone + Send + Sync + 'static,
{
    /// Writable leaf whose `get` children project keys out of the value.
    ///
    /// ```rust,ignore
    /// let store = Node::keyed_source(json!({ "user": { "name": "dale" } }), "store");
    /// let name = store.get("user.name");
    /// assert_eq!(name.value(), json!("dale"));
    /// ```
    pub fn keyed_source(value: T, label: impl Into<String>) -> Node<T> {
        Node::with_factory(SourceKind::new(value), Arc::new(KeyChildren), label)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
