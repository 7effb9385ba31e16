//! Writable leaf nodes.

use parking_lot::RwLock;

use crate::error::Error;
use crate::graph::{Node, NodeKind};

/// Leaf kind holding a plain value.
///
/// Reads clone the stored value; writes store the new one and notify the
/// node, which is what starts every downstream invalidation in a graph
/// built over sources.
pub struct SourceKind<T>
where
    T: Clone + Send + Sync + 'static,
{
    value: RwLock<T>,
}

impl<T> SourceKind<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }
}

impl<T> NodeKind<T> for SourceKind<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn compute(&self) -> T {
        self.value.read().clone()
    }

    fn set_value(&self, node: &Node<T>, value: T) -> Result<(), Error> {
        *self.value.write() = value;
        node.notify();
        Ok(())
    }
}

impl<T> Node<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Writable leaf node.
    ///
    /// ```rust,ignore
    /// let count = Node::source(0, "count");
    /// count.set_value(5)?;
    /// assert_eq!(count.value(), 5);
    /// ```
    pub fn source(value: T, label: impl Into<String>) -> Node<T> {
        Node::new(SourceKind::new(value), label)
    }
}
