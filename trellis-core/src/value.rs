//! Value substrates and reactive-or-plain inputs.
//!
//! The graph itself is generic; what a "key" means for a value type is
//! supplied by [`KeyAccess`]. The stock implementation covers
//! [`serde_json::Value`], where keys address object fields and numeric
//! array indices.
//!
//! [`Input`] papers over the other polymorphism consumers need: APIs that
//! accept either a live node or a plain constant. A constant input reads as
//! itself and produces no dependency wiring.

use serde_json::Value;

use crate::graph::{LinkHandle, Node};

/// Keyed read/write access into a value type.
///
/// `key` projects one step into the value. `set_key` writes one step deep
/// and reports whether the write landed; writing into a value with no such
/// slot (a missing array index, a scalar) is a refused write, not an error.
pub trait KeyAccess: Sized {
    fn key(&self, name: &str) -> Option<Self>;
    fn set_key(&mut self, name: &str, value: Self) -> bool;
}

impl KeyAccess for Value {
    fn key(&self, name: &str) -> Option<Self> {
        match self {
            Value::Object(map) => map.get(name).cloned(),
            Value::Array(items) => {
                let index: usize = name.parse().ok()?;
                items.get(index).cloned()
            }
            _ => None,
        }
    }

    fn set_key(&mut self, name: &str, value: Self) -> bool {
        match self {
            Value::Object(map) => {
                map.insert(name.to_owned(), value);
                true
            }
            Value::Array(items) => match name.parse::<usize>() {
                Ok(index) if index < items.len() => {
                    items[index] = value;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

/// Either a node or a plain value.
///
/// Derived-node constructors take `Input` where the caller may pass
/// reactive and non-reactive arguments interchangeably. The plain variant
/// reads as a constant and [`tracked_by`](Input::tracked_by) returns no
/// handle for it, so callers can wire dependencies without caring which
/// kind they were given.
pub enum Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    Node(Node<T>),
    Value(T),
}

impl<T> Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Current value of the input.
    pub fn read(&self) -> T {
        match self {
            Input::Node(node) => node.value(),
            Input::Value(value) => value.clone(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Input::Node(node) => node.label(),
            Input::Value(_) => "(constant)",
        }
    }

    /// Register `owner`'s dependency on this input, if there is anything to
    /// depend on. Constants need no watching and yield `None`.
    pub fn tracked_by(&self, owner: &Node<T>) -> Option<LinkHandle<T>> {
        match self {
            Input::Node(node) => Some(owner.add_dependency(node)),
            Input::Value(_) => None,
        }
    }

    /// Promote the input to a node. An input that already is one is
    /// returned as-is; a constant becomes a fresh source node.
    pub fn into_node(self, label: impl Into<String>) -> Node<T> {
        match self {
            Input::Node(node) => node,
            Input::Value(value) => Node::source(value, label),
        }
    }
}

impl<T> From<Node<T>> for Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(node: Node<T>) -> Self {
        Input::Node(node)
    }
}

impl<T> From<T> for Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Input::Value(value)
    }
}

impl<T> Clone for Input<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        match self {
            Input::Node(node) => Input::Node(node.clone()),
            Input::Value(value) => Input::Value(value.clone()),
        }
    }
}
