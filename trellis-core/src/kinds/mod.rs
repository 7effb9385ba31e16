//! Stock node kinds built on the graph primitive.
//!
//! [`SourceKind`] is the writable leaf every graph bottoms out in.
//! [`KeyKind`] and [`KeyChildren`] implement key-path projection over any
//! value type with [`KeyAccess`](crate::KeyAccess). Custom kinds implement
//! [`NodeKind`](crate::NodeKind) directly and plug in the same way.

mod key;
mod source;

pub use key::{KeyChildren, KeyKind};
pub use source::SourceKind;
