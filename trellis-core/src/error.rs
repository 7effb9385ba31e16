use thiserror::Error;

/// Failures surfaced by graph operations.
///
/// Misuse of the API (deriving children without a factory, reading a
/// destroyed node) is treated as a defect in calling code and asserts
/// instead; these variants cover conditions a caller may legitimately hit
/// and handle at runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The node's kind does not accept pushed values.
    #[error("node {label} does not support set_value")]
    SetUnsupported { label: String },

    /// A key projection could not write through to its source value.
    #[error("node {label} could not assign key {key:?}")]
    AssignFailed { label: String, key: String },
}
