//! Error types for the emitter binding

use thiserror::Error;

/// Errors that can occur while binding an emitter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// The device name cannot be passed to C
    #[error("invalid device name {name:?}: contains a NUL byte at {position}")]
    InvalidDeviceName { name: String, position: usize },
}

/// Reasons a send was rejected before reaching the native layer
///
/// The display strings are the diagnostics the binding has always printed;
/// callers match on them, so they must not change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// A byte buffer was sent without saying how many bytes to transmit
    #[error("missing byte buffer length")]
    MissingLength,

    /// The message is neither text nor a byte buffer
    #[error("unsupported data type")]
    UnsupportedType { type_name: &'static str },

    /// The text is too long for the native length argument
    #[error("text of {chars} characters exceeds the native length limit")]
    TextTooLong { chars: usize },
}
