//! Crate-wide error type and `Result` alias.

use thiserror::Error;

/// All recoverable errors reported by this crate.
///
/// Construction errors surface from fallible constructors before any
/// signal flows; format and state errors surface from the call that
/// processes the offending frame. Contract violations that cannot be
/// recovered from (for example pulling from a push-only accumulator)
/// panic instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A constructor was given an invalid parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A frame did not match what the processor expects.
    #[error("unexpected format: {0}")]
    Format(String),

    /// `pump()` was called without a signal source.
    #[error("no signal source set")]
    NoSource,

    /// A band split was asked to process before its boundaries were set.
    #[error("no band boundaries set")]
    MissingBands,

    /// `close()` was called on an already closed source.
    #[error("source is already closed")]
    AlreadyClosed,

    /// An I/O error surfaced from an underlying source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Convenience constructor for construction errors.
pub fn parameter_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::InvalidParameter(message.into()))
}

/// Convenience constructor for per-frame format errors.
pub fn format_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Format(message.into()))
}
