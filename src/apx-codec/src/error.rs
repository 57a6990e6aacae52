//! The single error enumeration shared by every component of the codec.
//!
//! The codec never aborts: every fallible operation returns a `Result`
//! whose error is one of these kinds (spec §7). `NoError` from the
//! reference enumeration has no variant here — absence of error is the
//! `Ok` arm of `Result`, not a value of `ApxError`.

use thiserror::Error;

/// Error kinds surfaced by the program format, compiler, decoder, VM,
/// port/node model and node manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApxError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of memory")]
    Mem,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("encoded length {size} exceeds the maximum representable size {max}")]
    LengthError { size: u64, max: u64 },

    #[error("invalid program header: {0}")]
    InvalidHeader(String),

    #[error("no buffer has been set for this operation")]
    MissingBuffer,

    #[error("buffer boundary exceeded: needed {needed} bytes, {available} available")]
    BufferBoundary { needed: usize, available: usize },

    #[error("value has the wrong type for this operation: expected {expected}")]
    ValueType { expected: &'static str },

    #[error("value could not be converted: {0}")]
    ValueConversion(String),

    #[error("value has the wrong length: expected at most {expected}, got {actual}")]
    ValueLength { expected: u32, actual: u32 },

    #[error("value {value} is out of range [{lo}, {hi}]")]
    ValueRange { value: i64, lo: i64, hi: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("null pointer")]
    NullPtr,

    #[error("invalid port handle")]
    InvalidPortHandle,

    #[error("invalid program: {0}")]
    InvalidProgram(String),

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("name is missing")]
    NameMissing,

    #[error("name is too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("queue is full")]
    QueueFull,
}

impl ApxError {
    /// Fatal errors are not locally recoverable; all others can be handled
    /// by the caller (drop the value, fix the buffer, retry).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApxError::Mem | ApxError::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, ApxError>;
