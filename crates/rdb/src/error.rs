use std::io;

use thiserror::Error;

/// Result alias used throughout the decoder.
pub type Result<T> = std::result::Result<T, RdbError>;

/// Errors that abort a decode pass.
///
/// Every variant except [`RdbError::Io`] carries the absolute byte offset in
/// the input at which the problem was detected. I/O failures of the
/// underlying source are passed through unmodified.
#[derive(Debug, Error)]
pub enum RdbError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A byte pattern violates the encoding rules.
    #[error("corrupt data at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The input ended before a declared length was satisfied.
    #[error("truncated input at offset {offset}: {needed} more bytes required")]
    Truncated { offset: u64, needed: u64 },

    /// An object type tag or opcode this decoder cannot size.
    #[error("unsupported type tag {tag:#04x} at offset {offset}")]
    UnsupportedType { offset: u64, tag: u8 },

    /// An LZF block with an inconsistent back-reference or length.
    #[error("decompression error at offset {offset}: {reason}")]
    Decompression { offset: u64, reason: String },
}

impl RdbError {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        RdbError::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns the byte offset the error was raised at, if it has one.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            RdbError::Io(_) => None,
            RdbError::Corrupt { offset, .. }
            | RdbError::Truncated { offset, .. }
            | RdbError::UnsupportedType { offset, .. }
            | RdbError::Decompression { offset, .. } => Some(*offset),
        }
    }
}

/// A decode pass that stopped on an error.
///
/// Entries delivered before the failure stay valid; `entries_delivered`
/// tells the caller how many there were.
#[derive(Debug, Error)]
#[error("decode aborted after {entries_delivered} entries: {error}")]
pub struct DecodeAbort {
    #[source]
    pub error: RdbError,
    pub entries_delivered: u64,
}
