//! The crate-wide error type and [`Result`] alias.
//!
//! Most decode paths are forgiving: the wire parser and the schema-driven
//! decoders never return an [`Error`] to their caller, they emit sentinel
//! values instead (see [`crate::wire::parser`] and [`crate::decode::binary`]).
//! [`Error`] is reserved for the paths that are allowed to fail hard:
//! opening/mapping a file, loading a schema, and parsing a Java source or
//! class file.

use std::fmt;

/// The crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading `.cq4` files, loading schemas, or
/// extracting schemas from Java sources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file open, mmap, or read operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A stop-bit integer, string, or class-file structure ended before it
    /// was fully read.
    ///
    /// This variant is only ever surfaced from schema loading and class
    /// file parsing; inside a single wire-parsed record it is caught
    /// internally and the record is salvaged instead.
    #[error("truncated while reading {context}")]
    Truncated {
        /// What was being read when the buffer ran out.
        context: &'static str,
    },
    /// A stop-bit varint ran past the 10-byte limit without terminating.
    #[error("stop-bit encoding exceeded 10 bytes")]
    Overflow,
    /// An unrecognized wire tag or class-file constant-pool tag.
    #[error("unrecognized tag: 0x{0:02X}")]
    BadTag(u8),
    /// A schema referenced an unknown logical type or was otherwise
    /// malformed.
    #[error("bad schema: {0}")]
    BadSchema(String),
    /// A schema-driven decode could not proceed because the payload was
    /// shorter than the schema required and no degrade path existed.
    #[error("decode mismatch: {0}")]
    DecodeMismatch(String),
    /// A directory walk produced no usable `.java`/`.class` files.
    #[error("no usable class files found")]
    NoSchema,
}

impl Error {
    pub(crate) fn truncated(context: &'static str) -> Self {
        Error::Truncated { context }
    }
}

/// Renders a decode failure as the `<decode_error: reason>` sentinel used
/// by the schema decoders, instead of propagating an [`Error`] — matching
/// the wire layer's tolerance for malformed payloads.
pub(crate) fn decode_error_sentinel(reason: impl fmt::Display) -> String {
    format!("<decode_error: {reason}>")
}
