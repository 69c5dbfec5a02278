//! Errors raised by constructors and binary decoders in this crate.

/// Errors produced while constructing or decoding the core data model.
///
/// This crate raises exactly the two error kinds spec'd for the type layer;
/// layer-level failures (`DuplicateKey`, `Threshold`, ...) live in
/// `papyrus-storage`'s own error type, which wraps this one.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A constructor argument falls outside its declared domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A `from_bytes` decode failed: wrong length, magic, version, or
    /// checksum mismatch.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}
