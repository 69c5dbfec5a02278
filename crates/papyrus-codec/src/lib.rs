//! # papyrus-codec: hand-rolled checksum and encoding primitives
//!
//! This crate contains the small, stable-since-decades algorithms that the
//! rest of Papyrus builds on:
//! - [`crc32`] — IEEE 802.3 CRC-32, used for the AOL file header checksum.
//! - [`adler32`] — zlib-compatible Adler-32, used for `Value`'s wire-format
//!   trailer.
//! - [`crockford`] — Crockford Base32, used for `UniqueID`'s text form.
//!
//! None of these pull in an external crate: each is small enough to own,
//! and auditing a hand-rolled checksum is cheaper than auditing a
//! dependency for one.

pub mod adler32;
pub mod crc32;
pub mod crockford;

pub use adler32::{adler32, Adler32};
pub use crc32::{crc32, Crc32};

/// Errors raised by the codec primitives in this crate.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    #[error("invalid crockford base32 symbol: {0:?}")]
    InvalidSymbol(char),

    #[error("decoded value overflows the target width")]
    Overflow,
}
