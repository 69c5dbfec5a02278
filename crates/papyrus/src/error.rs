//! The top-level error type and `Result` alias, wrapping the storage
//! layer's error for callers who only depend on this crate.

pub use papyrus_storage::LayerError as PapyrusError;

/// Convenience alias used throughout this crate's public API.
pub type Result<T> = std::result::Result<T, PapyrusError>;
