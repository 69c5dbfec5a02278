//! The error type every `Layer`/`Storage` operation returns.

use papyrus_types::CoreError;

/// Errors raised by layer implementations and the storage facade.
///
/// Wraps [`CoreError`] for constructor/decode failures bubbling up from
/// `papyrus-types`, and adds the layer-level conditions from spec §7.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("key already exists in this layer")]
    DuplicateKey,

    #[error("layer is at capacity")]
    Threshold,

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("no layer registered for scheme {0:?}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
