//! Layer implementations and the storage facade composing them.
//!
//! - [`Layer`] is the capability contract every storage engine satisfies.
//! - [`LayerRegistry`] maps a URL scheme (`mem://`, `aol://`) to a
//!   constructor, with optional per-URL caching.
//! - [`MemLayer`] and [`AolFileLayer`] are the two concrete engines this
//!   crate ships.
//! - [`Storage`] composes an ordered sequence of layers behind one entry
//!   point: writes route to one layer, reads merge/shadow/concatenate
//!   across all of them.

mod aol_layer;
mod error;
mod layer;
mod mem_layer;
mod storage;
mod url;

pub use aol_layer::AolFileLayer;
pub use error::LayerError;
pub use layer::{Layer, LayerRegistry};
pub use mem_layer::MemLayer;
pub use storage::{DefaultLayerSpec, Storage};
pub use url::LayerUrl;
