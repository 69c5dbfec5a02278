//! # papyrus-types: the core data model for Papyrus
//!
//! This crate contains the value objects every layer implementation and
//! the storage facade build on:
//! - [`UniqueID`] — the 128-bit time-ordered revision identifier.
//! - [`KeyType`] / [`Key`] — typed, fixed-width, comparable primary keys.
//! - [`ValueType`] / [`Value`] — variable-length payloads with optional
//!   zlib compression and an Adler-32-checked wire format.
//! - [`Data`] — the `(primary_key, value?, tags, is_deleted)` tuple a layer
//!   actually stores.
//!
//! Every type here is a plain value object: immutable once constructed,
//! `Eq`/`Ord`/`Hash` where needed, and carrying its own binary codec
//! (`to_bytes`/`from_bytes`).

mod data;
mod error;
mod key;
mod unique_id;
mod value;

pub use data::Data;
pub use error::CoreError;
pub use key::{Key, KeyType, KeyValue};
pub use unique_id::UniqueID;
pub use value::{Value, ValueType};
