//! # Papyrus
//!
//! An embeddable, persistent, revisioned key-value store.
//!
//! Papyrus opens a *storage* composed of one or more ordered *layers* and
//! issues point operations over it: insert, delete, latest, revisions,
//! search by secondary tag. Every write produces a new immutable
//! *revision* identified by a 128-bit time-ordered [`UniqueID`]; deletion
//! is a tombstone revision. Full revision history is preserved until an
//! authorized [`Papyrus::purge`] drops tombstoned rows.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                            Papyrus                             │
//! │  ┌────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐  │
//! │  │  Key   │ → │   Value   │ → │    Data    │ → │  Storage  │  │
//! │  │ (typed)│   │(zlib+crc) │   │(key,value, │   │ (layers)  │  │
//! │  │        │   │           │   │ tags, del) │   │           │  │
//! │  └────────┘   └───────────┘   └────────────┘   └───────────┘  │
//! │                                                       │        │
//! │                                   ┌───────────────────┴─────┐  │
//! │                                   │ MemLayer | AolFileLayer  │  │
//! │                                   └──────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```
//! use papyrus::{Papyrus, Key, Value};
//! use std::collections::BTreeMap;
//!
//! let mut db = Papyrus::in_memory().unwrap();
//! let key = Key::from_str_value("example").unwrap();
//! db.insert(key.clone(), Value::raw(b"hello".to_vec()), BTreeMap::new(), false)
//!     .unwrap();
//! assert!(db.contains(&key).unwrap());
//! ```
//!
//! # Modules
//!
//! - **SDK layer**: [`Papyrus`], [`PapyrusConfig`] — the main API.
//! - **Foundation** (re-exported from `papyrus-types`): [`Key`]/[`KeyType`],
//!   [`Value`]/[`ValueType`], [`Data`], [`UniqueID`].
//! - **Storage** (re-exported from `papyrus-storage`): [`Storage`],
//!   [`Layer`], [`LayerRegistry`], [`MemLayer`], [`AolFileLayer`].

mod error;
mod papyrus;

pub use error::{PapyrusError, Result};
pub use papyrus::{Papyrus, PapyrusConfig};

pub use papyrus_types::{CoreError, Data, Key, KeyType, KeyValue, UniqueID, Value, ValueType};

pub use papyrus_storage::{
    AolFileLayer, DefaultLayerSpec, Layer, LayerError, LayerRegistry, LayerUrl, MemLayer, Storage,
};
