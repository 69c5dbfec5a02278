//! Main entry point for embedding Papyrus.
//!
//! [`Papyrus`] is a thin, ergonomic wrapper around [`Storage`]: it exists so
//! embedders depending only on this top crate get a convenient
//! `open`/`insert`/`latest` surface without reaching into
//! `papyrus-storage` directly.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use papyrus_storage::{DefaultLayerSpec, Storage};
use papyrus_types::{Data, Key, UniqueID, Value};

use crate::error::Result;

/// Configuration for opening a `Papyrus` store: the ordered list of layer
/// URLs, an optional overflow-layer prototype, and whether opened layers
/// should be memoized by URL.
#[derive(Debug, Clone)]
pub struct PapyrusConfig {
    pub layers: Vec<String>,
    pub default_layer: Option<DefaultLayerSpec>,
    pub cached: bool,
}

impl PapyrusConfig {
    /// A single `mem://` layer, no overflow prototype, no caching.
    #[must_use]
    pub fn in_memory() -> Self {
        PapyrusConfig {
            layers: vec!["mem://".to_string()],
            default_layer: None,
            cached: false,
        }
    }

    /// Builds a config from an explicit list of layer URLs.
    #[must_use]
    pub fn new(layers: Vec<String>) -> Self {
        PapyrusConfig {
            layers,
            default_layer: None,
            cached: false,
        }
    }

    #[must_use]
    pub fn with_default_layer(mut self, spec: DefaultLayerSpec) -> Self {
        self.default_layer = Some(spec);
        self
    }

    #[must_use]
    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

/// The embeddable store. Opens its declared layers eagerly and keeps them
/// for the lifetime of this handle.
#[derive(Debug)]
pub struct Papyrus {
    storage: Storage,
}

impl Papyrus {
    /// Opens every layer named in `config`, in declared order.
    ///
    /// # Errors
    ///
    /// Propagates any layer's open failure.
    pub fn open(config: PapyrusConfig) -> Result<Self> {
        tracing::debug!(layers = ?config.layers, cached = config.cached, "opening papyrus store");
        let storage = Storage::new(&config.layers, config.default_layer, config.cached)?;
        Ok(Papyrus { storage })
    }

    /// A convenience handle backed by a single unbounded `MemLayer`.
    ///
    /// # Errors
    ///
    /// Never fails in practice; returns `Result` for symmetry with
    /// [`Papyrus::open`].
    pub fn in_memory() -> Result<Self> {
        Self::open(PapyrusConfig::in_memory())
    }

    /// Inserts `value` under `key`, tagged with `tags`.
    ///
    /// # Errors
    ///
    /// [`papyrus_storage::LayerError::DuplicateKey`] if `key` already
    /// exists and `force` is `false`; [`papyrus_storage::LayerError::Threshold`]
    /// if every layer is full and no overflow prototype is configured.
    pub fn insert(
        &mut self,
        key: Key,
        value: Value,
        tags: BTreeMap<String, Key>,
        force: bool,
    ) -> Result<UniqueID> {
        self.storage.insert(Data::new(key, value, tags), force)
    }

    /// Appends a tombstone revision for `key`.
    ///
    /// # Errors
    ///
    /// See [`Storage::delete`].
    pub fn delete(&mut self, key: &Key) -> Result<UniqueID> {
        self.storage.delete(key)
    }

    /// The newest non-tombstone revision of `key`, across all layers.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn latest(&self, key: &Key) -> Result<Option<Data>> {
        self.storage.latest(key)
    }

    /// The newest revision's raw value, including a tombstone sentinel.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn query(&self, key: &Key) -> Result<Option<Value>> {
        self.storage.query(key)
    }

    /// Every revision of `key`, newest first, concatenated in layer order.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn revisions(&self, key: &Key) -> Result<Vec<Data>> {
        self.storage.revisions(key)
    }

    /// Primary keys tagged `name == value`, unioned across layers.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn search(&self, name: &str, value: &Key) -> Result<BTreeSet<Key>> {
        self.storage.search(name, value)
    }

    /// Whether any layer still has a live revision for `key`.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn contains(&self, key: &Key) -> Result<bool> {
        self.storage.contains(key)
    }

    /// Sum of every layer's live key count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether `len() == 0`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Drops tombstoned revisions across every layer that supports it.
    ///
    /// # Errors
    ///
    /// Propagates any non-`Unsupported` layer-level error.
    pub fn purge(&mut self) -> Result<()> {
        tracing::info!("purging tombstoned revisions");
        self.storage.purge()
    }

    /// Deletes all data across every layer that supports it.
    ///
    /// # Errors
    ///
    /// Propagates any non-`Unsupported` layer-level error.
    pub fn unlink(&mut self) -> Result<()> {
        self.storage.unlink()
    }

    /// Direct access to the underlying [`Storage`] facade for operations
    /// this wrapper does not expose (`iterate`, `layer`, `cap`).
    pub fn storage(&mut self) -> &mut Storage {
        &mut self.storage
    }
}
