//! Ordered layer composition: the facade embedders actually hold.
//!
//! `Storage` is not itself a [`Layer`] — it composes a declared sequence of
//! them and routes each operation per spec: writes to one layer, reads
//! merged/shadowed/concatenated/unioned across all of them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use papyrus_types::{Data, Key, UniqueID, Value};
use tracing::debug;

use crate::error::LayerError;
use crate::layer::{Layer, LayerRegistry};

type LayerHandle = Arc<Mutex<Box<dyn Layer>>>;

/// The prototype used to mint a fresh layer once every declared layer is
/// full.
#[derive(Debug, Clone)]
pub struct DefaultLayerSpec {
    pub url: String,
    pub threshold: Option<usize>,
}

/// An ordered composition of layers behind one entry point. Layer 0
/// shadows layer 1 shadows layer 2, etc.
#[derive(Debug)]
pub struct Storage {
    registry: LayerRegistry,
    layers: Vec<LayerHandle>,
    default_layer: Option<DefaultLayerSpec>,
    cached: bool,
}

impl Storage {
    /// Opens every URL in `urls` via a default-populated registry, in
    /// declared order.
    ///
    /// # Errors
    ///
    /// Propagates [`LayerError`] from any URL that fails to open.
    pub fn new(
        urls: &[String],
        default_layer: Option<DefaultLayerSpec>,
        cached: bool,
    ) -> Result<Self, LayerError> {
        let registry = LayerRegistry::with_defaults();
        let layers = urls
            .iter()
            .map(|url| registry.open(url, None, cached))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Storage {
            registry,
            layers,
            default_layer,
            cached,
        })
    }

    /// The first non-full layer. If every declared layer is full and a
    /// `default_layer` prototype was configured, duplicates it, appends
    /// the new instance, and returns that; otherwise fails `Threshold`.
    ///
    /// # Errors
    ///
    /// [`LayerError::Threshold`] if every layer is full and no prototype
    /// is configured.
    pub fn layer(&mut self) -> Result<LayerHandle, LayerError> {
        for handle in &self.layers {
            if !handle.lock().unwrap().is_full() {
                return Ok(Arc::clone(handle));
            }
        }

        match &self.default_layer {
            Some(spec) => {
                debug!(url = %spec.url, "all layers full, minting a fresh one from the prototype");
                let fresh = self.registry.open(&spec.url, spec.threshold, self.cached)?;
                self.layers.push(Arc::clone(&fresh));
                Ok(fresh)
            }
            None => Err(LayerError::Threshold),
        }
    }

    /// Inserts `data`, routed to [`Storage::layer`].
    ///
    /// # Errors
    ///
    /// See [`Layer::insert`] and [`Storage::layer`].
    pub fn insert(&mut self, data: Data, force: bool) -> Result<UniqueID, LayerError> {
        let handle = self.layer()?;
        let mut guard = handle.lock().unwrap();
        guard.insert(data, force)
    }

    /// Convenience form of [`Storage::insert`] taking a bare key/value.
    ///
    /// # Errors
    ///
    /// See [`Storage::insert`].
    pub fn insert_value(
        &mut self,
        key: Key,
        value: Value,
        force: bool,
    ) -> Result<UniqueID, LayerError> {
        self.insert(Data::new(key, value, BTreeMap::new()), force)
    }

    /// Deletes `key`, routed to [`Storage::layer`].
    ///
    /// # Errors
    ///
    /// See [`Layer::delete`] and [`Storage::layer`].
    pub fn delete(&mut self, key: &Key) -> Result<UniqueID, LayerError> {
        let handle = self.layer()?;
        let mut guard = handle.lock().unwrap();
        guard.delete(key)
    }

    /// Scans layers in declared order, returning the first non-null
    /// result. Earlier layers shadow later ones.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level I/O error encountered.
    pub fn latest(&self, key: &Key) -> Result<Option<Data>, LayerError> {
        for handle in &self.layers {
            if let Some(data) = handle.lock().unwrap().latest(key)? {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    /// The same layered scan as [`Storage::latest`], but returns the raw
    /// `Value` of the newest revision in the first layer holding one,
    /// including a tombstone sentinel.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level I/O error encountered.
    pub fn query(&self, key: &Key) -> Result<Option<Value>, LayerError> {
        for handle in &self.layers {
            let revisions = handle.lock().unwrap().revisions(key)?;
            if let Some(newest) = revisions.first() {
                let value = if newest.is_deleted() {
                    Value::tombstone()
                } else {
                    newest.value().cloned().unwrap_or_else(Value::nil)
                };
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Concatenates per-layer revisions in declared order (no cross-layer
    /// merge or re-sort).
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level I/O error encountered.
    pub fn revisions(&self, key: &Key) -> Result<Vec<Data>, LayerError> {
        let mut out = Vec::new();
        for handle in &self.layers {
            out.extend(handle.lock().unwrap().revisions(key)?);
        }
        Ok(out)
    }

    /// Union of every layer's matches.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn search(&self, name: &str, value: &Key) -> Result<BTreeSet<Key>, LayerError> {
        let mut out = BTreeSet::new();
        for handle in &self.layers {
            out.extend(handle.lock().unwrap().search(name, value)?);
        }
        Ok(out)
    }

    /// Chains per-layer iterators in declared order. Does not re-sort or
    /// deduplicate across layers.
    ///
    /// # Errors
    ///
    /// Propagates [`LayerError::Unsupported`] if any layer rejects `based`.
    pub fn iterate(
        &self,
        desc: bool,
        based: Option<&Key>,
    ) -> Result<Vec<(Key, Value)>, LayerError> {
        let mut out = Vec::new();
        for handle in &self.layers {
            out.extend(handle.lock().unwrap().iterate(desc, based)?);
        }
        Ok(out)
    }

    /// Whether any layer contains `key`.
    ///
    /// # Errors
    ///
    /// Propagates the first layer-level error encountered.
    pub fn contains(&self, key: &Key) -> Result<bool, LayerError> {
        for handle in &self.layers {
            if handle.lock().unwrap().contains(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Sum of every layer's live key count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.iter().map(|h| h.lock().unwrap().len()).sum()
    }

    /// Whether `len() == 0`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of every layer's total row count.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.layers.iter().map(|h| h.lock().unwrap().cap()).sum()
    }

    /// Purges every layer, ignoring any that reject the operation.
    ///
    /// # Errors
    ///
    /// Propagates any non-`Unsupported` layer-level error.
    pub fn purge(&mut self) -> Result<(), LayerError> {
        for handle in &self.layers {
            match handle.lock().unwrap().purge() {
                Ok(()) | Err(LayerError::Unsupported(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Unlinks every layer, ignoring any that reject the operation.
    ///
    /// # Errors
    ///
    /// Propagates any non-`Unsupported` layer-level error.
    pub fn unlink(&mut self) -> Result<(), LayerError> {
        for handle in &self.layers {
            match handle.lock().unwrap().unlink() {
                Ok(()) | Err(LayerError::Unsupported(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// The number of layers currently composed, including ones minted
    /// from the `default_layer` prototype.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Direct access to the layer at `index` in declared order, bypassing
    /// [`Storage::layer`]'s routing. Mainly useful for tests and
    /// diagnostics that need to address a specific layer.
    #[must_use]
    pub fn layer_at(&self, index: usize) -> Option<LayerHandle> {
        self.layers.get(index).cloned()
    }
}
