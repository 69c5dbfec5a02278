//! The `Layer` capability set and the URL-scheme registry that opens
//! concrete implementations.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use papyrus_types::{Data, Key, UniqueID, Value};

use crate::error::LayerError;
use crate::url::LayerUrl;

/// A single storage engine behind the common operation contract: insert,
/// delete, point/range reads, a secondary-tag index, and a threshold-based
/// fullness check. Unsupported operations return
/// [`LayerError::Unsupported`] rather than panicking.
pub trait Layer: std::fmt::Debug + Send {
    /// The URL this layer was opened with.
    fn url(&self) -> &str;

    /// Appends a new revision and returns its unique id.
    ///
    /// # Errors
    ///
    /// [`LayerError::DuplicateKey`] if the key already exists and `force`
    /// is `false`; [`LayerError::Threshold`] if the layer is full and this
    /// is a new key.
    fn insert(&mut self, data: Data, force: bool) -> Result<UniqueID, LayerError>;

    /// Appends a tombstone revision for `key` and returns its unique id.
    /// Deleting an absent key is valid and still produces an id.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors for file-backed layers.
    fn delete(&mut self, key: &Key) -> Result<UniqueID, LayerError>;

    /// The most recent non-tombstone revision of `key`, or `None` if
    /// absent or the last revision is a tombstone.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors for file-backed layers.
    fn latest(&self, key: &Key) -> Result<Option<Data>, LayerError>;

    /// All revisions of `key`, newest first, including tombstones. Empty
    /// if `key` was never written.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors for file-backed layers.
    fn revisions(&self, key: &Key) -> Result<Vec<Data>, LayerError>;

    /// Primary keys whose last non-tombstone revision carries
    /// `tags[name] == value`.
    ///
    /// # Errors
    ///
    /// [`LayerError::Unsupported`] for layers without a tag index.
    fn search(&self, name: &str, value: &Key) -> Result<BTreeSet<Key>, LayerError>;

    /// Looks up a revision by its unique id, for diagnostics.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors for file-backed layers.
    fn raw(&self, uid: UniqueID) -> Result<Option<Data>, LayerError>;

    /// Whether `key`'s last revision is live (present and not a tombstone).
    ///
    /// # Errors
    ///
    /// Propagates I/O errors for file-backed layers.
    fn contains(&self, key: &Key) -> Result<bool, LayerError>;

    /// Number of live (non-tombstone) keys.
    fn len(&self) -> usize;

    /// Whether `len() == 0`.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total row count including tombstones.
    fn cap(&self) -> usize;

    /// `threshold.is_some() && cap() >= threshold`. A key already present
    /// may still be updated when full.
    fn is_full(&self) -> bool;

    /// Drops tombstoned revisions and the rows they shadow. Idempotent.
    ///
    /// # Errors
    ///
    /// [`LayerError::Unsupported`] for layers that cannot compact in place
    /// (`AolFileLayer`).
    fn purge(&mut self) -> Result<(), LayerError>;

    /// Scans all `(Key, Value)` pairs, sorted by key, optionally resuming
    /// from `based` (inclusive).
    ///
    /// # Errors
    ///
    /// [`LayerError::Unsupported`] if `based` is set on a layer that
    /// cannot resume a scan (`AolFileLayer`).
    fn iterate(
        &self,
        desc: bool,
        based: Option<&Key>,
    ) -> Result<Vec<(Key, Value)>, LayerError>;

    /// Deletes all data. **Destructive**: for file layers this removes the
    /// backing file.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors for file-backed layers.
    fn unlink(&mut self) -> Result<(), LayerError>;
}

type Constructor =
    dyn Fn(&LayerUrl, Option<usize>) -> Result<Box<dyn Layer>, LayerError> + Send + Sync;

/// Maps a URL scheme (`"mem"`, `"aol"`) to the constructor for its
/// implementation, and optionally caches opened instances by URL.
///
/// Populated via an explicit [`LayerRegistry::with_defaults`] call rather
/// than automatic discovery, per the design notes: avoid depending on
/// static-initializer ordering for something this small.
pub struct LayerRegistry {
    constructors: HashMap<String, Box<Constructor>>,
    cache: Mutex<HashMap<String, Arc<Mutex<Box<dyn Layer>>>>>,
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("schemes", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LayerRegistry {
    /// An empty registry with no schemes registered.
    #[must_use]
    pub fn new() -> Self {
        LayerRegistry {
            constructors: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A registry with `mem` and `aol` registered, matching the two
    /// concrete layers this crate ships.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("mem", |url, threshold| {
            Ok(Box::new(crate::mem_layer::MemLayer::open(url, threshold)) as Box<dyn Layer>)
        });
        registry.register("aol", |url, threshold| {
            Ok(Box::new(crate::aol_layer::AolFileLayer::open(url, threshold)?) as Box<dyn Layer>)
        });
        registry
    }

    /// Registers a scheme's constructor, overwriting any prior
    /// registration for the same scheme.
    pub fn register<F>(&mut self, scheme: &str, ctor: F)
    where
        F: Fn(&LayerUrl, Option<usize>) -> Result<Box<dyn Layer>, LayerError> + Send + Sync + 'static,
    {
        self.constructors.insert(scheme.to_string(), Box::new(ctor));
    }

    /// Opens `url`, honoring a `threshold` query override. When `cached`
    /// is true, returns a shared handle memoized by the full URL string;
    /// otherwise always constructs a fresh instance.
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFound`] if `url`'s scheme has no registered
    /// constructor, or if `url` cannot be parsed.
    pub fn open(
        &self,
        url: &str,
        threshold: Option<usize>,
        cached: bool,
    ) -> Result<Arc<Mutex<Box<dyn Layer>>>, LayerError> {
        if cached {
            if let Some(existing) = self.cache.lock().unwrap().get(url) {
                return Ok(Arc::clone(existing));
            }
        }

        let parsed = LayerUrl::parse(url)?;
        let ctor = self
            .constructors
            .get(&parsed.scheme)
            .ok_or_else(|| LayerError::NotFound(parsed.scheme.clone()))?;
        let threshold = threshold.or_else(|| parsed.threshold_override());
        let layer = ctor(&parsed, threshold)?;
        let handle = Arc::new(Mutex::new(layer));

        if cached {
            self.cache
                .lock()
                .unwrap()
                .insert(url.to_string(), Arc::clone(&handle));
        }

        Ok(handle)
    }

    /// Evicts one cached URL, or every cached instance if `url` is `None`.
    pub fn cache_clear(&self, url: Option<&str>) {
        let mut cache = self.cache.lock().unwrap();
        match url {
            Some(url) => {
                cache.remove(url);
            }
            None => cache.clear(),
        }
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_mem_layer_by_scheme() {
        let registry = LayerRegistry::with_defaults();
        let layer = registry.open("mem://", None, false).unwrap();
        assert_eq!(layer.lock().unwrap().url(), "mem://");
    }

    #[test]
    fn unknown_scheme_fails_not_found() {
        let registry = LayerRegistry::with_defaults();
        assert!(matches!(
            registry.open("ftp://nope", None, false),
            Err(LayerError::NotFound(_))
        ));
    }

    #[test]
    fn cached_open_returns_same_instance() {
        let registry = LayerRegistry::with_defaults();
        let a = registry.open("mem://shared", None, true).unwrap();
        let b = registry.open("mem://shared", None, true).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.cache_clear(Some("mem://shared"));
        let c = registry.open("mem://shared", None, true).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
