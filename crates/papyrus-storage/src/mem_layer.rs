//! In-memory `Layer` implementation. Data is lost when the process exits.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use papyrus_types::{Data, Key, UniqueID, Value};
use tracing::debug;

use crate::error::LayerError;
use crate::layer::Layer;
use crate::url::LayerUrl;

const DEFAULT_THRESHOLD: usize = 8196;

/// The in-memory layer. Holds four coherent indices behind one entry
/// point, per the design note that callers must never touch them
/// individually:
/// - `records`: every revision ever inserted, by unique id.
/// - `live_keys`: primary keys whose last revision is not a tombstone.
/// - `history`: insertion-ordered revisions per key.
/// - `tag_index`: `tag_name -> tag_value -> {primary_keys}`.
#[derive(Debug)]
pub struct MemLayer {
    url: String,
    threshold: Option<usize>,
    records: HashMap<UniqueID, Data>,
    live_keys: BTreeSet<Key>,
    history: HashMap<Key, Vec<Data>>,
    tag_index: HashMap<String, HashMap<Key, BTreeSet<Key>>>,
}

impl MemLayer {
    /// Builds a `MemLayer` for `url`, defaulting `threshold` to 8196 rows.
    #[must_use]
    pub fn open(url: &LayerUrl, threshold: Option<usize>) -> Self {
        MemLayer {
            url: format!("mem://{}", url.authority),
            threshold: threshold.or(Some(DEFAULT_THRESHOLD)),
            records: HashMap::new(),
            live_keys: BTreeSet::new(),
            history: HashMap::new(),
            tag_index: HashMap::new(),
        }
    }

    fn strip_tag_postings(&mut self, key: &Key) {
        for postings in self.tag_index.values_mut() {
            for keys in postings.values_mut() {
                keys.remove(key);
            }
        }
    }

    fn add_tag_postings(&mut self, data: &Data) {
        for (name, tag_value) in data.tags() {
            self.tag_index
                .entry(name.clone())
                .or_default()
                .entry(tag_value.clone())
                .or_default()
                .insert(data.primary_key().clone());
        }
    }
}

impl Layer for MemLayer {
    fn url(&self) -> &str {
        &self.url
    }

    fn insert(&mut self, data: Data, force: bool) -> Result<UniqueID, LayerError> {
        debug!(key = ?data.primary_key(), force, "mem layer insert");

        let key = data.primary_key().clone();

        if self.live_keys.contains(&key) && !force {
            return Err(LayerError::DuplicateKey);
        }

        let is_new_key = !self.history.contains_key(&key);
        if is_new_key && self.is_full() {
            return Err(LayerError::Threshold);
        }

        let uid = UniqueID::generate();

        self.strip_tag_postings(&key);
        if data.is_deleted() {
            self.live_keys.remove(&key);
        } else {
            self.live_keys.insert(key.clone());
            self.add_tag_postings(&data);
        }

        self.records.insert(uid, data.clone());
        self.history.entry(key).or_default().push(data);

        Ok(uid)
    }

    fn delete(&mut self, key: &Key) -> Result<UniqueID, LayerError> {
        debug!(?key, "mem layer delete");

        let tombstone = Data::tombstone(key.clone());
        let uid = UniqueID::generate();

        self.live_keys.remove(key);
        self.strip_tag_postings(key);
        self.records.insert(uid, tombstone.clone());
        self.history.entry(key.clone()).or_default().push(tombstone);

        Ok(uid)
    }

    fn latest(&self, key: &Key) -> Result<Option<Data>, LayerError> {
        Ok(self
            .history
            .get(key)
            .and_then(|revs| revs.last())
            .filter(|d| !d.is_deleted())
            .cloned())
    }

    fn revisions(&self, key: &Key) -> Result<Vec<Data>, LayerError> {
        Ok(self
            .history
            .get(key)
            .map(|revs| revs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn search(&self, name: &str, value: &Key) -> Result<BTreeSet<Key>, LayerError> {
        Ok(self
            .tag_index
            .get(name)
            .and_then(|postings| postings.get(value))
            .cloned()
            .unwrap_or_default())
    }

    fn raw(&self, uid: UniqueID) -> Result<Option<Data>, LayerError> {
        Ok(self.records.get(&uid).cloned())
    }

    fn contains(&self, key: &Key) -> Result<bool, LayerError> {
        Ok(self.live_keys.contains(key))
    }

    fn len(&self) -> usize {
        self.live_keys.len()
    }

    fn cap(&self) -> usize {
        self.records.len()
    }

    fn is_full(&self) -> bool {
        self.threshold.is_some_and(|t| self.cap() >= t)
    }

    fn purge(&mut self) -> Result<(), LayerError> {
        let live: HashSet<Key> = self.live_keys.iter().cloned().collect();
        self.history.retain(|key, _| live.contains(key));
        for revs in self.history.values_mut() {
            revs.retain(|d| !d.is_deleted());
        }

        let history_snapshot = self.history.clone();
        self.records.retain(|_, data| {
            history_snapshot
                .get(data.primary_key())
                .is_some_and(|revs| revs.contains(data))
        });

        Ok(())
    }

    fn iterate(
        &self,
        desc: bool,
        based: Option<&Key>,
    ) -> Result<Vec<(Key, Value)>, LayerError> {
        let mut keys: Vec<&Key> = self.history.keys().collect();
        keys.sort();
        if desc {
            keys.reverse();
        }

        let keys: Vec<&Key> = match based {
            Some(based_key) => match keys.iter().position(|&k| k == based_key) {
                Some(idx) => keys[idx..].to_vec(),
                None => Vec::new(),
            },
            None => keys,
        };

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let last = self.history[key].last().expect("history never stores an empty vec");
            let value = if last.is_deleted() {
                Value::tombstone()
            } else {
                last.value().cloned().unwrap_or_else(Value::nil)
            };
            out.push((key.clone(), value));
        }
        Ok(out)
    }

    fn unlink(&mut self) -> Result<(), LayerError> {
        self.live_keys.clear();
        self.history.clear();
        self.records.clear();
        self.tag_index.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_types::KeyType;
    use test_case::test_case;

    fn url() -> LayerUrl {
        LayerUrl::parse("mem://").unwrap()
    }

    fn key(n: i128) -> Key {
        Key::new_int(n, KeyType::Int).unwrap()
    }

    #[test]
    fn insert_then_latest_then_delete() {
        let mut layer = MemLayer::open(&url(), None);
        let k = key(42);
        let data = Data::new(k.clone(), Value::raw(b"hi".to_vec()), BTreeMap::new());

        let uid = layer.insert(data.clone(), false).unwrap();
        assert!(layer.contains(&k).unwrap());
        assert!(layer.raw(uid).unwrap().is_some());
        assert_eq!(layer.latest(&k).unwrap(), Some(data));
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.cap(), 1);

        layer.delete(&k).unwrap();
        assert_eq!(layer.latest(&k).unwrap(), None);
        assert!(!layer.contains(&k).unwrap());

        let revs = layer.revisions(&k).unwrap();
        assert_eq!(revs.len(), 2);
        assert!(revs[0].is_deleted());
    }

    #[test]
    fn duplicate_insert_without_force_fails() {
        let mut layer = MemLayer::open(&url(), None);
        let k = key(1);
        let data = Data::new(k.clone(), Value::raw(b"a".to_vec()), BTreeMap::new());
        layer.insert(data.clone(), false).unwrap();
        assert!(matches!(
            layer.insert(data, false),
            Err(LayerError::DuplicateKey)
        ));
    }

    #[test]
    fn purge_after_insert_and_delete_empties_layer() {
        let mut layer = MemLayer::open(&url(), None);
        let k = key(7);
        layer
            .insert(
                Data::new(k.clone(), Value::raw(b"x".to_vec()), BTreeMap::new()),
                false,
            )
            .unwrap();
        layer.delete(&k).unwrap();

        layer.purge().unwrap();
        assert_eq!(layer.len(), 0);
        assert_eq!(layer.cap(), 0);
    }

    #[test]
    fn threshold_blocks_new_keys_but_not_updates() {
        let parsed = LayerUrl::parse("mem://?threshold=1").unwrap();
        let mut layer = MemLayer::open(&parsed, Some(1));
        let k0 = key(0);
        layer
            .insert(
                Data::new(k0.clone(), Value::raw(b"a".to_vec()), BTreeMap::new()),
                false,
            )
            .unwrap();

        // updating the same key is allowed even though the layer is full
        layer
            .insert(
                Data::new(k0, Value::raw(b"b".to_vec()), BTreeMap::new()),
                true,
            )
            .unwrap();

        let k1 = key(1);
        let err = layer
            .insert(
                Data::new(k1, Value::raw(b"c".to_vec()), BTreeMap::new()),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, LayerError::Threshold));
    }

    #[test_case(true, vec![2, 1, 0]; "descending")]
    #[test_case(false, vec![0, 1, 2]; "ascending")]
    fn iterate_sorts_by_key(desc: bool, expected: Vec<i128>) {
        let mut layer = MemLayer::open(&url(), None);
        for n in [0, 1, 2] {
            layer
                .insert(
                    Data::new(key(n), Value::raw(vec![n as u8]), BTreeMap::new()),
                    false,
                )
                .unwrap();
        }

        let got: Vec<i128> = layer
            .iterate(desc, None)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k.as_numeric().unwrap())
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn search_returns_matching_primary_keys() {
        let mut layer = MemLayer::open(&url(), None);
        let mut tags = BTreeMap::new();
        tags.insert("color".to_string(), Key::from_str_value("red").unwrap());
        layer
            .insert(
                Data::new(key(1), Value::raw(b"a".to_vec()), tags),
                false,
            )
            .unwrap();

        let hits = layer
            .search("color", &Key::from_str_value("red").unwrap())
            .unwrap();
        assert_eq!(hits, BTreeSet::from([key(1)]));
    }
}
