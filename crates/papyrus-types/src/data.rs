//! The composite record a layer stores: a primary key, an optional value,
//! a secondary-index tag map, and a tombstone flag.

use std::collections::BTreeMap;

use crate::key::Key;
use crate::value::Value;

/// `(primary_key, value?, tags, is_deleted)`. Immutable after construction;
/// a new revision is always a new `Data`, never a mutation of an old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    primary_key: Key,
    value: Option<Value>,
    tags: BTreeMap<String, Key>,
    is_deleted: bool,
}

impl Data {
    /// Builds a live (non-tombstone) record.
    #[must_use]
    pub fn new(primary_key: Key, value: Value, tags: BTreeMap<String, Key>) -> Self {
        Data {
            primary_key,
            value: Some(value),
            tags,
            is_deleted: false,
        }
    }

    /// Builds a tombstone record for `primary_key`: `is_deleted = true`,
    /// no value, no tags.
    #[must_use]
    pub fn tombstone(primary_key: Key) -> Self {
        Data {
            primary_key,
            value: None,
            tags: BTreeMap::new(),
            is_deleted: true,
        }
    }

    #[must_use]
    pub fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, Key> {
        &self.tags
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_has_no_value_and_is_deleted() {
        let key = Key::from_bool(true);
        let data = Data::tombstone(key.clone());
        assert_eq!(data.primary_key(), &key);
        assert!(data.value().is_none());
        assert!(data.is_deleted());
        assert!(data.tags().is_empty());
    }
}
