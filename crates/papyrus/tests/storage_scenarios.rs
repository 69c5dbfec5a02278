//! End-to-end scenarios exercising `Papyrus`/`Storage` across layer
//! implementations, rather than a single layer or codec in isolation.

use std::collections::BTreeMap;

use papyrus::{Data, DefaultLayerSpec, Key, KeyType, Papyrus, PapyrusConfig, Storage, Value};
use tempfile::tempdir;

fn int_key(n: i128) -> Key {
    Key::new_int(n, KeyType::Int).unwrap()
}

#[test]
fn insert_query_delete_round_trip() {
    let mut db = Papyrus::in_memory().unwrap();
    let key = int_key(42);
    let value = Value::raw(b"hi".to_vec());

    db.insert(key.clone(), value.clone(), BTreeMap::new(), false)
        .unwrap();
    assert_eq!(db.latest(&key).unwrap().unwrap().value(), Some(&value));

    db.delete(&key).unwrap();
    assert_eq!(db.latest(&key).unwrap(), None);

    let revs = db.revisions(&key).unwrap();
    assert_eq!(revs.len(), 2);
    assert!(revs[0].is_deleted());
}

#[test]
fn aol_layer_preserves_forced_revisions_across_reopen() {
    let dir = tempdir().unwrap();
    let url = format!("aol://{}/layer-0.aol", dir.path().display());
    let key = int_key(7);

    {
        let mut storage = Storage::new(&[url.clone()], None, false).unwrap();
        storage
            .insert_value(key.clone(), Value::raw(b"v1".to_vec()), false)
            .unwrap();
        storage
            .insert_value(key.clone(), Value::raw(b"v2".to_vec()), true)
            .unwrap();

        let revs = storage.revisions(&key).unwrap();
        assert_eq!(revs.len(), 2);
        assert_eq!(revs[0].value().unwrap().raw_bytes(), Some(b"v2".as_slice()));
        assert_eq!(revs[1].value().unwrap().raw_bytes(), Some(b"v1".as_slice()));
    }

    // Re-opening the same file must reconstruct identical history.
    let reopened = Storage::new(&[url], None, false).unwrap();
    let revs = reopened.revisions(&key).unwrap();
    assert_eq!(revs.len(), 2);
    assert_eq!(revs[0].value().unwrap().raw_bytes(), Some(b"v2".as_slice()));
    assert_eq!(revs[1].value().unwrap().raw_bytes(), Some(b"v1".as_slice()));
}

#[test]
fn earlier_layer_shadows_later_layer_on_read() {
    let storage =
        Storage::new(&["mem://a".to_string(), "mem://b".to_string()], None, false).unwrap();

    let key = int_key(1);

    // Write straight to layer[1], bypassing `Storage::insert`'s routing,
    // so the key exists only behind the layer that should be shadowed.
    storage
        .layer_at(1)
        .unwrap()
        .lock()
        .unwrap()
        .insert(
            Data::new(key.clone(), Value::raw(b"from-b".to_vec()), BTreeMap::new()),
            false,
        )
        .unwrap();

    assert_eq!(
        storage.latest(&key).unwrap().unwrap().value().unwrap(),
        &Value::raw(b"from-b".to_vec())
    );

    // Now the same key lands in layer[0] too; it must shadow layer[1].
    storage
        .layer_at(0)
        .unwrap()
        .lock()
        .unwrap()
        .insert(
            Data::new(key.clone(), Value::raw(b"from-a".to_vec()), BTreeMap::new()),
            false,
        )
        .unwrap();

    assert_eq!(
        storage.latest(&key).unwrap().unwrap().value().unwrap(),
        &Value::raw(b"from-a".to_vec())
    );
}

#[test]
fn overflow_layer_receives_writes_once_primary_is_full() {
    let config = PapyrusConfig::new(vec!["mem://primary?threshold=1".to_string()])
        .with_default_layer(DefaultLayerSpec {
            url: "mem://overflow?threshold=4".to_string(),
            threshold: None,
        });
    let mut db = Papyrus::open(config).unwrap();

    db.insert(int_key(0), Value::raw(b"a".to_vec()), BTreeMap::new(), false)
        .unwrap();
    db.insert(int_key(1), Value::raw(b"b".to_vec()), BTreeMap::new(), false)
        .unwrap();

    assert_eq!(db.len(), 2);
    assert!(db.contains(&int_key(1)).unwrap());
}

#[test]
fn search_finds_keys_by_secondary_tag() {
    let mut db = Papyrus::in_memory().unwrap();
    let mut tags = BTreeMap::new();
    tags.insert("color".to_string(), Key::from_str_value("red").unwrap());

    db.insert(int_key(1), Value::raw(b"apple".to_vec()), tags, false)
        .unwrap();

    let hits = db
        .search("color", &Key::from_str_value("red").unwrap())
        .unwrap();
    assert_eq!(hits, std::collections::BTreeSet::from([int_key(1)]));
}

#[test]
fn purge_drops_tombstones_but_unsupported_aol_layers_are_ignored() {
    let dir = tempdir().unwrap();
    let url = format!("aol://{}/layer-0.aol", dir.path().display());
    let mut storage = Storage::new(&["mem://".to_string(), url], None, false).unwrap();

    let key = int_key(3);
    storage
        .insert_value(key.clone(), Value::raw(b"x".to_vec()), false)
        .unwrap();
    storage.delete(&key).unwrap();

    // Must not fail even though the AOL layer rejects purge outright.
    storage.purge().unwrap();
}
