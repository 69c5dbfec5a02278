//! Append-only-log file `Layer` implementation.
//!
//! Layout: `[ 16-byte header ][ optional meta ][ 512-byte aligned ][
//! records... ]`. Every write is a `Pair` (ktype + key bytes + `Value`
//! wire bytes) appended to the end of the file; nothing already written is
//! ever rewritten in place.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use papyrus_codec::crc32;
use papyrus_types::{CoreError, Data, Key, KeyType, UniqueID, Value};
use tracing::{debug, info};

use crate::error::LayerError;
use crate::layer::Layer;
use crate::url::LayerUrl;

const MAGIC: [u8; 4] = [0x30, 0x14, 0x15, 0x92];
const HEADER_VERSION: u8 = 1;
const HEADER_TYPE_AOL: u8 = b'A';
const HEADER_SIZE: u64 = 16;
const TEXT_ALIGNMENT: u64 = 512;

fn align_up(offset: u64, block: u64) -> u64 {
    offset + (block - offset % block) % block
}

fn encode_header(meta_size: u32, flags: u16) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0..4].copy_from_slice(&MAGIC);
    buf[4] = HEADER_VERSION;
    buf[5] = HEADER_TYPE_AOL;
    buf[6..8].copy_from_slice(&flags.to_le_bytes());
    buf[8..12].copy_from_slice(&meta_size.to_le_bytes());
    let checksum = crc32::crc32(&buf[0..12]);
    buf[12..16].copy_from_slice(&checksum.to_le_bytes());
    buf
}

/// Returns `(flags, meta_size)`.
fn decode_header(data: &[u8]) -> Result<(u16, u32), LayerError> {
    if data.len() != HEADER_SIZE as usize {
        return Err(invalid_encoding(format!(
            "AOL header must be 16 bytes, got {}",
            data.len()
        )));
    }
    if data[0..4] != MAGIC {
        return Err(invalid_encoding("AOL header magic mismatch"));
    }
    if data[4] != HEADER_VERSION {
        return Err(invalid_encoding(format!(
            "unsupported AOL header version {}",
            data[4]
        )));
    }
    let flags = u16::from_le_bytes(data[6..8].try_into().unwrap());
    let meta_size = u32::from_le_bytes(data[8..12].try_into().unwrap());
    let stored_checksum = u32::from_le_bytes(data[12..16].try_into().unwrap());
    if stored_checksum != crc32::crc32(&data[0..12]) {
        return Err(invalid_encoding("AOL header checksum mismatch"));
    }
    Ok((flags, meta_size))
}

fn invalid_encoding(msg: impl Into<String>) -> LayerError {
    LayerError::Core(CoreError::InvalidEncoding(msg.into()))
}

fn encode_pair(key: &Key, value: &Value) -> Vec<u8> {
    let key_bytes = key.to_bytes();
    let value_bytes = value.to_bytes();
    let size = 1 + key_bytes.len() + value_bytes.len();

    let mut buf = Vec::with_capacity(4 + size + 2);
    buf.extend_from_slice(&(size as u32).to_le_bytes());
    buf.push(key.ktype().ordinal());
    buf.extend_from_slice(&key_bytes);
    buf.extend_from_slice(&value_bytes);
    buf.extend_from_slice(&[0u8, 0u8]);
    buf
}

/// Decodes one `Pair` starting at `data[offset..]`. Returns the pair and
/// the number of bytes consumed.
fn decode_pair_at(data: &[u8], offset: usize) -> Result<(Key, Value, usize), LayerError> {
    if data.len() < offset + 4 {
        return Err(invalid_encoding("truncated AOL record size field"));
    }
    let size = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
    let start = offset + 4;
    if size < 1 || data.len() < start + size + 2 {
        return Err(invalid_encoding("truncated AOL record body"));
    }

    let ktype = KeyType::from_ordinal(data[start])?;
    let width = ktype.width();
    if size < 1 + width {
        return Err(invalid_encoding("AOL record too short for its key width"));
    }

    let key = Key::from_bytes(&data[start + 1..start + 1 + width])?;
    let value = Value::from_bytes(&data[start + 1 + width..start + size])?;

    Ok((key, value, 4 + size + 2))
}

/// The append-only-log file layer. The file handle is opened lazily and
/// held until [`Layer::unlink`] or [`AolFileLayer::close`].
#[derive(Debug)]
pub struct AolFileLayer {
    url: String,
    path: PathBuf,
    file: RefCell<Option<File>>,
    text_offset: u64,
    threshold: Option<usize>,
    /// When set, every write is followed by `File::sync_data`. Resolves
    /// the durability open question in favor of an explicit opt-in rather
    /// than a silent default.
    pub sync_on_write: bool,
    live_keys: HashSet<Key>,
    /// Every key ever written, live or tombstoned. Grounded on
    /// `original_source`'s `AOLFileLayer.__contains__`, which delegates to
    /// `query()` and is `True` as long as *any* pair for the key exists in
    /// the log — a tombstoned key is still "in" the layer, so an unforced
    /// re-insert after a delete must still raise `DuplicateKey`.
    seen_keys: HashSet<Key>,
    total_count: usize,
}

impl AolFileLayer {
    /// Opens (creating if absent) the AOL file at `url`'s path, validating
    /// or writing a fresh header, then scanning existing records to seed
    /// the live-key set and row count.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Io`] on filesystem failures and
    /// [`LayerError::Core`] (`InvalidEncoding`) if an existing header is
    /// corrupt.
    pub fn open(url: &LayerUrl, threshold: Option<usize>) -> Result<Self, LayerError> {
        let path = PathBuf::from(url.file_path());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let meta_size = if len == 0 {
            info!(path = %path.display(), "initializing new AOL file");
            let header = encode_header(0, 0);
            file.write_all(&header)?;
            file.flush()?;
            0
        } else {
            let mut header_buf = [0u8; HEADER_SIZE as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut header_buf)?;
            let (_flags, meta_size) = decode_header(&header_buf)?;
            meta_size
        };

        let text_offset = align_up(HEADER_SIZE + u64::from(meta_size), TEXT_ALIGNMENT);

        let mut layer = AolFileLayer {
            url: format!("aol://{}", url.file_path()),
            path,
            file: RefCell::new(Some(file)),
            text_offset,
            threshold,
            sync_on_write: false,
            live_keys: HashSet::new(),
            seen_keys: HashSet::new(),
            total_count: 0,
        };
        layer.rebuild_index()?;
        Ok(layer)
    }

    fn rebuild_index(&mut self) -> Result<(), LayerError> {
        let pairs = self.read_all_pairs()?;
        self.total_count = pairs.len();
        self.live_keys.clear();
        self.seen_keys.clear();
        for (key, value) in pairs {
            self.seen_keys.insert(key.clone());
            if value.is_tombstone() {
                self.live_keys.remove(&key);
            } else {
                self.live_keys.insert(key);
            }
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), LayerError> {
        if self.file.borrow().is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        *self.file.borrow_mut() = Some(file);
        Ok(())
    }

    fn read_all_pairs(&self) -> Result<Vec<(Key, Value)>, LayerError> {
        self.ensure_open()?;
        let mut file_ref = self.file.borrow_mut();
        let file = file_ref.as_mut().expect("ensure_open just set this");

        file.seek(SeekFrom::Start(self.text_offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        drop(file_ref);

        let mut pairs = Vec::new();
        let mut offset = 0usize;
        while offset < buf.len() {
            let (key, value, consumed) = decode_pair_at(&buf, offset)?;
            pairs.push((key, value));
            offset += consumed;
        }
        Ok(pairs)
    }

    fn append_pair(&self, key: &Key, value: &Value) -> Result<(), LayerError> {
        self.ensure_open()?;
        let bytes = encode_pair(key, value);

        let mut file_ref = self.file.borrow_mut();
        let file = file_ref.as_mut().expect("ensure_open just set this");

        let end = file.seek(SeekFrom::End(0))?;
        let target = end.max(self.text_offset);
        file.seek(SeekFrom::Start(target))?;
        file.write_all(&bytes)?;
        file.flush()?;
        if self.sync_on_write {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Closes the file descriptor without deleting the backing file.
    pub fn close(&self) {
        self.file.borrow_mut().take();
    }
}

impl Layer for AolFileLayer {
    fn url(&self) -> &str {
        &self.url
    }

    fn insert(&mut self, data: Data, force: bool) -> Result<UniqueID, LayerError> {
        let key = data.primary_key().clone();
        debug!(?key, force, "aol layer insert");

        if self.seen_keys.contains(&key) && !force {
            return Err(LayerError::DuplicateKey);
        }
        if !self.seen_keys.contains(&key) && self.is_full() {
            return Err(LayerError::Threshold);
        }

        let value = if data.is_deleted() {
            Value::tombstone()
        } else {
            data.value().cloned().unwrap_or_else(Value::nil)
        };

        self.append_pair(&key, &value)?;
        self.total_count += 1;
        self.seen_keys.insert(key.clone());
        if data.is_deleted() {
            self.live_keys.remove(&key);
        } else {
            self.live_keys.insert(key);
        }

        Ok(UniqueID::generate())
    }

    fn delete(&mut self, key: &Key) -> Result<UniqueID, LayerError> {
        debug!(?key, "aol layer delete");
        self.append_pair(key, &Value::tombstone())?;
        self.total_count += 1;
        self.seen_keys.insert(key.clone());
        self.live_keys.remove(key);
        Ok(UniqueID::generate())
    }

    fn latest(&self, key: &Key) -> Result<Option<Data>, LayerError> {
        let pairs = self.read_all_pairs()?;
        for (k, v) in pairs.iter().rev() {
            if k == key {
                return Ok(if v.is_tombstone() {
                    None
                } else {
                    Some(Data::new(key.clone(), v.clone(), BTreeMap::new()))
                });
            }
        }
        Ok(None)
    }

    fn revisions(&self, key: &Key) -> Result<Vec<Data>, LayerError> {
        let pairs = self.read_all_pairs()?;
        let mut out: Vec<Data> = pairs
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| {
                if v.is_tombstone() {
                    Data::tombstone(key.clone())
                } else {
                    Data::new(key.clone(), v, BTreeMap::new())
                }
            })
            .collect();
        out.reverse();
        Ok(out)
    }

    fn search(&self, _name: &str, _value: &Key) -> Result<BTreeSet<Key>, LayerError> {
        // The AOL wire format has no room for tags (spec §6's Pair layout
        // is ktype + key + value only), so this layer never contributes
        // any matches rather than failing the lookup outright.
        Ok(BTreeSet::new())
    }

    fn raw(&self, _uid: UniqueID) -> Result<Option<Data>, LayerError> {
        // The AOL record format never persists a UniqueID (§6), so a
        // revision cannot be looked up by one after the fact.
        Err(LayerError::Unsupported(
            "AolFileLayer does not index records by UniqueID".to_string(),
        ))
    }

    fn contains(&self, key: &Key) -> Result<bool, LayerError> {
        Ok(self.live_keys.contains(key))
    }

    fn len(&self) -> usize {
        self.live_keys.len()
    }

    fn cap(&self) -> usize {
        self.total_count
    }

    fn is_full(&self) -> bool {
        self.threshold.is_some_and(|t| self.total_count >= t)
    }

    fn purge(&mut self) -> Result<(), LayerError> {
        Err(LayerError::Unsupported(
            "AolFileLayer cannot compact an append-only file in place".to_string(),
        ))
    }

    fn iterate(
        &self,
        desc: bool,
        based: Option<&Key>,
    ) -> Result<Vec<(Key, Value)>, LayerError> {
        if based.is_some() {
            return Err(LayerError::Unsupported(
                "AolFileLayer does not support resuming an iteration".to_string(),
            ));
        }

        let mut pairs = self.read_all_pairs()?;
        pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
        if desc {
            pairs.reverse();
        }
        Ok(pairs)
    }

    fn unlink(&mut self) -> Result<(), LayerError> {
        self.close();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.live_keys.clear();
        self.seen_keys.clear();
        self.total_count = 0;
        Ok(())
    }
}
