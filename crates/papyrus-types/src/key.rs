//! Typed, fixed-width, comparable keys.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::error::CoreError;

/// The six fixed-width key categories, ordered `BOOL < WORD < INT < UID <
/// STR < TEXT`. The derived variant order *is* the tag order used for
/// widening comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    Bool,
    Word,
    Int,
    Uid,
    Str,
    Text,
}

impl KeyType {
    /// Serialized width in bytes for this category.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            KeyType::Bool => 1,
            KeyType::Word => 2,
            KeyType::Int => 8,
            KeyType::Uid => 16,
            KeyType::Str => 64,
            KeyType::Text => 256,
        }
    }

    /// Maps a serialized width back to the unique `KeyType` it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEncoding`] for any width outside
    /// `{1, 2, 8, 16, 64, 256}`.
    pub fn from_width(width: usize) -> Result<Self, CoreError> {
        match width {
            1 => Ok(KeyType::Bool),
            2 => Ok(KeyType::Word),
            8 => Ok(KeyType::Int),
            16 => Ok(KeyType::Uid),
            64 => Ok(KeyType::Str),
            256 => Ok(KeyType::Text),
            other => Err(CoreError::InvalidEncoding(format!(
                "no KeyType has width {other}"
            ))),
        }
    }

    /// The numeric ordinal used to order `KeyType`s and to tag on-disk
    /// records (`AolFileLayer`'s record header).
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEncoding`] for any ordinal `>= 6`.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, CoreError> {
        match ordinal {
            0 => Ok(KeyType::Bool),
            1 => Ok(KeyType::Word),
            2 => Ok(KeyType::Int),
            3 => Ok(KeyType::Uid),
            4 => Ok(KeyType::Str),
            5 => Ok(KeyType::Text),
            other => Err(CoreError::InvalidEncoding(format!(
                "no KeyType has ordinal {other}"
            ))),
        }
    }

    /// `detect` picks the narrowest category admitting an integer value.
    /// Negative or out-of-128-bit-range values have no category.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `value` fits no category
    /// (negative values wider than `INT`, or `>= 2^128`).
    pub fn detect_int(value: i128) -> Result<Self, CoreError> {
        if i128::from(i16::MIN) <= value && value <= i128::from(i16::MAX) {
            Ok(KeyType::Word)
        } else if i128::from(i64::MIN) <= value && value <= i128::from(i64::MAX) {
            Ok(KeyType::Int)
        } else if value >= 0 {
            // Any non-negative i128 fits in a u128, so it is within UID's
            // unsigned 128-bit domain.
            Ok(KeyType::Uid)
        } else {
            Err(CoreError::InvalidArgument(format!(
                "{value} fits no integer KeyType"
            )))
        }
    }

    /// `detect` for strings: `STR` below 64 bytes, `TEXT` below 256.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `value` is 256 bytes or
    /// longer.
    pub fn detect_str(value: &str) -> Result<Self, CoreError> {
        if value.len() < KeyType::Str.width() {
            Ok(KeyType::Str)
        } else if value.len() < KeyType::Text.width() {
            Ok(KeyType::Text)
        } else {
            Err(CoreError::InvalidArgument(format!(
                "string of length {} exceeds TEXT's 256-byte domain",
                value.len()
            )))
        }
    }
}

/// The semantic value carried by a [`Key`], tagged by its [`KeyType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Bool(bool),
    Word(i16),
    Int(i64),
    Uid(u128),
    Str(String),
    Text(String),
}

/// A typed, fixed-width, comparable, serializable key.
#[derive(Debug, Clone, Eq)]
pub struct Key {
    ktype: KeyType,
    value: KeyValue,
}

impl Key {
    /// Pins a boolean key; always `KeyType::Bool`.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        Key {
            ktype: KeyType::Bool,
            value: KeyValue::Bool(value),
        }
    }

    /// Detects the narrowest integer `KeyType` for `value` and builds a
    /// `Key` pinned to it.
    ///
    /// # Errors
    ///
    /// See [`KeyType::detect_int`].
    pub fn from_int(value: i128) -> Result<Self, CoreError> {
        let ktype = KeyType::detect_int(value)?;
        Self::new_int(value, ktype)
    }

    /// Builds an integer key pinned to an explicit `ktype`, validating that
    /// `value` lies in that ktype's domain.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `value` is out of range for
    /// `ktype`, or if `ktype` is not an integer category.
    pub fn new_int(value: i128, ktype: KeyType) -> Result<Self, CoreError> {
        let kv = match ktype {
            KeyType::Word => {
                let v = i16::try_from(value).map_err(|_| {
                    CoreError::InvalidArgument(format!("{value} out of range for WORD"))
                })?;
                KeyValue::Word(v)
            }
            KeyType::Int => {
                let v = i64::try_from(value).map_err(|_| {
                    CoreError::InvalidArgument(format!("{value} out of range for INT"))
                })?;
                KeyValue::Int(v)
            }
            KeyType::Uid => {
                let v = u128::try_from(value).map_err(|_| {
                    CoreError::InvalidArgument(format!("{value} out of range for UID"))
                })?;
                KeyValue::Uid(v)
            }
            KeyType::Bool => KeyValue::Bool(value != 0),
            _ => {
                return Err(CoreError::InvalidArgument(format!(
                    "{ktype:?} is not an integer category"
                )))
            }
        };
        Ok(Key { ktype, value: kv })
    }

    /// Detects `STR` or `TEXT` for `value` and builds a `Key` pinned to it.
    ///
    /// # Errors
    ///
    /// See [`KeyType::detect_str`].
    pub fn from_str_value(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let ktype = KeyType::detect_str(&value)?;
        Self::new_str(value, ktype)
    }

    /// Builds a string key pinned to an explicit `ktype` (`STR` or `TEXT`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `value` does not fit
    /// `ktype`'s domain, or if `ktype` is not a string category.
    pub fn new_str(value: String, ktype: KeyType) -> Result<Self, CoreError> {
        let limit = match ktype {
            KeyType::Str | KeyType::Text => ktype.width(),
            _ => {
                return Err(CoreError::InvalidArgument(format!(
                    "{ktype:?} is not a string category"
                )))
            }
        };
        if value.len() >= limit {
            return Err(CoreError::InvalidArgument(format!(
                "string of length {} does not fit {ktype:?}",
                value.len()
            )));
        }
        let kv = if ktype == KeyType::Str {
            KeyValue::Str(value)
        } else {
            KeyValue::Text(value)
        };
        Ok(Key { ktype, value: kv })
    }

    #[must_use]
    pub fn ktype(&self) -> KeyType {
        self.ktype
    }

    #[must_use]
    pub fn value(&self) -> &KeyValue {
        &self.value
    }

    /// Numeric form of this key's value, for integer and boolean
    /// categories. `None` for `STR`/`TEXT`.
    ///
    /// UID values above `i128::MAX` (the top half of UID's unsigned
    /// 128-bit domain) saturate to `i128::MAX` here. This is only safe to
    /// use for comparisons where neither side is `UID`-typed — `Ord`/`Eq`
    /// go through [`Key::as_uid`] instead once the widest ktype is `UID`,
    /// since saturation would collapse every key above `i128::MAX` into a
    /// single equivalence class.
    #[must_use]
    pub fn as_numeric(&self) -> Option<i128> {
        match &self.value {
            KeyValue::Bool(b) => Some(i128::from(*b as u8)),
            KeyValue::Word(v) => Some(i128::from(*v)),
            KeyValue::Int(v) => Some(i128::from(*v)),
            KeyValue::Uid(v) => Some(i128::try_from(*v).unwrap_or(i128::MAX)),
            KeyValue::Str(_) | KeyValue::Text(_) => None,
        }
    }

    /// The exact `u128` value for a `UID`-typed key. `None` for every other
    /// category. Used instead of [`Key::as_numeric`] when comparing two
    /// keys widened to `UID`, so values above `i128::MAX` stay distinct
    /// rather than saturating.
    #[must_use]
    pub fn as_uid(&self) -> Option<u128> {
        match &self.value {
            KeyValue::Uid(v) => Some(*v),
            _ => None,
        }
    }

    /// String form of this key's value. Booleans cast through their
    /// integer form (`"0"`/`"1"`), per the widening-cast rule.
    #[must_use]
    pub fn as_string(&self) -> String {
        match &self.value {
            KeyValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            KeyValue::Word(v) => v.to_string(),
            KeyValue::Int(v) => v.to_string(),
            KeyValue::Uid(v) => v.to_string(),
            KeyValue::Str(s) | KeyValue::Text(s) => s.clone(),
        }
    }

    /// Returns a new `Key` with the same semantic value cast to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the value cannot be
    /// represented in `target`'s domain (e.g. casting `TEXT` down to a
    /// too-narrow `STR`, or a string down to a numeric category).
    pub fn cast(&self, target: KeyType) -> Result<Key, CoreError> {
        if target == self.ktype {
            return Ok(self.clone());
        }

        match target {
            KeyType::Str | KeyType::Text => Self::new_str(self.as_string(), target),
            _ => match self.as_numeric() {
                Some(n) => Self::new_int(n, target),
                None => Err(CoreError::InvalidArgument(format!(
                    "cannot cast {:?} down to {target:?}",
                    self.ktype
                ))),
            },
        }
    }

    /// Serializes this key to exactly `ktype.width()` bytes, big-endian for
    /// integers, NUL-padded UTF-8 for strings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.value {
            KeyValue::Bool(b) => vec![u8::from(*b)],
            KeyValue::Word(v) => v.to_be_bytes().to_vec(),
            KeyValue::Int(v) => v.to_be_bytes().to_vec(),
            KeyValue::Uid(v) => v.to_be_bytes().to_vec(),
            KeyValue::Str(s) | KeyValue::Text(s) => {
                let mut buf = vec![0u8; self.ktype.width()];
                buf[..s.len()].copy_from_slice(s.as_bytes());
                buf
            }
        }
    }

    /// Decodes a key from its serialized bytes. The byte length uniquely
    /// determines the `KeyType`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEncoding`] if `data`'s length is not one
    /// of `{1, 2, 8, 16, 64, 256}`, or (for strings) if the non-NUL prefix
    /// is not valid UTF-8.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let ktype = KeyType::from_width(data.len())?;
        let kv = match ktype {
            KeyType::Bool => KeyValue::Bool(data[0] != 0),
            KeyType::Word => KeyValue::Word(i16::from_be_bytes(data.try_into().unwrap())),
            KeyType::Int => KeyValue::Int(i64::from_be_bytes(data.try_into().unwrap())),
            KeyType::Uid => KeyValue::Uid(u128::from_be_bytes(data.try_into().unwrap())),
            KeyType::Str | KeyType::Text => {
                let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                let text = std::str::from_utf8(&data[..end])
                    .map_err(|e| CoreError::InvalidEncoding(format!("key bytes not utf-8: {e}")))?
                    .to_string();
                if ktype == KeyType::Str {
                    KeyValue::Str(text)
                } else {
                    KeyValue::Text(text)
                }
            }
        };
        Ok(Key { ktype, value: kv })
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        let widest = self.ktype.max(other.ktype);
        let lhs = self.cast(widest).expect("widening cast never fails");
        let rhs = other.cast(widest).expect("widening cast never fails");

        match widest {
            KeyType::Str | KeyType::Text => lhs.as_string().cmp(&rhs.as_string()),
            // UID's domain is the full unsigned 128-bit range, so this must
            // compare on `u128` rather than `as_numeric`'s saturating i128:
            // two distinct UIDs above `i128::MAX` would otherwise both
            // saturate to `i128::MAX` and compare Equal.
            KeyType::Uid => lhs
                .as_uid()
                .expect("cast to UID produces KeyValue::Uid")
                .cmp(&rhs.as_uid().expect("cast to UID produces KeyValue::Uid")),
            _ => lhs
                .as_numeric()
                .expect("numeric ktype")
                .cmp(&rhs.as_numeric().expect("numeric ktype")),
        }
    }
}

impl Hash for Key {
    /// Hashes `(ktype, serialized bytes)`: two keys that compare equal
    /// after a cross-ktype widening cast are *not* guaranteed to hash
    /// equal, since hashing never widens.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ktype.hash(state);
        self.to_bytes().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_matches_spec_examples() {
        assert_eq!(KeyType::detect_int(-256).unwrap(), KeyType::Word);
        assert_eq!(KeyType::detect_int(32768).unwrap(), KeyType::Int);
        assert_eq!(KeyType::detect_int(1i128 << 63).unwrap(), KeyType::Uid);
        assert_eq!(KeyType::detect_str(&"a".repeat(63)).unwrap(), KeyType::Str);
        assert_eq!(
            KeyType::detect_str(&"a".repeat(255)).unwrap(),
            KeyType::Text
        );
    }

    #[test]
    fn bool_comparison_widens_through_integer_form() {
        assert!(Key::from_bool(false) < Key::from_bool(true));
    }

    #[test]
    fn same_value_different_ktype_compares_equal() {
        let word = Key::new_int(1, KeyType::Word).unwrap();
        let int = Key::new_int(1, KeyType::Int).unwrap();
        assert_eq!(word, int);
    }

    #[test]
    fn uids_above_i128_max_stay_distinct_and_ordered() {
        // Both values live in UID's upper half (> i128::MAX), which
        // `as_numeric` alone would saturate to the same i128::MAX.
        let high = Key::from_bytes(&(u128::MAX).to_be_bytes()).unwrap();
        let higher_but_still_over = Key::from_bytes(&(u128::MAX - 1).to_be_bytes()).unwrap();

        assert_ne!(high, higher_but_still_over);
        assert!(high > higher_but_still_over);

        // Eq/Hash must agree: two UIDs that compare unequal must not
        // collide into the same logical key for HashMap-backed indices.
        use std::collections::hash_map::DefaultHasher;
        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        high.hash(&mut h1);
        higher_but_still_over.hash(&mut h2);
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn round_trip_str() {
        let key = Key::from_str_value("abc").unwrap();
        let bytes = key.to_bytes();
        assert_eq!(bytes.len(), 64);
        assert!(bytes[3..].iter().all(|&b| b == 0));
        assert_eq!(Key::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn round_trip_int_family() {
        for (value, ktype) in [
            (-256i128, KeyType::Word),
            (32768, KeyType::Int),
            (1i128 << 63, KeyType::Uid),
        ] {
            let key = Key::new_int(value, ktype).unwrap();
            assert_eq!(Key::from_bytes(&key.to_bytes()).unwrap(), key);
        }
    }

    #[test]
    fn from_bytes_rejects_ambiguous_length() {
        assert!(matches!(
            Key::from_bytes(&[0u8; 3]),
            Err(CoreError::InvalidEncoding(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn round_trip_word(value: i16) {
            let key = Key::new_int(i128::from(value), KeyType::Word).unwrap();
            proptest::prop_assert_eq!(Key::from_bytes(&key.to_bytes()).unwrap(), key);
        }

        #[test]
        fn round_trip_int(value: i64) {
            let key = Key::new_int(i128::from(value), KeyType::Int).unwrap();
            proptest::prop_assert_eq!(Key::from_bytes(&key.to_bytes()).unwrap(), key);
        }

        #[test]
        fn round_trip_uid(value in 0u128..=(i128::MAX as u128)) {
            let key = Key::new_int(value as i128, KeyType::Uid).unwrap();
            proptest::prop_assert_eq!(Key::from_bytes(&key.to_bytes()).unwrap(), key);
        }

        #[test]
        fn round_trip_str(value in "[a-zA-Z0-9]{0,63}") {
            let key = Key::from_str_value(value).unwrap();
            proptest::prop_assert_eq!(Key::from_bytes(&key.to_bytes()).unwrap(), key);
        }

        #[test]
        fn ordering_within_ktype_matches_semantic_value(a: i64, b: i64) {
            let ka = Key::new_int(i128::from(a), KeyType::Int).unwrap();
            let kb = Key::new_int(i128::from(b), KeyType::Int).unwrap();
            proptest::prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
        }
    }
}
