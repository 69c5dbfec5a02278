//! Variable-length payload with optional zlib compression and an
//! Adler-32-checked wire format.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use papyrus_codec::adler32;

use crate::error::CoreError;

/// Threshold above which a `RAW` value is auto-upgraded to `CMP`.
const AUTO_COMPRESS_THRESHOLD: usize = 1 << 24;

/// Records are padded, NUL and checksum included, to a multiple of this
/// many bytes. This is `Value`'s own wire-format padding, unrelated to
/// `aol_layer`'s separate 512-byte `TEXT_ALIGNMENT`, which aligns the AOL
/// file's record region, not individual `Value` payloads.
const ALIGNMENT: usize = 32;

/// The four value shapes: an absent payload, raw bytes, zlib-compressed
/// bytes, and the tombstone sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Nil,
    Raw,
    Cmp,
    Del,
}

impl ValueType {
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            ValueType::Nil => 0,
            ValueType::Raw => 1,
            ValueType::Cmp => 2,
            ValueType::Del => 3,
        }
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEncoding`] for any ordinal `>= 4`.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, CoreError> {
        match ordinal {
            0 => Ok(ValueType::Nil),
            1 => Ok(ValueType::Raw),
            2 => Ok(ValueType::Cmp),
            3 => Ok(ValueType::Del),
            other => Err(CoreError::InvalidEncoding(format!(
                "no ValueType has ordinal {other}"
            ))),
        }
    }
}

/// A value object: `(vtype, raw_bytes?)`. Construction classifies a
/// payload and never mutates afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    vtype: ValueType,
    raw: Option<Vec<u8>>,
}

impl Value {
    /// An absent payload.
    #[must_use]
    pub fn nil() -> Self {
        Value {
            vtype: ValueType::Nil,
            raw: None,
        }
    }

    /// The dedicated tombstone factory: no payload, `vtype = DEL`.
    #[must_use]
    pub fn tombstone() -> Self {
        Value {
            vtype: ValueType::Del,
            raw: None,
        }
    }

    /// Classifies `bytes` as `RAW`, auto-upgrading to `CMP` above
    /// 2^24 bytes.
    #[must_use]
    pub fn raw(bytes: Vec<u8>) -> Self {
        if bytes.len() > AUTO_COMPRESS_THRESHOLD {
            Value {
                vtype: ValueType::Cmp,
                raw: Some(bytes),
            }
        } else {
            Value {
                vtype: ValueType::Raw,
                raw: Some(bytes),
            }
        }
    }

    /// Forces `CMP` regardless of length.
    #[must_use]
    pub fn compressed(bytes: Vec<u8>) -> Self {
        Value {
            vtype: ValueType::Cmp,
            raw: Some(bytes),
        }
    }

    #[must_use]
    pub fn vtype(&self) -> ValueType {
        self.vtype
    }

    #[must_use]
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.vtype == ValueType::Del
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.vtype {
            ValueType::Nil | ValueType::Del => 0,
            ValueType::Raw | ValueType::Cmp => self.raw.as_ref().map_or(0, Vec::len),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes to the wire format (see module docs): a 4-byte header
    /// (`vtype` in the top byte, a 24-bit payload length), the payload
    /// (compressed for `CMP`), NUL padding, and a trailing big-endian
    /// Adler-32 over everything before it. Total length is always a
    /// multiple of 32 bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let declared_len = self.len() as u32;

        let payload = match self.vtype {
            ValueType::Nil | ValueType::Del => Vec::new(),
            ValueType::Raw => self.raw.clone().unwrap_or_default(),
            ValueType::Cmp => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(self.raw.as_deref().unwrap_or(&[]))
                    .expect("writing to an in-memory buffer cannot fail");
                encoder
                    .finish()
                    .expect("zlib encoder finish cannot fail on an in-memory buffer")
            }
        };

        let header = (u32::from(self.vtype.ordinal()) << 24) | (declared_len & 0x00FF_FFFF);
        let mut buf = header.to_be_bytes().to_vec();
        buf.extend_from_slice(&payload);

        let unpadded_len = buf.len() + 4; // + trailing checksum
        let pad = (ALIGNMENT - unpadded_len % ALIGNMENT) % ALIGNMENT;
        buf.extend(std::iter::repeat(0u8).take(pad));

        let checksum = adler32::adler32(&buf);
        buf.extend_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Decodes a value from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEncoding`] if the buffer is shorter than
    /// 32 bytes, the trailing Adler-32 does not match, the vtype ordinal is
    /// unknown, a `RAW` payload is shorter than its declared length, or a
    /// `CMP` payload fails to inflate or inflates to an unexpected length.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() < ALIGNMENT {
            return Err(CoreError::InvalidEncoding(format!(
                "value record shorter than {ALIGNMENT} bytes: {}",
                data.len()
            )));
        }

        let (body, checksum_bytes) = data.split_at(data.len() - 4);
        let checksum = u32::from_be_bytes(checksum_bytes.try_into().unwrap());
        let computed = adler32::adler32(body);
        if checksum != computed {
            return Err(CoreError::InvalidEncoding(format!(
                "value checksum mismatch: stored {checksum:#010x}, computed {computed:#010x}"
            )));
        }

        let header = u32::from_be_bytes(body[0..4].try_into().unwrap());
        let vtype = ValueType::from_ordinal((header >> 24) as u8)?;
        let declared_len = (header & 0x00FF_FFFF) as usize;
        let region = &body[4..];

        match vtype {
            ValueType::Nil => Ok(Value::nil()),
            ValueType::Del => Ok(Value::tombstone()),
            ValueType::Raw => {
                if region.len() < declared_len {
                    return Err(CoreError::InvalidEncoding(
                        "RAW payload shorter than declared length".to_string(),
                    ));
                }
                Ok(Value {
                    vtype,
                    raw: Some(region[..declared_len].to_vec()),
                })
            }
            ValueType::Cmp => {
                let mut decoder = ZlibDecoder::new(region);
                let mut inflated = Vec::new();
                decoder.read_to_end(&mut inflated).map_err(|e| {
                    CoreError::InvalidEncoding(format!("zlib inflate failed: {e}"))
                })?;
                if inflated.len() != declared_len {
                    return Err(CoreError::InvalidEncoding(format!(
                        "inflated length {} does not match declared {declared_len}",
                        inflated.len()
                    )));
                }
                Ok(Value {
                    vtype,
                    raw: Some(inflated),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_raw_round_trips_to_32_bytes() {
        let value = Value::raw(Vec::new());
        let bytes = value.to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(Value::from_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn nil_and_del_round_trip() {
        for value in [Value::nil(), Value::tombstone()] {
            let bytes = value.to_bytes();
            assert_eq!(bytes.len(), 32);
            assert_eq!(Value::from_bytes(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn raw_round_trips() {
        let value = Value::raw(b"hello world".to_vec());
        let bytes = value.to_bytes();
        assert_eq!(bytes.len() % 32, 0);
        assert_eq!(Value::from_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn compressed_round_trips_and_stays_cmp() {
        let payload = "repeat ".repeat(500).into_bytes();
        let value = Value::compressed(payload.clone());
        let decoded = Value::from_bytes(&value.to_bytes()).unwrap();
        assert_eq!(decoded.vtype(), ValueType::Cmp);
        assert_eq!(decoded.raw_bytes(), Some(payload.as_slice()));
    }

    #[test]
    fn large_raw_auto_upgrades_to_cmp() {
        let value = Value::raw(vec![0u8; AUTO_COMPRESS_THRESHOLD + 1]);
        assert_eq!(value.vtype(), ValueType::Cmp);
    }

    #[test]
    fn corrupted_checksum_fails_decode() {
        let mut bytes = Value::raw(b"hi".to_vec()).to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Value::from_bytes(&bytes),
            Err(CoreError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn too_short_buffer_fails_decode() {
        assert!(matches!(
            Value::from_bytes(&[0u8; 10]),
            Err(CoreError::InvalidEncoding(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn raw_round_trips_any_bytes(bytes: Vec<u8>) {
            let value = Value::raw(bytes);
            let decoded = Value::from_bytes(&value.to_bytes()).unwrap();
            proptest::prop_assert_eq!(decoded, value);
        }

        #[test]
        fn compressed_round_trips_any_bytes(bytes: Vec<u8>) {
            let value = Value::compressed(bytes);
            let decoded = Value::from_bytes(&value.to_bytes()).unwrap();
            proptest::prop_assert_eq!(decoded, value);
        }

        #[test]
        fn wire_length_always_multiple_of_32(bytes: Vec<u8>) {
            let value = Value::raw(bytes);
            proptest::prop_assert_eq!(value.to_bytes().len() % 32, 0);
        }
    }
}
