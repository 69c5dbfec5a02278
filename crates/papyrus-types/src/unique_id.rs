//! 128-bit time-ordered unique identifier.
//!
//! Layout, big-endian: `[48-bit timestamp_ms | 8-bit process_id | 8-bit
//! cluster_id | 64-bit randomness]`. Sorting by the raw 128-bit integer
//! gives a total, (mostly) monotonic order across revisions.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use papyrus_codec::crockford;
use rand::Rng;

use crate::error::CoreError;

const TIMESTAMP_BITS: u32 = 48;
const TIMESTAMP_MAX: u64 = (1u64 << TIMESTAMP_BITS) - 1;
const TEXT_WIDTH: usize = 26;

/// A 128-bit time-ordered identifier, used as the physical identity of a
/// revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueID(u128);

impl UniqueID {
    /// The smallest possible id: all zero bits.
    pub const MIN: UniqueID = UniqueID(0);

    /// The largest possible id: all one bits.
    pub const MAX: UniqueID = UniqueID(u128::MAX);

    /// Builds an id from its four components, defaulting any `None` field:
    /// `timestamp_ms` to the current wall-clock time, `cluster_id` and
    /// `randomness` to fresh random values, `process_id` to `pid mod 256`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `timestamp_ms` does not fit
    /// in 48 bits.
    pub fn new(
        timestamp_ms: Option<u64>,
        cluster_id: Option<u8>,
        process_id: Option<u8>,
        randomness: Option<u64>,
    ) -> Result<Self, CoreError> {
        let timestamp_ms = timestamp_ms.unwrap_or_else(now_ms);
        if timestamp_ms > TIMESTAMP_MAX {
            return Err(CoreError::InvalidArgument(format!(
                "timestamp_ms {timestamp_ms} exceeds 48-bit range"
            )));
        }

        let cluster_id = cluster_id.unwrap_or_else(|| rand::thread_rng().gen());
        let process_id = process_id.unwrap_or_else(|| (std::process::id() % 256) as u8);
        let randomness = randomness.unwrap_or_else(|| rand::thread_rng().gen());

        let value = (u128::from(timestamp_ms) << 80)
            | (u128::from(process_id) << 72)
            | (u128::from(cluster_id) << 64)
            | u128::from(randomness);

        Ok(UniqueID(value))
    }

    /// Generates a fresh id using defaults for every field. Infallible: the
    /// current timestamp always fits in 48 bits until the year 10889.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(None, None, None, None).expect("current timestamp fits in 48 bits")
    }

    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        ((self.0 >> 80) & u128::from(TIMESTAMP_MAX)) as u64
    }

    #[must_use]
    pub fn process_id(&self) -> u8 {
        ((self.0 >> 72) & 0xFF) as u8
    }

    #[must_use]
    pub fn cluster_id(&self) -> u8 {
        ((self.0 >> 64) & 0xFF) as u8
    }

    #[must_use]
    pub fn randomness(&self) -> u64 {
        (self.0 & u128::from(u64::MAX)) as u64
    }

    #[must_use]
    pub fn as_u128(&self) -> u128 {
        self.0
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEncoding`] unless `data` is exactly 16
    /// bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let array: [u8; 16] = data.try_into().map_err(|_| {
            CoreError::InvalidEncoding(format!("UniqueID requires 16 bytes, got {}", data.len()))
        })?;
        Ok(UniqueID(u128::from_be_bytes(array)))
    }
}

impl fmt::Display for UniqueID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crockford::encode(self.0, TEXT_WIDTH))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
