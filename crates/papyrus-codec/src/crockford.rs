//! Crockford Base32 encoding, used for `UniqueID`'s human-readable text form.
//!
//! Encodes an unsigned integer by emitting its least-significant 5-bit
//! groups, reversing, and left-padding with `'0'` to a requested width.
//! Decoding is case-insensitive on input; encoding always emits uppercase.

use crate::CodecError;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Encodes `value` as Crockford Base32, left-padded with `'0'` to `width`
/// characters. `width` is assumed large enough to hold `value`; the caller
/// (`UniqueID`, fixed at 26 characters for 128 bits) guarantees this.
#[must_use]
pub fn encode(value: u128, width: usize) -> String {
    let mut chars = Vec::with_capacity(width);
    let mut remaining = value;

    if remaining == 0 {
        chars.push(ALPHABET[0] as char);
    } else {
        while remaining > 0 {
            let index = (remaining & 0x1F) as usize;
            chars.push(ALPHABET[index] as char);
            remaining >>= 5;
        }
    }

    while chars.len() < width {
        chars.push('0');
    }

    chars.reverse();
    chars.into_iter().collect()
}

/// Decodes a Crockford Base32 string back into its unsigned integer value.
///
/// # Errors
///
/// Returns [`CodecError::InvalidSymbol`] for any character outside the
/// Crockford alphabet, and [`CodecError::Overflow`] if the decoded value
/// does not fit in a `u128`.
pub fn decode(text: &str) -> Result<u128, CodecError> {
    let mut value: u128 = 0;

    for ch in text.chars() {
        let upper = ch.to_ascii_uppercase();
        let digit = ALPHABET
            .iter()
            .position(|&c| c == upper as u8)
            .ok_or(CodecError::InvalidSymbol(ch))?;

        value = value
            .checked_shl(5)
            .ok_or(CodecError::Overflow)?
            .checked_add(digit as u128)
            .ok_or(CodecError::Overflow)?;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pads_to_width() {
        assert_eq!(encode(0, 26), "0".repeat(26));
    }

    #[test]
    fn max_u128_is_7_then_25_zs() {
        let expected = format!("7{}", "Z".repeat(25));
        assert_eq!(encode(u128::MAX, 26), expected);
    }

    #[test]
    fn round_trip() {
        for value in [0u128, 1, 255, 65535, 1 << 100, u128::MAX] {
            let text = encode(value, 26);
            assert_eq!(decode(&text).unwrap(), value);
        }
    }

    #[test]
    fn decode_is_case_insensitive() {
        let upper = encode(12345, 26);
        let lower = upper.to_ascii_lowercase();
        assert_eq!(decode(&lower).unwrap(), decode(&upper).unwrap());
    }

    #[test]
    fn rejects_invalid_symbol() {
        assert!(matches!(decode("!!!"), Err(CodecError::InvalidSymbol('!'))));
    }

    proptest::proptest! {
        #[test]
        fn round_trip_any_u128(value: u128) {
            let text = encode(value, 26);
            proptest::prop_assert_eq!(text.len(), 26);
            proptest::prop_assert_eq!(decode(&text).unwrap(), value);
        }

        #[test]
        fn encoding_is_always_uppercase(value: u128) {
            let text = encode(value, 26);
            proptest::prop_assert_eq!(&text, &text.to_ascii_uppercase());
        }
    }
}
