//! Stop-bit variable-length integer encoding.
//!
//! Each byte carries 7 value bits little-endian; the high bit is a
//! continuation flag (set on every byte but the last). Signed values use
//! zigzag mapping: `0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...`.

use crate::error::{Error, Result};

const MAX_BYTES: u32 = 10;

/// Reads an unsigned stop-bit integer from `data` starting at `pos`.
///
/// Returns the decoded value and the number of bytes consumed. Fails with
/// [`Error::Truncated`] if `data` ends before a terminating byte is found,
/// or [`Error::Overflow`] if more than 10 bytes elapse without
/// termination.
pub fn read_unsigned(data: &[u8], pos: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        if consumed as u32 >= MAX_BYTES {
            return Err(Error::Overflow);
        }
        let Some(&byte) = data.get(pos + consumed) else {
            return Err(Error::truncated("stop-bit integer"));
        };
        consumed += 1;
        result |= u64::from(byte & 0x7F) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((result, consumed))
}

/// Reads a zigzag-encoded signed stop-bit integer. See [`read_unsigned`]
/// for the failure modes.
pub fn read_signed(data: &[u8], pos: usize) -> Result<(i64, usize)> {
    let (unsigned, consumed) = read_unsigned(data, pos)?;
    Ok((zigzag_decode(unsigned), consumed))
}

/// Decodes a zigzag-mapped unsigned value back to its signed original.
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Encodes a signed value with zigzag mapping.
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Encodes an unsigned integer as stop-bit bytes.
pub fn encode_unsigned(mut n: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    loop {
        let mut byte = (n & 0x7F) as u8;
        n >>= 7;
        if n != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if n == 0 {
            break;
        }
    }
    out
}

/// Encodes a signed integer with zigzag mapping, then stop-bit encodes it.
pub fn encode_signed(n: i64) -> Vec<u8> {
    encode_unsigned(zigzag_encode(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 2)]
    #[case(-1, 1)]
    #[case(-2, 3)]
    #[case(-64, 127)]
    fn zigzag_roundtrips(#[case] signed: i64, #[case] unsigned: u64) {
        assert_eq!(zigzag_encode(signed), unsigned);
        assert_eq!(zigzag_decode(unsigned), signed);
    }

    #[test]
    fn s4_unsigned_300() {
        let bytes = [0xAC, 0x02];
        let (value, consumed) = read_unsigned(&bytes, 0).unwrap();
        assert_eq!(value, 300);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn s4_signed_minus_64() {
        let bytes = [0x7F];
        let (value, consumed) = read_signed(&bytes, 0).unwrap();
        assert_eq!(value, -64);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn truncated_mid_varint() {
        let bytes = [0x80, 0x80];
        let err = read_unsigned(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
    }

    #[test]
    fn overflow_past_ten_bytes() {
        let bytes = [0x80; 11];
        let err = read_unsigned(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::Overflow));
    }

    #[rstest]
    #[case(0u64)]
    #[case(127u64)]
    #[case(128u64)]
    #[case(300u64)]
    #[case(u64::MAX)]
    fn unsigned_roundtrip(#[case] n: u64) {
        let encoded = encode_unsigned(n);
        let (decoded, consumed) = read_unsigned(&encoded, 0).unwrap();
        assert_eq!(decoded, n);
        assert_eq!(consumed, encoded.len());
    }

    #[rstest]
    #[case(0i64)]
    #[case(1i64)]
    #[case(-1i64)]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    fn signed_roundtrip(#[case] n: i64) {
        let encoded = encode_signed(n);
        let (decoded, consumed) = read_signed(&encoded, 0).unwrap();
        assert_eq!(decoded, n);
        assert_eq!(consumed, encoded.len());
    }
}
