//! Variable-length quantity encoding: MIDI file delta-times and meta-event
//! lengths are packed 7 bits per byte, most-significant byte first, with
//! the high bit of every byte but the last set as a continuation marker.

const CONTINUE: u8 = 0b1000_0000;
const MASK_7BIT: u8 = 0b0111_1111;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VlqError {
    #[error("incomplete variable-length quantity: ran out of bytes before a terminator byte")]
    Incomplete,
    #[error("variable-length quantity overflowed 32 bits")]
    Overflow,
}

/// Encodes a single `u32` as a variable-length quantity.
pub fn encode(mut value: u32) -> Vec<u8> {
    let mut groups = vec![(value & u32::from(MASK_7BIT)) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & u32::from(MASK_7BIT)) as u8 | CONTINUE);
        value >>= 7;
    }
    groups.reverse();
    groups
}

/// Decodes one variable-length quantity starting at `bytes[0]`, returning
/// the value and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(u32, usize), VlqError> {
    let mut result: u32 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i == 4 && byte & CONTINUE != 0 {
            return Err(VlqError::Overflow);
        }
        result = result
            .checked_shl(7)
            .ok_or(VlqError::Overflow)?
            | u32::from(byte & MASK_7BIT);
        if byte & CONTINUE == 0 {
            return Ok((result, i + 1));
        }
    }
    Err(VlqError::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_byte() {
        assert_eq!(encode(0x00), vec![0x00]);
        assert_eq!(encode(0x40), vec![0x40]);
        assert_eq!(encode(0x7f), vec![0x7f]);
    }

    #[test]
    fn test_encode_double_byte() {
        assert_eq!(encode(0x80), vec![0x81, 0x00]);
        assert_eq!(encode(0x2000), vec![0xc0, 0x00]);
    }

    #[test]
    fn test_encode_triple_byte() {
        assert_eq!(encode(0x1_00000 - 1), vec![0xbf, 0xff, 0x7f]);
    }

    #[test]
    fn test_decode_matches_encode() {
        for value in [0u32, 1, 127, 128, 16383, 16384, 2_097_151, 2_097_152, 268_435_455] {
            let bytes = encode(value);
            let (decoded, consumed) = decode(&bytes).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_decode_incomplete_errors() {
        assert_eq!(decode(&[0x81]), Err(VlqError::Incomplete));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = encode(100);
        bytes.push(0xAB);
        let (value, consumed) = decode(&bytes).unwrap();
        assert_eq!(value, 100);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_chained_round_trip() {
        let values = [0u32, 3, 127, 128, 300, 1_000_000];
        let mut buf = Vec::new();
        for v in values {
            buf.extend(encode(v));
        }
        let mut cursor = 0;
        for v in values {
            let (decoded, consumed) = decode(&buf[cursor..]).unwrap();
            assert_eq!(decoded, v);
            cursor += consumed;
        }
        assert_eq!(cursor, buf.len());
    }
}
