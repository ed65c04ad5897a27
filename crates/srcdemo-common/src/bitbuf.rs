//! Owned bit runs.

use std::fmt;

use crate::{BitReader, BITS_PER_BYTE};

/// An owned sequence of bits, packed LSB-first into bytes.
///
/// Opaque payloads inside the demo stream are declared in bits, not bytes,
/// so they are kept with their exact bit length. Bits past `bit_len` in the
/// final byte are always zero, which keeps equality meaningful.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BitBuf {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitBuf {
    /// Create an empty bit buffer.
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_len: 0,
        }
    }

    /// Wrap whole bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_len = bytes.len() * BITS_PER_BYTE;
        Self { bytes, bit_len }
    }

    /// Build from packed bytes and an explicit bit length.
    ///
    /// Surplus bytes are dropped and the unused high bits of the last byte
    /// are cleared. A `bit_len` larger than the bytes provide is clamped.
    pub fn from_parts(mut bytes: Vec<u8>, bit_len: usize) -> Self {
        let bit_len = bit_len.min(bytes.len() * BITS_PER_BYTE);
        bytes.truncate(bit_len.div_ceil(BITS_PER_BYTE));
        let tail = bit_len % BITS_PER_BYTE;
        if tail != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        Self { bytes, bit_len }
    }

    /// Number of meaningful bits.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Number of bytes backing the bits.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if there are no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Get the packed bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer, returning the packed bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Open a reader bounded to exactly these bits.
    pub fn reader(&self) -> BitReader<'_> {
        BitReader::with_bit_len(&self.bytes, self.bit_len)
    }

    /// Lowercase hex rendering of the packed bytes.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.bytes.len() * 2);
        for byte in &self.bytes {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl fmt::Debug for BitBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBuf({} bits: {})", self.bit_len, self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_clears_tail() {
        let buf = BitBuf::from_parts(vec![0xFF, 0xFF, 0xFF], 12);
        assert_eq!(buf.bit_len(), 12);
        assert_eq!(buf.as_bytes(), &[0xFF, 0x0F]);
    }

    #[test]
    fn test_from_parts_clamps() {
        let buf = BitBuf::from_parts(vec![0xAB], 40);
        assert_eq!(buf.bit_len(), 8);
    }

    #[test]
    fn test_reader_is_bounded() {
        let buf = BitBuf::from_parts(vec![0b1010_1010], 3);
        let mut reader = buf.reader();
        assert_eq!(reader.remaining_bits(), 3);
        assert_eq!(reader.read_uint(3).unwrap(), 0b010);
        assert!(reader.read_bool().is_err());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(BitBuf::from_bytes(vec![0x01, 0xAB]).to_hex(), "01ab");
    }
}
