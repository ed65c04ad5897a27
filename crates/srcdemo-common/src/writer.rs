//! Bit-granularity writer, the mirror of [`BitReader`](crate::BitReader).

use crate::{BitBuf, Error, Result, BITS_PER_BYTE};

/// An append-only bit writer packing values LSB-first.
///
/// Every read primitive on [`BitReader`](crate::BitReader) has a matching
/// write here, so a decoded component can be encoded back bit for bit.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Create an empty writer.
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            bit_len: 0,
        }
    }

    /// Create an empty writer with room for `bytes` bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Number of bits written so far.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Check if the next write starts on a byte boundary.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.bit_len % BITS_PER_BYTE == 0
    }

    /// Append the low `count` bits of `value`; `count` is at most 64.
    fn push_bits(&mut self, mut value: u64, mut count: usize) {
        while count > 0 {
            let bit_offset = self.bit_len % BITS_PER_BYTE;
            if bit_offset == 0 {
                self.buffer.push(0);
            }
            let take = (BITS_PER_BYTE - bit_offset).min(count);
            let mask = ((1u16 << take) - 1) as u8;
            if let Some(last) = self.buffer.last_mut() {
                *last |= ((value as u8) & mask) << bit_offset;
            }
            value >>= take;
            count -= take;
            self.bit_len += take;
        }
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.push_bits(u64::from(value), 1);
    }

    /// Write the low `bits` bits (1 to 32) of `value`.
    pub fn write_uint(&mut self, value: u32, bits: u32) -> Result<()> {
        if bits == 0 || bits > 32 {
            return Err(Error::InvalidBitWidth(bits));
        }
        self.push_bits(u64::from(value), bits as usize);
        Ok(())
    }

    /// Write 8 bits.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.push_bits(u64::from(value), 8);
    }

    /// Write a 16-bit unsigned integer.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.push_bits(u64::from(value), 16);
    }

    /// Write a 32-bit unsigned integer.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.push_bits(u64::from(value), 32);
    }

    /// Write a 32-bit signed integer.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Write a 32-bit IEEE float.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Append every bit of `bits`.
    pub fn write_bits(&mut self, bits: &BitBuf) {
        if self.is_aligned() {
            // BitBuf keeps its unused tail bits zero, so the partial byte can
            // be copied as-is and later writes will fill it in.
            self.buffer.extend_from_slice(bits.as_bytes());
            self.bit_len += bits.bit_len();
            return;
        }

        let whole = bits.bit_len() / BITS_PER_BYTE;
        for &byte in &bits.as_bytes()[..whole] {
            self.push_bits(u64::from(byte), BITS_PER_BYTE);
        }
        let tail = bits.bit_len() % BITS_PER_BYTE;
        if tail != 0 {
            if let Some(&last) = bits.as_bytes().get(whole) {
                self.push_bits(u64::from(last), tail);
            }
        }
    }

    /// Append whole bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_aligned() {
            self.buffer.extend_from_slice(bytes);
            self.bit_len += bytes.len() * BITS_PER_BYTE;
        } else {
            for &byte in bytes {
                self.write_u8(byte);
            }
        }
    }

    /// Write a string followed by a null terminator.
    pub fn write_cstring(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
    }

    /// Write a coordinate in the engine's variable-length coord encoding.
    ///
    /// Values are quantized to 1/32 unit, the resolution of the format.
    pub fn write_bit_coord(&mut self, value: f32) {
        let negative = value < 0.0;
        let magnitude = value.abs();
        let mut integer = magnitude.trunc() as u32;
        let mut fraction = ((magnitude - integer as f32) * 32.0).round() as u32;
        if fraction >= 32 {
            integer += 1;
            fraction = 0;
        }

        let has_integer = integer != 0;
        let has_fraction = fraction != 0;
        self.write_bool(has_integer);
        self.write_bool(has_fraction);
        if !has_integer && !has_fraction {
            return;
        }

        self.write_bool(negative);
        if has_integer {
            self.push_bits(u64::from(integer - 1), 14);
        }
        if has_fraction {
            self.push_bits(u64::from(fraction), 5);
        }
    }

    /// Write a coordinate vector: presence bits first, then each non-zero coord.
    pub fn write_bit_vec3_coord(&mut self, value: [f32; 3]) {
        for component in value {
            self.write_bool(component != 0.0);
        }
        for component in value {
            if component != 0.0 {
                self.write_bit_coord(component);
            }
        }
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align(&mut self) {
        let tail = self.bit_len % BITS_PER_BYTE;
        if tail != 0 {
            self.bit_len += BITS_PER_BYTE - tail;
        }
    }

    /// Finish writing, keeping the exact bit length.
    pub fn finish(self) -> BitBuf {
        BitBuf::from_parts(self.buffer, self.bit_len)
    }

    /// Finish writing, zero-padding to whole bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitReader;

    #[test]
    fn test_write_bits_lsb_first() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_uint(0b101, 3).unwrap();
        writer.write_u8(0xFF);
        assert_eq!(writer.bit_len(), 12);
        assert_eq!(writer.into_bytes(), vec![0b1111_1011, 0b0000_1111]);
    }

    #[test]
    fn test_write_uint_masks_high_bits() {
        let mut writer = BitWriter::new();
        writer.write_uint(0xFFFF_FFFF, 4).unwrap();
        assert_eq!(writer.finish().as_bytes(), &[0x0F]);
    }

    #[test]
    fn test_write_bits_unaligned() {
        let payload = BitBuf::from_parts(vec![0xAB, 0x05], 11);

        let mut writer = BitWriter::new();
        writer.write_uint(0b11, 2).unwrap();
        writer.write_bits(&payload);
        assert_eq!(writer.bit_len(), 13);

        let buf = writer.finish();
        let mut reader = buf.reader();
        assert_eq!(reader.read_uint(2).unwrap(), 0b11);
        assert_eq!(reader.read_bits(11).unwrap(), payload);
    }

    #[test]
    fn test_align() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.align();
        writer.write_u8(0x42);
        assert_eq!(writer.into_bytes(), vec![0x01, 0x42]);
    }

    #[test]
    fn test_vec3_coord_round_trip() {
        let mut writer = BitWriter::new();
        writer.write_bit_vec3_coord([1.0, 0.0, -300.25]);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bit_vec3_coord().unwrap(), [1.0, 0.0, -300.25]);
    }

    #[test]
    fn test_invalid_width() {
        let mut writer = BitWriter::new();
        assert!(writer.write_uint(1, 0).is_err());
        assert!(writer.write_uint(1, 40).is_err());
    }
}
