//! Bit-granularity reader for Source engine bit streams.
//!
//! This module provides [`BitReader`], a cursor that reads LSB-first packed
//! values from a byte slice at arbitrary bit offsets, the packing used by
//! every nested payload of a demo file.

use crate::{BitBuf, Error, Result, BITS_PER_BYTE};

const COORD_INTEGER_BITS: u32 = 14;
const COORD_FRACTIONAL_BITS: u32 = 5;
const COORD_DENOMINATOR: f32 = 32.0;

/// A bit cursor over a borrowed byte slice.
///
/// Values are packed least-significant bit first, so the first bit read is
/// bit 0 of byte 0. A reader can be bounded to fewer bits than the slice
/// holds; [`BitReader::sub_reader`] carves such a bounded view out of the
/// current position, which is how length-prefixed payloads are decoded
/// without being able to run past their declared size.
///
/// # Example
///
/// ```
/// use srcdemo_common::BitReader;
///
/// let data = [0b1000_0101, 0x02];
/// let mut reader = BitReader::new(&data);
///
/// assert!(reader.read_bool().unwrap());
/// assert_eq!(reader.read_uint(2).unwrap(), 0b10);
/// assert_eq!(reader.remaining_bits(), 13);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    start: usize,
    position: usize,
    end: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader over every bit of a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            start: 0,
            position: 0,
            end: data.len() * BITS_PER_BYTE,
        }
    }

    /// Create a reader over the first `bit_len` bits of a byte slice.
    #[inline]
    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            data,
            start: 0,
            position: 0,
            end: bit_len.min(data.len() * BITS_PER_BYTE),
        }
    }

    /// Bits consumed since this reader was created.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position - self.start
    }

    /// Total number of bits this reader covers.
    #[inline]
    pub const fn bit_len(&self) -> usize {
        self.end - self.start
    }

    /// Number of bits left to read.
    #[inline]
    pub const fn remaining_bits(&self) -> usize {
        self.end - self.position
    }

    /// Check if every bit has been consumed.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.end
    }

    /// Check if the cursor sits on a byte boundary of the underlying slice.
    #[inline]
    pub const fn is_aligned(&self) -> bool {
        self.position % BITS_PER_BYTE == 0
    }

    /// Check if all remaining bits are zero without consuming them.
    pub fn remaining_is_zero(&self) -> bool {
        let mut probe = self.clone();
        while !probe.is_empty() {
            let take = probe.remaining_bits().min(32);
            if probe.take_bits(take) != 0 {
                return false;
            }
        }
        true
    }

    #[inline]
    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining_bits();
        if needed > available {
            return Err(Error::BufferUnderflow { needed, available });
        }
        Ok(())
    }

    /// Read `count` bits; the caller has checked `count <= 64` and the bounds.
    fn take_bits(&mut self, count: usize) -> u64 {
        let mut value = 0u64;
        let mut read = 0;
        while read < count {
            let byte = self.data[self.position / BITS_PER_BYTE];
            let bit_offset = self.position % BITS_PER_BYTE;
            let take = (BITS_PER_BYTE - bit_offset).min(count - read);
            let chunk = (byte >> bit_offset) & (((1u16 << take) - 1) as u8);
            value |= u64::from(chunk) << read;
            read += take;
            self.position += take;
        }
        value
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        self.ensure(1)?;
        Ok(self.take_bits(1) != 0)
    }

    /// Read an unsigned integer of `bits` width (1 to 32), LSB first.
    pub fn read_uint(&mut self, bits: u32) -> Result<u32> {
        if bits == 0 || bits > 32 {
            return Err(Error::InvalidBitWidth(bits));
        }
        self.ensure(bits as usize)?;
        Ok(self.take_bits(bits as usize) as u32)
    }

    /// Peek at an unsigned integer without advancing.
    pub fn peek_uint(&self, bits: u32) -> Result<u32> {
        self.clone().read_uint(bits)
    }

    /// Read 8 bits. The cursor does not need to be byte aligned.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(8)?;
        Ok(self.take_bits(8) as u8)
    }

    /// Read a 16-bit unsigned integer.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(16)?;
        Ok(self.take_bits(16) as u16)
    }

    /// Read a 32-bit unsigned integer.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(32)?;
        Ok(self.take_bits(32) as u32)
    }

    /// Read a 32-bit signed integer.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    /// Read a 32-bit IEEE float.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Read exactly `count` bits into an owned buffer.
    pub fn read_bits(&mut self, count: usize) -> Result<BitBuf> {
        self.ensure(count)?;
        let mut bytes = Vec::with_capacity(count.div_ceil(BITS_PER_BYTE));
        let whole = count / BITS_PER_BYTE;

        if self.is_aligned() {
            let first = self.position / BITS_PER_BYTE;
            bytes.extend_from_slice(&self.data[first..first + whole]);
            self.position += whole * BITS_PER_BYTE;
        } else {
            for _ in 0..whole {
                bytes.push(self.take_bits(BITS_PER_BYTE) as u8);
            }
        }

        let tail = count % BITS_PER_BYTE;
        if tail != 0 {
            bytes.push(self.take_bits(tail) as u8);
        }

        Ok(BitBuf::from_parts(bytes, count))
    }

    /// Read `count` whole bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.read_bits(count * BITS_PER_BYTE).map(BitBuf::into_bytes)
    }

    /// Advance past `count` bits.
    pub fn skip_bits(&mut self, count: usize) -> Result<()> {
        self.ensure(count)?;
        self.position += count;
        Ok(())
    }

    /// Split off a reader over the next `count` bits and advance past them.
    ///
    /// The returned reader cannot read beyond those bits, so a nested decode
    /// that misjudges its payload fails with an underflow instead of
    /// consuming bytes that belong to the next component.
    pub fn sub_reader(&mut self, count: usize) -> Result<BitReader<'a>> {
        self.ensure(count)?;
        let sub = BitReader {
            data: self.data,
            start: self.position,
            position: self.position,
            end: self.position + count,
        };
        self.position += count;
        Ok(sub)
    }

    /// Read a null-terminated string.
    ///
    /// Strings inside net messages are not byte aligned, so the terminator
    /// search works at any offset. Invalid UTF-8 is replaced lossily.
    pub fn read_cstring(&mut self) -> Result<String> {
        if self.is_aligned() {
            let first = self.position / BITS_PER_BYTE;
            let last = self.end / BITS_PER_BYTE;
            let window = &self.data[first..last];
            let null_pos = memchr::memchr(0, window).ok_or(Error::MissingNullTerminator)?;
            let text = String::from_utf8_lossy(&window[..null_pos]).into_owned();
            self.position += (null_pos + 1) * BITS_PER_BYTE;
            return Ok(text);
        }

        let mut bytes = Vec::new();
        loop {
            if self.remaining_bits() < BITS_PER_BYTE {
                return Err(Error::MissingNullTerminator);
            }
            match self.take_bits(BITS_PER_BYTE) as u8 {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a world coordinate in the engine's variable-length coord encoding.
    pub fn read_bit_coord(&mut self) -> Result<f32> {
        let has_integer = self.read_bool()?;
        let has_fraction = self.read_bool()?;
        if !has_integer && !has_fraction {
            return Ok(0.0);
        }

        let negative = self.read_bool()?;
        let integer = if has_integer {
            self.read_uint(COORD_INTEGER_BITS)? + 1
        } else {
            0
        };
        let fraction = if has_fraction {
            self.read_uint(COORD_FRACTIONAL_BITS)?
        } else {
            0
        };

        let value = integer as f32 + fraction as f32 / COORD_DENOMINATOR;
        Ok(if negative { -value } else { value })
    }

    /// Read a coordinate vector: three presence bits, then each present coord.
    pub fn read_bit_vec3_coord(&mut self) -> Result<[f32; 3]> {
        let present = [self.read_bool()?, self.read_bool()?, self.read_bool()?];
        let mut out = [0.0; 3];
        for (slot, has) in out.iter_mut().zip(present) {
            if has {
                *slot = self.read_bit_coord()?;
            }
        }
        Ok(out)
    }
}
