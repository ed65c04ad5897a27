//! The decode/encode contract shared by every component of a demo.
//!
//! Each decodable unit (packet payload, net message, string-table entry)
//! implements [`Decode`] and [`Encode`]. A decoder must consume exactly the
//! bits it owns: payloads it does not understand are still read through their
//! declared length so whatever follows starts at the right bit.

use std::fmt;

use srcdemo_common::{BitBuf, BitReader, BitWriter};

use crate::datatables::ClassRegistry;
use crate::profile::EngineProfile;
use crate::stringtables::StringTableTracker;
use crate::{Error, Result};

/// Lookup state threaded through a decode pass.
///
/// The registry is the state at the moment of decoding; it is never
/// consulted again later, so a reference to a class that has not been
/// registered yet stays unresolved.
pub struct DecodeContext<'a> {
    pub profile: &'a EngineProfile,
    pub registry: &'a ClassRegistry,
    pub tables: &'a mut StringTableTracker,
}

/// A component that can be read from a bit stream.
pub trait Decode: Sized {
    /// Read the component, consuming exactly its bits.
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self>;
}

/// A component that can be written back to a bit stream.
pub trait Encode {
    /// Write the component in the layout `decode` reads.
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()>;

    /// Encode into a fresh bit buffer.
    fn to_bits(&self, profile: &EngineProfile) -> Result<BitBuf> {
        let mut writer = BitWriter::new();
        self.encode(&mut writer, profile)?;
        Ok(writer.finish())
    }
}

/// Read a `prefix_bits` wide length followed by exactly that many bits.
pub fn read_prefixed(reader: &mut BitReader<'_>, prefix_bits: u32) -> Result<BitBuf> {
    let length = reader.read_uint(prefix_bits)? as usize;
    Ok(reader.read_bits(length)?)
}

/// Write the bit length of `data` in `prefix_bits` bits, then the bits.
pub fn write_prefixed(
    writer: &mut BitWriter,
    data: &BitBuf,
    prefix_bits: u32,
    context: &'static str,
) -> Result<()> {
    let length = checked_len(data.bit_len(), prefix_bits, context)?;
    writer.write_uint(length, prefix_bits)?;
    writer.write_bits(data);
    Ok(())
}

/// Check that a count fits in a `bits` wide field.
pub fn checked_len(length: usize, bits: u32, context: &'static str) -> Result<u32> {
    let fits = if bits >= 32 {
        length <= u32::MAX as usize
    } else {
        length < 1usize << bits
    };
    if !fits {
        return Err(Error::InvalidLength {
            context,
            length: length as i64,
        });
    }
    Ok(length as u32)
}

/// Read a signed 32-bit byte count, rejecting negative values.
pub fn read_byte_len(reader: &mut BitReader<'_>, context: &'static str) -> Result<usize> {
    let length = reader.read_i32()?;
    usize::try_from(length).map_err(|_| Error::InvalidLength {
        context,
        length: i64::from(length),
    })
}

/// Write a byte count as a signed 32-bit integer.
pub fn write_byte_len(writer: &mut BitWriter, length: usize, context: &'static str) -> Result<()> {
    let length = i32::try_from(length).map_err(|_| Error::InvalidLength {
        context,
        length: length as i64,
    })?;
    writer.write_i32(length);
    Ok(())
}

/// Number of bits the engine uses for an index below `count`: `log2(count) + 1`.
pub fn index_bits(count: u32) -> u32 {
    match count {
        0 => 1,
        n => 32 - n.leading_zeros(),
    }
}

/// A three-component float vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub(crate) fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Self {
            x: reader.read_f32()?,
            y: reader.read_f32()?,
            z: reader.read_f32()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BitWriter) {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_bits() {
        assert_eq!(index_bits(0), 1);
        assert_eq!(index_bits(1), 1);
        assert_eq!(index_bits(2), 2);
        assert_eq!(index_bits(255), 8);
        assert_eq!(index_bits(256), 9);
        assert_eq!(index_bits(1024), 11);
    }

    #[test]
    fn test_prefixed_consumes_exactly() {
        for length in [0usize, 1, 7, 8, 13, 100] {
            let payload = BitBuf::from_parts(vec![0xA5; 13], length);

            let mut writer = BitWriter::new();
            write_prefixed(&mut writer, &payload, 11, "test").unwrap();
            writer.write_uint(0b101, 3).unwrap();
            let bytes = writer.into_bytes();

            let mut reader = BitReader::new(&bytes);
            let decoded = read_prefixed(&mut reader, 11).unwrap();
            assert_eq!(decoded, payload);
            assert_eq!(reader.position(), 11 + length);
            assert_eq!(reader.read_uint(3).unwrap(), 0b101);
        }
    }

    #[test]
    fn test_prefixed_rejects_oversized() {
        let payload = BitBuf::from_bytes(vec![0; 8]);
        let mut writer = BitWriter::new();
        assert!(matches!(
            write_prefixed(&mut writer, &payload, 6, "test"),
            Err(Error::InvalidLength { length: 64, .. })
        ));
    }

    #[test]
    fn test_negative_byte_len() {
        let bytes = (-4i32).to_le_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            read_byte_len(&mut reader, "test"),
            Err(Error::InvalidLength { length: -4, .. })
        ));
    }
}
