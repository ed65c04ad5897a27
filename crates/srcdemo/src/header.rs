//! Demo file header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::describe::{Describe, Describer};
use crate::{Error, Result};

/// Length of the fixed-size string fields in the header.
pub const HEADER_STRING_LEN: usize = 260;

/// Total size of the header in bytes.
pub const HEADER_SIZE: usize = std::mem::size_of::<RawDemoHeader>();

/// On-disk layout of the demo header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawDemoHeader {
    /// Magic bytes, always `HL2DEMO\0`.
    pub magic: [u8; 8],
    /// Demo file format version.
    pub demo_protocol: i32,
    /// Network protocol of the recording build.
    pub network_protocol: i32,
    /// Server name or IP.
    pub server_name: [u8; HEADER_STRING_LEN],
    /// Recording client name.
    pub client_name: [u8; HEADER_STRING_LEN],
    /// Map name.
    pub map_name: [u8; HEADER_STRING_LEN],
    /// Game directory.
    pub game_directory: [u8; HEADER_STRING_LEN],
    /// Playback time in seconds.
    pub playback_time: f32,
    /// Number of ticks.
    pub ticks: i32,
    /// Number of frames.
    pub frames: i32,
    /// Length of the sign-on data in bytes.
    pub sign_on_length: i32,
}

impl RawDemoHeader {
    /// The magic bytes at the start of a demo file.
    pub const MAGIC: &'static [u8; 8] = b"HL2DEMO\0";
}

/// Decoded demo header.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DemoHeader {
    pub demo_protocol: i32,
    pub network_protocol: i32,
    pub server_name: String,
    pub client_name: String,
    pub map_name: String,
    pub game_directory: String,
    pub playback_time: f32,
    pub ticks: i32,
    pub frames: i32,
    pub sign_on_length: i32,
}

impl DemoHeader {
    /// Check if data starts with the demo magic.
    pub fn is_demo(data: &[u8]) -> bool {
        data.len() >= RawDemoHeader::MAGIC.len() && data[..RawDemoHeader::MAGIC.len()] == *RawDemoHeader::MAGIC
    }

    /// Parse the header from the start of a demo file.
    ///
    /// This is the lightweight header-only pass: no frame is touched.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            if !Self::is_demo(data) {
                return Err(Error::InvalidMagic {
                    actual: data[..RawDemoHeader::MAGIC.len().min(data.len())].to_vec(),
                });
            }
            return Err(Error::HeaderTooShort {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let raw = RawDemoHeader::read_from_bytes(&data[..HEADER_SIZE]).map_err(|_| Error::HeaderTooShort {
            expected: HEADER_SIZE,
            actual: data.len(),
        })?;

        if raw.magic != *RawDemoHeader::MAGIC {
            return Err(Error::InvalidMagic {
                actual: raw.magic.to_vec(),
            });
        }

        Ok(Self {
            demo_protocol: raw.demo_protocol,
            network_protocol: raw.network_protocol,
            server_name: fixed_string(&raw.server_name),
            client_name: fixed_string(&raw.client_name),
            map_name: fixed_string(&raw.map_name),
            game_directory: fixed_string(&raw.game_directory),
            playback_time: raw.playback_time,
            ticks: raw.ticks,
            frames: raw.frames,
            sign_on_length: raw.sign_on_length,
        })
    }

    /// Convert to header bytes for writing.
    ///
    /// String fields longer than 259 bytes are truncated so the terminator fits.
    pub fn to_bytes(&self) -> Vec<u8> {
        let raw = RawDemoHeader {
            magic: *RawDemoHeader::MAGIC,
            demo_protocol: self.demo_protocol,
            network_protocol: self.network_protocol,
            server_name: fixed_buffer(&self.server_name),
            client_name: fixed_buffer(&self.client_name),
            map_name: fixed_buffer(&self.map_name),
            game_directory: fixed_buffer(&self.game_directory),
            playback_time: self.playback_time,
            ticks: self.ticks,
            frames: self.frames,
            sign_on_length: self.sign_on_length,
        };
        raw.as_bytes().to_vec()
    }

    /// Average ticks per second, if the header carries a playback time.
    pub fn tick_rate(&self) -> Option<f32> {
        (self.playback_time > 0.0).then(|| self.ticks as f32 / self.playback_time)
    }
}

impl Describe for DemoHeader {
    fn describe(&self, out: &mut Describer<'_>) {
        out.heading("Header");
        out.indented(|out| {
            out.field("demo protocol", self.demo_protocol);
            out.field("network protocol", self.network_protocol);
            out.field("server name", &self.server_name);
            out.field("client name", &self.client_name);
            out.field("map name", &self.map_name);
            out.field("game directory", &self.game_directory);
            out.field("playback time", format_args!("{:.3}s", self.playback_time));
            out.field("ticks", self.ticks);
            out.field("frames", self.frames);
            out.field("sign-on length", self.sign_on_length);
        });
    }
}

/// Read a string from a fixed-size buffer, stopping at the first null.
fn fixed_string(buffer: &[u8; HEADER_STRING_LEN]) -> String {
    let end = null_position(buffer);
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

fn null_position(buffer: &[u8]) -> usize {
    buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len())
}

fn fixed_buffer(value: &str) -> [u8; HEADER_STRING_LEN] {
    let mut buffer = [0u8; HEADER_STRING_LEN];
    let bytes = value.as_bytes();
    let len = bytes.len().min(HEADER_STRING_LEN - 1);
    buffer[..len].copy_from_slice(&bytes[..len]);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DemoHeader {
        DemoHeader {
            demo_protocol: 4,
            network_protocol: 2001,
            server_name: "localhost:27015".to_string(),
            client_name: "player".to_string(),
            map_name: "sp_a1_intro1".to_string(),
            game_directory: "portal2".to_string(),
            playback_time: 12.5,
            ticks: 750,
            frames: 1500,
            sign_on_length: 4096,
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 1072);
    }

    #[test]
    fn test_header_round_trip() {
        let header = sample();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert!(DemoHeader::is_demo(&bytes));
        assert_eq!(DemoHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        let err = DemoHeader::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidMagic { .. }));
        assert!(err.is_header_error());
    }

    #[test]
    fn test_truncated_header() {
        let bytes = sample().to_bytes();
        let err = DemoHeader::parse(&bytes[..100]).unwrap_err();
        assert!(matches!(err, Error::HeaderTooShort { actual: 100, .. }));

        let err = DemoHeader::parse(b"GIF89a").unwrap_err();
        assert!(matches!(err, Error::InvalidMagic { .. }));
    }

    #[test]
    fn test_tick_rate() {
        assert_eq!(sample().tick_rate(), Some(60.0));
    }
}
