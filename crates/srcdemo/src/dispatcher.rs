//! The top-level frame loop.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use srcdemo_common::{BitReader, BITS_PER_BYTE};
use tracing::{debug, warn};

use crate::component::{DecodeContext, Encode};
use crate::datatables::ClassRegistry;
use crate::describe::{Describe, Describer};
use crate::header::HEADER_SIZE;
use crate::packet::{Packet, PacketKind};
use crate::profile::{EngineProfile, FrameLayout};
use crate::stringtables::StringTableTracker;
use crate::{Error, Result};

/// The fixed part in front of every frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameHeader {
    /// Raw packet kind tag.
    pub tag: u8,
    pub tick: i32,
    /// Player slot; only present when the profile has one.
    pub slot: Option<u8>,
}

impl FrameHeader {
    /// Read a header from the start of `bytes`, which must hold a full one.
    pub fn read(mut bytes: &[u8], profile: &EngineProfile) -> Result<Self> {
        let (tag, tick) = match profile.frame_layout {
            FrameLayout::CommandFirst => {
                let tag = bytes.read_u8()?;
                (tag, bytes.read_i32::<LittleEndian>()?)
            }
            FrameLayout::TickFirst => {
                let tick = bytes.read_i32::<LittleEndian>()?;
                (bytes.read_u8()?, tick)
            }
        };
        let slot = if profile.player_slot {
            Some(bytes.read_u8()?)
        } else {
            None
        };
        Ok(Self { tag, tick, slot })
    }

    /// Append the header to `out`.
    pub fn write(&self, out: &mut Vec<u8>, profile: &EngineProfile) -> Result<()> {
        match profile.frame_layout {
            FrameLayout::CommandFirst => {
                out.write_u8(self.tag)?;
                out.write_i32::<LittleEndian>(self.tick)?;
            }
            FrameLayout::TickFirst => {
                out.write_i32::<LittleEndian>(self.tick)?;
                out.write_u8(self.tag)?;
            }
        }
        if profile.player_slot {
            out.write_u8(self.slot.unwrap_or(0))?;
        }
        Ok(())
    }
}

/// A decoded frame.
///
/// `raw` holds the frame's bytes, header included, as read from the file or
/// as last produced by [`Frame::reencode`]. Editing `packet` does not update
/// them; call `reencode` before serializing the document again.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Frame {
    pub tick: i32,
    pub slot: Option<u8>,
    pub packet: Packet,
    #[cfg_attr(feature = "serde", serde(skip))]
    raw: Vec<u8>,
}

impl Frame {
    /// Build a frame and encode its bytes.
    pub fn new(tick: i32, slot: Option<u8>, packet: Packet, profile: &EngineProfile) -> Result<Self> {
        let mut frame = Self {
            tick,
            slot,
            packet,
            raw: Vec::new(),
        };
        frame.reencode(profile)?;
        Ok(frame)
    }

    pub fn kind(&self) -> PacketKind {
        self.packet.kind()
    }

    /// The frame's bytes, header included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Rebuild the raw bytes from the current fields.
    pub fn reencode(&mut self, profile: &EngineProfile) -> Result<()> {
        let kind = self.kind();
        let tag = profile.packet_tag(kind).ok_or(Error::NotInProfile(kind.name()))?;
        let header = FrameHeader {
            tag,
            tick: self.tick,
            slot: self.slot,
        };
        let payload = self.packet.to_bits(profile)?;

        let mut raw = Vec::with_capacity(profile.frame_header_len() + payload.byte_len());
        header.write(&mut raw, profile)?;
        raw.extend_from_slice(payload.as_bytes());
        self.raw = raw;
        Ok(())
    }
}

impl Describe for Frame {
    fn describe(&self, out: &mut Describer<'_>) {
        match self.slot {
            Some(slot) => out.heading(format_args!("{} (tick {}, slot {})", self.kind().name(), self.tick, slot)),
            None => out.heading(format_args!("{} (tick {})", self.kind().name(), self.tick)),
        }
        out.indented(|out| self.packet.describe(out));
    }
}

/// What follows the last decoded frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Trailer {
    /// Header of the stop frame, if the stream had one.
    pub stop: Option<FrameHeader>,
    /// Bytes after the stop frame, or an incomplete frame header at the end.
    pub bytes: Vec<u8>,
}

impl Trailer {
    /// Serialize the trailer.
    pub fn to_bytes(&self, profile: &EngineProfile) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(profile.frame_header_len() + self.bytes.len());
        if let Some(stop) = &self.stop {
            stop.write(&mut out, profile)?;
        }
        out.extend_from_slice(&self.bytes);
        Ok(out)
    }
}

/// Dispatcher progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Scanning,
    Done,
    /// A decode error occurred; no further frames are produced.
    Faulted,
}

/// Reads frames one at a time, in file order.
///
/// The dispatcher owns the class registry and the string-table tracker
/// while decoding, so every frame sees exactly the state built by the
/// frames before it.
pub struct FrameDispatcher<'a> {
    data: &'a [u8],
    reader: BitReader<'a>,
    profile: &'a EngineProfile,
    state: DispatchState,
    registry: ClassRegistry,
    tables: StringTableTracker,
    data_tables_seen: usize,
    trailer: Trailer,
}

impl<'a> FrameDispatcher<'a> {
    /// Start reading the frames of a complete demo file.
    pub fn new(data: &'a [u8], profile: &'a EngineProfile) -> Result<Self> {
        let mut reader = BitReader::new(data);
        reader.skip_bits(HEADER_SIZE * BITS_PER_BYTE).map_err(|_| Error::HeaderTooShort {
            expected: HEADER_SIZE,
            actual: data.len(),
        })?;
        Ok(Self {
            data,
            reader,
            profile,
            state: DispatchState::Scanning,
            registry: ClassRegistry::default(),
            tables: StringTableTracker::default(),
            data_tables_seen: 0,
            trailer: Trailer::default(),
        })
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> usize {
        self.reader.position() / BITS_PER_BYTE
    }

    /// The class registry as of the frames decoded so far.
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Decode the next frame; `None` once the stream has ended.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.state != DispatchState::Scanning {
            return Ok(None);
        }
        let result = self.decode_frame();
        if result.is_err() {
            self.state = DispatchState::Faulted;
        }
        result
    }

    fn decode_frame(&mut self) -> Result<Option<Frame>> {
        let offset = self.offset();
        let data = self.data;
        let remaining = &data[offset..];
        let header_len = self.profile.frame_header_len();

        if remaining.is_empty() {
            debug!(offset, "end of stream without stop frame");
            self.state = DispatchState::Done;
            return Ok(None);
        }
        if remaining.len() < header_len {
            warn!(offset, bytes = remaining.len(), "incomplete frame header at end of stream");
            self.trailer.bytes = remaining.to_vec();
            self.state = DispatchState::Done;
            return Ok(None);
        }

        let header = FrameHeader::read(remaining, self.profile)?;
        let kind = self.profile.packet_kind(header.tag).ok_or(Error::UnknownPacketKind {
            tag: header.tag,
            offset,
        })?;
        self.reader.skip_bits(header_len * BITS_PER_BYTE)?;

        if kind == PacketKind::Stop {
            debug!(offset, tick = header.tick, "stop frame");
            self.trailer.stop = Some(header);
            self.trailer.bytes = remaining[header_len..].to_vec();
            self.state = DispatchState::Done;
            return Ok(None);
        }

        let mut ctx = DecodeContext {
            profile: self.profile,
            registry: &self.registry,
            tables: &mut self.tables,
        };
        let packet = Packet::decode(kind, &mut self.reader, &mut ctx)?;
        let end = self.offset();

        if let Packet::DataTables(tables) = &packet {
            if self.data_tables_seen > 0 {
                warn!(offset, "data tables repeated; rebuilding class registry");
            }
            self.data_tables_seen += 1;
            self.registry = ClassRegistry::from_data_tables(tables);
        }

        debug!(offset, tick = header.tick, kind = kind.name(), bytes = end - offset, "decoded frame");
        Ok(Some(Frame {
            tick: header.tick,
            slot: header.slot,
            packet,
            raw: data[offset..end].to_vec(),
        }))
    }

    /// Stop dispatching and hand over the lookup state and trailer.
    pub fn into_parts(self) -> (ClassRegistry, StringTableTracker, Trailer) {
        (self.registry, self.tables, self.trailer)
    }
}

impl Iterator for FrameDispatcher<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DemoHeader;
    use crate::packet::ConsoleCmd;

    fn header_bytes() -> Vec<u8> {
        DemoHeader {
            demo_protocol: 3,
            network_protocol: 14,
            server_name: "localhost".to_string(),
            client_name: "tester".to_string(),
            map_name: "gm_construct".to_string(),
            game_directory: "hl2".to_string(),
            playback_time: 1.0,
            ticks: 3,
            frames: 3,
            sign_on_length: 0,
        }
        .to_bytes()
    }

    fn console(tick: i32, command: &str, profile: &EngineProfile) -> Vec<u8> {
        let packet = Packet::ConsoleCmd(ConsoleCmd {
            command: command.to_string(),
        });
        Frame::new(tick, None, packet, profile).unwrap().raw().to_vec()
    }

    #[test]
    fn test_frame_header_layouts() {
        let header = FrameHeader {
            tag: 2,
            tick: 0x0102_0304,
            slot: Some(1),
        };
        let portal2 = EngineProfile::portal2();
        let mut out = Vec::new();
        header.write(&mut out, &portal2).unwrap();
        assert_eq!(out, vec![2, 4, 3, 2, 1, 1]);
        assert_eq!(FrameHeader::read(&out, &portal2).unwrap(), header);

        let tick_first = EngineProfile::orange_box().with_frame_layout(FrameLayout::TickFirst);
        let mut out = Vec::new();
        header.write(&mut out, &tick_first).unwrap();
        assert_eq!(out, vec![4, 3, 2, 1, 2]);
        let read = FrameHeader::read(&out, &tick_first).unwrap();
        assert_eq!((read.tag, read.tick, read.slot), (2, 0x0102_0304, None));
    }

    #[test]
    fn test_stops_at_stop_frame() {
        let profile = EngineProfile::orange_box();
        let mut data = header_bytes();
        data.extend(console(1, "+forward", &profile));
        data.extend(console(2, "-forward", &profile));
        FrameHeader {
            tag: 7,
            tick: 3,
            slot: None,
        }
        .write(&mut data, &profile)
        .unwrap();
        // Anything after the stop frame is never decoded.
        data.extend_from_slice(&[0xFF, 0xFF, 0xFF]);

        let mut dispatcher = FrameDispatcher::new(&data, &profile).unwrap();
        let frames = dispatcher.by_ref().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].tick, 2);
        assert_eq!(dispatcher.state(), DispatchState::Done);

        let (_, _, trailer) = dispatcher.into_parts();
        assert_eq!(trailer.stop.map(|h| h.tick), Some(3));
        assert_eq!(trailer.bytes, vec![0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_stops_at_end_of_buffer() {
        let profile = EngineProfile::orange_box();
        let mut data = header_bytes();
        data.extend(console(1, "status", &profile));
        let end = data.len();

        let mut dispatcher = FrameDispatcher::new(&data, &profile).unwrap();
        assert!(dispatcher.next_frame().unwrap().is_some());
        assert_eq!(dispatcher.offset(), end);
        assert!(dispatcher.next_frame().unwrap().is_none());
        assert_eq!(dispatcher.state(), DispatchState::Done);
        assert!(dispatcher.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_partial_header_goes_to_trailer() {
        let profile = EngineProfile::orange_box();
        let mut data = header_bytes();
        data.extend(console(1, "status", &profile));
        data.extend_from_slice(&[2, 0]);

        let mut dispatcher = FrameDispatcher::new(&data, &profile).unwrap();
        assert_eq!(dispatcher.by_ref().count(), 1);
        let (_, _, trailer) = dispatcher.into_parts();
        assert_eq!(trailer.stop, None);
        assert_eq!(trailer.bytes, vec![2, 0]);
    }

    #[test]
    fn test_unknown_packet_kind_faults() {
        let profile = EngineProfile::orange_box();
        let mut data = header_bytes();
        data.extend_from_slice(&[42, 0, 0, 0, 0]);

        let mut dispatcher = FrameDispatcher::new(&data, &profile).unwrap();
        let err = dispatcher.next_frame().unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPacketKind {
                tag: 42,
                offset: HEADER_SIZE
            }
        ));
        assert_eq!(dispatcher.state(), DispatchState::Faulted);
        assert!(dispatcher.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_raw_bytes_match_input() {
        let profile = EngineProfile::orange_box();
        let frame_bytes = console(9, "echo hi", &profile);
        let mut data = header_bytes();
        data.extend_from_slice(&frame_bytes);

        let frame = FrameDispatcher::new(&data, &profile).unwrap().next_frame().unwrap().unwrap();
        assert_eq!(frame.raw(), &frame_bytes[..]);
        assert_eq!(frame.kind(), PacketKind::ConsoleCmd);
    }
}
