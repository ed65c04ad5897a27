//! Top-level packet payloads.
//!
//! A frame header names a [`PacketKind`]; the payload that follows is decoded
//! into a [`Packet`]. Payloads are byte aligned, and every kind that nests
//! further structure declares its byte length up front, so the nested decode
//! runs on a reader bounded to exactly that many bytes.

mod usercmd;

use srcdemo_common::{BitReader, BitWriter, BITS_PER_BYTE};

use crate::component::{read_byte_len, write_byte_len, Decode, DecodeContext, Encode, Vec3};
use crate::datatables::DataTables;
use crate::describe::{Describe, Describer};
use crate::message::{decode_stream, encode_stream, NetMessage};
use crate::profile::EngineProfile;
use crate::stringtables::StringTables;
use crate::{Error, Result};

pub use usercmd::{UserCmd, WeaponSelect};

/// Kind of a top-level frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PacketKind {
    SignOn,
    Packet,
    SyncTick,
    ConsoleCmd,
    UserCmd,
    DataTables,
    Stop,
    CustomData,
    StringTables,
}

impl PacketKind {
    pub fn name(self) -> &'static str {
        match self {
            PacketKind::SignOn => "SignOn",
            PacketKind::Packet => "Packet",
            PacketKind::SyncTick => "SyncTick",
            PacketKind::ConsoleCmd => "ConsoleCmd",
            PacketKind::UserCmd => "UserCmd",
            PacketKind::DataTables => "DataTables",
            PacketKind::Stop => "Stop",
            PacketKind::CustomData => "CustomData",
            PacketKind::StringTables => "StringTables",
        }
    }
}

/// Open a reader over a payload prefixed with its byte length.
pub(crate) fn payload_reader<'a>(reader: &mut BitReader<'a>, kind: PacketKind) -> Result<BitReader<'a>> {
    let offset = reader.position() / BITS_PER_BYTE;
    let declared = read_byte_len(reader, kind.name())?;
    let available = reader.remaining_bits() / BITS_PER_BYTE;
    if declared > available {
        return Err(Error::FrameOverrun {
            kind: kind.name(),
            offset,
            declared,
            available,
        });
    }
    Ok(reader.sub_reader(declared * BITS_PER_BYTE)?)
}

/// Write a payload prefixed with its byte length.
pub(crate) fn write_payload(writer: &mut BitWriter, bytes: &[u8], context: &'static str) -> Result<()> {
    write_byte_len(writer, bytes.len(), context)?;
    writer.write_bytes(bytes);
    Ok(())
}

/// Fail if a structured payload left a byte or more unread.
fn check_consumed(reader: &BitReader<'_>, context: &'static str) -> Result<()> {
    let bits = reader.remaining_bits();
    if bits >= BITS_PER_BYTE {
        return Err(Error::TrailingBits { context, bits });
    }
    Ok(())
}

/// Camera state for one split-screen slot.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CmdInfo {
    pub flags: i32,
    pub view_origin: Vec3,
    pub view_angles: Vec3,
    pub local_view_angles: Vec3,
    pub view_origin2: Vec3,
    pub view_angles2: Vec3,
    pub local_view_angles2: Vec3,
}

impl CmdInfo {
    /// Encoded size in bytes.
    pub const SIZE: usize = 76;

    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Self {
            flags: reader.read_i32()?,
            view_origin: Vec3::read(reader)?,
            view_angles: Vec3::read(reader)?,
            local_view_angles: Vec3::read(reader)?,
            view_origin2: Vec3::read(reader)?,
            view_angles2: Vec3::read(reader)?,
            local_view_angles2: Vec3::read(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) {
        writer.write_i32(self.flags);
        self.view_origin.write(writer);
        self.view_angles.write(writer);
        self.local_view_angles.write(writer);
        self.view_origin2.write(writer);
        self.view_angles2.write(writer);
        self.local_view_angles2.write(writer);
    }
}

/// Payload of sign-on and packet frames: camera state plus net messages.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetPacket {
    pub cmd_info: Vec<CmdInfo>,
    pub in_sequence: i32,
    pub out_sequence: i32,
    pub messages: Vec<NetMessage>,
}

impl NetPacket {
    fn decode(reader: &mut BitReader<'_>, kind: PacketKind, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let cmd_info = (0..ctx.profile.cmd_info_slots)
            .map(|_| CmdInfo::read(reader))
            .collect::<Result<Vec<_>>>()?;
        let in_sequence = reader.read_i32()?;
        let out_sequence = reader.read_i32()?;
        let mut payload = payload_reader(reader, kind)?;
        let messages = decode_stream(&mut payload, ctx)?;
        Ok(Self {
            cmd_info,
            in_sequence,
            out_sequence,
            messages,
        })
    }
}

impl Encode for NetPacket {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        let empty = CmdInfo::default();
        for slot in 0..profile.cmd_info_slots {
            self.cmd_info.get(slot).unwrap_or(&empty).write(writer);
        }
        writer.write_i32(self.in_sequence);
        writer.write_i32(self.out_sequence);
        let bytes = encode_stream(&self.messages, profile)?;
        write_payload(writer, &bytes, "net packet")
    }
}

impl Describe for NetPacket {
    fn describe(&self, out: &mut Describer<'_>) {
        for (slot, info) in self.cmd_info.iter().enumerate() {
            out.heading(format_args!("cmd info [{}]", slot));
            out.indented(|out| {
                out.field("flags", info.flags);
                out.field("view origin", info.view_origin);
                out.field("view angles", info.view_angles);
                out.field("local view angles", info.local_view_angles);
            });
        }
        out.field("in sequence", self.in_sequence);
        out.field("out sequence", self.out_sequence);
        out.field("messages", self.messages.len());
        out.indented(|out| {
            for message in &self.messages {
                message.describe(out);
            }
        });
    }
}

/// A console command typed or bound on the recording client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConsoleCmd {
    pub command: String,
}

impl Decode for ConsoleCmd {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let mut payload = payload_reader(reader, PacketKind::ConsoleCmd)?;
        let bytes = payload.read_bytes(payload.remaining_bits() / BITS_PER_BYTE)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(Self {
            command: String::from_utf8_lossy(&bytes[..end]).into_owned(),
        })
    }
}

impl Encode for ConsoleCmd {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        let mut bytes = Vec::with_capacity(self.command.len() + 1);
        bytes.extend_from_slice(self.command.as_bytes());
        bytes.push(0);
        write_payload(writer, &bytes, "console command")
    }
}

impl Describe for ConsoleCmd {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("command", &self.command);
    }
}

/// Game-specific data block (e.g. plugin or radial-menu state).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CustomData {
    pub data_type: i32,
    pub data: Vec<u8>,
}

impl Decode for CustomData {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let data_type = reader.read_i32()?;
        let mut payload = payload_reader(reader, PacketKind::CustomData)?;
        Ok(Self {
            data_type,
            data: payload.read_bytes(payload.remaining_bits() / BITS_PER_BYTE)?,
        })
    }
}

impl Encode for CustomData {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_i32(self.data_type);
        write_payload(writer, &self.data, "custom data")
    }
}

impl Describe for CustomData {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("type", self.data_type);
        out.field("data", format_args!("{} bytes", self.data.len()));
    }
}

/// A decoded frame payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Packet {
    SignOn(NetPacket),
    Packet(NetPacket),
    SyncTick,
    ConsoleCmd(ConsoleCmd),
    UserCmd(UserCmd),
    DataTables(DataTables),
    Stop,
    CustomData(CustomData),
    StringTables(StringTables),
}

impl Packet {
    /// Decode the payload of a frame of the given kind.
    pub fn decode(kind: PacketKind, reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(match kind {
            PacketKind::SignOn => Packet::SignOn(NetPacket::decode(reader, kind, ctx)?),
            PacketKind::Packet => Packet::Packet(NetPacket::decode(reader, kind, ctx)?),
            PacketKind::SyncTick => Packet::SyncTick,
            PacketKind::ConsoleCmd => Packet::ConsoleCmd(ConsoleCmd::decode(reader, ctx)?),
            PacketKind::UserCmd => Packet::UserCmd(UserCmd::decode(reader, ctx)?),
            PacketKind::DataTables => {
                let mut payload = payload_reader(reader, kind)?;
                let tables = DataTables::decode(&mut payload, ctx)?;
                check_consumed(&payload, "data tables")?;
                Packet::DataTables(tables)
            }
            PacketKind::Stop => Packet::Stop,
            PacketKind::CustomData => Packet::CustomData(CustomData::decode(reader, ctx)?),
            PacketKind::StringTables => {
                let mut payload = payload_reader(reader, kind)?;
                let tables = StringTables::decode(&mut payload, ctx)?;
                check_consumed(&payload, "string tables")?;
                Packet::StringTables(tables)
            }
        })
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::SignOn(_) => PacketKind::SignOn,
            Packet::Packet(_) => PacketKind::Packet,
            Packet::SyncTick => PacketKind::SyncTick,
            Packet::ConsoleCmd(_) => PacketKind::ConsoleCmd,
            Packet::UserCmd(_) => PacketKind::UserCmd,
            Packet::DataTables(_) => PacketKind::DataTables,
            Packet::Stop => PacketKind::Stop,
            Packet::CustomData(_) => PacketKind::CustomData,
            Packet::StringTables(_) => PacketKind::StringTables,
        }
    }

    /// Net messages carried by this packet, if any.
    pub fn messages(&self) -> &[NetMessage] {
        match self {
            Packet::SignOn(packet) | Packet::Packet(packet) => &packet.messages,
            _ => &[],
        }
    }
}

impl Encode for Packet {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        match self {
            Packet::SignOn(packet) | Packet::Packet(packet) => packet.encode(writer, profile),
            Packet::SyncTick | Packet::Stop => Ok(()),
            Packet::ConsoleCmd(cmd) => cmd.encode(writer, profile),
            Packet::UserCmd(cmd) => cmd.encode(writer, profile),
            Packet::DataTables(tables) => {
                let bytes = tables.to_bits(profile)?.into_bytes();
                write_payload(writer, &bytes, "data tables")
            }
            Packet::CustomData(data) => data.encode(writer, profile),
            Packet::StringTables(tables) => {
                let bytes = tables.to_bits(profile)?.into_bytes();
                write_payload(writer, &bytes, "string tables")
            }
        }
    }
}

impl Describe for Packet {
    fn describe(&self, out: &mut Describer<'_>) {
        match self {
            Packet::SignOn(packet) | Packet::Packet(packet) => packet.describe(out),
            Packet::SyncTick | Packet::Stop => {}
            Packet::ConsoleCmd(cmd) => cmd.describe(out),
            Packet::UserCmd(cmd) => cmd.describe(out),
            Packet::DataTables(tables) => tables.describe(out),
            Packet::CustomData(data) => data.describe(out),
            Packet::StringTables(tables) => tables.describe(out),
        }
    }
}

/// A payload type that can be picked out of a [`Packet`].
pub trait PacketVariant {
    fn from_packet(packet: &Packet) -> Option<&Self>;
}

/// Matches both sign-on and packet frames.
impl PacketVariant for NetPacket {
    fn from_packet(packet: &Packet) -> Option<&Self> {
        match packet {
            Packet::SignOn(inner) | Packet::Packet(inner) => Some(inner),
            _ => None,
        }
    }
}

macro_rules! packet_variant {
    ($($kind:ident),*) => {
        $(
            impl PacketVariant for $kind {
                fn from_packet(packet: &Packet) -> Option<&Self> {
                    match packet {
                        Packet::$kind(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

packet_variant!(ConsoleCmd, UserCmd, DataTables, CustomData, StringTables);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatables::ClassRegistry;
    use crate::message::SvcSetPause;
    use crate::stringtables::StringTableTracker;

    fn decode(kind: PacketKind, bytes: &[u8], profile: &EngineProfile) -> Result<(Packet, usize)> {
        let registry = ClassRegistry::default();
        let mut tables = StringTableTracker::default();
        let mut ctx = DecodeContext {
            profile,
            registry: &registry,
            tables: &mut tables,
        };
        let mut reader = BitReader::new(bytes);
        let packet = Packet::decode(kind, &mut reader, &mut ctx)?;
        Ok((packet, reader.position() / BITS_PER_BYTE))
    }

    fn encode(packet: &Packet, profile: &EngineProfile) -> Vec<u8> {
        let mut writer = BitWriter::new();
        packet.encode(&mut writer, profile).unwrap();
        writer.into_bytes()
    }

    #[test]
    fn test_net_packet_layout() {
        let profile = EngineProfile::portal2();
        let packet = Packet::Packet(NetPacket {
            cmd_info: vec![CmdInfo::default(), CmdInfo::default()],
            in_sequence: 5,
            out_sequence: 6,
            messages: vec![SvcSetPause { paused: true }.into()],
        });
        let bytes = encode(&packet, &profile);
        assert_eq!(bytes.len(), 2 * CmdInfo::SIZE + 12 + 1);
        assert_eq!(bytes[bytes.len() - 1], 0x4B);

        let (decoded, consumed) = decode(PacketKind::Packet, &bytes, &profile).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.messages().len(), 1);
    }

    #[test]
    fn test_overrun_is_reported() {
        let profile = EngineProfile::orange_box();
        let mut bytes = encode(
            &Packet::ConsoleCmd(ConsoleCmd {
                command: "+jump".to_string(),
            }),
            &profile,
        );
        bytes.truncate(bytes.len() - 2);
        let err = decode(PacketKind::ConsoleCmd, &bytes, &profile).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameOverrun {
                kind: "ConsoleCmd",
                declared: 6,
                available: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_length() {
        let profile = EngineProfile::orange_box();
        let bytes = (-1i32).to_le_bytes();
        assert!(matches!(
            decode(PacketKind::CustomData, &[&[0u8; 4][..], &bytes[..]].concat(), &profile),
            Err(Error::InvalidLength { length: -1, .. })
        ));
    }

    #[test]
    fn test_data_tables_trailing_bytes() {
        let profile = EngineProfile::orange_box();
        let mut body = DataTables::default().to_bits(&profile).unwrap().into_bytes();
        body.extend_from_slice(&[0xAB, 0xCD]);
        let mut bytes = (body.len() as i32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&body);

        let err = decode(PacketKind::DataTables, &bytes, &profile).unwrap_err();
        assert!(matches!(err, Error::TrailingBits { context: "data tables", .. }));
    }

    #[test]
    fn test_console_and_custom_data_round_trip() {
        let profile = EngineProfile::portal2();
        for packet in [
            Packet::ConsoleCmd(ConsoleCmd {
                command: "say hello".to_string(),
            }),
            Packet::CustomData(CustomData {
                data_type: 0,
                data: vec![1, 2, 3, 4, 5],
            }),
            Packet::SyncTick,
        ] {
            let bytes = encode(&packet, &profile);
            let (decoded, consumed) = decode(packet.kind(), &bytes, &profile).unwrap();
            assert_eq!(decoded, packet);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_packet_variant_lookup() {
        let packet = Packet::SignOn(NetPacket::default());
        assert!(NetPacket::from_packet(&packet).is_some());
        assert!(ConsoleCmd::from_packet(&packet).is_none());
        assert_eq!(PacketKind::SignOn.name(), "SignOn");
    }
}
