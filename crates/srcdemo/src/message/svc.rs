//! Server-to-client net messages.

use srcdemo_common::{BitBuf, BitReader, BitWriter};

use crate::component::{checked_len, index_bits, read_prefixed, write_prefixed, Decode, DecodeContext, Encode};
use crate::datatables::ClassRecord;
use crate::describe::{Describe, Describer};
use crate::profile::EngineProfile;
use crate::Result;

const ENTITY_BITS: u32 = 11;
const CLASS_ID_BITS: u32 = 9;
const MODEL_INDEX_BITS: u32 = 11;
const DECAL_TEXTURE_BITS: u32 = 9;
const SOUND_INDEX_BITS: u32 = 13;
const STRING_TABLE_ID_BITS: u32 = 5;
const PAYLOAD_LENGTH_BITS: u32 = 20;
const ANGLE_BITS: u32 = 16;

fn describe_blob(out: &mut Describer<'_>, data: &BitBuf) {
    out.field("data", format_args!("{} bits", data.bit_len()));
}

fn angle_degrees(raw: u16) -> f32 {
    f32::from(raw) * 360.0 / 65536.0
}

/// Server and map description sent during sign-on.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcServerInfo {
    pub network_protocol: u16,
    pub server_count: u32,
    pub is_hltv: bool,
    pub is_dedicated: bool,
    pub client_crc: i32,
    pub string_table_crc: Option<u32>,
    pub max_classes: u16,
    pub map_crc: u32,
    pub player_slot: u8,
    pub max_clients: u8,
    pub tick_interval: f32,
    pub os: u8,
    pub game_dir: String,
    pub map_name: String,
    pub sky_name: String,
    pub host_name: String,
}

impl Decode for SvcServerInfo {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            network_protocol: reader.read_u16()?,
            server_count: reader.read_u32()?,
            is_hltv: reader.read_bool()?,
            is_dedicated: reader.read_bool()?,
            client_crc: reader.read_i32()?,
            string_table_crc: if ctx.profile.server_info_string_table_crc {
                Some(reader.read_u32()?)
            } else {
                None
            },
            max_classes: reader.read_u16()?,
            map_crc: reader.read_u32()?,
            player_slot: reader.read_u8()?,
            max_clients: reader.read_u8()?,
            tick_interval: reader.read_f32()?,
            os: reader.read_u8()?,
            game_dir: reader.read_cstring()?,
            map_name: reader.read_cstring()?,
            sky_name: reader.read_cstring()?,
            host_name: reader.read_cstring()?,
        })
    }
}

impl Encode for SvcServerInfo {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_u16(self.network_protocol);
        writer.write_u32(self.server_count);
        writer.write_bool(self.is_hltv);
        writer.write_bool(self.is_dedicated);
        writer.write_i32(self.client_crc);
        if profile.server_info_string_table_crc {
            writer.write_u32(self.string_table_crc.unwrap_or(0));
        }
        writer.write_u16(self.max_classes);
        writer.write_u32(self.map_crc);
        writer.write_u8(self.player_slot);
        writer.write_u8(self.max_clients);
        writer.write_f32(self.tick_interval);
        writer.write_u8(self.os);
        writer.write_cstring(&self.game_dir);
        writer.write_cstring(&self.map_name);
        writer.write_cstring(&self.sky_name);
        writer.write_cstring(&self.host_name);
        Ok(())
    }
}

impl Describe for SvcServerInfo {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("network protocol", self.network_protocol);
        out.field("server count", self.server_count);
        out.field("hltv", self.is_hltv);
        out.field("dedicated", self.is_dedicated);
        out.field("client crc", format_args!("{:#010x}", self.client_crc));
        if let Some(crc) = self.string_table_crc {
            out.field("string table crc", format_args!("{:#010x}", crc));
        }
        out.field("max classes", self.max_classes);
        out.field("map crc", format_args!("{:#010x}", self.map_crc));
        out.field("player slot", self.player_slot);
        out.field("max clients", self.max_clients);
        out.field("tick interval", self.tick_interval);
        out.field("os", char::from(self.os));
        out.field("game dir", &self.game_dir);
        out.field("map name", &self.map_name);
        out.field("sky name", &self.sky_name);
        out.field("host name", &self.host_name);
    }
}

/// A single send table, as an opaque payload.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcSendTable {
    pub needs_decoder: bool,
    pub data: BitBuf,
}

impl Decode for SvcSendTable {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            needs_decoder: reader.read_bool()?,
            data: read_prefixed(reader, 16)?,
        })
    }
}

impl Encode for SvcSendTable {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bool(self.needs_decoder);
        write_prefixed(writer, &self.data, 16, "send table")
    }
}

impl Describe for SvcSendTable {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("needs decoder", self.needs_decoder);
        describe_blob(out, &self.data);
    }
}

/// Server class list, unless the client builds it from its own tables.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcClassInfo {
    pub class_count: u16,
    pub create_on_client: bool,
    pub classes: Vec<ClassRecord>,
}

impl Decode for SvcClassInfo {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let class_count = reader.read_u16()?;
        let create_on_client = reader.read_bool()?;
        let mut classes = Vec::new();
        if !create_on_client {
            let id_bits = index_bits(u32::from(class_count));
            for _ in 0..class_count {
                classes.push(ClassRecord {
                    index: reader.read_uint(id_bits)? as u16,
                    class_name: reader.read_cstring()?,
                    data_table_name: reader.read_cstring()?,
                });
            }
        }
        Ok(Self {
            class_count,
            create_on_client,
            classes,
        })
    }
}

impl Encode for SvcClassInfo {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        // A sent class list is its own count.
        let class_count = if self.create_on_client {
            self.class_count
        } else {
            checked_len(self.classes.len(), 16, "class info")? as u16
        };
        writer.write_u16(class_count);
        writer.write_bool(self.create_on_client);
        if !self.create_on_client {
            let id_bits = index_bits(u32::from(class_count));
            for class in &self.classes {
                writer.write_uint(u32::from(class.index), id_bits)?;
                writer.write_cstring(&class.class_name);
                writer.write_cstring(&class.data_table_name);
            }
        }
        Ok(())
    }
}

impl Describe for SvcClassInfo {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("classes", self.class_count);
        out.field("create on client", self.create_on_client);
        out.indented(|out| {
            for class in &self.classes {
                out.field(&class.index.to_string(), class);
            }
        });
    }
}

/// Pause state toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcSetPause {
    pub paused: bool,
}

impl Decode for SvcSetPause {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            paused: reader.read_bool()?,
        })
    }
}

impl Encode for SvcSetPause {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bool(self.paused);
        Ok(())
    }
}

impl Describe for SvcSetPause {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("paused", self.paused);
    }
}

/// Creation of a string table; the table is registered with the tracker.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcCreateStringTable {
    pub name: String,
    pub max_entries: u16,
    pub num_entries: u32,
    /// Fixed user data size in bytes and bits.
    pub user_data_fixed: Option<(u32, u32)>,
    pub compressed: Option<bool>,
    pub data: BitBuf,
}

impl Decode for SvcCreateStringTable {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let name = reader.read_cstring()?;
        let max_entries = reader.read_u16()?;
        let num_entries = reader.read_uint(index_bits(u32::from(max_entries)))?;
        let length = reader.read_uint(PAYLOAD_LENGTH_BITS)? as usize;
        let user_data_fixed = if reader.read_bool()? {
            Some((reader.read_uint(12)?, reader.read_uint(4)?))
        } else {
            None
        };
        let compressed = if ctx.profile.create_table_compressed_flag {
            Some(reader.read_bool()?)
        } else {
            None
        };
        let data = reader.read_bits(length)?;

        ctx.tables.register(&name);
        Ok(Self {
            name,
            max_entries,
            num_entries,
            user_data_fixed,
            compressed,
            data,
        })
    }
}

impl Encode for SvcCreateStringTable {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_cstring(&self.name);
        writer.write_u16(self.max_entries);
        writer.write_uint(self.num_entries, index_bits(u32::from(self.max_entries)))?;
        let length = checked_len(self.data.bit_len(), PAYLOAD_LENGTH_BITS, "string table data")?;
        writer.write_uint(length, PAYLOAD_LENGTH_BITS)?;
        writer.write_bool(self.user_data_fixed.is_some());
        if let Some((size, bits)) = self.user_data_fixed {
            writer.write_uint(size, 12)?;
            writer.write_uint(bits, 4)?;
        }
        if profile.create_table_compressed_flag {
            writer.write_bool(self.compressed.unwrap_or(false));
        }
        writer.write_bits(&self.data);
        Ok(())
    }
}

impl Describe for SvcCreateStringTable {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("name", &self.name);
        out.field("max entries", self.max_entries);
        out.field("entries", self.num_entries);
        if let Some((size, bits)) = self.user_data_fixed {
            out.field("fixed user data", format_args!("{} bytes, {} bits", size, bits));
        }
        if let Some(compressed) = self.compressed {
            out.field("compressed", compressed);
        }
        describe_blob(out, &self.data);
    }
}

/// Update to an existing string table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcUpdateStringTable {
    pub table_id: u32,
    pub changed_entries: u16,
    pub data: BitBuf,
}

impl Default for SvcUpdateStringTable {
    fn default() -> Self {
        Self {
            table_id: 0,
            changed_entries: 1,
            data: BitBuf::new(),
        }
    }
}

impl Decode for SvcUpdateStringTable {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let table_id = reader.read_uint(STRING_TABLE_ID_BITS)?;
        let changed_entries = if reader.read_bool()? { reader.read_u16()? } else { 1 };
        Ok(Self {
            table_id,
            changed_entries,
            data: read_prefixed(reader, PAYLOAD_LENGTH_BITS)?,
        })
    }
}

impl Encode for SvcUpdateStringTable {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_uint(self.table_id, STRING_TABLE_ID_BITS)?;
        if self.changed_entries == 1 {
            writer.write_bool(false);
        } else {
            writer.write_bool(true);
            writer.write_u16(self.changed_entries);
        }
        write_prefixed(writer, &self.data, PAYLOAD_LENGTH_BITS, "string table update")
    }
}

impl Describe for SvcUpdateStringTable {
    fn describe(&self, out: &mut Describer<'_>) {
        let name = out.tables().table_name(self.table_id as usize).unwrap_or("unknown");
        out.field("table", format_args!("{} ({})", name, self.table_id));
        out.field("changed entries", self.changed_entries);
        describe_blob(out, &self.data);
    }
}

/// Voice codec setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcVoiceInit {
    pub codec: String,
    pub quality: u8,
    pub sample_rate: Option<u16>,
}

impl Decode for SvcVoiceInit {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let codec = reader.read_cstring()?;
        let quality = reader.read_u8()?;
        let sample_rate = if quality == u8::MAX {
            Some(reader.read_u16()?)
        } else {
            None
        };
        Ok(Self {
            codec,
            quality,
            sample_rate,
        })
    }
}

impl Encode for SvcVoiceInit {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_cstring(&self.codec);
        writer.write_u8(self.quality);
        if self.quality == u8::MAX {
            writer.write_u16(self.sample_rate.unwrap_or(0));
        }
        Ok(())
    }
}

impl Describe for SvcVoiceInit {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("codec", &self.codec);
        out.field("quality", self.quality);
        if let Some(rate) = self.sample_rate {
            out.field("sample rate", rate);
        }
    }
}

/// Voice payload from a client.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcVoiceData {
    pub client: u8,
    pub proximity: u8,
    pub data: BitBuf,
}

impl Decode for SvcVoiceData {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            client: reader.read_u8()?,
            proximity: reader.read_u8()?,
            data: read_prefixed(reader, 16)?,
        })
    }
}

impl Encode for SvcVoiceData {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_u8(self.client);
        writer.write_u8(self.proximity);
        write_prefixed(writer, &self.data, 16, "voice data")
    }
}

impl Describe for SvcVoiceData {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("client", self.client);
        out.field("proximity", self.proximity);
        describe_blob(out, &self.data);
    }
}

/// Console text from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcPrint {
    pub message: String,
}

impl Decode for SvcPrint {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            message: reader.read_cstring()?,
        })
    }
}

impl Encode for SvcPrint {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_cstring(&self.message);
        Ok(())
    }
}

impl Describe for SvcPrint {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("message", self.message.trim_end());
    }
}

/// Sound events.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcSounds {
    pub reliable: bool,
    pub sound_count: u8,
    pub data: BitBuf,
}

impl Decode for SvcSounds {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let reliable = reader.read_bool()?;
        let (sound_count, data) = if reliable {
            (1, read_prefixed(reader, 8)?)
        } else {
            (reader.read_u8()?, read_prefixed(reader, 16)?)
        };
        Ok(Self {
            reliable,
            sound_count,
            data,
        })
    }
}

impl Encode for SvcSounds {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bool(self.reliable);
        if self.reliable {
            write_prefixed(writer, &self.data, 8, "reliable sound")
        } else {
            writer.write_u8(self.sound_count);
            write_prefixed(writer, &self.data, 16, "sounds")
        }
    }
}

impl Describe for SvcSounds {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("reliable", self.reliable);
        out.field("sounds", self.sound_count);
        describe_blob(out, &self.data);
    }
}

/// Entity the client view is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcSetView {
    pub entity: u16,
}

impl Decode for SvcSetView {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            entity: reader.read_uint(ENTITY_BITS)? as u16,
        })
    }
}

impl Encode for SvcSetView {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_uint(u32::from(self.entity), ENTITY_BITS)?;
        Ok(())
    }
}

impl Describe for SvcSetView {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("entity", self.entity);
    }
}

/// Forced view angles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcFixAngle {
    pub relative: bool,
    pub angles: [u16; 3],
}

impl Decode for SvcFixAngle {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            relative: reader.read_bool()?,
            angles: read_angles(reader)?,
        })
    }
}

impl Encode for SvcFixAngle {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bool(self.relative);
        write_angles(writer, self.angles);
        Ok(())
    }
}

impl Describe for SvcFixAngle {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("relative", self.relative);
        describe_angles(out, self.angles);
    }
}

/// Crosshair angles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcCrosshairAngle {
    pub angles: [u16; 3],
}

impl Decode for SvcCrosshairAngle {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            angles: read_angles(reader)?,
        })
    }
}

impl Encode for SvcCrosshairAngle {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        write_angles(writer, self.angles);
        Ok(())
    }
}

impl Describe for SvcCrosshairAngle {
    fn describe(&self, out: &mut Describer<'_>) {
        describe_angles(out, self.angles);
    }
}

fn read_angles(reader: &mut BitReader<'_>) -> Result<[u16; 3]> {
    Ok([
        reader.read_uint(ANGLE_BITS)? as u16,
        reader.read_uint(ANGLE_BITS)? as u16,
        reader.read_uint(ANGLE_BITS)? as u16,
    ])
}

fn write_angles(writer: &mut BitWriter, angles: [u16; 3]) {
    for angle in angles {
        writer.write_u16(angle);
    }
}

fn describe_angles(out: &mut Describer<'_>, [pitch, yaw, roll]: [u16; 3]) {
    out.field(
        "angles",
        format_args!(
            "({:.2}, {:.2}, {:.2})",
            angle_degrees(pitch),
            angle_degrees(yaw),
            angle_degrees(roll)
        ),
    );
}

/// World decal placement.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcBspDecal {
    pub position: [f32; 3],
    pub texture_index: u16,
    /// Entity and model the decal is attached to.
    pub entity: Option<(u16, u16)>,
    pub low_priority: bool,
}

impl Decode for SvcBspDecal {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let position = reader.read_bit_vec3_coord()?;
        let texture_index = reader.read_uint(DECAL_TEXTURE_BITS)? as u16;
        let entity = if reader.read_bool()? {
            Some((
                reader.read_uint(ENTITY_BITS)? as u16,
                reader.read_uint(MODEL_INDEX_BITS)? as u16,
            ))
        } else {
            None
        };
        Ok(Self {
            position,
            texture_index,
            entity,
            low_priority: reader.read_bool()?,
        })
    }
}

impl Encode for SvcBspDecal {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bit_vec3_coord(self.position);
        writer.write_uint(u32::from(self.texture_index), DECAL_TEXTURE_BITS)?;
        writer.write_bool(self.entity.is_some());
        if let Some((entity, model)) = self.entity {
            writer.write_uint(u32::from(entity), ENTITY_BITS)?;
            writer.write_uint(u32::from(model), MODEL_INDEX_BITS)?;
        }
        writer.write_bool(self.low_priority);
        Ok(())
    }
}

impl Describe for SvcBspDecal {
    fn describe(&self, out: &mut Describer<'_>) {
        let [x, y, z] = self.position;
        out.field("position", format_args!("({}, {}, {})", x, y, z));
        out.field("texture index", self.texture_index);
        if let Some((entity, model)) = self.entity {
            out.field("entity", entity);
            out.field("model index", model);
        }
        out.field("low priority", self.low_priority);
    }
}

/// Split-screen slot change.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcSplitScreen {
    pub remove_user: bool,
    pub data: BitBuf,
}

impl Decode for SvcSplitScreen {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            remove_user: reader.read_bool()?,
            data: read_prefixed(reader, 11)?,
        })
    }
}

impl Encode for SvcSplitScreen {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bool(self.remove_user);
        write_prefixed(writer, &self.data, 11, "split screen")
    }
}

impl Describe for SvcSplitScreen {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("type", if self.remove_user { "remove user" } else { "add user" });
        describe_blob(out, &self.data);
    }
}

/// Game-specific user message.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcUserMessage {
    pub message_type: u8,
    pub data: BitBuf,
}

impl Decode for SvcUserMessage {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            message_type: reader.read_u8()?,
            data: read_prefixed(reader, ctx.profile.user_message_length_bits)?,
        })
    }
}

impl Encode for SvcUserMessage {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_u8(self.message_type);
        write_prefixed(writer, &self.data, profile.user_message_length_bits, "user message")
    }
}

impl Describe for SvcUserMessage {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("type", self.message_type);
        describe_blob(out, &self.data);
    }
}

/// Message addressed to one entity.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcEntityMessage {
    pub entity: u16,
    pub class_id: u16,
    pub data: BitBuf,
}

impl Decode for SvcEntityMessage {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            entity: reader.read_uint(ENTITY_BITS)? as u16,
            class_id: reader.read_uint(CLASS_ID_BITS)? as u16,
            data: read_prefixed(reader, 11)?,
        })
    }
}

impl Encode for SvcEntityMessage {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_uint(u32::from(self.entity), ENTITY_BITS)?;
        writer.write_uint(u32::from(self.class_id), CLASS_ID_BITS)?;
        write_prefixed(writer, &self.data, 11, "entity message")
    }
}

impl Describe for SvcEntityMessage {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("entity", self.entity);
        match out.registry().get(self.class_id) {
            Some(class) => out.field("class", format_args!("{} ({})", class.class_name, self.class_id)),
            None => out.field("class", self.class_id),
        }
        describe_blob(out, &self.data);
    }
}

/// Game event; the event schema is not decoded.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcGameEvent {
    pub data: BitBuf,
}

impl Decode for SvcGameEvent {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            data: read_prefixed(reader, 11)?,
        })
    }
}

impl Encode for SvcGameEvent {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        write_prefixed(writer, &self.data, 11, "game event")
    }
}

impl Describe for SvcGameEvent {
    fn describe(&self, out: &mut Describer<'_>) {
        describe_blob(out, &self.data);
    }
}

/// Entity state snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcPacketEntities {
    pub max_entries: u16,
    pub delta_from: Option<i32>,
    pub baseline: bool,
    pub updated_entries: u16,
    pub update_baseline: bool,
    pub data: BitBuf,
}

impl Decode for SvcPacketEntities {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let max_entries = reader.read_uint(ENTITY_BITS)? as u16;
        let delta_from = if reader.read_bool()? {
            Some(reader.read_i32()?)
        } else {
            None
        };
        let baseline = reader.read_bool()?;
        let updated_entries = reader.read_uint(ENTITY_BITS)? as u16;
        let length = reader.read_uint(PAYLOAD_LENGTH_BITS)? as usize;
        let update_baseline = reader.read_bool()?;
        Ok(Self {
            max_entries,
            delta_from,
            baseline,
            updated_entries,
            update_baseline,
            data: reader.read_bits(length)?,
        })
    }
}

impl Encode for SvcPacketEntities {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_uint(u32::from(self.max_entries), ENTITY_BITS)?;
        writer.write_bool(self.delta_from.is_some());
        if let Some(delta) = self.delta_from {
            writer.write_i32(delta);
        }
        writer.write_bool(self.baseline);
        writer.write_uint(u32::from(self.updated_entries), ENTITY_BITS)?;
        let length = checked_len(self.data.bit_len(), PAYLOAD_LENGTH_BITS, "packet entities")?;
        writer.write_uint(length, PAYLOAD_LENGTH_BITS)?;
        writer.write_bool(self.update_baseline);
        writer.write_bits(&self.data);
        Ok(())
    }
}

impl Describe for SvcPacketEntities {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("max entries", self.max_entries);
        match self.delta_from {
            Some(tick) => out.field("delta from", tick),
            None => out.field("delta from", "full update"),
        }
        out.field("baseline", u8::from(self.baseline));
        out.field("updated entries", self.updated_entries);
        out.field("update baseline", self.update_baseline);
        describe_blob(out, &self.data);
    }
}

/// Temporary entities.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcTempEntities {
    pub count: u8,
    pub data: BitBuf,
}

impl Decode for SvcTempEntities {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            count: reader.read_u8()?,
            data: read_prefixed(reader, 17)?,
        })
    }
}

impl Encode for SvcTempEntities {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_u8(self.count);
        write_prefixed(writer, &self.data, 17, "temp entities")
    }
}

impl Describe for SvcTempEntities {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("count", self.count);
        describe_blob(out, &self.data);
    }
}

/// Sound precache hint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcPrefetch {
    pub sound_index: u16,
}

impl Decode for SvcPrefetch {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            sound_index: reader.read_uint(SOUND_INDEX_BITS)? as u16,
        })
    }
}

impl Encode for SvcPrefetch {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_uint(u32::from(self.sound_index), SOUND_INDEX_BITS)?;
        Ok(())
    }
}

impl Describe for SvcPrefetch {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("sound index", self.sound_index);
    }
}

/// Plugin menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcMenu {
    pub menu_type: u16,
    pub data: Vec<u8>,
}

impl Decode for SvcMenu {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let menu_type = reader.read_u16()?;
        let length = reader.read_u16()?;
        Ok(Self {
            menu_type,
            data: reader.read_bytes(length as usize)?,
        })
    }
}

impl Encode for SvcMenu {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_u16(self.menu_type);
        writer.write_uint(checked_len(self.data.len(), 16, "menu")?, 16)?;
        writer.write_bytes(&self.data);
        Ok(())
    }
}

impl Describe for SvcMenu {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("type", self.menu_type);
        out.field("data", format_args!("{} bytes", self.data.len()));
    }
}

/// Game event descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcGameEventList {
    pub event_count: u16,
    pub data: BitBuf,
}

impl Decode for SvcGameEventList {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            event_count: reader.read_uint(9)? as u16,
            data: read_prefixed(reader, PAYLOAD_LENGTH_BITS)?,
        })
    }
}

impl Encode for SvcGameEventList {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_uint(u32::from(self.event_count), 9)?;
        write_prefixed(writer, &self.data, PAYLOAD_LENGTH_BITS, "game event list")
    }
}

impl Describe for SvcGameEventList {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("events", self.event_count);
        describe_blob(out, &self.data);
    }
}

/// Query for a client console variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcGetCvarValue {
    pub cookie: i32,
    pub cvar_name: String,
}

impl Decode for SvcGetCvarValue {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            cookie: reader.read_i32()?,
            cvar_name: reader.read_cstring()?,
        })
    }
}

impl Encode for SvcGetCvarValue {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_i32(self.cookie);
        writer.write_cstring(&self.cvar_name);
        Ok(())
    }
}

impl Describe for SvcGetCvarValue {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("cookie", self.cookie);
        out.field("cvar", &self.cvar_name);
    }
}

/// Key-values blob filling the rest of the enclosing payload.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcCmdKeyValues {
    pub data: BitBuf,
}

impl Decode for SvcCmdKeyValues {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            data: reader.read_bits(reader.remaining_bits())?,
        })
    }
}

impl Encode for SvcCmdKeyValues {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bits(&self.data);
        Ok(())
    }
}

impl Describe for SvcCmdKeyValues {
    fn describe(&self, out: &mut Describer<'_>) {
        describe_blob(out, &self.data);
    }
}

/// Paint map data.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SvcPaintmapData {
    pub data: BitBuf,
}

impl Decode for SvcPaintmapData {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            data: read_prefixed(reader, 32)?,
        })
    }
}

impl Encode for SvcPaintmapData {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        write_prefixed(writer, &self.data, 32, "paint map")
    }
}

impl Describe for SvcPaintmapData {
    fn describe(&self, out: &mut Describer<'_>) {
        describe_blob(out, &self.data);
    }
}
