//! Engine profiles: the per-version layout parameters of a demo.
//!
//! Demo files written by different engine branches share the frame/message
//! framing but differ in field widths, tag numbering and a handful of optional
//! fields. An [`EngineProfile`] captures those differences so the decoders
//! stay version-agnostic.

use crate::datatables::SendPropType;
use crate::header::DemoHeader;
use crate::message::MessageKind;
use crate::packet::PacketKind;
use crate::{Error, Result};

/// Order of the fields in a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FrameLayout {
    /// `[kind: u8][tick: i32]`, the order the engine writes.
    CommandFirst,
    /// `[tick: i32][kind: u8]`.
    TickFirst,
}

/// How a net message tag is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSpec {
    /// A message from the built-in catalog.
    Known(MessageKind),
    /// A length-prefixed message stored as an opaque payload.
    Opaque { name: String, length_bits: u32 },
}

/// Layout parameters for one engine branch.
#[derive(Debug, Clone)]
pub struct EngineProfile {
    /// Short profile name, e.g. `orange_box`.
    pub name: &'static str,
    /// Demo protocol this profile was built for.
    pub demo_protocol: i32,
    /// Field order of frame headers.
    pub frame_layout: FrameLayout,
    /// Frame headers carry a player slot byte after the tick.
    pub player_slot: bool,
    /// Number of split-screen command-info blocks in sign-on/packet frames.
    pub cmd_info_slots: usize,
    /// Width of a net message tag.
    pub message_tag_bits: u32,
    /// Width of the send-prop flags field.
    pub send_prop_flag_bits: u32,
    /// Send props carry a priority byte.
    pub send_prop_priority: bool,
    /// Send-prop type numbering.
    pub send_prop_types: &'static [SendPropType],
    /// Width of the user message length prefix.
    pub user_message_length_bits: u32,
    /// Width of the file flags in a file transfer message.
    pub net_file_flag_bits: u32,
    /// Tick messages carry host frame time and its deviation.
    pub tick_frame_time: bool,
    /// Sign-on state messages carry player count, player ids and map name.
    pub signon_state_extended: bool,
    /// Server info carries a string table CRC.
    pub server_info_string_table_crc: bool,
    /// String table creation carries a compression flag.
    pub create_table_compressed_flag: bool,
    packet_tags: Vec<(u8, PacketKind)>,
    messages: Vec<Option<MessageSpec>>,
}

const SEND_PROP_TYPES_LEGACY: &[SendPropType] = &[
    SendPropType::Int,
    SendPropType::Float,
    SendPropType::Vector,
    SendPropType::String,
    SendPropType::Array,
    SendPropType::DataTable,
];

const SEND_PROP_TYPES: &[SendPropType] = &[
    SendPropType::Int,
    SendPropType::Float,
    SendPropType::Vector,
    SendPropType::VectorXY,
    SendPropType::String,
    SendPropType::Array,
    SendPropType::DataTable,
];

const PACKET_TAGS: &[(u8, PacketKind)] = &[
    (1, PacketKind::SignOn),
    (2, PacketKind::Packet),
    (3, PacketKind::SyncTick),
    (4, PacketKind::ConsoleCmd),
    (5, PacketKind::UserCmd),
    (6, PacketKind::DataTables),
    (7, PacketKind::Stop),
];

/// Message numbering shared by the 2006-era branches.
const MESSAGES_ORANGE_BOX: &[(u32, MessageKind)] = &[
    (0, MessageKind::NetNop),
    (1, MessageKind::NetDisconnect),
    (2, MessageKind::NetFile),
    (3, MessageKind::NetTick),
    (4, MessageKind::NetStringCmd),
    (5, MessageKind::NetSetConVar),
    (6, MessageKind::NetSignOnState),
    (7, MessageKind::SvcPrint),
    (8, MessageKind::SvcServerInfo),
    (9, MessageKind::SvcSendTable),
    (10, MessageKind::SvcClassInfo),
    (11, MessageKind::SvcSetPause),
    (12, MessageKind::SvcCreateStringTable),
    (13, MessageKind::SvcUpdateStringTable),
    (14, MessageKind::SvcVoiceInit),
    (15, MessageKind::SvcVoiceData),
    (17, MessageKind::SvcSounds),
    (18, MessageKind::SvcSetView),
    (19, MessageKind::SvcFixAngle),
    (20, MessageKind::SvcCrosshairAngle),
    (21, MessageKind::SvcBspDecal),
    (23, MessageKind::SvcUserMessage),
    (24, MessageKind::SvcEntityMessage),
    (25, MessageKind::SvcGameEvent),
    (26, MessageKind::SvcPacketEntities),
    (27, MessageKind::SvcTempEntities),
    (28, MessageKind::SvcPrefetch),
    (29, MessageKind::SvcMenu),
    (30, MessageKind::SvcGameEventList),
    (31, MessageKind::SvcGetCvarValue),
    (32, MessageKind::SvcCmdKeyValues),
];

const MESSAGES_PORTAL2: &[(u32, MessageKind)] = &[
    (0, MessageKind::NetNop),
    (1, MessageKind::NetDisconnect),
    (2, MessageKind::NetFile),
    (3, MessageKind::NetSplitScreenUser),
    (4, MessageKind::NetTick),
    (5, MessageKind::NetStringCmd),
    (6, MessageKind::NetSetConVar),
    (7, MessageKind::NetSignOnState),
    (8, MessageKind::SvcServerInfo),
    (9, MessageKind::SvcSendTable),
    (10, MessageKind::SvcClassInfo),
    (11, MessageKind::SvcSetPause),
    (12, MessageKind::SvcCreateStringTable),
    (13, MessageKind::SvcUpdateStringTable),
    (14, MessageKind::SvcVoiceInit),
    (15, MessageKind::SvcVoiceData),
    (16, MessageKind::SvcPrint),
    (17, MessageKind::SvcSounds),
    (18, MessageKind::SvcSetView),
    (19, MessageKind::SvcFixAngle),
    (20, MessageKind::SvcCrosshairAngle),
    (21, MessageKind::SvcBspDecal),
    (22, MessageKind::SvcSplitScreen),
    (23, MessageKind::SvcUserMessage),
    (24, MessageKind::SvcEntityMessage),
    (25, MessageKind::SvcGameEvent),
    (26, MessageKind::SvcPacketEntities),
    (27, MessageKind::SvcTempEntities),
    (28, MessageKind::SvcPrefetch),
    (29, MessageKind::SvcMenu),
    (30, MessageKind::SvcGameEventList),
    (31, MessageKind::SvcGetCvarValue),
    (32, MessageKind::SvcCmdKeyValues),
    (33, MessageKind::SvcPaintmapData),
];

impl EngineProfile {
    /// Demo protocol 2: early Source builds.
    pub fn legacy() -> Self {
        let mut packet_tags = PACKET_TAGS.to_vec();
        packet_tags.push((8, PacketKind::StringTables));
        Self {
            name: "legacy",
            demo_protocol: 2,
            frame_layout: FrameLayout::CommandFirst,
            player_slot: false,
            cmd_info_slots: 1,
            message_tag_bits: 5,
            send_prop_flag_bits: 16,
            send_prop_priority: false,
            send_prop_types: SEND_PROP_TYPES_LEGACY,
            user_message_length_bits: 11,
            net_file_flag_bits: 1,
            tick_frame_time: false,
            signon_state_extended: false,
            server_info_string_table_crc: false,
            create_table_compressed_flag: false,
            packet_tags,
            messages: message_table(5, MESSAGES_ORANGE_BOX),
        }
    }

    /// Demo protocol 3: Orange Box era builds.
    pub fn orange_box() -> Self {
        Self {
            name: "orange_box",
            demo_protocol: 3,
            message_tag_bits: 6,
            send_prop_types: SEND_PROP_TYPES,
            tick_frame_time: true,
            create_table_compressed_flag: true,
            messages: message_table(6, MESSAGES_ORANGE_BOX),
            ..Self::legacy()
        }
    }

    /// Demo protocol 4: Portal 2 era builds with split-screen support.
    pub fn portal2() -> Self {
        let mut packet_tags = PACKET_TAGS.to_vec();
        packet_tags.push((8, PacketKind::CustomData));
        packet_tags.push((9, PacketKind::StringTables));
        Self {
            name: "portal2",
            demo_protocol: 4,
            player_slot: true,
            cmd_info_slots: 2,
            send_prop_flag_bits: 19,
            send_prop_priority: true,
            user_message_length_bits: 12,
            net_file_flag_bits: 2,
            signon_state_extended: true,
            server_info_string_table_crc: true,
            packet_tags,
            messages: message_table(6, MESSAGES_PORTAL2),
            ..Self::orange_box()
        }
    }

    /// Select the profile for a demo protocol.
    pub fn for_protocol(demo_protocol: i32, network_protocol: i32) -> Result<Self> {
        match demo_protocol {
            2 => Ok(Self::legacy()),
            3 => Ok(Self::orange_box()),
            4 => Ok(Self::portal2()),
            _ => Err(Error::UnsupportedProtocol {
                demo: demo_protocol,
                network: network_protocol,
            }),
        }
    }

    /// Select the profile matching a parsed header.
    pub fn for_header(header: &DemoHeader) -> Result<Self> {
        Self::for_protocol(header.demo_protocol, header.network_protocol)
    }

    /// Use a different frame header field order.
    pub fn with_frame_layout(mut self, layout: FrameLayout) -> Self {
        self.frame_layout = layout;
        self
    }

    /// Register a length-prefixed message kind stored as an opaque payload.
    ///
    /// Replaces whatever the tag decoded to before.
    pub fn register_opaque(&mut self, tag: u32, name: impl Into<String>, length_bits: u32) -> Result<()> {
        if length_bits == 0 || length_bits > 32 {
            return Err(srcdemo_common::Error::InvalidBitWidth(length_bits).into());
        }
        let slot = self.messages.get_mut(tag as usize).ok_or(Error::InvalidTag {
            tag,
            bits: self.message_tag_bits,
        })?;
        *slot = Some(MessageSpec::Opaque {
            name: name.into(),
            length_bits,
        });
        Ok(())
    }

    /// Packet kind for a frame header tag.
    pub fn packet_kind(&self, tag: u8) -> Option<PacketKind> {
        self.packet_tags.iter().find(|(t, _)| *t == tag).map(|(_, kind)| *kind)
    }

    /// Frame header tag for a packet kind.
    pub fn packet_tag(&self, kind: PacketKind) -> Option<u8> {
        self.packet_tags.iter().find(|(_, k)| *k == kind).map(|(tag, _)| *tag)
    }

    /// Decoder selection for a message tag.
    pub fn message_spec(&self, tag: u32) -> Option<&MessageSpec> {
        self.messages.get(tag as usize).and_then(Option::as_ref)
    }

    /// Tag of a built-in message kind.
    pub fn message_tag(&self, kind: MessageKind) -> Option<u32> {
        self.messages
            .iter()
            .position(|spec| spec.as_ref() == Some(&MessageSpec::Known(kind)))
            .map(|tag| tag as u32)
    }

    /// Tag of a registered opaque message kind.
    pub fn opaque_tag(&self, name: &str) -> Option<u32> {
        self.messages
            .iter()
            .position(|spec| matches!(spec, Some(MessageSpec::Opaque { name: n, .. }) if n == name))
            .map(|tag| tag as u32)
    }

    /// Size of a frame header in bytes.
    pub fn frame_header_len(&self) -> usize {
        5 + usize::from(self.player_slot)
    }
}

fn message_table(tag_bits: u32, entries: &[(u32, MessageKind)]) -> Vec<Option<MessageSpec>> {
    let mut table = vec![None; 1usize << tag_bits];
    for &(tag, kind) in entries {
        if let Some(slot) = table.get_mut(tag as usize) {
            *slot = Some(MessageSpec::Known(kind));
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_selection() {
        assert_eq!(EngineProfile::for_protocol(2, 7).unwrap().name, "legacy");
        assert_eq!(EngineProfile::for_protocol(3, 14).unwrap().name, "orange_box");
        assert_eq!(EngineProfile::for_protocol(4, 2001).unwrap().name, "portal2");

        let err = EngineProfile::for_protocol(36, 13881).unwrap_err();
        assert!(matches!(err, Error::UnsupportedProtocol { demo: 36, .. }));
        assert!(err.is_header_error());
    }

    #[test]
    fn test_packet_tags() {
        let portal2 = EngineProfile::portal2();
        assert_eq!(portal2.packet_kind(8), Some(PacketKind::CustomData));
        assert_eq!(portal2.packet_kind(9), Some(PacketKind::StringTables));
        assert_eq!(portal2.packet_tag(PacketKind::Stop), Some(7));
        assert_eq!(portal2.frame_header_len(), 6);

        let legacy = EngineProfile::legacy();
        assert_eq!(legacy.packet_kind(8), Some(PacketKind::StringTables));
        assert_eq!(legacy.packet_kind(9), None);
        assert_eq!(legacy.packet_tag(PacketKind::CustomData), None);
        assert_eq!(legacy.frame_header_len(), 5);
    }

    #[test]
    fn test_message_numbering() {
        let orange_box = EngineProfile::orange_box();
        let portal2 = EngineProfile::portal2();

        assert_eq!(orange_box.message_tag(MessageKind::NetTick), Some(3));
        assert_eq!(portal2.message_tag(MessageKind::NetTick), Some(4));
        assert_eq!(orange_box.message_tag(MessageKind::SvcPrint), Some(7));
        assert_eq!(portal2.message_tag(MessageKind::SvcPrint), Some(16));

        for profile in [&orange_box, &portal2] {
            assert_eq!(profile.message_tag(MessageKind::SvcSetPause), Some(11));
            assert_eq!(profile.message_tag(MessageKind::SvcSetView), Some(18));
        }

        assert_eq!(orange_box.message_tag(MessageKind::SvcPaintmapData), None);
        assert_eq!(EngineProfile::legacy().message_tag(MessageKind::SvcCmdKeyValues), None);
    }

    #[test]
    fn test_register_opaque() {
        let mut profile = EngineProfile::orange_box();
        assert!(profile.message_spec(22).is_none());

        profile.register_opaque(22, "svc_TerrainMod", 16).unwrap();
        assert_eq!(
            profile.message_spec(22),
            Some(&MessageSpec::Opaque {
                name: "svc_TerrainMod".to_string(),
                length_bits: 16
            })
        );
        assert_eq!(profile.opaque_tag("svc_TerrainMod"), Some(22));

        assert!(matches!(
            profile.register_opaque(64, "too_wide", 8),
            Err(Error::InvalidTag { tag: 64, bits: 6 })
        ));
        assert!(profile.register_opaque(40, "bad_width", 0).is_err());
    }
}
