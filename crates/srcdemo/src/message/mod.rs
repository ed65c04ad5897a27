//! Net messages: the tagged, bit-packed units nested in sign-on and packet
//! frames.
//!
//! Every message starts with a tag whose width and numbering come from the
//! [`EngineProfile`]. The tag selects either a built-in decoder from the
//! catalog below or a profile-registered opaque kind. A tag with neither is a
//! hard fault, since there is no way to know how many bits to skip.

mod net;
mod svc;

use srcdemo_common::{BitBuf, BitReader, BitWriter, BITS_PER_BYTE};
use tracing::trace;

use crate::component::{read_prefixed, write_prefixed, Decode, DecodeContext, Encode};
use crate::describe::{Describe, Describer};
use crate::profile::{EngineProfile, MessageSpec};
use crate::{Error, Result};

pub use net::*;
pub use svc::*;

/// A message kind registered with [`EngineProfile::register_opaque`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OpaqueMessage {
    pub name: String,
    pub length_bits: u32,
    pub data: BitBuf,
}

impl OpaqueMessage {
    fn decode(reader: &mut BitReader<'_>, name: &str, length_bits: u32) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            length_bits,
            data: read_prefixed(reader, length_bits)?,
        })
    }

    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        write_prefixed(writer, &self.data, self.length_bits, "opaque message")
    }
}

impl Describe for OpaqueMessage {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("data", format_args!("{} bits", self.data.bit_len()));
    }
}

/// A message type that can be picked out of a [`NetMessage`].
pub trait MessageVariant: Sized {
    const KIND: MessageKind;

    fn from_message(message: &NetMessage) -> Option<&Self>;
}

macro_rules! message_catalog {
    ($($kind:ident),* $(,)?) => {
        /// Kind of a built-in net message.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum MessageKind {
            $($kind,)*
        }

        impl MessageKind {
            /// Every built-in kind.
            pub const ALL: &'static [MessageKind] = &[$(MessageKind::$kind,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(MessageKind::$kind => stringify!($kind),)*
                }
            }
        }

        /// A decoded net message.
        #[derive(Debug, Clone, PartialEq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum NetMessage {
            $($kind($kind),)*
            Opaque(OpaqueMessage),
        }

        impl NetMessage {
            /// Built-in kind, or `None` for opaque messages.
            pub fn kind(&self) -> Option<MessageKind> {
                match self {
                    $(NetMessage::$kind(_) => Some(MessageKind::$kind),)*
                    NetMessage::Opaque(_) => None,
                }
            }

            /// Kind name; opaque messages use their registered name.
            pub fn name(&self) -> &str {
                match self {
                    $(NetMessage::$kind(_) => stringify!($kind),)*
                    NetMessage::Opaque(message) => &message.name,
                }
            }

            fn decode_known(
                kind: MessageKind,
                reader: &mut BitReader<'_>,
                ctx: &mut DecodeContext<'_>,
            ) -> Result<Self> {
                match kind {
                    $(MessageKind::$kind => $kind::decode(reader, ctx).map(NetMessage::$kind),)*
                }
            }

            fn encode_body(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
                match self {
                    $(NetMessage::$kind(message) => message.encode(writer, profile),)*
                    NetMessage::Opaque(message) => message.encode(writer),
                }
            }

            fn describe_body(&self, out: &mut Describer<'_>) {
                match self {
                    $(NetMessage::$kind(message) => message.describe(out),)*
                    NetMessage::Opaque(message) => message.describe(out),
                }
            }
        }

        $(
            impl From<$kind> for NetMessage {
                fn from(message: $kind) -> Self {
                    NetMessage::$kind(message)
                }
            }

            impl MessageVariant for $kind {
                const KIND: MessageKind = MessageKind::$kind;

                fn from_message(message: &NetMessage) -> Option<&Self> {
                    match message {
                        NetMessage::$kind(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

message_catalog! {
    NetNop,
    NetDisconnect,
    NetFile,
    NetSplitScreenUser,
    NetTick,
    NetStringCmd,
    NetSetConVar,
    NetSignOnState,
    SvcServerInfo,
    SvcSendTable,
    SvcClassInfo,
    SvcSetPause,
    SvcCreateStringTable,
    SvcUpdateStringTable,
    SvcVoiceInit,
    SvcVoiceData,
    SvcPrint,
    SvcSounds,
    SvcSetView,
    SvcFixAngle,
    SvcCrosshairAngle,
    SvcBspDecal,
    SvcSplitScreen,
    SvcUserMessage,
    SvcEntityMessage,
    SvcGameEvent,
    SvcPacketEntities,
    SvcTempEntities,
    SvcPrefetch,
    SvcMenu,
    SvcGameEventList,
    SvcGetCvarValue,
    SvcCmdKeyValues,
    SvcPaintmapData,
}

impl NetMessage {
    /// Decode one message, tag included.
    pub fn decode_tagged(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let position = reader.position();
        let tag = reader.read_uint(ctx.profile.message_tag_bits)?;
        let message = match ctx.profile.message_spec(tag) {
            Some(MessageSpec::Known(kind)) => Self::decode_known(*kind, reader, ctx)?,
            Some(MessageSpec::Opaque { name, length_bits }) => {
                NetMessage::Opaque(OpaqueMessage::decode(reader, name, *length_bits)?)
            }
            None => return Err(Error::UnknownMessage { tag, position }),
        };
        trace!(tag, kind = message.name(), bits = reader.position() - position, "decoded message");
        Ok(message)
    }

    /// Encode one message, tag included.
    pub fn encode_tagged(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        let tag = match self {
            NetMessage::Opaque(message) => profile.opaque_tag(&message.name),
            other => other.kind().and_then(|kind| profile.message_tag(kind)),
        }
        .ok_or_else(|| Error::NotInProfile(self.static_name()))?;
        writer.write_uint(tag, profile.message_tag_bits)?;
        self.encode_body(writer, profile)
    }

    fn static_name(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.name(),
            None => "opaque message",
        }
    }
}

impl Describe for NetMessage {
    fn describe(&self, out: &mut Describer<'_>) {
        out.heading(self.name());
        out.indented(|out| self.describe_body(out));
    }
}

/// Decode messages until the reader is exhausted.
///
/// Fewer than eight trailing bits that are all zero are byte padding, not a
/// message.
pub fn decode_stream(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Vec<NetMessage>> {
    let mut messages = Vec::new();
    while !reader.is_empty() {
        if reader.remaining_bits() < BITS_PER_BYTE && reader.remaining_is_zero() {
            reader.skip_bits(reader.remaining_bits())?;
            break;
        }
        messages.push(NetMessage::decode_tagged(reader, ctx)?);
    }
    Ok(messages)
}

/// Encode a message sequence, zero-padded to whole bytes.
pub fn encode_stream(messages: &[NetMessage], profile: &EngineProfile) -> Result<Vec<u8>> {
    let mut writer = BitWriter::new();
    for message in messages {
        message.encode_tagged(&mut writer, profile)?;
    }
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatables::ClassRegistry;
    use crate::describe::describe_standalone;
    use crate::stringtables::StringTableTracker;

    fn decode_all(bytes: &[u8], profile: &EngineProfile) -> Result<Vec<NetMessage>> {
        let registry = ClassRegistry::default();
        let mut tables = StringTableTracker::default();
        let mut ctx = DecodeContext {
            profile,
            registry: &registry,
            tables: &mut tables,
        };
        let mut reader = BitReader::new(bytes);
        decode_stream(&mut reader, &mut ctx)
    }

    fn round_trip(messages: Vec<NetMessage>, profile: &EngineProfile) {
        let bytes = encode_stream(&messages, profile).unwrap();
        let decoded = decode_all(&bytes, profile).unwrap();
        assert_eq!(decoded, messages);
        let again = decode_all(&encode_stream(&decoded, profile).unwrap(), profile).unwrap();
        assert_eq!(again, decoded);
    }

    #[test]
    fn test_set_pause_and_set_view_bits() {
        let profile = EngineProfile::portal2();
        let messages = decode_all(&[0x4B], &profile).unwrap();
        assert_eq!(messages, vec![NetMessage::SvcSetPause(SvcSetPause { paused: true })]);

        let messages = decode_all(&[0x52, 0x01, 0x00], &profile).unwrap();
        assert_eq!(messages, vec![NetMessage::SvcSetView(SvcSetView { entity: 5 })]);
        assert_eq!(describe_standalone(&messages[0]), "SvcSetView\n  entity: 5\n");
    }

    #[test]
    fn test_trailing_padding_is_not_a_message() {
        let profile = EngineProfile::portal2();
        // A zero byte is a full Nop, not padding.
        let messages = decode_all(&[0x00], &profile).unwrap();
        assert_eq!(messages, vec![NetMessage::NetNop(NetNop)]);

        // SetPause leaves one zero bit behind.
        assert_eq!(decode_all(&[0x0B], &profile).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let profile = EngineProfile::orange_box();
        // Tag 16 has no decoder in this profile.
        let err = decode_all(&[16], &profile).unwrap_err();
        assert!(matches!(err, Error::UnknownMessage { tag: 16, position: 0 }));
        assert!(!err.is_header_error());
    }

    #[test]
    fn test_opaque_fallback_consumes_declared_length() {
        let mut profile = EngineProfile::orange_box();
        profile.register_opaque(16, "svc_HLTV", 12).unwrap();

        for length in [0usize, 1, 9, 300] {
            let message = NetMessage::Opaque(OpaqueMessage {
                name: "svc_HLTV".to_string(),
                length_bits: 12,
                data: BitBuf::from_parts(vec![0x5A; 40], length),
            });
            let mut writer = BitWriter::new();
            message.encode_tagged(&mut writer, &profile).unwrap();
            let bits = writer.finish();
            assert_eq!(bits.bit_len(), 6 + 12 + length);

            let registry = ClassRegistry::default();
            let mut tables = StringTableTracker::default();
            let mut ctx = DecodeContext {
                profile: &profile,
                registry: &registry,
                tables: &mut tables,
            };
            let mut reader = bits.reader();
            assert_eq!(NetMessage::decode_tagged(&mut reader, &mut ctx).unwrap(), message);
            assert_eq!(reader.position(), 6 + 12 + length);
        }
    }

    #[test]
    fn test_blob_messages_consume_exactly() {
        let profile = EngineProfile::portal2();
        for length in [0usize, 5, 64, 1000] {
            let data = BitBuf::from_parts(vec![0xC3; 125], length);
            let cases: Vec<(NetMessage, usize)> = vec![
                (SvcGameEvent { data: data.clone() }.into(), 11),
                (
                    SvcTempEntities {
                        count: 3,
                        data: data.clone(),
                    }
                    .into(),
                    8 + 17,
                ),
            ];
            for (message, header_bits) in cases {
                let mut writer = BitWriter::new();
                message.encode_tagged(&mut writer, &profile).unwrap();
                writer.write_uint(0x2A, 6).unwrap();
                let bits = writer.finish();

                let registry = ClassRegistry::default();
                let mut tables = StringTableTracker::default();
                let mut ctx = DecodeContext {
                    profile: &profile,
                    registry: &registry,
                    tables: &mut tables,
                };
                let mut reader = bits.reader();
                let decoded = NetMessage::decode_tagged(&mut reader, &mut ctx).unwrap();
                assert_eq!(decoded, message);
                assert_eq!(reader.position(), 6 + header_bits + length);
                assert_eq!(reader.read_uint(6).unwrap(), 0x2A);
            }
        }
    }

    #[test]
    fn test_key_values_takes_the_rest() {
        let profile = EngineProfile::portal2();
        let message: NetMessage = SvcCmdKeyValues {
            data: BitBuf::from_bytes(b"\x01key\0value\0".to_vec()),
        }
        .into();
        let bytes = encode_stream(std::slice::from_ref(&message), &profile).unwrap();
        let decoded = decode_all(&bytes, &profile).unwrap();
        assert_eq!(decoded.len(), 1);
        match &decoded[0] {
            // The stream pads to a byte, so the blob absorbs the padding.
            NetMessage::SvcCmdKeyValues(kv) => assert_eq!(kv.data.bit_len(), bytes.len() * 8 - 6),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_portal2() {
        let profile = EngineProfile::portal2();
        round_trip(
            vec![
                NetTick {
                    tick: 1234,
                    frame_time: Some((1500, 20)),
                }
                .into(),
                NetSplitScreenUser { second_player: true }.into(),
                NetSetConVar {
                    convars: vec![("sv_cheats".to_string(), "1".to_string())],
                }
                .into(),
                NetSignOnState {
                    state: 6,
                    spawn_count: 3,
                    players: Some(SignOnPlayers {
                        server_players: 1,
                        player_ids: vec![1, 2, 3, 4],
                        map_name: b"sp_a1_intro1\0".to_vec(),
                    }),
                }
                .into(),
                SvcServerInfo {
                    network_protocol: 2001,
                    server_count: 7,
                    is_dedicated: true,
                    client_crc: -17,
                    string_table_crc: Some(0xDEAD_BEEF),
                    max_classes: 250,
                    tick_interval: 1.0 / 60.0,
                    os: b'W',
                    game_dir: "portal2".to_string(),
                    map_name: "sp_a1_intro1".to_string(),
                    sky_name: "sky_black".to_string(),
                    host_name: "Portal 2".to_string(),
                    ..Default::default()
                }
                .into(),
                SvcClassInfo {
                    class_count: 1,
                    create_on_client: false,
                    classes: vec![crate::datatables::ClassRecord {
                        index: 2,
                        class_name: "CWorld".to_string(),
                        data_table_name: "DT_World".to_string(),
                    }],
                }
                .into(),
                SvcCreateStringTable {
                    name: "downloadables".to_string(),
                    max_entries: 8192,
                    num_entries: 1,
                    user_data_fixed: Some((2, 12)),
                    compressed: Some(false),
                    data: BitBuf::from_parts(vec![0xFF, 0x01], 9),
                }
                .into(),
                SvcUpdateStringTable {
                    table_id: 0,
                    changed_entries: 4,
                    data: BitBuf::from_parts(vec![0x7F], 7),
                }
                .into(),
                SvcVoiceInit {
                    codec: "vaudio_celt".to_string(),
                    quality: 255,
                    sample_rate: Some(22050),
                }
                .into(),
                SvcSounds {
                    reliable: true,
                    sound_count: 1,
                    data: BitBuf::from_parts(vec![0x12, 0x34], 13),
                }
                .into(),
                SvcSounds {
                    reliable: false,
                    sound_count: 4,
                    data: BitBuf::from_parts(vec![0x12, 0x34], 16),
                }
                .into(),
                SvcFixAngle {
                    relative: true,
                    angles: [0, 16384, 65535],
                }
                .into(),
                SvcBspDecal {
                    position: [128.0, -64.5, 0.0],
                    texture_index: 40,
                    entity: Some((1, 2)),
                    low_priority: true,
                }
                .into(),
                SvcPacketEntities {
                    max_entries: 2048,
                    delta_from: Some(100),
                    baseline: true,
                    updated_entries: 12,
                    update_baseline: false,
                    data: BitBuf::from_parts(vec![0xAA; 4], 30),
                }
                .into(),
                SvcMenu {
                    menu_type: 2,
                    data: b"menu".to_vec(),
                }
                .into(),
                SvcGetCvarValue {
                    cookie: 42,
                    cvar_name: "cl_fov".to_string(),
                }
                .into(),
                SvcPaintmapData {
                    data: BitBuf::from_parts(vec![0x0F], 4),
                }
                .into(),
                SvcPrint {
                    message: "hello\n".to_string(),
                }
                .into(),
            ],
            &profile,
        );
    }

    #[test]
    fn test_round_trip_legacy() {
        let profile = EngineProfile::legacy();
        round_trip(
            vec![
                NetTick {
                    tick: 99,
                    frame_time: None,
                }
                .into(),
                NetSignOnState {
                    state: 2,
                    spawn_count: 1,
                    players: None,
                }
                .into(),
                SvcCreateStringTable {
                    name: "soundprecache".to_string(),
                    max_entries: 1024,
                    num_entries: 0,
                    user_data_fixed: None,
                    compressed: None,
                    data: BitBuf::new(),
                }
                .into(),
                SvcUserMessage {
                    message_type: 5,
                    data: BitBuf::from_parts(vec![0x01], 3),
                }
                .into(),
            ],
            &profile,
        );
    }

    #[test]
    fn test_kind_missing_from_profile() {
        let profile = EngineProfile::orange_box();
        let message: NetMessage = SvcPaintmapData::default().into();
        let mut writer = BitWriter::new();
        assert!(matches!(
            message.encode_tagged(&mut writer, &profile),
            Err(Error::NotInProfile("SvcPaintmapData"))
        ));
    }

    #[test]
    fn test_create_string_table_registers_name() {
        let profile = EngineProfile::portal2();
        let message: NetMessage = SvcCreateStringTable {
            name: "userinfo".to_string(),
            max_entries: 256,
            ..Default::default()
        }
        .into();
        let update: NetMessage = SvcUpdateStringTable::default().into();
        let bytes = encode_stream(&[message, update], &profile).unwrap();

        let registry = ClassRegistry::default();
        let mut tables = StringTableTracker::default();
        let mut ctx = DecodeContext {
            profile: &profile,
            registry: &registry,
            tables: &mut tables,
        };
        let decoded = decode_stream(&mut BitReader::new(&bytes), &mut ctx).unwrap();
        assert_eq!(tables.table_name(0), Some("userinfo"));

        let mut out = Describer::new(&registry, &tables);
        decoded[1].describe(&mut out);
        assert!(out.finish().contains("table: userinfo (0)"));
    }

    #[test]
    fn test_variant_lookup() {
        let message: NetMessage = SvcSetPause { paused: true }.into();
        assert_eq!(SvcSetPause::from_message(&message), Some(&SvcSetPause { paused: true }));
        assert!(SvcSetView::from_message(&message).is_none());
        assert_eq!(message.kind(), Some(SvcSetPause::KIND));
        assert_eq!(message.name(), "SvcSetPause");
        assert_eq!(MessageKind::ALL.len(), 34);
    }

    #[test]
    fn test_class_info_count_follows_class_list() {
        let profile = EngineProfile::portal2();
        let world = crate::datatables::ClassRecord {
            index: 2,
            class_name: "CWorld".to_string(),
            data_table_name: "DT_World".to_string(),
        };
        let stale: NetMessage = SvcClassInfo {
            class_count: 7,
            create_on_client: false,
            classes: vec![world.clone()],
        }
        .into();
        let pause: NetMessage = SvcSetPause { paused: true }.into();

        let bytes = encode_stream(&[stale, pause.clone()], &profile).unwrap();
        let decoded = decode_all(&bytes, &profile).unwrap();
        assert_eq!(decoded.len(), 2);
        let info = SvcClassInfo::from_message(&decoded[0]).unwrap();
        assert_eq!(info.class_count, 1);
        assert_eq!(info.classes, vec![world]);
        assert_eq!(decoded[1], pause);

        // Without a list the declared count is all there is.
        let on_client: NetMessage = SvcClassInfo {
            class_count: 7,
            create_on_client: true,
            classes: Vec::new(),
        }
        .into();
        round_trip(vec![on_client, pause], &profile);
    }
}
