//! Connection-level net messages.

use srcdemo_common::{BitReader, BitWriter};

use crate::component::{checked_len, Decode, DecodeContext, Encode};
use crate::describe::{Describe, Describer};
use crate::profile::EngineProfile;
use crate::Result;

/// Scale of the host frame time fields of [`NetTick`].
pub const NET_TICK_SCALE: f32 = 100_000.0;

/// Empty message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetNop;

impl Decode for NetNop {
    fn decode(_reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self)
    }
}

impl Encode for NetNop {
    fn encode(&self, _writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        Ok(())
    }
}

impl Describe for NetNop {
    fn describe(&self, _out: &mut Describer<'_>) {}
}

/// Disconnect with a reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetDisconnect {
    pub reason: String,
}

impl Decode for NetDisconnect {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            reason: reader.read_cstring()?,
        })
    }
}

impl Encode for NetDisconnect {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_cstring(&self.reason);
        Ok(())
    }
}

impl Describe for NetDisconnect {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("reason", &self.reason);
    }
}

/// File transfer request or denial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetFile {
    pub transfer_id: u32,
    pub file_name: String,
    pub flags: u32,
}

impl Decode for NetFile {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            transfer_id: reader.read_u32()?,
            file_name: reader.read_cstring()?,
            flags: reader.read_uint(ctx.profile.net_file_flag_bits)?,
        })
    }
}

impl Encode for NetFile {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_u32(self.transfer_id);
        writer.write_cstring(&self.file_name);
        writer.write_uint(self.flags, profile.net_file_flag_bits)?;
        Ok(())
    }
}

impl Describe for NetFile {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("transfer id", self.transfer_id);
        out.field("file name", &self.file_name);
        out.field("flags", self.flags);
    }
}

/// Switches the split-screen user the following messages apply to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetSplitScreenUser {
    pub second_player: bool,
}

impl Decode for NetSplitScreenUser {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            second_player: reader.read_bool()?,
        })
    }
}

impl Encode for NetSplitScreenUser {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_bool(self.second_player);
        Ok(())
    }
}

impl Describe for NetSplitScreenUser {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("user", u8::from(self.second_player));
    }
}

/// Server tick, optionally with host frame timing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetTick {
    pub tick: i32,
    /// Host frame time and its standard deviation, scaled by [`NET_TICK_SCALE`].
    pub frame_time: Option<(u16, u16)>,
}

impl Decode for NetTick {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let tick = reader.read_i32()?;
        let frame_time = if ctx.profile.tick_frame_time {
            Some((reader.read_u16()?, reader.read_u16()?))
        } else {
            None
        };
        Ok(Self { tick, frame_time })
    }
}

impl Encode for NetTick {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_i32(self.tick);
        if profile.tick_frame_time {
            let (time, deviation) = self.frame_time.unwrap_or_default();
            writer.write_u16(time);
            writer.write_u16(deviation);
        }
        Ok(())
    }
}

impl Describe for NetTick {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("tick", self.tick);
        if let Some((time, deviation)) = self.frame_time {
            out.field("host frame time", f32::from(time) / NET_TICK_SCALE);
            out.field("host frame time std dev", f32::from(deviation) / NET_TICK_SCALE);
        }
    }
}

/// Console command sent as a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetStringCmd {
    pub command: String,
}

impl Decode for NetStringCmd {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        Ok(Self {
            command: reader.read_cstring()?,
        })
    }
}

impl Encode for NetStringCmd {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_cstring(&self.command);
        Ok(())
    }
}

impl Describe for NetStringCmd {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("command", &self.command);
    }
}

/// Replicated console variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetSetConVar {
    pub convars: Vec<(String, String)>,
}

impl Decode for NetSetConVar {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let count = reader.read_u8()?;
        let convars = (0..count)
            .map(|_| -> Result<(String, String)> { Ok((reader.read_cstring()?, reader.read_cstring()?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { convars })
    }
}

impl Encode for NetSetConVar {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        let count = checked_len(self.convars.len(), 8, "convars")?;
        writer.write_uint(count, 8)?;
        for (name, value) in &self.convars {
            writer.write_cstring(name);
            writer.write_cstring(value);
        }
        Ok(())
    }
}

impl Describe for NetSetConVar {
    fn describe(&self, out: &mut Describer<'_>) {
        for (name, value) in &self.convars {
            out.field(name, value);
        }
    }
}

/// Extra sign-on state fields of split-screen era builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SignOnPlayers {
    pub server_players: u32,
    pub player_ids: Vec<u8>,
    /// Map name bytes exactly as stored, terminator included if present.
    pub map_name: Vec<u8>,
}

impl SignOnPlayers {
    pub fn map_name(&self) -> String {
        let end = self.map_name.iter().position(|&b| b == 0).unwrap_or(self.map_name.len());
        String::from_utf8_lossy(&self.map_name[..end]).into_owned()
    }
}

/// Connection sign-on progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetSignOnState {
    pub state: u8,
    pub spawn_count: i32,
    pub players: Option<SignOnPlayers>,
}

impl NetSignOnState {
    /// Engine name of the sign-on state.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            0 => "None",
            1 => "Challenge",
            2 => "Connected",
            3 => "New",
            4 => "PreSpawn",
            5 => "Spawn",
            6 => "Full",
            7 => "ChangeLevel",
            _ => "Unknown",
        }
    }
}

impl Decode for NetSignOnState {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let state = reader.read_u8()?;
        let spawn_count = reader.read_i32()?;
        let players = if ctx.profile.signon_state_extended {
            let server_players = reader.read_u32()?;
            let ids_len = reader.read_u32()?;
            let player_ids = reader.read_bytes(ids_len as usize)?;
            let map_len = reader.read_u32()?;
            let map_name = reader.read_bytes(map_len as usize)?;
            Some(SignOnPlayers {
                server_players,
                player_ids,
                map_name,
            })
        } else {
            None
        };
        Ok(Self {
            state,
            spawn_count,
            players,
        })
    }
}

impl Encode for NetSignOnState {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_u8(self.state);
        writer.write_i32(self.spawn_count);
        if profile.signon_state_extended {
            let players = self.players.clone().unwrap_or_default();
            writer.write_u32(players.server_players);
            writer.write_u32(checked_len(players.player_ids.len(), 32, "player ids")?);
            writer.write_bytes(&players.player_ids);
            writer.write_u32(checked_len(players.map_name.len(), 32, "map name")?);
            writer.write_bytes(&players.map_name);
        }
        Ok(())
    }
}

impl Describe for NetSignOnState {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("state", format_args!("{} ({})", self.state_name(), self.state));
        out.field("spawn count", self.spawn_count);
        if let Some(players) = &self.players {
            out.field("server players", players.server_players);
            out.field("player id bytes", players.player_ids.len());
            out.field("map name", players.map_name());
        }
    }
}
