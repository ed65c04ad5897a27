//! User command packets.

use srcdemo_common::{BitBuf, BitReader, BitWriter};

use crate::component::{Decode, DecodeContext, Encode};
use crate::describe::{Describe, Describer};
use crate::profile::EngineProfile;
use crate::Result;

use super::{payload_reader, write_payload, PacketKind};

const WEAPON_BITS: u32 = 11;
const WEAPON_SUBTYPE_BITS: u32 = 6;

/// Weapon switch carried by a user command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WeaponSelect {
    pub weapon: u16,
    pub subtype: Option<u8>,
}

/// Client input for one command.
///
/// Every field is delta-encoded against the previous command and only
/// present when it changed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UserCmd {
    /// Outgoing sequence number from the packet header.
    pub sequence: i32,
    pub command_number: Option<u32>,
    pub tick_count: Option<u32>,
    pub view_angles: [Option<f32>; 3],
    /// Forward, side and up movement.
    pub movement: [Option<f32>; 3],
    pub buttons: Option<u32>,
    pub impulse: Option<u8>,
    pub weapon: Option<WeaponSelect>,
    pub mouse_dx: Option<i16>,
    pub mouse_dy: Option<i16>,
    /// Bits after the last field, kept so the payload re-encodes unchanged.
    pub trailing: BitBuf,
}

fn read_opt<'a, T>(
    reader: &mut BitReader<'a>,
    read: impl FnOnce(&mut BitReader<'a>) -> srcdemo_common::Result<T>,
) -> Result<Option<T>> {
    if reader.read_bool()? {
        Ok(Some(read(reader)?))
    } else {
        Ok(None)
    }
}

fn write_opt<T: Copy>(writer: &mut BitWriter, value: Option<T>, write: impl FnOnce(&mut BitWriter, T)) {
    writer.write_bool(value.is_some());
    if let Some(value) = value {
        write(writer, value);
    }
}

impl Decode for UserCmd {
    fn decode(reader: &mut BitReader<'_>, _ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let sequence = reader.read_i32()?;
        let mut payload = payload_reader(reader, PacketKind::UserCmd)?;
        let r = &mut payload;

        let command_number = read_opt(r, BitReader::read_u32)?;
        let tick_count = read_opt(r, BitReader::read_u32)?;
        let view_angles = [
            read_opt(r, BitReader::read_f32)?,
            read_opt(r, BitReader::read_f32)?,
            read_opt(r, BitReader::read_f32)?,
        ];
        let movement = [
            read_opt(r, BitReader::read_f32)?,
            read_opt(r, BitReader::read_f32)?,
            read_opt(r, BitReader::read_f32)?,
        ];
        let buttons = read_opt(r, BitReader::read_u32)?;
        let impulse = read_opt(r, BitReader::read_u8)?;
        let weapon = if r.read_bool()? {
            let weapon = r.read_uint(WEAPON_BITS)? as u16;
            let subtype = read_opt(r, |r| r.read_uint(WEAPON_SUBTYPE_BITS).map(|v| v as u8))?;
            Some(WeaponSelect { weapon, subtype })
        } else {
            None
        };
        let mouse_dx = read_opt(r, |r| r.read_u16().map(|v| v as i16))?;
        let mouse_dy = read_opt(r, |r| r.read_u16().map(|v| v as i16))?;
        let trailing = r.read_bits(r.remaining_bits())?;

        Ok(Self {
            sequence,
            command_number,
            tick_count,
            view_angles,
            movement,
            buttons,
            impulse,
            weapon,
            mouse_dx,
            mouse_dy,
            trailing,
        })
    }
}

impl Encode for UserCmd {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        writer.write_i32(self.sequence);

        let mut body = BitWriter::new();
        let w = &mut body;
        write_opt(w, self.command_number, BitWriter::write_u32);
        write_opt(w, self.tick_count, BitWriter::write_u32);
        for angle in self.view_angles {
            write_opt(w, angle, BitWriter::write_f32);
        }
        for movement in self.movement {
            write_opt(w, movement, BitWriter::write_f32);
        }
        write_opt(w, self.buttons, BitWriter::write_u32);
        write_opt(w, self.impulse, BitWriter::write_u8);
        w.write_bool(self.weapon.is_some());
        if let Some(weapon) = &self.weapon {
            w.write_uint(u32::from(weapon.weapon), WEAPON_BITS)?;
            w.write_bool(weapon.subtype.is_some());
            if let Some(subtype) = weapon.subtype {
                w.write_uint(u32::from(subtype), WEAPON_SUBTYPE_BITS)?;
            }
        }
        write_opt(w, self.mouse_dx, |w, v| w.write_u16(v as u16));
        write_opt(w, self.mouse_dy, |w, v| w.write_u16(v as u16));
        w.write_bits(&self.trailing);

        write_payload(writer, &body.into_bytes(), "user command")
    }
}

impl Describe for UserCmd {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("sequence", self.sequence);
        if let Some(number) = self.command_number {
            out.field("command number", number);
        }
        if let Some(tick) = self.tick_count {
            out.field("tick count", tick);
        }
        if self.view_angles.iter().any(Option::is_some) {
            out.field("view angles", format_components(self.view_angles));
        }
        if self.movement.iter().any(Option::is_some) {
            out.field("movement", format_components(self.movement));
        }
        if let Some(buttons) = self.buttons {
            out.field("buttons", format_args!("{:#x}", buttons));
        }
        if let Some(impulse) = self.impulse {
            out.field("impulse", impulse);
        }
        if let Some(weapon) = &self.weapon {
            match weapon.subtype {
                Some(subtype) => out.field("weapon", format_args!("{} (subtype {})", weapon.weapon, subtype)),
                None => out.field("weapon", weapon.weapon),
            }
        }
        if self.mouse_dx.is_some() || self.mouse_dy.is_some() {
            out.field(
                "mouse",
                format_args!("({}, {})", self.mouse_dx.unwrap_or(0), self.mouse_dy.unwrap_or(0)),
            );
        }
    }
}

fn format_components(values: [Option<f32>; 3]) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|v| v.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v)))
        .collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatables::ClassRegistry;
    use crate::stringtables::StringTableTracker;

    #[test]
    fn test_user_cmd_round_trip() {
        let cmd = UserCmd {
            sequence: 812,
            command_number: Some(812),
            tick_count: Some(4000),
            view_angles: [Some(10.5), Some(-90.0), None],
            movement: [Some(450.0), None, None],
            buttons: Some(0x20),
            impulse: None,
            weapon: Some(WeaponSelect {
                weapon: 3,
                subtype: Some(1),
            }),
            mouse_dx: Some(-12),
            mouse_dy: Some(4),
            trailing: BitBuf::new(),
        };

        let profile = EngineProfile::portal2();
        let mut writer = BitWriter::new();
        cmd.encode(&mut writer, &profile).unwrap();
        let bytes = writer.into_bytes();

        let registry = ClassRegistry::default();
        let mut tables = StringTableTracker::default();
        let mut ctx = DecodeContext {
            profile: &profile,
            registry: &registry,
            tables: &mut tables,
        };
        let mut reader = BitReader::new(&bytes);
        let decoded = UserCmd::decode(&mut reader, &mut ctx).unwrap();
        assert!(reader.is_empty());

        // The byte padding comes back as trailing bits.
        assert_eq!(decoded.command_number, cmd.command_number);
        assert_eq!(decoded.view_angles, cmd.view_angles);
        assert_eq!(decoded.weapon, cmd.weapon);
        assert_eq!(decoded.mouse_dx, Some(-12));
        assert!(decoded.trailing.bit_len() < 8);

        let mut again = BitWriter::new();
        decoded.encode(&mut again, &profile).unwrap();
        assert_eq!(again.into_bytes(), bytes);
    }
}
