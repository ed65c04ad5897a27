//! Data tables: send tables and the server class registry.

use std::fmt;
use std::hash::BuildHasherDefault;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use srcdemo_common::{BitReader, BitWriter};
use tracing::debug;

use crate::component::{checked_len, Decode, DecodeContext, Encode};
use crate::describe::{Describe, Describer};
use crate::profile::EngineProfile;
use crate::{Error, Result};

pub(crate) type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Send-prop flag marking an exclusion entry.
pub const SPROP_EXCLUDE: u32 = 1 << 6;

const PROP_COUNT_BITS: u32 = 10;
const ARRAY_ELEMENTS_BITS: u32 = 10;
const NUM_BITS_BITS: u32 = 7;

/// Kind of a networked property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SendPropType {
    Int,
    Float,
    Vector,
    VectorXY,
    String,
    Array,
    DataTable,
}

impl SendPropType {
    fn from_raw(raw: u32, profile: &EngineProfile) -> Result<Self> {
        profile
            .send_prop_types
            .get(raw as usize)
            .copied()
            .ok_or(Error::InvalidLength {
                context: "send prop type",
                length: i64::from(raw),
            })
    }

    fn to_raw(self, profile: &EngineProfile) -> Result<u32> {
        profile
            .send_prop_types
            .iter()
            .position(|&t| t == self)
            .map(|raw| raw as u32)
            .ok_or(Error::NotInProfile("send prop type"))
    }
}

/// Type-specific part of a send prop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SendPropBody {
    /// A nested table, or the table an excluded prop lives in.
    Table { name: String },
    /// Element count of an array prop.
    Array { elements: u32 },
    /// Quantization range of a numeric or string prop.
    Numeric { low: f32, high: f32, bits: u32 },
}

/// A single networked property of a send table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SendProp {
    pub prop_type: SendPropType,
    pub name: String,
    pub flags: u32,
    pub priority: Option<u8>,
    pub body: SendPropBody,
}

impl SendProp {
    pub fn is_excluded(&self) -> bool {
        self.flags & SPROP_EXCLUDE != 0
    }

    fn read(reader: &mut BitReader<'_>, profile: &EngineProfile) -> Result<Self> {
        let prop_type = SendPropType::from_raw(reader.read_uint(5)?, profile)?;
        let name = reader.read_cstring()?;
        let flags = reader.read_uint(profile.send_prop_flag_bits)?;
        let priority = if profile.send_prop_priority {
            Some(reader.read_u8()?)
        } else {
            None
        };

        let body = if prop_type == SendPropType::DataTable || flags & SPROP_EXCLUDE != 0 {
            SendPropBody::Table {
                name: reader.read_cstring()?,
            }
        } else if prop_type == SendPropType::Array {
            SendPropBody::Array {
                elements: reader.read_uint(ARRAY_ELEMENTS_BITS)?,
            }
        } else {
            SendPropBody::Numeric {
                low: reader.read_f32()?,
                high: reader.read_f32()?,
                bits: reader.read_uint(NUM_BITS_BITS)?,
            }
        };

        Ok(Self {
            prop_type,
            name,
            flags,
            priority,
            body,
        })
    }

    fn write(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        writer.write_uint(self.prop_type.to_raw(profile)?, 5)?;
        writer.write_cstring(&self.name);
        writer.write_uint(self.flags, profile.send_prop_flag_bits)?;
        if profile.send_prop_priority {
            writer.write_u8(self.priority.unwrap_or(0));
        }
        match &self.body {
            SendPropBody::Table { name } => writer.write_cstring(name),
            SendPropBody::Array { elements } => writer.write_uint(*elements, ARRAY_ELEMENTS_BITS)?,
            SendPropBody::Numeric { low, high, bits } => {
                writer.write_f32(*low);
                writer.write_f32(*high);
                writer.write_uint(*bits, NUM_BITS_BITS)?;
            }
        }
        Ok(())
    }
}

/// A send table: a named list of networked properties.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SendTable {
    pub needs_decoder: bool,
    pub name: String,
    pub props: Vec<SendProp>,
}

/// A server class: one entry of the class registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClassRecord {
    pub index: u16,
    pub class_name: String,
    pub data_table_name: String,
}

impl fmt::Display for ClassRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.class_name, self.data_table_name)
    }
}

/// Decoded body of a data-tables packet.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DataTables {
    pub tables: Vec<SendTable>,
    pub classes: Vec<ClassRecord>,
}

impl DataTables {
    /// Find a send table by name.
    pub fn table(&self, name: &str) -> Option<&SendTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl Decode for DataTables {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let mut tables = Vec::new();
        while reader.read_bool()? {
            let needs_decoder = reader.read_bool()?;
            let name = reader.read_cstring()?;
            let count = reader.read_uint(PROP_COUNT_BITS)?;
            let props = (0..count)
                .map(|_| SendProp::read(reader, ctx.profile))
                .collect::<Result<Vec<_>>>()?;
            tables.push(SendTable {
                needs_decoder,
                name,
                props,
            });
        }

        let class_count = reader.read_u16()?;
        let mut classes = Vec::with_capacity(class_count as usize);
        for _ in 0..class_count {
            classes.push(ClassRecord {
                index: reader.read_u16()?,
                class_name: reader.read_cstring()?,
                data_table_name: reader.read_cstring()?,
            });
        }

        debug!(tables = tables.len(), classes = classes.len(), "decoded data tables");
        Ok(Self { tables, classes })
    }
}

impl Encode for DataTables {
    fn encode(&self, writer: &mut BitWriter, profile: &EngineProfile) -> Result<()> {
        for table in &self.tables {
            writer.write_bool(true);
            writer.write_bool(table.needs_decoder);
            writer.write_cstring(&table.name);
            let count = checked_len(table.props.len(), PROP_COUNT_BITS, "send table props")?;
            writer.write_uint(count, PROP_COUNT_BITS)?;
            for prop in &table.props {
                prop.write(writer, profile)?;
            }
        }
        writer.write_bool(false);

        let count = u16::try_from(self.classes.len()).map_err(|_| Error::InvalidLength {
            context: "server classes",
            length: self.classes.len() as i64,
        })?;
        writer.write_u16(count);
        for class in &self.classes {
            writer.write_u16(class.index);
            writer.write_cstring(&class.class_name);
            writer.write_cstring(&class.data_table_name);
        }
        Ok(())
    }
}

impl Describe for DataTables {
    fn describe(&self, out: &mut Describer<'_>) {
        out.field("send tables", self.tables.len());
        out.indented(|out| {
            for table in &self.tables {
                out.heading(format_args!("{} ({} props)", table.name, table.props.len()));
            }
        });
        out.field("server classes", self.classes.len());
        out.indented(|out| {
            for class in &self.classes {
                out.field(&class.index.to_string(), class);
            }
        });
    }
}

/// Server classes indexed by class id.
///
/// Rebuilt from every data-tables packet, and consulted by whatever decodes
/// after it: an entry that references a class id reads the registry as it
/// stands at that moment.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    records: Vec<ClassRecord>,
    by_index: FxHashMap<u16, usize>,
}

impl ClassRegistry {
    /// Build a registry from class records; a repeated id keeps the last record.
    pub fn from_records(records: Vec<ClassRecord>) -> Self {
        let mut by_index = FxHashMap::default();
        by_index.reserve(records.len());
        for (position, record) in records.iter().enumerate() {
            by_index.insert(record.index, position);
        }
        Self { records, by_index }
    }

    /// Build a registry from a decoded data-tables packet.
    pub fn from_data_tables(tables: &DataTables) -> Self {
        Self::from_records(tables.classes.clone())
    }

    /// Look up a class by id.
    pub fn get(&self, index: u16) -> Option<&ClassRecord> {
        self.by_index.get(&index).map(|&i| &self.records[i])
    }

    /// Look up a class by name.
    pub fn by_name(&self, class_name: &str) -> Option<&ClassRecord> {
        self.records.iter().find(|r| r.class_name == class_name)
    }

    pub fn contains(&self, index: u16) -> bool {
        self.by_index.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate classes in the order they were declared.
    pub fn iter(&self) -> impl Iterator<Item = &ClassRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stringtables::StringTableTracker;

    fn sample() -> DataTables {
        DataTables {
            tables: vec![SendTable {
                needs_decoder: true,
                name: "DT_Player".to_string(),
                props: vec![
                    SendProp {
                        prop_type: SendPropType::Int,
                        name: "m_iHealth".to_string(),
                        flags: 1,
                        priority: Some(64),
                        body: SendPropBody::Numeric {
                            low: 0.0,
                            high: 0.0,
                            bits: 10,
                        },
                    },
                    SendProp {
                        prop_type: SendPropType::DataTable,
                        name: "baseclass".to_string(),
                        flags: 0,
                        priority: Some(64),
                        body: SendPropBody::Table {
                            name: "DT_BaseEntity".to_string(),
                        },
                    },
                    SendProp {
                        prop_type: SendPropType::Int,
                        name: "m_flSimulationTime".to_string(),
                        flags: SPROP_EXCLUDE,
                        priority: Some(64),
                        body: SendPropBody::Table {
                            name: "DT_BaseEntity".to_string(),
                        },
                    },
                    SendProp {
                        prop_type: SendPropType::Array,
                        name: "m_iAmmo".to_string(),
                        flags: 0,
                        priority: Some(64),
                        body: SendPropBody::Array { elements: 32 },
                    },
                ],
            }],
            classes: vec![
                ClassRecord {
                    index: 0,
                    class_name: "CWorld".to_string(),
                    data_table_name: "DT_World".to_string(),
                },
                ClassRecord {
                    index: 5,
                    class_name: "CPortal_Player".to_string(),
                    data_table_name: "DT_Portal_Player".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_data_tables_round_trip() {
        let profile = EngineProfile::portal2();
        let tables = sample();
        let bits = tables.to_bits(&profile).unwrap();

        let registry = ClassRegistry::default();
        let mut tracker = StringTableTracker::default();
        let mut ctx = DecodeContext {
            profile: &profile,
            registry: &registry,
            tables: &mut tracker,
        };
        let mut reader = bits.reader();
        let decoded = DataTables::decode(&mut reader, &mut ctx).unwrap();

        assert_eq!(decoded, tables);
        assert!(reader.is_empty());
        assert!(decoded.table("DT_Player").unwrap().props[2].is_excluded());
    }

    #[test]
    fn test_prop_type_numbering() {
        let legacy = EngineProfile::legacy();
        let orange_box = EngineProfile::orange_box();
        assert_eq!(SendPropType::from_raw(3, &legacy).unwrap(), SendPropType::String);
        assert_eq!(SendPropType::from_raw(3, &orange_box).unwrap(), SendPropType::VectorXY);
        assert!(SendPropType::VectorXY.to_raw(&legacy).is_err());
        assert!(SendPropType::from_raw(7, &orange_box).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ClassRegistry::from_data_tables(&sample());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(5).unwrap().class_name, "CPortal_Player");
        assert_eq!(registry.by_name("CWorld").unwrap().index, 0);
        assert!(registry.get(1).is_none());
        assert!(!registry.contains(7));
    }
}
