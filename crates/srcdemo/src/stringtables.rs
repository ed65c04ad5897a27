//! String tables and the tracker that interprets their entries.

use srcdemo_common::{BitReader, BitWriter};
use tracing::{trace, warn};

use crate::component::{Decode, DecodeContext, Encode};
use crate::datatables::{ClassRecord, ClassRegistry};
use crate::describe::{Describe, Describer};
use crate::profile::EngineProfile;
use crate::{Error, Result};

/// Table whose entries are keyed by class id.
pub const INSTANCE_BASELINE_TABLE: &str = "instancebaseline";
/// Table whose entries hold a class name.
pub const GAME_RULES_TABLE: &str = "GameRulesCreation";

/// Interpreted contents of a string-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EntryContents {
    /// Layout not known; the raw data is all there is.
    Generic,
    /// A class name.
    ClassName(String),
    /// Entity baseline for the class whose id is the entry name.
    ///
    /// `class` is the record the registry held for that id when the entry was
    /// decoded; registries decoded later never change it.
    InstanceBaseline { class: Option<ClassRecord> },
}

/// A single string-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StringTableEntry {
    pub name: String,
    pub data: Option<Vec<u8>>,
    pub contents: EntryContents,
}

impl StringTableEntry {
    /// Check if the entry's layout was understood.
    pub fn contents_known(&self) -> bool {
        !matches!(self.contents, EntryContents::Generic)
    }

    fn read(reader: &mut BitReader<'_>) -> Result<(String, Option<Vec<u8>>)> {
        let name = reader.read_cstring()?;
        let data = if reader.read_bool()? {
            let length = reader.read_u16()?;
            Some(reader.read_bytes(length as usize)?)
        } else {
            None
        };
        Ok((name, data))
    }

    fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_cstring(&self.name);
        writer.write_bool(self.data.is_some());
        if let Some(data) = &self.data {
            let length = u16::try_from(data.len()).map_err(|_| Error::InvalidLength {
                context: "string table entry",
                length: data.len() as i64,
            })?;
            writer.write_u16(length);
            writer.write_bytes(data);
        }
        Ok(())
    }
}

impl Describe for StringTableEntry {
    fn describe(&self, out: &mut Describer<'_>) {
        match &self.contents {
            EntryContents::Generic => match &self.data {
                Some(data) => out.field(&self.name, format_args!("{} bytes", data.len())),
                None => out.heading(&self.name),
            },
            EntryContents::ClassName(class_name) => out.field(&self.name, class_name),
            EntryContents::InstanceBaseline { class: Some(record) } => out.field(&self.name, record),
            EntryContents::InstanceBaseline { class: None } => out.field(&self.name, "unresolved"),
        }
    }
}

/// A table snapshot from a string-tables packet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StringTable {
    pub name: String,
    pub entries: Vec<StringTableEntry>,
    pub client_entries: Option<Vec<StringTableEntry>>,
}

impl StringTable {
    /// Find an entry by name.
    pub fn entry(&self, name: &str) -> Option<&StringTableEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Decoded body of a string-tables packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StringTables {
    pub tables: Vec<StringTable>,
}

impl StringTables {
    /// Find a table by name.
    pub fn table(&self, name: &str) -> Option<&StringTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

fn read_entries(
    reader: &mut BitReader<'_>,
    table: Option<&str>,
    ctx: &mut DecodeContext<'_>,
) -> Result<Vec<StringTableEntry>> {
    let count = reader.read_u16()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (name, data) = StringTableEntry::read(reader)?;
        let contents = match table {
            Some(table) => ctx.tables.decode_entry(table, &name, data.as_deref(), ctx.registry),
            None => EntryContents::Generic,
        };
        entries.push(StringTableEntry { name, data, contents });
    }
    Ok(entries)
}

fn write_entries(writer: &mut BitWriter, entries: &[StringTableEntry]) -> Result<()> {
    let count = u16::try_from(entries.len()).map_err(|_| Error::InvalidLength {
        context: "string table entries",
        length: entries.len() as i64,
    })?;
    writer.write_u16(count);
    for entry in entries {
        entry.write(writer)?;
    }
    Ok(())
}

impl Decode for StringTables {
    fn decode(reader: &mut BitReader<'_>, ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let count = reader.read_u8()?;
        let mut tables = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = reader.read_cstring()?;
            let entries = read_entries(reader, Some(&name), ctx)?;
            let client_entries = if reader.read_bool()? {
                Some(read_entries(reader, None, ctx)?)
            } else {
                None
            };
            trace!(table = %name, entries = entries.len(), "decoded string table");
            tables.push(StringTable {
                name,
                entries,
                client_entries,
            });
        }
        Ok(Self { tables })
    }
}

impl Encode for StringTables {
    fn encode(&self, writer: &mut BitWriter, _profile: &EngineProfile) -> Result<()> {
        let count = u8::try_from(self.tables.len()).map_err(|_| Error::InvalidLength {
            context: "string tables",
            length: self.tables.len() as i64,
        })?;
        writer.write_u8(count);
        for table in &self.tables {
            writer.write_cstring(&table.name);
            write_entries(writer, &table.entries)?;
            writer.write_bool(table.client_entries.is_some());
            if let Some(entries) = &table.client_entries {
                write_entries(writer, entries)?;
            }
        }
        Ok(())
    }
}

impl Describe for StringTables {
    fn describe(&self, out: &mut Describer<'_>) {
        for table in &self.tables {
            out.heading(format_args!("{} ({} entries)", table.name, table.entries.len()));
            out.indented(|out| {
                for entry in &table.entries {
                    entry.describe(out);
                }
                if let Some(client) = &table.client_entries {
                    out.field("client entries", client.len());
                }
            });
        }
    }
}

/// Tracks string tables as they are created and interprets their entries.
#[derive(Debug, Clone, Default)]
pub struct StringTableTracker {
    names: Vec<String>,
    baselines: usize,
    unresolved: usize,
}

impl StringTableTracker {
    /// Record a newly created table, returning its id.
    pub fn register(&mut self, name: &str) -> usize {
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    /// Name of the table with the given id.
    pub fn table_name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Id of a table by name.
    pub fn table_id(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of tables created so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Instance baselines seen, and how many of them referenced an unknown class.
    pub fn baseline_counts(&self) -> (usize, usize) {
        (self.baselines, self.unresolved)
    }

    /// Interpret an entry of `table` against the registry as it stands now.
    pub fn decode_entry(
        &mut self,
        table: &str,
        name: &str,
        data: Option<&[u8]>,
        registry: &ClassRegistry,
    ) -> EntryContents {
        match table {
            INSTANCE_BASELINE_TABLE => {
                self.baselines += 1;
                let class = match name.parse::<u16>() {
                    Ok(index) => registry.get(index).cloned(),
                    Err(_) => {
                        warn!(entry = name, "instance baseline key is not a class id");
                        None
                    }
                };
                if class.is_none() {
                    self.unresolved += 1;
                }
                EntryContents::InstanceBaseline { class }
            }
            GAME_RULES_TABLE => match data.and_then(class_name) {
                Some(class_name) => EntryContents::ClassName(class_name),
                None => EntryContents::Generic,
            },
            _ => EntryContents::Generic,
        }
    }
}

fn class_name(data: &[u8]) -> Option<String> {
    let end = data.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&data[..end]).into_owned())
}
