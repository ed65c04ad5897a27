//! The decoded demo: header, frames, and the lookup state built from them.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::datatables::ClassRegistry;
use crate::dispatcher::{Frame, FrameDispatcher, Trailer};
use crate::header::DemoHeader;
use crate::message::{MessageKind, MessageVariant, NetMessage};
use crate::packet::{Packet, PacketKind, PacketVariant};
use crate::profile::EngineProfile;
use crate::stringtables::StringTableTracker;
use crate::Result;

/// An item found in a document, with the frame it came from.
#[derive(Debug)]
pub struct Located<'a, T> {
    pub tick: i32,
    pub slot: Option<u8>,
    pub item: &'a T,
}

impl<T> Clone for Located<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Located<'_, T> {}

/// A fully decoded demo file.
///
/// Decoding is a single pass in file order and either succeeds completely or
/// fails; a partially decoded document is never returned.
///
/// # Example
///
/// ```no_run
/// use srcdemo::message::SvcSetPause;
/// use srcdemo::DemoDocument;
///
/// let demo = DemoDocument::open("run.dem")?;
/// println!("{} on {}", demo.header().client_name, demo.header().map_name);
///
/// for pause in demo.find::<SvcSetPause>() {
///     println!("tick {}: paused = {}", pause.tick, pause.item.paused);
/// }
/// # Ok::<(), srcdemo::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DemoDocument {
    header: DemoHeader,
    profile: EngineProfile,
    frames: Vec<Frame>,
    registry: ClassRegistry,
    tables: StringTableTracker,
    trailer: Trailer,
}

impl DemoDocument {
    /// Read and decode a demo file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Decode a demo, choosing the engine profile from its header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = DemoHeader::parse(data)?;
        let profile = EngineProfile::for_header(&header)?;
        Self::decode(data, header, profile)
    }

    /// Decode a demo with an explicit engine profile.
    pub fn parse_with_profile(data: &[u8], profile: EngineProfile) -> Result<Self> {
        let header = DemoHeader::parse(data)?;
        Self::decode(data, header, profile)
    }

    fn decode(data: &[u8], header: DemoHeader, profile: EngineProfile) -> Result<Self> {
        debug!(
            profile = profile.name,
            map = %header.map_name,
            bytes = data.len(),
            "decoding demo"
        );
        let mut dispatcher = FrameDispatcher::new(data, &profile)?;
        let mut frames = Vec::new();
        while let Some(frame) = dispatcher.next_frame()? {
            frames.push(frame);
        }
        let (registry, tables, trailer) = dispatcher.into_parts();
        debug!(frames = frames.len(), classes = registry.len(), "decoded demo");

        Ok(Self {
            header,
            profile,
            frames,
            registry,
            tables,
            trailer,
        })
    }

    pub fn header(&self) -> &DemoHeader {
        &self.header
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    /// Decoded frames in file order; the stop frame is not included.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Mutable access to the frames. Call [`Frame::reencode`] after editing
    /// a frame so [`DemoDocument::to_bytes`] picks up the change.
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Class registry from the last data-tables packet.
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// String tables created over the whole stream.
    pub fn string_tables(&self) -> &StringTableTracker {
        &self.tables
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// All packets in file order.
    pub fn packets(&self) -> impl Iterator<Item = &Packet> + '_ {
        self.frames.iter().map(|frame| &frame.packet)
    }

    /// Frames of one packet kind.
    pub fn packets_of(&self, kind: PacketKind) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.iter().filter(move |frame| frame.kind() == kind)
    }

    /// Packet payloads of one type.
    pub fn find_packets<'a, T: PacketVariant + 'a>(&'a self) -> impl Iterator<Item = Located<'a, T>> + 'a {
        self.frames.iter().filter_map(|frame| {
            T::from_packet(&frame.packet).map(|item| Located {
                tick: frame.tick,
                slot: frame.slot,
                item,
            })
        })
    }

    /// All net messages in file order.
    pub fn messages(&self) -> impl Iterator<Item = Located<'_, NetMessage>> + '_ {
        self.frames.iter().flat_map(|frame| {
            frame.packet.messages().iter().map(move |item| Located {
                tick: frame.tick,
                slot: frame.slot,
                item,
            })
        })
    }

    /// Net messages of one type.
    pub fn find<'a, T: MessageVariant + 'a>(&'a self) -> impl Iterator<Item = Located<'a, T>> + 'a {
        self.messages().filter_map(|found| {
            T::from_message(found.item).map(|item| Located {
                tick: found.tick,
                slot: found.slot,
                item,
            })
        })
    }

    /// Net messages of one kind.
    pub fn messages_of(&self, kind: MessageKind) -> impl Iterator<Item = Located<'_, NetMessage>> + '_ {
        self.messages().filter(move |found| found.item.kind() == Some(kind))
    }

    /// Serialize the document from each frame's raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let frame_bytes: usize = self.frames.iter().map(|f| f.raw().len()).sum();
        let mut out = self.header.to_bytes();
        out.reserve(frame_bytes + self.trailer.bytes.len() + self.profile.frame_header_len());
        for frame in &self.frames {
            out.extend_from_slice(frame.raw());
        }
        out.extend(self.trailer.to_bytes(&self.profile)?);
        Ok(out)
    }

    /// Re-encode every frame from its decoded fields.
    pub fn reencode_all(&mut self) -> Result<()> {
        for frame in &mut self.frames {
            frame.reencode(&self.profile)?;
        }
        Ok(())
    }
}

#[cfg(feature = "json")]
mod json {
    use serde::Serialize;

    use super::DemoDocument;
    use crate::datatables::ClassRecord;
    use crate::dispatcher::Frame;
    use crate::header::DemoHeader;
    use crate::Result;

    #[derive(Serialize)]
    struct DocumentView<'a> {
        header: &'a DemoHeader,
        profile: &'a str,
        classes: Vec<&'a ClassRecord>,
        string_tables: Vec<&'a str>,
        frames: &'a [Frame],
        trailing_bytes: usize,
    }

    impl DemoDocument {
        /// Export the whole document as pretty-printed JSON.
        pub fn to_json(&self) -> Result<String> {
            let tables = self.string_tables();
            let view = DocumentView {
                header: self.header(),
                profile: self.profile().name,
                classes: self.registry().iter().collect(),
                string_tables: (0..tables.len()).filter_map(|id| tables.table_name(id)).collect(),
                frames: self.frames(),
                trailing_bytes: self.trailer().bytes.len(),
            };
            Ok(serde_json::to_string_pretty(&view)?)
        }
    }
}
