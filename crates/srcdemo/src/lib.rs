//! Decoder for Source engine demo recordings (`.dem`).
//!
//! A demo is a fixed 1072-byte header followed by a stream of frames. Each
//! frame carries one packet: network packets hold bit-packed net messages,
//! data-table packets describe the entity classes, and string-table packets
//! carry the server's named string tables. This crate decodes the whole file
//! into a [`DemoDocument`], can render every component as text, and can
//! encode every component back to its wire form.
//!
//! # Quick Start
//!
//! ```no_run
//! use srcdemo::DemoDocument;
//!
//! let demo = DemoDocument::open("run.dem")?;
//! println!("{} ({} frames)", demo.header().map_name, demo.frames().len());
//!
//! for (kind, count) in demo.kind_counts() {
//!     println!("{:<28}{:>8}", kind, count);
//! }
//! # Ok::<(), srcdemo::Error>(())
//! ```
//!
//! # Engine Profiles
//!
//! Wire layouts differ between engine branches. An [`EngineProfile`] holds
//! every layout choice, and is picked from the header's demo protocol:
//!
//! - protocol 2: [`EngineProfile::legacy`]
//! - protocol 3: [`EngineProfile::orange_box`]
//! - protocol 4: [`EngineProfile::portal2`]
//!
//! Game-specific messages can be registered on a profile as opaque kinds
//! that are kept as raw bits:
//!
//! ```no_run
//! use srcdemo::{DemoDocument, EngineProfile};
//!
//! let mut profile = EngineProfile::orange_box();
//! profile.register_opaque(16, "SvcModMessage", 12)?;
//!
//! let data = std::fs::read("mod.dem")?;
//! let demo = DemoDocument::parse_with_profile(&data, profile)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Typed Queries
//!
//! ```no_run
//! use srcdemo::message::SvcServerInfo;
//! use srcdemo::packet::ConsoleCmd;
//! use srcdemo::DemoDocument;
//!
//! let demo = DemoDocument::open("run.dem")?;
//!
//! if let Some(info) = demo.find::<SvcServerInfo>().next() {
//!     println!("server: {} players max", info.item.max_clients);
//! }
//! for cmd in demo.find_packets::<ConsoleCmd>() {
//!     println!("[{}] {}", cmd.tick, cmd.item.command);
//! }
//! # Ok::<(), srcdemo::Error>(())
//! ```
//!
//! # Features
//!
//! - `serde` - `Serialize` for every decoded component
//! - `json` - [`DemoDocument::to_json`]

pub mod component;
pub mod datatables;
pub mod describe;
pub mod dispatcher;
mod document;
mod error;
mod export;
pub mod header;
pub mod message;
pub mod packet;
pub mod profile;
pub mod stringtables;

// Primary API
pub use document::{DemoDocument, Located};
pub use error::{Error, Result};
pub use header::DemoHeader;
pub use profile::EngineProfile;

// Components
pub use component::{Decode, DecodeContext, Encode};
pub use datatables::{ClassRecord, ClassRegistry, DataTables};
pub use describe::{Describe, Describer};
pub use dispatcher::{Frame, FrameDispatcher, Trailer};
pub use message::{MessageKind, MessageVariant, NetMessage};
pub use packet::{Packet, PacketKind, PacketVariant};
pub use stringtables::{StringTableTracker, StringTables};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::describe::{describe_standalone, Describe};
    pub use crate::message::{MessageKind, MessageVariant, NetMessage};
    pub use crate::packet::{Packet, PacketKind, PacketVariant};
    pub use crate::{DemoDocument, DemoHeader, EngineProfile, Error, Frame, Result};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
