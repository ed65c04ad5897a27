//! Error types for demo decoding.

use thiserror::Error;

/// Errors that can occur when decoding or encoding a demo.
///
/// Header faults mean the input is not a demo this crate understands;
/// everything else is a fault in the frame stream of an otherwise valid
/// demo. [`Error::is_header_error`] tells the two apart.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bit cursor error (underflow, bad width, unterminated string).
    #[error("{0}")]
    Common(#[from] srcdemo_common::Error),

    /// The file is shorter than the fixed header.
    #[error("demo header truncated: expected {expected} bytes, got {actual}")]
    HeaderTooShort { expected: usize, actual: usize },

    /// Invalid magic bytes (not a demo file).
    #[error("invalid demo magic: expected 'HL2DEMO\\0', got {actual:?}")]
    InvalidMagic { actual: Vec<u8> },

    /// Demo protocol without an engine profile.
    #[error("unsupported demo protocol {demo} (network protocol {network})")]
    UnsupportedProtocol { demo: i32, network: i32 },

    /// A frame header named a packet kind the profile does not know.
    #[error("unknown packet kind {tag} at byte offset {offset}")]
    UnknownPacketKind { tag: u8, offset: usize },

    /// A net message tag with neither a decoder nor a declared length.
    #[error("unknown net message tag {tag} at bit {position}")]
    UnknownMessage { tag: u32, position: usize },

    /// A packet declared more payload bytes than the file has left.
    #[error("{kind} frame at byte offset {offset} declares {declared} bytes, {available} available")]
    FrameOverrun {
        kind: &'static str,
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// A structured payload finished decoding with unread data left over.
    #[error("{context}: {bits} bits left unread after decoding")]
    TrailingBits { context: &'static str, bits: usize },

    /// A length field was negative or does not fit its encoding.
    #[error("{context}: invalid length {length}")]
    InvalidLength { context: &'static str, length: i64 },

    /// A tag was registered outside the range of the profile's tag width.
    #[error("message tag {tag} does not fit in {bits} bits")]
    InvalidTag { tag: u32, bits: u32 },

    /// A component cannot be encoded with the active profile.
    #[error("{0} has no tag in the active engine profile")]
    NotInProfile(&'static str),

    /// JSON export error.
    #[cfg(feature = "json")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error was raised before any frame was decoded.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Error::HeaderTooShort { .. } | Error::InvalidMagic { .. } | Error::UnsupportedProtocol { .. }
        )
    }
}

/// Result type for demo operations.
pub type Result<T> = std::result::Result<T, Error>;
