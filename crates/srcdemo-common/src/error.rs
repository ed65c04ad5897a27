//! Error types for srcdemo-common.

use thiserror::Error;

/// Common error type for bit-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A read requested more bits than remain in the cursor.
    #[error("buffer underflow: needed {needed} bits but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// An integer read or write was asked for an unsupported width.
    #[error("invalid bit width {0} (expected 1..=32)")]
    InvalidBitWidth(u32),

    /// Missing null terminator in string.
    #[error("string missing null terminator")]
    MissingNullTerminator,
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::BufferUnderflow { needed: 12, available: 3 };
        assert_eq!(err.to_string(), "buffer underflow: needed 12 bits but only 3 available");
        assert_eq!(Error::InvalidBitWidth(33).to_string(), "invalid bit width 33 (expected 1..=32)");
        assert_eq!(Error::MissingNullTerminator.to_string(), "string missing null terminator");
    }
}
