//! Common utilities for srcdemo.
//!
//! This crate provides the bit-granularity primitives shared by the demo
//! decoder:
//!
//! - [`BitReader`] - LSB-first bit cursor over a borrowed byte slice
//! - [`BitWriter`] - the mirrored writer used by every `encode` routine
//! - [`BitBuf`] - an owned run of bits that need not end on a byte boundary

mod bitbuf;
mod error;
mod reader;
mod writer;

pub use bitbuf::BitBuf;
pub use error::{Error, Result};
pub use reader::BitReader;
pub use writer::BitWriter;

/// Number of bits in a byte.
pub const BITS_PER_BYTE: usize = 8;
