//! Error types for codec operations

use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Bounds errors
    #[error("out of bounds: {offset} + {len} > {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    // Overflow errors
    #[error("table refs overflow: {0}")]
    RefsOverflow(usize),
    #[error("table ref offset does not fit in one byte: {0}")]
    RefOffsetOverflow(usize),
    #[error("nesting depth exceeded: {0}")]
    DepthExceeded(usize),

    // Decode errors
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),
    #[error("invalid tag: {0:#04x}")]
    InvalidTag(u8),
    #[error("bad table ref: {0}")]
    BadReference(usize),
    #[error("invalid table key")]
    InvalidKey,

    // Format errors
    #[error("unsupported format '{code}' at {position}")]
    UnsupportedFormat { code: char, position: usize },
    #[error("missing argument for '{code}' at {position}")]
    MissingArgument { code: char, position: usize },
    #[error("invalid argument for '{code}' at {position}: found {found}")]
    InvalidArgument {
        code: char,
        position: usize,
        found: &'static str,
    },

    // Value model errors
    #[error("stale table handle")]
    StaleTable,
}
