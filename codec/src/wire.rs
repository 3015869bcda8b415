//! Tags and scalar encodings of the wire format.
//!
//! Every encoded value starts with a tag byte. The low nibble selects the opcode and the high
//! nibble carries the byte width of whatever immediately follows (number payloads, string
//! lengths and wide table references):
//!
//! ```text
//! +-------+--------+
//! | width | opcode |
//! +-------+--------+
//!  7     4 3      0
//! ```
//!
//! Integers and lengths are written with their most-significant zero bytes stripped, so the
//! width of a payload is the minimal number of bytes that represents it (`0` for zero).

use bytes::{Buf, BufMut};

pub const NIL: u8 = 0;
pub const TRUE: u8 = 1;
pub const FALSE: u8 = 2;
pub const ZERO: u8 = 3;
pub const FLOAT: u8 = 4;
pub const INT: u8 = 5;
pub const STRING: u8 = 6;
pub const TABLE: u8 = 7;
pub const TABLE_REF: u8 = 8;
pub const TABLE_DELIMITER: u8 = 9;
pub const TABLE_END: u8 = 10;

const OPCODE_MASK: u8 = 0x0f;
const WIDTH_SHIFT: u32 = 4;

/// Largest payload width (in bytes) that any tag carries.
pub const MAX_WIDTH: usize = 8;

/// Builds a tag from an opcode and a payload width.
#[inline]
pub fn tag(opcode: u8, width: usize) -> u8 {
    debug_assert!(width <= MAX_WIDTH);
    opcode | ((width as u8) << WIDTH_SHIFT)
}

/// Returns the opcode stored in the low nibble of `tag`.
#[inline]
pub fn opcode(tag: u8) -> u8 {
    tag & OPCODE_MASK
}

/// Returns the width stored in the high nibble of `tag`.
#[inline]
pub fn width(tag: u8) -> usize {
    (tag >> WIDTH_SHIFT) as usize
}

/// Returns the minimal number of bytes needed to hold `value`.
#[inline]
pub fn size(value: u64) -> usize {
    (u64::BITS - value.leading_zeros()).div_ceil(u8::BITS) as usize
}

/// Byte order of multi-byte fields on the wire.
///
/// Conversion goes through `to_le_bytes`/`to_be_bytes` (via [bytes]), which swap exactly when the
/// host order differs from the wire order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Writes the low `width` bytes of `value`.
    #[inline]
    pub fn put_uint(self, buf: &mut impl BufMut, value: u64, width: usize) {
        if width == 0 {
            return;
        }
        match self {
            ByteOrder::Little => buf.put_uint_le(value, width),
            ByteOrder::Big => buf.put_uint(value, width),
        }
    }

    /// Reads `width` bytes into the low bytes of a `u64`.
    ///
    /// The caller must ensure `buf` holds at least `width` bytes.
    #[inline]
    pub fn get_uint(self, buf: &mut impl Buf, width: usize) -> u64 {
        if width == 0 {
            return 0;
        }
        match self {
            ByteOrder::Little => buf.get_uint_le(width),
            ByteOrder::Big => buf.get_uint(width),
        }
    }

    #[inline]
    pub fn put_u16(self, buf: &mut impl BufMut, value: u16) {
        match self {
            ByteOrder::Little => buf.put_u16_le(value),
            ByteOrder::Big => buf.put_u16(value),
        }
    }

    #[inline]
    pub fn get_u16(self, buf: &mut impl Buf) -> u16 {
        match self {
            ByteOrder::Little => buf.get_u16_le(),
            ByteOrder::Big => buf.get_u16(),
        }
    }

    #[inline]
    pub fn put_u32(self, buf: &mut impl BufMut, value: u32) {
        match self {
            ByteOrder::Little => buf.put_u32_le(value),
            ByteOrder::Big => buf.put_u32(value),
        }
    }

    #[inline]
    pub fn get_u32(self, buf: &mut impl Buf) -> u32 {
        match self {
            ByteOrder::Little => buf.get_u32_le(),
            ByteOrder::Big => buf.get_u32(),
        }
    }

    #[inline]
    pub fn put_f32(self, buf: &mut impl BufMut, value: f32) {
        self.put_u32(buf, value.to_bits());
    }

    #[inline]
    pub fn get_f32(self, buf: &mut impl Buf) -> f32 {
        f32::from_bits(self.get_u32(buf))
    }

    #[inline]
    pub fn put_f64(self, buf: &mut impl BufMut, value: f64) {
        self.put_uint(buf, value.to_bits(), 8);
    }

    #[inline]
    pub fn get_f64(self, buf: &mut impl Buf) -> f64 {
        f64::from_bits(self.get_uint(buf, 8))
    }
}
