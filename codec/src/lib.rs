//! Encode dynamically typed values into a compact, self-describing binary format.
//!
//! # Overview
//!
//! The crate serializes values of a small dynamic type system (nil, booleans, numbers, byte
//! strings and tables) so that arbitrary table graphs, including shared and cyclic ones, survive
//! a round trip:
//!
//! - [Value] is the closed set of kinds. Tables live in a [Heap] and are addressed by [TableId],
//!   which gives them the identity needed to detect sharing.
//! - [encode] / [Encoder] write values using single-byte tags, minimal-width integers and
//!   back-references for tables seen earlier in the same call.
//! - [decode] / [Decoder] read untrusted input with every access bounds-checked and nesting
//!   bounded by [Config].
//! - [format] packs and unpacks fixed-layout records described by a format string.
//! - [Buffer] is a growable byte region with positional insert and remove.
//!
//! # Wire Format
//!
//! Every value starts with a tag byte whose low nibble is an opcode and whose high nibble is the
//! width of the bytes that follow (see [wire]). A table is written as its array part, a
//! delimiter, its remaining key/value pairs and an end marker. A table already written in the
//! same call is replaced by a reference to the offset of its first occurrence.
//!
//! # Example
//!
//! ```
//! use tagwire_codec::{decode, encode, Config, Heap, Table, Value};
//!
//! let mut heap = Heap::new();
//! let mut table = Table::from_array([Value::Int(1), Value::Int(2)]);
//! table.set("x".into(), Value::Int(9)).unwrap();
//! let table = heap.alloc(table);
//!
//! let cfg = Config::default();
//! let encoded = encode(&heap, &cfg, &table.into()).unwrap();
//!
//! let mut decoded_heap = Heap::new();
//! let decoded = decode(&mut decoded_heap, &cfg, &encoded).unwrap();
//! assert!(heap.equivalent(&table.into(), &decoded_heap, &decoded));
//! ```

pub mod buffer;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod heap;
pub mod value;
pub mod wire;

// Re-export main types
pub use buffer::Buffer;
pub use config::{Config, Traversal};
pub use decode::{decode, decode_all, Decoder};
pub use encode::{encode, encode_all, Encoder};
pub use error::Error;
pub use heap::{Heap, Table, TableId};
pub use value::{Key, Value};
pub use wire::ByteOrder;
