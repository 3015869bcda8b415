//! Read and write tagged values over a growable byte stream.
//!
//! A [Stream] pairs one [Buffer] (which holds the content and its write cursor) with an
//! independent read cursor. Values are appended or inserted anywhere in the content and read back
//! sequentially from the read cursor:
//!
//! ```text
//! 0            cursor               size
//! +--------------+--------------------+
//! |     read     |       unread       |
//! +--------------+--------------------+
//! ```
//!
//! Inserting before the read cursor shifts it right so that it keeps pointing at the same unread
//! byte. Removing bytes before it shifts it left, and removing a range that covers it pulls it
//! back to the start of the range.
//!
//! # Atomicity
//!
//! Writes encode into scratch space first, so a failed [Stream::write] or
//! [Stream::write_formatted] leaves the content untouched. Reads only move the cursor once every
//! requested value has been decoded.
//!
//! # Release
//!
//! [Stream::release] frees the content early. Every later operation fails with
//! [Error::Released].
//!
//! # Example
//!
//! ```
//! use tagwire_codec::{Heap, Table, Value};
//! use tagwire_stream::{Config, Stream};
//!
//! let mut heap = Heap::new();
//! let table = heap.alloc(Table::from_array([Value::Int(1), Value::Int(2)]));
//!
//! let mut stream = Stream::new(Config::default());
//! let values = [Value::Int(42), Value::str("hi"), table.into()];
//! let (start, end) = stream.write(&heap, &values).unwrap();
//! assert_eq!((start, end), (0, stream.size().unwrap()));
//!
//! let mut decoded = Heap::new();
//! let values = stream.read(&mut decoded, 3).unwrap();
//! assert_eq!(values[0], Value::Int(42));
//! assert_eq!(values[1], Value::str("hi"));
//! assert!(heap.equivalent(&table.into(), &decoded, &values[2]));
//! assert!(stream.eof().unwrap());
//! ```

use bytes::Bytes;
use std::fmt;
use tagwire_codec::{
    format, Buffer, Config as CodecConfig, Decoder, Encoder, Error as CodecError, Heap, Value,
};
use thiserror::Error;
use tracing::{debug, trace};

/// The initial capacity of a new stream, in bytes.
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// Errors that can occur when interacting with a stream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("stream released")]
    Released,
    #[error("out of range: {offset} + {len} > {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("codec error: {0}")]
    Codec(CodecError),
}

impl From<CodecError> for Error {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

/// Configuration for a [Stream].
#[derive(Clone, Debug)]
pub struct Config {
    /// The number of bytes allocated up front.
    pub initial_capacity: usize,

    /// How values are encoded and decoded.
    pub codec: CodecConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            codec: CodecConfig::default(),
        }
    }
}

/// A byte buffer with a read cursor.
pub struct Stream {
    buffer: Option<Buffer>,
    cursor: usize,
    cfg: Config,
}

impl Stream {
    /// Creates an empty stream.
    pub fn new(cfg: Config) -> Self {
        Self {
            buffer: Some(Buffer::new(cfg.initial_capacity)),
            cursor: 0,
            cfg,
        }
    }

    /// Creates a stream holding a copy of `bytes`, with the read cursor at the start.
    pub fn from_bytes(cfg: Config, bytes: &[u8]) -> Self {
        Self {
            buffer: Some(Buffer::with_content(cfg.initial_capacity, bytes)),
            cursor: 0,
            cfg,
        }
    }

    /// Returns the stream's configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn buffer(&self) -> Result<&Buffer, Error> {
        self.buffer.as_ref().ok_or(Error::Released)
    }

    /// Returns a deep copy of the stream, sized to its content, with the same read cursor.
    pub fn try_clone(&self) -> Result<Self, Error> {
        let buffer = self.buffer()?;
        let mut copy = Buffer::new(0);
        copy.ensure(buffer.tell());
        copy.append(buffer.as_slice());
        debug!(size = buffer.tell(), cursor = self.cursor, "cloned stream");
        Ok(Self {
            buffer: Some(copy),
            cursor: self.cursor,
            cfg: self.cfg.clone(),
        })
    }

    /// Frees the content. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            debug!(size = buffer.tell(), "released stream");
        }
        self.cursor = 0;
    }

    /// Returns true if the stream has been released.
    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }

    /// Returns the read cursor.
    pub fn tell(&self) -> Result<usize, Error> {
        self.buffer()?;
        Ok(self.cursor)
    }

    /// Moves the read cursor to `pos`, which may be at most [Stream::size].
    pub fn seek(&mut self, pos: usize) -> Result<(), Error> {
        let size = self.buffer()?.tell();
        if pos > size {
            return Err(Error::OutOfBounds {
                offset: pos,
                len: 0,
                size,
            });
        }
        self.cursor = pos;
        Ok(())
    }

    /// Returns the length of the content.
    pub fn size(&self) -> Result<usize, Error> {
        Ok(self.buffer()?.tell())
    }

    /// Returns the number of bytes allocated for the content.
    pub fn capacity(&self) -> Result<usize, Error> {
        Ok(self.buffer()?.size())
    }

    /// Returns the number of bytes after the read cursor.
    pub fn unread(&self) -> Result<usize, Error> {
        Ok(self.buffer()?.tell() - self.cursor)
    }

    /// Returns true if the stream has no content.
    pub fn empty(&self) -> Result<bool, Error> {
        Ok(self.buffer()?.tell() == 0)
    }

    /// Returns true if every byte has been read.
    pub fn eof(&self) -> Result<bool, Error> {
        Ok(self.cursor >= self.buffer()?.tell())
    }

    /// Returns a copy of the content.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        Ok(self.buffer()?.freeze())
    }

    // Appends raw bytes, returning the range they occupy.
    fn append(&mut self, bytes: &[u8]) -> Result<(usize, usize), Error> {
        let buffer = self.buffer.as_mut().ok_or(Error::Released)?;
        let start = buffer.tell();
        buffer.append(bytes);
        Ok((start, buffer.tell()))
    }

    // Inserts raw bytes at `at`, keeping the read cursor on the same unread byte.
    fn splice(&mut self, at: usize, bytes: &[u8]) -> Result<(usize, usize), Error> {
        let buffer = self.buffer.as_mut().ok_or(Error::Released)?;
        if at > buffer.tell() {
            return Err(Error::OutOfBounds {
                offset: at,
                len: 0,
                size: buffer.tell(),
            });
        }
        buffer.insert(at, bytes);
        if at < self.cursor {
            self.cursor += bytes.len();
        }
        Ok((at, at + bytes.len()))
    }

    /// Removes `len` bytes at `at`.
    pub fn remove(&mut self, at: usize, len: usize) -> Result<(), Error> {
        let buffer = self.buffer.as_mut().ok_or(Error::Released)?;
        let size = buffer.tell();
        let end = at.checked_add(len).filter(|end| *end <= size);
        let Some(end) = end else {
            return Err(Error::OutOfBounds {
                offset: at,
                len,
                size,
            });
        };
        buffer.remove(at, len);
        if self.cursor >= end {
            self.cursor -= len;
        } else if self.cursor >= at {
            self.cursor = at;
        }
        Ok(())
    }

    /// Copies `len` unread bytes (default: all of them) into `into`, at `at` (default: appended).
    ///
    /// Returns the range written in `into`. This stream's cursor does not move.
    pub fn copy(
        &self,
        into: &mut Stream,
        at: Option<usize>,
        len: Option<usize>,
    ) -> Result<(usize, usize), Error> {
        let buffer = self.buffer()?;
        let size = buffer.tell();
        let unread = size - self.cursor;
        let len = len.unwrap_or(unread);
        if len > unread {
            return Err(Error::OutOfBounds {
                offset: self.cursor,
                len,
                size,
            });
        }
        let bytes = &buffer.as_slice()[self.cursor..self.cursor + len];
        let range = match at {
            Some(at) => into.splice(at, bytes)?,
            None => into.append(bytes)?,
        };
        debug!(len, start = range.0, "copied between streams");
        Ok(range)
    }

    /// Moves `len` unread bytes (default: all of them) into `into`, at `at` (default: appended).
    ///
    /// Returns the range written in `into` and advances this stream's cursor past the moved
    /// bytes.
    pub fn extract(
        &mut self,
        into: &mut Stream,
        at: Option<usize>,
        len: Option<usize>,
    ) -> Result<(usize, usize), Error> {
        let (start, end) = self.copy(into, at, len)?;
        self.cursor += end - start;
        Ok((start, end))
    }

    /// Appends `len` unread bytes of `source` (default: all of them), advancing its cursor.
    pub fn write_from(
        &mut self,
        source: &mut Stream,
        len: Option<usize>,
    ) -> Result<(usize, usize), Error> {
        source.extract(self, None, len)
    }

    /// Inserts `len` unread bytes of `source` (default: all of them) at `at`, advancing its
    /// cursor.
    pub fn insert_from(
        &mut self,
        at: usize,
        source: &mut Stream,
        len: Option<usize>,
    ) -> Result<(usize, usize), Error> {
        source.extract(self, Some(at), len)
    }

    fn encode(&self, heap: &Heap, values: &[Value]) -> Result<Vec<u8>, Error> {
        let mut encoder = Encoder::new(heap, &self.cfg.codec);
        for value in values {
            encoder.encode(value)?;
        }
        Ok(encoder.finish().to_vec())
    }

    /// Appends `values`, returning the range they occupy.
    ///
    /// All values share one back-reference table, so a table appearing twice is written once.
    pub fn write(&mut self, heap: &Heap, values: &[Value]) -> Result<(usize, usize), Error> {
        self.buffer()?;
        let encoded = self.encode(heap, values)?;
        let range = self.append(&encoded)?;
        trace!(start = range.0, end = range.1, values = values.len(), "wrote values");
        Ok(range)
    }

    /// Inserts `values` at `at`, returning the range they occupy.
    pub fn insert(
        &mut self,
        heap: &Heap,
        at: usize,
        values: &[Value],
    ) -> Result<(usize, usize), Error> {
        let size = self.size()?;
        if at > size {
            return Err(Error::OutOfBounds {
                offset: at,
                len: 0,
                size,
            });
        }
        let encoded = self.encode(heap, values)?;
        let range = self.splice(at, &encoded)?;
        trace!(start = range.0, end = range.1, values = values.len(), "inserted values");
        Ok(range)
    }

    /// Reads `count` values from the cursor, allocating tables in `heap`.
    ///
    /// The cursor only moves if every value decodes.
    pub fn read(&mut self, heap: &mut Heap, count: usize) -> Result<Vec<Value>, Error> {
        let buffer = self.buffer.as_ref().ok_or(Error::Released)?;
        // Every value takes at least one byte.
        let mut values = Vec::with_capacity(count.min(buffer.tell() - self.cursor));
        let mut decoder = Decoder::new(heap, &self.cfg.codec, buffer.as_slice(), self.cursor);
        for _ in 0..count {
            match decoder.decode() {
                Ok(value) => values.push(value),
                Err(err) => {
                    let decoded = values.len();
                    debug!(?err, cursor = self.cursor, decoded, "failed to read values");
                    return Err(err.into());
                }
            }
        }
        let end = decoder.position();
        trace!(start = self.cursor, end, values = count, "read values");
        self.cursor = end;
        Ok(values)
    }

    /// Appends a record described by `fmt` (see [format]), returning the range it occupies.
    pub fn write_formatted(
        &mut self,
        heap: &Heap,
        fmt: &str,
        args: &[Value],
    ) -> Result<(usize, usize), Error> {
        let codec = &self.cfg.codec;
        let buffer = self.buffer.as_mut().ok_or(Error::Released)?;
        Ok(format::write(heap, codec, buffer, fmt, args)?)
    }

    /// Inserts a record described by `fmt` at `at`, returning the range it occupies.
    pub fn insert_formatted(
        &mut self,
        heap: &Heap,
        at: usize,
        fmt: &str,
        args: &[Value],
    ) -> Result<(usize, usize), Error> {
        let size = self.size()?;
        if at > size {
            return Err(Error::OutOfBounds {
                offset: at,
                len: 0,
                size,
            });
        }
        let packed = format::pack(heap, &self.cfg.codec, fmt, args)?;
        self.splice(at, &packed)
    }

    /// Reads a record described by `fmt` from the cursor.
    ///
    /// The cursor only moves if every field is read.
    pub fn read_formatted(&mut self, heap: &mut Heap, fmt: &str) -> Result<Vec<Value>, Error> {
        let buffer = self.buffer.as_ref().ok_or(Error::Released)?;
        let data = buffer.as_slice();
        let (values, end) = format::read(heap, &self.cfg.codec, data, self.cursor, fmt)
            .inspect_err(|err| {
                debug!(?err, cursor = self.cursor, format = fmt, "failed to read record")
            })?;
        self.cursor = end;
        Ok(values)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buffer {
            Some(buffer) => write!(f, "stream ({} bytes)", buffer.tell()),
            None => write!(f, "stream (released)"),
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("size", &self.buffer.as_ref().map(Buffer::tell))
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagwire_codec::{ByteOrder, Table};
    use test_case::test_case;

    fn stream(bytes: &[u8]) -> Stream {
        Stream::from_bytes(Config::default(), bytes)
    }

    #[test]
    fn test_new() {
        let s = Stream::new(Config::default());
        assert_eq!(s.size().unwrap(), 0);
        assert_eq!(s.capacity().unwrap(), DEFAULT_INITIAL_CAPACITY);
        assert!(s.empty().unwrap());
        assert!(s.eof().unwrap());
        assert_eq!(s.to_string(), "stream (0 bytes)");
    }

    #[test]
    fn test_from_bytes() {
        let s = stream(b"hello");
        assert_eq!(s.size().unwrap(), 5);
        assert_eq!(s.tell().unwrap(), 0);
        assert_eq!(s.unread().unwrap(), 5);
        assert!(!s.eof().unwrap());
        assert_eq!(s.to_bytes().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut s = stream(b"abcdef");
        s.seek(2).unwrap();
        let mut copy = s.try_clone().unwrap();
        assert_eq!(copy.tell().unwrap(), 2);
        assert_eq!(copy.capacity().unwrap(), 6);
        assert_eq!(copy.to_bytes().unwrap(), s.to_bytes().unwrap());

        copy.remove(0, 3).unwrap();
        assert_eq!(s.to_bytes().unwrap(), Bytes::from_static(b"abcdef"));
        assert_eq!(copy.to_bytes().unwrap(), Bytes::from_static(b"def"));
    }

    #[test]
    fn test_clone_keeps_config() {
        let cfg = Config {
            initial_capacity: 16,
            codec: CodecConfig {
                byte_order: ByteOrder::Big,
                ..CodecConfig::default()
            },
        };
        let s = Stream::new(cfg);
        let copy = s.try_clone().unwrap();
        assert_eq!(copy.config().initial_capacity, 16);
        assert_eq!(copy.config().codec.byte_order, ByteOrder::Big);
    }

    #[test]
    fn test_seek_bounds() {
        let mut s = stream(b"abc");
        s.seek(3).unwrap();
        assert!(s.eof().unwrap());
        assert_eq!(
            s.seek(4),
            Err(Error::OutOfBounds {
                offset: 4,
                len: 0,
                size: 3
            })
        );
        assert_eq!(s.tell().unwrap(), 3);
    }

    // Content "0123456789" with the cursor at 5.
    #[test_case(0, 2, 3; "before cursor")]
    #[test_case(3, 2, 3; "ending at cursor")]
    #[test_case(4, 3, 4; "straddling cursor")]
    #[test_case(5, 2, 5; "at cursor")]
    #[test_case(7, 2, 5; "after cursor")]
    #[test_case(0, 10, 0; "everything")]
    fn test_remove_adjusts_cursor(at: usize, len: usize, cursor: usize) {
        let mut s = stream(b"0123456789");
        s.seek(5).unwrap();
        s.remove(at, len).unwrap();
        assert_eq!(s.tell().unwrap(), cursor);
        assert_eq!(s.size().unwrap(), 10 - len);
    }

    #[test]
    fn test_remove_bounds() {
        let mut s = stream(b"abc");
        assert_eq!(
            s.remove(2, 2),
            Err(Error::OutOfBounds {
                offset: 2,
                len: 2,
                size: 3
            })
        );
        assert_eq!(
            s.remove(usize::MAX, 2),
            Err(Error::OutOfBounds {
                offset: usize::MAX,
                len: 2,
                size: 3
            })
        );
    }

    #[test]
    fn test_insert_before_cursor_shifts() {
        let heap = Heap::new();
        let mut s = Stream::new(Config::default());
        s.write(&heap, &[Value::Int(1), Value::Int(2)]).unwrap();
        let mut scratch = Heap::new();
        assert_eq!(s.read(&mut scratch, 1).unwrap(), vec![Value::Int(1)]);
        let cursor = s.tell().unwrap();

        // Inserting at the cursor leaves it in place, so the new value is read next.
        let (start, end) = s.insert(&heap, cursor, &[Value::str("mid")]).unwrap();
        assert_eq!(start, cursor);
        assert_eq!(s.tell().unwrap(), cursor);

        // Inserting before the cursor shifts it.
        s.insert(&heap, 0, &[Value::Bool(true)]).unwrap();
        assert_eq!(s.tell().unwrap(), cursor + 1);
        assert_eq!(
            s.read(&mut scratch, 2).unwrap(),
            vec![Value::str("mid"), Value::Int(2)]
        );
        assert!(s.eof().unwrap());
        assert_eq!(end - start, 5);

        s.seek(0).unwrap();
        assert_eq!(
            s.read(&mut scratch, 4).unwrap(),
            vec![Value::Bool(true), Value::Int(1), Value::str("mid"), Value::Int(2)]
        );
    }

    #[test]
    fn test_insert_bounds() {
        let heap = Heap::new();
        let mut s = stream(b"abc");
        assert_eq!(
            s.insert(&heap, 4, &[Value::Nil]),
            Err(Error::OutOfBounds {
                offset: 4,
                len: 0,
                size: 3
            })
        );
        assert_eq!(s.size().unwrap(), 3);
    }

    #[test]
    fn test_failed_write_is_atomic() {
        let mut heap = Heap::new();
        let stale = heap.alloc(Table::new());
        heap.free(stale).unwrap();

        let mut s = stream(b"keep");
        assert_eq!(
            s.write(&heap, &[Value::Int(1), stale.into()]),
            Err(Error::Codec(CodecError::StaleTable))
        );
        assert_eq!(s.to_bytes().unwrap(), Bytes::from_static(b"keep"));
    }

    #[test]
    fn test_failed_read_keeps_cursor() {
        let heap = Heap::new();
        let mut s = Stream::new(Config::default());
        s.write(&heap, &[Value::Int(7)]).unwrap();
        s.append(&[0x16, 9]).unwrap();

        let mut decoded = Heap::new();
        assert_eq!(
            s.read(&mut decoded, 2),
            Err(Error::Codec(CodecError::EndOfBuffer))
        );
        assert_eq!(s.tell().unwrap(), 0);
        assert_eq!(s.read(&mut decoded, 1).unwrap(), vec![Value::Int(7)]);
    }

    #[test]
    fn test_read_shares_refs_across_values() {
        let mut heap = Heap::new();
        let shared = heap.alloc(Table::from_array([Value::Int(1)]));
        let mut s = Stream::new(Config::default());
        s.write(&heap, &[shared.into(), shared.into()]).unwrap();

        let mut decoded = Heap::new();
        let values = s.read(&mut decoded, 2).unwrap();
        assert_eq!(values[0], values[1]);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_extract_and_copy() {
        let mut src = stream(b"abcdef");
        src.seek(1).unwrap();
        let mut dst = stream(b"[]");

        assert_eq!(src.copy(&mut dst, Some(1), Some(2)).unwrap(), (1, 3));
        assert_eq!(src.tell().unwrap(), 1);
        assert_eq!(dst.to_bytes().unwrap(), Bytes::from_static(b"[bc]"));

        assert_eq!(src.extract(&mut dst, None, Some(3)).unwrap(), (4, 7));
        assert_eq!(src.tell().unwrap(), 4);
        assert_eq!(dst.to_bytes().unwrap(), Bytes::from_static(b"[bc]bcd"));

        // Default length takes the rest.
        assert_eq!(src.extract(&mut dst, Some(0), None).unwrap(), (0, 2));
        assert!(src.eof().unwrap());
        assert_eq!(dst.to_bytes().unwrap(), Bytes::from_static(b"ef[bc]bcd"));

        assert_eq!(
            src.copy(&mut dst, None, Some(1)),
            Err(Error::OutOfBounds {
                offset: 6,
                len: 1,
                size: 6
            })
        );
        assert_eq!(
            stream(b"x").copy(&mut dst, Some(100), None),
            Err(Error::OutOfBounds {
                offset: 100,
                len: 0,
                size: 9
            })
        );
    }

    #[test]
    fn test_write_from_insert_from() {
        let mut src = stream(b"12345");
        let mut dst = stream(b"ab");
        dst.seek(1).unwrap();

        assert_eq!(dst.write_from(&mut src, Some(2)).unwrap(), (2, 4));
        assert_eq!(src.tell().unwrap(), 2);
        assert_eq!(dst.insert_from(0, &mut src, None).unwrap(), (0, 3));
        assert!(src.eof().unwrap());
        assert_eq!(dst.to_bytes().unwrap(), Bytes::from_static(b"345ab12"));
        assert_eq!(dst.tell().unwrap(), 4);
    }

    #[test]
    fn test_formatted() {
        let heap = Heap::new();
        let cfg = Config {
            codec: CodecConfig {
                byte_order: ByteOrder::Big,
                ..CodecConfig::default()
            },
            ..Config::default()
        };
        let mut s = Stream::new(cfg);
        s.write_formatted(&heap, "Wz", &[Value::Int(0x0102), Value::str("tag")])
            .unwrap();
        assert_eq!(s.to_bytes().unwrap(), Bytes::from_static(b"\x01\x02tag\0"));

        let mut decoded = Heap::new();
        assert_eq!(s.read_formatted(&mut decoded, "W").unwrap(), vec![Value::Int(0x0102)]);
        assert_eq!(s.insert_formatted(&heap, 0, "B", &[Value::Int(9)]).unwrap(), (0, 1));
        assert_eq!(s.tell().unwrap(), 3);
        assert_eq!(s.read_formatted(&mut decoded, "z").unwrap(), vec![Value::str("tag")]);

        s.seek(0).unwrap();
        assert_eq!(
            s.read_formatted(&mut decoded, "BWzd"),
            Err(Error::Codec(CodecError::OutOfBounds {
                offset: 7,
                len: 4,
                size: 7
            }))
        );
        assert_eq!(s.tell().unwrap(), 0);
    }

    #[test]
    fn test_release() {
        let heap = Heap::new();
        let mut decoded = Heap::new();
        let mut s = stream(b"abc");
        let mut other = stream(b"xyz");
        s.release();
        s.release();
        assert!(s.is_released());
        assert_eq!(s.to_string(), "stream (released)");

        assert_eq!(s.try_clone().err(), Some(Error::Released));
        assert_eq!(s.tell(), Err(Error::Released));
        assert_eq!(s.seek(0), Err(Error::Released));
        assert_eq!(s.size(), Err(Error::Released));
        assert_eq!(s.capacity(), Err(Error::Released));
        assert_eq!(s.unread(), Err(Error::Released));
        assert_eq!(s.empty(), Err(Error::Released));
        assert_eq!(s.eof(), Err(Error::Released));
        assert_eq!(s.to_bytes(), Err(Error::Released));
        assert_eq!(s.remove(0, 0), Err(Error::Released));
        assert_eq!(s.write(&heap, &[Value::Nil]), Err(Error::Released));
        assert_eq!(s.insert(&heap, 0, &[Value::Nil]), Err(Error::Released));
        assert_eq!(s.read(&mut decoded, 1), Err(Error::Released));
        assert_eq!(
            s.write_formatted(&heap, "b", &[Value::Int(1)]),
            Err(Error::Released)
        );
        assert_eq!(
            s.insert_formatted(&heap, 0, "b", &[Value::Int(1)]),
            Err(Error::Released)
        );
        assert_eq!(s.read_formatted(&mut decoded, "b"), Err(Error::Released));
        assert_eq!(s.copy(&mut other, None, None), Err(Error::Released));
        assert_eq!(s.extract(&mut other, None, None), Err(Error::Released));
        assert_eq!(other.copy(&mut s, None, None), Err(Error::Released));
        assert_eq!(s.write_from(&mut other, None), Err(Error::Released));
        assert_eq!(s.insert_from(0, &mut other, None), Err(Error::Released));

        // The source is untouched when the destination is released.
        assert_eq!(other.tell().unwrap(), 0);
    }
}
