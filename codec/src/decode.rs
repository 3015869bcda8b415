//! Decode values from the tagged wire format.
//!
//! A [Decoder] covers one top-level read call over a byte slice: tables decoded anywhere in the
//! call can be the target of later back-references, and reference offsets are measured from the
//! position the decoder started at.
//!
//! Input is untrusted. Every read is checked against the end of the slice, widths carried in
//! tags are validated, and table nesting and the number of tables are bounded by [Config].

use crate::{
    config::{Config, Traversal},
    heap::{Heap, Table, TableId},
    value::Value,
    wire, Error,
};
use bytes::Bytes;
use std::collections::HashMap;

/// Reads values for a single top-level call.
pub struct Decoder<'a, 'h> {
    heap: &'h mut Heap,
    cfg: &'a Config,
    data: &'a [u8],
    pos: usize,
    base: usize,
    refs: HashMap<usize, TableId>,
}

enum Item {
    Value(Value),
    Open(TableId),
    Delimiter,
    End,
}

enum Frame {
    Array { id: TableId, next: i64 },
    Key { id: TableId },
    Value { id: TableId, key: Value },
}

impl<'a, 'h> Decoder<'a, 'h> {
    /// Creates a decoder that reads `data` starting at `pos`, allocating tables in `heap`.
    pub fn new(heap: &'h mut Heap, cfg: &'a Config, data: &'a [u8], pos: usize) -> Self {
        Self {
            heap,
            cfg,
            data,
            pos,
            base: pos,
            refs: HashMap::new(),
        }
    }

    /// Returns the position after the last decoded value.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes left after [Decoder::position].
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Decodes the next value.
    ///
    /// On error the position is unspecified, and tables allocated for the failed value remain
    /// in the heap.
    pub fn decode(&mut self) -> Result<Value, Error> {
        match self.cfg.traversal {
            Traversal::Recursive => self.read_recursive(0),
            Traversal::Iterative => self.read_iterative(),
        }
    }

    fn read_recursive(&mut self, depth: usize) -> Result<Value, Error> {
        match self.item(depth)? {
            Item::Value(value) => Ok(value),
            Item::Open(id) => self.fill_recursive(id, depth),
            Item::Delimiter => Err(Error::InvalidTag(wire::TABLE_DELIMITER)),
            Item::End => Err(Error::InvalidTag(wire::TABLE_END)),
        }
    }

    // Reads the entries of a table whose tag was already consumed at `depth`.
    fn fill_recursive(&mut self, id: TableId, depth: usize) -> Result<Value, Error> {
        let mut index = 1i64;
        loop {
            let value = match self.item(depth + 1)? {
                Item::Value(value) => value,
                Item::Open(child) => self.fill_recursive(child, depth + 1)?,
                Item::Delimiter => break,
                Item::End => return Err(Error::InvalidTag(wire::TABLE_END)),
            };
            self.heap.get_mut(id)?.set(Value::Int(index), value)?;
            index += 1;
        }
        loop {
            let key = match self.item(depth + 1)? {
                Item::Value(value) => value,
                Item::Open(child) => self.fill_recursive(child, depth + 1)?,
                Item::End => break,
                Item::Delimiter => return Err(Error::InvalidTag(wire::TABLE_DELIMITER)),
            };
            let value = self.read_recursive(depth + 1)?;
            self.heap.get_mut(id)?.set(key, value)?;
        }
        Ok(Value::Table(id))
    }

    fn read_iterative(&mut self) -> Result<Value, Error> {
        // Each open table owns exactly one frame, so the stack height is the nesting depth.
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let value = match self.item(stack.len())? {
                Item::Value(value) => value,
                Item::Open(id) => {
                    stack.push(Frame::Array { id, next: 1 });
                    continue;
                }
                Item::Delimiter => match stack.last_mut() {
                    Some(frame) => match *frame {
                        Frame::Array { id, .. } => {
                            *frame = Frame::Key { id };
                            continue;
                        }
                        _ => return Err(Error::InvalidTag(wire::TABLE_DELIMITER)),
                    },
                    None => return Err(Error::InvalidTag(wire::TABLE_DELIMITER)),
                },
                Item::End => match stack.pop() {
                    Some(Frame::Key { id }) => Value::Table(id),
                    _ => return Err(Error::InvalidTag(wire::TABLE_END)),
                },
            };

            // Hand the completed value to the enclosing table.
            let Some(frame) = stack.last_mut() else {
                return Ok(value);
            };
            match frame {
                Frame::Array { id, next } => {
                    self.heap.get_mut(*id)?.set(Value::Int(*next), value)?;
                    *next += 1;
                }
                Frame::Key { id } => {
                    let id = *id;
                    *frame = Frame::Value { id, key: value };
                }
                Frame::Value { id, key } => {
                    let (id, key) = (*id, std::mem::take(key));
                    self.heap.get_mut(id)?.set(key, value)?;
                    *frame = Frame::Key { id };
                }
            }
        }
    }

    /// Reads one tag and its payload. `depth` is the number of tables enclosing the item.
    fn item(&mut self, depth: usize) -> Result<Item, Error> {
        let start = self.pos;
        let tag = self.take(1)?[0];
        let width = wire::width(tag);
        let item = match wire::opcode(tag) {
            wire::NIL => self.bare(tag, Item::Value(Value::Nil))?,
            wire::TRUE => self.bare(tag, Item::Value(Value::Bool(true)))?,
            wire::FALSE => self.bare(tag, Item::Value(Value::Bool(false)))?,
            wire::ZERO => self.bare(tag, Item::Value(Value::Int(0)))?,
            wire::INT => {
                if !(1..=wire::MAX_WIDTH).contains(&width) {
                    return Err(Error::InvalidTag(tag));
                }
                Item::Value(Value::Int(self.uint(width)? as i64))
            }
            wire::FLOAT => {
                let order = self.cfg.byte_order;
                let value = match width {
                    4 => f64::from(order.get_f32(&mut self.take(4)?)),
                    8 => order.get_f64(&mut self.take(8)?),
                    _ => return Err(Error::InvalidTag(tag)),
                };
                Item::Value(Value::Float(value))
            }
            wire::STRING => {
                if width > wire::MAX_WIDTH {
                    return Err(Error::InvalidTag(tag));
                }
                let len = self.uint(width)?;
                let len = usize::try_from(len).map_err(|_| Error::EndOfBuffer)?;
                let bytes = self.take(len)?;
                Item::Value(Value::Str(Bytes::copy_from_slice(bytes)))
            }
            wire::TABLE => {
                self.bare(tag, ())?;
                if depth >= self.cfg.max_depth {
                    return Err(Error::DepthExceeded(self.cfg.max_depth));
                }
                if self.refs.len() >= self.cfg.max_refs {
                    return Err(Error::RefsOverflow(self.cfg.max_refs));
                }
                let id = self.heap.alloc(Table::new());
                self.refs.insert(start - self.base, id);
                Item::Open(id)
            }
            wire::TABLE_REF => {
                let offset = match width {
                    0 => self.take(1)?[0] as u64,
                    1..=wire::MAX_WIDTH => self.uint(width)?,
                    _ => return Err(Error::InvalidTag(tag)),
                };
                let offset = usize::try_from(offset).map_err(|_| Error::BadReference(usize::MAX))?;
                match self.refs.get(&offset) {
                    Some(id) => Item::Value(Value::Table(*id)),
                    None => return Err(Error::BadReference(offset)),
                }
            }
            wire::TABLE_DELIMITER => self.bare(tag, Item::Delimiter)?,
            wire::TABLE_END => self.bare(tag, Item::End)?,
            _ => return Err(Error::InvalidOpcode(tag)),
        };
        Ok(item)
    }

    // Opcodes without a payload must carry a zero width.
    fn bare<T>(&self, tag: u8, item: T) -> Result<T, Error> {
        if wire::width(tag) != 0 {
            return Err(Error::InvalidTag(tag));
        }
        Ok(item)
    }

    fn uint(&mut self, width: usize) -> Result<u64, Error> {
        let order = self.cfg.byte_order;
        let mut bytes = self.take(width)?;
        Ok(order.get_uint(&mut bytes, width))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let data = self.data;
        let end = self.pos.checked_add(n).ok_or(Error::EndOfBuffer)?;
        let bytes = data.get(self.pos..end).ok_or(Error::EndOfBuffer)?;
        self.pos = end;
        Ok(bytes)
    }
}

/// Decodes every value in `data` as one call.
pub fn decode_all(heap: &mut Heap, cfg: &Config, data: &[u8]) -> Result<Vec<Value>, Error> {
    let mut decoder = Decoder::new(heap, cfg, data, 0);
    let mut values = Vec::new();
    while decoder.remaining() > 0 {
        values.push(decoder.decode()?);
    }
    Ok(values)
}

/// Decodes exactly one value from `data`, failing if bytes remain.
pub fn decode(heap: &mut Heap, cfg: &Config, data: &[u8]) -> Result<Value, Error> {
    let mut decoder = Decoder::new(heap, cfg, data, 0);
    let value = decoder.decode()?;
    match decoder.remaining() {
        0 => Ok(value),
        remaining => Err(Error::ExtraData(remaining)),
    }
}
