//! Encode values into the tagged wire format.
//!
//! An [Encoder] covers one top-level write call: every value passed to [Encoder::encode] shares
//! the same reference table, and back-reference offsets are measured from the first byte the
//! encoder produced.
//!
//! # Tables
//!
//! ```text
//! TABLE  array[0] .. array[n-1]  TABLE_DELIMITER  key_0 value_0 .. key_m value_m  TABLE_END
//! ```
//!
//! The first time a table is met its offset is recorded. Later occurrences (shared subtables,
//! cycles) are written as `TABLE_REF` followed by that offset.

use crate::{
    config::{Config, Traversal},
    heap::{Heap, Table, TableId},
    value::{integral, Value},
    wire, Error,
};
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

/// Writes values for a single top-level call.
pub struct Encoder<'a> {
    heap: &'a Heap,
    cfg: &'a Config,
    refs: HashMap<TableId, usize>,
    out: BytesMut,
}

enum Task {
    Value(Value, usize),
    Mark(u8),
}

impl<'a> Encoder<'a> {
    /// Creates an encoder that resolves tables in `heap`.
    pub fn new(heap: &'a Heap, cfg: &'a Config) -> Self {
        Self {
            heap,
            cfg,
            refs: HashMap::new(),
            out: BytesMut::new(),
        }
    }

    /// Appends the encoding of `value`.
    ///
    /// On error the output may hold a partial encoding.
    pub fn encode(&mut self, value: &Value) -> Result<(), Error> {
        match self.cfg.traversal {
            Traversal::Recursive => self.write_recursive(value, 0),
            Traversal::Iterative => self.write_iterative(value),
        }
    }

    /// Returns the number of bytes produced so far.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Returns the produced bytes.
    pub fn finish(self) -> BytesMut {
        self.out
    }

    fn write_recursive(&mut self, value: &Value, depth: usize) -> Result<(), Error> {
        let Some(id) = self.leaf(value) else {
            return Ok(());
        };
        let Some(table) = self.open(id, depth)? else {
            return Ok(());
        };
        for item in table.array() {
            self.write_recursive(item, depth + 1)?;
        }
        self.out.put_u8(wire::TABLE_DELIMITER);
        for (key, item) in table.hash() {
            self.write_recursive(&key.to_value(), depth + 1)?;
            self.write_recursive(item, depth + 1)?;
        }
        self.out.put_u8(wire::TABLE_END);
        Ok(())
    }

    fn write_iterative(&mut self, root: &Value) -> Result<(), Error> {
        let mut stack = vec![Task::Value(root.clone(), 0)];
        while let Some(task) = stack.pop() {
            let (value, depth) = match task {
                Task::Mark(op) => {
                    self.out.put_u8(op);
                    continue;
                }
                Task::Value(value, depth) => (value, depth),
            };
            let Some(id) = self.leaf(&value) else {
                continue;
            };
            let Some(table) = self.open(id, depth)? else {
                continue;
            };

            // Pushed in reverse so that pops replay the recursive order.
            stack.push(Task::Mark(wire::TABLE_END));
            let entries: Vec<_> = table.hash().collect();
            for (key, item) in entries.into_iter().rev() {
                stack.push(Task::Value(item.clone(), depth + 1));
                stack.push(Task::Value(key.to_value(), depth + 1));
            }
            stack.push(Task::Mark(wire::TABLE_DELIMITER));
            for item in table.array().iter().rev() {
                stack.push(Task::Value(item.clone(), depth + 1));
            }
        }
        Ok(())
    }

    /// Writes `value` if it is not a table, otherwise returns the table to open.
    fn leaf(&mut self, value: &Value) -> Option<TableId> {
        match value {
            Value::Nil => self.out.put_u8(wire::NIL),
            Value::Bool(true) => self.out.put_u8(wire::TRUE),
            Value::Bool(false) => self.out.put_u8(wire::FALSE),
            Value::Int(n) => self.write_int(*n),
            Value::Float(f) => match integral(*f) {
                Some(n) => self.write_int(n),
                None => self.write_float(*f),
            },
            Value::Str(s) => {
                let len = s.len() as u64;
                let width = wire::size(len);
                self.out.put_u8(wire::tag(wire::STRING, width));
                self.cfg.byte_order.put_uint(&mut self.out, len, width);
                self.out.put_slice(s);
            }
            Value::Table(id) => return Some(*id),
        }
        None
    }

    fn write_int(&mut self, n: i64) {
        if n == 0 {
            self.out.put_u8(wire::ZERO);
            return;
        }
        let bits = n as u64;
        let width = wire::size(bits);
        self.out.put_u8(wire::tag(wire::INT, width));
        self.cfg.byte_order.put_uint(&mut self.out, bits, width);
    }

    fn write_float(&mut self, f: f64) {
        let single = f as f32;
        if f64::from(single) == f {
            self.out.put_u8(wire::tag(wire::FLOAT, 4));
            self.cfg.byte_order.put_f32(&mut self.out, single);
        } else {
            self.out.put_u8(wire::tag(wire::FLOAT, 8));
            self.cfg.byte_order.put_f64(&mut self.out, f);
        }
    }

    /// Writes a back-reference if `id` was already written (returning `None`), otherwise records
    /// it, writes the `TABLE` tag and returns the table.
    fn open(&mut self, id: TableId, depth: usize) -> Result<Option<&'a Table>, Error> {
        let heap = self.heap;
        let table = heap.get(id)?;
        if let Some(&offset) = self.refs.get(&id) {
            self.write_ref(offset)?;
            return Ok(None);
        }
        if depth >= self.cfg.max_depth {
            return Err(Error::DepthExceeded(self.cfg.max_depth));
        }
        if self.refs.len() >= self.cfg.max_refs {
            return Err(Error::RefsOverflow(self.cfg.max_refs));
        }
        self.refs.insert(id, self.out.len());
        self.out.put_u8(wire::TABLE);
        Ok(Some(table))
    }

    fn write_ref(&mut self, offset: usize) -> Result<(), Error> {
        if let Ok(byte) = u8::try_from(offset) {
            self.out.put_u8(wire::tag(wire::TABLE_REF, 0));
            self.out.put_u8(byte);
            return Ok(());
        }
        if !self.cfg.wide_refs {
            return Err(Error::RefOffsetOverflow(offset));
        }
        let offset = offset as u64;
        let width = wire::size(offset);
        self.out.put_u8(wire::tag(wire::TABLE_REF, width));
        self.cfg.byte_order.put_uint(&mut self.out, offset, width);
        Ok(())
    }
}

/// Encodes `values` as one call (sharing one reference table).
pub fn encode_all(heap: &Heap, cfg: &Config, values: &[Value]) -> Result<BytesMut, Error> {
    let mut encoder = Encoder::new(heap, cfg);
    for value in values {
        encoder.encode(value)?;
    }
    Ok(encoder.finish())
}

/// Encodes a single value.
pub fn encode(heap: &Heap, cfg: &Config, value: &Value) -> Result<BytesMut, Error> {
    encode_all(heap, cfg, std::slice::from_ref(value))
}
