//! An arena of tables addressed by generation-checked handles.
//!
//! Tables are owned by a [Heap] and referenced from values through a [TableId]. A freed slot is
//! reused by later allocations with a bumped generation, so handles to the freed table are
//! rejected with [Error::StaleTable] instead of silently aliasing the new occupant.
//!
//! The heap does not collect garbage: tables live until they are [Heap::free]d (or the heap is
//! dropped).

use crate::{
    value::{Key, Value},
    Error,
};
use std::{
    collections::{hash_map, HashMap},
    fmt,
};

/// Handle to a table stored in a [Heap].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    index: u32,
    generation: u32,
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}.{}", self.index, self.generation)
    }
}

/// An associative array with an array prefix.
///
/// Invariants:
/// - `array` holds the values of keys `1..=array.len()`, none of which is `Nil`.
/// - `hash` never holds the key `array.len() + 1` (such an entry is migrated into `array`).
/// - `hash` never holds a `Nil` value.
#[derive(Clone, Debug, Default)]
pub struct Table {
    array: Vec<Value>,
    hash: HashMap<Key, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table whose array part holds `values` (a `Nil` ends the array part, later values
    /// land in the hash part).
    pub fn from_array(values: impl IntoIterator<Item = Value>) -> Self {
        let mut table = Self::new();
        for (i, value) in values.into_iter().enumerate() {
            // Integer keys are always valid.
            let _ = table.set(Value::Int(i as i64 + 1), value);
        }
        table
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let key = Key::new(key)?;
        if let Key::Int(i) = key {
            if i >= 1 && (i as u64) <= self.array.len() as u64 {
                return self.array.get(i as usize - 1);
            }
        }
        self.hash.get(&key)
    }

    /// Stores `value` under `key`. Storing `Nil` removes the entry.
    ///
    /// Fails with [Error::InvalidKey] if `key` is `Nil` or NaN.
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), Error> {
        let key = Key::new(&key).ok_or(Error::InvalidKey)?;
        if let Key::Int(i) = key {
            let len = self.array.len() as i64;
            if (1..=len).contains(&i) {
                let index = (i - 1) as usize;
                if value.is_nil() {
                    // Everything after the hole moves to the hash part.
                    let tail = self.array.split_off(index);
                    for (offset, item) in tail.into_iter().enumerate().skip(1) {
                        self.hash.insert(Key::Int(i + offset as i64), item);
                    }
                } else {
                    self.array[index] = value;
                }
                return Ok(());
            }
            if i == len + 1 && !value.is_nil() {
                self.array.push(value);
                self.migrate();
                return Ok(());
            }
        }
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
        Ok(())
    }

    /// Appends `value` at key `len() + 1`. Pushing `Nil` does nothing.
    pub fn push(&mut self, value: Value) {
        if value.is_nil() {
            return;
        }
        self.array.push(value);
        self.migrate();
    }

    // Moves `len() + 1`, `len() + 2`, ... from the hash part into the array part.
    fn migrate(&mut self) {
        while let Some(value) = self.hash.remove(&Key::Int(self.array.len() as i64 + 1)) {
            self.array.push(value);
        }
    }

    /// Returns the length of the array part.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns true if the table holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.hash.is_empty()
    }

    /// Returns the array part.
    pub fn array(&self) -> &[Value] {
        &self.array
    }

    /// Returns the hash part in unspecified order.
    pub fn hash(&self) -> hash_map::Iter<'_, Key, Value> {
        self.hash.iter()
    }

    /// Returns the number of entries in the hash part.
    pub fn hash_len(&self) -> usize {
        self.hash.len()
    }

    /// Returns every entry: the array part in order, then the hash part in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Value, &Value)> {
        self.array
            .iter()
            .enumerate()
            .map(|(i, value)| (Value::Int(i as i64 + 1), value))
            .chain(self.hash.iter().map(|(key, value)| (key.to_value(), value)))
    }
}

struct Slot {
    generation: u32,
    table: Option<Table>,
}

/// Owner of every table reachable from a set of values.
#[derive(Default)]
pub struct Heap {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `table` into the heap and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if the heap already holds `u32::MAX` slots.
    pub fn alloc(&mut self, table: Table) -> TableId {
        self.live += 1;
        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.table = Some(table);
            return TableId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("heap exceeds u32 slots");
        self.slots.push(Slot {
            generation: 0,
            table: Some(table),
        });
        TableId {
            index,
            generation: 0,
        }
    }

    /// Returns the table behind `id`.
    pub fn get(&self, id: TableId) -> Result<&Table, Error> {
        match self.slots.get(id.index as usize) {
            Some(slot) if slot.generation == id.generation => {
                slot.table.as_ref().ok_or(Error::StaleTable)
            }
            _ => Err(Error::StaleTable),
        }
    }

    /// Returns the table behind `id` for mutation.
    pub fn get_mut(&mut self, id: TableId) -> Result<&mut Table, Error> {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation => {
                slot.table.as_mut().ok_or(Error::StaleTable)
            }
            _ => Err(Error::StaleTable),
        }
    }

    /// Removes the table behind `id` and invalidates every handle to it.
    pub fn free(&mut self, id: TableId) -> Result<Table, Error> {
        let slot = match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation => slot,
            _ => return Err(Error::StaleTable),
        };
        let table = slot.table.take().ok_or(Error::StaleTable)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        self.live -= 1;
        Ok(table)
    }

    /// Returns true if `id` refers to a live table.
    pub fn contains(&self, id: TableId) -> bool {
        self.get(id).is_ok()
    }

    /// Returns the number of live tables.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns true if `a` (in this heap) and `b` (in `other`) describe the same value graph.
    ///
    /// Scalars compare with [Value]'s equality. Tables compare structurally, with identities
    /// paired one-to-one: a table shared along two paths in `a` must be shared along the same
    /// paths in `b`, and cycles must close at the same places.
    pub fn equivalent(&self, a: &Value, other: &Heap, b: &Value) -> bool {
        let mut pairs = Pairs::default();
        self.equivalent_in(a, other, b, &mut pairs)
    }

    fn equivalent_in(&self, a: &Value, other: &Heap, b: &Value, pairs: &mut Pairs) -> bool {
        let (Value::Table(x), Value::Table(y)) = (a, b) else {
            return a == b;
        };
        match (pairs.forward.get(x), pairs.backward.get(y)) {
            (Some(px), Some(py)) => return px == y && py == x,
            (None, None) => {}
            _ => return false,
        }
        let (Ok(tx), Ok(ty)) = (self.get(*x), other.get(*y)) else {
            return false;
        };
        if tx.array.len() != ty.array.len() || tx.hash.len() != ty.hash.len() {
            return false;
        }
        pairs.forward.insert(*x, *y);
        pairs.backward.insert(*y, *x);

        for (va, vb) in tx.array.iter().zip(ty.array.iter()) {
            if !self.equivalent_in(va, other, vb, pairs) {
                return false;
            }
        }
        for (key, va) in tx.hash.iter() {
            let Key::Table(kx) = key else {
                match ty.hash.get(key) {
                    Some(vb) if self.equivalent_in(va, other, vb, pairs) => continue,
                    _ => return false,
                }
            };
            if let Some(ky) = pairs.forward.get(kx) {
                match ty.hash.get(&Key::Table(*ky)) {
                    Some(vb) if self.equivalent_in(va, other, vb, pairs) => continue,
                    _ => return false,
                }
            }

            // An unpaired table key: try each unpaired table key on the other side.
            let found = ty.hash.iter().any(|(candidate, vb)| {
                let Key::Table(ky) = candidate else {
                    return false;
                };
                if pairs.backward.contains_key(ky) {
                    return false;
                }
                let snapshot = pairs.clone();
                let (kx, ky) = (Value::Table(*kx), Value::Table(*ky));
                let matched = self.equivalent_in(&kx, other, &ky, pairs)
                    && self.equivalent_in(va, other, vb, pairs);
                if !matched {
                    *pairs = snapshot;
                }
                matched
            });
            if !found {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Default)]
struct Pairs {
    forward: HashMap<TableId, TableId>,
    backward: HashMap<TableId, TableId>,
}
