#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tagwire_codec::{decode, encode, Config, Heap, Table, TableId, Traversal, Value};

#[derive(Arbitrary, Debug)]
enum Scalar {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Nil => Value::Nil,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(n) => Value::Int(n),
            // NaN never compares equal to itself.
            Scalar::Float(f) if f.is_nan() => Value::Float(0.5),
            Scalar::Float(f) => Value::Float(f),
            Scalar::Str(s) => Value::from(s),
        }
    }
}

/// An edit applied to the table graph before encoding.
#[derive(Arbitrary, Debug)]
enum Op {
    /// Allocate a new empty table.
    Alloc,
    /// Append a scalar to the array part of table `target`.
    Push { target: u8, value: Scalar },
    /// Store a scalar under a scalar key.
    Set { target: u8, key: Scalar, value: Scalar },
    /// Store table `child` under key `key` of table `target` (may create sharing or cycles).
    Link { target: u8, key: Scalar, child: u8 },
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    iterative: bool,
    wide_refs: bool,
    ops: Vec<Op>,
}

fn pick(tables: &[TableId], index: u8) -> TableId {
    tables[index as usize % tables.len()]
}

fn fuzz(input: FuzzInput) {
    let mut heap = Heap::new();
    let mut tables = vec![heap.alloc(Table::new())];
    for op in input.ops {
        match op {
            Op::Alloc => tables.push(heap.alloc(Table::new())),
            Op::Push { target, value } => {
                heap.get_mut(pick(&tables, target)).unwrap().push(value.into());
            }
            Op::Set { target, key, value } => {
                let _ = heap
                    .get_mut(pick(&tables, target))
                    .unwrap()
                    .set(key.into(), value.into());
            }
            Op::Link { target, key, child } => {
                let child = pick(&tables, child);
                let _ = heap
                    .get_mut(pick(&tables, target))
                    .unwrap()
                    .set(key.into(), child.into());
            }
        }
    }

    let cfg = Config {
        traversal: if input.iterative {
            Traversal::Iterative
        } else {
            Traversal::Recursive
        },
        wide_refs: input.wide_refs,
        ..Config::default()
    };
    let root = Value::Table(tables[0]);
    let Ok(encoded) = encode(&heap, &cfg, &root) else {
        return;
    };
    let mut decoded_heap = Heap::new();
    let decoded =
        decode(&mut decoded_heap, &cfg, &encoded).expect("failed to decode encoded graph");
    assert!(heap.equivalent(&root, &decoded_heap, &decoded));
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
