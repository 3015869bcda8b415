//! Fixed-layout records described by a format string.
//!
//! A format string is a sequence of one-letter codes, each optionally followed by decimal digits
//! giving an explicit byte length:
//!
//! | Code | Field | Width |
//! |------|-------|-------|
//! | `b` / `B` | signed / unsigned byte | 1 |
//! | `w` / `W` | signed / unsigned word | 2 |
//! | `d` / `D` | signed / unsigned double word | 4 |
//! | `f` | float (`f64`) | 8 |
//! | `z` | NUL-terminated string | length + 1 |
//! | `s` | raw string | length |
//! | `o` | one self-describing value | variable |
//!
//! Multi-byte fields use [Config::byte_order]. A length of `0` (or none) means the natural length:
//! the argument's length when writing, and for reading, up to the first NUL (`z`) or all unread
//! content (`s`). Explicit lengths truncate or NUL-pad the argument when writing. Lengths on the
//! fixed-width codes are accepted and ignored. Lengths above [MAX_FIELD_LEN] are rejected.
//!
//! Each `o` field is encoded with its own back-reference table.

use crate::{
    buffer::Buffer,
    config::Config,
    decode::Decoder,
    encode::Encoder,
    heap::Heap,
    value::Value,
    Error,
};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// The largest explicit length a format field may carry.
pub const MAX_FIELD_LEN: usize = 1 << 24;

/// The kind of a single field in a format string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Int { width: usize, signed: bool },
    Float,
    Zstr,
    Str,
    Value,
}

/// A parsed field: its code, where it sits in the format string, and its explicit length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub code: char,
    pub position: usize,
    pub kind: Kind,
    /// Explicit length, if one was given and is nonzero.
    pub len: Option<usize>,
}

/// Parses `fmt` into fields.
pub fn parse(fmt: &str) -> Result<Vec<Field>, Error> {
    let mut fields = Vec::new();
    let mut chars = fmt.char_indices().peekable();
    while let Some((position, code)) = chars.next() {
        let kind = match code {
            'b' => Kind::Int { width: 1, signed: true },
            'B' => Kind::Int { width: 1, signed: false },
            'w' => Kind::Int { width: 2, signed: true },
            'W' => Kind::Int { width: 2, signed: false },
            'd' => Kind::Int { width: 4, signed: true },
            'D' => Kind::Int { width: 4, signed: false },
            'f' => Kind::Float,
            'z' => Kind::Zstr,
            's' => Kind::Str,
            'o' => Kind::Value,
            _ => return Err(Error::UnsupportedFormat { code, position }),
        };

        let mut len = 0usize;
        while let Some((_, digit)) = chars.peek() {
            let Some(digit) = digit.to_digit(10) else {
                break;
            };
            len = len
                .checked_mul(10)
                .and_then(|len| len.checked_add(digit as usize))
                .filter(|len| *len <= MAX_FIELD_LEN)
                .ok_or(Error::UnsupportedFormat { code, position })?;
            chars.next();
        }
        fields.push(Field {
            code,
            position,
            kind,
            len: (len > 0).then_some(len),
        });
    }
    Ok(fields)
}

/// Encodes `args` according to `fmt`.
///
/// Arguments beyond those the format consumes are ignored.
pub fn pack(heap: &Heap, cfg: &Config, fmt: &str, args: &[Value]) -> Result<BytesMut, Error> {
    let fields = parse(fmt)?;
    let mut out = BytesMut::new();
    let mut args = args.iter();
    for field in fields.iter() {
        let arg = args.next().ok_or(Error::MissingArgument {
            code: field.code,
            position: field.position,
        })?;
        match field.kind {
            Kind::Int { width, .. } => {
                let n = match arg {
                    Value::Int(n) => *n,
                    Value::Float(f) => *f as i64,
                    _ => return Err(invalid(field, arg)),
                };
                // Only the low `width` bytes are written.
                cfg.byte_order.put_uint(&mut out, n as u64, width);
            }
            Kind::Float => {
                let f = arg.as_f64().ok_or_else(|| invalid(field, arg))?;
                cfg.byte_order.put_f64(&mut out, f);
            }
            Kind::Zstr => {
                let s = arg.as_bytes().ok_or_else(|| invalid(field, arg))?;
                put_str(&mut out, s, field.len);
                out.put_u8(0);
            }
            Kind::Str => {
                let s = arg.as_bytes().ok_or_else(|| invalid(field, arg))?;
                put_str(&mut out, s, field.len);
            }
            Kind::Value => {
                let mut encoder = Encoder::new(heap, cfg);
                encoder.encode(arg)?;
                out.extend_from_slice(&encoder.finish());
            }
        }
    }
    trace!(format = fmt, fields = fields.len(), bytes = out.len(), "packed record");
    Ok(out)
}

fn invalid(field: &Field, arg: &Value) -> Error {
    Error::InvalidArgument {
        code: field.code,
        position: field.position,
        found: arg.kind(),
    }
}

fn put_str(out: &mut BytesMut, s: &[u8], len: Option<usize>) {
    let Some(len) = len else {
        out.put_slice(s);
        return;
    };
    let n = len.min(s.len());
    out.put_slice(&s[..n]);
    out.put_bytes(0, len - n);
}

/// Appends the record to `buf`, returning the range it occupies.
///
/// Nothing is written if any field fails.
pub fn write(
    heap: &Heap,
    cfg: &Config,
    buf: &mut Buffer,
    fmt: &str,
    args: &[Value],
) -> Result<(usize, usize), Error> {
    let packed = pack(heap, cfg, fmt, args)?;
    let start = buf.tell();
    buf.append(&packed);
    Ok((start, buf.tell()))
}

/// Inserts the record into `buf` at `at`, returning the range it occupies.
///
/// Nothing is written if any field fails. Fails with [Error::OutOfBounds] if `at` is past the
/// content.
pub fn insert(
    heap: &Heap,
    cfg: &Config,
    buf: &mut Buffer,
    at: usize,
    fmt: &str,
    args: &[Value],
) -> Result<(usize, usize), Error> {
    if at > buf.tell() {
        return Err(Error::OutOfBounds {
            offset: at,
            len: 0,
            size: buf.tell(),
        });
    }
    let packed = pack(heap, cfg, fmt, args)?;
    buf.insert(at, &packed);
    Ok((at, at + packed.len()))
}

/// Reads a record from `data` starting at `pos`.
///
/// Returns the decoded fields and the position after the record. Tables decoded by `o` fields are
/// allocated in `heap`.
pub fn read(
    heap: &mut Heap,
    cfg: &Config,
    data: &[u8],
    pos: usize,
    fmt: &str,
) -> Result<(Vec<Value>, usize), Error> {
    let fields = parse(fmt)?;
    let mut values = Vec::with_capacity(fields.len());
    let mut pos = pos;
    for field in fields.iter() {
        let value = match field.kind {
            Kind::Int { width, signed } => {
                let mut bytes = take(data, pos, width)?;
                let raw = cfg.byte_order.get_uint(&mut bytes, width);
                pos += width;
                let n = if signed {
                    let shift = 64 - 8 * width as u32;
                    ((raw << shift) as i64) >> shift
                } else {
                    raw as i64
                };
                Value::Int(n)
            }
            Kind::Float => {
                let mut bytes = take(data, pos, 8)?;
                pos += 8;
                Value::Float(cfg.byte_order.get_f64(&mut bytes))
            }
            Kind::Zstr => match field.len {
                Some(len) => {
                    let width = len.checked_add(1).ok_or(Error::OutOfBounds {
                        offset: pos,
                        len,
                        size: data.len(),
                    })?;
                    let bytes = take(data, pos, width)?;
                    pos += width;
                    let end = bytes[..len].iter().position(|b| *b == 0).unwrap_or(len);
                    Value::Str(Bytes::copy_from_slice(&bytes[..end]))
                }
                None => {
                    let rest = data.get(pos..).unwrap_or_default();
                    let Some(end) = rest.iter().position(|b| *b == 0) else {
                        return Err(Error::OutOfBounds {
                            offset: pos,
                            len: rest.len() + 1,
                            size: data.len(),
                        });
                    };
                    pos += end + 1;
                    Value::Str(Bytes::copy_from_slice(&rest[..end]))
                }
            },
            Kind::Str => {
                let len = field.len.unwrap_or(data.len().saturating_sub(pos));
                let bytes = take(data, pos, len)?;
                pos += len;
                Value::Str(Bytes::copy_from_slice(bytes))
            }
            Kind::Value => {
                let mut decoder = Decoder::new(heap, cfg, data, pos);
                let value = decoder.decode()?;
                pos = decoder.position();
                value
            }
        };
        values.push(value);
    }
    trace!(format = fmt, fields = values.len(), end = pos, "unpacked record");
    Ok((values, pos))
}

fn take(data: &[u8], pos: usize, len: usize) -> Result<&[u8], Error> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or(Error::OutOfBounds {
            offset: pos,
            len,
            size: data.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{heap::Table, wire::ByteOrder};
    use test_case::test_case;

    fn roundtrip(fmt: &str, args: &[Value]) -> Vec<Value> {
        let heap = Heap::new();
        let cfg = Config::default();
        let mut buf = Buffer::new(4);
        let (start, end) = write(&heap, &cfg, &mut buf, fmt, args).unwrap();
        assert_eq!((start, end), (0, buf.tell()));
        let (values, pos) = read(&mut Heap::new(), &cfg, buf.as_slice(), 0, fmt).unwrap();
        assert_eq!(pos, end);
        values
    }

    #[test]
    fn test_parse() {
        let fields = parse("bW12z3s").unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].kind, Kind::Int { width: 1, signed: true });
        assert_eq!(fields[1].len, Some(12));
        assert_eq!(fields[2].position, 4);
        assert_eq!(fields[2].len, Some(3));
        assert_eq!(fields[3].len, None);
        assert_eq!(parse("s0").unwrap()[0].len, None);
        assert!(parse("").unwrap().is_empty());
    }

    #[test_case("bx", 'x', 1; "unknown code")]
    #[test_case("4b", '4', 0; "leading digit")]
    #[test_case("s99999999999999999999999", 's', 0; "length overflow")]
    #[test_case("bz18446744073709551615", 'z', 1; "length past usize")]
    #[test_case("s16777217", 's', 0; "length over limit")]
    fn test_unsupported(fmt: &str, code: char, position: usize) {
        assert_eq!(parse(fmt), Err(Error::UnsupportedFormat { code, position }));
    }

    #[test_case("b", -5, -5; "signed byte")]
    #[test_case("B", 250, 250; "unsigned byte")]
    #[test_case("B", -1, 255; "unsigned byte wraps")]
    #[test_case("b", 200, -56; "signed byte wraps")]
    #[test_case("w", -30000, -30000; "signed word")]
    #[test_case("W", 65535, 65535; "unsigned word")]
    #[test_case("d", -2_000_000_000, -2_000_000_000; "signed dword")]
    #[test_case("D", 4_000_000_000, 4_000_000_000; "unsigned dword")]
    #[test_case("D", 0x1_0000_0001, 1; "unsigned dword wraps")]
    fn test_integers(fmt: &str, input: i64, expected: i64) {
        assert_eq!(roundtrip(fmt, &[Value::Int(input)]), vec![Value::Int(expected)]);
    }

    #[test]
    fn test_every_code() {
        let mut heap = Heap::new();
        let mut table = Table::from_array([Value::Int(1), Value::str("two")]);
        table.set("k".into(), Value::Float(0.5)).unwrap();
        let table = heap.alloc(table);
        let args = [
            Value::Int(-1),
            Value::Int(200),
            Value::Int(-2),
            Value::Int(60000),
            Value::Int(-3),
            Value::Int(3_000_000_000),
            Value::Float(3.25),
            Value::str("zero"),
            Value::str("raw"),
            Value::Table(table),
            Value::str("tail"),
        ];
        let fmt = "bBwWdDfzs3os";
        let cfg = Config::default();
        let mut buf = Buffer::new(0);
        write(&heap, &cfg, &mut buf, fmt, &args).unwrap();

        let mut decoded_heap = Heap::new();
        let (values, pos) = read(&mut decoded_heap, &cfg, buf.as_slice(), 0, fmt).unwrap();
        assert_eq!(pos, buf.tell());
        assert_eq!(values.len(), args.len());
        for (i, (expected, actual)) in args.iter().zip(values.iter()).enumerate() {
            assert!(
                heap.equivalent(expected, &decoded_heap, actual),
                "field {i}: {expected} != {actual}"
            );
        }
    }

    #[test]
    fn test_explicit_lengths() {
        let heap = Heap::new();
        let cfg = Config::default();
        let mut buf = Buffer::new(0);
        let args = [
            Value::str("abcdef"),
            Value::str("ab"),
            Value::str("xyz"),
            Value::str("x"),
        ];
        write(&heap, &cfg, &mut buf, "s4s4z2z3", &args).unwrap();
        assert_eq!(buf.as_slice(), b"abcdab\0\0xy\0x\0\0\0");

        let (values, _) = read(&mut Heap::new(), &cfg, buf.as_slice(), 0, "s4s4z2z3").unwrap();
        assert_eq!(
            values,
            vec![
                Value::str("abcd"),
                Value::str("ab\0\0"),
                Value::str("xy"),
                Value::str("x"),
            ]
        );
    }

    #[test]
    fn test_float_accepts_int() {
        assert_eq!(roundtrip("f", &[Value::Int(7)]), vec![Value::Float(7.0)]);
        assert_eq!(roundtrip("d", &[Value::Float(-7.9)]), vec![Value::Int(-7)]);
    }

    #[test]
    fn test_big_endian() {
        let heap = Heap::new();
        let cfg = Config {
            byte_order: ByteOrder::Big,
            ..Config::default()
        };
        let packed = pack(&heap, &cfg, "Wd", &[Value::Int(0x0102), Value::Int(-2)]).unwrap();
        assert_eq!(&packed[..], &[0x01, 0x02, 0xff, 0xff, 0xff, 0xfe]);
        let little = pack(&heap, &Config::default(), "W", &[Value::Int(0x0102)]).unwrap();
        assert_eq!(&little[..], &[0x02, 0x01]);
    }

    #[test]
    fn test_short_read() {
        let data = [1, 2, 3];
        assert_eq!(
            read(&mut Heap::new(), &Config::default(), &data, 0, "d"),
            Err(Error::OutOfBounds {
                offset: 0,
                len: 4,
                size: 3
            })
        );
        assert_eq!(
            read(&mut Heap::new(), &Config::default(), &data, 1, "bz"),
            Err(Error::OutOfBounds {
                offset: 2,
                len: 2,
                size: 3
            })
        );
    }

    #[test]
    fn test_oversized_lengths() {
        let heap = Heap::new();
        let cfg = Config::default();
        assert_eq!(
            read(&mut Heap::new(), &cfg, b"abc", 0, "z18446744073709551615"),
            Err(Error::UnsupportedFormat {
                code: 'z',
                position: 0
            })
        );
        assert_eq!(
            pack(&heap, &cfg, "s18446744073709551615", &[Value::str("a")]),
            Err(Error::UnsupportedFormat {
                code: 's',
                position: 0
            })
        );
        assert_eq!(
            pack(&heap, &cfg, "s4000000000", &[Value::str("a")]),
            Err(Error::UnsupportedFormat {
                code: 's',
                position: 0
            })
        );

        // The largest accepted length still fails cleanly on short input.
        let fmt = format!("z{MAX_FIELD_LEN}");
        assert_eq!(
            read(&mut Heap::new(), &cfg, b"abc", 0, &fmt),
            Err(Error::OutOfBounds {
                offset: 0,
                len: MAX_FIELD_LEN + 1,
                size: 3
            })
        );
    }

    #[test]
    fn test_truncated_value() {
        let data = [0x16, 5, b'a'];
        assert_eq!(
            read(&mut Heap::new(), &Config::default(), &data, 0, "o"),
            Err(Error::EndOfBuffer)
        );
    }

    #[test]
    fn test_raw_string_reads_rest() {
        let data = b"\x05hello";
        let (values, pos) = read(&mut Heap::new(), &Config::default(), data, 0, "Bs").unwrap();
        assert_eq!(values, vec![Value::Int(5), Value::str("hello")]);
        assert_eq!(pos, data.len());
    }

    #[test]
    fn test_argument_errors() {
        let heap = Heap::new();
        let cfg = Config::default();
        assert_eq!(
            pack(&heap, &cfg, "bs", &[Value::Int(1)]),
            Err(Error::MissingArgument {
                code: 's',
                position: 1
            })
        );
        assert_eq!(
            pack(&heap, &cfg, "d", &[Value::str("1")]),
            Err(Error::InvalidArgument {
                code: 'd',
                position: 0,
                found: "string"
            })
        );
        assert_eq!(
            pack(&heap, &cfg, "z", &[Value::Bool(true)]),
            Err(Error::InvalidArgument {
                code: 'z',
                position: 0,
                found: "boolean"
            })
        );
    }

    #[test]
    fn test_failed_write_leaves_buffer() {
        let heap = Heap::new();
        let cfg = Config::default();
        let mut buf = Buffer::with_content(8, b"keep");
        assert!(write(&heap, &cfg, &mut buf, "bbq", &[Value::Int(1), Value::Int(2)]).is_err());
        assert!(write(&heap, &cfg, &mut buf, "bb", &[Value::Int(1)]).is_err());
        assert_eq!(buf.as_slice(), b"keep");
    }

    #[test]
    fn test_insert() {
        let heap = Heap::new();
        let cfg = Config::default();
        let mut buf = Buffer::with_content(8, b"[]");
        let args = [Value::Int(b'a' as i64), Value::str("bc")];
        let range = insert(&heap, &cfg, &mut buf, 1, "Bz", &args).unwrap();
        assert_eq!(range, (1, 5));
        assert_eq!(buf.as_slice(), b"[abc\0]");

        assert_eq!(
            insert(&heap, &cfg, &mut buf, 7, "B", &[Value::Int(0)]),
            Err(Error::OutOfBounds {
                offset: 7,
                len: 0,
                size: 6
            })
        );
    }

    #[test]
    fn test_objects_use_fresh_refs() {
        let mut heap = Heap::new();
        let shared = heap.alloc(Table::from_array([Value::Int(1)]));
        let cfg = Config::default();
        let packed = pack(&heap, &cfg, "oo", &[shared.into(), shared.into()]).unwrap();
        // Both fields carry the full table rather than a back-reference.
        let half = packed.len() / 2;
        assert_eq!(packed[..half], packed[half..]);

        let mut decoded = Heap::new();
        let (values, _) = read(&mut decoded, &cfg, &packed, 0, "oo").unwrap();
        assert_ne!(values[0], values[1]);
        assert_eq!(decoded.len(), 2);
    }
}
