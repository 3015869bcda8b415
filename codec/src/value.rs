//! Dynamically typed values.
//!
//! A [Value] is a closed sum of the kinds the wire format can carry. Tables are not stored
//! inline: a [Value::Table] holds a [TableId] into a [crate::Heap], which gives every table an
//! identity so that shared and cyclic graphs can be expressed (and detected while encoding).
//!
//! Numbers form a single logical kind. `Int(3)` and `Float(3.0)` compare equal, and an integral
//! float is written to the wire as an integer.

use crate::heap::TableId;
use bytes::Bytes;
use std::fmt;

/// A dynamically typed value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Bytes),
    Table(TableId),
}

impl Value {
    /// Returns a string value that copies `s`.
    pub fn str(s: impl AsRef<[u8]>) -> Self {
        Value::Str(Bytes::copy_from_slice(s.as_ref()))
    }

    /// Returns the name of the value's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer if it is a number with an integral value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => integral(*f),
            _ => None,
        }
    }

    /// Returns the value as a float if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as UTF-8 text if it is a string holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|s| std::str::from_utf8(s).ok())
    }

    pub fn as_table(&self) -> Option<TableId> {
        match self {
            Value::Table(id) => Some(*id),
            _ => None,
        }
    }
}

/// Returns `f` as an `i64` if it has no fractional part and lies within the `i64` range.
pub(crate) fn integral(f: f64) -> Option<i64> {
    // 2^63 is exactly representable, i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.floor() == f && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                integral(*b) == Some(*a)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            Value::Table(id) => write!(f, "{id}"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($type:ty),*) => {
        $(
            impl From<$type> for Value {
                fn from(n: $type) -> Self {
                    Value::Int(n.into())
                }
            }
        )*
    };
}
impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Value {
    fn from(s: Vec<u8>) -> Self {
        Value::Str(Bytes::from(s))
    }
}

impl From<Bytes> for Value {
    fn from(s: Bytes) -> Self {
        Value::Str(s)
    }
}

impl From<TableId> for Value {
    fn from(id: TableId) -> Self {
        Value::Table(id)
    }
}

/// The hashable projection of a [Value], used as a table key.
///
/// `Nil` and NaN cannot be keys. Integral floats are normalized to [Key::Int] so that `t[1]` and
/// `t[1.0]` address the same slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    /// The bit pattern of a non-integral, non-NaN float.
    Float(u64),
    Str(Bytes),
    Table(TableId),
}

impl Key {
    /// Returns the key for `value`, or `None` if `value` cannot index a table.
    pub fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Nil => None,
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(n) => Some(Key::Int(*n)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(match integral(*f) {
                Some(n) => Key::Int(n),
                None => Key::Float(f.to_bits()),
            }),
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Table(id) => Some(Key::Table(*id)),
        }
    }

    /// Returns the value this key was built from.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(n) => Value::Int(*n),
            Key::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Table(id) => Value::Table(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0, Some(0); "zero")]
    #[test_case(-0.0, Some(0); "negative zero")]
    #[test_case(3.0, Some(3); "integral")]
    #[test_case(-2.0, Some(-2); "negative integral")]
    #[test_case(1.5, None; "fractional")]
    #[test_case(f64::INFINITY, None; "infinity")]
    #[test_case(f64::NAN, None; "nan")]
    #[test_case(1e300, None; "beyond i64")]
    #[test_case(-9_223_372_036_854_775_808.0, Some(i64::MIN); "i64 min")]
    fn test_integral(f: f64, expected: Option<i64>) {
        assert_eq!(integral(f), expected);
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Float(3.0), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Int(0), Value::Bool(false));
        assert_ne!(Value::Nil, Value::Bool(false));
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(Key::new(&Value::Float(2.0)), Some(Key::Int(2)));
        assert_eq!(Key::new(&Value::Float(-0.0)), Some(Key::Int(0)));
        assert_eq!(Key::new(&Value::Nil), None);
        assert_eq!(Key::new(&Value::Float(f64::NAN)), None);
        let key = Key::new(&Value::Float(0.25)).unwrap();
        assert_eq!(key.to_value(), Value::Float(0.25));
        assert_eq!(Key::new(&"a".into()), Some(Key::Str(Bytes::from_static(b"a"))));
    }

    #[test]
    fn test_accessors() {
        let v = Value::from("hello");
        assert_eq!(v.kind(), "string");
        assert_eq!(v.as_str(), Some("hello"));
        assert_eq!(Value::Float(4.0).as_int(), Some(4));
        assert_eq!(Value::Int(4).as_f64(), Some(4.0));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::from(()).is_nil());
        assert_eq!(Value::Int(7).to_string(), "7");
    }
}
