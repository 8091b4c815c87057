//! [`Value`]: the self-describing tagged variant every parsed field holds.
//!
//! A `Value` needs no accompanying type information to consume: once the
//! wire parser or a schema decoder has produced one, the variant itself
//! says what it is.

use indexmap::IndexMap;

/// An insertion-ordered string-keyed map, used wherever field order is
/// significant (wire order, schema declaration order).
pub type OrderedMap = IndexMap<String, Value>;

/// A self-describing decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An explicit null.
    Null,
    /// A boolean (Thrift compact protocol encodes these as distinct
    /// true/false tags rather than a tag plus a payload byte).
    Bool(bool),
    /// A signed 8-bit integer.
    I8(i8),
    /// A signed 16-bit integer.
    I16(i16),
    /// A signed 32-bit integer.
    I32(i32),
    /// A signed 64-bit integer.
    I64(i64),
    /// An unsigned 8-bit integer.
    U8(u8),
    /// An unsigned 16-bit integer.
    U16(u16),
    /// A 32-bit float.
    F32(f32),
    /// A 64-bit float.
    F64(f64),
    /// A UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An ordered sequence of values.
    Seq(Vec<Value>),
    /// An ordered, string-keyed mapping of values.
    Map(OrderedMap),
    /// A timestamp, stored as epoch nanoseconds or millis as encoded on the
    /// wire (the wire format does not distinguish the two at this layer).
    Timestamp(i64),
    /// A 16-byte UUID, rendered in canonical `8-4-4-4-12` form when
    /// displayed but stored as raw bytes.
    Uuid([u8; 16]),
}

impl Value {
    /// Returns the value as a string slice, if it holds a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as an ordered map, if it holds one.
    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the value as a sequence, if it holds one.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value coerced to `i64`, if it holds any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::U8(v) => Some(*v as i64),
            Value::U16(v) => Some(*v as i64),
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Renders the UUID bytes as a canonical `8-4-4-4-12` hyphenated
    /// lowercase-hex string. Not implemented as `Display` for the whole
    /// enum, since most variants render structurally (via `serde_json`)
    /// rather than textually.
    pub fn uuid_string(bytes: &[u8; 16]) -> String {
        uuid::Uuid::from_bytes(*bytes).to_string()
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I8(v) => serializer.serialize_i8(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U8(v) => serializer.serialize_u8(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::F32(v) => serializer.serialize_f32(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_str(&hex_encode(v)),
            Value::Seq(v) => v.serialize(serializer),
            Value::Map(v) => v.serialize(serializer),
            Value::Timestamp(v) => serializer.serialize_i64(*v),
            Value::Uuid(v) => serializer.serialize_str(&Value::uuid_string(v)),
        }
    }
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
