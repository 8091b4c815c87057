//! [`decode`]: a decoder for Apache Thrift's `TCompactProtocol` wire
//! format, driven by a schema's field-ID-to-name mapping.
//!
//! Field tags interleave a 4-bit delta (against the previous field ID)
//! with a 4-bit type code; an explicit zigzag-varint field ID follows
//! only when the delta doesn't fit in 4 bits. Structs, lists, sets, and
//! maps all recurse through the same value decoder.

use std::collections::HashMap;

use crate::error::{decode_error_sentinel, Error, Result};
use crate::schema::MessageDef;
use crate::stop_bit;
use crate::value::{hex_encode, OrderedMap, Value};

const BOOLEAN_TRUE: u8 = 1;
const BOOLEAN_FALSE: u8 = 2;
const BYTE: u8 = 3;
const I16: u8 = 4;
const I32: u8 = 5;
const I64: u8 = 6;
const DOUBLE: u8 = 7;
const BINARY: u8 = 8;
const LIST: u8 = 9;
const SET: u8 = 10;
const MAP: u8 = 11;
const STRUCT: u8 = 12;

/// Resolves top-level Thrift field IDs to names, built from a schema
/// message's fields. A field without an explicit `thrift_id` is
/// numbered sequentially starting at 1, in declaration order.
pub struct ThriftDecoder {
    field_names: HashMap<u16, String>,
}

impl ThriftDecoder {
    pub fn from_message(msg_def: &MessageDef) -> Self {
        let mut field_names = HashMap::new();
        for (i, field_def) in msg_def.fields.iter().enumerate() {
            let id = field_def.thrift_id.unwrap_or((i + 1) as u16);
            field_names.insert(id, field_def.name.clone());
        }
        ThriftDecoder { field_names }
    }

    /// Decodes a top-level struct. Each field is decoded independently:
    /// a truncated or malformed field degrades to a
    /// `<decode_error: reason>` sentinel for that field name and stops
    /// further fields, matching the binary decoder's granularity.
    pub fn decode(&self, data: &[u8]) -> OrderedMap {
        let mut result = OrderedMap::new();
        let mut pos = 0usize;
        let mut last_field_id: i32 = 0;

        while pos < data.len() {
            if data[pos] == 0 {
                break;
            }

            let type_and_delta = data[pos];
            let delta = (type_and_delta >> 4) & 0x0F;
            let field_type = type_and_delta & 0x0F;
            let mut cursor = pos + 1;

            let field_id = if delta == 0 {
                match stop_bit::read_signed(data, cursor) {
                    Ok((id, consumed)) => {
                        cursor += consumed;
                        id as i32
                    }
                    Err(e) => {
                        result.insert(
                            format!("field_{last_field_id}"),
                            Value::String(decode_error_sentinel(e)),
                        );
                        break;
                    }
                }
            } else {
                last_field_id + delta as i32
            };
            last_field_id = field_id;

            match decode_value(data, cursor, field_type) {
                Ok((value, consumed)) => {
                    let name = self
                        .field_names
                        .get(&(field_id as u16))
                        .cloned()
                        .unwrap_or_else(|| format!("field_{field_id}"));
                    result.insert(name, value);
                    pos = cursor + consumed;
                }
                Err(e) => {
                    let name = self
                        .field_names
                        .get(&(field_id as u16))
                        .cloned()
                        .unwrap_or_else(|| format!("field_{field_id}"));
                    result.insert(name, Value::String(decode_error_sentinel(e)));
                    break;
                }
            }
        }

        result
    }
}

fn decode_value(data: &[u8], pos: usize, field_type: u8) -> Result<(Value, usize)> {
    match field_type {
        BOOLEAN_TRUE => Ok((Value::Bool(true), 0)),
        BOOLEAN_FALSE => Ok((Value::Bool(false), 0)),
        BYTE => {
            let byte = *data.get(pos).ok_or(Error::truncated("thrift byte"))?;
            Ok((Value::I8(byte as i8), 1))
        }
        I16 | I32 | I64 => {
            let (value, consumed) = stop_bit::read_signed(data, pos)?;
            Ok((Value::I64(value), consumed))
        }
        DOUBLE => {
            let bytes: [u8; 8] = data
                .get(pos..pos + 8)
                .ok_or(Error::truncated("thrift double"))?
                .try_into()
                .unwrap();
            Ok((Value::F64(f64::from_le_bytes(bytes)), 8))
        }
        BINARY => decode_binary(data, pos),
        STRUCT => decode_struct(data, pos),
        LIST | SET => decode_list(data, pos),
        MAP => decode_map(data, pos),
        _ => Ok((Value::Null, 0)),
    }
}

fn decode_binary(data: &[u8], pos: usize) -> Result<(Value, usize)> {
    let (length, len_bytes) = stop_bit::read_unsigned(data, pos)?;
    let length = length as usize;
    let start = pos + len_bytes;
    let end = start + length;
    let bytes = data
        .get(start..end)
        .ok_or(Error::truncated("thrift binary"))?;
    let value = match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::String(hex_encode(bytes)),
    };
    Ok((value, len_bytes + length))
}

fn decode_struct(data: &[u8], pos: usize) -> Result<(Value, usize)> {
    let mut result = OrderedMap::new();
    let mut consumed = 0usize;
    let mut last_field_id: i32 = 0;

    while pos + consumed < data.len() {
        if data[pos + consumed] == 0 {
            consumed += 1;
            break;
        }

        let type_and_delta = data[pos + consumed];
        consumed += 1;
        let delta = (type_and_delta >> 4) & 0x0F;
        let nested_type = type_and_delta & 0x0F;

        let field_id = if delta == 0 {
            let (id, vb) = stop_bit::read_signed(data, pos + consumed)?;
            consumed += vb;
            id as i32
        } else {
            last_field_id + delta as i32
        };
        last_field_id = field_id;

        let (value, vb) = decode_value(data, pos + consumed, nested_type)?;
        consumed += vb;
        result.insert(format!("field_{field_id}"), value);
    }

    Ok((Value::Map(result), consumed))
}

fn decode_list(data: &[u8], pos: usize) -> Result<(Value, usize)> {
    let size_and_type = *data.get(pos).ok_or(Error::truncated("thrift list header"))?;
    let mut consumed = 1usize;
    let elem_type = size_and_type & 0x0F;
    let mut size = ((size_and_type >> 4) & 0x0F) as u64;

    if size == 15 {
        let (full_size, vb) = stop_bit::read_unsigned(data, pos + consumed)?;
        size = full_size;
        consumed += vb;
    }

    let mut items = Vec::with_capacity(size.min(4096) as usize);
    for _ in 0..size {
        let (value, vb) = decode_value(data, pos + consumed, elem_type)?;
        consumed += vb;
        items.push(value);
    }

    Ok((Value::Seq(items), consumed))
}

fn decode_map(data: &[u8], pos: usize) -> Result<(Value, usize)> {
    let (size, mut consumed) = stop_bit::read_unsigned(data, pos)?;

    if size == 0 {
        return Ok((Value::Map(OrderedMap::new()), consumed));
    }

    let kv_type = *data
        .get(pos + consumed)
        .ok_or(Error::truncated("thrift map kv type"))?;
    consumed += 1;
    let key_type = (kv_type >> 4) & 0x0F;
    let val_type = kv_type & 0x0F;

    let mut result = OrderedMap::new();
    for _ in 0..size {
        let (key, kb) = decode_value(data, pos + consumed, key_type)?;
        consumed += kb;
        let (value, vb) = decode_value(data, pos + consumed, val_type)?;
        consumed += vb;
        result.insert(value_to_key_string(&key), value);
    }

    Ok((Value::Map(result), consumed))
}

/// Thrift map keys can be any type; our map representation is
/// string-keyed, so non-string keys are rendered the way the source
/// decoder renders them with `str()`.
fn value_to_key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, LogicalType};

    fn message(fields: Vec<(&str, u16)>) -> MessageDef {
        MessageDef {
            name: "T".to_string(),
            fields: fields
                .into_iter()
                .map(|(name, id)| {
                    let mut f = FieldDef::new(name, LogicalType::Int32);
                    f.thrift_id = Some(id);
                    f
                })
                .collect(),
        }
    }

    #[test]
    fn decodes_short_form_delta_field() {
        // field id 1 (delta=1), type I32 (5), zigzag varint 2 -> decoded 1
        let data = [0x15, 0x02, 0x00];
        let msg = message(vec![("id", 1)]);
        let decoder = ThriftDecoder::from_message(&msg);
        let result = decoder.decode(&data);
        assert_eq!(result.get("id"), Some(&Value::I64(1)));
    }

    #[test]
    fn decodes_boolean_true_with_no_body() {
        // field id 1 (delta=1), type BOOLEAN_TRUE (1), then STOP
        let data = [0x11, 0x00];
        let msg = message(vec![("flag", 1)]);
        let decoder = ThriftDecoder::from_message(&msg);
        let result = decoder.decode(&data);
        assert_eq!(result.get("flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unknown_field_id_renders_generic_name() {
        let data = [0x15, 0x02, 0x00]; // field id 1, no mapping configured
        let msg = message(vec![]);
        let decoder = ThriftDecoder::from_message(&msg);
        let result = decoder.decode(&data);
        assert_eq!(result.get("field_1"), Some(&Value::I64(1)));
    }

    #[test]
    fn long_form_field_id_via_zigzag_varint() {
        // delta=0 -> long form; field id 5 follows as zigzag varint (10);
        // type BYTE (3); value 0x2A.
        let data = [0x03, 10, 0x2A, 0x00];
        let msg = message(vec![("x", 5)]);
        let decoder = ThriftDecoder::from_message(&msg);
        let result = decoder.decode(&data);
        assert_eq!(result.get("x"), Some(&Value::I8(0x2A)));
    }
}
