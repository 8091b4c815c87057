//! [`decode`]: the sequential, schema-driven decoder for Chronicle's
//! `BINARY_LIGHT` encoding.
//!
//! Fields are read in declaration order from a flat payload slice. There
//! is no framing inside the payload itself — the schema alone says how
//! many bytes each field takes, and the decoder degrades gracefully
//! rather than failing outright when the payload runs short, since
//! Chronicle writers are sometimes observed emitting narrower-than-
//! declared integers.

use crate::error::decode_error_sentinel;
use crate::schema::{FieldDef, LogicalType, MessageDef, Schema};
use crate::stop_bit;
use crate::value::{hex_encode, OrderedMap, Value};

const MIN_SCAN: usize = 8;
const MAX_PREVIEW: usize = 32;

/// Decodes `data` against `schema`'s `binary` message `message_name` (or
/// its default). Never fails: a missing message definition, a short
/// payload, or an unknown-shaped field all degrade to sentinel values
/// inside the returned map rather than propagating an error.
pub fn decode(schema: &Schema, data: &[u8], message_name: Option<&str>) -> OrderedMap {
    let Some(msg_def) = schema.get_message(message_name) else {
        let mut result = OrderedMap::new();
        result.insert(
            "_error".to_string(),
            Value::String("No matching message definition".to_string()),
        );
        result.insert("_raw_hex".to_string(), Value::String(hex_encode(data)));
        return result;
    };

    decode_message(msg_def, data)
}

fn decode_message(msg_def: &MessageDef, data: &[u8]) -> OrderedMap {
    let mut result = OrderedMap::new();
    let mut pos = 0usize;

    for field_def in &msg_def.fields {
        if pos >= data.len() {
            if field_def.optional {
                continue;
            }
            result.insert(field_def.name.clone(), Value::Null);
            continue;
        }

        match decode_field(data, pos, field_def) {
            Ok((value, consumed)) => {
                result.insert(field_def.name.clone(), value);
                pos += consumed;
            }
            Err(reason) => {
                result.insert(
                    field_def.name.clone(),
                    Value::String(decode_error_sentinel(reason)),
                );
                break;
            }
        }
    }

    if pos < data.len() {
        result.insert(
            "_remaining_bytes".to_string(),
            Value::I64((data.len() - pos) as i64),
        );
        result.insert(
            "_remaining_hex".to_string(),
            Value::String(hex_encode(&data[pos..])),
        );
    }

    result
}

fn decode_field(data: &[u8], pos: usize, field_def: &FieldDef) -> Result<(Value, usize), String> {
    use LogicalType::*;

    match field_def.logical_type {
        Int8 | Uint8 | Bool | Int16 | Uint16 | Int32 | Uint32 | Float32 | Int64 | Uint64
        | Float64 => decode_fixed(data, pos, field_def.logical_type),
        String => decode_string(data, pos).map(|(s, n)| (Value::String(s), n)),
        Bytes => decode_bytes_as_hex(data, pos).map(|(s, n)| (Value::String(s), n)),
        StopBit => {
            let (value, consumed) =
                stop_bit::read_unsigned(data, pos).map_err(|e| e.to_string())?;
            Ok((Value::I64(value as i64), consumed))
        }
        Padding | Skip => {
            let size = if field_def.size_hint == 0 {
                1
            } else {
                field_def.size_hint as usize
            };
            Ok((Value::Null, size))
        }
        Object => Ok(decode_object(data, pos, field_def.size_hint as usize)),
    }
}

fn decode_fixed(data: &[u8], pos: usize, ty: LogicalType) -> Result<(Value, usize), String> {
    use LogicalType::*;

    let full_size = fixed_size(ty);
    if pos + full_size <= data.len() {
        return Ok((read_fixed(data, pos, ty), full_size));
    }

    let remaining = data.len() - pos;
    match ty {
        Int32 | Uint32 if remaining >= 2 => {
            let bytes = [data[pos], data[pos + 1]];
            let value = if ty == Int32 {
                Value::I32(i16::from_le_bytes(bytes) as i32)
            } else {
                Value::I32(u16::from_le_bytes(bytes) as i32)
            };
            Ok((value, 2))
        }
        Int32 | Uint32 if remaining >= 1 => {
            let value = if ty == Int32 {
                Value::I32(data[pos] as i8 as i32)
            } else {
                Value::I32(data[pos] as i32)
            };
            Ok((value, 1))
        }
        Int16 | Uint16 if remaining >= 1 => {
            let value = if ty == Int16 {
                Value::I16(data[pos] as i8 as i16)
            } else {
                Value::I16(data[pos] as i16)
            };
            Ok((value, 1))
        }
        _ => Err(format!("not enough data for {ty:?}")),
    }
}

fn fixed_size(ty: LogicalType) -> usize {
    use LogicalType::*;
    match ty {
        Int8 | Uint8 | Bool => 1,
        Int16 | Uint16 => 2,
        Int32 | Uint32 | Float32 => 4,
        Int64 | Uint64 | Float64 => 8,
        _ => 0,
    }
}

fn read_fixed(data: &[u8], pos: usize, ty: LogicalType) -> Value {
    use LogicalType::*;
    match ty {
        Int8 => Value::I8(data[pos] as i8),
        Uint8 => Value::U8(data[pos]),
        Bool => Value::Bool(data[pos] != 0),
        Int16 => Value::I16(i16::from_le_bytes([data[pos], data[pos + 1]])),
        Uint16 => Value::U16(u16::from_le_bytes([data[pos], data[pos + 1]])),
        Int32 => Value::I32(i32::from_le_bytes(data[pos..pos + 4].try_into().unwrap())),
        Uint32 => {
            Value::I64(u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()) as i64)
        }
        Float32 => Value::F32(f32::from_le_bytes(data[pos..pos + 4].try_into().unwrap())),
        Int64 => Value::I64(i64::from_le_bytes(data[pos..pos + 8].try_into().unwrap())),
        Uint64 => {
            Value::I64(u64::from_le_bytes(data[pos..pos + 8].try_into().unwrap()) as i64)
        }
        Float64 => Value::F64(f64::from_le_bytes(data[pos..pos + 8].try_into().unwrap())),
        _ => unreachable!("read_fixed called with non-fixed type"),
    }
}

/// Reads a length prefix: a stop-bit integer if the first byte's high
/// bit is set, otherwise a plain single-byte length.
fn read_length(data: &[u8], pos: usize) -> (usize, usize) {
    let Some(&first) = data.get(pos) else {
        return (0, 0);
    };
    if first & 0x80 != 0 {
        match stop_bit::read_unsigned(data, pos) {
            Ok((value, consumed)) => (value as usize, consumed),
            Err(_) => (0, 0),
        }
    } else {
        (first as usize, 1)
    }
}

fn decode_string(data: &[u8], pos: usize) -> Result<(String, usize), String> {
    let (length, len_bytes) = read_length(data, pos);
    let start = pos + len_bytes;
    let end = start + length;
    if end > data.len() {
        return Err("string extends beyond data".to_string());
    }
    Ok((
        String::from_utf8_lossy(&data[start..end]).into_owned(),
        len_bytes + length,
    ))
}

fn decode_bytes_as_hex(data: &[u8], pos: usize) -> Result<(String, usize), String> {
    let (length, len_bytes) = read_length(data, pos);
    let start = pos + len_bytes;
    let end = start + length;
    if end > data.len() {
        return Err("bytes extend beyond data".to_string());
    }
    Ok((hex_encode(&data[start..end]), len_bytes + length))
}

fn decode_object(data: &[u8], pos: usize, size_hint: usize) -> (Value, usize) {
    if size_hint > 0 {
        return (Value::String(format!("<nested:{size_hint}bytes>")), size_hint);
    }

    let detected = detect_nested_object_size(data, pos);
    if detected > 0 {
        return (Value::String(format!("<nested:{detected}bytes>")), detected);
    }

    let preview_len = MAX_PREVIEW.min(data.len() - pos);
    let preview = &data[pos..pos + preview_len];
    (
        Value::String(format!("<nested:0x{}>", hex_encode(preview))),
        preview_len,
    )
}

/// Scans forward for the position where at least two consecutive
/// plausible length-prefixed printable-ASCII strings begin, treating
/// that offset as the nested object's size. The scan window and
/// plausibility thresholds reproduce the source decoder's exactly,
/// including its off-by-construction quirks, for bug compatibility.
fn detect_nested_object_size(data: &[u8], pos: usize) -> usize {
    if data.len() <= pos + 20 {
        return 0;
    }
    let max_scan = 256.min(data.len() - pos - 20);

    for offset in MIN_SCAN..max_scan {
        let test_pos = pos + offset;
        if data.len() < 10 || test_pos >= data.len() - 10 {
            break;
        }

        let mut consecutive_valid = 0;
        let mut check_pos = test_pos;

        for _ in 0..3 {
            if check_pos >= data.len() - 1 {
                break;
            }
            let length_byte = data[check_pos] as usize;
            if !(2..=100).contains(&length_byte) {
                break;
            }
            let str_start = check_pos + 1;
            let str_end = str_start + length_byte;
            if str_end > data.len() {
                break;
            }
            let all_printable = data[str_start..str_end]
                .iter()
                .all(|&b| (32..127).contains(&b));
            if !all_printable {
                break;
            }
            consecutive_valid += 1;
            check_pos = str_end;
        }

        if consecutive_valid >= 2 {
            return offset;
        }
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Encoding;

    fn schema_with(fields: Vec<FieldDef>) -> Schema {
        let mut schema = Schema::default();
        schema.encoding = Encoding::Binary;
        schema.messages.insert(
            "Order".to_string(),
            MessageDef {
                name: "Order".to_string(),
                fields,
            },
        );
        schema.default_message = Some("Order".to_string());
        schema
    }

    #[test]
    fn s5_decodes_mixed_fixed_and_string_fields() {
        let schema = schema_with(vec![
            FieldDef::new("orderId", LogicalType::Int64),
            FieldDef::new("price", LogicalType::Float64),
            FieldDef::new("sym", LogicalType::String),
        ]);
        let mut data = Vec::new();
        data.extend_from_slice(&1i64.to_le_bytes());
        data.extend_from_slice(&1.14f64.to_le_bytes());
        data.push(3);
        data.extend_from_slice(b"ABC");

        let result = decode(&schema, &data, None);
        assert_eq!(result.get("orderId"), Some(&Value::I64(1)));
        assert_eq!(result.get("price"), Some(&Value::F64(1.14)));
        assert_eq!(result.get("sym"), Some(&Value::String("ABC".to_string())));
    }

    #[test]
    fn degrades_int32_to_int16_when_short() {
        let schema = schema_with(vec![FieldDef::new("x", LogicalType::Int32)]);
        let data = [0x2A, 0x00]; // 2 bytes, not 4
        let result = decode(&schema, &data, None);
        assert_eq!(result.get("x"), Some(&Value::I32(42)));
        assert!(!result.contains_key("_remaining_bytes"));
    }

    #[test]
    fn missing_field_at_eof_is_null_and_continues() {
        let schema = schema_with(vec![
            FieldDef::new("a", LogicalType::Int8),
            FieldDef::new("b", LogicalType::Int8),
        ]);
        let data = [7u8];
        let result = decode(&schema, &data, None);
        assert_eq!(result.get("a"), Some(&Value::I8(7)));
        assert_eq!(result.get("b"), Some(&Value::Null));
    }

    #[test]
    fn leftover_bytes_are_reported() {
        let schema = schema_with(vec![FieldDef::new("a", LogicalType::Int8)]);
        let data = [1u8, 2, 3];
        let result = decode(&schema, &data, None);
        assert_eq!(result.get("_remaining_bytes"), Some(&Value::I64(2)));
        assert_eq!(
            result.get("_remaining_hex"),
            Some(&Value::String("0203".to_string()))
        );
    }

    #[test]
    fn no_matching_message_reports_error() {
        let schema = schema_with(vec![]);
        let result = decode(&schema, &[1, 2, 3], Some("Nope"));
        assert_eq!(
            result.get("_error"),
            Some(&Value::String("No matching message definition".to_string()))
        );
    }
}
