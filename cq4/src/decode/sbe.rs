//! [`decode`]: a decoder for Simple Binary Encoding (SBE) messages — a
//! fixed-size format where every field sits at a byte offset computed
//! from the fields before it (or an explicit offset override).
//!
//! Reference: <https://github.com/real-logic/simple-binary-encoding>

use crate::schema::{FieldDef, LogicalType, MessageDef};
use crate::value::{OrderedMap, Value};

/// The primitive types SBE schemas distinguish. `Char` with a `length`
/// greater than 1 is a fixed-size string rather than a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    Char,
}

impl PrimitiveType {
    fn size(self) -> u32 {
        use PrimitiveType::*;
        match self {
            Int8 | Uint8 | Char => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 | Float => 4,
            Int64 | Uint64 | Double => 8,
        }
    }
}

/// A single field within an SBE message body.
#[derive(Debug, Clone)]
pub struct SbeField {
    pub name: String,
    pub primitive_type: PrimitiveType,
    /// Byte offset from the start of the body. Filled in by
    /// [`SbeDecoder::new`] when left `None`.
    pub offset: Option<u32>,
    /// Array length for `Char` fields; `1` for scalars.
    pub length: u32,
    pub optional: bool,
}

impl SbeField {
    pub fn new(name: impl Into<String>, primitive_type: PrimitiveType) -> Self {
        SbeField {
            name: name.into(),
            primitive_type,
            offset: None,
            length: 1,
            optional: false,
        }
    }

    fn byte_size(&self) -> u32 {
        self.primitive_type.size() * self.length
    }

    fn null_value(&self) -> Option<Value> {
        use PrimitiveType::*;
        Some(match self.primitive_type {
            Int8 => Value::I8(i8::MIN),
            Uint8 => Value::U8(u8::MAX),
            Int16 => Value::I16(i16::MIN),
            Uint16 => Value::U16(u16::MAX),
            Int32 => Value::I32(i32::MIN),
            Uint32 => Value::I64(u32::MAX as i64),
            Int64 => Value::I64(i64::MIN),
            Uint64 => Value::I64(-1), // u64::MAX has no lossless i64 null sentinel
            Float | Double => return None, // NaN is compared structurally below
            Char => return None,
        })
    }
}

/// Decodes a fixed-layout SBE message body against a field list.
pub struct SbeDecoder {
    fields: Vec<SbeField>,
    #[allow(dead_code)]
    block_length: u32,
}

impl SbeDecoder {
    /// Builds a decoder, assigning sequential offsets to any field that
    /// doesn't declare one explicitly. `block_length` defaults to the
    /// offset immediately past the last field.
    pub fn new(mut fields: Vec<SbeField>, block_length: Option<u32>) -> Self {
        let mut offset = 0u32;
        for field in &mut fields {
            let field_offset = field.offset.unwrap_or(offset);
            field.offset = Some(field_offset);
            offset = field_offset + field.byte_size();
        }
        let block_length = block_length.unwrap_or(offset);
        SbeDecoder {
            fields,
            block_length,
        }
    }

    /// Builds field layouts from a schema message's declared fields.
    /// Fields whose logical type has no SBE analogue (`StopBit`,
    /// `Padding`, `Skip`, `Object`) are skipped.
    pub fn from_message(msg_def: &MessageDef) -> Self {
        let fields = msg_def
            .fields
            .iter()
            .filter_map(sbe_field_from_def)
            .collect();
        SbeDecoder::new(fields, None)
    }

    /// Decodes the message body starting at `offset` within `data`.
    pub fn decode(&self, data: &[u8], offset: usize) -> OrderedMap {
        let mut result = OrderedMap::new();

        for field in &self.fields {
            let pos = offset + field.offset.unwrap_or(0) as usize;
            let value = decode_field(data, pos, field);

            let resolved = match (&value, field.optional) {
                (Some(v), true) if is_null_sentinel(v, field) => Value::Null,
                (Some(v), _) => v.clone(),
                (None, _) => Value::Null,
            };
            result.insert(field.name.clone(), resolved);
        }

        result
    }
}

fn is_null_sentinel(value: &Value, field: &SbeField) -> bool {
    match value {
        Value::F32(v) => v.is_nan(),
        Value::F64(v) => v.is_nan(),
        _ => field.null_value().as_ref() == Some(value),
    }
}

fn decode_field(data: &[u8], pos: usize, field: &SbeField) -> Option<Value> {
    use PrimitiveType::*;

    if field.primitive_type == Char && field.length > 1 {
        return Some(decode_char_array(data, pos, field.length as usize));
    }

    let size = field.primitive_type.size() as usize;
    let bytes = data.get(pos..pos + size)?;

    Some(match field.primitive_type {
        Int8 => Value::I8(bytes[0] as i8),
        Uint8 => Value::U8(bytes[0]),
        Char => Value::String((bytes[0] as char).to_string()),
        Int16 => Value::I16(i16::from_le_bytes(bytes.try_into().unwrap())),
        Uint16 => Value::U16(u16::from_le_bytes(bytes.try_into().unwrap())),
        Int32 => Value::I32(i32::from_le_bytes(bytes.try_into().unwrap())),
        Uint32 => Value::I64(u32::from_le_bytes(bytes.try_into().unwrap()) as i64),
        Float => Value::F32(f32::from_le_bytes(bytes.try_into().unwrap())),
        Int64 => Value::I64(i64::from_le_bytes(bytes.try_into().unwrap())),
        Uint64 => Value::I64(u64::from_le_bytes(bytes.try_into().unwrap()) as i64),
        Double => Value::F64(f64::from_le_bytes(bytes.try_into().unwrap())),
    })
}

fn decode_char_array(data: &[u8], pos: usize, length: usize) -> Value {
    let Some(raw) = data.get(pos..pos + length) else {
        return Value::String(String::new());
    };
    let trimmed = match raw.iter().position(|&b| b == 0) {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    match std::str::from_utf8(trimmed) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::String(trimmed.iter().map(|&b| b as char).collect()),
    }
}

fn sbe_field_from_def(field_def: &FieldDef) -> Option<SbeField> {
    let primitive_type = match field_def.logical_type {
        LogicalType::Int8 => PrimitiveType::Int8,
        LogicalType::Uint8 => PrimitiveType::Uint8,
        LogicalType::Int16 => PrimitiveType::Int16,
        LogicalType::Uint16 => PrimitiveType::Uint16,
        LogicalType::Int32 => PrimitiveType::Int32,
        LogicalType::Uint32 => PrimitiveType::Uint32,
        LogicalType::Int64 => PrimitiveType::Int64,
        LogicalType::Uint64 => PrimitiveType::Uint64,
        LogicalType::Float32 => PrimitiveType::Float,
        LogicalType::Float64 => PrimitiveType::Double,
        LogicalType::Bool => PrimitiveType::Uint8,
        LogicalType::String | LogicalType::Bytes => PrimitiveType::Char,
        LogicalType::StopBit | LogicalType::Padding | LogicalType::Skip | LogicalType::Object => {
            return None
        }
    };

    let mut field = SbeField::new(field_def.name.clone(), primitive_type);
    field.optional = field_def.optional;
    if matches!(
        field_def.logical_type,
        LogicalType::String | LogicalType::Bytes
    ) {
        field.length = if field_def.size_hint > 0 {
            field_def.size_hint
        } else {
            32
        };
    }
    Some(field)
}

/// Decodes a message framed by the standard 8-byte SBE header
/// (`blockLength`, `templateId`, `schemaId`, `version`, all little-endian
/// `u16`) ahead of the body. Header mismatches against expected IDs are
/// reported as a non-fatal `_warning` rather than failing the decode.
pub struct SbeMessageDecoder {
    body: SbeDecoder,
    header_size: usize,
    schema_id: Option<u16>,
    template_id: Option<u16>,
}

impl SbeMessageDecoder {
    pub fn new(
        fields: Vec<SbeField>,
        header_size: usize,
        schema_id: Option<u16>,
        template_id: Option<u16>,
    ) -> Self {
        SbeMessageDecoder {
            body: SbeDecoder::new(fields, None),
            header_size,
            schema_id,
            template_id,
        }
    }

    pub fn decode(&self, data: &[u8]) -> OrderedMap {
        let mut result = OrderedMap::new();

        if data.len() < self.header_size {
            result.insert(
                "_error".to_string(),
                Value::String("Data too short for header".to_string()),
            );
            return result;
        }

        if self.header_size >= 8 {
            let block_length = u16::from_le_bytes([data[0], data[1]]);
            let template_id = u16::from_le_bytes([data[2], data[3]]);
            let schema_id = u16::from_le_bytes([data[4], data[5]]);
            let version = u16::from_le_bytes([data[6], data[7]]);

            result.insert("_blockLength".to_string(), Value::U16(block_length));
            result.insert("_templateId".to_string(), Value::U16(template_id));
            result.insert("_schemaId".to_string(), Value::U16(schema_id));
            result.insert("_version".to_string(), Value::U16(version));

            if let Some(expected) = self.schema_id {
                if schema_id != expected {
                    result.insert(
                        "_warning".to_string(),
                        Value::String(format!(
                            "Schema ID mismatch: expected {expected}, got {schema_id}"
                        )),
                    );
                }
            }
            if let Some(expected) = self.template_id {
                if template_id != expected {
                    result.insert(
                        "_warning".to_string(),
                        Value::String(format!(
                            "Template ID mismatch: expected {expected}, got {template_id}"
                        )),
                    );
                }
            }
        }

        let body = self.body.decode(data, self.header_size);
        for (name, value) in body {
            result.insert(name, value);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sequential_fixed_fields() {
        let fields = vec![
            SbeField::new("id", PrimitiveType::Int32),
            SbeField::new("qty", PrimitiveType::Uint16),
        ];
        let decoder = SbeDecoder::new(fields, None);
        let mut data = Vec::new();
        data.extend_from_slice(&42i32.to_le_bytes());
        data.extend_from_slice(&7u16.to_le_bytes());

        let result = decoder.decode(&data, 0);
        assert_eq!(result.get("id"), Some(&Value::I32(42)));
        assert_eq!(result.get("qty"), Some(&Value::U16(7)));
    }

    #[test]
    fn optional_field_resolves_null_sentinel_to_null() {
        let mut field = SbeField::new("price", PrimitiveType::Int32);
        field.optional = true;
        let decoder = SbeDecoder::new(vec![field], None);
        let data = i32::MIN.to_le_bytes();

        let result = decoder.decode(&data, 0);
        assert_eq!(result.get("price"), Some(&Value::Null));
    }

    #[test]
    fn char_array_trims_trailing_nul() {
        let mut field = SbeField::new("symbol", PrimitiveType::Char);
        field.length = 8;
        let decoder = SbeDecoder::new(vec![field], None);
        let mut data = b"EUR".to_vec();
        data.resize(8, 0);

        let result = decoder.decode(&data, 0);
        assert_eq!(result.get("symbol"), Some(&Value::String("EUR".to_string())));
    }

    #[test]
    fn message_decoder_parses_header_and_flags_mismatch() {
        let fields = vec![SbeField::new("x", PrimitiveType::Uint8)];
        let decoder = SbeMessageDecoder::new(fields, 8, Some(99), None);
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_le_bytes()); // blockLength
        data.extend_from_slice(&1u16.to_le_bytes()); // templateId
        data.extend_from_slice(&5u16.to_le_bytes()); // schemaId (mismatch)
        data.extend_from_slice(&0u16.to_le_bytes()); // version
        data.push(7);

        let result = decoder.decode(&data);
        assert_eq!(result.get("x"), Some(&Value::U8(7)));
        assert!(result.get("_warning").is_some());
    }
}
