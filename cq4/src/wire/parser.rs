//! The self-describing tag-driven value parser.
//!
//! [`WireParser`] walks a byte slice one tag at a time, with no schema to
//! consult: the tag byte alone says what follows. This is the layer that
//! turns an excerpt's raw payload into [`Value`]s before any
//! schema-driven decoding happens.

use crate::error::{Error, Result};
use crate::stop_bit;
use crate::value::{OrderedMap, Value};
use crate::wire::tag;

/// A parsed top-level record: an optional type hint (from a leading type
/// prefix) plus its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// The type name carried by a leading `!types.X` prefix, if present.
    pub type_hint: Option<String>,
    /// The record's fields, in wire order.
    pub fields: OrderedMap,
}

/// A cursor over a byte slice that decodes the tag-driven wire format.
pub struct WireParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireParser<'a> {
    /// Wraps `data` for parsing from the start.
    pub fn new(data: &'a [u8]) -> Self {
        WireParser { data, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current absolute cursor position within `data`.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(Error::truncated("a byte"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::truncated("a byte string"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.data.len());
    }

    fn read_stop_bit_u(&mut self) -> Result<u64> {
        let (value, consumed) = stop_bit::read_unsigned(self.data, self.pos)?;
        self.pos += consumed;
        Ok(value)
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.read_bytes(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads `length` bytes as UTF-8, falling back to a Latin-1-style
    /// byte-for-codepoint decode for payloads that aren't valid UTF-8 —
    /// writers occasionally put raw bytes where a string is expected.
    fn read_string(&mut self, length: usize) -> Result<String> {
        let bytes = self.read_bytes(length)?;
        Ok(match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        })
    }

    fn read_type_prefix(&mut self) -> Result<String> {
        let length = self.read_stop_bit_u()? as usize;
        self.read_string(length)
    }

    /// Reads a field name, or `None` if the cursor is at EOF or sitting on
    /// a byte that isn't any recognized field-name tag (the caller treats
    /// that as end-of-object).
    fn read_field_name(&mut self) -> Result<Option<String>> {
        let Some(code) = self.peek_byte() else {
            return Ok(None);
        };

        if tag::is_compact_field_name(code) {
            self.read_byte()?;
            let length = tag::compact_field_name_length(code);
            return if length == 0 {
                Ok(Some(String::new()))
            } else {
                Ok(Some(self.read_string(length)?))
            };
        }

        match code {
            tag::FIELD_NAME_ANY
            | tag::FIELD_NAME_LITERAL
            | tag::FIELD_NUMBER
            | tag::EVENT_NAME => {
                self.read_byte()?;
                let length = self.read_stop_bit_u()? as usize;
                Ok(Some(self.read_string(length)?))
            }
            _ => Ok(None),
        }
    }

    /// Reads one self-describing value. Unrecognized tags degrade to the
    /// string `"<unknown:0xHH>"` rather than failing the whole record —
    /// only a genuine end-of-data is treated as a hard error.
    pub fn read_value(&mut self) -> Result<Value> {
        let Some(code) = self.peek_byte() else {
            return Ok(Value::Null);
        };

        if tag::is_compact_string(code) {
            self.read_byte()?;
            let length = tag::compact_string_length(code);
            return if length == 0 {
                Ok(Value::String(String::new()))
            } else {
                Ok(Value::String(self.read_string(length)?))
            };
        }

        self.read_byte()?;

        Ok(match code {
            tag::NULL => Value::Null,
            tag::INT8 => Value::I8(self.read_i8()?),
            tag::UINT8 => Value::U8(self.read_byte()?),
            tag::INT16 => Value::I16(self.read_i16()?),
            tag::UINT16 => Value::U16(self.read_u16()?),
            tag::INT32 => Value::I32(self.read_i32()?),
            tag::INT64 => Value::I64(self.read_i64()?),
            tag::FLOAT32 => Value::F32(self.read_f32()?),
            tag::FLOAT64 => Value::F64(self.read_f64()?),
            tag::STRING_ANY => {
                let length = self.read_stop_bit_u()? as usize;
                Value::String(self.read_string(length)?)
            }
            tag::BYTES_LENGTH32 => {
                let length = self.read_i32()?.max(0) as usize;
                Value::Bytes(self.read_bytes(length)?.to_vec())
            }
            tag::NESTED_BLOCK => {
                let length = self.read_stop_bit_u()? as usize;
                let nested = self.read_bytes(length)?;
                let mut nested_parser = WireParser::new(nested);
                Value::Map(nested_parser.read_object()?)
            }
            tag::TYPE_PREFIX => {
                let type_name = self.read_type_prefix()?;
                let mut value = self.read_value()?;
                if let Value::Map(ref mut fields) = value {
                    fields.insert("__type__".to_string(), Value::String(type_name));
                }
                value
            }
            tag::I64_ARRAY => {
                let count = self.read_i32()?.max(0) as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Value::I64(self.read_i64()?));
                }
                Value::Seq(items)
            }
            tag::U8_ARRAY => {
                let length = self.read_i32()?.max(0) as usize;
                Value::Seq(self.read_bytes(length)?.iter().map(|&b| Value::U8(b)).collect())
            }
            tag::I8_ARRAY => {
                let length = self.read_i32()?.max(0) as usize;
                let bytes = self.read_bytes(length)?;
                Value::Seq(bytes.iter().map(|&b| Value::I8(b as i8)).collect())
            }
            tag::TIMESTAMP | tag::DATE_TIME => Value::Timestamp(self.read_i64()?),
            tag::UUID => {
                let bytes = self.read_bytes(16)?;
                let mut arr = [0u8; 16];
                arr.copy_from_slice(bytes);
                Value::Uuid(arr)
            }
            tag::PADDING => Value::Null,
            tag::PADDING32 => {
                let length = self.read_i32()?.max(0) as usize;
                self.skip(length);
                Value::Null
            }
            tag::PADDING_END => Value::Null,
            tag::EVENT_NAME | tag::COMMENT => {
                let length = self.read_stop_bit_u()? as usize;
                Value::String(self.read_string(length)?)
            }
            other => Value::String(format!("<unknown:0x{other:02X}>")),
        })
    }

    /// Reads all fields of an object until padding-end or exhaustion.
    ///
    /// If no fields were parsed but bytes remain, salvages the raw
    /// payload into `_raw_hex`/`_raw_length` plus either `_strings` or a
    /// `_json` object with its top-level keys hoisted — see
    /// [`crate::wire::salvage`].
    pub fn read_object(&mut self) -> Result<OrderedMap> {
        let mut result = OrderedMap::new();

        while self.remaining() > 0 {
            match self.peek_byte() {
                None => break,
                Some(tag::PADDING) => {
                    self.read_byte()?;
                    continue;
                }
                Some(tag::PADDING32) => {
                    self.read_byte()?;
                    let length = self.read_i32()?.max(0) as usize;
                    self.skip(length);
                    continue;
                }
                Some(tag::PADDING_END) => {
                    self.read_byte()?;
                    break;
                }
                _ => {}
            }

            let Some(name) = self.read_field_name()? else {
                break;
            };
            let value = self.read_value()?;
            result.insert(name, value);
        }

        if result.is_empty() && !self.data.is_empty() {
            crate::wire::salvage::salvage(self.data, &mut result);
        }

        Ok(result)
    }

    /// Reads a whole record: an optional leading type prefix, then its
    /// object body. Returns `None` only when there is nothing left to
    /// read at all.
    pub fn read_message(&mut self) -> Result<Option<ParsedMessage>> {
        if self.remaining() == 0 {
            return Ok(None);
        }

        let type_hint = if self.peek_byte() == Some(tag::TYPE_PREFIX) {
            self.read_byte()?;
            Some(self.read_type_prefix()?)
        } else {
            None
        };

        let fields = self.read_object()?;
        Ok(Some(ParsedMessage { type_hint, fields }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_compact_field_and_int8_value() {
        // 0xC3 "foo" then 0xA1 0x2A -> field "foo" = I8(42)
        let data = [0xC3, b'f', b'o', b'o', tag::INT8, 0x2A];
        let mut parser = WireParser::new(&data);
        let obj = parser.read_object().unwrap();
        assert_eq!(obj.get("foo"), Some(&Value::I8(42)));
    }

    #[test]
    fn unknown_tag_degrades_to_string() {
        // field name "x", then an unrecognized tag byte 0x99 as its value.
        let data = [0xC1, b'x', 0x99];
        let mut parser = WireParser::new(&data);
        let obj = parser.read_object().unwrap();
        assert_eq!(
            obj.get("x"),
            Some(&Value::String("<unknown:0x99>".to_string()))
        );
    }

    #[test]
    fn salvages_when_no_fields_parsed() {
        // 0x99 is not a field-name tag, so read_field_name returns None
        // immediately and the object salvages the leftover byte.
        let data = [0x99];
        let mut parser = WireParser::new(&data);
        let obj = parser.read_object().unwrap();
        assert_eq!(obj.get("_raw_hex"), Some(&Value::String("99".to_string())));
        assert_eq!(obj.get("_raw_length"), Some(&Value::I64(1)));
    }

    #[test]
    fn leading_type_prefix_becomes_message_type_hint() {
        let type_name = b"Order";
        let mut data = vec![tag::TYPE_PREFIX, type_name.len() as u8];
        data.extend_from_slice(type_name);
        data.extend_from_slice(&[0xC1, b'a', tag::INT8, 7]);

        let mut parser = WireParser::new(&data);
        let msg = parser.read_message().unwrap().unwrap();
        assert_eq!(msg.type_hint, Some("Order".to_string()));
        assert_eq!(msg.fields.get("a"), Some(&Value::I8(7)));
    }

    #[test]
    fn nested_type_prefix_promotes_to_type_field() {
        // field "o" holds a TYPE_PREFIX("Order") wrapping a nested block
        // containing field "a" = I8(7); the type name should land as
        // "__type__" inside that nested object.
        let nested_body = [0xC1, b'a', tag::INT8, 7];
        let mut value_bytes = vec![tag::TYPE_PREFIX, 5];
        value_bytes.extend_from_slice(b"Order");
        value_bytes.push(tag::NESTED_BLOCK);
        value_bytes.push(nested_body.len() as u8);
        value_bytes.extend_from_slice(&nested_body);

        let mut data = vec![0xC1, b'o'];
        data.extend_from_slice(&value_bytes);

        let mut parser = WireParser::new(&data);
        let obj = parser.read_object().unwrap();
        let nested = obj.get("o").unwrap().as_map().unwrap();
        assert_eq!(nested.get("a"), Some(&Value::I8(7)));
        assert_eq!(
            nested.get("__type__"),
            Some(&Value::String("Order".to_string()))
        );
    }

    #[test]
    fn uuid_roundtrip() {
        let mut data = vec![tag::UUID];
        data.extend_from_slice(&[
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f, 0x10,
        ]);
        let mut parser = WireParser::new(&data);
        let value = parser.read_value().unwrap();
        assert_eq!(
            value,
            Value::Uuid([
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
                0x0e, 0x0f, 0x10
            ])
        );
    }
}
