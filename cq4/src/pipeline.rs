//! [`decode_excerpt`]: ties the framed reader, the wire parser, and the
//! schema-driven secondary decoders together into a single [`Message`]
//! per excerpt.
//!
//! The wire parser alone already produces a usable field map for
//! messages that are self-describing on the wire. Some queues instead
//! write payloads the wire parser can't find any fields in at all — it
//! falls back to its raw-bytes salvage. When a schema has been loaded,
//! this is the pipeline's cue to hand those same raw bytes to whichever
//! secondary decoder (`decode::binary`/`thrift`/`sbe`) the schema's
//! encoding calls for, keeping the original salvage under `_original_hex`
//! so nothing is lost if the schema turns out to be the wrong one.

use std::sync::Arc;

use crate::decode::{binary, sbe::SbeDecoder, thrift::ThriftDecoder};
use crate::framing::Excerpt;
use crate::schema::{Encoding, Schema};
use crate::value::{OrderedMap, Value};
use crate::wire::WireParser;

/// A fully decoded excerpt: its ordinal, byte offset, optional type hint,
/// the metadata flag, and its field map. This is the crate's public,
/// owned result type — everything upstream of it borrows from the
/// memory-mapped file.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub index: u64,
    pub offset: u64,
    pub type_hint: Option<String>,
    pub is_metadata: bool,
    pub fields: OrderedMap,
}

/// State threaded through a pipeline run. Holding the schema behind an
/// `Arc` lets one loaded schema back many [`decode_excerpt`] calls
/// without re-parsing or cloning it per message.
#[derive(Clone, Default)]
pub struct Context {
    pub schema: Option<Arc<Schema>>,
}

impl Context {
    pub fn new(schema: Option<Arc<Schema>>) -> Self {
        Context { schema }
    }
}

/// Decodes a single excerpt's payload into a [`Message`].
///
/// Wire-parses first; if that yields nothing but raw salvage and a
/// schema is loaded, re-decodes the payload through the schema's chosen
/// secondary decoder and merges the result in, preserving the original
/// salvaged hex under `_original_hex`.
pub fn decode_excerpt(excerpt: &Excerpt<'_>, context: &Context) -> Message {
    let mut parser = WireParser::new(excerpt.payload);
    let (type_hint, mut fields) = match parser.read_message() {
        Ok(Some(parsed)) => (parsed.type_hint, parsed.fields),
        Ok(None) => (None, OrderedMap::new()),
        Err(_) => {
            let mut salvaged = OrderedMap::new();
            crate::wire::salvage::salvage(excerpt.payload, &mut salvaged);
            (None, salvaged)
        }
    };

    if let Some(schema) = &context.schema {
        if is_unparsed_salvage(&fields) {
            if let Some(raw_hex) = fields.shift_remove("_raw_hex") {
                fields.insert("_original_hex".to_string(), raw_hex);
            }
            fields.shift_remove("_raw_length");

            let decoded = decode_with_schema(schema, excerpt.payload, type_hint.as_deref());
            for (name, value) in decoded {
                fields.insert(name, value);
            }
        }
    }

    Message {
        index: excerpt.index,
        offset: excerpt.offset,
        type_hint,
        is_metadata: excerpt.is_metadata,
        fields,
    }
}

/// Whether `fields` is nothing but the wire parser's raw-bytes salvage —
/// no field name it produced is user-visible. `_json`'s hoisted keys
/// don't carry the `_` prefix, so their presence means the salvage
/// already recovered real structure and shouldn't be overridden.
fn is_unparsed_salvage(fields: &OrderedMap) -> bool {
    fields.contains_key("_raw_hex") && fields.keys().all(|k| k.starts_with('_'))
}

fn decode_with_schema(schema: &Schema, data: &[u8], type_hint: Option<&str>) -> OrderedMap {
    let message_name = type_hint.map(normalize_type_hint);
    let message_name = message_name.as_deref();

    match schema.encoding {
        Encoding::Binary => binary::decode(schema, data, message_name),
        Encoding::Thrift => match schema.get_message(message_name) {
            Some(msg_def) => ThriftDecoder::from_message(msg_def).decode(data),
            None => missing_message_sentinel(data),
        },
        Encoding::Sbe => match schema.get_message(message_name) {
            Some(msg_def) => SbeDecoder::from_message(msg_def).decode(data, 0),
            None => missing_message_sentinel(data),
        },
    }
}

/// A wire type hint like `"!types.Order"` names a message as its final
/// `.`-separated segment, optionally marked with a leading `!`. Strips
/// both before a schema lookup, matching how the original reader turns
/// a type hint into a lookup key.
fn normalize_type_hint(type_hint: &str) -> &str {
    type_hint.rsplit('.').next().unwrap_or(type_hint).trim_start_matches('!')
}

fn missing_message_sentinel(data: &[u8]) -> OrderedMap {
    let mut result = OrderedMap::new();
    result.insert(
        "_error".to_string(),
        Value::String("No matching message definition".to_string()),
    );
    result.insert(
        "_raw_hex".to_string(),
        Value::String(crate::value::hex_encode(data)),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, LogicalType, MessageDef};

    fn excerpt(payload: &[u8]) -> Excerpt<'_> {
        Excerpt {
            index: 3,
            offset: 128,
            length: payload.len() as u32,
            is_metadata: false,
            payload,
        }
    }

    #[test]
    fn self_describing_payload_needs_no_schema() {
        // field "n" (compact 1-byte name) holding an int32 value of 1.
        let payload = [0xC1, b'n', 0xA4, 1, 0, 0, 0];
        let message = decode_excerpt(&excerpt(&payload), &Context::default());
        assert_eq!(message.index, 3);
        assert_eq!(message.offset, 128);
        assert!(!message.fields.is_empty());
    }

    #[test]
    fn salvaged_payload_is_redecoded_through_binary_schema() {
        let mut schema = Schema::default();
        schema.default_message = Some("Tick".to_string());
        schema.messages.insert(
            "Tick".to_string(),
            MessageDef {
                name: "Tick".to_string(),
                fields: vec![FieldDef::new("price", LogicalType::Int32)],
            },
        );
        let context = Context::new(Some(Arc::new(schema)));

        // Not self-describing on the wire at all: the parser's first
        // byte isn't a recognized field-name tag, so `read_object` falls
        // straight to salvage.
        let payload = 42i32.to_le_bytes();
        let message = decode_excerpt(&excerpt(&payload), &context);

        assert_eq!(message.fields.get("price"), Some(&Value::I32(42)));
        assert!(message.fields.contains_key("_original_hex"));
        assert!(!message.fields.contains_key("_raw_hex"));
    }

    #[test]
    fn json_salvage_is_left_alone_even_with_a_schema_loaded() {
        let mut schema = Schema::default();
        schema.default_message = Some("Tick".to_string());
        schema.messages.insert(
            "Tick".to_string(),
            MessageDef {
                name: "Tick".to_string(),
                fields: vec![FieldDef::new("price", LogicalType::Int32)],
            },
        );
        let context = Context::new(Some(Arc::new(schema)));

        let payload = br#"junk{"price":7}junk"#;
        let message = decode_excerpt(&excerpt(payload), &context);

        assert_eq!(message.fields.get("price"), Some(&Value::I64(7)));
        assert!(!message.fields.contains_key("_original_hex"));
    }

    #[test]
    fn bang_and_dot_prefixed_type_hint_still_resolves_the_message() {
        let mut schema = Schema::default();
        schema.encoding = crate::schema::Encoding::Thrift;
        schema.messages.insert(
            "Order".to_string(),
            MessageDef {
                name: "Order".to_string(),
                fields: vec![FieldDef::new("qty", LogicalType::Int32)],
            },
        );
        let context = Context::new(Some(Arc::new(schema)));

        let type_name = "!types.Order";
        let mut payload = vec![crate::wire::tag::TYPE_PREFIX, type_name.len() as u8];
        payload.extend_from_slice(type_name.as_bytes());
        // non-self-describing body: 0xFF isn't any recognized field-name
        // or value tag, so `read_object` falls straight to salvage.
        payload.push(0xFF);

        let message = decode_excerpt(&excerpt(&payload), &context);

        assert_eq!(message.type_hint.as_deref(), Some("!types.Order"));
        // Looked up as "Order" and found, rather than falling through to
        // the missing-message sentinel.
        assert!(!message.fields.contains_key("_error"));
    }
}
