//! [`Schema`]: the in-memory model of named message types used to drive
//! the secondary decoders, loaded from a JSON document or produced by
//! the Java class extractor.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::{Error, Result};

/// The closed set of field types a schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Bool,
    String,
    Bytes,
    StopBit,
    Padding,
    Skip,
    Object,
}

impl LogicalType {
    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "int8" => LogicalType::Int8,
            "int16" => LogicalType::Int16,
            "int32" => LogicalType::Int32,
            "int64" => LogicalType::Int64,
            "uint8" => LogicalType::Uint8,
            "uint16" => LogicalType::Uint16,
            "uint32" => LogicalType::Uint32,
            "uint64" => LogicalType::Uint64,
            "float32" => LogicalType::Float32,
            "float64" => LogicalType::Float64,
            "bool" => LogicalType::Bool,
            "string" => LogicalType::String,
            "bytes" => LogicalType::Bytes,
            "stop_bit" => LogicalType::StopBit,
            "padding" => LogicalType::Padding,
            "skip" => LogicalType::Skip,
            "object" => LogicalType::Object,
            other => return Err(Error::BadSchema(format!("unknown field type '{other}'"))),
        })
    }
}

/// The encoding a schema's bytes are expected to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Binary,
    Thrift,
    Sbe,
}

impl Encoding {
    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "binary" => Encoding::Binary,
            "thrift" => Encoding::Thrift,
            "sbe" => Encoding::Sbe,
            other => return Err(Error::BadSchema(format!("unknown encoding '{other}'"))),
        })
    }
}

/// The definition of a single field within a [`MessageDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub logical_type: LogicalType,
    /// Declared size for `padding`/`skip` fields, or a SBE/nested-object
    /// hint; `0` means "not specified".
    pub size_hint: u32,
    pub optional: bool,
    /// Only meaningful when the owning schema's encoding is
    /// [`Encoding::Thrift`].
    pub thrift_id: Option<u16>,
    /// The Java type name of an `object`-typed field, if known.
    pub nested_type: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        FieldDef {
            name: name.into(),
            logical_type,
            size_hint: 0,
            optional: false,
            thrift_id: None,
            nested_type: None,
        }
    }
}

/// A named message type: an ordered list of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    /// Whether any field is `object`-typed — used by the merge rule to
    /// prefer "outer" message types over helper/inner ones.
    pub fn has_object_field(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.logical_type == LogicalType::Object)
    }
}

/// A collection of named message types plus the encoding their payloads
/// use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub messages: HashMap<String, MessageDef>,
    pub default_message: Option<String>,
    pub encoding: Encoding,
}

impl Schema {
    /// Parses a schema document of the shape described in the module
    /// docs: `{"messages": {Name: {"fields": [...] }}, "default": ...,
    /// "encoding": ...}`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| Error::BadSchema(e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &Json) -> Result<Self> {
        let mut schema = Schema::default();

        if let Some(encoding) = json.get("encoding").and_then(Json::as_str) {
            schema.encoding = Encoding::parse(encoding)?;
        }

        let messages = json
            .get("messages")
            .and_then(Json::as_object)
            .ok_or_else(|| Error::BadSchema("missing 'messages' object".to_string()))?;

        for (name, def) in messages {
            let fields_json = def
                .get("fields")
                .and_then(Json::as_array)
                .ok_or_else(|| Error::BadSchema(format!("message '{name}' has no 'fields' array")))?;

            let mut fields = Vec::with_capacity(fields_json.len());
            for field_json in fields_json {
                fields.push(parse_field(field_json)?);
            }

            schema.messages.insert(
                name.clone(),
                MessageDef {
                    name: name.clone(),
                    fields,
                },
            );
        }

        schema.default_message = json
            .get("default")
            .and_then(Json::as_str)
            .map(str::to_string);

        Ok(schema)
    }

    /// Resolves a message by name, falling back to the schema's declared
    /// default, and finally to the sole message when exactly one exists.
    pub fn get_message(&self, name: Option<&str>) -> Option<&MessageDef> {
        if let Some(name) = name {
            return self.messages.get(name);
        }
        if let Some(default) = &self.default_message {
            return self.messages.get(default);
        }
        if self.messages.len() == 1 {
            return self.messages.values().next();
        }
        None
    }

    /// Merges several schemas: the union of their message definitions,
    /// with the default chosen from the first schema unless some
    /// message anywhere in the set has an `object`-typed field, in which
    /// case the first such message becomes the default. This lets the
    /// class extractor prefer an "outer" type over helper inner classes.
    pub fn merge(schemas: impl IntoIterator<Item = Schema>) -> Schema {
        let mut merged = Schema::default();
        let mut first_default: Option<String> = None;
        let mut object_preferred: Option<String> = None;

        for schema in schemas {
            if first_default.is_none() {
                first_default = schema.default_message.clone();
            }
            if merged.messages.is_empty() {
                merged.encoding = schema.encoding;
            }
            for (name, message) in schema.messages {
                if object_preferred.is_none() && message.has_object_field() {
                    object_preferred = Some(name.clone());
                }
                merged.messages.insert(name, message);
            }
        }

        merged.default_message = object_preferred.or(first_default);
        merged
    }
}

fn parse_field(json: &Json) -> Result<FieldDef> {
    let name = json
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::BadSchema("field missing 'name'".to_string()))?;
    let type_name = json
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::BadSchema(format!("field '{name}' missing 'type'")))?;

    Ok(FieldDef {
        name: name.to_string(),
        logical_type: LogicalType::parse(type_name)?,
        size_hint: json.get("size").and_then(Json::as_u64).unwrap_or(0) as u32,
        optional: json
            .get("optional")
            .and_then(Json::as_bool)
            .unwrap_or(false),
        thrift_id: json.get("field_id").and_then(Json::as_u64).map(|v| v as u16),
        nested_type: json
            .get("nested_type")
            .and_then(Json::as_str)
            .map(str::to_string),
    })
}
