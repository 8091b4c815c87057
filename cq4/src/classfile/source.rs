//! Lexical scanning of `.java` source text: field declarations,
//! encoding hints, Thrift field-ID annotations, and inner classes.
//!
//! None of this is a real Java parser — it pattern-matches the shapes a
//! POJO or a Thrift/SBE generated class actually takes, which is all the
//! schema extractor needs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;
use crate::schema::{Encoding, FieldDef, LogicalType, MessageDef, Schema};

/// A field recognised in Java source, before it's narrowed down to a
/// schema [`FieldDef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaField {
    pub name: String,
    pub java_type: String,
    pub is_static: bool,
    pub is_transient: bool,
}

impl JavaField {
    pub fn new(name: impl Into<String>, java_type: impl Into<String>) -> Self {
        JavaField {
            name: name.into(),
            java_type: java_type.into(),
            is_static: false,
            is_transient: false,
        }
    }
}

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*((?:(?:public|private|protected|static|final|transient|volatile|synchronized|abstract|native)\s+)*)([A-Za-z_][\w.]*(?:<[^;{}]*?>)?(?:\s*\[\s*\])*)\s+(\w+)\s*(?:=\s*[^;]+)?;",
        )
        .unwrap()
    })
}

fn class_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:(?:public|private|protected)\s+)?(?:static\s+)?class\s+(\w+)[^{;]*\{")
            .unwrap()
    })
}

fn thrift_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"TField\(\s*"([^"]+)"\s*,[^,]+,\s*\(short\)\s*(-?\d+)\s*\)"#).unwrap()
    })
}

/// Strips `//` line comments and `/* ... */` block comments.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                if bytes[i] == b'\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i += 2;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

/// Finds the byte index of the `}` balancing the `{` at `open_idx`.
fn brace_match(text: &[u8], open_idx: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (offset, &b) in text[open_idx..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_idx + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Every `class Name { ... }` header found in `text`, as
/// `(name, open_brace_idx, close_brace_idx)`, in source order, regardless
/// of nesting depth.
fn class_spans(text: &str) -> Vec<(String, usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    for m in class_header_regex().captures_iter(text) {
        let whole = m.get(0).unwrap();
        let name = m.get(1).unwrap().as_str().to_string();
        let open_idx = whole.end() - 1; // the matched '{'
        if let Some(close_idx) = brace_match(bytes, open_idx) {
            spans.push((name, open_idx, close_idx));
        }
    }
    spans
}

/// Masks out every nested class span inside `body` (replacing it with
/// spaces so byte length is preserved) so field scanning sees only the
/// owning class's direct fields.
fn mask_nested_classes(body: &str, nested: &[(usize, usize)]) -> String {
    let mut bytes = body.as_bytes().to_vec();
    for &(start, end) in nested {
        for b in &mut bytes[start..=end.min(bytes.len().saturating_sub(1))] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    String::from_utf8(bytes).unwrap_or_default()
}

fn scan_fields(body: &str) -> Vec<JavaField> {
    field_regex()
        .captures_iter(body)
        .filter_map(|cap| {
            let modifiers = cap.get(1)?.as_str();
            let java_type = cap.get(2)?.as_str().trim().to_string();
            let name = cap.get(3)?.as_str().to_string();
            // reject method-shaped matches: "(" sneaking into the type
            // capture from a preceding statement would already fail the
            // regex, but guard against a bare keyword-only match.
            if java_type.is_empty() || name.is_empty() {
                return None;
            }
            Some(JavaField {
                name,
                java_type,
                is_static: modifiers.contains("static"),
                is_transient: modifiers.contains("transient"),
            })
        })
        .collect()
}

/// Parses the outermost class in `text`: its name, its direct fields
/// (nested class bodies are excluded), and the encoding the source hints
/// at.
pub fn parse_java_source_str(text: &str) -> (String, Vec<JavaField>, Encoding) {
    let clean = strip_comments(text);
    let encoding = detect_encoding_from_source(&clean);
    let spans = class_spans(&clean);

    let Some((class_name, open0, close0)) = spans.first() else {
        return (String::new(), Vec::new(), encoding);
    };

    let body_start = open0 + 1;
    let body = &clean[body_start..*close0];

    let nested: Vec<(usize, usize)> = spans
        .iter()
        .skip(1)
        .filter(|(_, o, _)| *o > *open0 && *o < *close0)
        .map(|(_, o, c)| (o - body_start, (c - body_start).min(body.len())))
        .collect();
    let masked = mask_nested_classes(body, &nested);

    (class_name.clone(), scan_fields(&masked), encoding)
}

/// Like [`parse_java_source_str`], but reads from a file path.
pub fn parse_java_source(path: impl AsRef<Path>) -> Result<(String, Vec<JavaField>, Encoding)> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_java_source_str(&text))
}

/// The inner class bodies declared directly within the named outer
/// class, as `(name, body_text)`.
pub fn extract_inner_classes(text: &str, outer_name: &str) -> Vec<(String, String)> {
    let clean = strip_comments(text);
    let spans = class_spans(&clean);
    let Some(outer) = spans.iter().find(|(n, _, _)| n == outer_name) else {
        return Vec::new();
    };
    let (_, open0, close0) = outer;

    let mut result = Vec::new();
    let mut covered_until = *open0;
    for (name, o, c) in spans.iter() {
        if o > open0 && o < close0 && *o >= covered_until {
            let body = clean[o + 1..*c].to_string();
            result.push((name.clone(), body));
            covered_until = *c;
        }
    }
    result
}

/// Parses the outer class plus every inner class declared directly
/// within it, returning the outer schema first.
pub fn parse_java_source_with_inner_classes_str(text: &str) -> (Schema, Vec<Schema>) {
    let (class_name, fields, encoding) = parse_java_source_str(text);
    let thrift_ids = extract_thrift_field_ids(text);
    let main = java_fields_to_schema(&class_name, &fields, Some(encoding), false, &thrift_ids);

    let inner_schemas = extract_inner_classes(text, &class_name)
        .into_iter()
        .map(|(name, body)| {
            let inner_fields = scan_fields(&body);
            java_fields_to_schema(&name, &inner_fields, Some(encoding), false, &thrift_ids)
        })
        .collect();

    (main, inner_schemas)
}

pub fn parse_java_source_with_inner_classes(
    path: impl AsRef<Path>,
) -> Result<(Schema, Vec<Schema>)> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_java_source_with_inner_classes_str(&text))
}

/// Classifies a source file's encoding from textual hints. `Thrift`
/// import alone is deliberately not enough — only SBE markers force a
/// non-binary default, since Thrift generated classes are still
/// commonly decoded through the binary path in practice.
pub fn detect_encoding_from_source(text: &str) -> Encoding {
    if text.contains("uk.co.real_logic.sbe")
        || text.contains("@SbeField")
        || text.contains("MessageHeaderEncoder")
    {
        Encoding::Sbe
    } else {
        Encoding::Binary
    }
}

/// Extracts `name -> field_id` pairs from
/// `new org.apache.thrift.protocol.TField("name", ..., (short)N)`
/// declarations.
pub fn extract_thrift_field_ids(text: &str) -> HashMap<String, u16> {
    thrift_field_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let name = cap.get(1)?.as_str().to_string();
            let id: u16 = cap.get(2)?.as_str().parse().ok()?;
            Some((name, id))
        })
        .collect()
}

/// Maps a Java type name to its schema logical type, and — for types
/// that land on `object` — the Java type name to remember as
/// [`FieldDef::nested_type`].
pub fn java_type_to_logical_type(java_type: &str) -> (LogicalType, Option<String>) {
    let base = java_type
        .split(['<', '['])
        .next()
        .unwrap_or(java_type)
        .trim();

    if java_type.trim_end().ends_with("[]") {
        // Every array type — not just `byte[]` — is carried as an
        // opaque byte blob; only `object` fields get a `nested_type`.
        return (LogicalType::Bytes, None);
    }

    match base {
        "byte" | "Byte" => (LogicalType::Int8, None),
        "short" | "Short" => (LogicalType::Int16, None),
        "int" | "Integer" => (LogicalType::Int32, None),
        "long" | "Long" => (LogicalType::Int64, None),
        "float" | "Float" => (LogicalType::Float32, None),
        "double" | "Double" => (LogicalType::Float64, None),
        "boolean" | "Boolean" => (LogicalType::Bool, None),
        "char" | "Character" => (LogicalType::Uint16, None),
        "String" | "CharSequence" => (LogicalType::String, None),
        other => (LogicalType::Object, Some(other.to_string())),
    }
}

/// Builds a [`Schema`] with a single message named `class_name` from a
/// list of recognised Java fields. Static and transient fields, and any
/// field starting with `_`/`__` (Thrift bookkeeping), are excluded
/// unless `include_static` opts static fields back in. `thrift_ids`
/// (from [`extract_thrift_field_ids`]) populates each matching field's
/// `thrift_id`; fields with no match keep `None` and fall back to
/// sequential numbering wherever a decoder assigns one.
pub fn java_fields_to_schema(
    class_name: &str,
    java_fields: &[JavaField],
    encoding: Option<Encoding>,
    include_static: bool,
    thrift_ids: &HashMap<String, u16>,
) -> Schema {
    let mut fields = Vec::new();

    for jf in java_fields {
        if jf.name.starts_with('_') {
            continue;
        }
        if jf.is_transient {
            continue;
        }
        if jf.is_static && !include_static {
            continue;
        }

        let (logical_type, nested_type) = java_type_to_logical_type(&jf.java_type);
        let mut field = FieldDef::new(jf.name.clone(), logical_type);
        field.nested_type = nested_type;
        field.thrift_id = thrift_ids.get(&jf.name).copied();
        fields.push(field);
    }

    java_fields_to_schema_from_fields(class_name, fields, encoding)
}

/// Wraps an already-built field list (e.g. from [`crate::classfile::bytecode`])
/// in a single-message [`Schema`] named `class_name`.
pub fn java_fields_to_schema_from_fields(
    class_name: &str,
    fields: Vec<FieldDef>,
    encoding: Option<Encoding>,
) -> Schema {
    let mut schema = Schema::default();
    schema.encoding = encoding.unwrap_or_default();
    schema.messages.insert(
        class_name.to_string(),
        MessageDef {
            name: class_name.to_string(),
            fields,
        },
    );
    schema.default_message = Some(class_name.to_string());
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_fields() {
        let code = r#"
        public class Order {
            private long orderId;
            private String symbol;
            private int quantity;
            private double price;
        }
        "#;
        let (name, fields, encoding) = parse_java_source_str(code);
        assert_eq!(name, "Order");
        assert_eq!(fields.len(), 4);
        assert_eq!(encoding, Encoding::Binary);
        assert!(fields.iter().any(|f| f.name == "symbol" && f.java_type == "String"));
    }

    #[test]
    fn ignores_commented_fields() {
        let code = r#"
        public class Test {
            // private int commented;
            private int actual;
            /* private int blockCommented; */
        }
        "#;
        let (_, fields, _) = parse_java_source_str(code);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"actual"));
        assert!(!names.contains(&"commented"));
        assert!(!names.contains(&"blockCommented"));
    }

    #[test]
    fn excludes_static_and_transient_from_schema_by_default() {
        let fields = vec![
            JavaField::new("persisted", "int"),
            JavaField {
                is_transient: true,
                ..JavaField::new("temp", "int")
            },
            JavaField {
                is_static: true,
                ..JavaField::new("counter", "int")
            },
        ];
        let schema = java_fields_to_schema("Test", &fields, None, false, &HashMap::new());
        let names: Vec<_> = schema.messages["Test"]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["persisted"]);
    }

    #[test]
    fn object_field_records_nested_type() {
        let fields = vec![JavaField::new("header", "HeaderInfo")];
        let schema = java_fields_to_schema("Order", &fields, None, false, &HashMap::new());
        let field = &schema.messages["Order"].fields[0];
        assert_eq!(field.logical_type, LogicalType::Object);
        assert_eq!(field.nested_type.as_deref(), Some("HeaderInfo"));
    }

    #[test]
    fn inner_classes_are_excluded_from_outer_fields() {
        let code = r#"
        public class Order {
            private long orderId;
            private Item item;

            public static class Item {
                private String productId;
                private int quantity;
            }
        }
        "#;
        let (main, inner) = parse_java_source_with_inner_classes_str(code);
        let main_fields: Vec<_> = main.messages["Order"]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert!(main_fields.contains(&"orderId"));
        assert_eq!(inner.len(), 1);
        let item_fields: Vec<_> = inner[0].messages["Item"]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert!(item_fields.contains(&"productId"));
        assert!(item_fields.contains(&"quantity"));
    }

    #[test]
    fn thrift_import_alone_does_not_force_thrift_encoding() {
        let code = r#"
        import org.apache.thrift.TBase;
        public class Order extends TBase {
            private long orderId;
        }
        "#;
        assert_eq!(detect_encoding_from_source(code), Encoding::Binary);
    }

    #[test]
    fn sbe_header_encoder_forces_sbe_encoding() {
        let code = "MessageHeaderEncoder headerEncoder = new MessageHeaderEncoder();";
        assert_eq!(detect_encoding_from_source(code), Encoding::Sbe);
    }

    #[test]
    fn extracts_thrift_field_ids() {
        let code = r#"
        private static final org.apache.thrift.protocol.TField APP_ID_FIELD_DESC =
            new org.apache.thrift.protocol.TField("appId", org.apache.thrift.protocol.TType.STRING, (short)2);
        "#;
        let ids = extract_thrift_field_ids(code);
        assert_eq!(ids.get("appId"), Some(&2));
    }

    #[test]
    fn parsed_source_schema_carries_thrift_field_ids() {
        let code = r#"
        public class Order {
            private static final org.apache.thrift.protocol.TField ORDER_ID_FIELD_DESC =
                new org.apache.thrift.protocol.TField("orderId", org.apache.thrift.protocol.TType.I64, (short)5);
            private long orderId;
            private double price;
        }
        "#;
        let (main, _inner) = parse_java_source_with_inner_classes_str(code);
        let order_id = main.messages["Order"]
            .fields
            .iter()
            .find(|f| f.name == "orderId")
            .unwrap();
        assert_eq!(order_id.thrift_id, Some(5));

        // no TField declaration exists for "price" — it keeps None rather
        // than guessing a sequential id.
        let price = main.messages["Order"]
            .fields
            .iter()
            .find(|f| f.name == "price")
            .unwrap();
        assert_eq!(price.thrift_id, None);
    }
}
