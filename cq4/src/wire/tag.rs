//! The numeric tag vocabulary of the self-describing wire format.
//!
//! Every field and value on the wire begins with a single tag byte. Most
//! tags are one of a small number of fixed codes; two ranges are reserved
//! for compact inline representations of field names and strings, keyed
//! off their length.

/// Padding, skipped and otherwise ignored.
pub const PADDING: u8 = 0x00;
/// An explicit null value.
pub const NULL: u8 = 0x80;
/// A byte string with a 4-byte little-endian length prefix.
pub const BYTES_LENGTH32: u8 = 0x81;
/// A nested block: the following bytes form an independently framed
/// sub-document with their own length prefix.
pub const NESTED_BLOCK: u8 = 0x82;
/// An array of signed 64-bit integers.
pub const I64_ARRAY: u8 = 0x83;
/// An array of unsigned 8-bit integers.
pub const U8_ARRAY: u8 = 0x84;
/// An array of signed 8-bit integers.
pub const I8_ARRAY: u8 = 0x85;
/// 4 bytes of padding.
pub const PADDING32: u8 = 0x8E;
/// Padding that extends to the end of the enclosing block.
pub const PADDING_END: u8 = 0x8F;
/// A 32-bit IEEE-754 float.
pub const FLOAT32: u8 = 0x90;
/// A 64-bit IEEE-754 float.
pub const FLOAT64: u8 = 0x91;
/// A signed 8-bit integer.
pub const INT8: u8 = 0xA1;
/// A signed 16-bit integer.
pub const INT16: u8 = 0xA2;
/// A signed 32-bit integer.
pub const INT32: u8 = 0xA4;
/// A signed 64-bit integer.
pub const INT64: u8 = 0xA8;
/// An unsigned 8-bit integer.
pub const UINT8: u8 = 0xA5;
/// An unsigned 16-bit integer.
pub const UINT16: u8 = 0xA6;
/// A 64-bit epoch timestamp.
pub const TIMESTAMP: u8 = 0xB0;
/// A date-time value, read the same as [`TIMESTAMP`].
pub const DATE_TIME: u8 = 0xB1;
/// A 16-byte UUID.
pub const UUID: u8 = 0xB5;
/// A type-name prefix preceding a nested value; promoted to a `__type__`
/// field on the enclosing object.
pub const TYPE_PREFIX: u8 = 0xB6;
/// A field name given as a length-prefixed string (any length).
pub const FIELD_NAME_ANY: u8 = 0xB7;
/// A string value given with an explicit length prefix (any length).
pub const STRING_ANY: u8 = 0xB8;
/// A field identified by number rather than by name.
pub const FIELD_NUMBER: u8 = 0xB9;
/// A field name given as a length-prefixed string, used interchangeably
/// with [`FIELD_NAME_ANY`] by different writer versions.
pub const FIELD_NAME_LITERAL: u8 = 0xBA;
/// An event name, read the same as a string value. Its exact role in
/// Chronicle's schema evolution isn't pinned down; treated as a string.
pub const EVENT_NAME: u8 = 0xBB;
/// A comment, read the same as a string value and discarded by callers
/// that don't care about it.
pub const COMMENT: u8 = 0xBF;

/// Start of the compact field-name range: `code - 0xC0` is the name
/// length, and the name bytes immediately follow.
pub const COMPACT_FIELD_NAME_START: u8 = 0xC0;
/// Inclusive end of the compact field-name range.
pub const COMPACT_FIELD_NAME_END: u8 = 0xDF;
/// Start of the compact string range: `code - 0xE0` is the string length.
pub const COMPACT_STRING_START: u8 = 0xE0;
/// Inclusive end of the compact string range.
pub const COMPACT_STRING_END: u8 = 0xFF;

/// Whether `code` falls in the compact field-name range.
pub fn is_compact_field_name(code: u8) -> bool {
    (COMPACT_FIELD_NAME_START..=COMPACT_FIELD_NAME_END).contains(&code)
}

/// The inline name length encoded by a compact field-name tag.
///
/// Callers must check [`is_compact_field_name`] first; this does not
/// validate the range.
pub fn compact_field_name_length(code: u8) -> usize {
    (code - COMPACT_FIELD_NAME_START) as usize
}

/// Whether `code` falls in the compact string range.
pub fn is_compact_string(code: u8) -> bool {
    (COMPACT_STRING_START..=COMPACT_STRING_END).contains(&code)
}

/// The inline string length encoded by a compact string tag.
///
/// Callers must check [`is_compact_string`] first; this does not validate
/// the range.
pub fn compact_string_length(code: u8) -> usize {
    (code - COMPACT_STRING_START) as usize
}
