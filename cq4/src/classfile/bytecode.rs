//! Parses compiled `.class` files directly: the constant pool and field
//! table, skipping everything else (methods, code attributes, ...).
//!
//! Reference: the JVM class file format, JVMS §4.

use crate::classfile::source::java_fields_to_schema_from_fields;
use crate::error::{Error, Result};
use crate::schema::{FieldDef, LogicalType, Schema};

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_STATIC: u16 = 0x0008;
const ACC_TRANSIENT: u16 = 0x0080;

enum ConstantPoolEntry {
    Utf8(String),
    Class { name_index: u16 },
    Other,
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(Error::truncated("class file"))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n)?;
        Ok(())
    }
}

/// Parses a `.class` file into a [`Schema`] with a single message named
/// after the class's simple (unqualified) name.
pub fn parse_class_file(data: &[u8]) -> Result<Schema> {
    let mut cursor = Cursor::new(data);

    let magic = cursor.u32()?;
    if magic != MAGIC {
        return Err(Error::BadSchema(format!(
            "not a class file: bad magic 0x{magic:08X}"
        )));
    }
    cursor.skip(4)?; // minor_version, major_version

    let pool = read_constant_pool(&mut cursor)?;

    cursor.skip(2)?; // access_flags
    let this_class = cursor.u16()?;
    cursor.skip(2)?; // super_class
    let interfaces_count = cursor.u16()?;
    cursor.skip(interfaces_count as usize * 2)?;

    let class_name = resolve_class_name(&pool, this_class).unwrap_or_else(|| "Unknown".to_string());

    let fields_count = cursor.u16()?;
    let mut fields = Vec::new();
    for _ in 0..fields_count {
        let access_flags = cursor.u16()?;
        let name_index = cursor.u16()?;
        let descriptor_index = cursor.u16()?;
        let attributes_count = cursor.u16()?;
        for _ in 0..attributes_count {
            cursor.skip(2)?; // attribute_name_index
            let attribute_length = cursor.u32()?;
            cursor.skip(attribute_length as usize)?;
        }

        let (Some(name), Some(descriptor)) =
            (utf8_at(&pool, name_index), utf8_at(&pool, descriptor_index))
        else {
            continue;
        };

        if name.starts_with('_') {
            continue;
        }
        if access_flags & ACC_TRANSIENT != 0 {
            continue;
        }
        if access_flags & ACC_STATIC != 0 {
            continue;
        }

        let (logical_type, nested_type) = descriptor_to_logical(descriptor);
        let mut field = FieldDef::new(name.to_string(), logical_type);
        field.nested_type = nested_type;
        fields.push(field);
    }

    Ok(java_fields_to_schema_from_fields(&class_name, fields, None))
}

fn read_constant_pool(cursor: &mut Cursor) -> Result<Vec<ConstantPoolEntry>> {
    let count = cursor.u16()?;
    let mut pool = Vec::with_capacity(count as usize);
    pool.push(ConstantPoolEntry::Other); // index 0 is unused

    let mut i = 1u16;
    while i < count {
        let tag = cursor.u8()?;
        match tag {
            1 => {
                let len = cursor.u16()? as usize;
                let bytes = cursor.take(len)?;
                pool.push(ConstantPoolEntry::Utf8(
                    String::from_utf8_lossy(bytes).into_owned(),
                ));
                i += 1;
            }
            3 | 4 => {
                cursor.skip(4)?;
                pool.push(ConstantPoolEntry::Other);
                i += 1;
            }
            5 | 6 => {
                cursor.skip(8)?;
                pool.push(ConstantPoolEntry::Other);
                pool.push(ConstantPoolEntry::Other);
                i += 2;
            }
            7 => {
                let name_index = cursor.u16()?;
                pool.push(ConstantPoolEntry::Class { name_index });
                i += 1;
            }
            8 | 16 | 19 | 20 => {
                cursor.skip(2)?;
                pool.push(ConstantPoolEntry::Other);
                i += 1;
            }
            9 | 10 | 11 | 12 | 17 | 18 => {
                cursor.skip(4)?;
                pool.push(ConstantPoolEntry::Other);
                i += 1;
            }
            15 => {
                cursor.skip(3)?;
                pool.push(ConstantPoolEntry::Other);
                i += 1;
            }
            other => return Err(Error::BadTag(other)),
        }
    }

    Ok(pool)
}

fn utf8_at(pool: &[ConstantPoolEntry], index: u16) -> Option<&str> {
    match pool.get(index as usize)? {
        ConstantPoolEntry::Utf8(s) => Some(s.as_str()),
        _ => None,
    }
}

fn resolve_class_name(pool: &[ConstantPoolEntry], class_index: u16) -> Option<String> {
    let ConstantPoolEntry::Class { name_index } = pool.get(class_index as usize)? else {
        return None;
    };
    let fqn = utf8_at(pool, *name_index)?;
    Some(fqn.rsplit('/').next().unwrap_or(fqn).to_string())
}

/// Maps a JVM field descriptor to a logical type, per JVMS §4.3.2.
fn descriptor_to_logical(descriptor: &str) -> (LogicalType, Option<String>) {
    match descriptor {
        "B" => (LogicalType::Int8, None),
        "S" => (LogicalType::Int16, None),
        "I" => (LogicalType::Int32, None),
        "J" => (LogicalType::Int64, None),
        "F" => (LogicalType::Float32, None),
        "D" => (LogicalType::Float64, None),
        "Z" => (LogicalType::Bool, None),
        "C" => (LogicalType::Uint16, None),
        "Ljava/lang/Byte;" => (LogicalType::Int8, None),
        "Ljava/lang/Short;" => (LogicalType::Int16, None),
        "Ljava/lang/Integer;" => (LogicalType::Int32, None),
        "Ljava/lang/Long;" => (LogicalType::Int64, None),
        "Ljava/lang/Float;" => (LogicalType::Float32, None),
        "Ljava/lang/Double;" => (LogicalType::Float64, None),
        "Ljava/lang/Boolean;" => (LogicalType::Bool, None),
        "Ljava/lang/Character;" => (LogicalType::Uint16, None),
        "Ljava/lang/String;" | "Ljava/lang/CharSequence;" => (LogicalType::String, None),
        "[B" => (LogicalType::Bytes, None),
        other if other.starts_with('[') => (LogicalType::Object, None),
        other if other.starts_with('L') && other.ends_with(';') => {
            let fqn = &other[1..other.len() - 1];
            (
                LogicalType::Object,
                Some(fqn.rsplit('/').next().unwrap_or(fqn).to_string()),
            )
        }
        _ => (LogicalType::Object, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = parse_class_file(&[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::BadSchema(_)));
    }

    #[test]
    fn descriptor_mapping_covers_primitives_and_references() {
        assert_eq!(descriptor_to_logical("J").0, LogicalType::Int64);
        assert_eq!(descriptor_to_logical("Ljava/lang/String;").0, LogicalType::String);
        assert_eq!(descriptor_to_logical("[B").0, LogicalType::Bytes);
        let (ty, nested) = descriptor_to_logical("Lcom/example/HeaderInfo;");
        assert_eq!(ty, LogicalType::Object);
        assert_eq!(nested.as_deref(), Some("HeaderInfo"));
    }
}
