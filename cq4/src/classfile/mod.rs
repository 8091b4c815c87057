//! Builds a [`crate::schema::Schema`] from user-provided Java sources:
//! `.java` text via lexical scanning ([`source`]), compiled `.class`
//! files via constant-pool and field-table parsing ([`bytecode`]), and a
//! directory walk that merges everything it finds ([`registry`]).

pub mod bytecode;
pub mod registry;
pub mod source;

pub use registry::{parse_directory, ClassRegistry};
pub use source::{parse_java_source_with_inner_classes, JavaField};

use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Parses a single `.java` or `.class` file into a [`Schema`]. `.java`
/// files also contribute their inner classes, merged in.
pub fn parse_java_file(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("java") => {
            let text = std::fs::read_to_string(path)?;
            let (main, inner) = source::parse_java_source_with_inner_classes_str(&text);
            Ok(Schema::merge(std::iter::once(main).chain(inner)))
        }
        Some("class") => {
            let bytes = std::fs::read(path)?;
            bytecode::parse_class_file(&bytes)
        }
        _ => Err(Error::BadSchema(format!(
            "unsupported file type: {}",
            path.display()
        ))),
    }
}
