//! Directory walking and a name-indexed registry of parsed schemas,
//! merged with [`Schema::merge`]'s object-preferring-default rule.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::Schema;

use super::parse_java_file;

/// Accumulates schemas parsed from individual class files, indexed by
/// both their fully-qualified and simple names.
#[derive(Default)]
pub struct ClassRegistry {
    by_name: HashMap<String, Schema>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    /// Registers `schema` under `qualified_name`, and also under its
    /// simple (last path segment) name so callers can look it up either
    /// way.
    pub fn register(&mut self, qualified_name: &str, schema: Schema) {
        let simple = qualified_name.rsplit('.').next().unwrap_or(qualified_name);
        if simple != qualified_name {
            self.by_name.insert(simple.to_string(), schema.clone());
        }
        self.by_name.insert(qualified_name.to_string(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.by_name.get(name)
    }

    /// Merges every registered schema via [`Schema::merge`].
    pub fn merge_all(self) -> Schema {
        Schema::merge(self.by_name.into_values())
    }
}

/// Recursively collects every `.java` and `.class` file under `dir`.
pub fn scan_directory_for_java_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::BadSchema(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    walk(dir, &mut files)?;
    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("java") | Some("class")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Parses every `.java`/`.class` file under `dir` and merges the
/// resulting schemas. `.java` files also contribute their inner classes
/// when `include_inner_classes` is set. Fails with [`Error::NoSchema`]
/// if no usable file was found.
pub fn parse_directory(dir: impl AsRef<Path>, include_inner_classes: bool) -> Result<Schema> {
    let files = scan_directory_for_java_files(&dir)?;
    if files.is_empty() {
        return Err(Error::NoSchema);
    }

    let mut schemas = Vec::new();
    for path in files {
        match path.extension().and_then(|e| e.to_str()) {
            Some("java") if include_inner_classes => {
                let text = std::fs::read_to_string(&path)?;
                let (main, inner) =
                    super::source::parse_java_source_with_inner_classes_str(&text);
                schemas.push(main);
                schemas.extend(inner);
            }
            _ => schemas.push(parse_java_file(&path)?),
        }
    }

    if schemas.is_empty() {
        return Err(Error::NoSchema);
    }

    Ok(Schema::merge(schemas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, MessageDef};

    #[test]
    fn scan_empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(scan_directory_for_java_files(dir.path()).unwrap().len(), 0);
    }

    #[test]
    fn scan_directory_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Root.java"), "public class Root {}").unwrap();
        let sub = dir.path().join("model");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("Nested.java"), "public class Nested {}").unwrap();

        let files = scan_directory_for_java_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn scan_nonexistent_directory_errors() {
        let err = scan_directory_for_java_files("/nonexistent/does/not/exist").unwrap_err();
        assert!(matches!(err, Error::BadSchema(_)));
    }

    #[test]
    fn parse_directory_merges_multiple_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Order.java"),
            "public class Order { private long orderId; }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Trade.java"),
            "public class Trade { private long tradeId; }",
        )
        .unwrap();

        let schema = parse_directory(dir.path(), false).unwrap();
        assert!(schema.messages.contains_key("Order"));
        assert!(schema.messages.contains_key("Trade"));
    }

    #[test]
    fn parse_directory_with_inner_classes_includes_them() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Order.java"),
            r#"
            public class Order {
                private long orderId;
                private Item item;

                public static class Item {
                    private String productId;
                }
            }
            "#,
        )
        .unwrap();

        let schema = parse_directory(dir.path(), true).unwrap();
        assert!(schema.messages.contains_key("Order"));
        assert!(schema.messages.contains_key("Item"));
    }

    #[test]
    fn parse_empty_directory_fails_with_no_schema() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_directory(dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::NoSchema));
    }

    #[test]
    fn registry_looks_up_by_simple_and_qualified_name() {
        let mut registry = ClassRegistry::new();
        let schema = Schema {
            default_message: Some("TestClass".to_string()),
            ..Schema::default()
        };
        registry.register("com.example.TestClass", schema);
        assert!(registry.get("com.example.TestClass").is_some());
        assert!(registry.get("TestClass").is_some());
    }

    #[test]
    fn registry_merge_all_unions_messages() {
        let mut registry = ClassRegistry::new();
        let mut s1 = Schema::default();
        s1.messages.insert(
            "Class1".to_string(),
            MessageDef {
                name: "Class1".to_string(),
                fields: vec![FieldDef::new("id", crate::schema::LogicalType::Int64)],
            },
        );
        let mut s2 = Schema::default();
        s2.messages.insert(
            "Class2".to_string(),
            MessageDef {
                name: "Class2".to_string(),
                fields: vec![FieldDef::new("name", crate::schema::LogicalType::String)],
            },
        );
        registry.register("Class1", s1);
        registry.register("Class2", s2);

        let merged = registry.merge_all();
        assert!(merged.messages.contains_key("Class1"));
        assert!(merged.messages.contains_key("Class2"));
    }
}
