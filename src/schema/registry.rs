//! Schema registry
//!
//! Loaded once at startup from a JSON export of every content type's and
//! widget type's field definitions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{MigrateError, Result};

use super::field::{FieldDef, FieldKind};

/// Field schemas keyed by legacy doc type and widget type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRegistry {
    #[serde(default)]
    doc_types: HashMap<String, Vec<FieldDef>>,

    #[serde(default)]
    widget_types: HashMap<String, Vec<FieldDef>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry export from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Schema(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json(&raw)?;

        info!(
            "Loaded schema registry from {} ({} doc types, {} widget types)",
            path.display(),
            registry.doc_types.len(),
            registry.widget_types.len()
        );
        registry.log_field_kinds();

        Ok(registry)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MigrateError::Schema(format!("Invalid schema registry: {}", e)))
    }

    /// Register a doc type schema
    pub fn with_doc_type(mut self, doc_type: impl Into<String>, schema: Vec<FieldDef>) -> Self {
        self.doc_types.insert(doc_type.into(), schema);
        self
    }

    /// Register a widget type schema
    pub fn with_widget_type(mut self, widget_type: impl Into<String>, schema: Vec<FieldDef>) -> Self {
        self.widget_types.insert(widget_type.into(), schema);
        self
    }

    pub fn doc_schema(&self, doc_type: &str) -> Option<&[FieldDef]> {
        self.doc_types.get(doc_type).map(Vec::as_slice)
    }

    pub fn widget_schema(&self, widget_type: &str) -> Option<&[FieldDef]> {
        self.widget_types.get(widget_type).map(Vec::as_slice)
    }

    fn log_field_kinds(&self) {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut stack: Vec<&FieldDef> = self
            .doc_types
            .values()
            .chain(self.widget_types.values())
            .flatten()
            .collect();
        while let Some(field) = stack.pop() {
            let label = match &field.kind {
                FieldKind::Other(_) => "passthrough".to_string(),
                kind => kind.as_str().to_string(),
            };
            *counts.entry(label).or_default() += 1;
            stack.extend(field.schema.iter());
        }
        for (kind, count) in counts {
            info!(kind = %kind, count, "Schema field kind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{
        "docTypes": {
            "blog-post": [
                { "name": "_author", "type": "joinByOne", "idField": "authorId" },
                { "name": "body", "type": "area" }
            ]
        },
        "widgetTypes": {
            "apostrophe-rich-text": []
        }
    }"#;

    #[test]
    fn test_from_json() {
        let registry = SchemaRegistry::from_json(REGISTRY).unwrap();

        let post = registry.doc_schema("blog-post").unwrap();
        assert_eq!(post.len(), 2);
        assert_eq!(post[0].kind, FieldKind::JoinByOne);
        assert!(registry.widget_schema("apostrophe-rich-text").unwrap().is_empty());
        assert!(registry.doc_schema("unknown").is_none());
    }

    #[test]
    fn test_invalid_json_is_schema_error() {
        let err = SchemaRegistry::from_json("{ not json").unwrap_err();
        assert!(matches!(err, MigrateError::Schema(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_schema_error() {
        let err = SchemaRegistry::load(Path::new("/nonexistent/schemas.json")).unwrap_err();
        assert!(matches!(err, MigrateError::Schema(_)));
    }
}
