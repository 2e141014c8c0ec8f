//! Field definitions
//!
//! The field type tag is resolved into a [`FieldKind`] when the registry is
//! parsed, so the transformer never dispatches on raw strings.

use serde::{Deserialize, Serialize};

/// Field type tags the transformer acts on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    /// Single reference stored as a scalar id
    JoinByOne,
    /// List of sub-objects with their own schema
    Array,
    /// One nested sub-object with its own schema
    Object,
    /// Rich content container of widgets
    Area,
    /// Single-widget area variant
    Singleton,
    /// Any other tag; passed through untouched
    Other(String),
}

impl FieldKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::JoinByOne => "joinByOne",
            Self::Array => "array",
            Self::Object => "object",
            Self::Area => "area",
            Self::Singleton => "singleton",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for FieldKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "joinByOne" => Self::JoinByOne,
            "array" => Self::Array,
            "object" => Self::Object,
            "area" => Self::Area,
            "singleton" => Self::Singleton,
            _ => Self::Other(tag),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One entry of an ordered schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldKind,

    /// Scalar id field backing a single reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,

    /// Element schema for array and object fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<FieldDef>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            id_field: None,
            schema: Vec::new(),
        }
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    pub fn with_schema(mut self, schema: Vec<FieldDef>) -> Self {
        self.schema = schema;
        self
    }

    /// Field name with any leading underscore removed (`_author` -> `author`)
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches('_')
    }

    /// Legacy scalar id field; `_author` defaults to `authorId`
    pub fn id_field(&self) -> String {
        self.id_field
            .clone()
            .unwrap_or_else(|| format!("{}Id", self.bare_name()))
    }

    /// Target list field for a single reference (`_author` -> `authorIds`)
    pub fn ids_field(&self) -> String {
        format!("{}Ids", self.bare_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(FieldKind::from("area".to_string()), FieldKind::Area);
        assert_eq!(FieldKind::from("joinByOne".to_string()), FieldKind::JoinByOne);
        assert_eq!(
            FieldKind::from("string".to_string()),
            FieldKind::Other("string".into())
        );
    }

    #[test]
    fn test_join_field_names() {
        let field = FieldDef::new("_author", FieldKind::JoinByOne);
        assert_eq!(field.id_field(), "authorId");
        assert_eq!(field.ids_field(), "authorIds");

        let explicit = FieldDef::new("_owner", FieldKind::JoinByOne).with_id_field("ownerRef");
        assert_eq!(explicit.id_field(), "ownerRef");
        assert_eq!(explicit.ids_field(), "ownerIds");
    }

    #[test]
    fn test_nested_definition_parses() {
        let field: FieldDef = serde_json::from_value(json!({
            "name": "slides",
            "type": "array",
            "schema": [
                { "name": "body", "type": "area" },
                { "name": "caption", "type": "string" }
            ]
        }))
        .unwrap();

        assert_eq!(field.kind, FieldKind::Array);
        assert_eq!(field.schema.len(), 2);
        assert_eq!(field.schema[0].kind, FieldKind::Area);
        assert_eq!(field.schema[1].kind, FieldKind::Other("string".into()));
    }
}
