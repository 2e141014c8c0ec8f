//! Shared types for the upgrade pipeline
//!
//! Documents are kept as untyped JSON maps end to end. The enums here name
//! the handful of tagged values the pipeline itself writes into them.

pub mod error;

pub use error::{MigrateError, Result};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An untyped document or embedded object
pub type JsonMap = serde_json::Map<String, JsonValue>;

/// Field names read or written by the pipeline
pub mod fields {
    pub const ID: &str = "_id";
    pub const TYPE: &str = "type";
    pub const SLUG: &str = "slug";
    pub const PATH: &str = "path";
    pub const LEVEL: &str = "level";
    pub const TRASH: &str = "trash";
    pub const ARCHIVED: &str = "archived";
    pub const PUBLISHED: &str = "published";
    pub const VISIBILITY: &str = "visibility";
    pub const META_TYPE: &str = "metaType";
    pub const ITEMS: &str = "items";
    pub const SCOPED_ARRAY_NAME: &str = "scopedArrayName";
    pub const WORKFLOW_GUID: &str = "workflowGuid";
    pub const WORKFLOW_LOCALE: &str = "workflowLocale";
    pub const APOS_DOC_ID: &str = "aposDocId";
    pub const APOS_LOCALE: &str = "aposLocale";
    pub const APOS_MODE: &str = "aposMode";
    /// Reserved bookkeeping key holding a document's legacy `_id`.
    /// Never renamed or rewritten by the reference pass.
    pub const LEGACY_ID: &str = "_legacyId";
    pub const LOCALES: &str = "locales";
}

/// Structural role of an object in the target content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaType {
    Doc,
    Widget,
    ArrayItem,
    Area,
}

impl MetaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Widget => "widget",
            Self::ArrayItem => "arrayItem",
            Self::Area => "area",
        }
    }

    /// Stamp this meta type onto an object
    pub fn tag(&self, object: &mut JsonMap) {
        object.insert(fields::META_TYPE.into(), JsonValue::from(self.as_str()));
    }

    /// Whether the object already carries this meta type
    pub fn is_tagged(&self, object: &JsonMap) -> bool {
        str_field(object, fields::META_TYPE) == Some(self.as_str())
    }
}

/// Draft or published variant of a logical document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Draft,
    Published,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may view a target document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Public,
    LoginRequired,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::LoginRequired => "loginRequired",
        }
    }

    /// Approximate visibility from the legacy `published` flag.
    /// Absent means public.
    pub fn from_legacy(doc: &JsonMap) -> Self {
        match doc.get(fields::PUBLISHED).and_then(JsonValue::as_bool) {
            Some(false) => Self::LoginRequired,
            _ => Self::Public,
        }
    }
}

/// Storage `_id` of a target document: `{aposDocId}:{locale}:{mode}`
pub fn storage_id(apos_doc_id: &str, locale: &str, mode: Mode) -> String {
    format!("{}:{}:{}", apos_doc_id, locale, mode)
}

/// Borrow a string field
pub fn str_field<'a>(object: &'a JsonMap, key: &str) -> Option<&'a str> {
    object.get(key).and_then(JsonValue::as_str)
}

/// Read a boolean field, treating absent or non-boolean values as false
pub fn flag(object: &JsonMap, key: &str) -> bool {
    object.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
}
