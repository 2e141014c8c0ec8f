//! Type and widget mapping tables
//!
//! Maps a legacy doc or widget type name to its target outcome: a plain
//! rename, a rewrite function that may reshape or reject the object, or an
//! outright rejection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::types::{fields, JsonMap, Result};

/// Reshape an object, or return `None` to drop it
///
/// Used for mapping-table function entries and for the whole-document and
/// widget post-transform hooks. Any `Fn(JsonMap) -> Option<JsonMap>` closure
/// qualifies; implement it directly when the rewrite needs to await.
#[async_trait]
pub trait Rewrite: Send + Sync {
    async fn rewrite(&self, object: JsonMap) -> Result<Option<JsonMap>>;
}

#[async_trait]
impl<F> Rewrite for F
where
    F: Fn(JsonMap) -> Option<JsonMap> + Send + Sync,
{
    async fn rewrite(&self, object: JsonMap) -> Result<Option<JsonMap>> {
        Ok(self(object))
    }
}

/// Outcome registered for one legacy type name
#[derive(Clone)]
pub enum TypeMapping {
    Rename(String),
    Rewrite(Arc<dyn Rewrite>),
    Reject,
}

impl TypeMapping {
    pub fn rewrite(f: impl Rewrite + 'static) -> Self {
        Self::Rewrite(Arc::new(f))
    }

    pub async fn apply(&self, mut object: JsonMap) -> Result<Option<JsonMap>> {
        match self {
            Self::Rename(target) => {
                object.insert(fields::TYPE.into(), JsonValue::from(target.as_str()));
                Ok(Some(object))
            }
            Self::Rewrite(f) => f.rewrite(object).await,
            Self::Reject => Ok(None),
        }
    }
}

impl fmt::Debug for TypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rename(target) => write!(f, "Rename({})", target),
            Self::Rewrite(_) => f.write_str("Rewrite(..)"),
            Self::Reject => f.write_str("Reject"),
        }
    }
}

/// Mapping entry as written in an options file: a target type name, or
/// `false` to reject. `true` clears any built-in entry for the type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MappingEntry {
    Rename(String),
    Keep(bool),
}

/// Legacy type name -> [`TypeMapping`]
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: HashMap<String, TypeMapping>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in doc type mappings for a stock legacy site
    pub fn builtin_doc_types() -> Self {
        let mut table = Self::new();
        // Permissions have no faithful equivalent; users are re-created by hand
        table.insert("apostrophe-user", TypeMapping::Reject);
        table.rename("apostrophe-global", "@apostrophecms/global");
        table.rename("apostrophe-image", "@apostrophecms/image");
        table.rename("apostrophe-file", "@apostrophecms/file");
        table.insert(
            "trash",
            TypeMapping::rewrite(archive_page as fn(JsonMap) -> Option<JsonMap>),
        );
        table
    }

    /// Built-in widget type mappings: the doc table plus core widgets
    pub fn builtin_widget_types() -> Self {
        let mut table = Self::builtin_doc_types();
        table.rename("apostrophe-rich-text", "@apostrophecms/rich-text");
        table.rename("apostrophe-video", "@apostrophecms/video");
        table.rename("apostrophe-html", "@apostrophecms/html");
        table.insert(
            "apostrophe-images",
            TypeMapping::rewrite(single_image_widget as fn(JsonMap) -> Option<JsonMap>),
        );
        table
    }

    pub fn insert(&mut self, legacy_type: impl Into<String>, mapping: TypeMapping) {
        self.entries.insert(legacy_type.into(), mapping);
    }

    pub fn rename(&mut self, legacy_type: impl Into<String>, target: impl Into<String>) {
        self.insert(legacy_type, TypeMapping::Rename(target.into()));
    }

    pub fn get(&self, legacy_type: &str) -> Option<&TypeMapping> {
        self.entries.get(legacy_type)
    }

    /// Legacy types whose rename produces `target`, sorted
    pub fn renamed_from(&self, target: &str) -> Vec<&str> {
        let mut legacy: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, mapping)| matches!(mapping, TypeMapping::Rename(t) if t == target))
            .map(|(legacy_type, _)| legacy_type.as_str())
            .collect();
        legacy.sort_unstable();
        legacy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay entries from an options file
    pub fn merge_entries(&mut self, entries: &HashMap<String, MappingEntry>) {
        for (legacy_type, entry) in entries {
            match entry {
                MappingEntry::Rename(target) => self.rename(legacy_type.clone(), target.clone()),
                MappingEntry::Keep(false) => self.insert(legacy_type.clone(), TypeMapping::Reject),
                MappingEntry::Keep(true) => {
                    self.entries.remove(legacy_type);
                }
            }
        }
    }

    /// Apply the entry for `legacy_type`; unmapped types pass through
    pub async fn apply(&self, legacy_type: &str, object: JsonMap) -> Result<Option<JsonMap>> {
        match self.get(legacy_type) {
            Some(mapping) => mapping.apply(object).await,
            None => Ok(Some(object)),
        }
    }
}

/// Legacy trash container becomes the archive page singleton
fn archive_page(mut doc: JsonMap) -> Option<JsonMap> {
    doc.insert(fields::TYPE.into(), json!("@apostrophecms/archive-page"));
    doc.insert(fields::SLUG.into(), json!("/archive"));
    doc.insert("parkedId".into(), json!("archive"));
    doc.insert(fields::ARCHIVED.into(), json!(false));
    doc.remove(fields::TRASH);
    Some(doc)
}

/// Legacy image slideshow becomes a single image widget holding the first
/// selected image. Empty slideshows are dropped.
fn single_image_widget(mut widget: JsonMap) -> Option<JsonMap> {
    let first = widget
        .get("pieceIds")
        .and_then(JsonValue::as_array)
        .and_then(|ids| ids.first())
        .cloned()?;
    widget.remove("pieceIds");
    widget.remove("_pieces");
    widget.remove("by");
    widget.insert(fields::TYPE.into(), json!("@apostrophecms/image"));
    widget.insert("imageIds".into(), json!([first]));
    Some(widget)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: JsonValue) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_rename_sets_type() {
        let table = MappingTable::builtin_doc_types();
        let doc = table
            .apply("apostrophe-image", map(json!({ "type": "apostrophe-image", "title": "Logo" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["type"], "@apostrophecms/image");
        assert_eq!(doc["title"], "Logo");
    }

    #[test]
    fn test_renamed_from_lists_legacy_sources() {
        let mut table = MappingTable::builtin_widget_types();
        table.rename("legacy-rte", "@apostrophecms/rich-text");
        assert_eq!(
            table.renamed_from("@apostrophecms/rich-text"),
            vec!["apostrophe-rich-text", "legacy-rte"]
        );
        // Function entries are not renames
        assert!(table.renamed_from("@apostrophecms/archive-page").is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_type_passes_through() {
        let table = MappingTable::builtin_doc_types();
        let doc = table
            .apply("blog-post", map(json!({ "type": "blog-post" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["type"], "blog-post");
    }

    #[tokio::test]
    async fn test_user_rejected() {
        let table = MappingTable::builtin_doc_types();
        let result = table
            .apply("apostrophe-user", map(json!({ "type": "apostrophe-user" })))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_trash_becomes_archive_page() {
        let table = MappingTable::builtin_doc_types();
        let doc = table
            .apply("trash", map(json!({ "type": "trash", "slug": "/trash", "trash": true })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["type"], "@apostrophecms/archive-page");
        assert_eq!(doc["slug"], "/archive");
        assert_eq!(doc["parkedId"], "archive");
        assert_eq!(doc["archived"], false);
        assert!(!doc.contains_key("trash"));
    }

    #[tokio::test]
    async fn test_slideshow_collapses_to_single_image() {
        let table = MappingTable::builtin_widget_types();
        let widget = table
            .apply(
                "apostrophe-images",
                map(json!({ "type": "apostrophe-images", "by": "id", "pieceIds": ["i1", "i2"] })),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget["type"], "@apostrophecms/image");
        assert_eq!(widget["imageIds"], json!(["i1"]));
        assert!(!widget.contains_key("pieceIds"));

        let empty = table
            .apply("apostrophe-images", map(json!({ "type": "apostrophe-images", "pieceIds": [] })))
            .await
            .unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_merge_entries_overrides_builtins() {
        let mut table = MappingTable::builtin_doc_types();
        let entries: HashMap<String, MappingEntry> = serde_json::from_value(json!({
            "apostrophe-user": "@apostrophecms/user",
            "event": false,
            "apostrophe-file": true
        }))
        .unwrap();
        table.merge_entries(&entries);

        assert!(matches!(table.get("apostrophe-user"), Some(TypeMapping::Rename(t)) if t == "@apostrophecms/user"));
        assert!(matches!(table.get("event"), Some(TypeMapping::Reject)));
        assert!(table.get("apostrophe-file").is_none());
    }

    #[tokio::test]
    async fn test_closure_rewrite() {
        let mut table = MappingTable::new();
        table.insert(
            "event",
            TypeMapping::rewrite(|mut doc: JsonMap| {
                doc.insert("type".into(), json!("calendar-event"));
                Some(doc)
            }),
        );
        let doc = table.apply("event", map(json!({ "type": "event" }))).await.unwrap().unwrap();
        assert_eq!(doc["type"], "calendar-event");
    }
}
