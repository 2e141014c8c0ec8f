//! In-memory store
//!
//! Implements both storage seams over plain vectors. Streams are taken from a
//! snapshot, so pass 2 may replace documents while it iterates.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::types::{fields, str_field, JsonMap, MigrateError, Result};

use super::store::{DocStream, LegacySource, TargetStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    legacy_docs: Vec<JsonMap>,
    legacy_attachments: Vec<JsonMap>,
    docs: RwLock<Vec<JsonMap>>,
    attachments: RwLock<Vec<JsonMap>>,
    replacements: RwLock<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose legacy side holds `docs`
    pub fn with_legacy(docs: Vec<JsonMap>) -> Self {
        Self {
            legacy_docs: docs,
            ..Self::default()
        }
    }

    pub fn with_legacy_attachments(mut self, attachments: Vec<JsonMap>) -> Self {
        self.legacy_attachments = attachments;
        self
    }

    /// Snapshot of the target documents in insertion order
    pub async fn target_docs(&self) -> Vec<JsonMap> {
        self.docs.read().await.clone()
    }

    pub async fn target_doc(&self, id: &str) -> Option<JsonMap> {
        self.docs
            .read()
            .await
            .iter()
            .find(|doc| str_field(doc, fields::ID) == Some(id))
            .cloned()
    }

    pub async fn target_attachments(&self) -> Vec<JsonMap> {
        self.attachments.read().await.clone()
    }

    /// Number of `replace_doc` calls served
    pub async fn replacements(&self) -> usize {
        *self.replacements.read().await
    }
}

fn level(doc: &JsonMap) -> i64 {
    doc.get(fields::LEVEL).and_then(JsonValue::as_i64).unwrap_or(-1)
}

fn snapshot(docs: Vec<JsonMap>) -> DocStream {
    stream::iter(docs.into_iter().map(Ok)).boxed()
}

fn require_id(doc: &JsonMap) -> Result<String> {
    str_field(doc, fields::ID)
        .map(str::to_string)
        .ok_or_else(|| MigrateError::document("<unknown>", "missing string _id"))
}

#[async_trait]
impl LegacySource for MemoryStore {
    async fn has_workflow(&self) -> Result<bool> {
        Ok(self
            .legacy_docs
            .iter()
            .any(|doc| doc.contains_key(fields::WORKFLOW_GUID)))
    }

    async fn docs_by_level(&self) -> Result<DocStream> {
        let mut docs = self.legacy_docs.clone();
        // Stable: equal levels keep their stored order
        docs.sort_by_key(level);
        Ok(snapshot(docs))
    }

    async fn attachments(&self) -> Result<DocStream> {
        Ok(snapshot(self.legacy_attachments.clone()))
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.docs.read().await.is_empty() && self.attachments.read().await.is_empty())
    }

    async fn reset(&self) -> Result<()> {
        self.docs.write().await.clear();
        self.attachments.write().await.clear();
        Ok(())
    }

    async fn insert_doc(&self, doc: JsonMap) -> Result<()> {
        let id = require_id(&doc)?;
        let mut docs = self.docs.write().await;
        match docs.iter_mut().find(|d| str_field(d, fields::ID) == Some(id.as_str())) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        Ok(())
    }

    async fn replace_doc(&self, doc: JsonMap) -> Result<()> {
        let id = require_id(&doc)?;
        let mut docs = self.docs.write().await;
        let Some(existing) = docs.iter_mut().find(|d| str_field(d, fields::ID) == Some(id.as_str()))
        else {
            return Err(MigrateError::document(id, "no stored document to replace"));
        };
        *existing = doc;
        *self.replacements.write().await += 1;
        Ok(())
    }

    async fn docs(&self) -> Result<DocStream> {
        Ok(snapshot(self.docs.read().await.clone()))
    }

    async fn insert_attachment(&self, attachment: JsonMap) -> Result<()> {
        self.attachments.write().await.push(attachment);
        Ok(())
    }

    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn map(value: JsonValue) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_legacy_docs_sorted_by_level() {
        let store = MemoryStore::with_legacy(vec![
            map(json!({ "_id": "b", "level": 2 })),
            map(json!({ "_id": "piece" })),
            map(json!({ "_id": "a", "level": 1 })),
            map(json!({ "_id": "root", "level": 0 })),
        ]);

        let ids: Vec<String> = store
            .docs_by_level()
            .await
            .unwrap()
            .map_ok(|doc| doc["_id"].as_str().unwrap().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids, vec!["piece", "root", "a", "b"]);
    }

    #[tokio::test]
    async fn test_insert_last_write_wins() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await.unwrap());

        store.insert_doc(map(json!({ "_id": "x", "v": 1 }))).await.unwrap();
        store.insert_doc(map(json!({ "_id": "x", "v": 2 }))).await.unwrap();

        let docs = store.target_docs().await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["v"], 2);
    }

    #[tokio::test]
    async fn test_replace_and_reset() {
        let store = MemoryStore::new();
        store.insert_doc(map(json!({ "_id": "x", "v": 1 }))).await.unwrap();
        store.replace_doc(map(json!({ "_id": "x", "v": 3 }))).await.unwrap();
        let err = store.replace_doc(map(json!({ "_id": "missing" }))).await.unwrap_err();
        assert!(matches!(err, MigrateError::Document { .. }));

        assert_eq!(store.target_doc("x").await.unwrap()["v"], 3);
        assert_eq!(store.replacements().await, 1);

        store.reset().await.unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_workflow_detection() {
        let plain = MemoryStore::with_legacy(vec![map(json!({ "_id": "a" }))]);
        assert!(!plain.has_workflow().await.unwrap());

        let workflow = MemoryStore::with_legacy(vec![map(json!({ "_id": "a", "workflowGuid": "G" }))]);
        assert!(workflow.has_workflow().await.unwrap());
    }
}
