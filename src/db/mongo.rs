//! MongoDB client and store implementations
//!
//! Documents cross the storage boundary as relaxed extended JSON, so dates
//! and other BSON-specific values survive the trip through the pipeline.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::StreamExt;
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::types::{fields, str_field, JsonMap, MigrateError, Result};

use super::store::{DocStream, LegacySource, TargetStore};
use super::{ATTACHMENTS_COLLECTION, DOCS_COLLECTION};

/// MongoDB client wrapper bound to one database
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the database answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB database '{}'", db_name);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MigrateError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Raw BSON collection in this database
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection::<Document>(name)
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// BSON document -> JSON map (relaxed extended JSON)
pub fn to_json_map(doc: Document) -> Result<JsonMap> {
    match Bson::Document(doc).into_relaxed_extjson() {
        JsonValue::Object(map) => Ok(map),
        other => Err(MigrateError::Database(format!(
            "Expected a document, got {}",
            other
        ))),
    }
}

/// JSON map -> BSON document, parsing extended JSON markers back
pub fn to_bson_document(map: JsonMap) -> Result<Document> {
    match Bson::try_from(JsonValue::Object(map))? {
        Bson::Document(doc) => Ok(doc),
        other => Err(MigrateError::Database(format!(
            "Expected a document, got {}",
            other
        ))),
    }
}

fn stream_cursor(cursor: mongodb::Cursor<Document>) -> DocStream {
    cursor
        .map(|result| result.map_err(MigrateError::from).and_then(to_json_map))
        .boxed()
}

fn id_filter(doc: &JsonMap) -> Result<Document> {
    let id = str_field(doc, fields::ID)
        .ok_or_else(|| MigrateError::document("<unknown>", "missing string _id"))?;
    Ok(doc! { "_id": id })
}

/// Index definitions for the target content collection
fn target_doc_indices() -> Vec<(Document, Option<IndexOptions>)> {
    vec![
        (doc! { "aposDocId": 1 }, None),
        (doc! { "aposLocale": 1 }, None),
        (doc! { "path": 1 }, None),
        (
            doc! { "slug": 1, "aposLocale": 1 },
            Some(IndexOptions::builder().sparse(true).build()),
        ),
    ]
}

/// Legacy store read through the `aposDocs` and `aposAttachments` collections
pub struct MongoLegacySource {
    docs: Collection<Document>,
    attachments: Collection<Document>,
}

impl MongoLegacySource {
    pub fn new(client: &MongoClient) -> Self {
        Self {
            docs: client.collection(DOCS_COLLECTION),
            attachments: client.collection(ATTACHMENTS_COLLECTION),
        }
    }
}

#[async_trait]
impl LegacySource for MongoLegacySource {
    async fn has_workflow(&self) -> Result<bool> {
        let count = self
            .docs
            .count_documents(doc! { "workflowGuid": { "$exists": true } })
            .limit(1)
            .await?;
        Ok(count > 0)
    }

    async fn docs_by_level(&self) -> Result<DocStream> {
        let cursor = self
            .docs
            .find(doc! {})
            .sort(doc! { "level": 1, "_id": 1 })
            .allow_disk_use(true)
            .await?;
        Ok(stream_cursor(cursor))
    }

    async fn attachments(&self) -> Result<DocStream> {
        let cursor = self.attachments.find(doc! {}).await?;
        Ok(stream_cursor(cursor))
    }
}

/// Target store written through the `aposDocs` and `aposAttachments` collections
pub struct MongoTargetStore {
    docs: Collection<Document>,
    attachments: Collection<Document>,
}

impl MongoTargetStore {
    pub fn new(client: &MongoClient) -> Self {
        Self {
            docs: client.collection(DOCS_COLLECTION),
            attachments: client.collection(ATTACHMENTS_COLLECTION),
        }
    }
}

#[async_trait]
impl TargetStore for MongoTargetStore {
    async fn is_empty(&self) -> Result<bool> {
        let docs = self.docs.estimated_document_count().await?;
        let attachments = self.attachments.estimated_document_count().await?;
        Ok(docs == 0 && attachments == 0)
    }

    async fn reset(&self) -> Result<()> {
        warn!("Dropping target collections before migration");
        self.docs.drop().await?;
        self.attachments.drop().await?;
        Ok(())
    }

    async fn insert_doc(&self, doc: JsonMap) -> Result<()> {
        let filter = id_filter(&doc)?;
        let replacement = to_bson_document(doc)?;
        let result = self.docs.replace_one(filter.clone(), replacement).upsert(true).await?;
        if result.matched_count > 0 {
            warn!(id = ?filter.get("_id"), "Target document overwritten by a later insert");
        }
        Ok(())
    }

    async fn replace_doc(&self, doc: JsonMap) -> Result<()> {
        let filter = id_filter(&doc)?;
        let id = str_field(&doc, fields::ID).unwrap_or_default().to_string();
        let replacement = to_bson_document(doc)?;
        let result = self.docs.replace_one(filter, replacement).await?;
        if result.matched_count == 0 {
            return Err(MigrateError::document(id, "no stored document to replace"));
        }
        Ok(())
    }

    async fn docs(&self) -> Result<DocStream> {
        let cursor = self.docs.find(doc! {}).await?;
        Ok(stream_cursor(cursor))
    }

    async fn insert_attachment(&self, attachment: JsonMap) -> Result<()> {
        self.attachments.insert_one(to_bson_document(attachment)?).await?;
        Ok(())
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let indices: Vec<IndexModel> = target_doc_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.docs
            .create_indexes(indices)
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Store round trips need a running MongoDB instance; only the
    // conversions are covered here.

    #[test]
    fn test_bson_json_round_trip_keeps_dates() {
        let original = doc! {
            "_id": "x",
            "level": 2_i32,
            "updatedAt": bson::DateTime::from_millis(1_600_000_000_000),
            "tags": ["a", "b"],
        };

        let json = to_json_map(original.clone()).unwrap();
        assert_eq!(json["_id"], "x");
        assert_eq!(json["level"], 2);
        assert!(json["updatedAt"].get("$date").is_some());

        let back = to_bson_document(json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_id_filter_requires_string_id() {
        let with_id = json!({ "_id": "a:en:draft" }).as_object().cloned().unwrap();
        assert_eq!(id_filter(&with_id).unwrap(), doc! { "_id": "a:en:draft" });

        let without = JsonMap::new();
        assert!(id_filter(&without).is_err());
    }

    #[test]
    fn test_target_indices_cover_identity_fields() {
        let keys: Vec<String> = target_doc_indices()
            .iter()
            .flat_map(|(keys, _)| keys.keys().cloned().collect::<Vec<_>>())
            .collect();
        assert!(keys.contains(&"aposDocId".to_string()));
        assert!(keys.contains(&"aposLocale".to_string()));
        assert!(keys.contains(&"path".to_string()));
    }
}
