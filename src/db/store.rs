//! Storage seams for the two passes
//!
//! Both passes stream documents through forward-only cursors so memory stays
//! bounded to the document in hand.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::{JsonMap, Result};

/// Forward-only stream of documents
pub type DocStream = BoxStream<'static, Result<JsonMap>>;

/// Read side: the legacy content store
#[async_trait]
pub trait LegacySource: Send + Sync {
    /// Whether any document carries workflow metadata
    async fn has_workflow(&self) -> Result<bool>;

    /// Every document, ascending by tree `level` (documents without one first)
    async fn docs_by_level(&self) -> Result<DocStream>;

    /// Attachment metadata records
    async fn attachments(&self) -> Result<DocStream>;
}

/// Write side: the target content store
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn is_empty(&self) -> Result<bool>;

    /// Remove every document and attachment record
    async fn reset(&self) -> Result<()>;

    /// Insert a document. A later insert with the same `_id` wins.
    async fn insert_doc(&self, doc: JsonMap) -> Result<()>;

    /// Replace the stored document with the same `_id`. No stored match is
    /// a `Document` error.
    async fn replace_doc(&self, doc: JsonMap) -> Result<()>;

    /// Every stored document
    async fn docs(&self) -> Result<DocStream>;

    async fn insert_attachment(&self, attachment: JsonMap) -> Result<()>;

    /// Create the indexes the target content model queries by
    async fn ensure_indexes(&self) -> Result<()>;
}
