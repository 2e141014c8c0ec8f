//! Database layer
//!
//! MongoDB access for the legacy and target stores, plus an in-memory store
//! used by tests and dry runs.

pub mod memory;
pub mod mongo;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoLegacySource, MongoTargetStore};
pub use store::{DocStream, LegacySource, TargetStore};

/// Content collection name in both stores
pub const DOCS_COLLECTION: &str = "aposDocs";

/// Attachment metadata collection name in both stores
pub const ATTACHMENTS_COLLECTION: &str = "aposAttachments";
