//! The two-pass upgrade pipeline
//!
//! Pass 1 ([`documents`]) reshapes and inserts every legacy document while
//! building the identity map. Pass 2 ([`references`]) rewrites references
//! against the frozen map. [`run`] sequences both.

pub mod attachments;
pub mod documents;
pub mod fields;
pub mod identity;
pub mod mapping;
pub mod path;
pub mod references;
pub mod run;
pub mod state;
pub mod transform;

pub use attachments::{copy_attachments, upgrade_attachment};
pub use documents::{DocumentMigrator, Outcome, PassOne};
pub use fields::{FieldHandler, FieldHandlers};
pub use identity::{IdentityConfig, IdentityResolver, Resolved};
pub use mapping::{MappingEntry, MappingTable, Rewrite, TypeMapping};
pub use path::PathRewriter;
pub use references::ReferenceRewriter;
pub use run::MigrationRun;
pub use state::{IdentityMap, IdentityMapBuilder};
pub use transform::SchemaTransformer;
