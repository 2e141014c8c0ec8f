//! apos-upgrade - legacy Apostrophe content migration
//!
//! Reads a legacy (A2) content database and writes an equivalent corpus
//! for the A3 content model into a fresh database.
//!
//! ## Pipeline
//!
//! - **Pass 1**: documents are streamed in tree order, given locale and mode
//!   aware identities, reshaped against their schemas and inserted
//! - **Pass 2**: every stored document has its legacy id references
//!   rewritten through the identity map built by pass 1
//! - **Attachments**: metadata records are copied with the archive rename

pub mod config;
pub mod db;
pub mod migrate;
pub mod report;
pub mod schema;
pub mod types;

pub use config::{Args, MigrationOptions, WorkflowMode};
pub use migrate::MigrationRun;
pub use report::RunReport;
pub use types::{MigrateError, Result};
