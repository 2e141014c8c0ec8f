//! Configuration for the upgrade task
//!
//! CLI arguments and environment variables via clap, plus an optional JSON
//! options file carrying the type, widget and locale mapping tables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::migrate::identity::IdentityConfig;
use crate::migrate::mapping::{MappingEntry, MappingTable};
use crate::types::{MigrateError, Result};

/// Upgrade legacy Apostrophe content into an A3 database
///
/// Runs two passes: documents are migrated in tree order, then every
/// cross-document reference is rewritten to the new identities.
#[derive(Parser, Debug, Clone)]
#[command(name = "apos-upgrade")]
#[command(about = "Migrate legacy Apostrophe content to the A3 content model")]
pub struct Args {
    /// Legacy MongoDB connection URI
    #[arg(long, env = "SOURCE_MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub source_uri: String,

    /// Legacy database name (the legacy project's short name)
    #[arg(long, env = "SOURCE_MONGODB_DB")]
    pub source_db: String,

    /// Target MongoDB URI; its path names the new database
    #[arg(long = "a3-db", env = "TARGET_MONGODB_URI")]
    pub target_uri: Option<String>,

    /// Allow dropping a non-empty target database before migrating
    #[arg(long, env = "TARGET_DROP", default_value = "false")]
    pub drop: bool,

    /// JSON export of every doc type and widget type schema
    #[arg(long, env = "SCHEMA_REGISTRY")]
    pub schemas: PathBuf,

    /// JSON file with mapping tables (mapDocTypes, mapWidgetTypes, mapLocales, ...)
    #[arg(long, env = "MIGRATION_OPTIONS")]
    pub options: Option<PathBuf>,

    /// Locale assigned to content from sites without workflow
    #[arg(long, env = "DEFAULT_LOCALE", default_value = "en")]
    pub default_locale: String,

    /// Whether the legacy site used the workflow module
    #[arg(long, env = "WORKFLOW_MODE", value_enum, default_value_t = WorkflowMode::Auto)]
    pub workflow: WorkflowMode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

/// How to decide whether the legacy site ran the workflow module
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowMode {
    /// Probe the legacy store for documents carrying workflow metadata
    #[default]
    Auto,
    On,
    Off,
}

impl Args {
    /// Target database name taken from the `--a3-db` URI
    pub fn target_db(&self) -> Option<String> {
        self.target_uri.as_deref().and_then(database_name_from_uri)
    }

    /// Validate the invocation before anything is touched
    pub fn validate(&self) -> Result<()> {
        let uri = self.target_uri.as_deref().ok_or_else(|| {
            MigrateError::Config(
                "You must specify --a3-db, a MongoDB URI for the new database".to_string(),
            )
        })?;

        let target_db = database_name_from_uri(uri).ok_or_else(|| {
            MigrateError::Config("The --a3-db URI must name a database in its path".to_string())
        })?;

        if target_db == self.source_db {
            return Err(MigrateError::UnsafeTarget(
                "For prevention of data loss, the target database name must not match the legacy database name"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Database name from the path of a `mongodb://` or `mongodb+srv://` URI
pub fn database_name_from_uri(uri: &str) -> Option<String> {
    let rest = uri
        .strip_prefix("mongodb://")
        .or_else(|| uri.strip_prefix("mongodb+srv://"))?;
    let rest = rest.split('?').next().unwrap_or(rest);
    let hosts = rest.rsplit_once('@').map(|(_, hosts)| hosts).unwrap_or(rest);
    let (_, path) = hosts.split_once('/')?;
    let name = path.trim_end_matches('/');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Host-supplied mapping tables and identity settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigrationOptions {
    pub default_locale: Option<String>,
    pub map_doc_types: HashMap<String, MappingEntry>,
    pub map_widget_types: HashMap<String, MappingEntry>,
    /// Legacy locale -> target locale; the `default` entry also names the
    /// locale for sites without workflow
    pub map_locales: HashMap<String, String>,
    /// Live locale -> slug prefix used by the legacy workflow
    pub workflow_prefixes: HashMap<String, String>,
    pub exempt_types: Option<Vec<String>>,
    pub site_types: Option<Vec<String>>,
    pub archive_types: Option<Vec<String>>,
}

impl MigrationOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("Cannot read options file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            MigrateError::Config(format!("Invalid options file {}: {}", path.display(), e))
        })
    }

    /// Locale for content without workflow metadata
    pub fn resolve_default_locale(&self, fallback: &str) -> String {
        self.map_locales
            .get("default")
            .or(self.default_locale.as_ref())
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn identity_config(&self, default_locale: &str, workflow: bool) -> IdentityConfig {
        let defaults = IdentityConfig::default();
        IdentityConfig {
            default_locale: default_locale.to_string(),
            workflow,
            map_locales: self.map_locales.clone(),
            exempt_types: self.exempt_types.clone().unwrap_or(defaults.exempt_types),
            site_types: self.site_types.clone().unwrap_or(defaults.site_types),
            archive_types: self.archive_types.clone().unwrap_or(defaults.archive_types),
        }
    }

    /// Built-in doc type table overlaid with `mapDocTypes`
    pub fn doc_types(&self) -> MappingTable {
        let mut table = MappingTable::builtin_doc_types();
        table.merge_entries(&self.map_doc_types);
        table
    }

    /// Built-in widget type table overlaid with `mapWidgetTypes`
    pub fn widget_types(&self) -> MappingTable {
        let mut table = MappingTable::builtin_widget_types();
        table.merge_entries(&self.map_widget_types);
        table
    }
}
