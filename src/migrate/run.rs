//! Whole-run orchestration
//!
//! Safety check, pass 1, pass 2, then attachments and indexes. Pass 2 only
//! receives the frozen identity map, so it cannot start before pass 1 ends.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{MigrationOptions, WorkflowMode};
use crate::db::{LegacySource, TargetStore};
use crate::report::RunReport;
use crate::schema::{FieldKind, SchemaRegistry};
use crate::types::{MigrateError, Result};

use super::attachments::copy_attachments;
use super::documents::{DocumentMigrator, PassOne};
use super::fields::{FieldHandler, FieldHandlers};
use super::identity::IdentityResolver;
use super::mapping::{MappingTable, Rewrite, TypeMapping};
use super::path::PathRewriter;
use super::references::ReferenceRewriter;
use super::transform::SchemaTransformer;

const FALLBACK_LOCALE: &str = "en";

pub struct MigrationRun {
    registry: Arc<SchemaRegistry>,
    options: MigrationOptions,
    default_locale: String,
    workflow: WorkflowMode,
    allow_drop: bool,
    doc_types: MappingTable,
    widget_types: MappingTable,
    handlers: FieldHandlers,
    doc_hook: Option<Arc<dyn Rewrite>>,
    widget_hook: Option<Arc<dyn Rewrite>>,
}

impl MigrationRun {
    pub fn new(registry: SchemaRegistry, options: MigrationOptions) -> Self {
        let default_locale = options.resolve_default_locale(FALLBACK_LOCALE);
        let doc_types = options.doc_types();
        let widget_types = options.widget_types();
        Self {
            registry: Arc::new(registry),
            options,
            default_locale,
            workflow: WorkflowMode::Auto,
            allow_drop: false,
            doc_types,
            widget_types,
            handlers: FieldHandlers::standard(),
            doc_hook: None,
            widget_hook: None,
        }
    }

    /// Locale used when neither `mapLocales.default` nor `defaultLocale` is set
    pub fn with_default_locale(mut self, fallback: &str) -> Self {
        self.default_locale = self.options.resolve_default_locale(fallback);
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowMode) -> Self {
        self.workflow = workflow;
        self
    }

    /// Permit resetting a non-empty target
    pub fn allow_drop(mut self, allow: bool) -> Self {
        self.allow_drop = allow;
        self
    }

    pub fn with_doc_mapping(mut self, legacy_type: impl Into<String>, mapping: TypeMapping) -> Self {
        self.doc_types.insert(legacy_type, mapping);
        self
    }

    pub fn with_widget_mapping(mut self, legacy_type: impl Into<String>, mapping: TypeMapping) -> Self {
        self.widget_types.insert(legacy_type, mapping);
        self
    }

    pub fn with_field_handler(mut self, kind: FieldKind, handler: Arc<dyn FieldHandler>) -> Self {
        self.handlers.register(kind, handler);
        self
    }

    /// Hook applied to every document before its type mapping
    pub fn transform_doc(mut self, hook: impl Rewrite + 'static) -> Self {
        self.doc_hook = Some(Arc::new(hook));
        self
    }

    /// Hook applied to every widget before its type mapping
    pub fn transform_widget(mut self, hook: impl Rewrite + 'static) -> Self {
        self.widget_hook = Some(Arc::new(hook));
        self
    }

    pub async fn run(&self, source: &dyn LegacySource, target: &dyn TargetStore) -> Result<RunReport> {
        self.check_target(target).await?;

        let workflow = match self.workflow {
            WorkflowMode::Auto => source.has_workflow().await?,
            WorkflowMode::On => true,
            WorkflowMode::Off => false,
        };
        info!(
            workflow,
            default_locale = %self.default_locale,
            doc_types = self.doc_types.len(),
            widget_types = self.widget_types.len(),
            "Starting upgrade"
        );

        let mut report = RunReport::new();
        report.workflow = workflow;

        let transformer = SchemaTransformer::new(Arc::clone(&self.registry), self.widget_types.clone())
            .with_handlers(self.handlers.clone())
            .with_widget_hook(self.widget_hook.clone());
        let resolver = IdentityResolver::new(self.options.identity_config(&self.default_locale, workflow));
        let paths = PathRewriter::new(workflow, self.options.workflow_prefixes.clone());

        let PassOne { ids, mut report } =
            DocumentMigrator::new(resolver, Arc::new(transformer), self.doc_types.clone(), paths)
                .with_doc_hook(self.doc_hook.clone())
                .with_report(report)
                .run(source, target)
                .await?;

        report.docs_rewritten = ReferenceRewriter::new(ids).run(target).await?;
        report.attachments_copied = copy_attachments(source, target).await?;
        target.ensure_indexes().await?;

        report.finish();
        info!(
            inserted = report.docs_inserted,
            rewritten = report.docs_rewritten,
            "Upgrade complete"
        );
        Ok(report)
    }

    async fn check_target(&self, target: &dyn TargetStore) -> Result<()> {
        if target.is_empty().await? {
            return Ok(());
        }
        if !self.allow_drop {
            return Err(MigrateError::UnsafeTarget(
                "The target database is not empty. Pass --drop to replace its contents".to_string(),
            ));
        }
        warn!("Dropping existing target content");
        target.reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::schema::FieldDef;
    use crate::types::JsonMap;
    use serde_json::{json, Value as JsonValue};

    fn map(value: JsonValue) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_doc_type("home-page", vec![])
            .with_doc_type(
                "article",
                vec![FieldDef::new("_author", FieldKind::JoinByOne)],
            )
            .with_doc_type("apostrophe-user", vec![])
    }

    #[tokio::test]
    async fn test_refuses_non_empty_target() {
        let store = MemoryStore::new();
        store.insert_doc(map(json!({ "_id": "existing" }))).await.unwrap();

        let err = MigrationRun::new(registry(), MigrationOptions::default())
            .run(&store, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::UnsafeTarget(_)));
        assert!(store.target_doc("existing").await.is_some());
    }

    #[tokio::test]
    async fn test_drop_resets_target() {
        let store = MemoryStore::with_legacy(vec![map(json!({
            "_id": "home", "type": "home-page", "slug": "/", "path": "/", "level": 0
        }))]);
        store.insert_doc(map(json!({ "_id": "existing" }))).await.unwrap();

        let report = MigrationRun::new(registry(), MigrationOptions::default())
            .allow_drop(true)
            .run(&store, &store)
            .await
            .unwrap();
        assert!(store.target_doc("existing").await.is_none());
        assert_eq!(report.docs_inserted, 2);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_forced_workflow_rewrites_references() {
        let store = MemoryStore::with_legacy(vec![
            map(json!({
                "_id": "u1", "type": "apostrophe-user",
                "workflowGuid": "U1", "workflowLocale": "default-draft"
            })),
            map(json!({
                "_id": "a1", "type": "article", "authorId": "u1",
                "workflowGuid": "A1", "workflowLocale": "default-draft"
            })),
        ]);
        let options: MigrationOptions =
            serde_json::from_value(json!({ "mapLocales": { "default": "en" } })).unwrap();

        let report = MigrationRun::new(registry(), options)
            .with_workflow(WorkflowMode::On)
            .with_doc_mapping("apostrophe-user", TypeMapping::Rename("@apostrophecms/user".into()))
            .run(&store, &store)
            .await
            .unwrap();

        assert!(report.workflow);
        let article = store.target_doc("A1:en:draft").await.unwrap();
        assert_eq!(article["authorIds"], json!(["U1"]));
    }
}
