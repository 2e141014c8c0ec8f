//! Pass 1: document migration
//!
//! Streams the legacy corpus in tree order and, for each document, settles
//! its identity, reshapes it against its schema, rewrites its page path,
//! runs the host hook and type mapping, then inserts the result (plus a
//! published twin when one must be synthesized).

use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::db::{LegacySource, TargetStore};
use crate::report::{DropStage, RunReport};
use crate::types::{
    fields, flag, str_field, JsonMap, MetaType, MigrateError, Mode, Result, Visibility,
};

use super::identity::{IdentityResolver, Resolved};
use super::mapping::{MappingTable, Rewrite, TypeMapping};
use super::path::{is_page, PathRewriter};
use super::state::{IdentityMap, IdentityMapBuilder};
use super::transform::SchemaTransformer;

const PROGRESS_INTERVAL: usize = 1000;

/// What became of one legacy document
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Records to insert, draft first
    Insert(Vec<JsonMap>),
    Dropped(DropStage),
}

/// Result of a completed pass 1
#[derive(Debug)]
pub struct PassOne {
    pub ids: IdentityMap,
    pub report: RunReport,
}

pub struct DocumentMigrator {
    resolver: IdentityResolver,
    transformer: Arc<SchemaTransformer>,
    doc_types: MappingTable,
    doc_hook: Option<Arc<dyn Rewrite>>,
    paths: PathRewriter,
    ids: IdentityMapBuilder,
    report: RunReport,
}

impl DocumentMigrator {
    pub fn new(
        resolver: IdentityResolver,
        transformer: Arc<SchemaTransformer>,
        doc_types: MappingTable,
        paths: PathRewriter,
    ) -> Self {
        Self {
            resolver,
            transformer,
            doc_types,
            doc_hook: None,
            paths,
            ids: IdentityMapBuilder::new(),
            report: RunReport::new(),
        }
    }

    /// Whole-document hook run after path rewriting, before type mapping
    pub fn with_doc_hook(mut self, hook: Option<Arc<dyn Rewrite>>) -> Self {
        self.doc_hook = hook;
        self
    }

    /// Continue filling an existing report
    pub fn with_report(mut self, report: RunReport) -> Self {
        self.report = report;
        self
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn identities(&self) -> &IdentityMapBuilder {
        &self.ids
    }

    /// Run pass 1 over the whole legacy corpus
    pub async fn run(mut self, source: &dyn LegacySource, target: &dyn TargetStore) -> Result<PassOne> {
        info!("Pass 1: migrating documents in tree order");

        let mut docs = source.docs_by_level().await?;
        while let Some(legacy) = docs.try_next().await? {
            self.report.docs_read += 1;
            let legacy_id = str_field(&legacy, fields::ID).unwrap_or("<unknown>").to_string();

            match self.upgrade_doc(legacy).await? {
                Outcome::Insert(records) => {
                    for record in records {
                        if is_page(&record) {
                            debug!(
                                id = %str_field(&record, fields::ID).unwrap_or_default(),
                                slug = %str_field(&record, fields::SLUG).unwrap_or_default(),
                                "Inserting page"
                            );
                        }
                        self.report.record_inserted(&record);
                        target.insert_doc(record).await?;
                    }
                }
                Outcome::Dropped(stage) => {
                    debug!(id = %legacy_id, stage = %stage, "Document dropped");
                }
            }

            if self.report.docs_read % PROGRESS_INTERVAL == 0 {
                info!(
                    read = self.report.docs_read,
                    inserted = self.report.docs_inserted,
                    "Pass 1 progress"
                );
            }
        }

        self.report.widgets_dropped = self.transformer.widgets_dropped();
        self.report.identity_entries = self.ids.len();
        info!(
            read = self.report.docs_read,
            inserted = self.report.docs_inserted,
            identities = self.ids.len(),
            "Pass 1 complete"
        );

        Ok(PassOne {
            ids: self.ids.freeze(),
            report: self.report,
        })
    }

    /// Migrate one legacy document without touching storage
    pub async fn upgrade_doc(&mut self, legacy: JsonMap) -> Result<Outcome> {
        let legacy_id = str_field(&legacy, fields::ID).unwrap_or_default().to_string();
        let legacy_type = str_field(&legacy, fields::TYPE).unwrap_or_default().to_string();

        let mut doc = legacy;
        MetaType::Doc.tag(&mut doc);
        let archived = flag(&doc, fields::TRASH);
        doc.insert(fields::ARCHIVED.into(), JsonValue::Bool(archived));
        let visibility = Visibility::from_legacy(&doc);
        doc.insert(fields::VISIBILITY.into(), JsonValue::from(visibility.as_str()));

        let Some(Resolved {
            doc,
            replicate_to_published,
        }) = self.resolver.resolve(doc)?
        else {
            return Ok(self.dropped(DropStage::Identity));
        };

        if self.resolver.is_site(&legacy_type) {
            self.note_site_locales(&doc);
        }

        let transformer = Arc::clone(&self.transformer);
        let Some(schema) = transformer.registry().doc_schema(&legacy_type) else {
            return Ok(self.dropped(DropStage::Schema));
        };
        let scope = self.doc_scope(&legacy_type);
        let mut doc = transformer.upgrade_document(schema, doc, &scope).await?;

        if is_page(&doc) {
            self.paths.rewrite(&mut doc);
        }

        if let Some(hook) = self.doc_hook.clone() {
            match hook.rewrite(doc).await? {
                Some(rewritten) => doc = rewritten,
                None => return Ok(self.dropped(DropStage::DocHook)),
            }
        }

        let Some(doc) = self.doc_types.apply(&legacy_type, doc).await? else {
            return Ok(self.dropped(DropStage::TypeMapping));
        };

        if let Some(apos_doc_id) = str_field(&doc, fields::APOS_DOC_ID) {
            self.ids.record(legacy_id.as_str(), apos_doc_id);
        }

        let records = if replicate_to_published {
            let published = published_twin(&doc)?;
            vec![doc, published]
        } else {
            vec![doc]
        };
        Ok(Outcome::Insert(records))
    }

    fn dropped(&mut self, stage: DropStage) -> Outcome {
        self.report.record_drop(stage);
        Outcome::Dropped(stage)
    }

    /// Array items of a document are scoped by its target type name
    fn doc_scope(&self, legacy_type: &str) -> String {
        match self.doc_types.get(legacy_type) {
            Some(TypeMapping::Rename(target)) => target.clone(),
            _ => legacy_type.to_string(),
        }
    }

    fn note_site_locales(&mut self, site: &JsonMap) {
        let Some(JsonValue::Array(locales)) = site.get(fields::LOCALES) else {
            return;
        };
        for locale in locales {
            let name = match locale {
                JsonValue::String(name) => Some(name.as_str()),
                JsonValue::Object(entry) => str_field(entry, "name"),
                _ => None,
            };
            if let Some(name) = name {
                let mapped = self.resolver.map_locale(name);
                if mapped != name {
                    self.report.record_locale_remap(name, mapped);
                }
            }
        }
    }
}

/// Published copy of a draft: same content, `published` coordinates
fn published_twin(draft: &JsonMap) -> Result<JsonMap> {
    let legacy_id = str_field(draft, fields::LEGACY_ID).unwrap_or("<unknown>");
    let draft_suffix = format!(":{}", Mode::Draft);
    let id = str_field(draft, fields::ID)
        .and_then(|id| id.strip_suffix(&draft_suffix))
        .ok_or_else(|| MigrateError::document(legacy_id, "draft _id lost its mode suffix"))?;
    let locale = str_field(draft, fields::APOS_LOCALE)
        .and_then(|locale| locale.strip_suffix(&draft_suffix))
        .ok_or_else(|| MigrateError::document(legacy_id, "draft aposLocale lost its mode suffix"))?;

    let mut published = draft.clone();
    published.insert(
        fields::ID.into(),
        JsonValue::from(format!("{}:{}", id, Mode::Published)),
    );
    published.insert(
        fields::APOS_LOCALE.into(),
        JsonValue::from(format!("{}:{}", locale, Mode::Published)),
    );
    published.insert(fields::APOS_MODE.into(), JsonValue::from(Mode::Published.as_str()));
    Ok(published)
}
