//! Identity resolution
//!
//! Assigns each legacy document its permanent `aposDocId`, its locale/mode
//! coordinates and its storage `_id`, or vetoes it.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::types::{fields, flag, storage_id, str_field, JsonMap, MigrateError, Mode, Result};

const DRAFT_SUFFIX: &str = "-draft";

/// Inputs that decide how identities are assigned
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Target locale for sites without workflow
    pub default_locale: String,
    /// Whether the legacy site ran the multi-locale workflow system
    pub workflow: bool,
    /// Legacy locale name -> target locale name
    pub map_locales: HashMap<String, String>,
    /// Locale-less singleton types (users, groups, redirects)
    pub exempt_types: Vec<String>,
    /// Container records outside the draft/published scheme
    pub site_types: Vec<String>,
    /// The archive container type, never vetoed
    pub archive_types: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            workflow: false,
            map_locales: HashMap::new(),
            exempt_types: vec![
                "apostrophe-user".to_string(),
                "apostrophe-group".to_string(),
                "apostrophe-redirect".to_string(),
            ],
            site_types: vec!["site".to_string()],
            archive_types: vec!["trash".to_string()],
        }
    }
}

/// A document with its identity settled
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub doc: JsonMap,
    /// A published twin must be synthesized after insert
    pub replicate_to_published: bool,
}

impl Resolved {
    fn keep(doc: JsonMap) -> Self {
        Self {
            doc,
            replicate_to_published: false,
        }
    }
}

pub struct IdentityResolver {
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Map a legacy locale name through `mapLocales`
    pub fn map_locale<'a>(&'a self, locale: &'a str) -> &'a str {
        self.config
            .map_locales
            .get(locale)
            .map(String::as_str)
            .unwrap_or(locale)
    }

    pub fn is_site(&self, doc_type: &str) -> bool {
        self.config.site_types.iter().any(|t| t == doc_type)
    }

    pub fn is_archive_container(&self, doc_type: &str) -> bool {
        self.config.archive_types.iter().any(|t| t == doc_type)
    }

    fn is_exempt(&self, doc_type: &str) -> bool {
        self.config.exempt_types.iter().any(|t| t == doc_type)
    }

    /// Resolve identity for a document already tagged `metaType: doc` with
    /// `archived` copied from `trash`. `Ok(None)` vetoes the document.
    pub fn resolve(&self, mut doc: JsonMap) -> Result<Option<Resolved>> {
        let legacy_id = str_field(&doc, fields::ID)
            .map(str::to_string)
            .ok_or_else(|| MigrateError::document("<unknown>", "missing string _id"))?;
        let doc_type = str_field(&doc, fields::TYPE).unwrap_or_default().to_string();

        doc.insert(fields::LEGACY_ID.into(), JsonValue::from(legacy_id.as_str()));

        if self.is_site(&doc_type) {
            let apos_doc_id = str_field(&doc, fields::WORKFLOW_GUID)
                .unwrap_or(&legacy_id)
                .to_string();
            doc.insert(fields::APOS_DOC_ID.into(), JsonValue::from(apos_doc_id));
            return Ok(Some(Resolved::keep(doc)));
        }

        if self.config.workflow {
            self.resolve_workflow(doc, &legacy_id, &doc_type)
        } else {
            Ok(Some(self.resolve_single_locale(doc, &legacy_id, &doc_type)))
        }
    }

    fn resolve_workflow(
        &self,
        mut doc: JsonMap,
        legacy_id: &str,
        doc_type: &str,
    ) -> Result<Option<Resolved>> {
        // Types the workflow never tracked keep their identity untouched
        let Some(guid) = str_field(&doc, fields::WORKFLOW_GUID).map(str::to_string) else {
            return Ok(Some(Resolved::keep(doc)));
        };
        let Some(workflow_locale) = str_field(&doc, fields::WORKFLOW_LOCALE).map(str::to_string)
        else {
            warn!(id = %legacy_id, "Document has workflowGuid but no workflowLocale, skipping");
            return Ok(None);
        };

        let (legacy_locale, mode) = match workflow_locale.strip_suffix(DRAFT_SUFFIX) {
            Some(live) => (live, Mode::Draft),
            None => (workflow_locale.as_str(), Mode::Published),
        };
        let locale = self.map_locale(legacy_locale).to_string();

        if mode == Mode::Published
            && flag(&doc, fields::ARCHIVED)
            && !self.is_archive_container(doc_type)
        {
            debug!(id = %legacy_id, "Dropping archived published variant");
            return Ok(None);
        }

        assign(&mut doc, &guid, &locale, mode);
        Ok(Some(Resolved::keep(doc)))
    }

    fn resolve_single_locale(&self, mut doc: JsonMap, legacy_id: &str, doc_type: &str) -> Resolved {
        if self.is_exempt(doc_type) {
            return Resolved::keep(doc);
        }

        let locale = self.config.default_locale.clone();
        assign(&mut doc, legacy_id, &locale, Mode::Draft);

        let replicate_to_published =
            !flag(&doc, fields::ARCHIVED) || self.is_archive_container(doc_type);
        Resolved {
            doc,
            replicate_to_published,
        }
    }
}

fn assign(doc: &mut JsonMap, apos_doc_id: &str, locale: &str, mode: Mode) {
    doc.insert(
        fields::ID.into(),
        JsonValue::from(storage_id(apos_doc_id, locale, mode)),
    );
    doc.insert(fields::APOS_DOC_ID.into(), JsonValue::from(apos_doc_id));
    doc.insert(
        fields::APOS_LOCALE.into(),
        JsonValue::from(format!("{}:{}", locale, mode)),
    );
    doc.insert(fields::APOS_MODE.into(), JsonValue::from(mode.as_str()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: JsonValue) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    fn workflow_resolver() -> IdentityResolver {
        let mut map_locales = HashMap::new();
        map_locales.insert("default".to_string(), "en".to_string());
        IdentityResolver::new(IdentityConfig {
            workflow: true,
            map_locales,
            ..IdentityConfig::default()
        })
    }

    #[test]
    fn test_single_locale_draft_with_replica() {
        let resolver = IdentityResolver::new(IdentityConfig::default());
        let resolved = resolver
            .resolve(map(json!({ "_id": "x", "type": "apostrophe-image", "archived": false })))
            .unwrap()
            .unwrap();

        assert!(resolved.replicate_to_published);
        assert_eq!(resolved.doc["_id"], "x:en:draft");
        assert_eq!(resolved.doc["aposDocId"], "x");
        assert_eq!(resolved.doc["aposLocale"], "en:draft");
        assert_eq!(resolved.doc["aposMode"], "draft");
        assert_eq!(resolved.doc["_legacyId"], "x");
    }

    #[test]
    fn test_single_locale_archived_has_no_replica() {
        let resolver = IdentityResolver::new(IdentityConfig::default());
        let resolved = resolver
            .resolve(map(json!({ "_id": "x", "type": "blog-post", "archived": true })))
            .unwrap()
            .unwrap();
        assert!(!resolved.replicate_to_published);
        assert_eq!(resolved.doc["aposMode"], "draft");
    }

    #[test]
    fn test_single_locale_exempt_types_untouched() {
        let resolver = IdentityResolver::new(IdentityConfig::default());
        let resolved = resolver
            .resolve(map(json!({ "_id": "g1", "type": "apostrophe-group" })))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.doc["_id"], "g1");
        assert!(!resolved.doc.contains_key("aposDocId"));
        assert!(!resolved.replicate_to_published);
    }

    #[test]
    fn test_workflow_draft_locale_mapped() {
        let resolved = workflow_resolver()
            .resolve(map(json!({
                "_id": "a2-draft-id",
                "type": "blog-post",
                "workflowGuid": "G",
                "workflowLocale": "default-draft"
            })))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.doc["_id"], "G:en:draft");
        assert_eq!(resolved.doc["aposDocId"], "G");
        assert_eq!(resolved.doc["aposLocale"], "en:draft");
        assert!(!resolved.replicate_to_published);
    }

    #[test]
    fn test_workflow_archived_published_vetoed() {
        let resolver = workflow_resolver();
        let vetoed = resolver
            .resolve(map(json!({
                "_id": "p",
                "type": "blog-post",
                "archived": true,
                "workflowGuid": "G",
                "workflowLocale": "fr"
            })))
            .unwrap();
        assert!(vetoed.is_none());

        let container = resolver
            .resolve(map(json!({
                "_id": "t",
                "type": "trash",
                "archived": true,
                "workflowGuid": "T",
                "workflowLocale": "fr"
            })))
            .unwrap()
            .unwrap();
        assert_eq!(container.doc["_id"], "T:fr:published");
        assert_eq!(container.doc["aposMode"], "published");
    }

    #[test]
    fn test_workflow_untracked_type_passes_through() {
        let resolved = workflow_resolver()
            .resolve(map(json!({ "_id": "u", "type": "apostrophe-user" })))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.doc["_id"], "u");
        assert!(!resolved.doc.contains_key("aposLocale"));
    }

    #[test]
    fn test_site_record_gets_doc_id_only() {
        let resolved = workflow_resolver()
            .resolve(map(json!({ "_id": "s", "type": "site", "workflowGuid": "S" })))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.doc["aposDocId"], "S");
        assert_eq!(resolved.doc["_id"], "s");
        assert!(!resolved.doc.contains_key("aposMode"));

        let plain = IdentityResolver::new(IdentityConfig::default())
            .resolve(map(json!({ "_id": "s", "type": "site" })))
            .unwrap()
            .unwrap();
        assert_eq!(plain.doc["aposDocId"], "s");
    }

    #[test]
    fn test_missing_id_is_error() {
        let err = IdentityResolver::new(IdentityConfig::default())
            .resolve(map(json!({ "type": "blog-post" })))
            .unwrap_err();
        assert!(matches!(err, MigrateError::Document { .. }));
    }
}
