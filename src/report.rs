//! End-of-run summary
//!
//! Advisory only: lists what was inserted and dropped so an operator can see
//! which target types and widgets the new project must provide.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::types::{fields, str_field, JsonMap, MetaType};

/// Pipeline stage at which a document was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStage {
    /// Identity resolution vetoed it (archived published variant)
    Identity,
    /// No schema registered for its type
    Schema,
    /// The whole-document hook returned nothing
    DocHook,
    /// The type mapping table rejected it
    TypeMapping,
}

impl fmt::Display for DropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Identity => "identity veto",
            Self::Schema => "no schema",
            Self::DocHook => "document hook",
            Self::TypeMapping => "type mapping",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub workflow: bool,
    pub docs_read: usize,
    pub docs_inserted: usize,
    pub docs_dropped: BTreeMap<DropStage, usize>,
    pub widgets_dropped: usize,
    pub identity_entries: usize,
    pub docs_rewritten: usize,
    pub attachments_copied: usize,
    pub doc_types: BTreeSet<String>,
    pub widget_types: BTreeSet<String>,
    /// Legacy locale -> target locale, as found on site records
    pub locale_remaps: BTreeMap<String, String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            workflow: false,
            docs_read: 0,
            docs_inserted: 0,
            docs_dropped: BTreeMap::new(),
            widgets_dropped: 0,
            identity_entries: 0,
            docs_rewritten: 0,
            attachments_copied: 0,
            doc_types: BTreeSet::new(),
            widget_types: BTreeSet::new(),
            locale_remaps: BTreeMap::new(),
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drop(&mut self, stage: DropStage) {
        *self.docs_dropped.entry(stage).or_default() += 1;
    }

    pub fn dropped(&self, stage: DropStage) -> usize {
        self.docs_dropped.get(&stage).copied().unwrap_or(0)
    }

    /// Note the doc type and every widget type inside an inserted document
    pub fn record_inserted(&mut self, doc: &JsonMap) {
        self.docs_inserted += 1;
        if let Some(doc_type) = str_field(doc, fields::TYPE) {
            self.doc_types.insert(doc_type.to_string());
        }
        for value in doc.values() {
            self.collect_widget_types(value);
        }
    }

    fn collect_widget_types(&mut self, value: &JsonValue) {
        match value {
            JsonValue::Object(object) => {
                if MetaType::Widget.is_tagged(object) {
                    if let Some(widget_type) = str_field(object, fields::TYPE) {
                        self.widget_types.insert(widget_type.to_string());
                    }
                }
                for nested in object.values() {
                    self.collect_widget_types(nested);
                }
            }
            JsonValue::Array(items) => {
                for item in items {
                    self.collect_widget_types(item);
                }
            }
            _ => {}
        }
    }

    pub fn record_locale_remap(&mut self, legacy: &str, target: &str) {
        self.locale_remaps.insert(legacy.to_string(), target.to_string());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Upgrade summary")?;
        writeln!(f, "  workflow source:     {}", if self.workflow { "yes" } else { "no" })?;
        writeln!(f, "  documents read:      {}", self.docs_read)?;
        writeln!(f, "  documents inserted:  {}", self.docs_inserted)?;
        for (stage, count) in &self.docs_dropped {
            writeln!(f, "  dropped ({}): {}", stage, count)?;
        }
        writeln!(f, "  widgets dropped:     {}", self.widgets_dropped)?;
        writeln!(f, "  identity mappings:   {}", self.identity_entries)?;
        writeln!(f, "  references rewritten in {} documents", self.docs_rewritten)?;
        writeln!(f, "  attachments copied:  {}", self.attachments_copied)?;
        if let Some(finished) = self.finished_at {
            let elapsed = finished - self.started_at;
            writeln!(f, "  elapsed:             {}s", elapsed.num_seconds())?;
        }

        writeln!(f)?;
        writeln!(f, "Document types inserted (each needs a module in the new project):")?;
        for doc_type in &self.doc_types {
            writeln!(f, "  {}", doc_type)?;
        }
        writeln!(f)?;
        writeln!(f, "Widget types inserted:")?;
        for widget_type in &self.widget_types {
            writeln!(f, "  {}", widget_type)?;
        }
        if !self.locale_remaps.is_empty() {
            writeln!(f)?;
            writeln!(f, "Locales renamed on site records:")?;
            for (legacy, target) in &self.locale_remaps {
                writeln!(f, "  {} -> {}", legacy, target)?;
            }
        }
        Ok(())
    }
}
