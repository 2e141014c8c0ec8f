//! Pass 2: reference rewriting
//!
//! Nothing in a stored document says which strings are references, so any
//! map key or scalar string that is a key of the identity map is treated as
//! one. A user-facing field name that happens to equal a legacy id would be
//! renamed as well.
//!
//! The identity map is closed by the time this runs, so documents can be
//! visited in any order.

use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::db::TargetStore;
use crate::types::{fields, str_field, JsonMap, Result};

use super::state::IdentityMap;

pub struct ReferenceRewriter {
    ids: IdentityMap,
}

impl ReferenceRewriter {
    pub fn new(ids: IdentityMap) -> Self {
        Self { ids }
    }

    /// Rewrite every stored document; returns how many were written back
    pub async fn run(&self, target: &dyn TargetStore) -> Result<usize> {
        info!(identities = self.ids.len(), "Pass 2: rewriting cross-document references");

        let mut rewritten = 0;
        let mut scanned = 0;
        let mut docs = target.docs().await?;
        while let Some(mut doc) = docs.try_next().await? {
            scanned += 1;
            let substitutions = self.rewrite_doc(&mut doc);
            if substitutions > 0 {
                debug!(
                    id = %str_field(&doc, fields::ID).unwrap_or_default(),
                    substitutions,
                    "Rewriting references"
                );
                target.replace_doc(doc).await?;
                rewritten += 1;
            }
        }

        info!(scanned, rewritten, "Pass 2 complete");
        Ok(rewritten)
    }

    /// Rewrite one document in place; returns the number of substitutions
    pub fn rewrite_doc(&self, doc: &mut JsonMap) -> usize {
        // The stored `_id` is what the write-back matches on
        let id = doc.remove(fields::ID);
        let count = self.rewrite_map(doc);
        if let Some(id) = id {
            doc.insert(fields::ID.into(), id);
        }
        count
    }

    fn rewrite_value(&self, value: &mut JsonValue) -> usize {
        match value {
            JsonValue::String(id) => match self.ids.substitute(id) {
                Some(new_id) => {
                    *id = new_id.to_string();
                    1
                }
                None => 0,
            },
            JsonValue::Array(items) => items.iter_mut().map(|item| self.rewrite_value(item)).sum(),
            JsonValue::Object(object) => self.rewrite_map(object),
            _ => 0,
        }
    }

    fn rewrite_map(&self, object: &mut JsonMap) -> usize {
        let mut count = 0;
        // Renames are applied after the scan so the map is not mutated mid-iteration
        let mut renames: Vec<(String, String)> = Vec::new();

        for (key, value) in object.iter_mut() {
            if key == fields::LEGACY_ID {
                continue;
            }
            if let Some(new_key) = self.ids.substitute(key) {
                renames.push((key.clone(), new_key.to_string()));
            }
            count += self.rewrite_value(value);
        }

        for (old_key, new_key) in renames {
            if let Some(value) = object.remove(&old_key) {
                if object.contains_key(&new_key) {
                    warn!(
                        key = %old_key,
                        new_key = %new_key,
                        "Renamed key overwrites an existing key"
                    );
                }
                object.insert(new_key, value);
                count += 1;
            }
        }

        count
    }
}
