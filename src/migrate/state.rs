//! Run state shared between the two passes
//!
//! Pass 1 owns an [`IdentityMapBuilder`]. Freezing it consumes the builder,
//! so the [`IdentityMap`] that pass 2 reads can no longer be written.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

/// Append-only legacy id -> `aposDocId` map, written during pass 1
#[derive(Debug, Default)]
pub struct IdentityMapBuilder {
    entries: HashMap<String, String>,
}

impl IdentityMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Existing entries are never overwritten; returns
    /// whether the entry was new.
    pub fn record(&mut self, legacy_id: impl Into<String>, apos_doc_id: impl Into<String>) -> bool {
        let legacy_id = legacy_id.into();
        let apos_doc_id = apos_doc_id.into();
        match self.entries.get(&legacy_id) {
            Some(existing) => {
                if *existing != apos_doc_id {
                    warn!(
                        legacy_id = %legacy_id,
                        kept = %existing,
                        ignored = %apos_doc_id,
                        "Conflicting identity mapping ignored"
                    );
                }
                false
            }
            None => {
                self.entries.insert(legacy_id, apos_doc_id);
                true
            }
        }
    }

    pub fn get(&self, legacy_id: &str) -> Option<&str> {
        self.entries.get(legacy_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close the map; no further writes are possible
    pub fn freeze(self) -> IdentityMap {
        IdentityMap {
            entries: Arc::new(self.entries),
        }
    }
}

/// Read-only identity map consumed by pass 2
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    entries: Arc<HashMap<String, String>>,
}

impl IdentityMap {
    pub fn get(&self, legacy_id: &str) -> Option<&str> {
        self.entries.get(legacy_id).map(String::as_str)
    }

    /// Replacement for `id`, only when it maps to something different
    pub fn substitute(&self, id: &str) -> Option<&str> {
        self.get(id).filter(|new_id| *new_id != id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = IdentityMapBuilder::new();
        for (legacy_id, apos_doc_id) in iter {
            builder.record(legacy_id, apos_doc_id);
        }
        builder.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_append_only() {
        let mut builder = IdentityMapBuilder::new();
        assert!(builder.record("a", "A"));
        assert!(!builder.record("a", "B"));
        assert_eq!(builder.get("a"), Some("A"));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_frozen_map_substitutes_only_changes() {
        let ids: IdentityMap = [("old", "NEW"), ("same", "same")].into_iter().collect();
        assert_eq!(ids.substitute("old"), Some("NEW"));
        assert_eq!(ids.substitute("same"), None);
        assert_eq!(ids.substitute("missing"), None);
        assert_eq!(ids.get("same"), Some("same"));
        assert_eq!(ids.len(), 2);
    }
}
