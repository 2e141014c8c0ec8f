//! Page path rewriting
//!
//! Target page paths are chains of `aposDocId`s: a page's path is its
//! parent's new path plus its own id. Parents must therefore be seen before
//! their children, which pass 1 guarantees by streaming in `level` order.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::types::{fields, str_field, JsonMap};

/// Whether a slug denotes a page in the tree
pub fn is_page(doc: &JsonMap) -> bool {
    str_field(doc, fields::SLUG).is_some_and(|slug| slug.starts_with('/'))
}

/// Legacy parent path, or `None` for the root
fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.trim_end_matches('/').rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

#[derive(Debug, Default)]
pub struct PathRewriter {
    /// Legacy path -> new path
    paths: HashMap<String, String>,
    /// Live locale name -> slug prefix used by the legacy workflow
    prefixes: HashMap<String, String>,
    workflow: bool,
}

impl PathRewriter {
    pub fn new(workflow: bool, prefixes: HashMap<String, String>) -> Self {
        Self {
            paths: HashMap::new(),
            prefixes,
            workflow,
        }
    }

    /// New path already computed for a legacy path
    pub fn lookup(&self, legacy_path: &str) -> Option<&str> {
        self.paths.get(legacy_path).map(String::as_str)
    }

    /// Rewrite `path` (and, under workflow, the slug prefix) of a page
    pub fn rewrite(&mut self, doc: &mut JsonMap) {
        if !is_page(doc) {
            return;
        }

        if let (Some(legacy_path), Some(apos_doc_id)) = (
            str_field(doc, fields::PATH).map(str::to_string),
            str_field(doc, fields::APOS_DOC_ID).map(str::to_string),
        ) {
            let new_path = self.compute(&legacy_path, &apos_doc_id);
            doc.insert(fields::PATH.into(), JsonValue::from(new_path));
        }

        if self.workflow {
            self.strip_locale_prefix(doc);
        }
    }

    fn compute(&mut self, legacy_path: &str, apos_doc_id: &str) -> String {
        let new_path = match parent_path(legacy_path) {
            None => apos_doc_id.to_string(),
            Some(parent) => match self.paths.get(parent) {
                Some(parent_new) => format!("{}/{}", parent_new, apos_doc_id),
                None => {
                    warn!(
                        path = %legacy_path,
                        parent = %parent,
                        "Parent page not migrated before child, treating as top level"
                    );
                    apos_doc_id.to_string()
                }
            },
        };
        // Locale and mode variants of one page share a legacy path
        self.paths
            .entry(legacy_path.to_string())
            .or_insert_with(|| new_path.clone());
        new_path
    }

    fn strip_locale_prefix(&self, doc: &mut JsonMap) {
        let Some(live_locale) = str_field(doc, fields::WORKFLOW_LOCALE)
            .map(|locale| locale.trim_end_matches("-draft").to_string())
        else {
            return;
        };
        let Some(prefix) = self.prefixes.get(&live_locale).filter(|p| !p.is_empty()) else {
            return;
        };
        let Some(slug) = str_field(doc, fields::SLUG) else {
            return;
        };
        let Some(rest) = slug.strip_prefix(prefix.as_str()) else {
            return;
        };
        if !(rest.is_empty() || rest.starts_with('/')) {
            return;
        }
        let stripped = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
        doc.insert(fields::SLUG.into(), JsonValue::from(stripped));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(path: &str, id: &str) -> JsonMap {
        json!({ "slug": path, "path": path, "aposDocId": id })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/a/b"), Some("/a"));
    }

    #[test]
    fn test_paths_chain_doc_ids() {
        let mut rewriter = PathRewriter::default();
        let mut root = page("/", "R");
        let mut a = page("/a", "A");
        let mut b = page("/a/b", "B");

        rewriter.rewrite(&mut root);
        rewriter.rewrite(&mut a);
        rewriter.rewrite(&mut b);

        assert_eq!(root["path"], "R");
        assert_eq!(a["path"], "R/A");
        assert_eq!(b["path"], "R/A/B");
        assert_eq!(rewriter.lookup("/a"), Some("R/A"));
    }

    #[test]
    fn test_orphan_falls_back_to_own_id() {
        let mut rewriter = PathRewriter::default();
        let mut b = page("/a/b", "B");
        rewriter.rewrite(&mut b);
        assert_eq!(b["path"], "B");
    }

    #[test]
    fn test_non_pages_untouched() {
        let mut rewriter = PathRewriter::default();
        let mut piece = json!({ "slug": "img", "path": "x", "aposDocId": "I" })
            .as_object()
            .cloned()
            .unwrap();
        rewriter.rewrite(&mut piece);
        assert_eq!(piece["path"], "x");
    }

    #[test]
    fn test_locale_prefix_stripped_under_workflow() {
        let mut prefixes = HashMap::new();
        prefixes.insert("fr".to_string(), "/fr".to_string());
        let mut rewriter = PathRewriter::new(true, prefixes);

        let mut about = page("/about", "A");
        about.insert("slug".into(), json!("/fr/about"));
        about.insert("workflowLocale".into(), json!("fr-draft"));
        rewriter.rewrite(&mut about);
        assert_eq!(about["slug"], "/about");

        let mut home = page("/", "R");
        home.insert("slug".into(), json!("/fr"));
        home.insert("workflowLocale".into(), json!("fr"));
        rewriter.rewrite(&mut home);
        assert_eq!(home["slug"], "/");

        let mut french = page("/french", "F");
        french.insert("slug".into(), json!("/french"));
        french.insert("workflowLocale".into(), json!("fr"));
        rewriter.rewrite(&mut french);
        assert_eq!(french["slug"], "/french");
    }
}
