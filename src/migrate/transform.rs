//! Schema-driven transformer
//!
//! Walks an object field by field according to its schema and hands every
//! field with a registered kind to the matching [`FieldHandler`]. Areas
//! recurse into their widgets, and widgets recurse through their own
//! schemas, so this is the single entry point for all structural reshaping.
//!
//! [`FieldHandler`]: super::fields::FieldHandler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::schema::{FieldDef, SchemaRegistry};
use crate::types::{fields, str_field, JsonMap, MetaType, Result};

use super::fields::FieldHandlers;
use super::mapping::{MappingTable, Rewrite, TypeMapping};

pub struct SchemaTransformer {
    registry: Arc<SchemaRegistry>,
    handlers: FieldHandlers,
    widget_types: MappingTable,
    widget_hook: Option<Arc<dyn Rewrite>>,
    widgets_dropped: AtomicUsize,
}

impl SchemaTransformer {
    pub fn new(registry: Arc<SchemaRegistry>, widget_types: MappingTable) -> Self {
        Self {
            registry,
            handlers: FieldHandlers::standard(),
            widget_types,
            widget_hook: None,
            widgets_dropped: AtomicUsize::new(0),
        }
    }

    /// Replace the field-type registry
    pub fn with_handlers(mut self, handlers: FieldHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Post-transform hook run on every widget before type mapping
    pub fn with_widget_hook(mut self, hook: Option<Arc<dyn Rewrite>>) -> Self {
        self.widget_hook = hook;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Widgets dropped so far (no schema, hook veto, or mapping rejection)
    pub fn widgets_dropped(&self) -> usize {
        self.widgets_dropped.load(Ordering::Relaxed)
    }

    /// Rewrite every schema field of `object` whose kind has a handler
    pub fn upgrade_object<'a>(
        &'a self,
        schema: &'a [FieldDef],
        mut object: JsonMap,
        scope: &'a str,
    ) -> BoxFuture<'a, Result<JsonMap>> {
        async move {
            for field in schema {
                if let Some(handler) = self.handlers.get(&field.kind) {
                    handler.apply(self, &mut object, field, scope).await?;
                }
            }
            Ok(object)
        }
        .boxed()
    }

    /// Upgrade a top-level document, including areas the schema never declared
    pub async fn upgrade_document(
        &self,
        schema: &[FieldDef],
        doc: JsonMap,
        scope: &str,
    ) -> Result<JsonMap> {
        let mut doc = self.upgrade_object(schema, doc, scope).await?;

        let spontaneous: Vec<String> = doc
            .iter()
            .filter(|(_, value)| match value {
                JsonValue::Object(area) => {
                    str_field(area, fields::TYPE) == Some("area") && !MetaType::Area.is_tagged(area)
                }
                _ => false,
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in spontaneous {
            debug!(field = %key, "Upgrading undeclared area");
            if let Some(JsonValue::Object(area)) = doc.get_mut(&key) {
                self.upgrade_area(area).await?;
            }
        }

        Ok(doc)
    }

    /// Upgrade each object element against `schema` and tag it as an array item.
    /// Non-object elements are discarded.
    pub async fn upgrade_items(
        &self,
        schema: &[FieldDef],
        items: Vec<JsonValue>,
        scope: &str,
    ) -> Result<Vec<JsonValue>> {
        let mut upgraded = Vec::with_capacity(items.len());
        for item in items {
            let JsonValue::Object(item) = item else {
                continue;
            };
            let mut item = self.upgrade_object(schema, item, scope).await?;
            MetaType::ArrayItem.tag(&mut item);
            item.insert(fields::SCOPED_ARRAY_NAME.into(), JsonValue::from(scope));
            upgraded.push(JsonValue::Object(item));
        }
        Ok(upgraded)
    }

    /// Tag the area, give it an id, and upgrade its widgets.
    /// Rejected widgets are removed from the item list.
    pub async fn upgrade_area(&self, area: &mut JsonMap) -> Result<()> {
        MetaType::Area.tag(area);
        area.entry(fields::ID)
            .or_insert_with(|| JsonValue::from(Uuid::new_v4().simple().to_string()));

        let items = match area.remove(fields::ITEMS) {
            Some(JsonValue::Array(items)) => items,
            _ => Vec::new(),
        };

        let mut upgraded = Vec::with_capacity(items.len());
        for item in items {
            let JsonValue::Object(widget) = item else {
                continue;
            };
            if let Some(widget) = self.upgrade_widget(widget).await? {
                upgraded.push(JsonValue::Object(widget));
            }
        }

        area.insert(fields::ITEMS.into(), JsonValue::Array(upgraded));
        Ok(())
    }

    /// Upgrade one widget; `None` means it was dropped
    pub fn upgrade_widget(&self, mut widget: JsonMap) -> BoxFuture<'_, Result<Option<JsonMap>>> {
        async move {
            let upgraded = MetaType::Widget.is_tagged(&widget);
            MetaType::Widget.tag(&mut widget);

            let Some(widget_type) = str_field(&widget, fields::TYPE).map(str::to_string) else {
                return Ok(self.drop_widget("<untyped>", "no type"));
            };
            let Some((schema_type, schema)) = self.widget_schema_for(&widget_type, upgraded) else {
                return Ok(self.drop_widget(&widget_type, "no registered schema"));
            };

            let scope = self.widget_scope(&schema_type);
            let mut widget = self.upgrade_object(schema, widget, &scope).await?;

            if let Some(hook) = &self.widget_hook {
                match hook.rewrite(widget).await? {
                    Some(rewritten) => widget = rewritten,
                    None => return Ok(self.drop_widget(&widget_type, "rejected by widget hook")),
                }
            }

            match self.widget_types.apply(&schema_type, widget).await? {
                Some(widget) => Ok(Some(widget)),
                None => Ok(self.drop_widget(&widget_type, "rejected by type mapping")),
            }
        }
        .boxed()
    }

    /// Schema for a widget's declared type. A widget already tagged by an
    /// earlier application may carry a renamed type; its schema is then
    /// registered under the legacy type the rename came from.
    fn widget_schema_for(&self, widget_type: &str, upgraded: bool) -> Option<(String, &[FieldDef])> {
        if let Some(schema) = self.registry.widget_schema(widget_type) {
            return Some((widget_type.to_string(), schema));
        }
        if !upgraded {
            return None;
        }
        self.widget_types
            .renamed_from(widget_type)
            .into_iter()
            .find_map(|legacy| {
                self.registry
                    .widget_schema(legacy)
                    .map(|schema| (legacy.to_string(), schema))
            })
    }

    /// Array items inside a widget are scoped by the widget's target type name
    fn widget_scope(&self, widget_type: &str) -> String {
        match self.widget_types.get(widget_type) {
            Some(TypeMapping::Rename(target)) => target.clone(),
            _ => widget_type.to_string(),
        }
    }

    fn drop_widget(&self, widget_type: &str, reason: &str) -> Option<JsonMap> {
        debug!(widget_type = %widget_type, reason, "Dropping widget");
        self.widgets_dropped.fetch_add(1, Ordering::Relaxed);
        None
    }
}
