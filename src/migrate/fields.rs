//! Field-type registry
//!
//! Each [`FieldKind`] the transformer acts on is bound to a [`FieldHandler`].
//! Kinds without a handler are left exactly as they are.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::schema::{FieldDef, FieldKind};
use crate::types::{JsonMap, Result};

use super::transform::SchemaTransformer;

/// Rewrites one field of an object in place
#[async_trait]
pub trait FieldHandler: Send + Sync {
    /// `scope` is the dotted type + field chain of the enclosing object
    async fn apply(
        &self,
        cx: &SchemaTransformer,
        object: &mut JsonMap,
        field: &FieldDef,
        scope: &str,
    ) -> Result<()>;
}

/// Field kind -> handler
#[derive(Clone)]
pub struct FieldHandlers {
    handlers: HashMap<FieldKind, Arc<dyn FieldHandler>>,
}

impl FieldHandlers {
    /// Handlers for the built-in structural field kinds
    pub fn standard() -> Self {
        let area: Arc<dyn FieldHandler> = Arc::new(AreaField);
        let mut handlers: HashMap<FieldKind, Arc<dyn FieldHandler>> = HashMap::new();
        handlers.insert(FieldKind::JoinByOne, Arc::new(JoinByOneField));
        handlers.insert(FieldKind::Array, Arc::new(ArrayField));
        handlers.insert(FieldKind::Object, Arc::new(ObjectField));
        handlers.insert(FieldKind::Area, area.clone());
        handlers.insert(FieldKind::Singleton, area);
        Self { handlers }
    }

    /// Bind an additional field kind, replacing any existing handler
    pub fn register(&mut self, kind: FieldKind, handler: Arc<dyn FieldHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: &FieldKind) -> Option<&Arc<dyn FieldHandler>> {
        self.handlers.get(kind)
    }
}

impl Default for FieldHandlers {
    fn default() -> Self {
        Self::standard()
    }
}

/// Scalar single reference -> list of ids under `{name}Ids`
pub struct JoinByOneField;

#[async_trait]
impl FieldHandler for JoinByOneField {
    async fn apply(
        &self,
        _cx: &SchemaTransformer,
        object: &mut JsonMap,
        field: &FieldDef,
        _scope: &str,
    ) -> Result<()> {
        let ids_field = field.ids_field();
        let ids = match object.get(&field.id_field()) {
            None | Some(JsonValue::Null) => {
                // Already converted on an earlier application
                if matches!(object.get(&ids_field), Some(JsonValue::Array(_))) {
                    return Ok(());
                }
                Vec::new()
            }
            Some(JsonValue::String(id)) if id.is_empty() => Vec::new(),
            Some(id) => vec![id.clone()],
        };
        object.insert(ids_field, JsonValue::Array(ids));
        Ok(())
    }
}

/// List of sub-objects, each upgraded against the field's own schema
pub struct ArrayField;

#[async_trait]
impl FieldHandler for ArrayField {
    async fn apply(
        &self,
        cx: &SchemaTransformer,
        object: &mut JsonMap,
        field: &FieldDef,
        scope: &str,
    ) -> Result<()> {
        let items = match object.remove(&field.name) {
            Some(JsonValue::Array(items)) => items,
            _ => Vec::new(),
        };
        let scope = format!("{}.{}", scope, field.name);
        let upgraded = cx.upgrade_items(&field.schema, items, &scope).await?;
        object.insert(field.name.clone(), JsonValue::Array(upgraded));
        Ok(())
    }
}

/// Single sub-object, stored as a one-element list of array items
pub struct ObjectField;

#[async_trait]
impl FieldHandler for ObjectField {
    async fn apply(
        &self,
        cx: &SchemaTransformer,
        object: &mut JsonMap,
        field: &FieldDef,
        scope: &str,
    ) -> Result<()> {
        let items = match object.remove(&field.name) {
            Some(JsonValue::Object(single)) => vec![JsonValue::Object(single)],
            Some(JsonValue::Array(items)) => items,
            Some(other) => {
                object.insert(field.name.clone(), other);
                return Ok(());
            }
            None => return Ok(()),
        };
        let scope = format!("{}.{}", scope, field.name);
        let upgraded = cx.upgrade_items(&field.schema, items, &scope).await?;
        object.insert(field.name.clone(), JsonValue::Array(upgraded));
        Ok(())
    }
}

/// Rich content area (and the single-widget variant)
pub struct AreaField;

#[async_trait]
impl FieldHandler for AreaField {
    async fn apply(
        &self,
        cx: &SchemaTransformer,
        object: &mut JsonMap,
        field: &FieldDef,
        _scope: &str,
    ) -> Result<()> {
        if let Some(JsonValue::Object(area)) = object.get_mut(&field.name) {
            cx.upgrade_area(area).await?;
        }
        Ok(())
    }
}
