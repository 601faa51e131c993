//! Handler registry.
//!
//! Holds uniquely-named handler definitions for the lifetime of the process.
//! Uniqueness is enforced on insertion through the map's entry API, so two
//! racing registrations of one name produce exactly one winner.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{DispatchError, DispatchResult};
use crate::schema::PropertySchema;
use crate::tools::{ToolDefinition, ToolDescriptor};
use crate::types::{HandlerName, ToolName};

/// A registered handler: description, property schema and tools.
///
/// Immutable once constructed.
pub struct HandlerDefinition {
    name: HandlerName,
    description: String,
    props_schema: Value,
    schema: PropertySchema,
    tools: Vec<ToolDefinition>,
}

impl HandlerDefinition {
    /// Build a definition, compiling its property schema.
    ///
    /// Non-object or uncompilable schemas and duplicate tool names are rejected.
    pub fn new(
        name: impl Into<HandlerName>,
        description: impl Into<String>,
        props_schema: Value,
        tools: Vec<ToolDefinition>,
    ) -> DispatchResult<Self> {
        let name = name.into();

        if !props_schema.is_object() {
            return Err(DispatchError::InvalidSchema {
                handler: name,
                reason: format!("expected a JSON object, got {}", props_schema),
            });
        }

        for (i, tool) in tools.iter().enumerate() {
            if tools[..i].iter().any(|t| t.name() == tool.name()) {
                return Err(DispatchError::DuplicateTool {
                    handler: name,
                    tool: tool.name().clone(),
                });
            }
        }

        let schema = PropertySchema::compile(&props_schema)
            .map_err(|reason| DispatchError::InvalidSchema {
                handler: name.clone(),
                reason,
            })?;

        Ok(Self {
            name,
            description: description.into(),
            props_schema,
            schema,
            tools,
        })
    }

    pub fn name(&self) -> &HandlerName {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The raw JSON Schema document the handler was registered with.
    pub fn props_schema(&self) -> &Value {
        &self.props_schema
    }

    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn tool(&self, name: &ToolName) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Check final properties against the handler's schema.
    pub fn validate_properties(&self, properties: &Value) -> DispatchResult<()> {
        self.schema
            .validate(properties)
            .map_err(|reason| DispatchError::SchemaMismatch {
                handler: self.name.clone(),
                reason,
            })
    }

    /// The shape of this handler as seen by resolvers and hydrators.
    pub fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            props: self.props_schema.clone(),
            context_tools: self.tools.iter().map(ToolDefinition::descriptor).collect(),
        }
    }
}

impl fmt::Debug for HandlerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("props_schema", &self.props_schema)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Read-only view of a handler. Carries tool shapes, never callables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerDescriptor {
    pub name: HandlerName,
    pub description: String,
    pub props: Value,
    pub context_tools: Vec<ToolDescriptor>,
}

/// Snapshot of every registered handler, keyed by name.
pub type HandlerCatalog = BTreeMap<HandlerName, HandlerDescriptor>;

/// Boxed future returned by a registration sink.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// Receives each handler before it becomes visible in the registry.
///
/// Returning `Ok(false)` declines the registration.
pub trait RegistrationSink: Send + Sync {
    fn save<'a>(&'a self, handler: &'a HandlerDescriptor) -> SinkFuture<'a>;
}

/// Registry of handler definitions keyed by name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<HandlerName, Arc<HandlerDefinition>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler from its parts.
    pub fn register(
        &self,
        name: impl Into<HandlerName>,
        description: impl Into<String>,
        props_schema: Value,
        tools: Vec<ToolDefinition>,
    ) -> DispatchResult<()> {
        let definition = HandlerDefinition::new(name, description, props_schema, tools)?;
        self.insert(definition).map(|_| ())
    }

    /// Insert a prebuilt definition.
    ///
    /// Fails with `DuplicateHandler` if the name is taken; the existing
    /// registration is left untouched.
    pub fn insert(&self, definition: HandlerDefinition) -> DispatchResult<Arc<HandlerDefinition>> {
        match self.handlers.entry(definition.name().clone()) {
            Entry::Occupied(entry) => Err(DispatchError::DuplicateHandler(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(
                    handler = %definition.name(),
                    tools = definition.tools().len(),
                    "Registered handler"
                );
                let definition = Arc::new(definition);
                entry.insert(definition.clone());
                Ok(definition)
            }
        }
    }

    /// Get a handler by name.
    pub fn lookup(&self, name: &str) -> DispatchResult<Arc<HandlerDefinition>> {
        self.handlers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::HandlerNotFound(HandlerName::new(name)))
    }

    /// Descriptors of all current handlers, for passing to a resolver.
    pub fn snapshot(&self) -> HandlerCatalog {
        self.handlers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().descriptor()))
            .collect()
    }

    /// Check if a handler with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered handler names, sorted.
    pub fn names(&self) -> Vec<HandlerName> {
        let mut names: Vec<_> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Return the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Return `true` if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ParameterType;
    use serde_json::json;

    fn fetch_series() -> ToolDefinition {
        ToolDefinition::from_fn("fetchSeries", |_args| async { Ok(json!([1, 2, 3])) })
            .with_parameter("symbol", ParameterType::String)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = HandlerRegistry::new();
        registry
            .register("chart", "Line chart of a series", json!({"type": "object"}), vec![fetch_series()])
            .unwrap();

        let chart = registry.lookup("chart").unwrap();
        assert_eq!(chart.description(), "Line chart of a series");
        assert!(chart.tool(&ToolName::new("fetchSeries")).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = HandlerRegistry::new();
        registry
            .register("chart", "first", json!({}), vec![])
            .unwrap();

        let err = registry
            .register("chart", "second", json!({}), vec![fetch_series()])
            .unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateHandler(ref n) if n.as_str() == "chart"));

        let chart = registry.lookup("chart").unwrap();
        assert_eq!(chart.description(), "first");
        assert!(chart.tools().is_empty());
    }

    #[test]
    fn test_lookup_missing_handler() {
        let registry = HandlerRegistry::new();
        let err = registry.lookup("chart").unwrap_err();
        assert!(matches!(err, DispatchError::HandlerNotFound(_)));
    }

    #[test]
    fn test_snapshot_exposes_tool_shapes() {
        let registry = HandlerRegistry::new();
        registry
            .register("chart", "Line chart", json!({"type": "object"}), vec![fetch_series()])
            .unwrap();
        registry.register("note", "Plain note", json!({}), vec![]).unwrap();

        let snapshot = registry.snapshot();
        let names: Vec<_> = snapshot.keys().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["chart", "note"]);

        let json = serde_json::to_value(&snapshot["chart"]).unwrap();
        assert_eq!(
            json,
            json!({
                "name": "chart",
                "description": "Line chart",
                "props": {"type": "object"},
                "contextTools": [{
                    "name": "fetchSeries",
                    "parameters": [{"name": "symbol", "type": "string"}]
                }]
            })
        );
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let err = HandlerDefinition::new("chart", "", json!({}), vec![fetch_series(), fetch_series()])
            .unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateTool { .. }));
    }

    #[test]
    fn test_non_object_schema_rejected() {
        let err = HandlerDefinition::new("chart", "", json!("props"), vec![]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidSchema { .. }));
    }

    #[test]
    fn test_uncompilable_schema_rejected() {
        let err = HandlerDefinition::new("chart", "", json!({"type": 12}), vec![]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidSchema { ref handler, .. } if handler.as_str() == "chart"));
    }

    #[test]
    fn test_validate_properties_reports_mismatch() {
        let chart = HandlerDefinition::new(
            "chart",
            "",
            json!({
                "properties": { "data": { "type": "array", "minItems": 1 } },
                "required": ["data"]
            }),
            vec![],
        )
        .unwrap();

        assert!(chart.validate_properties(&json!({"data": [1]})).is_ok());
        for props in [json!({}), json!({"data": []})] {
            let err = chart.validate_properties(&props).unwrap_err();
            assert!(matches!(err, DispatchError::SchemaMismatch { .. }));
        }
    }

    #[test]
    fn test_concurrent_duplicate_registration_has_one_winner() {
        let registry = Arc::new(HandlerRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.register("chart", format!("writer {}", i), json!({}), vec![])
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, DispatchError::DuplicateHandler(_))));
        assert_eq!(registry.len(), 1);
    }
}
