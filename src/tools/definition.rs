//! Tool definitions attached to handlers.
//!
//! A tool pairs a declared shape (name plus ordered parameters) with a bound
//! callable. Resolvers only ever see the shape; the callable stays inside the
//! registry and is reached through the `ToolInvoker`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ToolName;

/// Boxed future returned by a tool callable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Trait for the callable bound to a tool.
///
/// Arguments arrive positionally, already bound to the declared parameter
/// list. The returned value is passed to the hydrator without interpretation.
pub trait ToolCallable: Send + Sync {
    /// Executes the tool with its ordered arguments.
    fn call(&self, args: Vec<Value>) -> ToolFuture<'_>;
}

/// Adapter that turns an async closure into a `ToolCallable`.
pub struct FnTool<F> {
    f: F,
}

impl<F> FnTool<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> ToolCallable for FnTool<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> ToolFuture<'_> {
        Box::pin((self.f)(args))
    }
}

/// Expected JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    #[default]
    Any,
}

impl ParameterType {
    /// Whether `value` has this JSON type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
            ParameterType::Object => value.is_object(),
            ParameterType::Any => true,
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
        }
    }
}

/// Declared shape of a tool, without its callable.
///
/// This is what resolvers and hydrators receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: ToolName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ToolParameter>,
}

/// A tool owned by a handler definition.
#[derive(Clone)]
pub struct ToolDefinition {
    name: ToolName,
    description: Option<String>,
    parameters: Vec<ToolParameter>,
    callable: Arc<dyn ToolCallable>,
}

impl ToolDefinition {
    /// Create a tool with no parameters bound to `callable`.
    pub fn new(name: impl Into<ToolName>, callable: Arc<dyn ToolCallable>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            callable,
        }
    }

    /// Create a tool backed by an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<ToolName>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::new(name, Arc::new(FnTool::new(f)))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a parameter. Order of calls is the positional binding order.
    pub fn with_parameter(mut self, name: impl Into<String>, ty: ParameterType) -> Self {
        self.parameters.push(ToolParameter::new(name, ty));
        self
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = ToolParameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn name(&self) -> &ToolName {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    pub(crate) fn callable(&self) -> &Arc<dyn ToolCallable> {
        &self.callable
    }

    /// The declared shape of this tool.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
