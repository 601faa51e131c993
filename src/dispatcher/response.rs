//! Result of a successful `generate` call.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::types::HandlerName;

/// A handler selected for rendering, with its final properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentChoice {
    handler_name: HandlerName,
    properties: Value,
    message: String,
}

impl ComponentChoice {
    pub(crate) fn new(handler_name: HandlerName, properties: Value, message: String) -> Self {
        Self {
            handler_name,
            properties,
            message,
        }
    }

    pub fn handler_name(&self) -> &HandlerName {
        &self.handler_name
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Either a plain-text reply or a handler to render.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateResponse {
    Text { message: String },
    Component(ComponentChoice),
}

impl GenerateResponse {
    /// The reply message, recorded as the system turn.
    pub fn message(&self) -> &str {
        match self {
            GenerateResponse::Text { message } => message,
            GenerateResponse::Component(choice) => choice.message(),
        }
    }

    /// Handler to render, or `None` for a text reply.
    pub fn handler_name(&self) -> Option<&HandlerName> {
        match self {
            GenerateResponse::Text { .. } => None,
            GenerateResponse::Component(choice) => Some(choice.handler_name()),
        }
    }

    pub fn properties(&self) -> Option<&Value> {
        match self {
            GenerateResponse::Text { .. } => None,
            GenerateResponse::Component(choice) => Some(choice.properties()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody<'a> {
    handler_name: Option<&'a HandlerName>,
    properties: Option<&'a Value>,
    message: &'a str,
}

// Serialized in the flat external shape; `handlerName` is null for text replies.
impl Serialize for GenerateResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ResponseBody {
            handler_name: self.handler_name(),
            properties: self.properties(),
            message: self.message(),
        }
        .serialize(serializer)
    }
}
