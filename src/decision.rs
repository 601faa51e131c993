//! Resolver decisions and tool-call requests.
//!
//! `Decision` is the tagged form used inside the dispatcher. `WireDecision`
//! is the JSON shape exchanged with remote resolvers; converting from it is
//! strict so malformed output surfaces as an error instead of an empty reply.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{HandlerName, ToolName};

/// One positional tool argument.
///
/// The name is informational; binding uses the position in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    pub parameter_value: Value,
}

/// Request to run one of the chosen handler's tools before hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub tool_name: ToolName,
    #[serde(default)]
    pub parameters: Vec<ToolCallParameter>,
}

impl ToolCallRequest {
    /// Build a request from bare positional values.
    pub fn positional(tool_name: impl Into<ToolName>, values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters: values
                .into_iter()
                .map(|parameter_value| ToolCallParameter {
                    parameter_name: None,
                    parameter_value,
                })
                .collect(),
        }
    }

    /// The supplied values in call order.
    pub fn values(&self) -> Vec<Value> {
        self.parameters
            .iter()
            .map(|p| p.parameter_value.clone())
            .collect()
    }
}

/// A decision to render a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDecision {
    pub handler: HandlerName,
    pub message: String,
    pub properties: Value,
    /// When present, the tool must run and the hydrator supplies the final
    /// properties and message.
    pub tool_call: Option<ToolCallRequest>,
}

/// The resolver's verdict for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Reply in plain text; render nothing.
    DirectReply { message: String },
    /// Render the named handler.
    Render(RenderDecision),
}

impl Decision {
    pub fn reply(message: impl Into<String>) -> Self {
        Decision::DirectReply {
            message: message.into(),
        }
    }

    pub fn render(handler: impl Into<HandlerName>, message: impl Into<String>, properties: Value) -> Self {
        Decision::Render(RenderDecision {
            handler: handler.into(),
            message: message.into(),
            properties,
            tool_call: None,
        })
    }

    pub fn render_with_tool(
        handler: impl Into<HandlerName>,
        message: impl Into<String>,
        tool_call: ToolCallRequest,
    ) -> Self {
        Decision::Render(RenderDecision {
            handler: handler.into(),
            message: message.into(),
            properties: Value::Object(Map::new()),
            tool_call: Some(tool_call),
        })
    }

    /// Handler named by the decision, if any.
    pub fn handler(&self) -> Option<&HandlerName> {
        match self {
            Decision::DirectReply { .. } => None,
            Decision::Render(render) => Some(&render.handler),
        }
    }
}

/// JSON shape of a decision as produced by remote resolvers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDecision {
    #[serde(default)]
    pub component_name: Option<HandlerName>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_request: Option<ToolCallRequest>,
}

impl WireDecision {
    /// Convert into a `Decision`, rejecting malformed combinations.
    pub fn into_decision(self) -> Result<Decision> {
        let message = self
            .message
            .ok_or_else(|| anyhow!("decision is missing `message`"))?;

        let Some(handler) = self.component_name else {
            if self.tool_call_request.is_some() {
                return Err(anyhow!(
                    "decision carries a `toolCallRequest` but names no component"
                ));
            }
            return Ok(Decision::DirectReply { message });
        };

        let properties = match self.props {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(props @ Value::Object(_)) => props,
            Some(other) => {
                return Err(anyhow!(
                    "decision `props` for `{}` must be an object, got {}",
                    handler,
                    other
                ));
            }
        };

        Ok(Decision::Render(RenderDecision {
            handler,
            message,
            properties,
            tool_call: self.tool_call_request,
        }))
    }
}

impl From<Decision> for WireDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::DirectReply { message } => WireDecision {
                component_name: None,
                message: Some(message),
                props: None,
                tool_call_request: None,
            },
            Decision::Render(render) => WireDecision {
                component_name: Some(render.handler),
                message: Some(render.message),
                props: Some(render.properties),
                tool_call_request: render.tool_call,
            },
        }
    }
}
