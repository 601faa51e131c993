//! Executes a decision's tool call against the chosen handler.

use serde_json::Value;
use tracing::{debug, warn};

use crate::decision::ToolCallRequest;
use crate::error::{DispatchError, DispatchResult};
use crate::registry::HandlerDefinition;

/// Binds positional tool arguments and runs the tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolInvoker;

impl ToolInvoker {
    pub fn new() -> Self {
        Self
    }

    /// Run `request` against `handler`'s tools and return the raw result.
    ///
    /// Value `i` binds to declared parameter `i`; a count mismatch is a
    /// `ToolArity` error and the callable is never reached.
    pub async fn invoke(
        &self,
        handler: &HandlerDefinition,
        request: &ToolCallRequest,
    ) -> DispatchResult<Value> {
        let tool = handler
            .tool(&request.tool_name)
            .ok_or_else(|| DispatchError::ToolNotFound {
                handler: handler.name().clone(),
                tool: request.tool_name.clone(),
            })?;

        let expected = tool.parameters().len();
        let actual = request.parameters.len();
        if expected != actual {
            return Err(DispatchError::ToolArity {
                handler: handler.name().clone(),
                tool: tool.name().clone(),
                expected,
                actual,
            });
        }

        let args = request.values();
        for (param, value) in tool.parameters().iter().zip(&args) {
            if !param.ty.matches(value) {
                warn!(
                    handler = %handler.name(),
                    tool = %tool.name(),
                    parameter = %param.name,
                    expected = ?param.ty,
                    "Tool argument does not match declared type"
                );
            }
        }

        debug!(handler = %handler.name(), tool = %tool.name(), "Invoking tool");

        tool.callable()
            .call(args)
            .await
            .map_err(|e| DispatchError::ToolExecution {
                handler: handler.name().clone(),
                tool: tool.name().clone(),
                source: e.into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterType, ToolDefinition};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recording_handler(calls: Arc<Mutex<Vec<Vec<Value>>>>) -> HandlerDefinition {
        let tool = ToolDefinition::from_fn("plot", move |args| {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(args.clone());
                Ok(json!({"points": args}))
            }
        })
        .with_parameter("x", ParameterType::Any)
        .with_parameter("y", ParameterType::Any);

        HandlerDefinition::new("chart", "Chart", json!({}), vec![tool]).unwrap()
    }

    #[tokio::test]
    async fn test_arguments_bound_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler = recording_handler(calls.clone());

        let request = ToolCallRequest::positional("plot", [json!("a"), json!("b")]);
        let result = ToolInvoker::new().invoke(&handler, &request).await.unwrap();

        assert_eq!(result, json!({"points": ["a", "b"]}));
        assert_eq!(*calls.lock().unwrap(), vec![vec![json!("a"), json!("b")]]);
    }

    #[tokio::test]
    async fn test_too_few_arguments_is_arity_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler = recording_handler(calls.clone());

        let request = ToolCallRequest::positional("plot", [json!("a")]);
        let err = ToolInvoker::new().invoke(&handler, &request).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::ToolArity { expected: 2, actual: 1, .. }
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let handler = recording_handler(Arc::new(Mutex::new(Vec::new())));
        let request = ToolCallRequest::positional("scatter", [json!(1), json!(2)]);

        let err = ToolInvoker::new().invoke(&handler, &request).await.unwrap_err();
        assert!(matches!(err, DispatchError::ToolNotFound { ref tool, .. } if tool.as_str() == "scatter"));
    }

    #[tokio::test]
    async fn test_callable_failure_is_execution_error() {
        let tool = ToolDefinition::from_fn("fetchSeries", |_args| async {
            Err(anyhow::anyhow!("upstream timed out"))
        })
        .with_parameter("symbol", ParameterType::String);
        let handler = HandlerDefinition::new("chart", "Chart", json!({}), vec![tool]).unwrap();

        let request = ToolCallRequest::positional("fetchSeries", [json!("AAPL")]);
        let err = ToolInvoker::new().invoke(&handler, &request).await.unwrap_err();

        assert!(matches!(err, DispatchError::ToolExecution { .. }));
        assert!(err.to_string().contains("upstream timed out"));
    }

    #[tokio::test]
    async fn test_type_mismatch_still_invokes() {
        let tool = ToolDefinition::from_fn("fetchSeries", |args| async move { Ok(args[0].clone()) })
            .with_parameter("symbol", ParameterType::String);
        let handler = HandlerDefinition::new("chart", "Chart", json!({}), vec![tool]).unwrap();

        let request = ToolCallRequest::positional("fetchSeries", [json!(42)]);
        let result = ToolInvoker::new().invoke(&handler, &request).await.unwrap();
        assert_eq!(result, json!(42));
    }
}
