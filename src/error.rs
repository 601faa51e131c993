//! Error types for registration and dispatch.
//!
//! Every failure of a `generate` call surfaces as one of these kinds. None of
//! them is retried by the dispatcher.

use axum::http::StatusCode;

use crate::types::{ConversationId, HandlerName, ToolName};

/// Boxed error carried by failures of external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while registering handlers or dispatching a request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A handler with this name is already registered.
    #[error("A handler with name `{0}` is already registered. Try another name.")]
    DuplicateHandler(HandlerName),

    /// A handler definition declares two tools with the same name.
    #[error("Handler `{handler}` declares tool `{tool}` more than once")]
    DuplicateTool { handler: HandlerName, tool: ToolName },

    /// A handler's property schema is not usable.
    #[error("Invalid property schema for handler `{handler}`: {reason}")]
    InvalidSchema { handler: HandlerName, reason: String },

    /// The registration sink declined the handler.
    #[error("Registration of handler `{0}` was rejected")]
    RegistrationRejected(HandlerName),

    /// The registration sink could not be reached.
    #[error("Registration sink failed for handler `{handler}`: {source}")]
    RegistrationSink {
        handler: HandlerName,
        #[source]
        source: BoxError,
    },

    /// The decision named a handler that is not in the registry.
    #[error("Handler `{0}` was selected but it is not registered")]
    HandlerNotFound(HandlerName),

    /// The decision named a tool the handler does not declare.
    #[error("Handler `{handler}` has no tool named `{tool}`")]
    ToolNotFound { handler: HandlerName, tool: ToolName },

    /// The decision supplied the wrong number of tool parameters.
    #[error("Tool `{handler}.{tool}` expects {expected} parameter(s), got {actual}")]
    ToolArity {
        handler: HandlerName,
        tool: ToolName,
        expected: usize,
        actual: usize,
    },

    /// The tool callable itself failed.
    #[error("Tool `{handler}.{tool}` failed: {source}")]
    ToolExecution {
        handler: HandlerName,
        tool: ToolName,
        #[source]
        source: BoxError,
    },

    /// The decision resolver failed or produced malformed output.
    #[error("Decision resolver failed: {0}")]
    Resolver(#[source] BoxError),

    /// The hydrator failed or produced malformed output.
    #[error("Hydrator failed: {0}")]
    Hydrator(#[source] BoxError),

    /// Final properties do not conform to the handler's schema.
    #[error("Properties for handler `{handler}` do not match its schema: {reason}")]
    SchemaMismatch { handler: HandlerName, reason: String },

    /// No conversation with this id has been started.
    #[error("Conversation `{0}` not found")]
    ConversationNotFound(ConversationId),

    /// The dispatcher was built without a required collaborator.
    #[error("Dispatcher misconfigured: {0}")]
    Configuration(String),
}

/// Result type for registration and dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Wrap a resolver failure.
    pub fn resolver(err: impl Into<BoxError>) -> Self {
        Self::Resolver(err.into())
    }

    /// Wrap a hydrator failure.
    pub fn hydrator(err: impl Into<BoxError>) -> Self {
        Self::Hydrator(err.into())
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateHandler(_) => "duplicate_handler",
            Self::DuplicateTool { .. } => "duplicate_tool",
            Self::InvalidSchema { .. } => "invalid_schema",
            Self::RegistrationRejected(_) => "registration_rejected",
            Self::RegistrationSink { .. } => "registration_sink",
            Self::HandlerNotFound(_) => "handler_not_found",
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::ToolArity { .. } => "tool_arity",
            Self::ToolExecution { .. } => "tool_execution",
            Self::Resolver(_) => "resolver",
            Self::Hydrator(_) => "hydrator",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::ConversationNotFound(_) => "conversation_not_found",
            Self::Configuration(_) => "configuration",
        }
    }

    /// HTTP status used when this error is returned by the API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateHandler(_) | Self::DuplicateTool { .. } => StatusCode::CONFLICT,
            Self::InvalidSchema { .. } => StatusCode::BAD_REQUEST,
            Self::RegistrationRejected(_) => StatusCode::FORBIDDEN,
            Self::ConversationNotFound(_) => StatusCode::NOT_FOUND,
            Self::SchemaMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RegistrationSink { .. }
            | Self::HandlerNotFound(_)
            | Self::ToolNotFound { .. }
            | Self::ToolArity { .. }
            | Self::ToolExecution { .. }
            | Self::Resolver(_)
            | Self::Hydrator(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_handler_message() {
        let err = DispatchError::DuplicateHandler(HandlerName::new("chart"));
        assert_eq!(
            err.to_string(),
            "A handler with name `chart` is already registered. Try another name."
        );
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_arity_message() {
        let err = DispatchError::ToolArity {
            handler: HandlerName::new("chart"),
            tool: ToolName::new("fetchSeries"),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Tool `chart.fetchSeries` expects 2 parameter(s), got 1"
        );
        assert_eq!(err.kind(), "tool_arity");
    }

    #[test]
    fn test_resolver_keeps_source() {
        use std::error::Error;

        let err = DispatchError::resolver(anyhow::anyhow!("backend returned 500"));
        assert!(err.to_string().contains("backend returned 500"));
        assert!(err.source().is_some());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_schema_mismatch_status() {
        let err = DispatchError::SchemaMismatch {
            handler: HandlerName::new("chart"),
            reason: "missing required property `data`".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
