// Core modules
mod config;
mod decision;
mod error;
mod history;
mod registry;
mod schema;
mod types;
pub mod api;

// Dispatch and its collaborators
mod dispatcher;
mod resolver;
mod tools;

// Re-export key types and functions
pub use config::{BackendConfig, HandlerManifest, HydraConfig, ToolManifest, load_config, resolve_config_path};
pub use decision::{Decision, RenderDecision, ToolCallParameter, ToolCallRequest, WireDecision};
pub use error::{BoxError, DispatchError, DispatchResult};
pub use history::{ConversationHistory, ConversationTurn, Sender};
pub use registry::{
    HandlerCatalog, HandlerDefinition, HandlerDescriptor, HandlerRegistry, RegistrationSink, SinkFuture,
};
pub use schema::PropertySchema;
pub use types::{ConversationId, HandlerName, ToolName};

pub use dispatcher::{
    ComponentChoice, Conversation, DispatchState, Dispatcher, DispatcherBuilder, GenerateResponse,
};
pub use resolver::{CollaboratorFuture, DecisionResolver, HttpBackend, HydratedChoice, Hydrator};
pub use tools::{
    FnTool, HttpTool, ParameterType, ToolCallable, ToolDefinition, ToolDescriptor, ToolFuture, ToolInvoker,
    ToolParameter,
};

use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::info;

/// Convenience function to create a dispatcher backed by the configured
/// remote backend.
///
/// The backend serves as resolver, hydrator and registration sink. Every
/// handler in the config manifest is registered before returning.
pub async fn create_dispatcher(config: &HydraConfig) -> Result<Dispatcher> {
    let backend_config = config
        .backend
        .as_ref()
        .ok_or_else(|| anyhow!("config has no `backend` section"))?;
    let backend = Arc::new(backend_config.connect()?);
    info!("Using decision backend at {}", backend.base_url());

    let dispatcher = Dispatcher::builder()
        .resolver(backend.clone())
        .hydrator(backend.clone())
        .registration_sink(backend.clone())
        .validate_schemas(config.validate_schemas)
        .build()?;

    for definition in config.handler_definitions(backend.client())? {
        dispatcher.register_handler(definition).await?;
    }
    info!("Registered {} handler(s)", dispatcher.registry().len());

    Ok(dispatcher)
}
