//! Request dispatch: the decision-and-fulfillment cycle.
//!
//! A `generate` call records the request, asks the resolver for a decision,
//! optionally runs one of the chosen handler's tools and hydrates the result,
//! then records the reply. Each conversation owns its own history behind an
//! async mutex held for the whole dispatch, so requests on one conversation
//! are serialized while different conversations proceed independently.
//!
//! ```text
//! Idle -> AwaitingDecision -> DirectReply
//!                          -> Complete
//!                          -> ToolCallRequired -> AwaitingToolResult
//!                                              -> AwaitingHydration -> Complete
//! (any) -> Failed
//! ```

mod response;

pub use response::{ComponentChoice, GenerateResponse};

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::decision::{Decision, RenderDecision};
use crate::error::{DispatchError, DispatchResult};
use crate::history::{ConversationHistory, ConversationTurn};
use crate::registry::{HandlerDefinition, HandlerRegistry, RegistrationSink};
use crate::resolver::{DecisionResolver, Hydrator};
use crate::tools::{ToolDefinition, ToolInvoker};
use crate::types::{ConversationId, HandlerName};

/// Stage of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingDecision,
    DirectReply,
    ToolCallRequired,
    AwaitingToolResult,
    AwaitingHydration,
    Complete,
    Failed,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::AwaitingDecision => "awaiting_decision",
            DispatchState::DirectReply => "direct_reply",
            DispatchState::ToolCallRequired => "tool_call_required",
            DispatchState::AwaitingToolResult => "awaiting_tool_result",
            DispatchState::AwaitingHydration => "awaiting_hydration",
            DispatchState::Complete => "complete",
            DispatchState::Failed => "failed",
        }
    }

    /// Whether the dispatch has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::DirectReply | DispatchState::Complete | DispatchState::Failed
        )
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(conversation: &ConversationId, state: DispatchState) {
    debug!(conversation = %conversation, state = %state, "Dispatch transition");
}

/// A conversation's history. `closed` is set under the lock when the
/// conversation is ended, so waiters re-resolve the session.
#[derive(Default)]
struct Session {
    history: ConversationHistory,
    closed: bool,
}

type SessionHandle = Arc<Mutex<Session>>;

/// Orchestrates registry, history, resolver, tool invoker and hydrator.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    resolver: Arc<dyn DecisionResolver>,
    hydrator: Arc<dyn Hydrator>,
    sink: Option<Arc<dyn RegistrationSink>>,
    invoker: ToolInvoker,
    sessions: DashMap<ConversationId, SessionHandle>,
    validate_schemas: bool,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn validates_schemas(&self) -> bool {
        self.validate_schemas
    }

    /// Register a handler from its parts.
    pub async fn register(
        &self,
        name: impl Into<HandlerName>,
        description: impl Into<String>,
        props_schema: Value,
        tools: Vec<ToolDefinition>,
    ) -> DispatchResult<()> {
        let definition = HandlerDefinition::new(name, description, props_schema, tools)?;
        self.register_handler(definition).await.map(|_| ())
    }

    /// Register a prebuilt handler, consulting the registration sink first.
    ///
    /// A name that is already taken fails before the sink is contacted. A
    /// declined or failed sink call leaves the registry unchanged.
    pub async fn register_handler(
        &self,
        definition: HandlerDefinition,
    ) -> DispatchResult<Arc<HandlerDefinition>> {
        let name = definition.name().clone();
        if self.registry.contains(name.as_str()) {
            return Err(DispatchError::DuplicateHandler(name));
        }

        if let Some(sink) = &self.sink {
            let descriptor = definition.descriptor();
            match sink.save(&descriptor).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(handler = %name, "Registration declined by sink");
                    return Err(DispatchError::RegistrationRejected(name));
                }
                Err(e) => {
                    warn!(handler = %name, error = %e, "Registration sink failed");
                    return Err(DispatchError::RegistrationSink {
                        handler: name,
                        source: e.into(),
                    });
                }
            }
        }

        self.registry.insert(definition)
    }

    /// Handle for a conversation, creating its session if needed.
    pub fn conversation(&self, id: impl Into<ConversationId>) -> Conversation<'_> {
        let id = id.into();
        self.session(&id);
        Conversation {
            dispatcher: self,
            id,
        }
    }

    /// Start a conversation with a fresh random id.
    pub fn start_conversation(&self) -> Conversation<'_> {
        self.conversation(ConversationId::generate())
    }

    /// Ids of all known conversations.
    pub fn conversations(&self) -> Vec<ConversationId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop a conversation's history. Returns `false` if it was unknown.
    ///
    /// Waits for an in-flight dispatch on the conversation to finish first.
    /// Requests queued behind it start a fresh conversation under the same id.
    pub async fn end_conversation(&self, id: &ConversationId) -> bool {
        let Some(session) = self.sessions.get(id).map(|entry| entry.value().clone()) else {
            return false;
        };

        let mut state = session.lock().await;
        if state.closed {
            return false;
        }
        state.closed = true;
        self.sessions
            .remove_if(id, |_, current| Arc::ptr_eq(current, &session));
        debug!(conversation = %id, turns = state.history.len(), "Conversation ended");
        true
    }

    /// Snapshot of a conversation's turns.
    pub async fn history(&self, id: &ConversationId) -> DispatchResult<Vec<ConversationTurn>> {
        let session = self
            .sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::ConversationNotFound(id.clone()))?;

        let state = session.lock().await;
        if state.closed {
            return Err(DispatchError::ConversationNotFound(id.clone()));
        }
        Ok(state.history.all().to_vec())
    }

    /// Dispatch one request on `id`.
    ///
    /// The request is recorded before resolution. On success the reply is
    /// recorded as a system turn before returning; on failure nothing beyond
    /// the request is recorded.
    pub async fn generate(
        &self,
        id: &ConversationId,
        request: impl Into<String>,
    ) -> DispatchResult<GenerateResponse> {
        let request = request.into();
        loop {
            let session = self.session(id);
            let mut state = session.lock().await;
            if state.closed {
                continue;
            }
            return self.run(id, &mut state.history, request).await;
        }
    }

    async fn run(
        &self,
        id: &ConversationId,
        history: &mut ConversationHistory,
        request: String,
    ) -> DispatchResult<GenerateResponse> {
        enter(id, DispatchState::Idle);
        history.append(ConversationTurn::requester(request));

        match self.dispatch(id, history).await {
            Ok(response) => {
                history.append(ConversationTurn::system(response.message()));
                info!(
                    conversation = %id,
                    handler = ?response.handler_name().map(HandlerName::as_str),
                    "Request fulfilled"
                );
                Ok(response)
            }
            Err(e) => {
                enter(id, DispatchState::Failed);
                warn!(conversation = %id, kind = e.kind(), error = %e, "Dispatch failed");
                Err(e)
            }
        }
    }

    fn session(&self, id: &ConversationId) -> SessionHandle {
        self.sessions.entry(id.clone()).or_default().value().clone()
    }

    // Takes the history by shared reference: only `generate` appends.
    async fn dispatch(
        &self,
        id: &ConversationId,
        history: &ConversationHistory,
    ) -> DispatchResult<GenerateResponse> {
        enter(id, DispatchState::AwaitingDecision);
        let catalog = self.registry.snapshot();

        let decision = self
            .resolver
            .resolve(history.all(), &catalog)
            .await
            .map_err(DispatchError::resolver)?;

        let render = match decision {
            Decision::DirectReply { message } => {
                enter(id, DispatchState::DirectReply);
                return Ok(GenerateResponse::Text { message });
            }
            Decision::Render(render) => render,
        };

        let RenderDecision {
            handler,
            message,
            properties,
            tool_call,
        } = render;

        let handler = self.registry.lookup(handler.as_str())?;

        let (properties, message) = match tool_call {
            None => (properties, message),
            Some(call) => {
                enter(id, DispatchState::ToolCallRequired);
                enter(id, DispatchState::AwaitingToolResult);
                let tool_result = self.invoker.invoke(&handler, &call).await?;

                enter(id, DispatchState::AwaitingHydration);
                let descriptor = handler.descriptor();
                let hydrated = self
                    .hydrator
                    .hydrate(history.all(), &descriptor, &tool_result)
                    .await
                    .map_err(DispatchError::hydrator)?;
                (hydrated.properties, hydrated.message)
            }
        };

        if self.validate_schemas {
            handler.validate_properties(&properties)?;
        }

        enter(id, DispatchState::Complete);
        Ok(GenerateResponse::Component(ComponentChoice::new(
            handler.name().clone(),
            properties,
            message,
        )))
    }
}

/// A single conversation on a dispatcher.
pub struct Conversation<'a> {
    dispatcher: &'a Dispatcher,
    id: ConversationId,
}

impl Conversation<'_> {
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub async fn generate(&self, request: impl Into<String>) -> DispatchResult<GenerateResponse> {
        self.dispatcher.generate(&self.id, request).await
    }

    /// Snapshot of this conversation's turns.
    pub async fn history(&self) -> DispatchResult<Vec<ConversationTurn>> {
        self.dispatcher.history(&self.id).await
    }
}

/// Builder for `Dispatcher`. Resolver and hydrator are required.
pub struct DispatcherBuilder {
    registry: Option<Arc<HandlerRegistry>>,
    resolver: Option<Arc<dyn DecisionResolver>>,
    hydrator: Option<Arc<dyn Hydrator>>,
    sink: Option<Arc<dyn RegistrationSink>>,
    validate_schemas: bool,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            resolver: None,
            hydrator: None,
            sink: None,
            validate_schemas: true,
        }
    }

    /// Use an existing registry instead of an empty one.
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn resolver<R: DecisionResolver + 'static>(mut self, resolver: Arc<R>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn hydrator<H: Hydrator + 'static>(mut self, hydrator: Arc<H>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    pub fn registration_sink<S: RegistrationSink + 'static>(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Check final properties against handler schemas (default: on).
    pub fn validate_schemas(mut self, enabled: bool) -> Self {
        self.validate_schemas = enabled;
        self
    }

    pub fn build(self) -> DispatchResult<Dispatcher> {
        let resolver = self
            .resolver
            .ok_or_else(|| DispatchError::Configuration("no decision resolver set".to_string()))?;
        let hydrator = self
            .hydrator
            .ok_or_else(|| DispatchError::Configuration("no hydrator set".to_string()))?;

        Ok(Dispatcher {
            registry: self.registry.unwrap_or_default(),
            resolver,
            hydrator,
            sink: self.sink,
            invoker: ToolInvoker::new(),
            sessions: DashMap::new(),
            validate_schemas: self.validate_schemas,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
