//! Boundaries to the external decision resolver and hydrator.
//!
//! The dispatcher is constructed with concrete implementations of these
//! traits. Both return `anyhow::Result`; the dispatcher maps failures to
//! `DispatchError::Resolver` and `DispatchError::Hydrator`.

mod http;

pub use http::HttpBackend;

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decision::Decision;
use crate::history::ConversationTurn;
use crate::registry::{HandlerCatalog, HandlerDescriptor};

/// Boxed future returned by collaborator calls.
pub type CollaboratorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Chooses between a text reply and a handler for the latest request.
///
/// Implementations must be deterministic for identical inputs when used in
/// tests. Malformed output must be returned as an error, never as an empty
/// decision.
pub trait DecisionResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        history: &'a [ConversationTurn],
        handlers: &'a HandlerCatalog,
    ) -> CollaboratorFuture<'a, Decision>;
}

/// Turns a tool result into final handler properties and a reply.
pub trait Hydrator: Send + Sync {
    fn hydrate<'a>(
        &'a self,
        history: &'a [ConversationTurn],
        handler: &'a HandlerDescriptor,
        tool_result: &'a Value,
    ) -> CollaboratorFuture<'a, HydratedChoice>;
}

/// Output of a hydrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedChoice {
    #[serde(rename = "props")]
    pub properties: Value,
    pub message: String,
}

impl HydratedChoice {
    pub fn new(properties: Value, message: impl Into<String>) -> Self {
        Self {
            properties,
            message: message.into(),
        }
    }
}
