//! Remote decision backend reached over HTTP.
//!
//! One backend serves three endpoints under its base URL:
//! - `components/choose`: resolve a decision
//! - `components/hydrate`: hydrate a handler with a tool result
//! - `components/register`: accept or decline a handler registration

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::{CollaboratorFuture, DecisionResolver, HydratedChoice, Hydrator};
use crate::decision::{Decision, WireDecision};
use crate::history::ConversationTurn;
use crate::registry::{HandlerCatalog, HandlerDescriptor, RegistrationSink, SinkFuture};

const USER_AGENT: &str = concat!("hydra-orchestrator/", env!("CARGO_PKG_VERSION"));

/// HTTP client for a remote resolver/hydrator backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    headers: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct SaveResponse {
    success: bool,
}

impl HttpBackend {
    /// Create a backend client with the given request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            headers: BTreeMap::new(),
        })
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying client, for sharing with `HttpTool`s.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "Calling decision backend");

        let mut request = self.client.post(&url).json(&body);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} returned {}: {}", url, status, text));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("{} returned a malformed body", url))
    }
}

impl DecisionResolver for HttpBackend {
    fn resolve<'a>(
        &'a self,
        history: &'a [ConversationTurn],
        handlers: &'a HandlerCatalog,
    ) -> CollaboratorFuture<'a, Decision> {
        Box::pin(async move {
            let body = json!({
                "messageHistory": history,
                "availableComponents": handlers,
            });
            let wire: WireDecision = self.post("components/choose", body).await?;
            wire.into_decision()
        })
    }
}

impl Hydrator for HttpBackend {
    fn hydrate<'a>(
        &'a self,
        history: &'a [ConversationTurn],
        handler: &'a HandlerDescriptor,
        tool_result: &'a Value,
    ) -> CollaboratorFuture<'a, HydratedChoice> {
        Box::pin(async move {
            let body = json!({
                "messageHistory": history,
                "component": handler,
                "toolResponse": tool_result,
            });
            self.post("components/hydrate", body).await
        })
    }
}

impl RegistrationSink for HttpBackend {
    fn save<'a>(&'a self, handler: &'a HandlerDescriptor) -> SinkFuture<'a> {
        Box::pin(async move {
            let body = serde_json::to_value(handler)?;
            let response: SaveResponse = self.post("components/register", body).await?;
            Ok(response.success)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_path() {
        let backend = HttpBackend::new(
            Url::parse("http://localhost:4000/api/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            backend.endpoint("components/choose"),
            "http://localhost:4000/api/components/choose"
        );

        let backend = HttpBackend::new(
            Url::parse("http://localhost:4000").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            backend.endpoint("components/hydrate"),
            "http://localhost:4000/components/hydrate"
        );
    }

    #[test]
    fn test_hydrated_choice_wire_shape() {
        let choice: HydratedChoice =
            serde_json::from_value(json!({"props": {"data": [1, 2, 3]}, "message": "Here is AAPL"}))
                .unwrap();
        assert_eq!(choice.properties, json!({"data": [1, 2, 3]}));
        assert_eq!(choice.message, "Here is AAPL");
    }
}
