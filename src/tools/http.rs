//! Tool callable backed by a remote HTTP endpoint.

use std::collections::BTreeMap;

use anyhow::Context;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::definition::{ToolCallable, ToolFuture};

/// Calls a tool by POSTing its ordered arguments as `{"arguments": [...]}`.
///
/// The JSON response body is returned verbatim.
pub struct HttpTool {
    client: Client,
    url: String,
    headers: BTreeMap<String, String>,
}

impl HttpTool {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ToolCallable for HttpTool {
    fn call(&self, args: Vec<Value>) -> ToolFuture<'_> {
        Box::pin(async move {
            debug!(url = %self.url, args = args.len(), "Calling HTTP tool");

            let mut request = self.client.post(&self.url).json(&json!({ "arguments": args }));
            for (name, value) in &self.headers {
                request = request.header(name, value);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("request to {} failed", self.url))?
                .error_for_status()
                .with_context(|| format!("{} returned an error status", self.url))?;

            let body = response
                .json::<Value>()
                .await
                .with_context(|| format!("{} returned a non-JSON body", self.url))?;

            Ok(body)
        })
    }
}
