use anyhow::{Context, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{collections::BTreeMap, env, fs, path::Path, path::PathBuf, sync::Arc, time::Duration};
use url::Url;

use crate::error::{DispatchError, DispatchResult};
use crate::registry::HandlerDefinition;
use crate::resolver::HttpBackend;
use crate::tools::{HttpTool, ToolDefinition, ToolParameter};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydraConfig {
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default = "default_validate_schemas")]
    pub validate_schemas: bool,
    #[serde(default)]
    pub handlers: Vec<HandlerManifest>,
}

impl Default for HydraConfig {
    fn default() -> Self {
        Self {
            backend: None,
            validate_schemas: true,
            handlers: Vec::new(),
        }
    }
}

/// Remote decision backend (resolver, hydrator and registration sink).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub props_schema: Value,
    #[serde(default)]
    pub tools: Vec<ToolManifest>,
}

/// Tool declared in a handler manifest, called over HTTP.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_validate_schemas() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn empty_schema() -> Value {
    json!({ "type": "object" })
}

impl HydraConfig {
    /// Parse a config document and expand `${VAR}` references.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let cfg: HydraConfig = serde_json::from_str(raw).context("invalid hydra config")?;
        Ok(cfg.expand())
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    fn expand(mut self) -> Self {
        if let Some(backend) = self.backend.as_mut() {
            backend.url = expand_env_vars(&backend.url);
            expand_headers(&mut backend.headers);
        }
        for handler in &mut self.handlers {
            for tool in &mut handler.tools {
                tool.url = expand_env_vars(&tool.url);
                expand_headers(&mut tool.headers);
            }
        }
        self
    }

    /// Build handler definitions whose tools call their manifest URLs.
    pub fn handler_definitions(&self, client: &Client) -> DispatchResult<Vec<HandlerDefinition>> {
        self.handlers
            .iter()
            .map(|manifest| manifest.to_definition(client))
            .collect()
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn parsed_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.url).with_context(|| format!("invalid backend url `{}`", self.url))
    }

    pub fn connect(&self) -> anyhow::Result<HttpBackend> {
        let backend = HttpBackend::new(self.parsed_url()?, self.timeout())?;
        Ok(backend.with_headers(self.headers.clone()))
    }
}

impl HandlerManifest {
    pub fn to_definition(&self, client: &Client) -> DispatchResult<HandlerDefinition> {
        let tools = self
            .tools
            .iter()
            .map(|tool| tool.to_definition(&self.name, client))
            .collect::<DispatchResult<Vec<_>>>()?;

        HandlerDefinition::new(
            self.name.as_str(),
            self.description.as_str(),
            self.props_schema.clone(),
            tools,
        )
    }
}

impl ToolManifest {
    fn to_definition(&self, handler: &str, client: &Client) -> DispatchResult<ToolDefinition> {
        Url::parse(&self.url).map_err(|e| {
            DispatchError::Configuration(format!(
                "tool `{}.{}` has invalid url `{}`: {}",
                handler, self.name, self.url, e
            ))
        })?;

        let callable = HttpTool::new(client.clone(), self.url.as_str()).with_headers(self.headers.clone());
        let mut tool = ToolDefinition::new(self.name.as_str(), Arc::new(callable))
            .with_parameters(self.parameters.iter().cloned());
        if let Some(description) = &self.description {
            tool = tool.with_description(description.as_str());
        }
        Ok(tool)
    }
}

pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    resolve_config_path_from(env::var("HYDRA_CONFIG").ok(), env::var("XDG_CONFIG_HOME").ok())
}

fn resolve_config_path_from(
    explicit: Option<String>,
    xdg_config_home: Option<String>,
) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(PathBuf::from(p));
    }

    if let Some(xdg) = xdg_config_home {
        let candidate = PathBuf::from(xdg).join("hydra").join("hydra.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("hydra.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow!(
        "Could not find hydra.json (set HYDRA_CONFIG or create ./hydra.json)"
    ))
}

/// Load the config from `path`, or from the resolved default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<HydraConfig> {
    match path {
        Some(path) => HydraConfig::from_path(path),
        None => HydraConfig::from_path(&resolve_config_path()?),
    }
}

fn expand_headers(headers: &mut BTreeMap<String, String>) {
    for val in headers.values_mut() {
        *val = expand_env_vars(val);
    }
}

/// Replace `${NAME}` with the value of environment variable `NAME`.
/// Unset variables and unterminated references are kept as written.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let reference = &rest[start..];
        let Some(close) = reference.find('}') else {
            rest = reference;
            break;
        };

        let name = &reference[2..close];
        match env::var(name) {
            Ok(val) => out.push_str(&val),
            Err(_) => out.push_str(&reference[..=close]),
        }
        rest = &reference[close + 1..];
    }

    out.push_str(rest);
    out
}
