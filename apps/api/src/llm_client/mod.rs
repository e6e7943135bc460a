/// LLM Client — the single point of entry for all model calls in LayoutForge.
///
/// ARCHITECTURAL RULE: No other module may talk to a provider API directly.
/// Feature code builds a `CompletionRequest` and hands it to `CompletionEngine`.
///
/// Two provider shapes are normalised behind `ProviderClient`:
/// - schema-native: honours an output schema server-side, trusted to return JSON
/// - chat-completion: text only; JSON mode becomes prompt augmentation + salvage
///
/// No retries happen here. A failed call surfaces once as `LlmError::Provider`.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub mod chat_completion;
pub mod prompts;
pub mod salvage;
pub mod schema;
pub mod schema_native;
pub mod sse;

use chat_completion::{ChatCompletionClient, DEFAULT_CHAT_COMPLETION_BASE_URL};
use prompts::augment_system_for_json;
use salvage::{salvage, SalvageError};
use schema::SchemaNode;
use schema_native::SchemaNativeClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("No JSON found in model output: {snippet:?}")]
    Extraction { snippet: String },

    #[error("Model output is not valid JSON: {original}; after repair: {repaired}")]
    Parse { original: String, repaired: String },

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<SalvageError> for LlmError {
    fn from(err: SalvageError) -> Self {
        match err {
            SalvageError::Extraction { snippet } => LlmError::Extraction { snippet },
            SalvageError::Parse { original, repaired } => LlmError::Parse { original, repaired },
        }
    }
}

/// Provider-neutral request. Both provider paths accept exactly this.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub output_schema: Option<SchemaNode>,
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn json(prompt: impl Into<String>, schema: SchemaNode) -> Self {
        Self {
            prompt: prompt.into(),
            output_schema: Some(schema),
            json_mode: true,
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }
}

/// Caller-selected provider. Never inferred from which keys happen to be set.
#[derive(Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProviderConfig {
    SchemaNative {
        #[serde(default)]
        api_key: Option<String>,
    },
    ChatCompletion {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
}

// Keys stay out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::SchemaNative { api_key } => f
                .debug_struct("SchemaNative")
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .finish(),
            ProviderConfig::ChatCompletion {
                api_key,
                base_url,
                model,
            } => f
                .debug_struct("ChatCompletion")
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
        }
    }
}

/// Process-wide provider settings loaded once at startup.
#[derive(Debug, Clone)]
pub struct ProviderDefaults {
    /// Fallback key for the schema-native provider. The chat-completion
    /// provider has no fallback.
    pub schema_native_api_key: Option<String>,
    pub schema_native_base_url: String,
    pub timeout: Duration,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ProviderConfig {
    /// Validates credentials and builds the matching client. No network call
    /// is made; a missing field fails here with `LlmError::Config`.
    pub fn connect(
        &self,
        http: &Client,
        defaults: &ProviderDefaults,
    ) -> Result<Arc<dyn ProviderClient>, LlmError> {
        match self {
            ProviderConfig::SchemaNative { api_key } => {
                let key = non_empty(api_key.as_deref())
                    .or_else(|| non_empty(defaults.schema_native_api_key.as_deref()))
                    .ok_or_else(|| {
                        LlmError::Config(
                            "schema-native provider requires api_key (or the API_KEY fallback)"
                                .to_string(),
                        )
                    })?;
                Ok(Arc::new(SchemaNativeClient::new(
                    http.clone(),
                    key.to_string(),
                    defaults.schema_native_base_url.clone(),
                    defaults.timeout,
                )))
            }
            ProviderConfig::ChatCompletion {
                api_key,
                base_url,
                model,
            } => {
                let key = non_empty(api_key.as_deref()).ok_or_else(|| {
                    LlmError::Config("chat-completion provider requires api_key".to_string())
                })?;
                let model = non_empty(model.as_deref()).ok_or_else(|| {
                    LlmError::Config("chat-completion provider requires model".to_string())
                })?;
                let base_url =
                    non_empty(base_url.as_deref()).unwrap_or(DEFAULT_CHAT_COMPLETION_BASE_URL);
                Ok(Arc::new(ChatCompletionClient::new(
                    http.clone(),
                    key.to_string(),
                    base_url.to_string(),
                    model.to_string(),
                    defaults.timeout,
                )))
            }
        }
    }
}

/// Incremental text fragments in arrival order.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// One provider's wire protocol. Implementations only translate requests and
/// responses; JSON salvage and prompt augmentation belong to the engine.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when the provider enforces `output_schema` server-side.
    fn native_schema(&self) -> bool;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError>;
}

/// Provider-agnostic completion engine.
#[derive(Clone)]
pub struct CompletionEngine {
    client: Arc<dyn ProviderClient>,
}

impl CompletionEngine {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }

    pub fn from_config(
        config: &ProviderConfig,
        http: &Client,
        defaults: &ProviderDefaults,
    ) -> Result<Self, LlmError> {
        Ok(Self::new(config.connect(http, defaults)?))
    }

    pub fn provider(&self) -> &'static str {
        self.client.name()
    }

    /// Performs one provider call.
    ///
    /// - JSON mode, schema-native: provider text returned verbatim.
    /// - JSON mode, chat-completion: system instruction augmented, response
    ///   salvaged and re-serialised, so the result always parses.
    /// - Text mode: provider text trimmed of surrounding whitespace.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if request.json_mode && !self.client.native_schema() {
            let augmented = CompletionRequest {
                system_instruction: Some(augment_system_for_json(
                    request.system_instruction.as_deref(),
                    request.output_schema.as_ref(),
                )),
                ..request.clone()
            };
            let raw = self.dispatch(&augmented).await?;
            let value = salvage(&raw).map_err(|e| {
                warn!(provider = self.provider(), error = %e, "JSON salvage failed");
                LlmError::from(e)
            })?;
            return Ok(value.to_string());
        }

        let raw = self.dispatch(request).await?;
        if request.json_mode {
            Ok(raw)
        } else {
            Ok(raw.trim().to_string())
        }
    }

    /// `complete` in JSON mode, deserialised into `T`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        request: &CompletionRequest,
    ) -> Result<T, LlmError> {
        let text = self.complete(request).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Streams text fragments as the provider produces them.
    pub async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        if request.json_mode {
            return Err(LlmError::Config(
                "json_mode is not supported for streaming completions".to_string(),
            ));
        }
        debug!(
            provider = self.provider(),
            prompt_chars = request.prompt.chars().count(),
            "Opening completion stream"
        );
        self.client.stream(request).await.map_err(|e| {
            error!(provider = self.provider(), error = %e, "Completion stream failed to open");
            e
        })
    }

    async fn dispatch(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(
            provider = self.provider(),
            prompt_chars = request.prompt.chars().count(),
            json_mode = request.json_mode,
            "Dispatching completion"
        );
        self.client.complete(request).await.map_err(|e| {
            error!(provider = self.provider(), error = %e, "Completion failed");
            e
        })
    }
}
