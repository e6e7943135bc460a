//! Schema-native provider (Gemini `generateContent` API).
//!
//! Model: gemini-3-flash-preview (hardcoded — do not make configurable to prevent drift)

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm_client::sse::data_payloads;
use crate::llm_client::{CompletionRequest, LlmError, ProviderClient, TextStream};

pub const MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_SCHEMA_NATIVE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER: &str = "schema-native";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn build_request(request: &CompletionRequest) -> GenerateRequest<'_> {
    let system_instruction = request
        .system_instruction
        .as_deref()
        .map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        });

    let generation_config = request.json_mode.then(|| GenerationConfig {
        response_mime_type: "application/json",
        response_schema: request.output_schema.as_ref().map(|s| s.to_native_schema()),
    });

    GenerateRequest {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part {
                text: &request.prompt,
            }],
        }],
        system_instruction,
        generation_config,
    }
}

fn provider_error(message: impl Into<String>) -> LlmError {
    LlmError::Provider {
        provider: PROVIDER,
        message: message.into(),
    }
}

/// Pulls `error.message` out of an error body, falling back to the raw body.
fn error_message(status: reqwest::StatusCode, body: String) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    format!("status {}: {}", status.as_u16(), message)
}

pub struct SchemaNativeClient {
    http: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl SchemaNativeClient {
    pub fn new(http: Client, api_key: String, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn post(
        &self,
        url: String,
        request: &CompletionRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(request));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(error_message(status, body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderClient for SchemaNativeClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn native_schema(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, MODEL);
        let response = self.post(url, request, Some(self.timeout)).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("invalid response body: {e}")))?;
        Ok(body.text())
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, MODEL
        );
        // The whole-request timeout would cut long streams; connect timeouts
        // still apply through the shared client.
        let response = self.post(url, request, None).await?;

        let fragments = data_payloads(response.bytes_stream()).filter_map(|payload| async move {
            match payload {
                Ok(data) => match serde_json::from_str::<GenerateResponse>(&data) {
                    Ok(chunk) => Some(chunk.text()).filter(|t| !t.is_empty()).map(Ok),
                    Err(e) => Some(Err(provider_error(format!("invalid stream chunk: {e}")))),
                },
                Err(e) => Some(Err(provider_error(e.to_string()))),
            }
        });
        Ok(Box::pin(fragments))
    }
}
