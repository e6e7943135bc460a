//! Chat-completion provider (OpenAI-compatible `/chat/completions`).
//!
//! Text in, text out. There is no server-side schema here, so the engine
//! handles JSON mode with prompt augmentation and salvage.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm_client::sse::data_payloads;
use crate::llm_client::{CompletionRequest, LlmError, ProviderClient, TextStream};

pub const DEFAULT_CHAT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "chat-completion";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn build_request<'a>(model: &'a str, request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system_instruction.as_deref() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });

    ChatRequest {
        model,
        messages,
        stream,
    }
}

fn provider_error(message: impl Into<String>) -> LlmError {
    LlmError::Provider {
        provider: PROVIDER,
        message: message.into(),
    }
}

fn error_message(status: reqwest::StatusCode, body: String) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    format!("status {}: {}", status.as_u16(), message)
}

/// Decodes one streamed `data:` payload. `Ok(None)` means no text in this chunk.
fn chunk_text(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| provider_error(format!("invalid stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty()))
}

/// Text deltas from a streamed response body, ending at the `[DONE]` marker.
fn delta_stream<S>(body: S) -> impl Stream<Item = Result<String, LlmError>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    data_payloads(body)
        .take_while(|payload| {
            let done = matches!(payload, Ok(data) if data.trim() == DONE_MARKER);
            futures::future::ready(!done)
        })
        .filter_map(|payload| async move {
            match payload {
                Ok(data) => chunk_text(&data).transpose(),
                Err(e) => Some(Err(provider_error(e.to_string()))),
            }
        })
}

pub struct ChatCompletionClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl ChatCompletionClient {
    pub fn new(
        http: Client,
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(
        &self,
        body: &ChatRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body);
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
impl ProviderClient for ChatCompletionClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn native_schema(&self) -> bool {
        false
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = build_request(&self.model, request, false);
        let response = self.post(&body, Some(self.timeout)).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("invalid response body: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let body = build_request(&self.model, request, true);
        let response = self.post(&body, None).await?;

        Ok(Box::pin(delta_stream(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_orders_system_before_user() {
        let request = CompletionRequest::text("Rewrite this").with_system("You are an editor.");
        let body = serde_json::to_value(build_request("gpt-4o-mini", &request, false)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Rewrite this");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_request_without_system_has_only_user_message() {
        let request = CompletionRequest::text("Hi");
        let body = serde_json::to_value(build_request("m", &request, true)).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_chunk_text_reads_delta_content() {
        let data = r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(chunk_text(data).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn test_chunk_text_skips_role_only_delta() {
        let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(chunk_text(data).unwrap(), None);
    }

    #[test]
    fn test_chunk_text_rejects_garbage() {
        assert!(matches!(chunk_text("not json"), Err(LlmError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_delta_stream_stops_at_done_marker() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            )),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n")),
            Ok(Bytes::from_static(
                b"\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DO",
            )),
            Ok(Bytes::from_static(
                b"NE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
            )),
        ];

        let fragments: Vec<String> = delta_stream(futures::stream::iter(chunks))
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_delta_stream_surfaces_malformed_chunk() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> =
            vec![Ok(Bytes::from_static(b"data: {not json}\n\n"))];
        let items: Vec<Result<String, LlmError>> =
            delta_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(LlmError::Provider { .. })));
    }

    #[test]
    fn test_trailing_slash_on_base_url_is_tolerated() {
        let client = ChatCompletionClient::new(
            Client::new(),
            "sk".to_string(),
            "https://proxy.local/v1/".to_string(),
            "m".to_string(),
            Duration::from_secs(1),
        );
        assert_eq!(client.endpoint(), "https://proxy.local/v1/chat/completions");
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        let msg = error_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(msg, "status 502: upstream down");
    }
}
