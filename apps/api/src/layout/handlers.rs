//! Axum route handlers for the Layout API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

use crate::errors::AppError;
use crate::layout::variations::generate_variations;
use crate::layout::{
    DesignSystem, LayoutOrchestrator, LayoutPreference, LayoutRequest, OrchestrationResult,
    ProgressEvent,
};
use crate::llm_client::{CompletionEngine, CompletionRequest, ProviderConfig, TextStream};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateLayoutRequest {
    pub provider: ProviderConfig,
    pub style_prompt: String,
    pub content: String,
    #[serde(default)]
    pub layout_preference: LayoutPreference,
    #[serde(default)]
    pub existing_design: Option<DesignSystem>,
}

#[derive(Debug, Deserialize)]
pub struct VariationsRequest {
    pub provider: ProviderConfig,
    pub style_prompt: String,
    #[serde(default)]
    pub layout_preference: LayoutPreference,
}

#[derive(Debug, Serialize)]
pub struct VariationsResponse {
    pub designs: Vec<DesignSystem>,
}

#[derive(Debug, Deserialize)]
pub struct StreamCompletionRequest {
    pub provider: ProviderConfig,
    pub prompt: String,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

pub type EventStream = UnboundedReceiverStream<Result<Event, Infallible>>;
type EventSender = mpsc::UnboundedSender<Result<Event, Infallible>>;

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn engine_for(state: &AppState, provider: &ProviderConfig) -> Result<CompletionEngine, AppError> {
    Ok(CompletionEngine::from_config(
        provider,
        &state.http,
        &state.config.provider_defaults(),
    )?)
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| error_event(&format!("failed to encode {name} event: {e}")))
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .json_data(json!({ "message": message }))
        .unwrap_or_else(|_| Event::default().event("error"))
}

fn progress_event(event: &ProgressEvent) -> Event {
    let name = match event {
        ProgressEvent::Design { .. } => "design",
        ProgressEvent::Content { .. } => "content",
    };
    json_event(name, event)
}

fn sse(rx: mpsc::UnboundedReceiver<Result<Event, Infallible>>) -> Sse<EventStream> {
    Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}

/// Runs one layout and forwards its progress into `tx`, ending with `done` or
/// `error`. The run is dropped as soon as the receiver goes away, so a
/// disconnected client stops further provider calls.
async fn stream_layout(orchestrator: LayoutOrchestrator, layout: LayoutRequest, tx: EventSender) {
    let progress_tx = tx.clone();
    let run = orchestrator.generate(&layout, move |event| {
        let _ = progress_tx.send(Ok(progress_event(&event)));
    });

    let outcome = tokio::select! {
        biased;
        _ = tx.closed() => None,
        outcome = run => Some(outcome),
    };
    let Some(outcome) = outcome else {
        info!("Client disconnected; layout run abandoned");
        return;
    };

    let last = match outcome {
        Ok(result) => json_event("done", &result),
        Err(e) => {
            error!(error = %e, "Streamed layout generation failed");
            error_event(&e.to_string())
        }
    };
    let _ = tx.send(Ok(last));
}

/// Forwards provider fragments as `delta` events, then `done`. A provider
/// error ends the stream with `error`; a closed receiver ends it silently.
async fn forward_fragments(mut fragments: TextStream, tx: EventSender) {
    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => {
                info!("Client disconnected; completion stream dropped");
                return;
            }
            next = fragments.next() => next,
        };

        match next {
            Some(Ok(text)) => {
                let _ = tx.send(Ok(json_event("delta", &json!({ "text": text }))));
            }
            Some(Err(e)) => {
                error!(error = %e, "Completion stream aborted");
                let _ = tx.send(Ok(error_event(&e.to_string())));
                return;
            }
            None => break,
        }
    }
    let _ = tx.send(Ok(json_event("done", &json!({}))));
}

fn layout_request(request: GenerateLayoutRequest) -> LayoutRequest {
    LayoutRequest {
        style_prompt: request.style_prompt,
        content: request.content,
        layout_preference: request.layout_preference,
        existing_design: request.existing_design,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/layouts
///
/// Runs design + content phases to completion and returns the final result.
pub async fn handle_generate_layout(
    State(state): State<AppState>,
    Json(request): Json<GenerateLayoutRequest>,
) -> Result<Json<OrchestrationResult>, AppError> {
    require_text("style_prompt", &request.style_prompt)?;
    require_text("content", &request.content)?;

    let engine = engine_for(&state, &request.provider)?;
    let orchestrator = LayoutOrchestrator::new(engine, state.layout_options.clone());

    let result = orchestrator
        .generate(&layout_request(request), |_| {})
        .await?;

    Ok(Json(result))
}

/// POST /api/v1/layouts/stream
///
/// Same as `handle_generate_layout`, but every progress event is pushed to the
/// client as it happens. Terminates with `done` (final result) or `error`.
pub async fn handle_generate_layout_stream(
    State(state): State<AppState>,
    Json(request): Json<GenerateLayoutRequest>,
) -> Result<Sse<EventStream>, AppError> {
    require_text("style_prompt", &request.style_prompt)?;
    require_text("content", &request.content)?;

    let engine = engine_for(&state, &request.provider)?;
    let orchestrator = LayoutOrchestrator::new(engine, state.layout_options.clone());
    let layout = layout_request(request);

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(stream_layout(orchestrator, layout, tx));

    Ok(sse(rx))
}

/// POST /api/v1/designs/variations
pub async fn handle_design_variations(
    State(state): State<AppState>,
    Json(request): Json<VariationsRequest>,
) -> Result<Json<VariationsResponse>, AppError> {
    require_text("style_prompt", &request.style_prompt)?;

    let engine = engine_for(&state, &request.provider)?;
    let designs =
        generate_variations(&engine, &request.style_prompt, request.layout_preference).await?;

    Ok(Json(VariationsResponse { designs }))
}

/// POST /api/v1/completions/stream
///
/// Raw streaming completion. The provider stream is opened before responding,
/// so credential and upstream failures surface as a normal error response.
pub async fn handle_completion_stream(
    State(state): State<AppState>,
    Json(request): Json<StreamCompletionRequest>,
) -> Result<Sse<EventStream>, AppError> {
    require_text("prompt", &request.prompt)?;

    let engine = engine_for(&state, &request.provider)?;
    let mut completion = CompletionRequest::text(request.prompt);
    completion.system_instruction = request.system_instruction.filter(|s| !s.trim().is_empty());

    let fragments = engine.stream(&completion).await?;
    info!(provider = engine.provider(), "Completion stream opened");

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_fragments(fragments, tx));

    Ok(sse(rx))
}

/// Splits a rendered SSE body into `(event name, JSON data)` pairs.
#[cfg(test)]
pub(crate) fn sse_frames(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut name = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim_start());
                }
            }
            let data = serde_json::from_str(&data).unwrap_or(serde_json::Value::Null);
            name.map(|name| (name, data))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;
    use futures::stream;

    use super::*;
    use crate::layout::LayoutOptions;
    use crate::llm_client::testing::{provider_failure, ScriptedClient};
    use crate::llm_client::LlmError;

    fn reused_design() -> DesignSystem {
        let mut design = DesignSystem::placeholder();
        design.id = "gen-earlier".to_string();
        design
    }

    fn layout(content: &str, existing_design: Option<DesignSystem>) -> LayoutRequest {
        LayoutRequest {
            style_prompt: "newsletter".to_string(),
            content: content.to_string(),
            layout_preference: LayoutPreference::Auto,
            existing_design,
        }
    }

    fn orchestrator_for(client: std::sync::Arc<ScriptedClient>, chunk_chars: usize) -> LayoutOrchestrator {
        LayoutOrchestrator::new(
            CompletionEngine::new(client),
            LayoutOptions {
                chunk_chars,
                ..LayoutOptions::default()
            },
        )
    }

    /// Drains the receiver through the real SSE response body.
    async fn rendered_frames(
        rx: mpsc::UnboundedReceiver<Result<Event, Infallible>>,
    ) -> Vec<(String, serde_json::Value)> {
        let response = sse(rx).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        sse_frames(&String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn names(frames: &[(String, serde_json::Value)]) -> Vec<&str> {
        frames.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_layout_stream_emits_design_contents_then_done() {
        let client = ScriptedClient::new(true, |req| {
            let segment = req.prompt.rsplit('\n').find(|l| !l.is_empty()).unwrap_or("");
            Ok(format!("## {}", segment.to_uppercase()))
        });
        let (tx, rx) = mpsc::unbounded_channel();
        stream_layout(
            orchestrator_for(client, 10),
            layout("first one\nsecond one\n", Some(reused_design())),
            tx,
        )
        .await;

        let frames = rendered_frames(rx).await;
        assert_eq!(names(&frames), vec!["design", "content", "content", "done"]);

        let (_, design) = &frames[0];
        assert_eq!(design["kind"], "design");
        assert_eq!(design["design"]["id"], "gen-earlier");

        let (_, first) = &frames[1];
        assert_eq!(first["kind"], "content");
        assert_eq!(first["partialContent"], "## FIRST ONE\n\n");

        let (_, done) = &frames[3];
        assert_eq!(done["design"]["themeName"], "Clean Paper");
        assert_eq!(done["content"], "## FIRST ONE\n\n## SECOND ONE\n\n");
        assert_eq!(frames[2].1["partialContent"], done["content"]);
    }

    #[tokio::test]
    async fn test_layout_stream_reports_design_failure_as_error_event() {
        let client = ScriptedClient::new(true, |_| Err(provider_failure("quota exhausted")));
        let (tx, rx) = mpsc::unbounded_channel();
        stream_layout(orchestrator_for(client, 10), layout("text\n", None), tx).await;

        let frames = rendered_frames(rx).await;
        assert_eq!(names(&frames), vec!["error"]);
        let message = frames[0].1["message"].as_str().unwrap();
        assert!(message.contains("Design generation failed"));
        assert!(message.contains("quota exhausted"));
    }

    #[tokio::test]
    async fn test_layout_stream_makes_no_calls_for_gone_client() {
        let client = ScriptedClient::new(true, |_| Ok("x".to_string()));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        stream_layout(orchestrator_for(client.clone(), 5), layout("a\nb\nc\n", None), tx).await;

        assert!(client.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_layout_stream_stops_after_client_disconnects() {
        let client = ScriptedClient::new(true, |_| Ok("rewritten".to_string()));
        let content: String = (0..20).map(|i| format!("p{i}\n")).collect();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = tokio::spawn(stream_layout(
            orchestrator_for(client.clone(), 5),
            layout(&content, Some(reused_design())),
            tx,
        ));

        // Design event, then the first content event; then the client leaves.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        drop(rx);
        run.await.unwrap();

        let calls = client.recorded().len();
        assert!(calls < 20, "run kept calling the provider: {calls} calls");
    }

    #[tokio::test]
    async fn test_completion_stream_emits_deltas_then_done() {
        let fragments: Vec<Result<String, LlmError>> =
            vec![Ok("Hel".to_string()), Ok("lo".to_string())];
        let (tx, rx) = mpsc::unbounded_channel();
        forward_fragments(Box::pin(stream::iter(fragments)), tx).await;

        let frames = rendered_frames(rx).await;
        assert_eq!(names(&frames), vec!["delta", "delta", "done"]);
        assert_eq!(frames[0].1["text"], "Hel");
        assert_eq!(frames[1].1["text"], "lo");
    }

    #[tokio::test]
    async fn test_completion_stream_error_ends_without_done() {
        let fragments: Vec<Result<String, LlmError>> = vec![
            Ok("partial".to_string()),
            Err(provider_failure("connection reset")),
            Ok("never".to_string()),
        ];
        let (tx, rx) = mpsc::unbounded_channel();
        forward_fragments(Box::pin(stream::iter(fragments)), tx).await;

        let frames = rendered_frames(rx).await;
        assert_eq!(names(&frames), vec!["delta", "error"]);
        assert!(frames[1].1["message"]
            .as_str()
            .unwrap()
            .contains("connection reset"));
    }

    #[tokio::test]
    async fn test_progress_event_names_follow_variant() {
        let (tx, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();
        tx.send(Ok(progress_event(&ProgressEvent::Content {
            partial_content: "so far".to_string(),
        })))
        .unwrap();
        tx.send(Ok(progress_event(&ProgressEvent::Design {
            design: reused_design(),
        })))
        .unwrap();
        drop(tx);

        let frames = rendered_frames(rx).await;
        assert_eq!(names(&frames), vec!["content", "design"]);
        assert_eq!(frames[0].1["partialContent"], "so far");
        assert_eq!(frames[1].1["design"]["id"], "gen-earlier");
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(require_text("content", "  \n").is_err());
        assert!(require_text("content", "hi").is_ok());
    }

    #[test]
    fn test_layout_request_defaults() {
        let request: GenerateLayoutRequest = serde_json::from_value(json!({
            "provider": { "kind": "schema-native" },
            "style_prompt": "newsletter",
            "content": "hello"
        }))
        .unwrap();
        assert_eq!(request.layout_preference, LayoutPreference::Auto);
        assert!(request.existing_design.is_none());
    }

    #[test]
    fn test_layout_request_accepts_existing_design() {
        let request: GenerateLayoutRequest = serde_json::from_value(json!({
            "provider": { "kind": "chat-completion", "api_key": "sk", "model": "m" },
            "style_prompt": "report",
            "content": "hello",
            "layout_preference": "multi-card",
            "existing_design": DesignSystem::placeholder()
        }))
        .unwrap();
        assert_eq!(request.layout_preference, LayoutPreference::MultiCard);
        assert!(request.existing_design.unwrap().is_placeholder());
    }
}
