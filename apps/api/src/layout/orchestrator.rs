//! Layout Orchestrator — turns free-form text into `{ design, content }`.
//!
//! Flow: resolve design (reuse or synthesise) → chunk → rewrite each segment in
//! order → accumulate → report progress after every step.
//!
//! Segments are rewritten strictly one after another. Segment N+1's prompt
//! carries the tail of segment N's *output*, so it cannot be built before that
//! output exists. A failed rewrite degrades to the original chunk; only the
//! design phase can fail the run.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::layout::chunker::{self, ContentSegment};
use crate::layout::design::{finalize_generated, DesignSystem, LayoutPreference};
use crate::layout::prompts::{
    fill, CONTENT_SYSTEM, DESIGN_PROMPT_TEMPLATE, DESIGN_SYSTEM, REWRITE_PROMPT_TEMPLATE,
};
use crate::layout::LayoutError;
use crate::llm_client::{CompletionEngine, CompletionRequest};

/// Separator appended after every segment in the accumulated content.
const SEGMENT_SEPARATOR: &str = "\n\n";

/// Tunables, all measured in characters.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Upper bound per segment (paragraphs are never split to honour it).
    pub chunk_chars: usize,
    /// Leading slice of the document shown to the design prompt.
    pub design_sample_chars: usize,
    /// Tail of the previous rewritten segment carried into the next prompt.
    pub context_tail_chars: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            chunk_chars: 1000,
            design_sample_chars: 800,
            context_tail_chars: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub style_prompt: String,
    pub content: String,
    pub layout_preference: LayoutPreference,
    /// Reused verbatim unless it is the placeholder design.
    pub existing_design: Option<DesignSystem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub design: DesignSystem,
    pub content: String,
}

/// Emitted synchronously while the run progresses. Not buffered or replayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgressEvent {
    Design { design: DesignSystem },
    Content {
        #[serde(rename = "partialContent")]
        partial_content: String,
    },
}

/// Fold state of the content phase.
#[derive(Debug, Default)]
struct RewriteState {
    content: String,
    previous_tail: String,
}

impl RewriteState {
    fn absorb(mut self, segment_output: &str, tail_chars: usize) -> Self {
        self.content.push_str(segment_output);
        self.content.push_str(SEGMENT_SEPARATOR);
        self.previous_tail = tail(segment_output, tail_chars);
        self
    }
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(max_chars)).collect()
}

pub struct LayoutOrchestrator {
    engine: CompletionEngine,
    options: LayoutOptions,
}

impl LayoutOrchestrator {
    pub fn new(engine: CompletionEngine, options: LayoutOptions) -> Self {
        Self { engine, options }
    }

    /// Runs both phases to completion.
    ///
    /// `on_progress` receives one `Design` event, then one `Content` event per
    /// segment carrying everything accumulated so far.
    pub async fn generate<F>(
        &self,
        request: &LayoutRequest,
        mut on_progress: F,
    ) -> Result<OrchestrationResult, LayoutError>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let design = self.resolve_design(request).await?;
        on_progress(ProgressEvent::Design {
            design: design.clone(),
        });

        let segments = chunker::split(&request.content, self.options.chunk_chars);
        info!(
            provider = self.engine.provider(),
            segments = segments.len(),
            "Content phase started"
        );

        let mut state = RewriteState::default();
        for segment in &segments {
            let output = self.rewrite_segment(request, segment, &state.previous_tail).await;
            state = state.absorb(&output, self.options.context_tail_chars);
            on_progress(ProgressEvent::Content {
                partial_content: state.content.clone(),
            });
        }

        info!(
            design_id = %design.id,
            content_chars = state.content.chars().count(),
            "Layout generation complete"
        );

        Ok(OrchestrationResult {
            design,
            content: state.content,
        })
    }

    async fn resolve_design(&self, request: &LayoutRequest) -> Result<DesignSystem, LayoutError> {
        if let Some(existing) = request
            .existing_design
            .as_ref()
            .filter(|d| !d.is_placeholder())
        {
            info!(design_id = %existing.id, "Reusing caller-supplied design");
            return Ok(existing.clone());
        }

        let sample = head(&request.content, self.options.design_sample_chars);
        let prompt = fill(
            DESIGN_PROMPT_TEMPLATE,
            &[
                ("style_prompt", request.style_prompt.as_str()),
                ("layout_preference", request.layout_preference.as_str()),
                ("content_sample", sample.as_str()),
            ],
        );
        let completion =
            CompletionRequest::json(prompt, DesignSystem::schema()).with_system(DESIGN_SYSTEM);

        let design: DesignSystem = self
            .engine
            .complete_json(&completion)
            .await
            .map_err(|e| {
                error!(provider = self.engine.provider(), error = %e, "Design generation failed");
                LayoutError::DesignGeneration(e.to_string())
            })?;
        let design = finalize_generated(design)?;

        info!(design_id = %design.id, theme = %design.theme_name, "Design generated");
        Ok(design)
    }

    /// Rewrites one segment, falling back to its original text on any failure.
    async fn rewrite_segment(
        &self,
        request: &LayoutRequest,
        segment: &ContentSegment,
        previous_tail: &str,
    ) -> String {
        let original = segment.text.trim_end_matches('\n');
        let prompt = fill(
            REWRITE_PROMPT_TEMPLATE,
            &[
                ("style_prompt", request.style_prompt.as_str()),
                ("previous_context", previous_tail),
                ("is_first", if segment.index == 1 { "true" } else { "false" }),
                ("segment", segment.text.as_str()),
            ],
        );
        let completion = CompletionRequest::text(prompt).with_system(CONTENT_SYSTEM);

        match self.engine.complete(&completion).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(segment = segment.index, "Empty rewrite; keeping original text");
                original.to_string()
            }
            Err(e) => {
                warn!(
                    segment = segment.index,
                    error = %e,
                    "Segment rewrite failed; keeping original text"
                );
                original.to_string()
            }
        }
    }
}
