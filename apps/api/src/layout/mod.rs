// Layout generation: design synthesis, chunking, and segment-by-segment rewriting.
// All model calls go through llm_client::CompletionEngine.

use thiserror::Error;

pub mod chunker;
pub mod design;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod variations;

pub use design::{DesignSystem, LayoutPreference};
pub use orchestrator::{
    LayoutOptions, LayoutOrchestrator, LayoutRequest, OrchestrationResult, ProgressEvent,
};

#[derive(Debug, Error)]
pub enum LayoutError {
    /// Fatal for the whole run; no content phase is attempted after it.
    #[error("Design generation failed: {0}")]
    DesignGeneration(String),
}
