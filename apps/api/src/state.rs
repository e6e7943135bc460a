use crate::config::Config;
use crate::layout::LayoutOptions;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// One connection pool for every provider call.
    pub http: reqwest::Client,
    pub layout_options: LayoutOptions,
}
