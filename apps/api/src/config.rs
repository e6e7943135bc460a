use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::schema_native::DEFAULT_SCHEMA_NATIVE_BASE_URL;
use crate::llm_client::ProviderDefaults;

/// Application configuration loaded from environment variables.
/// Provider credentials normally arrive per request; `API_KEY` is only the
/// schema-native fallback.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub api_key: Option<String>,
    pub schema_native_base_url: String,
    pub provider_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            api_key: optional_env("API_KEY"),
            schema_native_base_url: optional_env("SCHEMA_NATIVE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SCHEMA_NATIVE_BASE_URL.to_string()),
            provider_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .context("PROVIDER_TIMEOUT_SECS must be a whole number of seconds")?,
        })
    }

    pub fn provider_defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            schema_native_api_key: self.api_key.clone(),
            schema_native_base_url: self.schema_native_base_url.clone(),
            timeout: Duration::from_secs(self.provider_timeout_secs),
        }
    }
}

/// Unset and blank are the same thing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
