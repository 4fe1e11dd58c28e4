//! LLM domain: plant identification through a vision model.
//!
//! Public API for the identification client. Callers hold an
//! `Arc<dyn PlantIdentifier>` built once at startup by `build_identifier`,
//! so tests can substitute a fake backend.
//!
//! Providers:
//!   - Google Gemini Flash (gemini.rs) - default
//!   - Anthropic Claude Haiku (anthropic.rs)

mod anthropic;
mod error;
mod gemini;
pub mod prompts;
pub mod provider;
pub mod types;

pub use anthropic::{AnthropicClient, ANTHROPIC_MODEL};
pub use error::IdentificationError;
pub use gemini::{GeminiClient, GEMINI_MODEL};
pub use provider::Provider;
pub use types::{IdentificationResult, TokenUsage};

use crate::capture::RawImage;
use crate::settings::Settings;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A vision backend that turns a photo into free-text plant information.
#[async_trait]
pub trait PlantIdentifier: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    /// One request per call, no retries.
    async fn identify(&self, image: &RawImage) -> Result<IdentificationResult, IdentificationError>;

    /// Cheap request that only checks the key and endpoint.
    async fn ping(&self) -> Result<(), IdentificationError> {
        Ok(())
    }
}

/// Construct the configured client. Called once at startup.
pub fn build_identifier(settings: &Settings) -> Result<Arc<dyn PlantIdentifier>, IdentificationError> {
    let provider = settings.resolve_provider();
    build_for(settings, provider)
}

/// Construct a client for a specific provider, ignoring the active one.
pub fn build_for(
    settings: &Settings,
    provider: Provider,
) -> Result<Arc<dyn PlantIdentifier>, IdentificationError> {
    let api_key = settings
        .api_key(provider)
        .ok_or_else(|| IdentificationError::MissingApiKey {
            provider: provider.id().to_string(),
            env_key: provider.env_key().to_string(),
        })?;
    let model = settings.model_for(provider);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()?;

    log::info!("[LLM] Client ready: {} / {}", provider, model);

    Ok(match provider {
        Provider::Gemini => Arc::new(GeminiClient::new(http, api_key, model)),
        Provider::Anthropic => Arc::new(AnthropicClient::new(http, api_key, model)),
    })
}
