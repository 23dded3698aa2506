//! Reasoning model providers for Keepsake.
//!
//! All providers implement the `keepsake_core::Provider` trait.
//! [`build_from_config`] selects and wires the configured backend.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use keepsake_config::AppConfig;
use keepsake_core::error::ProviderError;
use keepsake_core::provider::Provider;
use std::sync::Arc;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is set, so a
/// misconfigured deployment is caught at startup rather than on the first turn.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ProviderError::NotConfigured("no API key configured".into()))?;

    let provider = AnthropicProvider::new(api_key)?.with_base_url(&config.provider.api_url);
    Ok(Arc::new(provider))
}
