//! LLM provider implementations for thriftbot.
//!
//! All providers implement the `thriftbot_core::Provider` trait.
//! [`build_from_config`] wires the Anthropic backend behind the retry wrapper.

pub mod anthropic;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use retry::{RetryConfig, RetryProvider};

use std::sync::Arc;
use thriftbot_config::AppConfig;
use thriftbot_core::error::ProviderError;
use thriftbot_core::provider::Provider;
use tracing::info;

/// Build the provider stack from configuration.
///
/// Fails with `NotConfigured` when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key; set THRIFTBOT_API_KEY or api_key in config.toml".into(),
            )
        })?;

    let anthropic = AnthropicProvider::new(api_key)
        .with_base_url(&config.provider.base_url)
        .with_timeout(config.provider.timeout());

    info!(
        base_url = %config.provider.base_url,
        max_retries = config.provider.max_retries,
        "Provider ready"
    );

    Ok(Arc::new(RetryProvider::new(
        Arc::new(anthropic),
        RetryConfig::from(&config.provider),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_not_configured() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn builds_with_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-test".into()),
            ..Default::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }
}
