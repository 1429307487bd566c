//! Azure Cognitive Services REST clients.

use std::time::Duration;

use crate::ProviderError;

pub mod stt;
pub mod translator;
pub mod tts;

pub use stt::AzureSpeechToText;
pub use translator::AzureTranslator;
pub use tts::AzureTextToSpeech;

pub(crate) const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub(crate) const SUBSCRIPTION_REGION_HEADER: &str = "Ocp-Apim-Subscription-Region";

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Transport(format!("Failed to build HTTP client: {e}")))
}

/// Pick the explicit endpoint, or derive `https://{region}.{host_suffix}`.
pub(crate) fn regional_base(
    explicit: Option<&str>,
    region: Option<&str>,
    host_suffix: &str,
) -> Result<String, ProviderError> {
    if let Some(url) = explicit.filter(|u| !u.is_empty()) {
        return Ok(url.trim_end_matches('/').to_string());
    }
    match region.filter(|r| !r.is_empty()) {
        Some(region) => Ok(format!("https://{region}.{host_suffix}")),
        None => Err(ProviderError::MissingCredentials(
            "speech region is not configured".into(),
        )),
    }
}
