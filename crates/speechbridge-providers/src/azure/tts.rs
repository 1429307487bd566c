//! Text-to-speech via the SSML REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use speechbridge_core::config::{SpeechConfig, TtsConfig};
use tracing::debug;

use super::{SUBSCRIPTION_KEY_HEADER, http_client, regional_base};
use crate::error::check_status;
use crate::ssml::build_ssml;
use crate::{ProviderError, SynthesisRequest, TextToSpeech};

const USER_AGENT: &str = concat!("speechbridge/", env!("CARGO_PKG_VERSION"));

pub struct AzureTextToSpeech {
    base_url: String,
    api_key: String,
    output_format: String,
    client: reqwest::Client,
}

impl AzureTextToSpeech {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        output_format: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            output_format: output_format.into(),
            client: http_client(timeout)?,
        })
    }

    pub fn from_config(speech: &SpeechConfig, tts: &TtsConfig) -> Result<Self, ProviderError> {
        let api_key = speech.resolve_api_key().ok_or_else(|| {
            ProviderError::MissingCredentials(format!(
                "speech key is not set (speech.api_key or {})",
                speech.api_key_env
            ))
        })?;
        let region = speech.resolve_region();
        let base = regional_base(
            speech.tts_endpoint.as_deref(),
            region.as_deref(),
            "tts.speech.microsoft.com",
        )?;
        Self::new(
            base,
            api_key,
            &tts.output_format,
            Duration::from_secs(speech.timeout_secs),
        )
    }
}

#[async_trait]
impl TextToSpeech for AzureTextToSpeech {
    fn id(&self) -> &str {
        "azure-tts"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
        if request.text.trim().is_empty() {
            return Err(ProviderError::EmptyInput("text"));
        }

        let ssml = build_ssml(request);
        debug!(voice = %request.voice, chars = request.text.len(), "Synthesizing speech");

        let response = self
            .client
            .post(format!("{}/cognitiveservices/v1", self.base_url))
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.output_format)
            .header("User-Agent", USER_AGENT)
            .body(ssml)
            .send()
            .await?;

        let response = check_status(response).await?;
        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::Decode("synthesis returned no audio".into()));
        }
        Ok(audio.to_vec())
    }
}
