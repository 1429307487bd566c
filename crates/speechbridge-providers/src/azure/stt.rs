//! Speech-to-text via the short-audio REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use speechbridge_core::config::SpeechConfig;
use tracing::debug;

use super::{SUBSCRIPTION_KEY_HEADER, http_client, regional_base};
use crate::error::check_status;
use crate::{ProviderError, Recognition, SpeechToText};

const RECOGNITION_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";
const WAV_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";

pub struct AzureSpeechToText {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SimpleRecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

impl AzureSpeechToText {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http_client(timeout)?,
        })
    }

    pub fn from_config(config: &SpeechConfig) -> Result<Self, ProviderError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ProviderError::MissingCredentials(format!(
                "speech key is not set (speech.api_key or {})",
                config.api_key_env
            ))
        })?;
        let region = config.resolve_region();
        let base = regional_base(
            config.stt_endpoint.as_deref(),
            region.as_deref(),
            "stt.speech.microsoft.com",
        )?;
        Self::new(base, api_key, Duration::from_secs(config.timeout_secs))
    }
}

fn map_status(response: SimpleRecognitionResponse) -> Result<Recognition, ProviderError> {
    match response.recognition_status.as_str() {
        "Success" => {
            let text = response.display_text.unwrap_or_default().trim().to_string();
            if text.is_empty() {
                Ok(Recognition::NoMatch)
            } else {
                Ok(Recognition::Recognized(text))
            }
        }
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Ok(Recognition::NoMatch),
        other => Err(ProviderError::Recognition(other.to_string())),
    }
}

#[async_trait]
impl SpeechToText for AzureSpeechToText {
    fn id(&self) -> &str {
        "azure-stt"
    }

    async fn transcribe(
        &self,
        audio_wav: &[u8],
        locale: &str,
    ) -> Result<Recognition, ProviderError> {
        if audio_wav.is_empty() {
            return Err(ProviderError::EmptyInput("audio"));
        }

        debug!(locale, bytes = audio_wav.len(), "Recognizing short audio");

        let response = self
            .client
            .post(format!("{}{RECOGNITION_PATH}", self.base_url))
            .query(&[("language", locale), ("format", "simple")])
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header("Content-Type", WAV_CONTENT_TYPE)
            .header("Accept", "application/json")
            .body(audio_wav.to_vec())
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        let parsed: SimpleRecognitionResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        map_status(parsed)
    }
}
