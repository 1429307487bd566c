//! Speech service abstraction.
//!
//! Each stage of the speech pipeline sits behind a trait so the orchestrator,
//! the batch jobs, and the live worker never talk to a vendor directly:
//! [`SpeechToText`], [`Translator`], and [`TextToSpeech`]. The Azure REST
//! implementations live in [`azure`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod azure;
pub mod error;
pub mod retry;
pub mod ssml;

pub use error::ProviderError;
pub use retry::{RetryPolicy, RetryingTranslator};

/// Outcome of a single recognition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Recognition {
    Recognized(String),
    /// The service heard no speech it could match.
    NoMatch,
}

impl Recognition {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Recognized(text) => Some(text),
            Self::NoMatch => None,
        }
    }
}

/// Result of translating one text into several targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub detected_language: String,
    /// Target language code -> translated text.
    pub translations: BTreeMap<String, String>,
}

/// A synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    /// Neural voice name (e.g. "hi-IN-SwaraNeural").
    pub voice: String,
    /// Locale for `xml:lang`; derived from the voice when empty.
    pub language: String,
    pub rate_percent: i32,
    pub pitch_percent: i32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            language: String::new(),
            rate_percent: 0,
            pitch_percent: 0,
        }
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Provider identifier (e.g., "azure-stt").
    fn id(&self) -> &str;

    /// Recognize a WAV clip (16 kHz mono PCM) spoken in `locale`.
    async fn transcribe(&self, audio_wav: &[u8], locale: &str)
    -> Result<Recognition, ProviderError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    fn id(&self) -> &str;

    /// Translate `text` into every language in `targets`.
    ///
    /// `source` is a language code; `None` lets the service detect it.
    async fn translate(
        &self,
        text: &str,
        targets: &[String],
        source: Option<&str>,
    ) -> Result<Translation, ProviderError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn id(&self) -> &str;

    /// Synthesize audio bytes in the client's configured output format.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError>;
}

#[async_trait]
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    async fn transcribe(
        &self,
        audio_wav: &[u8],
        locale: &str,
    ) -> Result<Recognition, ProviderError> {
        (**self).transcribe(audio_wav, locale).await
    }
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    async fn translate(
        &self,
        text: &str,
        targets: &[String],
        source: Option<&str>,
    ) -> Result<Translation, ProviderError> {
        (**self).translate(text, targets, source).await
    }
}

#[async_trait]
impl<T: TextToSpeech + ?Sized> TextToSpeech for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
        (**self).synthesize(request).await
    }
}
