//! In-memory speech services for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use speechbridge_providers::{
    ProviderError, Recognition, SpeechToText, SynthesisRequest, TextToSpeech, Translation,
    Translator,
};

/// Treats the audio bytes as UTF-8 text; empty text is no match, "boom" fails.
pub struct EchoStt;

#[async_trait]
impl SpeechToText for EchoStt {
    fn id(&self) -> &str {
        "echo-stt"
    }

    async fn transcribe(
        &self,
        audio_wav: &[u8],
        _locale: &str,
    ) -> Result<Recognition, ProviderError> {
        let text = String::from_utf8_lossy(audio_wav).trim().to_string();
        match text.as_str() {
            "" => Ok(Recognition::NoMatch),
            "boom" => Err(ProviderError::Recognition("Error".into())),
            _ => Ok(Recognition::Recognized(text)),
        }
    }
}

/// Produces `"<text> [<lang>]"` for every target. Texts in `fail_on` fail.
#[derive(Default)]
pub struct TagTranslator {
    pub fail_on: HashSet<String>,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl Translator for TagTranslator {
    fn id(&self) -> &str {
        "tag-translator"
    }

    async fn translate(
        &self,
        text: &str,
        targets: &[String],
        source: Option<&str>,
    ) -> Result<Translation, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), source.map(String::from)));
        if self.fail_on.contains(text) {
            return Err(ProviderError::Http {
                status: 400,
                body: "rejected".into(),
            });
        }
        Ok(Translation {
            detected_language: source.unwrap_or("en").to_string(),
            translations: targets
                .iter()
                .map(|t| (t.clone(), format!("{text} [{t}]")))
                .collect(),
        })
    }
}

/// Returns the voice name as audio bytes. Voices in `fail_voices` fail.
#[derive(Default)]
pub struct VoiceTts {
    pub fail_voices: HashSet<String>,
}

#[async_trait]
impl TextToSpeech for VoiceTts {
    fn id(&self) -> &str {
        "voice-tts"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, ProviderError> {
        if self.fail_voices.contains(&request.voice) {
            return Err(ProviderError::Http {
                status: 400,
                body: "voice unavailable".into(),
            });
        }
        Ok(request.voice.as_bytes().to_vec())
    }
}
