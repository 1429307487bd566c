//! End-to-end pipeline: transcribe, translate, persist, synthesize.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use speechbridge_core::config::Config;
use speechbridge_core::error::{Result, SpeechBridgeError};
use speechbridge_core::languages;
use speechbridge_core::types::{Transcript, TranslationRecord, VoiceGender};
use speechbridge_media::wav;
use speechbridge_providers::{
    Recognition, RetryPolicy, RetryingTranslator, SpeechToText, SynthesisRequest, TextToSpeech,
    Translator,
};
use tracing::{debug, info, warn};

use crate::output::OutputLayout;

/// Chunk length for long recordings, well inside the short-audio limit.
pub const CHUNK_SECS: u32 = 30;

/// Per-run knobs taken from config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub target_languages: Vec<String>,
    pub voice_gender: VoiceGender,
    pub rate_percent: i32,
    pub pitch_percent: i32,
    pub synthesize: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let pipeline = config.pipeline();
        let tts = config.tts();
        Self {
            target_languages: pipeline.target_languages,
            voice_gender: tts.voice_gender,
            rate_percent: tts.rate_percent,
            pitch_percent: tts.pitch_percent,
            synthesize: pipeline.synthesize,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribe_ms: Option<u64>,
    pub translate_ms: u64,
    pub synthesize_ms: u64,
}

/// Result of synthesizing one translation.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutcome {
    pub language: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub audio: Vec<u8>,
}

impl SynthesisOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    pub translation: TranslationRecord,
    pub translation_path: PathBuf,
    pub synthesis: Vec<SynthesisOutcome>,
    pub timings: StageTimings,
}

pub struct Pipeline {
    stt: Arc<dyn SpeechToText>,
    translator: RetryingTranslator<Arc<dyn Translator>>,
    tts: Arc<dyn TextToSpeech>,
    layout: OutputLayout,
    settings: PipelineSettings,
}

/// Timestamp plus a random suffix; concurrent runs never share an id.
fn run_id() -> String {
    format!(
        "{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"),
        crate::output::short_uuid()
    )
}

impl Pipeline {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
        tts: Arc<dyn TextToSpeech>,
        retry: RetryPolicy,
        layout: OutputLayout,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            stt,
            translator: RetryingTranslator::new(translator, retry),
            tts,
            layout,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Recognize a WAV clip and run the text stages on the result.
    pub async fn process_audio(&self, audio_wav: &[u8], locale: &str) -> Result<PipelineRun> {
        self.process_chunks(&[audio_wav], locale).await
    }

    /// Like [`process_audio`](Self::process_audio) for recordings longer than
    /// short-audio recognition accepts: the clip is recognized in chunks of at
    /// most `chunk_secs` and the texts are joined.
    pub async fn process_long_audio(
        &self,
        audio_wav: &[u8],
        locale: &str,
        chunk_secs: u32,
    ) -> Result<PipelineRun> {
        let chunks = wav::split_wav(audio_wav, chunk_secs)?;
        if chunks.len() > 1 {
            info!(chunks = chunks.len(), chunk_secs, "Recognizing long audio in chunks");
        }
        let chunks: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
        self.process_chunks(&chunks, locale).await
    }

    async fn process_chunks(&self, chunks: &[&[u8]], locale: &str) -> Result<PipelineRun> {
        let started = Instant::now();
        let mut texts = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let recognition = self
                .stt
                .transcribe(chunk, locale)
                .await
                .map_err(|e| SpeechBridgeError::Speech(e.to_string()))?;
            match recognition {
                Recognition::Recognized(text) => texts.push(text),
                Recognition::NoMatch => debug!(chunk = idx, "No speech in chunk"),
            }
        }
        let transcribe_ms = started.elapsed().as_millis() as u64;

        if texts.is_empty() {
            return Err(SpeechBridgeError::Speech("No speech detected".into()));
        }
        let text = texts.join(" ");
        info!(locale, chars = text.len(), transcribe_ms, "Audio transcribed");

        let id = run_id();
        let transcript = Transcript {
            id: id.clone(),
            text: text.clone(),
            language: locale.to_string(),
            timestamp: chrono::Utc::now(),
        };

        let mut run = self
            .run_text_stages(id, &text, Some(languages::base_code(locale)))
            .await?;
        run.transcript = Some(transcript);
        run.timings.transcribe_ms = Some(transcribe_ms);
        Ok(run)
    }

    /// Translate `text` (source auto-detected when `None`) and synthesize each result.
    pub async fn process_text(&self, text: &str, source: Option<&str>) -> Result<PipelineRun> {
        let source = source.map(languages::base_code);
        self.run_text_stages(run_id(), text, source).await
    }

    async fn run_text_stages(
        &self,
        id: String,
        text: &str,
        source: Option<&str>,
    ) -> Result<PipelineRun> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechBridgeError::Translation("Nothing to translate".into()));
        }

        let started = Instant::now();
        let translation = self
            .translator
            .translate(text, &self.settings.target_languages, source)
            .await
            .map_err(|e| SpeechBridgeError::Translation(e.to_string()))?;
        let translate_ms = started.elapsed().as_millis() as u64;

        let record = TranslationRecord {
            original_text: text.to_string(),
            source_language: translation.detected_language,
            translations: translation.translations,
            timestamp: chrono::Utc::now(),
        };
        let translation_path = self.layout.save_translation(&record, Some(&id)).await?;
        info!(
            id = %id,
            languages = record.translations.len(),
            translate_ms,
            "Translation saved"
        );

        let started = Instant::now();
        let synthesis = if self.settings.synthesize {
            self.synthesize_all(&id, &record.translations).await
        } else {
            Vec::new()
        };
        let synthesize_ms = started.elapsed().as_millis() as u64;

        Ok(PipelineRun {
            id,
            transcript: None,
            translation: record,
            translation_path,
            synthesis,
            timings: StageTimings {
                transcribe_ms: None,
                translate_ms,
                synthesize_ms,
            },
        })
    }

    async fn synthesize_all(
        &self,
        id: &str,
        translations: &BTreeMap<String, String>,
    ) -> Vec<SynthesisOutcome> {
        let jobs = translations
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(lang, text)| self.synthesize_one(id, lang, text));
        futures::future::join_all(jobs).await
    }

    async fn synthesize_one(&self, id: &str, lang: &str, text: &str) -> SynthesisOutcome {
        let voice = languages::tts_voice(lang, self.settings.voice_gender).to_string();
        let request = SynthesisRequest {
            text: text.to_string(),
            voice: voice.clone(),
            language: String::new(),
            rate_percent: self.settings.rate_percent,
            pitch_percent: self.settings.pitch_percent,
        };

        let result = match self.tts.synthesize(&request).await {
            Ok(audio) => self
                .layout
                .save_audio(id, lang, &audio)
                .await
                .map(|path| (path, audio))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok((path, audio)) => SynthesisOutcome {
                language: lang.to_string(),
                voice,
                path: Some(path),
                error: None,
                audio,
            },
            Err(error) => {
                warn!(lang, %voice, %error, "Synthesis failed");
                SynthesisOutcome {
                    language: lang.to_string(),
                    voice,
                    path: None,
                    error: Some(error),
                    audio: Vec::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use speechbridge_core::config::BackoffKind;

    use super::*;
    use crate::fakes::{EchoStt, TagTranslator, VoiceTts};

    fn settings(targets: &[&str]) -> PipelineSettings {
        PipelineSettings {
            target_languages: targets.iter().map(|t| t.to_string()).collect(),
            voice_gender: VoiceGender::Female,
            rate_percent: 0,
            pitch_percent: 0,
            synthesize: true,
        }
    }

    fn pipeline(
        root: &std::path::Path,
        translator: Arc<TagTranslator>,
        tts: VoiceTts,
        settings: PipelineSettings,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(EchoStt),
            translator,
            Arc::new(tts),
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                backoff: BackoffKind::Linear,
            },
            OutputLayout::new(root),
            settings,
        )
    }

    #[tokio::test]
    async fn test_process_audio_runs_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let translator = Arc::new(TagTranslator::default());
        let p = pipeline(
            dir.path(),
            translator.clone(),
            VoiceTts::default(),
            settings(&["hi", "es"]),
        );

        let run = p.process_audio(b"good morning", "en-US").await.unwrap();

        let transcript = run.transcript.as_ref().unwrap();
        assert_eq!(transcript.text, "good morning");
        assert_eq!(transcript.language, "en-US");
        assert!(run.timings.transcribe_ms.is_some());

        // Source language is passed as a base code
        assert_eq!(
            translator.calls.lock().unwrap()[0],
            ("good morning".to_string(), Some("en".to_string()))
        );
        assert_eq!(run.translation.translations["hi"], "good morning [hi]");
        assert!(run.translation_path.exists());

        assert_eq!(run.synthesis.len(), 2);
        for outcome in &run.synthesis {
            assert!(outcome.succeeded());
            let path = outcome.path.as_ref().unwrap();
            assert_eq!(
                path,
                &p.layout()
                    .audio_path(&run.id, &outcome.language)
            );
            assert_eq!(std::fs::read(path).unwrap(), outcome.voice.as_bytes());
        }
        let hi = run.synthesis.iter().find(|o| o.language == "hi").unwrap();
        assert_eq!(hi.voice, "hi-IN-SwaraNeural");
    }

    #[tokio::test]
    async fn test_no_match_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            dir.path(),
            Arc::new(TagTranslator::default()),
            VoiceTts::default(),
            settings(&["fr"]),
        );
        let err = p.process_audio(b"   ", "en-US").await.unwrap_err();
        assert!(matches!(err, SpeechBridgeError::Speech(_)));
    }

    #[tokio::test]
    async fn test_one_failed_voice_does_not_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let tts = VoiceTts {
            fail_voices: HashSet::from(["fr-FR-DeniseNeural".to_string()]),
        };
        let p = pipeline(
            dir.path(),
            Arc::new(TagTranslator::default()),
            tts,
            settings(&["fr", "de"]),
        );

        let run = p.process_text("hello", None).await.unwrap();
        let fr = run.synthesis.iter().find(|o| o.language == "fr").unwrap();
        let de = run.synthesis.iter().find(|o| o.language == "de").unwrap();
        assert!(!fr.succeeded());
        assert!(fr.error.as_ref().unwrap().contains("voice unavailable"));
        assert!(fr.path.is_none());
        assert!(de.succeeded());
    }

    #[tokio::test]
    async fn test_translation_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let translator = Arc::new(TagTranslator {
            fail_on: HashSet::from(["bad".to_string()]),
            ..TagTranslator::default()
        });
        let p = pipeline(
            dir.path(),
            translator,
            VoiceTts::default(),
            settings(&["fr"]),
        );
        let err = p.process_text("bad", Some("en-US")).await.unwrap_err();
        assert!(matches!(err, SpeechBridgeError::Translation(_)));
    }

    #[tokio::test]
    async fn test_synthesis_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(&["fr"]);
        s.synthesize = false;
        let p = pipeline(
            dir.path(),
            Arc::new(TagTranslator::default()),
            VoiceTts::default(),
            s,
        );
        let run = p.process_text("hello", None).await.unwrap();
        assert!(run.synthesis.is_empty());
        assert_eq!(run.translation.translations["fr"], "hello [fr]");
    }

    #[tokio::test]
    async fn test_concurrent_runs_keep_separate_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            dir.path(),
            Arc::new(TagTranslator::default()),
            VoiceTts::default(),
            settings(&["fr", "de"]),
        );

        for _ in 0..20 {
            let (alpha, beta) =
                tokio::join!(p.process_text("alpha", None), p.process_text("beta", None));
            let (alpha, beta) = (alpha.unwrap(), beta.unwrap());
            assert_ne!(alpha.id, beta.id);
            assert_ne!(alpha.translation_path, beta.translation_path);

            let saved: TranslationRecord =
                serde_json::from_str(&std::fs::read_to_string(&beta.translation_path).unwrap())
                    .unwrap();
            assert_eq!(saved.original_text, "beta");
            assert!(alpha.synthesis.iter().all(SynthesisOutcome::succeeded));
        }
    }

    /// "loud" for any chunk with a non-zero sample, no match for silence.
    struct LoudStt;

    #[async_trait::async_trait]
    impl SpeechToText for LoudStt {
        fn id(&self) -> &str {
            "loud-stt"
        }

        async fn transcribe(
            &self,
            audio_wav: &[u8],
            _locale: &str,
        ) -> std::result::Result<Recognition, speechbridge_providers::ProviderError> {
            if audio_wav[44..].iter().any(|b| *b != 0) {
                Ok(Recognition::Recognized("loud".into()))
            } else {
                Ok(Recognition::NoMatch)
            }
        }
    }

    #[tokio::test]
    async fn test_long_audio_is_recognized_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let p = Pipeline::new(
            Arc::new(LoudStt),
            Arc::new(TagTranslator::default()),
            Arc::new(VoiceTts::default()),
            RetryPolicy::default(),
            OutputLayout::new(dir.path()),
            settings(&["de"]),
        );

        // One silent second, then 1.5 seconds of signal
        let mut samples = vec![0i16; 16_000];
        samples.extend(std::iter::repeat_n(300i16, 24_000));
        let audio = wav::pcm_to_wav(&samples, 16000, 1, 16);

        let run = p.process_long_audio(&audio, "en-US", 1).await.unwrap();
        assert_eq!(run.transcript.unwrap().text, "loud loud");
        assert_eq!(run.translation.translations["de"], "loud loud [de]");

        let silence = wav::pcm_to_wav(&[0; 32_000], 16000, 1, 16);
        let err = p.process_long_audio(&silence, "en-US", 1).await.unwrap_err();
        assert!(matches!(err, SpeechBridgeError::Speech(_)));
    }
}
