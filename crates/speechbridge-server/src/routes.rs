//! JSON API handlers for the dashboard.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};
use speechbridge_core::config::{PITCH_RANGE, RATE_RANGE};
use speechbridge_core::error::SpeechBridgeError;
use speechbridge_core::languages::{self, CATALOG};
use speechbridge_core::types::{TranslationRecord, VoiceGender};
use speechbridge_media::wav::{self, WavInfo};
use speechbridge_media::youtube;
use speechbridge_pipeline::batch;
use speechbridge_pipeline::{CHUNK_SECS, PipelineRun};
use speechbridge_providers::{ProviderError, Recognition, SynthesisRequest, Translator};
use tracing::{info, warn};

use crate::diagnostics;
use crate::state::AppState;

type AppResult<T> = Result<T, ApiError>;

const STOP_GRACE: Duration = Duration::from_secs(5);

/// Error rendered as `{"error": "..."}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_configured(service: &str) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{service} is not configured; run `speechbridge doctor`"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "Request failed");
        }
        #[cfg(feature = "metrics")]
        crate::metrics::record_error(self.status.as_str());
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<SpeechBridgeError> for ApiError {
    fn from(err: SpeechBridgeError) -> Self {
        let status = match &err {
            SpeechBridgeError::Speech(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SpeechBridgeError::Translation(_) | SpeechBridgeError::Synthesis(_) => {
                StatusCode::BAD_GATEWAY
            }
            SpeechBridgeError::Media(_) => StatusCode::BAD_REQUEST,
            SpeechBridgeError::Worker(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        let status = match &err {
            ProviderError::EmptyInput(_) => StatusCode::BAD_REQUEST,
            ProviderError::MissingCredentials(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn diagnostics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(diagnostics::collect(&state.config).await)
}

pub async fn languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "languages": CATALOG,
        "default_targets": state.config.pipeline().target_languages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<String>,
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateRequest>,
) -> AppResult<Json<Value>> {
    let translator = state
        .translator
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("Translator"))?;

    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("Text is empty"));
    }
    let targets = match req.targets {
        Some(targets) if !targets.is_empty() => targets,
        _ => state.config.pipeline().target_languages,
    };
    let source = req.source.as_deref().map(languages::base_code);

    let translation = translator.translate(text, &targets, source).await?;
    let record = TranslationRecord {
        original_text: text.to_string(),
        source_language: translation.detected_language,
        translations: translation.translations,
        timestamp: chrono::Utc::now(),
    };
    let path = state.layout.save_translation(&record, None).await?;
    info!(
        detected = %record.source_language,
        targets = record.translations.len(),
        "Text translated"
    );

    Ok(Json(json!({
        "detected_language": record.source_language,
        "translations": record.translations,
        "path": path,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub language: String,
    #[serde(default)]
    pub gender: Option<VoiceGender>,
    #[serde(default)]
    pub rate: Option<i32>,
    #[serde(default)]
    pub pitch: Option<i32>,
}

pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SynthesizeRequest>,
) -> AppResult<Response> {
    let tts = state
        .services
        .tts
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("Speech synthesis"))?;

    let defaults = state.config.tts();
    let rate = req.rate.unwrap_or(defaults.rate_percent);
    let pitch = req.pitch.unwrap_or(defaults.pitch_percent);
    if !RATE_RANGE.contains(&rate) {
        return Err(ApiError::bad_request(format!(
            "rate must be within {}..={}",
            RATE_RANGE.start(),
            RATE_RANGE.end()
        )));
    }
    if !PITCH_RANGE.contains(&pitch) {
        return Err(ApiError::bad_request(format!(
            "pitch must be within {}..={}",
            PITCH_RANGE.start(),
            PITCH_RANGE.end()
        )));
    }

    let code = languages::base_code(&req.language);
    let gender = req.gender.unwrap_or(defaults.voice_gender);
    let request = SynthesisRequest {
        text: req.text,
        voice: languages::tts_voice(code, gender).to_string(),
        language: languages::speech_locale(code).to_string(),
        rate_percent: rate,
        pitch_percent: pitch,
    };
    let audio = tts.synthesize(&request).await?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], audio).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    #[serde(default)]
    pub language: Option<String>,
}

impl LanguageQuery {
    fn locale(&self, state: &AppState) -> String {
        match self.language.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => lang.to_string(),
            _ => state.config.pipeline().source_language,
        }
    }
}

fn check_wav(body: &[u8]) -> AppResult<()> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    let info = WavInfo::parse(body)?;
    if !info.is_speech_ready() {
        warn!(
            sample_rate = info.sample_rate,
            channels = info.channels,
            bits = info.bits_per_sample,
            "WAV is not 16 kHz mono PCM; recognition may fail"
        );
    }
    Ok(())
}

pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LanguageQuery>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let stt = state
        .services
        .stt
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("Speech recognition"))?;
    check_wav(&body)?;
    let locale = query.locale(&state);

    // Long uploads go to short-audio recognition one chunk at a time
    let chunks = wav::split_wav(&body, CHUNK_SECS)?;
    let mut texts = Vec::new();
    for chunk in &chunks {
        if let Recognition::Recognized(text) = stt.transcribe(chunk, &locale).await? {
            texts.push(text);
        }
    }

    let response = if texts.is_empty() {
        json!({
            "status": "no_match",
            "language": locale,
            "chunks": chunks.len(),
        })
    } else {
        json!({
            "status": "recognized",
            "text": texts.join(" "),
            "language": locale,
            "chunks": chunks.len(),
        })
    };
    Ok(Json(response))
}

pub async fn pipeline(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LanguageQuery>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let pipeline = state
        .pipeline
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("The speech pipeline"))?;
    check_wav(&body)?;
    let locale = query.locale(&state);

    let run = pipeline
        .process_long_audio(&body, &locale, CHUNK_SECS)
        .await?;
    #[cfg(feature = "metrics")]
    crate::metrics::record_stages(&run.timings);

    Ok(Json(pipeline_response(&run)))
}

#[derive(Debug, Deserialize)]
pub struct YoutubeRequest {
    pub url: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Keep the downloaded WAV under `<output>/downloads`.
    #[serde(default)]
    pub keep: bool,
}

pub async fn youtube_pipeline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<YoutubeRequest>,
) -> AppResult<Json<Value>> {
    let pipeline = state
        .pipeline
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("The speech pipeline"))?;
    let url = req.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("URL is empty"));
    }
    let locale = LanguageQuery {
        language: req.language,
    }
    .locale(&state);

    let downloads = state.layout.root().join("downloads");
    let downloaded = youtube::download_audio_with(url, &downloads, &state.downloader).await?;
    info!(title = %downloaded.title, "Video audio downloaded");

    let result = match tokio::fs::read(&downloaded.path).await {
        Ok(audio) => pipeline.process_long_audio(&audio, &locale, CHUNK_SECS).await,
        Err(e) => Err(e.into()),
    };
    if !req.keep {
        if let Err(e) = tokio::fs::remove_file(&downloaded.path).await {
            warn!(path = %downloaded.path.display(), %e, "Failed to remove download");
        }
    }
    let run = result?;
    #[cfg(feature = "metrics")]
    crate::metrics::record_stages(&run.timings);

    let mut body = pipeline_response(&run);
    body["title"] = Value::String(downloaded.title);
    if req.keep {
        body["audio_path"] = json!(downloaded.path);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct BatchTranscribeRequest {
    /// Server-side directory of recordings.
    pub dir: PathBuf,
    #[serde(default = "default_convert")]
    pub convert: bool,
}

fn default_convert() -> bool {
    true
}

pub async fn batch_transcribe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchTranscribeRequest>,
) -> AppResult<Json<Value>> {
    let stt = state
        .services
        .stt
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("Speech recognition"))?;
    if !req.dir.is_dir() {
        return Err(ApiError::bad_request(format!(
            "{} is not a directory",
            req.dir.display()
        )));
    }

    let output = state.layout.transcripts_csv();
    let summary =
        batch::transcribe_directory(stt.as_ref(), &req.dir, &output, req.convert).await?;
    let rows = batch::read_transcripts(&output)?;
    Ok(Json(json!({ "summary": summary, "rows": rows })))
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchTranslateRequest {
    /// Transcript CSV; defaults to the one `batch/transcribe` writes.
    #[serde(default)]
    pub csv: Option<PathBuf>,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

pub async fn batch_translate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchTranslateRequest>,
) -> AppResult<Json<Value>> {
    let translator = state
        .translator
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("Translator"))?;
    let input = req.csv.unwrap_or_else(|| state.layout.transcripts_csv());
    if !input.is_file() {
        return Err(ApiError::bad_request(format!(
            "No transcript CSV at {}; transcribe a directory first",
            input.display()
        )));
    }
    let targets = match req.targets {
        Some(targets) if !targets.is_empty() => targets,
        _ => state.config.pipeline().target_languages,
    };

    let summary =
        batch::translate_transcripts(translator, &input, &targets, &state.layout).await?;
    Ok(Json(json!({ "summary": summary, "targets": targets })))
}

/// Flatten a run for the dashboard, inlining synthesized audio as base64.
fn pipeline_response(run: &PipelineRun) -> Value {
    let engine = base64::engine::general_purpose::STANDARD;
    let synthesis: Vec<Value> = run
        .synthesis
        .iter()
        .map(|outcome| {
            let mut item = json!({
                "language": outcome.language,
                "voice": outcome.voice,
            });
            if outcome.succeeded() {
                item["audio_base64"] = Value::String(engine.encode(&outcome.audio));
            }
            if let Some(error) = &outcome.error {
                item["error"] = Value::String(error.clone());
            }
            item
        })
        .collect();

    json!({
        "id": run.id,
        "transcript": run.transcript.as_ref().map(|t| t.text.as_str()).unwrap_or_default(),
        "detected_language": run.translation.source_language,
        "translations": run.translation.translations,
        "translation_path": run.translation_path,
        "synthesis": synthesis,
        "timings": run.timings,
    })
}

pub async fn live_status(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.supervisor.status().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub language: Option<String>,
}

pub async fn live_start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let command = state
        .worker_command
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("The live worker"))?;
    // An empty body starts the worker with the default source language
    let req: StartRequest = if body.is_empty() {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?
    };
    let locale = LanguageQuery {
        language: req.language,
    }
    .locale(&state);

    let pid = state
        .supervisor
        .start(&command.program, &command.args_for(&locale))
        .await?;
    info!(pid, %locale, "Live worker started from dashboard");
    Ok(Json(json!({ "pid": pid })))
}

pub async fn live_stop(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let stopped = state.supervisor.stop(STOP_GRACE).await?;
    Ok(Json(json!({ "stopped": stopped })))
}

pub async fn live_transcripts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "transcripts": state.supervisor.transcripts().await }))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use speechbridge_core::types::Transcript;
    use speechbridge_pipeline::{StageTimings, SynthesisOutcome};

    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let err: ApiError = SpeechBridgeError::Speech("No speech detected".into()).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        let err: ApiError = SpeechBridgeError::Worker("already running".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        let err: ApiError = ProviderError::EmptyInput("text").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err: ApiError = ProviderError::Http {
            status: 500,
            body: "oops".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_check_wav_rejects_garbage() {
        assert_eq!(check_wav(b"").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(
            check_wav(b"definitely not riff").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        let wav = speechbridge_media::wav::pcm_to_wav(&[0i16; 160], 16000, 1, 16);
        assert!(check_wav(&wav).is_ok());
    }

    #[test]
    fn test_pipeline_response_inlines_audio() {
        let run = PipelineRun {
            id: "20250101_120000_000".into(),
            transcript: Some(Transcript::live("hello", "en-US")),
            translation: TranslationRecord {
                original_text: "hello".into(),
                source_language: "en".into(),
                translations: BTreeMap::from([
                    ("de".to_string(), "hallo".to_string()),
                    ("fr".to_string(), "bonjour".to_string()),
                ]),
                timestamp: chrono::Utc::now(),
            },
            translation_path: PathBuf::from("output/translations/t.json"),
            synthesis: vec![
                SynthesisOutcome {
                    language: "de".into(),
                    voice: "de-DE-KatjaNeural".into(),
                    path: Some(PathBuf::from("a.wav")),
                    error: None,
                    audio: b"RIFF".to_vec(),
                },
                SynthesisOutcome {
                    language: "fr".into(),
                    voice: "fr-FR-DeniseNeural".into(),
                    path: None,
                    error: Some("voice unavailable".into()),
                    audio: Vec::new(),
                },
            ],
            timings: StageTimings::default(),
        };

        let body = pipeline_response(&run);
        assert_eq!(body["transcript"], "hello");
        assert_eq!(body["detected_language"], "en");
        assert_eq!(body["translations"]["de"], "hallo");
        assert_eq!(body["synthesis"][0]["audio_base64"], "UklGRg==");
        assert!(body["synthesis"][1]["audio_base64"].is_null());
        assert_eq!(body["synthesis"][1]["error"], "voice unavailable");
    }
}
