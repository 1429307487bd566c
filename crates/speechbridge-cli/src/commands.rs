//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use speechbridge_core::config::Config;
use speechbridge_core::languages::{self, CATALOG};
use speechbridge_core::types::{TranslationRecord, VoiceGender, WorkerStatus};
use speechbridge_media::{convert, wav, youtube};
use speechbridge_pipeline::batch::{self, BatchSummary};
use speechbridge_pipeline::worker::{
    DirectorySource, LiveSettings, LiveWorker, WorkerPaths, WorkerSupervisor,
};
use speechbridge_pipeline::{CHUNK_SECS, OutputLayout, PipelineRun};
use speechbridge_providers::{
    Recognition, SpeechToText, SynthesisRequest, TextToSpeech, Translator,
};
use speechbridge_server::{AppState, WorkerCommand, diagnostics};
use tracing::{info, warn};

use crate::services;

const STOP_GRACE: Duration = Duration::from_secs(5);

fn layout(config: &Config) -> OutputLayout {
    OutputLayout::new(config.output_dir())
}

fn source_locale(config: &Config, language: Option<String>) -> String {
    language.unwrap_or_else(|| config.pipeline().source_language)
}

/// Convert `input` to WAV when needed, into `<output>/converted`.
async fn prepare_wav(config: &Config, input: &Path) -> anyhow::Result<Vec<u8>> {
    if !input.exists() {
        bail!("File not found: {}", input.display());
    }
    let wav_path = convert::ensure_wav(input, &layout(config).root().join("converted")).await?;
    tokio::fs::read(&wav_path)
        .await
        .with_context(|| format!("Failed to read {}", wav_path.display()))
}

pub async fn transcribe(
    config: &Config,
    file: &Path,
    language: Option<String>,
) -> anyhow::Result<()> {
    let locale = source_locale(config, language);
    let stt = services::speech_to_text(config)?;
    let audio = prepare_wav(config, file).await?;

    let mut texts = Vec::new();
    for chunk in wav::split_wav(&audio, CHUNK_SECS)? {
        if let Recognition::Recognized(text) = stt.transcribe(&chunk, &locale).await? {
            texts.push(text);
        }
    }

    if texts.is_empty() {
        println!("{}", batch::NO_SPEECH);
    } else {
        println!("{}", texts.join(" "));
    }
    Ok(())
}

pub async fn translate(
    config: &Config,
    text: &str,
    to: Vec<String>,
    from: Option<String>,
) -> anyhow::Result<()> {
    let translator = services::retrying_translator(config)?;
    let targets = if to.is_empty() {
        config.pipeline().target_languages
    } else {
        to
    };
    let source = from.as_deref().map(languages::base_code);

    let translation = translator.translate(text.trim(), &targets, source).await?;
    let record = TranslationRecord {
        original_text: text.trim().to_string(),
        source_language: translation.detected_language,
        translations: translation.translations,
        timestamp: chrono::Utc::now(),
    };
    let path = layout(config).save_translation(&record, None).await?;

    println!(
        "Detected: {} ({})",
        languages::language_name(&record.source_language),
        record.source_language
    );
    for (code, translated) in &record.translations {
        println!("{:<12} {translated}", languages::language_name(code));
    }
    println!("Saved to {}", path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn synthesize(
    config: &Config,
    text: &str,
    language: &str,
    gender: Option<VoiceGender>,
    rate: Option<i32>,
    pitch: Option<i32>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let tts = services::text_to_speech(config)?;
    let defaults = config.tts();
    let code = languages::base_code(language);
    let request = SynthesisRequest {
        text: text.to_string(),
        voice: languages::tts_voice(code, gender.unwrap_or(defaults.voice_gender)).to_string(),
        language: languages::speech_locale(code).to_string(),
        rate_percent: rate.unwrap_or(defaults.rate_percent),
        pitch_percent: pitch.unwrap_or(defaults.pitch_percent),
    };

    let audio = tts.synthesize(&request).await?;
    let out = match out {
        Some(path) => path,
        None => {
            let id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            layout(config).audio_path(&id, code)
        }
    };
    if let Some(parent) = out.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&out, &audio).await?;
    println!("{} ({} bytes, {})", out.display(), audio.len(), request.voice);
    Ok(())
}

pub async fn run(
    config: &Config,
    audio: &Path,
    language: Option<String>,
    to: Vec<String>,
) -> anyhow::Result<()> {
    let locale = source_locale(config, language);
    let pipeline = services::pipeline(config, Some(to))?;
    let clip = prepare_wav(config, audio).await?;
    let run = pipeline.process_long_audio(&clip, &locale, CHUNK_SECS).await?;
    print_run(&run);
    Ok(())
}

pub async fn youtube_pipeline(
    config: &Config,
    url: &str,
    language: Option<String>,
    to: Vec<String>,
    keep: bool,
) -> anyhow::Result<()> {
    let locale = source_locale(config, language);
    let pipeline = services::pipeline(config, Some(to))?;
    let downloads = layout(config).root().join("downloads");

    let downloaded = youtube::download_audio(url, &downloads).await?;
    println!("Downloaded \"{}\"", downloaded.title);

    let audio = tokio::fs::read(&downloaded.path).await?;
    let result = pipeline.process_long_audio(&audio, &locale, CHUNK_SECS).await;

    if !keep {
        if let Err(e) = tokio::fs::remove_file(&downloaded.path).await {
            warn!(path = %downloaded.path.display(), %e, "Failed to remove download");
        }
    }
    print_run(&result?);
    Ok(())
}

fn print_run(run: &PipelineRun) {
    if let Some(transcript) = &run.transcript {
        println!("Transcript ({}): {}", transcript.language, transcript.text);
    }
    println!("Detected language: {}", run.translation.source_language);
    for (code, text) in &run.translation.translations {
        println!("  {:<12} {text}", languages::language_name(code));
    }
    println!("Translation saved to {}", run.translation_path.display());
    for outcome in &run.synthesis {
        match (&outcome.path, &outcome.error) {
            (Some(path), _) => println!("  audio {:<4} {}", outcome.language, path.display()),
            (None, Some(error)) => println!("  audio {:<4} FAILED: {error}", outcome.language),
            (None, None) => {}
        }
    }
    println!(
        "Timings: transcribe {} ms, translate {} ms, synthesize {} ms",
        run.timings.transcribe_ms.unwrap_or(0),
        run.timings.translate_ms,
        run.timings.synthesize_ms
    );
}

fn print_summary(label: &str, summary: &BatchSummary) {
    println!(
        "{label}: {} files, {} ok, {} skipped, {} failed",
        summary.total, summary.succeeded, summary.skipped, summary.failed
    );
    if let Some(output) = &summary.output {
        println!("Wrote {}", output.display());
    }
}

pub async fn batch_transcribe(
    config: &Config,
    dir: &Path,
    out: Option<PathBuf>,
    convert: bool,
) -> anyhow::Result<()> {
    let stt = services::speech_to_text(config)?;
    let out = out.unwrap_or_else(|| layout(config).transcripts_csv());
    let summary = batch::transcribe_directory(stt.as_ref(), dir, &out, convert).await?;
    print_summary("Transcription", &summary);
    Ok(())
}

pub async fn batch_translate(config: &Config, csv: &Path, to: Vec<String>) -> anyhow::Result<()> {
    let translator = services::retrying_translator(config)?;
    let targets = if to.is_empty() {
        config.pipeline().target_languages
    } else {
        to
    };
    let summary =
        batch::translate_transcripts(&translator, csv, &targets, &layout(config)).await?;
    print_summary("Translation", &summary);
    Ok(())
}

/// Base arguments for re-invoking this binary as the live worker.
pub fn worker_command(config_path: Option<&Path>) -> anyhow::Result<WorkerCommand> {
    let program = std::env::current_exe().context("Cannot locate the speechbridge binary")?;
    let mut args = vec!["worker".to_string(), "run".to_string(), "--log-to-file".to_string()];
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.display().to_string());
    }
    Ok(WorkerCommand { program, args })
}

fn supervisor(config: &Config) -> WorkerSupervisor {
    WorkerSupervisor::new(WorkerPaths::new(config.worker_state_dir()))
}

pub async fn worker_run(config: &Config, language: Option<String>) -> anyhow::Result<()> {
    let locale = source_locale(config, language);
    let paths = WorkerPaths::new(config.worker_state_dir());

    let stt = match services::speech_to_text(config) {
        Ok(stt) => stt,
        Err(e) => {
            // The supervisor reads this to explain the failed start
            paths.write_status(&WorkerStatus::failed(format!("{e:#}"))).await?;
            return Err(e);
        }
    };

    let inbox = config.worker_inbox_dir();
    tokio::fs::create_dir_all(&inbox).await?;
    info!(inbox = %inbox.display(), %locale, "Live worker reading segments");

    let worker = LiveWorker::new(paths, stt, LiveSettings::from_config(config, locale));
    let mut source = DirectorySource::new(inbox);
    let reason = worker.run(&mut source).await?;
    println!("Live worker stopped: {reason}");
    Ok(())
}

pub async fn worker_start(
    config: &Config,
    config_path: Option<&Path>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let locale = source_locale(config, language);
    let command = worker_command(config_path)?;
    let pid = supervisor(config)
        .start(&command.program, &command.args_for(&locale))
        .await?;
    println!("Live worker started (pid {pid}, {locale})");
    println!("Drop WAV segments into {}", config.worker_inbox_dir().display());
    Ok(())
}

pub async fn worker_stop(config: &Config) -> anyhow::Result<()> {
    if supervisor(config).stop(STOP_GRACE).await? {
        println!("Live worker stopped");
    } else {
        println!("Live worker is not running");
    }
    Ok(())
}

pub async fn worker_status(config: &Config) -> anyhow::Result<()> {
    let status = supervisor(config).status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn worker_transcripts(config: &Config, clear: bool) -> anyhow::Result<()> {
    let supervisor = supervisor(config);
    let transcripts = supervisor.transcripts().await;
    if transcripts.is_empty() {
        println!("No live transcripts");
    }
    for t in &transcripts {
        println!("[{}] {}", t.timestamp.format("%H:%M:%S"), t.text);
    }
    if clear {
        supervisor.clear_transcripts().await?;
        println!("Cleared {} transcripts", transcripts.len());
    }
    Ok(())
}

pub async fn serve(
    config: Config,
    config_path: Option<&Path>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let port = port.unwrap_or_else(|| config.dashboard_port());
    let bind = bind.unwrap_or_else(|| config.dashboard_bind());
    let services = services::server_services(&config);
    let worker = match worker_command(config_path) {
        Ok(command) => Some(command),
        Err(e) => {
            warn!("{e:#}; live recognition disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(Arc::new(config), services, worker));
    speechbridge_server::start_server(state, &bind, port).await
}

pub async fn doctor(config: &Config, config_path: &Path) -> anyhow::Result<()> {
    println!("SpeechBridge v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Config: {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (not found, using defaults)" }
    );
    println!("Output: {}", config.output_dir().display());

    let diag = diagnostics::collect(config).await;
    for check in &diag.checks {
        let mark = if check.ok { "OK     " } else { "MISSING" };
        match &check.detail {
            Some(detail) if check.ok => println!("  {mark} {} ({detail})", check.name),
            _ => println!("  {mark} {}", check.name),
        }
    }
    for warning in &diag.warnings {
        println!("  warning: {warning}");
    }
    for error in &diag.errors {
        println!("  error: {error}");
    }

    if !diag.is_healthy() {
        bail!("Configuration incomplete");
    }
    Ok(())
}

pub fn list_languages() {
    println!("{:<5} {:<12} {:<7} {:<24} MALE VOICE", "CODE", "NAME", "LOCALE", "FEMALE VOICE");
    for lang in CATALOG {
        println!(
            "{:<5} {:<12} {:<7} {:<24} {}",
            lang.code, lang.name, lang.locale, lang.female_voice, lang.male_voice
        );
    }
}

/// Parse a `config set` value as JSON, falling back to a plain string.
pub fn parse_config_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_value() {
        assert_eq!(parse_config_value("8080"), serde_json::json!(8080));
        assert_eq!(parse_config_value("[\"de\",\"fr\"]"), serde_json::json!(["de", "fr"]));
        assert_eq!(parse_config_value("westeurope"), serde_json::json!("westeurope"));
        assert_eq!(parse_config_value("true"), serde_json::json!(true));
    }

    #[test]
    fn test_worker_command_carries_config() {
        let command = worker_command(Some(Path::new("/etc/sb.json"))).unwrap();
        assert_eq!(
            command.args,
            vec!["worker", "run", "--log-to-file", "--config", "/etc/sb.json"]
        );
        assert!(command.program.is_absolute());
    }

    #[tokio::test]
    async fn test_worker_status_without_worker() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            worker: Some(speechbridge_core::config::WorkerConfig {
                state_dir: Some(dir.path().display().to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!supervisor(&config).status().await.unwrap().running);
        worker_transcripts(&config, true).await.unwrap();
    }
}
