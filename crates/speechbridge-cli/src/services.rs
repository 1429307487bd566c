//! Build the Azure clients from config.

use std::sync::Arc;

use anyhow::Context;
use speechbridge_core::config::Config;
use speechbridge_pipeline::{OutputLayout, Pipeline, PipelineSettings};
use speechbridge_providers::azure::{AzureSpeechToText, AzureTextToSpeech, AzureTranslator};
use speechbridge_providers::{
    RetryPolicy, RetryingTranslator, SpeechToText, TextToSpeech, Translator,
};
use speechbridge_server::Services;
use tracing::warn;

pub fn speech_to_text(config: &Config) -> anyhow::Result<Arc<dyn SpeechToText>> {
    let stt = AzureSpeechToText::from_config(&config.speech())
        .context("Speech recognition is unavailable")?;
    Ok(Arc::new(stt))
}

pub fn translator(config: &Config) -> anyhow::Result<Arc<dyn Translator>> {
    let translator = AzureTranslator::from_config(&config.translator())
        .context("Translation is unavailable")?;
    Ok(Arc::new(translator))
}

pub fn text_to_speech(config: &Config) -> anyhow::Result<Arc<dyn TextToSpeech>> {
    let tts = AzureTextToSpeech::from_config(&config.speech(), &config.tts())
        .context("Speech synthesis is unavailable")?;
    Ok(Arc::new(tts))
}

/// Translator wrapped in the configured retry policy.
pub fn retrying_translator(
    config: &Config,
) -> anyhow::Result<RetryingTranslator<Arc<dyn Translator>>> {
    Ok(RetryingTranslator::new(
        translator(config)?,
        RetryPolicy::from_config(&config.translator().retry),
    ))
}

/// Full pipeline; `targets` overrides the configured target languages.
pub fn pipeline(config: &Config, targets: Option<Vec<String>>) -> anyhow::Result<Pipeline> {
    let mut settings = PipelineSettings::from_config(config);
    if let Some(targets) = targets.filter(|t| !t.is_empty()) {
        settings.target_languages = targets;
    }
    Ok(Pipeline::new(
        speech_to_text(config)?,
        translator(config)?,
        text_to_speech(config)?,
        RetryPolicy::from_config(&config.translator().retry),
        OutputLayout::new(config.output_dir()),
        settings,
    ))
}

/// Whatever clients the config allows; the server reports the rest as
/// not configured.
pub fn server_services(config: &Config) -> Services {
    fn optional<T>(result: anyhow::Result<T>) -> Option<T> {
        result.map_err(|e| warn!("{e:#}")).ok()
    }
    Services {
        stt: optional(speech_to_text(config)),
        translator: optional(translator(config)),
        tts: optional(text_to_speech(config)),
    }
}
