//! Server shared state.

use std::path::PathBuf;
use std::sync::Arc;

use speechbridge_core::config::Config;
use speechbridge_pipeline::worker::{WorkerPaths, WorkerSupervisor};
use speechbridge_pipeline::{OutputLayout, Pipeline, PipelineSettings};
use speechbridge_providers::{
    RetryPolicy, RetryingTranslator, SpeechToText, TextToSpeech, Translator,
};

/// The vendor clients the server could build. A missing one means its
/// credentials were not configured.
#[derive(Clone, Default)]
pub struct Services {
    pub stt: Option<Arc<dyn SpeechToText>>,
    pub translator: Option<Arc<dyn Translator>>,
    pub tts: Option<Arc<dyn TextToSpeech>>,
}

/// How to launch the detached live worker. The locale is appended as
/// `--language <locale>`.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn args_for(&self, locale: &str) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--language".into());
        args.push(locale.to_string());
        args
    }
}

/// Shared state accessible from all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Services,
    pub translator: Option<RetryingTranslator<Arc<dyn Translator>>>,
    pub pipeline: Option<Pipeline>,
    pub layout: OutputLayout,
    pub supervisor: WorkerSupervisor,
    pub worker_command: Option<WorkerCommand>,
    /// Executable used for YouTube downloads.
    pub downloader: String,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        services: Services,
        worker_command: Option<WorkerCommand>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.translator().retry);
        let layout = OutputLayout::new(config.output_dir());

        let translator = services
            .translator
            .clone()
            .map(|t| RetryingTranslator::new(t, retry));

        let pipeline = match (&services.stt, &services.translator, &services.tts) {
            (Some(stt), Some(translator), Some(tts)) => Some(Pipeline::new(
                stt.clone(),
                translator.clone(),
                tts.clone(),
                retry,
                layout.clone(),
                PipelineSettings::from_config(&config),
            )),
            _ => None,
        };

        let supervisor = WorkerSupervisor::new(WorkerPaths::new(config.worker_state_dir()));

        Self {
            config,
            services,
            translator,
            pipeline,
            layout,
            supervisor,
            worker_command,
            downloader: "yt-dlp".into(),
        }
    }

    pub fn with_downloader(mut self, program: impl Into<String>) -> Self {
        self.downloader = program.into();
        self
    }
}
