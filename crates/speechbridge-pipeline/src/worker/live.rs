//! The live recognition loop.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use speechbridge_core::config::Config;
use speechbridge_core::error::Result;
use speechbridge_core::types::{Transcript, WorkerState, WorkerStatus};
use speechbridge_providers::{Recognition, SpeechToText};
use tracing::{debug, error, info, warn};

use super::source::SegmentSource;
use super::state::WorkerPaths;

#[derive(Debug, Clone)]
pub struct LiveSettings {
    /// Speech locale for recognition.
    pub locale: String,
    pub poll_interval: Duration,
    pub min_segment_chars: usize,
    /// Lowercase phrases that end the session when heard.
    pub stop_phrases: Vec<String>,
    pub max_duration: Option<Duration>,
}

impl LiveSettings {
    pub fn from_config(config: &Config, locale: impl Into<String>) -> Self {
        let worker = config.worker();
        Self {
            locale: locale.into(),
            poll_interval: Duration::from_millis(worker.poll_interval_ms.max(10)),
            min_segment_chars: worker.min_segment_chars,
            stop_phrases: worker
                .stop_phrases
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.is_empty())
                .collect(),
            max_duration: worker.max_duration_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    PidFileRemoved,
    Signal,
    StopPhrase(String),
    MaxDuration,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PidFileRemoved => f.write_str("PID file removed"),
            Self::Signal => f.write_str("interrupted"),
            Self::StopPhrase(p) => write!(f, "heard stop phrase '{p}'"),
            Self::MaxDuration => f.write_str("maximum duration reached"),
        }
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct LiveWorker {
    paths: WorkerPaths,
    stt: Arc<dyn SpeechToText>,
    settings: LiveSettings,
}

impl LiveWorker {
    pub fn new(paths: WorkerPaths, stt: Arc<dyn SpeechToText>, settings: LiveSettings) -> Self {
        Self {
            paths,
            stt,
            settings,
        }
    }

    /// Run until stopped by the supervisor, Ctrl-C/SIGTERM, a stop phrase, or the time limit.
    pub async fn run(&self, source: &mut dyn SegmentSource) -> Result<StopReason> {
        self.run_until(source, shutdown_signal()).await
    }

    /// Like [`run`](Self::run), with a caller-supplied shutdown future.
    pub async fn run_until<F>(
        &self,
        source: &mut dyn SegmentSource,
        shutdown: F,
    ) -> Result<StopReason>
    where
        F: Future<Output = ()>,
    {
        match self.start().await {
            Ok(()) => {}
            Err(e) => {
                error!(%e, "Live worker failed to start");
                let _ = self.paths.write_status(&WorkerStatus::failed(e.to_string())).await;
                return Err(e);
            }
        }

        let result = self.listen(source, shutdown).await;
        self.finish(&result).await;
        result
    }

    async fn start(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.paths.state_dir()).await?;
        self.paths
            .write_status(&WorkerStatus::now(WorkerState::Initializing))
            .await?;

        let pid = std::process::id();
        self.paths.pid_file().create(pid)?;
        self.paths.write_transcripts(&[]).await?;
        self.paths.clear_partial().await;

        self.paths
            .write_status(&WorkerStatus::now(WorkerState::Running))
            .await?;
        info!(pid, locale = %self.settings.locale, "Live worker started");
        Ok(())
    }

    async fn listen<F>(&self, source: &mut dyn SegmentSource, shutdown: F) -> Result<StopReason>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let pid_file = self.paths.pid_file();

        self.paths
            .write_status(&WorkerStatus::now(WorkerState::Listening))
            .await?;

        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(StopReason::Signal),
                _ = ticker.tick() => {}
            }

            if !pid_file.exists() {
                return Ok(StopReason::PidFileRemoved);
            }
            if self
                .settings
                .max_duration
                .is_some_and(|max| started.elapsed() >= max)
            {
                return Ok(StopReason::MaxDuration);
            }

            let segment = match source.next_segment().await {
                Ok(Some(segment)) => segment,
                Ok(None) => continue,
                Err(e) => {
                    warn!(%e, "Failed to read segment");
                    continue;
                }
            };

            match self.stt.transcribe(&segment.audio, &self.settings.locale).await {
                Ok(Recognition::Recognized(text)) => {
                    if let Some(reason) = self.handle_text(&text).await? {
                        return Ok(reason);
                    }
                }
                Ok(Recognition::NoMatch) => debug!(segment = %segment.name, "No speech recognized"),
                Err(e) => warn!(segment = %segment.name, %e, "Recognition failed"),
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<Option<StopReason>> {
        let text = text.trim();
        let normalized = normalize(text);
        if let Some(phrase) = self
            .settings
            .stop_phrases
            .iter()
            .find(|p| normalized.contains(p.as_str()))
        {
            info!(phrase = %phrase, "Stop phrase heard");
            return Ok(Some(StopReason::StopPhrase(phrase.clone())));
        }

        self.paths.write_partial(text).await?;
        if text.chars().count() >= self.settings.min_segment_chars {
            self.paths
                .append_transcript(Transcript::live(text, &self.settings.locale))
                .await?;
            info!(chars = text.len(), "Saved transcript");
        } else {
            debug!(text, "Segment too short, dropped");
        }
        Ok(None)
    }

    async fn finish(&self, result: &Result<StopReason>) {
        self.paths.clear_partial().await;
        if let Err(e) = self.paths.pid_file().remove() {
            warn!(%e, "Failed to remove PID file");
        }
        let status = match result {
            Ok(reason) => {
                info!(%reason, "Live worker stopped");
                WorkerStatus::now(WorkerState::Stopped)
            }
            Err(e) => {
                error!(%e, "Live worker failed");
                WorkerStatus::failed(e.to_string())
            }
        };
        if let Err(e) = self.paths.write_status(&status).await {
            warn!(%e, "Failed to write final status");
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
