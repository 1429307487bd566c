use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Preferred voice gender for synthesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
}

impl std::str::FromStr for VoiceGender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Self::Female),
            "male" | "m" => Ok(Self::Male),
            other => Err(format!("unknown voice gender '{other}' (expected female or male)")),
        }
    }
}

/// One recognized utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub text: String,
    /// Speech locale the audio was recognized with (e.g. "en-US").
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

impl Transcript {
    /// Build a live transcript with a `live_<epoch_ms>` id.
    pub fn live(text: impl Into<String>, language: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: format!("live_{}", timestamp.timestamp_millis()),
            text: text.into(),
            language: language.into(),
            timestamp,
        }
    }
}

/// A translated text as persisted to `translation_<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub original_text: String,
    pub source_language: String,
    /// Target language code -> translated text.
    pub translations: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of the live recognition worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Initializing,
    Running,
    Listening,
    Stopped,
    Error,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Listening => "listening",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Contents of `recognition_status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub status: WorkerState,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkerStatus {
    pub fn now(status: WorkerState) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: WorkerState::Error,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }
}
