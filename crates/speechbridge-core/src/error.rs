use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeechBridgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SpeechBridgeError>;
