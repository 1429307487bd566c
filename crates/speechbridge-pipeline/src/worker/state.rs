//! Files shared between the worker process and its supervisor.

use std::path::{Path, PathBuf};

use speechbridge_core::error::Result;
use speechbridge_core::types::{Transcript, WorkerStatus};
use tracing::warn;

use super::pidfile::PidFile;
use crate::output::write_atomic;

#[derive(Debug, Clone)]
pub struct WorkerPaths {
    state_dir: PathBuf,
}

impl WorkerPaths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn pid_file(&self) -> PidFile {
        PidFile::new(self.state_dir.join("recognition_process.pid"))
    }

    pub fn status_file(&self) -> PathBuf {
        self.state_dir.join("recognition_status.json")
    }

    pub fn transcripts_file(&self) -> PathBuf {
        self.state_dir.join("live_transcripts.json")
    }

    pub fn partial_file(&self) -> PathBuf {
        self.state_dir.join("partial_transcript.txt")
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join("live_recognition.log")
    }

    pub async fn write_status(&self, status: &WorkerStatus) -> Result<()> {
        let data = serde_json::to_string_pretty(status)?;
        write_atomic(&self.status_file(), data.as_bytes()).await
    }

    /// Last written status, or `None` if missing or unreadable.
    pub async fn read_status(&self) -> Option<WorkerStatus> {
        let raw = tokio::fs::read_to_string(self.status_file()).await.ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Transcript list; an empty or corrupt file reads as empty.
    pub async fn read_transcripts(&self) -> Vec<Transcript> {
        let raw = match tokio::fs::read_to_string(self.transcripts_file()).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(%e, "Transcript file is corrupt, treating as empty");
            Vec::new()
        })
    }

    pub async fn write_transcripts(&self, transcripts: &[Transcript]) -> Result<()> {
        let data = serde_json::to_string_pretty(transcripts)?;
        write_atomic(&self.transcripts_file(), data.as_bytes()).await
    }

    pub async fn append_transcript(&self, transcript: Transcript) -> Result<()> {
        let mut all = self.read_transcripts().await;
        all.push(transcript);
        self.write_transcripts(&all).await
    }

    pub async fn read_partial(&self) -> Option<String> {
        tokio::fs::read_to_string(self.partial_file())
            .await
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    pub async fn write_partial(&self, text: &str) -> Result<()> {
        tokio::fs::write(self.partial_file(), text).await?;
        Ok(())
    }

    pub async fn clear_partial(&self) {
        let _ = tokio::fs::remove_file(self.partial_file()).await;
    }
}

#[cfg(test)]
mod tests {
    use speechbridge_core::types::WorkerState;

    use super::*;

    #[tokio::test]
    async fn test_transcripts_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkerPaths::new(dir.path());
        assert!(paths.read_transcripts().await.is_empty());

        paths
            .append_transcript(Transcript::live("first line", "en-US"))
            .await
            .unwrap();
        paths
            .append_transcript(Transcript::live("second line", "en-US"))
            .await
            .unwrap();
        let all = paths.read_transcripts().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].text, "second line");

        std::fs::write(paths.transcripts_file(), "{ not json").unwrap();
        assert!(paths.read_transcripts().await.is_empty());

        std::fs::write(paths.transcripts_file(), "   \n").unwrap();
        assert!(paths.read_transcripts().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkerPaths::new(dir.path());
        assert!(paths.read_status().await.is_none());

        paths
            .write_status(&WorkerStatus::now(WorkerState::Listening))
            .await
            .unwrap();
        assert_eq!(
            paths.read_status().await.unwrap().status,
            WorkerState::Listening
        );
    }
}
