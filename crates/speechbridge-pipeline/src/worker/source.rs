//! Audio segment sources for the live worker.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use speechbridge_core::error::Result;
use tracing::debug;

/// One short utterance to recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub audio: Vec<u8>,
}

/// Yields audio segments as they become available.
#[async_trait]
pub trait SegmentSource: Send {
    /// Next ready segment, or `None` when nothing is waiting yet.
    async fn next_segment(&mut self) -> Result<Option<Segment>>;
}

/// Polls a directory for `*.wav` files, oldest name first.
///
/// Each file is deleted once read. Writers should create files under another
/// name (e.g. `.wav.part`) and rename them into place when complete.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn first_wav(&self) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut first: Option<PathBuf> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !is_wav || hidden || !entry.file_type().await?.is_file() {
                continue;
            }
            if first.as_ref().is_none_or(|f| path < *f) {
                first = Some(path);
            }
        }
        Ok(first)
    }
}

#[async_trait]
impl SegmentSource for DirectorySource {
    async fn next_segment(&mut self) -> Result<Option<Segment>> {
        let Some(path) = self.first_wav().await? else {
            return Ok(None);
        };
        let audio = tokio::fs::read(&path).await?;
        tokio::fs::remove_file(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(segment = %name, bytes = audio.len(), "Segment picked up");
        Ok(Some(Segment { name, audio }))
    }
}
