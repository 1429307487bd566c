//! On-disk layout for pipeline artifacts.
//!
//! ```text
//! <root>/transcripts/transcripts.csv
//! <root>/translations/translation_<id>.json
//! <root>/translations/translated_transcripts.csv
//! <root>/audio/tts_<id>_<lang>.wav
//! ```

use std::path::{Path, PathBuf};

use speechbridge_core::error::Result;
use speechbridge_core::types::TranslationRecord;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.root.join("transcripts")
    }

    pub fn translations_dir(&self) -> PathBuf {
        self.root.join("translations")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn transcripts_csv(&self) -> PathBuf {
        self.transcripts_dir().join("transcripts.csv")
    }

    pub fn translated_csv(&self) -> PathBuf {
        self.translations_dir().join("translated_transcripts.csv")
    }

    pub fn audio_path(&self, id: &str, lang: &str) -> PathBuf {
        self.audio_dir().join(format!("tts_{id}_{lang}.wav"))
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.transcripts_dir()).await?;
        tokio::fs::create_dir_all(self.translations_dir()).await?;
        tokio::fs::create_dir_all(self.audio_dir()).await?;
        Ok(())
    }

    /// Write `translation_<id>.json`. Without an id the name is a timestamp
    /// plus a random suffix, so records saved in the same second stay apart.
    pub async fn save_translation(
        &self,
        record: &TranslationRecord,
        id: Option<&str>,
    ) -> Result<PathBuf> {
        let name = match id {
            Some(id) => format!("translation_{id}.json"),
            None => format!(
                "translation_{}_{}.json",
                chrono::Local::now().format("%Y%m%d_%H%M%S"),
                short_uuid()
            ),
        };
        let path = self.translations_dir().join(name);
        let data = serde_json::to_string_pretty(record)?;
        write_atomic(&path, data.as_bytes()).await?;
        debug!(path = %path.display(), "Saved translation");
        Ok(path)
    }

    pub async fn save_audio(&self, id: &str, lang: &str, audio: &[u8]) -> Result<PathBuf> {
        let path = self.audio_path(id, lang);
        write_atomic(&path, audio).await?;
        Ok(path)
    }
}

/// Eight hex digits of a v4 uuid.
pub(crate) fn short_uuid() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Write to a uniquely named sibling temp file, then rename over the target.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
