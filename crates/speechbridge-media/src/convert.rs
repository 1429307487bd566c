//! Audio conversion to recognition-ready WAV via ffmpeg.

use std::path::{Path, PathBuf};
use std::time::Duration;

use speechbridge_core::error::{Result, SpeechBridgeError};
use tracing::{debug, info, warn};

/// File extensions treated as audio inputs.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "mp4", "aac", "flac"];

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(600);

pub fn is_audio_file(path: &Path) -> bool {
    extension(path).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Lowercased extension without the dot.
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// ffmpeg arguments producing 16 kHz mono 16-bit PCM.
pub fn ffmpeg_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        input.display().to_string(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        "16000".into(),
        "-y".into(),
        output.display().to_string(),
    ]
}

/// Make sure `input` is available as WAV, converting into `out_dir` if needed.
///
/// WAV input is returned as is, and an existing `<stem>.wav` in `out_dir` is
/// reused. When ffmpeg is not installed the original path comes back with a
/// warning so callers can still try the file.
pub async fn ensure_wav(input: &Path, out_dir: &Path) -> Result<PathBuf> {
    ensure_wav_with(input, out_dir, "ffmpeg").await
}

pub async fn ensure_wav_with(input: &Path, out_dir: &Path, ffmpeg: &str) -> Result<PathBuf> {
    if extension(input).as_deref() == Some("wav") {
        return Ok(input.to_path_buf());
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SpeechBridgeError::Media(format!("bad file name: {}", input.display())))?;
    let output = out_dir.join(format!("{stem}.wav"));
    if output.exists() {
        debug!(path = %output.display(), "WAV version already exists");
        return Ok(output);
    }

    tokio::fs::create_dir_all(out_dir).await?;
    info!(input = %input.display(), output = %output.display(), "Converting to WAV");

    let result = tokio::time::timeout(
        FFMPEG_TIMEOUT,
        tokio::process::Command::new(ffmpeg)
            .args(ffmpeg_args(input, &output))
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output_status)) if output_status.status.success() => Ok(output),
        Ok(Ok(output_status)) => {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            Err(SpeechBridgeError::Media(format!(
                "ffmpeg failed for {} ({}): {tail}",
                input.display(),
                output_status.status
            )))
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(ffmpeg, "ffmpeg not installed, using original file");
            Ok(input.to_path_buf())
        }
        Ok(Err(e)) => Err(SpeechBridgeError::Media(format!("failed to run ffmpeg: {e}"))),
        Err(_) => Err(SpeechBridgeError::Media(format!(
            "ffmpeg timed out after {}s",
            FFMPEG_TIMEOUT.as_secs()
        ))),
    }
}

/// First line of `<program> -version`-style output, or `None` when the tool
/// is missing or fails.
pub async fn tool_version(program: &str, version_flag: &str) -> Option<String> {
    let output = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(program)
            .arg(version_flag)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("a/te_talk.MP3")));
        assert!(is_audio_file(Path::new("clip.flac")));
        assert!(!is_audio_file(Path::new("notes.txt")));
        assert!(!is_audio_file(Path::new("noext")));
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = ffmpeg_args(Path::new("in.mp3"), Path::new("out/in.wav"));
        assert_eq!(
            args,
            vec![
                "-i", "in.mp3", "-acodec", "pcm_s16le", "-ac", "1", "-ar", "16000", "-y",
                "out/in.wav"
            ]
        );
    }

    #[tokio::test]
    async fn test_wav_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hi_clip.WAV");
        let out = ensure_wav(&input, dir.path()).await.unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_existing_conversion_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.m4a");
        std::fs::write(&input, b"not really m4a").unwrap();
        let converted = dir.path().join("converted");
        std::fs::create_dir_all(&converted).unwrap();
        std::fs::write(converted.join("talk.wav"), b"RIFF").unwrap();

        let out = ensure_wav_with(&input, &converted, "ffmpeg-does-not-exist")
            .await
            .unwrap();
        assert_eq!(out, converted.join("talk.wav"));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_falls_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.mp3");
        std::fs::write(&input, b"ID3").unwrap();

        let out = ensure_wav_with(&input, &dir.path().join("wav"), "ffmpeg-does-not-exist-sb")
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_tool_version_missing_tool() {
        assert!(tool_version("speechbridge-no-such-tool", "-version").await.is_none());
    }
}
