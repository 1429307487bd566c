//! YouTube audio download through `yt-dlp`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use speechbridge_core::error::{Result, SpeechBridgeError};
use tracing::{debug, info};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(900);
const TITLE_LIMIT: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAudio {
    pub path: PathBuf,
    pub title: String,
}

/// Rewrite shorts and `youtu.be` links into `watch?v=` URLs.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    for marker in ["youtube.com/shorts/", "youtu.be/"] {
        if let Some((_, rest)) = url.split_once(marker) {
            let id = rest.split(['?', '&', '/', '#']).next().unwrap_or_default();
            if !id.is_empty() {
                return format!("https://www.youtube.com/watch?v={id}");
            }
        }
    }
    url.to_string()
}

/// Reduce a video title to a short file-name-safe slug.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let slug: String = kept
        .trim()
        .chars()
        .take(TITLE_LIMIT)
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    if slug.is_empty() {
        "youtube_audio".to_string()
    } else {
        slug
    }
}

pub fn ytdlp_args(url: &str, output_template: &str) -> Vec<String> {
    [
        "--no-playlist",
        "--no-progress",
        "-x",
        "--audio-format",
        "wav",
        "--postprocessor-args",
        "ffmpeg:-ac 1 -ar 16000",
        "-o",
        output_template,
        "--no-simulate",
        "--print",
        "title",
        "--print",
        "after_move:filepath",
        url,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `yt-dlp` prints the title first and the final file path last.
fn parse_print_output(stdout: &str) -> Option<(String, PathBuf)> {
    let lines: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    match lines.as_slice() {
        [title, .., path] => Some((title.to_string(), PathBuf::from(path))),
        _ => None,
    }
}

/// Download a video's audio as 16 kHz mono WAV into `temp_dir`.
///
/// The file ends up as `yt_<epoch_ms>_<sanitized title>.wav`.
pub async fn download_audio(url: &str, temp_dir: &Path) -> Result<DownloadedAudio> {
    download_audio_with(url, temp_dir, "yt-dlp").await
}

/// [`download_audio`] with an explicit downloader executable.
pub async fn download_audio_with(
    url: &str,
    temp_dir: &Path,
    program: &str,
) -> Result<DownloadedAudio> {
    let url = normalize_url(url);
    tokio::fs::create_dir_all(temp_dir).await?;

    let stamp = chrono::Utc::now().timestamp_millis();
    let template = temp_dir
        .join(format!("yt_{stamp}_%(id)s.%(ext)s"))
        .display()
        .to_string();

    info!(%url, "Downloading YouTube audio");
    let result = tokio::time::timeout(
        DOWNLOAD_TIMEOUT,
        tokio::process::Command::new(program)
            .args(ytdlp_args(&url, &template))
            .kill_on_drop(true)
            .output(),
    )
    .await;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SpeechBridgeError::Media(format!(
                "{program} is not installed; install it to download YouTube audio"
            )));
        }
        Ok(Err(e)) => {
            return Err(SpeechBridgeError::Media(format!("failed to run {program}: {e}")));
        }
        Err(_) => {
            return Err(SpeechBridgeError::Media(format!(
                "YouTube download timed out after {}s",
                DOWNLOAD_TIMEOUT.as_secs()
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpeechBridgeError::Media(format!(
            "YouTube download failed: {}",
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (title, downloaded) = parse_print_output(&stdout).ok_or_else(|| {
        SpeechBridgeError::Media("yt-dlp did not report the downloaded file".into())
    })?;

    let final_path = temp_dir.join(format!("yt_{stamp}_{}.wav", sanitize_title(&title)));
    tokio::fs::rename(&downloaded, &final_path).await?;
    debug!(path = %final_path.display(), %title, "YouTube audio ready");

    Ok(DownloadedAudio {
        path: final_path,
        title,
    })
}
