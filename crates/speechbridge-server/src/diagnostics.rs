//! Environment checks shared by `/api/diagnostics` and `speechbridge doctor`.

use serde::Serialize;
use speechbridge_core::config::Config;
use speechbridge_media::convert::tool_version;

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    fn new(name: &str, ok: bool, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            ok,
            detail,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub checks: Vec<Check>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Diagnostics {
    /// Credentials are present and the config has no errors. Missing tools
    /// only disable conversion and downloads.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
            && self
                .checks
                .iter()
                .filter(|c| c.name.starts_with("Azure"))
                .all(|c| c.ok)
    }
}

/// Inspect credentials, config validity, and external tools.
pub async fn collect(config: &Config) -> Diagnostics {
    let speech = config.speech();
    let translator = config.translator();

    let mut checks = vec![
        Check::new(
            "Azure Speech key",
            speech.resolve_api_key().is_some(),
            Some(speech.api_key_env.clone()),
        ),
        Check::new(
            "Azure Speech region",
            speech.resolve_region().is_some() || speech.stt_endpoint.is_some(),
            speech.resolve_region(),
        ),
        Check::new(
            "Azure Translator key",
            translator.resolve_api_key().is_some(),
            Some(translator.api_key_env.clone()),
        ),
        Check::new(
            "Azure Translator region",
            translator.resolve_region().is_some(),
            translator.resolve_region(),
        ),
    ];

    let (ffmpeg, ytdlp) = tokio::join!(
        tool_version("ffmpeg", "-version"),
        tool_version("yt-dlp", "--version")
    );
    checks.push(Check::new("ffmpeg", ffmpeg.is_some(), ffmpeg));
    checks.push(Check::new("yt-dlp", ytdlp.is_some(), ytdlp));

    let (warnings, errors) = config.validate();
    Diagnostics {
        checks,
        warnings,
        errors,
    }
}
