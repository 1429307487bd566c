//! Configuration loading, defaults, and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::languages;
use crate::types::VoiceGender;

/// Top-level SpeechBridge configuration.
///
/// Every section is optional; accessors fall back to the documented defaults so
/// an empty file (or no file at all) is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub translator: Option<TranslatorConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<DashboardConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// --- Vendor service configs ---

/// Azure Speech resource (used for both recognition and synthesis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_speech_key_env")]
    pub api_key_env: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default = "default_region_env")]
    pub region_env: String,

    /// Override for the recognition base URL (default: `https://{region}.stt.speech.microsoft.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_endpoint: Option<String>,

    /// Override for the synthesis base URL (default: `https://{region}.tts.speech.microsoft.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_endpoint: Option<String>,

    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,
}

fn default_speech_key_env() -> String {
    "AZURE_SPEECH_KEY".into()
}

fn default_region_env() -> String {
    "AZURE_REGION".into()
}

fn default_speech_timeout() -> u64 {
    30
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_speech_key_env(),
            region: None,
            region_env: default_region_env(),
            stt_endpoint: None,
            tts_endpoint: None,
            timeout_secs: default_speech_timeout(),
        }
    }
}

impl SpeechConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &Some(self.api_key_env.clone()))
    }

    pub fn resolve_region(&self) -> Option<String> {
        resolve_secret_field(&self.region, &Some(self.region_env.clone()))
    }
}

/// Azure Translator resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_translator_key_env")]
    pub api_key_env: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Region env var; `AZURE_REGION` is consulted when this one is unset.
    #[serde(default = "default_translator_region_env")]
    pub region_env: String,

    #[serde(default = "default_translator_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_translator_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_translator_key_env() -> String {
    "AZURE_TRANSLATOR_KEY".into()
}

fn default_translator_region_env() -> String {
    "AZURE_TRANSLATOR_REGION".into()
}

fn default_translator_endpoint() -> String {
    "https://api.cognitive.microsofttranslator.com".into()
}

fn default_translator_timeout() -> u64 {
    10
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_translator_key_env(),
            region: None,
            region_env: default_translator_region_env(),
            endpoint: default_translator_endpoint(),
            timeout_secs: default_translator_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl TranslatorConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &Some(self.api_key_env.clone()))
    }

    pub fn resolve_region(&self) -> Option<String> {
        resolve_secret_field(&self.region, &Some(self.region_env.clone()))
            .or_else(|| resolve_secret_field(&None, &Some(default_region_env())))
    }
}

/// Retry policy for translation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffKind,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff: BackoffKind::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `base * (attempt - 1)`: 1s, 2s, 3s ...
    #[default]
    Linear,
    /// `base * 2^(attempt - 2)`: 1s, 2s, 4s ...
    Exponential,
}

/// Voice and prosody defaults for synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub voice_gender: VoiceGender,

    /// Speaking rate adjustment in percent (-50..=50).
    #[serde(default)]
    pub rate_percent: i32,

    /// Pitch adjustment in percent (-20..=20).
    #[serde(default)]
    pub pitch_percent: i32,

    /// Value for the `X-Microsoft-OutputFormat` header.
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_output_format() -> String {
    "riff-16khz-16bit-mono-pcm".into()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice_gender: VoiceGender::default(),
            rate_percent: 0,
            pitch_percent: 0,
            output_format: default_output_format(),
        }
    }
}

pub const RATE_RANGE: std::ops::RangeInclusive<i32> = -50..=50;
pub const PITCH_RANGE: std::ops::RangeInclusive<i32> = -20..=20;

// --- Pipeline / worker / dashboard ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Speech locale used for recognition (default: "en-US").
    #[serde(default = "default_source_language")]
    pub source_language: String,

    #[serde(default = "default_target_languages")]
    pub target_languages: Vec<String>,

    /// Root for transcripts/, translations/ and audio/ (default: "output").
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Synthesize audio for every translation (default: true).
    #[serde(default = "default_true")]
    pub synthesize: bool,
}

fn default_source_language() -> String {
    "en-US".into()
}

fn default_target_languages() -> Vec<String> {
    languages::DEFAULT_TARGET_LANGUAGES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_output_dir() -> String {
    "output".into()
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_languages: default_target_languages(),
            output_dir: default_output_dir(),
            synthesize: true,
        }
    }
}

/// Live recognition worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory for the PID, status, transcript and log files
    /// (default: `<output_dir>/live`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,

    /// Directory polled for incoming WAV segments (default: `<state_dir>/inbox`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_dir: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Segments shorter than this many characters are dropped.
    #[serde(default = "default_min_segment_chars")]
    pub min_segment_chars: usize,

    #[serde(default = "default_stop_phrases")]
    pub stop_phrases: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    500
}

fn default_min_segment_chars() -> usize {
    3
}

fn default_stop_phrases() -> Vec<String> {
    vec!["end recording".into()]
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            inbox_dir: None,
            poll_interval_ms: default_poll_interval(),
            min_segment_chars: default_min_segment_chars(),
            stop_phrases: default_stop_phrases(),
            max_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_dashboard_port() -> u16 {
    8501
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "speechbridge_providers=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

fn set_json_path(
    json: &mut serde_json::Value,
    path: &str,
    value: serde_json::Value,
) -> anyhow::Result<()> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        anyhow::bail!("Empty path");
    };

    if !json.is_object() {
        anyhow::bail!("Config root is not an object");
    }

    // Navigate to the parent of the target key
    let mut current = json;
    for segment in parents {
        if !current.get(segment).is_some_and(|v| v.is_object()) {
            current[segment] = serde_json::json!({});
        }
        current = current
            .get_mut(segment)
            .ok_or_else(|| anyhow::anyhow!("Cannot descend into '{segment}'"))?;
    }
    current[last] = value;
    Ok(())
}

const REDACTED: &str = "********";

fn mask_secrets(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "api_key" && v.is_string() {
                    *v = serde_json::Value::String(REDACTED.into());
                } else {
                    mask_secrets(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::SpeechBridgeError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location: `~/.speechbridge/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn speech(&self) -> SpeechConfig {
        self.speech.clone().unwrap_or_default()
    }

    pub fn translator(&self) -> TranslatorConfig {
        self.translator.clone().unwrap_or_default()
    }

    pub fn tts(&self) -> TtsConfig {
        self.tts.clone().unwrap_or_default()
    }

    pub fn pipeline(&self) -> PipelineConfig {
        self.pipeline.clone().unwrap_or_default()
    }

    pub fn worker(&self) -> WorkerConfig {
        self.worker.clone().unwrap_or_default()
    }

    /// Resolve the pipeline output root.
    pub fn output_dir(&self) -> PathBuf {
        self.pipeline
            .as_ref()
            .map(|p| expand_path(&p.output_dir))
            .unwrap_or_else(|| PathBuf::from(default_output_dir()))
    }

    /// Resolve the live worker state directory.
    pub fn worker_state_dir(&self) -> PathBuf {
        self.worker
            .as_ref()
            .and_then(|w| w.state_dir.as_deref())
            .map(expand_path)
            .unwrap_or_else(|| self.output_dir().join("live"))
    }

    /// Resolve the live worker inbox directory.
    pub fn worker_inbox_dir(&self) -> PathBuf {
        self.worker
            .as_ref()
            .and_then(|w| w.inbox_dir.as_deref())
            .map(expand_path)
            .unwrap_or_else(|| self.worker_state_dir().join("inbox"))
    }

    /// Dashboard port.
    pub fn dashboard_port(&self) -> u16 {
        self.dashboard
            .as_ref()
            .map(|d| d.port)
            .unwrap_or_else(default_dashboard_port)
    }

    /// Dashboard bind address.
    pub fn dashboard_bind(&self) -> String {
        self.dashboard
            .as_ref()
            .and_then(|d| d.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    /// Get a config value by dotted path (e.g. "pipeline.source_language").
    /// Secrets come back masked.
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = self.redacted();
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Serialized config with every `api_key` masked, for display.
    pub fn redacted(&self) -> serde_json::Value {
        let mut json = serde_json::to_value(self).unwrap_or_default();
        mask_secrets(&mut json);
        json
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;
        set_json_path(&mut json, path, value)?;
        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Set a dotted path in the file at `path` and return the effective config.
    ///
    /// The edit is applied to the file as written, so `${VAR}` references stay
    /// unexpanded on disk. The change is refused when the result does not
    /// parse or fails validation. Comments in the file are not kept.
    pub fn set_path_in_file(
        path: &Path,
        key: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<Self> {
        let mut raw: serde_json::Value = if path.exists() {
            json5::from_str(&std::fs::read_to_string(path)?)
                .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?
        } else {
            serde_json::json!({})
        };
        set_json_path(&mut raw, key, value)?;

        let rendered = serde_json::to_string_pretty(&raw)?;
        let effective: Config = json5::from_str(&substitute_env_vars(&rendered))
            .map_err(|e| anyhow::anyhow!("Invalid value for '{key}': {e}"))?;
        let (_, errors) = effective.validate();
        if let Some(error) = errors.first() {
            anyhow::bail!("Refusing to save invalid config: {error}");
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;
        Ok(effective)
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let speech = self.speech();
        if speech.resolve_api_key().is_none() {
            warnings.push(format!(
                "Speech API key missing (set speech.api_key or {})",
                speech.api_key_env
            ));
        }
        if speech.resolve_region().is_none() && speech.stt_endpoint.is_none() {
            warnings.push(format!(
                "Speech region missing (set speech.region or {})",
                speech.region_env
            ));
        }

        let translator = self.translator();
        if translator.resolve_api_key().is_none() {
            warnings.push(format!(
                "Translator API key missing (set translator.api_key or {})",
                translator.api_key_env
            ));
        }
        if translator.resolve_region().is_none() {
            warnings.push(format!(
                "Translator region missing (set translator.region or {})",
                translator.region_env
            ));
        }
        if translator.retry.max_attempts == 0 {
            errors.push("translator.retry.max_attempts must be at least 1".to_string());
        }

        let tts = self.tts();
        if !RATE_RANGE.contains(&tts.rate_percent) {
            errors.push(format!(
                "tts.rate_percent {} is outside {}..={}",
                tts.rate_percent,
                RATE_RANGE.start(),
                RATE_RANGE.end()
            ));
        }
        if !PITCH_RANGE.contains(&tts.pitch_percent) {
            errors.push(format!(
                "tts.pitch_percent {} is outside {}..={}",
                tts.pitch_percent,
                PITCH_RANGE.start(),
                PITCH_RANGE.end()
            ));
        }

        let pipeline = self.pipeline();
        if pipeline.target_languages.is_empty() {
            warnings.push("pipeline.target_languages is empty".to_string());
        }
        for lang in &pipeline.target_languages {
            if languages::lookup(lang).is_none() {
                warnings.push(format!(
                    "Target language '{lang}' has no voice mapping; synthesis will use the English voice"
                ));
            }
        }

        if let Some(dashboard) = &self.dashboard {
            if dashboard.port == 0 {
                errors.push("Dashboard port cannot be 0".to_string());
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for SpeechBridge data: `~/.speechbridge/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".speechbridge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, unique variable name
        unsafe { std::env::set_var("TEST_SB_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_SB_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_SB_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_SB_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dashboard_port(), 8501);
        assert_eq!(config.dashboard_bind(), "127.0.0.1");
        assert_eq!(config.pipeline().source_language, "en-US");
        assert_eq!(config.pipeline().target_languages.len(), 15);
        assert_eq!(config.translator().retry.max_attempts, 3);
        assert_eq!(config.translator().timeout_secs, 10);
        assert_eq!(config.worker_state_dir(), PathBuf::from("output").join("live"));
        assert_eq!(
            config.worker_inbox_dir(),
            PathBuf::from("output").join("live").join("inbox")
        );
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/speechbridge.json")).unwrap();
        assert!(config.speech.is_none());
    }

    #[test]
    fn test_load_json5_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // trailing commas and comments are fine
                pipeline: { source_language: "hi-IN", target_languages: ["en", "te"], },
                translator: { retry: { max_attempts: 5, backoff: "exponential" } },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let pipeline = config.pipeline();
        assert_eq!(pipeline.source_language, "hi-IN");
        assert_eq!(pipeline.target_languages, vec!["en", "te"]);
        assert_eq!(pipeline.output_dir, "output");
        let retry = config.translator().retry;
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay_ms, 1000);
        assert_eq!(retry.backoff, BackoffKind::Exponential);
    }

    #[test]
    fn test_speech_resolve_api_key() {
        // SAFETY: test-only, unique variable name
        unsafe { std::env::set_var("TEST_SB_SPEECH_KEY", "from-env") };
        let speech = SpeechConfig {
            api_key_env: "TEST_SB_SPEECH_KEY".into(),
            ..SpeechConfig::default()
        };
        assert_eq!(speech.resolve_api_key(), Some("from-env".into()));

        let speech2 = SpeechConfig {
            api_key: Some("direct-key".into()),
            api_key_env: "TEST_SB_SPEECH_KEY".into(),
            ..SpeechConfig::default()
        };
        // Direct key takes priority
        assert_eq!(speech2.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_SB_SPEECH_KEY") };
    }

    #[test]
    fn test_translator_region_direct_value() {
        let translator = TranslatorConfig {
            region: Some("centralindia".into()),
            region_env: "TEST_SB_UNSET_REGION".into(),
            ..TranslatorConfig::default()
        };
        assert_eq!(translator.resolve_region(), Some("centralindia".into()));
    }

    #[test]
    fn test_logging_config_defaults() {
        let json_str = r#"{ "logging": {} }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_get_and_set_path() {
        let mut config = Config::default();
        config
            .set_path("pipeline.source_language", serde_json::json!("te-IN"))
            .unwrap();
        assert_eq!(config.pipeline().source_language, "te-IN");
        assert_eq!(
            config.get_path("pipeline.source_language"),
            Some(serde_json::json!("te-IN"))
        );

        config
            .set_path("dashboard.port", serde_json::json!(9000))
            .unwrap();
        assert_eq!(config.dashboard_port(), 9000);
        assert!(config.get_path("dashboard.nope").is_none());
    }

    #[test]
    fn test_secrets_are_masked_for_display() {
        let config = Config {
            speech: Some(SpeechConfig {
                api_key: Some("sk-live-SECRET".into()),
                region: Some("eastus".into()),
                ..SpeechConfig::default()
            }),
            ..Config::default()
        };
        let shown = config.redacted().to_string();
        assert!(!shown.contains("sk-live-SECRET"));
        assert!(shown.contains("eastus"));
        assert_eq!(
            config.get_path("speech.api_key"),
            Some(serde_json::json!(REDACTED))
        );
        // The in-memory value is untouched
        assert_eq!(config.speech().resolve_api_key(), Some("sk-live-SECRET".into()));
    }

    #[test]
    fn test_set_path_in_file_keeps_env_references() {
        // SAFETY: test-only, unique variable name
        unsafe { std::env::set_var("TEST_SB_FILE_SECRET", "sk-live-SECRET") };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ speech: { api_key: "${TEST_SB_FILE_SECRET}" } }"#,
        )
        .unwrap();

        let effective =
            Config::set_path_in_file(&path, "pipeline.output_dir", serde_json::json!("/tmp/out"))
                .unwrap();
        assert_eq!(effective.output_dir(), PathBuf::from("/tmp/out"));
        assert_eq!(effective.speech().resolve_api_key(), Some("sk-live-SECRET".into()));

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("${TEST_SB_FILE_SECRET}"));
        assert!(!saved.contains("sk-live-SECRET"));
        unsafe { std::env::remove_var("TEST_SB_FILE_SECRET") };
    }

    #[test]
    fn test_set_path_in_file_refuses_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ tts: { rate_percent: 10 } }"#).unwrap();

        assert!(
            Config::set_path_in_file(&path, "tts.rate_percent", serde_json::json!(90)).is_err()
        );
        assert!(
            Config::set_path_in_file(&path, "dashboard.port", serde_json::json!("x")).is_err()
        );
        // The file is left as it was
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tts().rate_percent, 10);
    }

    #[test]
    fn test_set_path_rejects_bad_type() {
        let mut config = Config::default();
        let result = config.set_path("dashboard.port", serde_json::json!("not-a-port"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_prosody_out_of_range() {
        let config = Config {
            tts: Some(TtsConfig {
                rate_percent: 80,
                pitch_percent: -30,
                ..TtsConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("rate_percent")));
        assert!(errors.iter().any(|e| e.contains("pitch_percent")));
    }

    #[test]
    fn test_validate_missing_keys_warns() {
        let config = Config {
            speech: Some(SpeechConfig {
                api_key_env: "TEST_SB_NEVER_SET_1".into(),
                region_env: "TEST_SB_NEVER_SET_2".into(),
                ..SpeechConfig::default()
            }),
            ..Config::default()
        };
        let (warnings, errors) = config.validate();
        assert!(
            warnings.iter().any(|w| w.contains("TEST_SB_NEVER_SET_1")),
            "Expected a warning about the speech key, got: {warnings:?}"
        );
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            dashboard: Some(DashboardConfig {
                port: 9100,
                bind: Some("0.0.0.0".into()),
            }),
            ..Config::default()
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.dashboard_port(), 9100);
        assert_eq!(loaded.dashboard_bind(), "0.0.0.0");
    }
}
