//! Translator v3 REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use speechbridge_core::config::TranslatorConfig;
use tracing::debug;

use super::{SUBSCRIPTION_KEY_HEADER, SUBSCRIPTION_REGION_HEADER, http_client};
use crate::error::check_status;
use crate::{ProviderError, Translation, Translator};

pub struct AzureTranslator {
    endpoint: String,
    api_key: String,
    region: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateItem {
    #[serde(default)]
    detected_language: Option<DetectedLanguage>,
    #[serde(default)]
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    to: String,
    text: String,
}

impl AzureTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        region: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            region,
            client: http_client(timeout)?,
        })
    }

    pub fn from_config(config: &TranslatorConfig) -> Result<Self, ProviderError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ProviderError::MissingCredentials(format!(
                "translator key is not set (translator.api_key or {})",
                config.api_key_env
            ))
        })?;
        Self::new(
            &config.endpoint,
            api_key,
            config.resolve_region(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

fn into_translation(
    items: Vec<TranslateItem>,
    source: Option<&str>,
) -> Result<Translation, ProviderError> {
    let item = items
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("empty translation response".into()))?;

    let detected_language = item
        .detected_language
        .map(|d| d.language)
        .or_else(|| source.map(String::from))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Translation {
        detected_language,
        translations: item
            .translations
            .into_iter()
            .map(|t| (t.to, t.text))
            .collect(),
    })
}

#[async_trait]
impl Translator for AzureTranslator {
    fn id(&self) -> &str {
        "azure-translator"
    }

    async fn translate(
        &self,
        text: &str,
        targets: &[String],
        source: Option<&str>,
    ) -> Result<Translation, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyInput("text"));
        }
        if targets.is_empty() {
            return Err(ProviderError::EmptyInput("target languages"));
        }

        let mut query: Vec<(&str, &str)> = vec![("api-version", "3.0")];
        query.extend(targets.iter().map(|t| ("to", t.as_str())));
        if let Some(from) = source {
            query.push(("from", from));
        }

        debug!(targets = targets.len(), source, "Translating text");

        let mut request = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .query(&query)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header("X-ClientTraceId", uuid::Uuid::new_v4().to_string())
            .json(&[TranslateBody { text }]);
        if let Some(region) = &self.region {
            request = request.header(SUBSCRIPTION_REGION_HEADER, region);
        }

        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        let items: Vec<TranslateItem> =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        into_translation(items, source)
    }
}
