use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{TranslateFuture, TranslationRequest, Translator};
use crate::error::TranslationError;

pub const DEFAULT_ENDPOINT: &str = "https://libretranslate.de/translate";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const API_KEY_ENV: &str = "LIBRETRANSLATE_API_KEY";

/// Client for a LibreTranslate-compatible `/translate` endpoint.
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranslateBody<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslate {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: TranslationRequest<'_>) -> Result<String, TranslationError> {
        let body = TranslateBody {
            q: request.text,
            source: request.source_lang,
            target: request.target_lang,
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TranslationError::Status {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }
        let parsed: TranslateResponse = serde_json::from_str(&text)
            .map_err(|err| TranslationError::MalformedResponse(err.to_string()))?;
        debug!(
            "translated {} chars via {}",
            request.text.chars().count(),
            self.endpoint
        );
        Ok(parsed.translated_text)
    }
}

impl Translator for LibreTranslate {
    fn translate<'a>(&'a self, request: TranslationRequest<'a>) -> TranslateFuture<'a> {
        Box::pin(self.send(request))
    }
}
