mod libre;

use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

use crate::error::TranslationError;
use crate::region::{TextRegion, TranslatedRegion};

pub use libre::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, LibreTranslate};

pub type TranslateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, TranslationError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRequest<'a> {
    pub text: &'a str,
    pub source_lang: &'a str,
    pub target_lang: &'a str,
}

/// A translation backend. One call per text span, no retries.
pub trait Translator: Send + Sync {
    fn translate<'a>(&'a self, request: TranslationRequest<'a>) -> TranslateFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub source_lang: String,
    pub target_lang: String,
    pub concurrency: usize,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            source_lang: "zh".to_string(),
            target_lang: "en".to_string(),
            concurrency: 4,
        }
    }
}

/// Wraps a backend so that a failed translation degrades to the untranslated text.
#[derive(Debug, Clone)]
pub struct TranslatorGateway<T: Translator> {
    backend: T,
    options: GatewayOptions,
}

impl<T: Translator> TranslatorGateway<T> {
    pub fn new(backend: T, options: GatewayOptions) -> Self {
        Self { backend, options }
    }

    pub async fn try_translate(&self, text: &str) -> Result<String, TranslationError> {
        let request = TranslationRequest {
            text: text.trim(),
            source_lang: &self.options.source_lang,
            target_lang: &self.options.target_lang,
        };
        let translated = self.backend.translate(request).await?;
        if translated.trim().is_empty() {
            return Err(TranslationError::MalformedResponse(
                "empty translatedText".to_string(),
            ));
        }
        Ok(translated)
    }

    /// Never fails: on error the input comes back unchanged.
    pub async fn translate(&self, text: &str) -> String {
        self.translate_or_fallback(text).await.0
    }

    async fn translate_or_fallback(&self, text: &str) -> (String, bool) {
        match self.try_translate(text).await {
            Ok(translated) => (translated, false),
            Err(err) => {
                warn!("translation failed, keeping source text {:?}: {}", text, err);
                (text.to_string(), true)
            }
        }
    }

    /// Translates every region with bounded concurrency; the output keeps the input order.
    pub async fn translate_regions(&self, regions: Vec<TextRegion>) -> Vec<TranslatedRegion> {
        let limit = self.options.concurrency.max(1);
        stream::iter(regions)
            .map(|region| async move {
                let (translated_text, fallback) =
                    self.translate_or_fallback(&region.source_text).await;
                TranslatedRegion {
                    region,
                    translated_text,
                    fallback,
                }
            })
            .buffered(limit)
            .collect()
            .await
    }
}
