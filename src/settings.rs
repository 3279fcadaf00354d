use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::region::DEFAULT_MIN_CONFIDENCE;
use crate::render::{OverlayStyle, Rgb};
use crate::translate::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub min_confidence: f32,
    pub translate_endpoint: String,
    pub translate_api_key: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub translate_timeout: Duration,
    pub translate_concurrency: usize,
    pub overlay_font_size: f32,
    pub overlay_font_path: Option<String>,
    pub overlay_font_family: Option<String>,
    pub overlay_fill_color: String,
    pub overlay_text_color: String,
    pub ocr_command: String,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub batch_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            translate_endpoint: DEFAULT_ENDPOINT.to_string(),
            translate_api_key: None,
            source_lang: "zh".to_string(),
            target_lang: "en".to_string(),
            translate_timeout: DEFAULT_TIMEOUT,
            translate_concurrency: 4,
            overlay_font_size: 20.0,
            overlay_font_path: None,
            overlay_font_family: None,
            overlay_fill_color: "#ffffff".to_string(),
            overlay_text_color: "#000000".to_string(),
            ocr_command: "tesseract".to_string(),
            ocr_languages: "chi_sim+eng".to_string(),
            ocr_psm: 6,
            batch_concurrency: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    filter: Option<FilterSettings>,
    translate: Option<TranslateSettings>,
    overlay: Option<OverlaySettings>,
    ocr: Option<OcrSettings>,
    batch: Option<BatchSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterSettings {
    min_confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    source: Option<String>,
    target: Option<String>,
    timeout_secs: Option<u64>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    font_size: Option<f32>,
    font_path: Option<String>,
    font_family: Option<String>,
    fill_color: Option<String>,
    text_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    command: Option<String>,
    languages: Option<String>,
    psm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchSettings {
    concurrency: Option<usize>,
}

/// Loads the embedded defaults, then every settings file that exists, later files winning.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(embedded);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn overlay_style(&self) -> Result<OverlayStyle> {
        Ok(OverlayStyle {
            fill: Rgb::parse_hex(&self.overlay_fill_color)
                .with_context(|| "invalid overlay.fill_color")?,
            text: Rgb::parse_hex(&self.overlay_text_color)
                .with_context(|| "invalid overlay.text_color")?,
        })
    }

    pub fn page_concurrency(&self) -> usize {
        if self.batch_concurrency == 0 {
            num_cpus::get().max(1)
        } else {
            self.batch_concurrency
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!(
                "filter.min_confidence must be within 0..=1 (got {})",
                self.min_confidence
            ));
        }
        if self.overlay_font_size <= 0.0 {
            return Err(anyhow!(
                "overlay.font_size must be positive (got {})",
                self.overlay_font_size
            ));
        }
        self.overlay_style()?;
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(filter) = incoming.filter {
            if let Some(value) = filter.min_confidence {
                self.min_confidence = value;
            }
        }
        if let Some(translate) = incoming.translate {
            if let Some(endpoint) = non_empty(translate.endpoint) {
                self.translate_endpoint = endpoint;
            }
            if let Some(key) = non_empty(translate.api_key) {
                self.translate_api_key = Some(key);
            }
            if let Some(source) = non_empty(translate.source) {
                self.source_lang = source;
            }
            if let Some(target) = non_empty(translate.target) {
                self.target_lang = target;
            }
            if let Some(secs) = translate.timeout_secs {
                if secs > 0 {
                    self.translate_timeout = Duration::from_secs(secs);
                }
            }
            if let Some(limit) = translate.concurrency {
                if limit > 0 {
                    self.translate_concurrency = limit;
                }
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(size) = overlay.font_size {
                self.overlay_font_size = size;
            }
            if let Some(path) = non_empty(overlay.font_path) {
                self.overlay_font_path = Some(path);
            }
            if let Some(family) = non_empty(overlay.font_family) {
                self.overlay_font_family = Some(family);
            }
            if let Some(color) = non_empty(overlay.fill_color) {
                self.overlay_fill_color = color;
            }
            if let Some(color) = non_empty(overlay.text_color) {
                self.overlay_text_color = color;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(command) = non_empty(ocr.command) {
                self.ocr_command = command;
            }
            if let Some(languages) = non_empty(ocr.languages) {
                self.ocr_languages = languages;
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
        }
        if let Some(batch) = incoming.batch {
            if let Some(limit) = batch.concurrency {
                self.batch_concurrency = limit;
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".image-text-translator"))
        }
    })
}
