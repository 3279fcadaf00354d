use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod detect;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod region;
pub mod render;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translate;

pub use detect::{Detector, TesseractDetector};
pub use error::{PipelineError, TranslationError};
pub use pipeline::{BatchPipeline, BatchReport, PageOptions, PagePipeline, PageReport};
pub use region::{BoundingBox, Detection, Point, Quad, TextRegion, TranslatedRegion};
pub use render::{OverlayFont, OverlayStyle, TextMeasure, TextPainter};
pub use settings::Settings;
pub use translate::{GatewayOptions, LibreTranslate, Translator, TranslatorGateway};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<String>,
    pub font_path: Option<String>,
    pub endpoint: Option<String>,
    pub min_confidence: Option<f32>,
    pub debug_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Job {
    Page { input: PathBuf, output: PathBuf },
    Batch { inputs: Vec<PathBuf>, output: PathBuf },
}

pub async fn run(config: Config, job: Job) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    apply_overrides(&mut settings, &config)?;

    let debug_dir = config.debug_dir.as_deref().map(PathBuf::from);
    if let Some(dir) = debug_dir.as_deref() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create debug directory: {}", dir.display()))?;
    }
    let batch = build_pipeline(&settings, debug_dir)?;

    match job {
        Job::Page { input, output } => {
            let report = batch.page_pipeline().process_page(&input, &output).await?;
            Ok(format_page_report(&input, &output, &report))
        }
        Job::Batch { inputs, output } => {
            let report = batch.process_batch(&inputs, &output).await?;
            Ok(format_batch_report(&output, &report))
        }
    }
}

/// Wires the tesseract detector, the LibreTranslate client and the overlay font together.
pub fn build_pipeline(
    settings: &Settings,
    debug_dir: Option<PathBuf>,
) -> Result<BatchPipeline<LibreTranslate>> {
    let font_path = settings.overlay_font_path.as_deref().map(Path::new);
    let font = render::resolve_overlay_font(
        font_path,
        settings.overlay_font_family.as_deref(),
        overlay_fallback_fonts(),
        settings.overlay_font_size,
    )?;
    tracing::debug!("overlay font: {} {}px", font.family(), font.size_px());

    let backend = LibreTranslate::new(
        settings.translate_endpoint.clone(),
        settings.translate_timeout,
    )
    .with_context(|| "failed to build translation client")?
    .with_api_key(settings.translate_api_key.clone());
    tracing::debug!("translation endpoint: {}", backend.endpoint());
    let gateway = TranslatorGateway::new(
        backend,
        GatewayOptions {
            source_lang: settings.source_lang.clone(),
            target_lang: settings.target_lang.clone(),
            concurrency: settings.translate_concurrency,
        },
    );
    let detector = TesseractDetector::new(
        settings.ocr_command.clone(),
        settings.ocr_languages.clone(),
        settings.ocr_psm,
    );
    let options = PageOptions {
        min_confidence: settings.min_confidence,
        style: settings.overlay_style()?,
        debug_dir,
    };
    let page = PagePipeline::new(Arc::new(detector), gateway, Arc::new(font), options);
    Ok(BatchPipeline::new(page, settings.page_concurrency()))
}

fn apply_overrides(settings: &mut Settings, config: &Config) -> Result<()> {
    if let Some(path) = config.font_path.as_ref().filter(|path| !path.trim().is_empty()) {
        settings.overlay_font_path = Some(path.clone());
    }
    if let Some(endpoint) = config.endpoint.as_ref().filter(|value| !value.trim().is_empty()) {
        settings.translate_endpoint = endpoint.clone();
    }
    if let Some(value) = config.min_confidence {
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("--min-confidence must be within 0..=1 (got {})", value));
        }
        settings.min_confidence = value;
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["DejaVu Sans", "Helvetica", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["DejaVu Sans", "Arial", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["DejaVu Sans", "NotoSans", "sans-serif"]
}

fn format_page_report(input: &Path, output: &Path, report: &PageReport) -> String {
    format!(
        "{} -> {}: {} region(s) rendered of {} detected, {} left untranslated",
        input.display(),
        output.display(),
        report.regions_rendered,
        report.regions_detected,
        report.translation_fallbacks
    )
}

fn format_batch_report(output: &Path, report: &BatchReport) -> String {
    let mut lines = vec![format!(
        "{}: {} page(s), {} skipped",
        output.display(),
        report.pages.len(),
        report.failures.len()
    )];
    for failure in &report.failures {
        lines.push(format!(
            "skipped #{} {}: {}",
            failure.index + 1,
            failure.source.display(),
            failure.error
        ));
    }
    lines.join("\n")
}
