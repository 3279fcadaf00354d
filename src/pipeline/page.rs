use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::detect::Detector;
use crate::error::PipelineError;
use crate::region::{DEFAULT_MIN_CONFIDENCE, Detection, TranslatedRegion, filter_regions};
use crate::render::{Canvas, OverlayStyle, TextPainter, composite_region};
use crate::translate::{Translator, TranslatorGateway};

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub min_confidence: f32,
    pub style: OverlayStyle,
    /// When set, each page dumps its translated regions as JSON here.
    pub debug_dir: Option<PathBuf>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            style: OverlayStyle::default(),
            debug_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageReport {
    pub regions_detected: usize,
    pub regions_rendered: usize,
    pub translation_fallbacks: usize,
}

pub struct PagePipeline<T: Translator> {
    detector: Arc<dyn Detector>,
    gateway: TranslatorGateway<T>,
    painter: Arc<dyn TextPainter>,
    options: PageOptions,
}

impl<T: Translator> PagePipeline<T> {
    pub fn new(
        detector: Arc<dyn Detector>,
        gateway: TranslatorGateway<T>,
        painter: Arc<dyn TextPainter>,
        options: PageOptions,
    ) -> Self {
        Self {
            detector,
            gateway,
            painter,
            options,
        }
    }

    /// Translates the text of `input` in place and saves the result to `output`, in the
    /// format implied by its extension.
    pub async fn process_page(&self, input: &Path, output: &Path) -> Result<PageReport, PipelineError> {
        let format = ImageFormat::from_path(output).map_err(|source| PipelineError::Encode {
            path: output.to_path_buf(),
            source,
        })?;
        let (image, report) = self.render_page(input).await?;
        let target = output.to_path_buf();
        run_blocking(input, move || {
            let bytes = encode_image(&image, format, &target)?;
            std::fs::write(&target, bytes).map_err(|source| PipelineError::Write {
                path: target.clone(),
                source,
            })
        })
        .await?;
        info!(
            "translated {} -> {} ({} region(s), {} fallback(s))",
            input.display(),
            output.display(),
            report.regions_rendered,
            report.translation_fallbacks
        );
        Ok(report)
    }

    /// Decoding, detection and compositing run on the blocking pool so that translation
    /// requests of other pages keep being polled meanwhile.
    pub(crate) async fn render_page(&self, input: &Path) -> Result<(RgbImage, PageReport), PipelineError> {
        let detector = Arc::clone(&self.detector);
        let source = input.to_path_buf();
        let (canvas, detections) =
            run_blocking(input, move || decode_and_detect(detector.as_ref(), &source)).await?;

        let regions_detected = detections.len();
        let regions = filter_regions(detections, self.options.min_confidence);
        debug!(
            "{}: {} of {} detection(s) accepted",
            input.display(),
            regions.len(),
            regions_detected
        );

        let translated = self.gateway.translate_regions(regions).await;
        let report = PageReport {
            regions_detected,
            regions_rendered: translated.len(),
            translation_fallbacks: translated.iter().filter(|region| region.fallback).count(),
        };

        let painter = Arc::clone(&self.painter);
        let options = self.options.clone();
        let source = input.to_path_buf();
        let image = run_blocking(input, move || {
            composite_page(canvas, &translated, painter.as_ref(), &options, &source)
        })
        .await?;
        Ok((image, report))
    }
}

async fn run_blocking<R, F>(input: &Path, task: F) -> Result<R, PipelineError>
where
    F: FnOnce() -> Result<R, PipelineError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| PipelineError::Worker {
            path: input.to_path_buf(),
            message: err.to_string(),
        })?
}

fn decode_and_detect(
    detector: &dyn Detector,
    input: &Path,
) -> Result<(Canvas, Vec<Detection>), PipelineError> {
    let image = image::open(input)
        .map_err(|source| PipelineError::Decode {
            path: input.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let canvas = Canvas::from_rgb(&image).ok_or_else(|| PipelineError::EmptyImage {
        path: input.to_path_buf(),
    })?;
    let detections = detector
        .detect(&image)
        .map_err(|err| PipelineError::Detection {
            path: input.to_path_buf(),
            message: format!("{:#}", err),
        })?;
    Ok((canvas, detections))
}

fn composite_page(
    mut canvas: Canvas,
    translated: &[TranslatedRegion],
    painter: &dyn TextPainter,
    options: &PageOptions,
    input: &Path,
) -> Result<RgbImage, PipelineError> {
    for region in translated {
        composite_region(&mut canvas, region, painter, &options.style).map_err(|err| {
            PipelineError::Render {
                path: input.to_path_buf(),
                message: format!("{:#}", err),
            }
        })?;
    }
    if let Some(dir) = options.debug_dir.as_deref() {
        write_debug_regions(dir, input, translated)?;
    }
    Ok(canvas.into_rgb())
}

fn encode_image(
    image: &RgbImage,
    format: ImageFormat,
    path: &Path,
) -> Result<Vec<u8>, PipelineError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|source| PipelineError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(bytes)
}

fn write_debug_regions(
    dir: &Path,
    input: &Path,
    regions: &[TranslatedRegion],
) -> Result<(), PipelineError> {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("page");
    let path = dir.join(format!("{}.regions.json", stem));
    let json = serde_json::to_vec_pretty(regions).map_err(|err| PipelineError::Write {
        path: path.clone(),
        source: std::io::Error::other(err),
    })?;
    std::fs::write(&path, json).map_err(|source| PipelineError::Write {
        path: path.clone(),
        source,
    })?;
    debug!("wrote region dump {}", path.display());
    Ok(())
}
