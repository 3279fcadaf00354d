use anyhow::{Result, anyhow};
use image::RgbImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::detect::Detector;
use crate::error::TranslationError;
use crate::region::{BoundingBox, Detection, Quad};
use crate::render::{Canvas, PlacedLine, Rgb, TextMeasure, TextPainter};
use crate::translate::{TranslateFuture, TranslationRequest, Translator};

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Monospace stand-in font: every character is `advance` px wide and drawn as a solid
/// block covering columns `x..x+4` and rows `y+1..y+9` of its cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockFont {
    advance: i32,
    line_height: i32,
}

impl BlockFont {
    pub(crate) fn new(advance: i32, line_height: i32) -> Self {
        Self {
            advance,
            line_height,
        }
    }
}

impl TextMeasure for BlockFont {
    fn text_width(&self, text: &str) -> f32 {
        (text.chars().count() as i32 * self.advance) as f32
    }

    fn line_height(&self) -> i32 {
        self.line_height
    }
}

impl TextPainter for BlockFont {
    fn draw_lines(&self, canvas: &mut Canvas, lines: &[PlacedLine], color: Rgb) -> Result<()> {
        for line in lines {
            for (index, ch) in line.text.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let left = line.x + index as i32 * self.advance;
                canvas.fill_rect(
                    &BoundingBox {
                        left,
                        top: line.y + 1,
                        right: left + 3,
                        bottom: line.y + 8,
                    },
                    color,
                );
            }
        }
        Ok(())
    }
}

type SeenRequest = (String, String, String);

/// Dictionary-backed translator; unknown text fails like an unreachable service.
#[derive(Debug, Clone, Default)]
pub(crate) struct MapTranslator {
    map: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MapTranslator {
    pub(crate) fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn with_delays(mut self, delays: &[(&str, Duration)]) -> Self {
        self.delays = delays
            .iter()
            .map(|(text, delay)| (text.to_string(), *delay))
            .collect();
        self
    }

    pub(crate) fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

impl Translator for MapTranslator {
    fn translate<'a>(&'a self, request: TranslationRequest<'a>) -> TranslateFuture<'a> {
        Box::pin(async move {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((
                    request.text.to_string(),
                    request.source_lang.to_string(),
                    request.target_lang.to_string(),
                ));
            }
            if let Some(delay) = self.delays.get(request.text) {
                tokio::time::sleep(*delay).await;
            }
            self.map
                .get(request.text)
                .cloned()
                .ok_or_else(|| TranslationError::Backend(format!("no entry for {:?}", request.text)))
        })
    }
}

/// Returns the same detections for every image.
#[derive(Debug, Clone, Default)]
pub(crate) struct FixedDetector {
    detections: Vec<Detection>,
    fail: bool,
    delay: Option<Duration>,
}

impl FixedDetector {
    pub(crate) fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Blocks the calling thread for `delay` per image, like an OCR subprocess does.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Detector for FixedDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(anyhow!("detector offline"));
        }
        Ok(self.detections.clone())
    }
}

pub(crate) fn detection(left: i32, top: i32, right: i32, bottom: i32, text: &str, confidence: f32) -> Detection {
    Detection {
        quad: Quad::from_rect(left, top, right, bottom),
        text: text.to_string(),
        confidence,
    }
}

/// Page sizes in points, rounded, read from every `/MediaBox` of an uncompressed PDF.
pub(crate) fn pdf_page_sizes(pdf: &[u8]) -> Vec<(f32, f32)> {
    let text = String::from_utf8_lossy(pdf);
    text.match_indices("/MediaBox")
        .filter_map(|(start, _)| {
            let rest = &text[start..];
            let open = rest.find('[')?;
            let close = rest.find(']')?;
            let values: Vec<f32> = rest[open + 1..close]
                .split_whitespace()
                .filter_map(|value| value.parse().ok())
                .collect();
            match values.as_slice() {
                [_, _, width, height] => Some((width.round(), height.round())),
                _ => None,
            }
        })
        .collect()
}

/// Serves `app` on an ephemeral local port and returns its `/translate` URL.
pub(crate) async fn serve_translate_stub(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}/translate", addr)
}
