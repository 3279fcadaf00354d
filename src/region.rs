use serde::Serialize;
use tracing::debug;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Detector polygon, corners ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn from_rect(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Quad([
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ])
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let points = &self.0;
        let left = points.iter().map(|p| p.x).min().unwrap_or(0);
        let top = points.iter().map(|p| p.y).min().unwrap_or(0);
        let right = points.iter().map(|p| p.x).max().unwrap_or(0);
        let bottom = points.iter().map(|p| p.y).max().unwrap_or(0);
        BoundingBox {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Axis-aligned box with inclusive corner coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Raw detector output before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub quad: Quad,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    pub quad: Quad,
    pub bounding_box: BoundingBox,
    pub source_text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedRegion {
    pub region: TextRegion,
    pub translated_text: String,
    /// Set when the translation failed and `translated_text` is the source text.
    pub fallback: bool,
}

/// Keeps the detections worth redrawing, in detection order.
pub fn filter_regions(detections: Vec<Detection>, min_confidence: f32) -> Vec<TextRegion> {
    let mut regions = Vec::with_capacity(detections.len());
    for (index, detection) in detections.into_iter().enumerate() {
        // NaN compares false and is dropped with the low-confidence ones.
        if !(detection.confidence >= min_confidence) {
            debug!(
                "dropping detection {} (confidence {:.2} < {:.2})",
                index, detection.confidence, min_confidence
            );
            continue;
        }
        if detection.text.trim().is_empty() {
            debug!("dropping detection {} (empty text)", index);
            continue;
        }
        let bounding_box = detection.quad.bounding_box();
        if bounding_box.is_degenerate() {
            debug!(
                "dropping detection {} (degenerate box {}x{})",
                index,
                bounding_box.width(),
                bounding_box.height()
            );
            continue;
        }
        regions.push(TextRegion {
            quad: detection.quad,
            bounding_box,
            source_text: detection.text,
            confidence: detection.confidence,
        });
    }
    regions
}
