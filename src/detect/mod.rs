mod tesseract;

use anyhow::Result;
use image::RgbImage;

use crate::region::Detection;

pub use tesseract::TesseractDetector;

/// Text detection black box: an image in, detections in reading order out.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;
}
