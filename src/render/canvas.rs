use image::RgbImage;
use tiny_skia::{Pixmap, PixmapMut};

use super::Rgb;
use crate::region::BoundingBox;

/// Opaque RGB raster that the compositor edits in place.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Returns `None` for an image without pixels.
    pub fn from_rgb(image: &RgbImage) -> Option<Self> {
        let mut pixmap = Pixmap::new(image.width(), image.height())?;
        for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(image.pixels()) {
            dst[0] = src.0[0];
            dst[1] = src.0[1];
            dst[2] = src.0[2];
            dst[3] = 255;
        }
        Some(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let offset = (y as usize * self.width() as usize + x as usize) * 4;
        let data = self.pixmap.data();
        Some(Rgb {
            r: data[offset],
            g: data[offset + 1],
            b: data[offset + 2],
        })
    }

    /// Paints the inclusive box, clipped to the canvas.
    pub fn fill_rect(&mut self, bbox: &BoundingBox, color: Rgb) {
        let max_x = self.width() as i32 - 1;
        let max_y = self.height() as i32 - 1;
        let left = bbox.left.max(0);
        let top = bbox.top.max(0);
        let right = bbox.right.min(max_x);
        let bottom = bbox.bottom.min(max_y);
        if left > right || top > bottom {
            return;
        }
        let stride = self.width() as usize * 4;
        let data = self.pixmap.data_mut();
        for y in top..=bottom {
            let row = y as usize * stride;
            for x in left..=right {
                let offset = row + x as usize * 4;
                data[offset] = color.r;
                data[offset + 1] = color.g;
                data[offset + 2] = color.b;
                data[offset + 3] = 255;
            }
        }
    }

    pub(crate) fn pixmap_mut(&mut self) -> PixmapMut<'_> {
        self.pixmap.as_mut()
    }

    pub fn into_rgb(self) -> RgbImage {
        let width = self.pixmap.width();
        let height = self.pixmap.height();
        let mut image = RgbImage::new(width, height);
        for (dst, src) in image.pixels_mut().zip(self.pixmap.data().chunks_exact(4)) {
            dst.0 = [src[0], src[1], src[2]];
        }
        image
    }
}
